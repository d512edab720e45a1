//! Wire types for the camera command protocol

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{Error, Result};

/// Build a command body for the execute endpoint.
///
/// Escape hatch for commands the client does not wrap: the returned value
/// can be passed straight to `CameraClient::execute_raw`.
pub fn command(name: &str, parameters: Value) -> Value {
    json!({
        "name": name,
        "parameters": parameters,
    })
}

/// Device information snapshot, fetched once per connection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    /// Model name
    pub model: String,
    /// Firmware version
    pub firmware_version: String,
    /// Serial number
    pub serial_number: String,
}

/// Device storage counters and the configured still-image size
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageInfo {
    /// Total storage capacity in bytes
    pub max_capacity: u64,
    /// Remaining capacity in bytes
    pub free_space_bytes: u64,
    /// Remaining number of photos at the current format
    pub free_space_images: u64,
    /// Width for shooting still images
    pub image_width: u32,
    /// Height for shooting still images
    pub image_height: u32,
}

/// Media format of a stored file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageFormat {
    Jpeg,
    Mpeg,
}

impl ImageFormat {
    /// Derive the format from a file name suffix
    pub fn from_file_name(name: &str) -> Self {
        let lower = name.to_ascii_lowercase();
        if lower.ends_with(".mp4") || lower.ends_with(".mpg") {
            ImageFormat::Mpeg
        } else {
            ImageFormat::Jpeg
        }
    }
}

/// One media file on the camera
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageInfo {
    /// Media format
    pub format: ImageFormat,
    /// File size in bytes
    pub file_size: u64,
    /// Image width in pixels
    pub pixel_width: u32,
    /// Image height in pixels
    pub pixel_height: u32,
    /// File name
    pub file_name: String,
    /// File creation time as reported by the camera
    pub capture_date: Option<NaiveDateTime>,
    /// Opaque handle used for thumbnail/delete/download operations
    pub file_id: String,
}

impl ImageInfo {
    /// Build from one entry of a file-listing response.
    ///
    /// The camera reports timestamps as `YYYY:MM:DD HH:MM:SS`, sometimes
    /// with a trailing zone offset; the offset is ignored.
    pub fn from_entry(entry: &Value) -> Result<Self> {
        let name = entry
            .get("name")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::Parse("file entry missing name".to_string()))?
            .to_string();
        let file_id = entry
            .get("uri")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::Parse("file entry missing uri".to_string()))?
            .to_string();

        let capture_date = entry
            .get("dateTimeZone")
            .or_else(|| entry.get("dateTime"))
            .and_then(|v| v.as_str())
            .and_then(parse_capture_date);

        Ok(Self {
            format: ImageFormat::from_file_name(&name),
            file_size: entry.get("size").and_then(|v| v.as_u64()).unwrap_or(0),
            pixel_width: entry.get("width").and_then(|v| v.as_u64()).unwrap_or(0) as u32,
            pixel_height: entry.get("height").and_then(|v| v.as_u64()).unwrap_or(0) as u32,
            file_name: name,
            capture_date,
            file_id,
        })
    }
}

fn parse_capture_date(raw: &str) -> Option<NaiveDateTime> {
    // "2015:07:10 11:05:18+09:00" -> keep the local wall-clock part
    let trimmed = if raw.len() > 19 { &raw[..19] } else { raw };
    NaiveDateTime::parse_from_str(trimmed, "%Y:%m:%d %H:%M:%S").ok()
}

/// Session handle returned by the connect handshake
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Camera-assigned session identifier
    pub session_id: String,
    /// Eviction timeout in seconds, if the camera reported one
    pub timeout_secs: Option<u64>,
}

/// Command execution state reported by the camera
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CommandState {
    InProgress,
    Done,
    Error,
}

/// Error payload inside a command response
#[derive(Debug, Clone, Deserialize)]
pub struct ProtocolErrorBody {
    pub code: String,
    #[serde(default)]
    pub message: String,
}

/// Parsed envelope of an execute/status response
#[derive(Debug, Clone, Deserialize)]
pub struct CommandResponse {
    #[serde(default)]
    pub name: Option<String>,
    pub state: CommandState,
    /// Correlation id for in-progress commands, echoed to the status endpoint
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub results: Option<Value>,
    #[serde(default)]
    pub error: Option<ProtocolErrorBody>,
}

impl CommandResponse {
    /// Parse a raw response body into the envelope
    pub fn parse(body: Value) -> Result<Self> {
        serde_json::from_value(body).map_err(|e| Error::Parse(format!("command response: {}", e)))
    }

    /// Convert an error-state response into the client error taxonomy
    pub fn into_error(self) -> Error {
        match self.error {
            Some(body) => Error::from_protocol(&body.code, &body.message),
            None => Error::Protocol {
                code: "unknown".to_string(),
                message: "error state without payload".to_string(),
            },
        }
    }

    /// Pull a string field out of `results`
    pub fn result_str(&self, key: &str) -> Option<&str> {
        self.results.as_ref()?.get(key)?.as_str()
    }
}

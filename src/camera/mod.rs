//! Camera protocol client
//!
//! ## Responsibilities
//!
//! - Session lifecycle (connect, update, close) with single-writer access
//! - Device, storage, battery, and file-listing queries
//! - Capture with completion polling, thumbnail and progressive download
//! - Live preview start/restart
//! - Generic command escape hatch for unwrapped commands
//!
//! All operations are async and run on the caller's worker; nothing here
//! retries on its own except capture-status polling (see `status_poller`).

pub mod status_poller;
pub mod types;

use bytes::Bytes;
use serde_json::{json, Value};
use tokio::sync::{mpsc, Mutex};

use crate::config::CameraConfig;
use crate::error::{Error, Result};
use crate::transport::{DownloadEvent, HttpTransport, LiveView, Transport};
use status_poller::StatusPoller;
use types::{command, CommandResponse, CommandState, DeviceInfo, ImageInfo, Session, StorageInfo};

/// Entries requested per file-listing page
const LIST_PAGE_SIZE: u32 = 50;

/// Client for one camera.
///
/// Holds at most one session. Session-mutating operations (connect,
/// update, close) serialize on an async mutex whose guard spans the whole
/// wire exchange, so concurrent callers cannot interleave handshakes.
pub struct CameraClient<T: Transport = HttpTransport> {
    transport: T,
    session: Mutex<Option<Session>>,
    config: CameraConfig,
}

impl CameraClient<HttpTransport> {
    /// Create a client over HTTP for the configured camera
    pub fn new(config: CameraConfig) -> Self {
        let transport = HttpTransport::new(&config);
        Self::with_transport(transport, config)
    }

    /// Point the client at a different camera IP; does not connect
    pub fn set_target_ip(&self, ip: &str) {
        self.transport.set_target_ip(ip);
    }
}

impl<T: Transport> CameraClient<T> {
    /// Create a client over a custom transport
    pub fn with_transport(transport: T, config: CameraConfig) -> Self {
        Self {
            transport,
            session: Mutex::new(None),
            config,
        }
    }

    /// Perform the session-initiation handshake and store the session
    pub async fn connect(&self) -> Result<String> {
        let mut session = self.session.lock().await;

        let resp = self
            .execute_checked(command("camera.startSession", json!({})))
            .await?;
        let session_id = resp
            .result_str("sessionId")
            .ok_or_else(|| Error::Parse("startSession without sessionId".to_string()))?
            .to_string();
        let timeout_secs = resp
            .results
            .as_ref()
            .and_then(|r| r.get("timeout"))
            .and_then(|v| v.as_u64());

        tracing::info!(session_id = %session_id, timeout_secs = ?timeout_secs, "Session established");

        *session = Some(Session {
            session_id: session_id.clone(),
            timeout_secs,
        });

        Ok(session_id)
    }

    /// Cached connectivity state; no wire traffic
    pub async fn connected(&self) -> bool {
        self.session.lock().await.is_some()
    }

    /// Re-validate the session, e.g. after the app was backgrounded.
    ///
    /// On eviction the local session is cleared and `SessionExpired`
    /// surfaces so the caller can reconnect.
    pub async fn update(&self) -> Result<()> {
        let mut session = self.session.lock().await;
        let session_id = match session.as_ref() {
            Some(s) => s.session_id.clone(),
            None => return Err(Error::NotConnected),
        };

        let result = self
            .execute_checked(command(
                "camera.updateSession",
                json!({ "sessionId": session_id }),
            ))
            .await;

        match result {
            Ok(resp) => {
                // The camera may hand back a renewed id
                if let Some(renewed) = resp.result_str("sessionId") {
                    if let Some(s) = session.as_mut() {
                        s.session_id = renewed.to_string();
                    }
                }
                tracing::debug!("Session refreshed");
                Ok(())
            }
            Err(Error::SessionExpired) => {
                tracing::warn!("Session evicted by camera");
                *session = None;
                Err(Error::SessionExpired)
            }
            Err(e) => Err(e),
        }
    }

    /// Terminate the session.
    ///
    /// Local state is cleared whether or not the wire call succeeds, so a
    /// caller observing an error is still disconnected afterwards.
    pub async fn close(&self) -> Result<()> {
        let mut session = self.session.lock().await;
        let Some(current) = session.take() else {
            return Ok(());
        };

        // Guard stays held across the exchange: close must not interleave
        // with a concurrent connect or update
        let result = self
            .execute_checked(command(
                "camera.closeSession",
                json!({ "sessionId": current.session_id }),
            ))
            .await;
        drop(session);

        match result {
            Ok(_) => {
                tracing::info!("Session closed");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "Close failed, local session dropped anyway");
                Err(e)
            }
        }
    }

    /// Fetch the device information snapshot
    pub async fn get_device_info(&self) -> Result<DeviceInfo> {
        let raw = self.transport.info().await?;
        serde_json::from_value(raw).map_err(|e| Error::Parse(format!("device info: {}", e)))
    }

    /// Full file listing in camera order, following pagination
    pub async fn get_image_infoes(&self) -> Result<Vec<ImageInfo>> {
        let mut entries = Vec::new();
        let mut token: Option<String> = None;

        loop {
            let mut params = json!({
                "entryCount": LIST_PAGE_SIZE,
                "includeThumb": false,
            });
            if let Some(t) = &token {
                params["continuationToken"] = json!(t);
            }

            let resp = self
                .execute_checked(command("camera.listImages", params))
                .await?;
            let results = resp
                .results
                .ok_or_else(|| Error::Parse("listImages without results".to_string()))?;
            let page = results
                .get("entries")
                .and_then(|v| v.as_array())
                .ok_or_else(|| Error::Parse("listImages without entries".to_string()))?;

            for entry in page {
                entries.push(ImageInfo::from_entry(entry)?);
            }

            match results.get("continuationToken").and_then(|v| v.as_str()) {
                Some(t) => token = Some(t.to_string()),
                None => break,
            }
        }

        tracing::debug!(count = entries.len(), "File listing fetched");

        Ok(entries)
    }

    /// Fetch the thumbnail for a stored file
    pub async fn get_thumb(&self, file_id: &str) -> Result<Bytes> {
        self.transport
            .execute_binary(&command(
                "camera.getImage",
                json!({ "fileUri": file_id, "_type": "thumb" }),
            ))
            .await
    }

    /// Download a stored image, optionally resized, with progress events
    pub async fn download_image(
        &self,
        file_id: &str,
        max_size: Option<u32>,
        events: Option<mpsc::UnboundedSender<DownloadEvent>>,
    ) -> Result<Bytes> {
        let mut params = json!({ "fileUri": file_id });
        if let Some(size) = max_size {
            params["maxSize"] = json!(size);
        }
        self.transport
            .download(&command("camera.getImage", params), events)
            .await
    }

    /// Storage counters and the configured still-image size
    pub async fn get_storage_info(&self) -> Result<StorageInfo> {
        let session_id = self.session_id().await?;
        let resp = self
            .execute_checked(command(
                "camera.getOptions",
                json!({
                    "sessionId": session_id,
                    "optionNames": [
                        "totalSpace",
                        "remainingSpace",
                        "remainingPictures",
                        "fileFormat",
                    ],
                }),
            ))
            .await?;

        let options = resp
            .results
            .as_ref()
            .and_then(|r| r.get("options"))
            .ok_or_else(|| Error::Parse("getOptions without options".to_string()))?;

        Ok(StorageInfo {
            max_capacity: options.get("totalSpace").and_then(|v| v.as_u64()).unwrap_or(0),
            free_space_bytes: options
                .get("remainingSpace")
                .and_then(|v| v.as_u64())
                .unwrap_or(0),
            free_space_images: options
                .get("remainingPictures")
                .and_then(|v| v.as_u64())
                .unwrap_or(0),
            image_width: options
                .pointer("/fileFormat/width")
                .and_then(|v| v.as_u64())
                .unwrap_or(0) as u32,
            image_height: options
                .pointer("/fileFormat/height")
                .and_then(|v| v.as_u64())
                .unwrap_or(0) as u32,
        })
    }

    /// Battery charge as percent (the camera reports a 0.0-1.0 fraction)
    pub async fn get_battery_level(&self) -> Result<u8> {
        let raw = self.transport.state().await?;
        let level = raw
            .pointer("/state/batteryLevel")
            .and_then(|v| v.as_f64())
            .ok_or_else(|| Error::Parse("state without batteryLevel".to_string()))?;
        Ok((level * 100.0).round().clamp(0.0, 100.0) as u8)
    }

    /// Set the still-image capture resolution for subsequent captures
    pub async fn set_image_format(&self, width: u32, height: u32) -> Result<()> {
        let session_id = self.session_id().await?;
        self.execute_checked(command(
            "camera.setOptions",
            json!({
                "sessionId": session_id,
                "options": {
                    "fileFormat": {
                        "type": "jpeg",
                        "width": width,
                        "height": height,
                    },
                },
            }),
        ))
        .await?;

        tracing::debug!(width = width, height = height, "Capture format set");

        Ok(())
    }

    /// Begin continuous preview-frame delivery.
    ///
    /// Frames keep arriving until the returned handle is canceled or
    /// dropped; there is no automatic termination.
    pub async fn start_live_view(&self) -> Result<LiveView> {
        let session_id = self.session_id().await?;
        self.transport
            .open_live_view(&command(
                "camera._getLivePreview",
                json!({ "sessionId": session_id }),
            ))
            .await
    }

    /// Re-issue the preview request after a transient failure.
    ///
    /// The previous handle is canceled first; the session is untouched.
    pub async fn restart_live_view(&self, mut previous: LiveView) -> Result<LiveView> {
        previous.cancel();
        tracing::debug!("Restarting live preview");
        self.start_live_view().await
    }

    /// Capture a still image and wait for it to land on storage.
    ///
    /// The highest-latency path in the client: the shutter command usually
    /// answers in-progress, and the poller then drives the status command
    /// (on this same task) until the camera reports the resulting file.
    pub async fn take_picture(&self) -> Result<ImageInfo> {
        let session_id = self.session_id().await?;
        let resp = self
            .execute_checked(command(
                "camera.takePicture",
                json!({ "sessionId": session_id }),
            ))
            .await?;

        let file_url = match resp.state {
            CommandState::Done => resp
                .result_str("fileUri")
                .ok_or_else(|| Error::Parse("takePicture without fileUri".to_string()))?
                .to_string(),
            CommandState::InProgress => {
                let id = resp
                    .id
                    .clone()
                    .ok_or_else(|| Error::Parse("in-progress response without id".to_string()))?;
                let mut poller =
                    StatusPoller::with_budget(self.config.poll_interval, self.config.poll_budget);
                poller.run(&self.transport, &id).await?
            }
            // execute_checked already turned error states into Err
            CommandState::Error => unreachable!("error state filtered by execute_checked"),
        };

        tracing::info!(file_url = %file_url, "Picture taken");

        // The listing is the authoritative inventory; resolve the new file there
        let images = self.get_image_infoes().await?;
        images
            .into_iter()
            .find(|info| info.file_id == file_url)
            .ok_or_else(|| Error::Protocol {
                code: "missingFile".to_string(),
                message: format!("captured file {} not in listing", file_url),
            })
    }

    /// Delete a stored file.
    ///
    /// `Ok(false)` when the camera rejects the command (file already gone);
    /// session and transport failures propagate as errors.
    pub async fn delete_image(&self, info: &ImageInfo) -> Result<bool> {
        let result = self
            .execute_checked(command("camera.delete", json!({ "fileUri": info.file_id })))
            .await;

        match result {
            Ok(_) => {
                tracing::debug!(file_id = %info.file_id, "File deleted");
                Ok(true)
            }
            Err(Error::Protocol { code, message }) => {
                tracing::warn!(file_id = %info.file_id, code = %code, message = %message, "Delete rejected");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Escape hatch: run a command the client does not wrap
    pub async fn execute_raw(&self, name: &str, parameters: Value) -> Result<Value> {
        self.transport.execute(&command(name, parameters)).await
    }

    /// Current session id, or `NotConnected`
    async fn session_id(&self) -> Result<String> {
        self.session
            .lock()
            .await
            .as_ref()
            .map(|s| s.session_id.clone())
            .ok_or(Error::NotConnected)
    }

    /// Execute a command and surface camera error payloads as errors
    async fn execute_checked(&self, body: Value) -> Result<CommandResponse> {
        let raw = self.transport.execute(&body).await?;
        let resp = CommandResponse::parse(raw)?;
        if resp.state == CommandState::Error {
            return Err(resp.into_error());
        }
        Ok(resp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    /// Transport that replays scripted execute/status responses and
    /// records every execute body for inspection
    struct ScriptedCamera {
        execute_script: StdMutex<VecDeque<Value>>,
        status_script: StdMutex<VecDeque<Value>>,
        executed: StdMutex<Vec<Value>>,
    }

    impl ScriptedCamera {
        fn new(execute_script: Vec<Value>) -> Self {
            Self {
                execute_script: StdMutex::new(execute_script.into()),
                status_script: StdMutex::new(VecDeque::new()),
                executed: StdMutex::new(Vec::new()),
            }
        }

        fn with_status(mut self, status_script: Vec<Value>) -> Self {
            self.status_script = StdMutex::new(status_script.into());
            self
        }

        fn executed(&self) -> Vec<Value> {
            self.executed.lock().unwrap().clone()
        }
    }

    impl Transport for ScriptedCamera {
        async fn execute(&self, body: &Value) -> crate::error::Result<Value> {
            self.executed.lock().unwrap().push(body.clone());
            self.execute_script
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| Error::Transport("connection refused".to_string()))
        }

        async fn status(&self, _body: &Value) -> crate::error::Result<Value> {
            self.status_script
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| Error::Transport("connection refused".to_string()))
        }

        async fn info(&self) -> crate::error::Result<Value> {
            Ok(json!({
                "model": "RICOH THETA S",
                "firmwareVersion": "01.42",
                "serialNumber": "00001234",
            }))
        }

        async fn state(&self) -> crate::error::Result<Value> {
            Ok(json!({"state": {"batteryLevel": 0.67}}))
        }
    }

    fn start_session_done() -> Value {
        json!({
            "name": "camera.startSession",
            "state": "done",
            "results": {"sessionId": "abc123", "timeout": 180},
        })
    }

    fn done_empty(name: &str) -> Value {
        json!({"name": name, "state": "done", "results": {}})
    }

    fn listing_with(uri: &str) -> Value {
        json!({
            "name": "camera.listImages",
            "state": "done",
            "results": {
                "entries": [{
                    "name": "R0010015.JPG",
                    "uri": uri,
                    "size": 1024,
                    "dateTime": "2016:03:01 10:00:00",
                    "width": 5376,
                    "height": 2688,
                }],
                "totalEntries": 1,
            },
        })
    }

    fn fast_config() -> CameraConfig {
        CameraConfig {
            poll_interval: Duration::from_millis(2),
            poll_budget: Duration::from_millis(500),
            ..CameraConfig::default()
        }
    }

    #[tokio::test]
    async fn test_connect_stores_session_and_attaches_id() {
        let transport = ScriptedCamera::new(vec![
            start_session_done(),
            done_empty("camera.setOptions"),
        ]);
        let client = CameraClient::with_transport(transport, fast_config());

        assert!(!client.connected().await);
        let sid = client.connect().await.unwrap();
        assert_eq!(sid, "abc123");
        assert!(client.connected().await);

        client.set_image_format(5376, 2688).await.unwrap();

        let executed = client.transport.executed();
        assert_eq!(executed[1]["name"], "camera.setOptions");
        assert_eq!(executed[1]["parameters"]["sessionId"], "abc123");
        assert_eq!(
            executed[1]["parameters"]["options"]["fileFormat"]["width"],
            5376
        );
    }

    #[tokio::test]
    async fn test_operations_require_connection() {
        let transport = ScriptedCamera::new(vec![]);
        let client = CameraClient::with_transport(transport, fast_config());

        assert!(matches!(
            client.take_picture().await.unwrap_err(),
            Error::NotConnected
        ));
        assert!(matches!(
            client.set_image_format(1024, 512).await.unwrap_err(),
            Error::NotConnected
        ));
    }

    #[tokio::test]
    async fn test_take_picture_polls_to_completion() {
        let transport = ScriptedCamera::new(vec![
            start_session_done(),
            json!({"name": "camera.takePicture", "state": "inProgress", "id": "90"}),
            listing_with("100RICOH/R0010015.JPG"),
        ])
        .with_status(vec![
            json!({"name": "camera.takePicture", "state": "inProgress", "id": "90"}),
            json!({
                "name": "camera.takePicture",
                "state": "done",
                "results": {"fileUri": "100RICOH/R0010015.JPG"},
            }),
        ]);
        let client = CameraClient::with_transport(transport, fast_config());

        client.connect().await.unwrap();
        let info = client.take_picture().await.unwrap();

        assert_eq!(info.file_id, "100RICOH/R0010015.JPG");
        assert_eq!(info.pixel_width, 5376);
    }

    #[tokio::test]
    async fn test_update_clears_session_on_eviction() {
        let transport = ScriptedCamera::new(vec![
            start_session_done(),
            json!({
                "name": "camera.updateSession",
                "state": "error",
                "error": {"code": "invalidSessionId", "message": "expired"},
            }),
        ]);
        let client = CameraClient::with_transport(transport, fast_config());

        client.connect().await.unwrap();
        let err = client.update().await.unwrap_err();

        assert!(matches!(err, Error::SessionExpired));
        assert!(!client.connected().await);
    }

    #[tokio::test]
    async fn test_close_clears_state_even_on_wire_failure() {
        // Script runs dry after connect, so closeSession hits a transport error
        let transport = ScriptedCamera::new(vec![start_session_done()]);
        let client = CameraClient::with_transport(transport, fast_config());

        client.connect().await.unwrap();
        assert!(client.close().await.is_err());
        assert!(!client.connected().await);

        // Idempotent once disconnected
        assert!(client.close().await.is_ok());
    }

    #[tokio::test]
    async fn test_listing_follows_continuation_token() {
        let page_one = json!({
            "name": "camera.listImages",
            "state": "done",
            "results": {
                "entries": [{
                    "name": "R0010001.JPG",
                    "uri": "100RICOH/R0010001.JPG",
                    "size": 1,
                    "width": 5376,
                    "height": 2688,
                }],
                "continuationToken": "next",
            },
        });
        let transport = ScriptedCamera::new(vec![
            page_one,
            listing_with("100RICOH/R0010002.JPG"),
        ]);
        let client = CameraClient::with_transport(transport, fast_config());

        let images = client.get_image_infoes().await.unwrap();

        assert_eq!(images.len(), 2);
        // Camera order preserved across pages
        assert_eq!(images[0].file_id, "100RICOH/R0010001.JPG");
        assert_eq!(images[1].file_id, "100RICOH/R0010002.JPG");

        let executed = client.transport.executed();
        assert!(executed[0]["parameters"].get("continuationToken").is_none());
        assert_eq!(executed[1]["parameters"]["continuationToken"], "next");
    }

    #[tokio::test]
    async fn test_device_info_and_battery() {
        let transport = ScriptedCamera::new(vec![]);
        let client = CameraClient::with_transport(transport, fast_config());

        let info = client.get_device_info().await.unwrap();
        assert_eq!(info.model, "RICOH THETA S");
        assert_eq!(info.firmware_version, "01.42");

        assert_eq!(client.get_battery_level().await.unwrap(), 67);
    }

    #[tokio::test]
    async fn test_storage_info_from_options() {
        let transport = ScriptedCamera::new(vec![
            start_session_done(),
            json!({
                "name": "camera.getOptions",
                "state": "done",
                "results": {
                    "options": {
                        "totalSpace": 19_551_662_080_u64,
                        "remainingSpace": 9_551_662_080_u64,
                        "remainingPictures": 1875,
                        "fileFormat": {"type": "jpeg", "width": 5376, "height": 2688},
                    },
                },
            }),
        ]);
        let client = CameraClient::with_transport(transport, fast_config());

        client.connect().await.unwrap();
        let storage = client.get_storage_info().await.unwrap();

        assert_eq!(storage.max_capacity, 19_551_662_080);
        assert_eq!(storage.free_space_images, 1875);
        assert_eq!(storage.image_width, 5376);
        assert_eq!(storage.image_height, 2688);
    }

    #[tokio::test]
    async fn test_delete_maps_rejection_to_false() {
        let transport = ScriptedCamera::new(vec![
            done_empty("camera.delete"),
            json!({
                "name": "camera.delete",
                "state": "error",
                "error": {"code": "invalidParameterValue", "message": "no such file"},
            }),
        ]);
        let client = CameraClient::with_transport(transport, fast_config());

        let info = ImageInfo::from_entry(&json!({
            "name": "R0010015.JPG",
            "uri": "100RICOH/R0010015.JPG",
        }))
        .unwrap();

        assert!(client.delete_image(&info).await.unwrap());
        assert!(!client.delete_image(&info).await.unwrap());
    }

    #[tokio::test]
    async fn test_execute_raw_passes_through() {
        let transport = ScriptedCamera::new(vec![json!({
            "name": "camera._finishWlan",
            "state": "done",
        })]);
        let client = CameraClient::with_transport(transport, fast_config());

        let raw = client
            .execute_raw("camera._finishWlan", json!({"sessionId": "abc123"}))
            .await
            .unwrap();

        assert_eq!(raw["state"], "done");
        let executed = client.transport.executed();
        assert_eq!(executed[0]["name"], "camera._finishWlan");
    }
}

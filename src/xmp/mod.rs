//! Embedded orientation metadata
//!
//! Spherical photos carry the capture pose (yaw/pitch/roll) in an XMP
//! packet embedded in the image bytes. The packet is plain XML between
//! `<?xpacket begin` and `<?xpacket end` markers; pose values appear as
//! `PoseHeadingDegrees` / `PosePitchDegrees` / `PoseRollDegrees`, either
//! as attributes or as element text depending on firmware. Scanning is
//! namespace-agnostic string slicing; a full XML parse buys nothing here.

use crate::error::{Error, Result};

/// Capture pose extracted from an image's embedded metadata, in degrees
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SphereXmp {
    pub yaw: f32,
    pub pitch: f32,
    pub roll: f32,
}

impl SphereXmp {
    /// Parse pose metadata out of raw image bytes.
    ///
    /// Fails when no packet is present or a pose value is unreadable;
    /// callers wanting a level default must supply it themselves.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let packet = extract_packet(data).ok_or_else(|| {
            tracing::debug!("No XMP packet in image");
            Error::Parse("no XMP packet found".to_string())
        })?;

        Ok(Self {
            yaw: extract_degrees(packet, "PoseHeadingDegrees")?,
            pitch: extract_degrees(packet, "PosePitchDegrees")?,
            roll: extract_degrees(packet, "PoseRollDegrees")?,
        })
    }
}

/// Locate the XMP packet in the byte buffer
fn extract_packet(data: &[u8]) -> Option<&str> {
    let start = find(data, b"<?xpacket begin")?;
    let end = start + find(&data[start..], b"<?xpacket end")?;
    std::str::from_utf8(&data[start..end]).ok()
}

/// Pull one pose value, accepting attribute or element form
fn extract_degrees(xml: &str, tag: &str) -> Result<f32> {
    let idx = xml
        .find(tag)
        .ok_or_else(|| Error::Parse(format!("missing {}", tag)))?;
    let after = &xml[idx + tag.len()..];

    let raw = attribute_value(after)
        .or_else(|| element_text(after))
        .ok_or_else(|| Error::Parse(format!("unreadable {}", tag)))?;

    raw.trim()
        .parse::<f32>()
        .map_err(|_| Error::Parse(format!("{} is not a number: {}", tag, raw.trim())))
}

/// `Tag="12.5"` or `Tag='12.5'`
fn attribute_value(after: &str) -> Option<&str> {
    let rest = after.trim_start().strip_prefix('=')?.trim_start();
    let quote = rest.chars().next()?;
    if quote != '"' && quote != '\'' {
        return None;
    }
    let inner = &rest[1..];
    let end = inner.find(quote)?;
    Some(&inner[..end])
}

/// `<ns:Tag>12.5</ns:Tag>`
fn element_text(after: &str) -> Option<&str> {
    let rest = after.trim_start().strip_prefix('>')?;
    let end = rest.find('<')?;
    Some(&rest[..end])
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

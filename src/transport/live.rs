//! Live preview stream
//!
//! The camera answers the live-preview command with an unbounded
//! `multipart/x-mixed-replace` body: a boundary line, a small header block
//! with a `Content-Length`, then one JPEG frame, repeated until the
//! connection drops. A reader task splits the byte stream into frames and
//! hands them to the consumer over a bounded channel; when the consumer
//! lags, new frames are dropped rather than buffered.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Frames buffered between reader and consumer before dropping
const FRAME_CHANNEL_DEPTH: usize = 2;

/// JPEG start-of-image marker
const JPEG_SOI: [u8; 2] = [0xFF, 0xD8];
/// JPEG end-of-image marker
const JPEG_EOI: [u8; 2] = [0xFF, 0xD9];

/// Handle to a running live-preview stream.
///
/// Dropping the handle stops the stream; `cancel` stops it explicitly and
/// guarantees no frame is observable afterward.
pub struct LiveView {
    frames: mpsc::Receiver<Bytes>,
    stop: Arc<AtomicBool>,
    reader: Option<JoinHandle<()>>,
}

impl LiveView {
    /// Spawn the reader task over an established streaming response
    pub(crate) fn spawn(resp: reqwest::Response) -> Self {
        let (tx, rx) = mpsc::channel(FRAME_CHANNEL_DEPTH);
        let stop = Arc::new(AtomicBool::new(false));
        let reader_stop = stop.clone();

        let reader = tokio::spawn(async move {
            let mut splitter = FrameSplitter::new();
            let mut stream = resp.bytes_stream();

            while let Some(chunk) = stream.next().await {
                if reader_stop.load(Ordering::SeqCst) {
                    break;
                }
                let chunk = match chunk {
                    Ok(c) => c,
                    Err(e) => {
                        tracing::warn!(error = %e, "Live preview stream broke");
                        break;
                    }
                };
                for frame in splitter.push(&chunk) {
                    if reader_stop.load(Ordering::SeqCst) {
                        return;
                    }
                    match tx.try_send(frame) {
                        Ok(()) => {}
                        Err(mpsc::error::TrySendError::Full(_)) => {
                            // Consumer is behind; newest frames win, this one is dropped
                            tracing::trace!("Dropping live frame, consumer lagging");
                        }
                        Err(mpsc::error::TrySendError::Closed(_)) => return,
                    }
                }
            }
        });

        Self {
            frames: rx,
            stop,
            reader: Some(reader),
        }
    }

    /// Build a handle around an externally fed channel (scripted streams)
    #[cfg(test)]
    pub(crate) fn from_parts(frames: mpsc::Receiver<Bytes>, reader: JoinHandle<()>) -> Self {
        Self {
            frames,
            stop: Arc::new(AtomicBool::new(false)),
            reader: Some(reader),
        }
    }

    /// Receive the next frame; `None` once the stream is finished or canceled
    pub async fn next_frame(&mut self) -> Option<Bytes> {
        self.frames.recv().await
    }

    /// Whether `cancel` has been called
    pub fn is_canceled(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Stop the stream.
    ///
    /// Idempotent. After this returns, `next_frame` yields `None`: the
    /// reader task is aborted, the channel is closed, and frames already
    /// buffered are discarded rather than delivered late.
    pub fn cancel(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        self.frames.close();
        while self.frames.try_recv().is_ok() {}
    }
}

impl Drop for LiveView {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}

/// Incremental multipart frame splitter.
///
/// Prefers the `Content-Length` declared in each part's header block;
/// falls back to scanning for JPEG SOI/EOI markers when a part carries no
/// length (some firmware omits it).
pub(crate) struct FrameSplitter {
    buf: Vec<u8>,
}

impl FrameSplitter {
    pub(crate) fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Feed a chunk, returning every complete frame it finished
    pub(crate) fn push(&mut self, chunk: &[u8]) -> Vec<Bytes> {
        self.buf.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some((frame, consumed)) = self.next_frame() {
            frames.push(frame);
            self.buf.drain(..consumed);
        }
        frames
    }

    fn next_frame(&self) -> Option<(Bytes, usize)> {
        // Header block ends at the first blank line
        if let Some(header_end) = find(&self.buf, b"\r\n\r\n") {
            let header = &self.buf[..header_end];
            if let Some(len) = content_length(header) {
                let body_start = header_end + 4;
                if self.buf.len() >= body_start + len {
                    let frame = Bytes::copy_from_slice(&self.buf[body_start..body_start + len]);
                    return Some((frame, body_start + len));
                }
                return None;
            }
        }

        // No usable header: cut on JPEG markers
        let start = find(&self.buf, &JPEG_SOI)?;
        let end_rel = find(&self.buf[start..], &JPEG_EOI)?;
        let end = start + end_rel + JPEG_EOI.len();
        let frame = Bytes::copy_from_slice(&self.buf[start..end]);
        Some((frame, end))
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn content_length(header: &[u8]) -> Option<usize> {
    let text = std::str::from_utf8(header).ok()?;
    for line in text.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        if key.trim().eq_ignore_ascii_case("content-length") {
            return value.trim().parse().ok();
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn part(boundary: &str, payload: &[u8]) -> Vec<u8> {
        let mut bytes = format!(
            "--{}\r\nContent-Type: image/jpeg\r\nContent-Length: {}\r\n\r\n",
            boundary,
            payload.len()
        )
        .into_bytes();
        bytes.extend_from_slice(payload);
        bytes.extend_from_slice(b"\r\n");
        bytes
    }

    fn jpeg(filler: &[u8]) -> Vec<u8> {
        let mut frame = JPEG_SOI.to_vec();
        frame.extend_from_slice(filler);
        frame.extend_from_slice(&JPEG_EOI);
        frame
    }

    #[test]
    fn test_splitter_two_frames_one_chunk() {
        let mut splitter = FrameSplitter::new();
        let first = jpeg(b"frame-one");
        let second = jpeg(b"frame-two");
        let mut wire = part("fb", &first);
        wire.extend_from_slice(&part("fb", &second));

        let frames = splitter.push(&wire);
        assert_eq!(frames.len(), 2);
        assert_eq!(&frames[0][..], &first[..]);
        assert_eq!(&frames[1][..], &second[..]);
    }

    #[test]
    fn test_splitter_frame_across_chunk_boundary() {
        let mut splitter = FrameSplitter::new();
        let frame = jpeg(b"split-me");
        let wire = part("fb", &frame);
        let (a, b) = wire.split_at(wire.len() / 2);

        assert!(splitter.push(a).is_empty());
        let frames = splitter.push(b);
        assert_eq!(frames.len(), 1);
        assert_eq!(&frames[0][..], &frame[..]);
    }

    #[test]
    fn test_splitter_marker_fallback_without_length() {
        let mut splitter = FrameSplitter::new();
        let frame = jpeg(b"bare");
        let mut wire = b"--fb\r\nContent-Type: image/jpeg\r\n\r\n".to_vec();
        wire.extend_from_slice(&frame);

        let frames = splitter.push(&wire);
        assert_eq!(frames.len(), 1);
        assert_eq!(&frames[0][..], &frame[..]);
    }

    #[tokio::test]
    async fn test_cancel_suppresses_all_further_frames() {
        let (tx, rx) = mpsc::channel(FRAME_CHANNEL_DEPTH);

        // Producer keeps frames flowing as fast as the channel allows
        let producer = tokio::spawn(async move {
            loop {
                if tx.send(Bytes::from_static(b"frame")).await.is_err() {
                    break;
                }
            }
        });
        let mut view = LiveView::from_parts(rx, producer);

        // Frames flow before cancellation
        assert!(view.next_frame().await.is_some());

        view.cancel();
        assert!(view.is_canceled());

        // Nothing is observable after cancel returns, including frames
        // that were already buffered when it was called
        for _ in 0..10 {
            assert!(view.next_frame().await.is_none());
        }

        // Second cancel is a no-op
        view.cancel();
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(view.next_frame().await.is_none());
    }
}

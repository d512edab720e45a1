//! sphericam - 360 camera control and spherical viewer core
//!
//! ## Architecture (6 Components)
//!
//! 1. Transport - HTTP boundary: command exchange, downloads, live stream
//! 2. CameraClient - session lifecycle and every wrapped camera command
//! 3. StatusPoller - capture completion polling with a bounded budget
//! 4. SphereXmp - capture pose out of embedded image metadata
//! 5. UvSphere - equirectangular shell mesh and draw contract
//! 6. OrbitController - drag/pinch navigation with decaying inertia
//!
//! ## Design Principles
//!
//! - One session per client, single-writer access to it
//! - Errors surface as values; the only built-in retry is capture polling
//! - Streams deliver over channels; cancellation is idempotent and final
//! - The viewer owns no GL state: buffers in, draw calls out

pub mod camera;
pub mod config;
pub mod error;
pub mod transport;
pub mod viewer;
pub mod xmp;

pub use camera::status_poller::{PollState, StatusPoller};
pub use camera::types::{DeviceInfo, ImageFormat, ImageInfo, Session, StorageInfo};
pub use camera::CameraClient;
pub use config::CameraConfig;
pub use error::{Error, Result};
pub use transport::{DownloadEvent, HttpTransport, LiveView, Transport};
pub use viewer::orbit::{GestureEvent, InertiaKind, OrbitController, OrbitState};
pub use viewer::sphere::UvSphere;
pub use viewer::{RenderContext, SphereView};
pub use xmp::SphereXmp;

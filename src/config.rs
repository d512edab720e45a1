//! Client configuration
//!
//! Destination and timing knobs for one camera connection. Defaults target
//! the camera's access-point gateway address and can be overridden via
//! environment variables.

use std::time::Duration;

/// Camera client configuration
#[derive(Debug, Clone)]
pub struct CameraConfig {
    /// Camera IP address (access-point mode gateway by default)
    pub camera_ip: String,
    /// Camera HTTP port
    pub port: u16,
    /// Per-request timeout for command exchanges
    pub request_timeout: Duration,
    /// TCP connect timeout
    pub connect_timeout: Duration,
    /// Interval between capture-status polls
    pub poll_interval: Duration,
    /// Total budget for capture-status polling before giving up
    pub poll_budget: Duration,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            camera_ip: std::env::var("SPHERICAM_CAMERA_IP")
                .unwrap_or_else(|_| "192.168.1.1".to_string()),
            port: std::env::var("SPHERICAM_CAMERA_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(80),
            request_timeout: Duration::from_secs(
                std::env::var("SPHERICAM_REQUEST_TIMEOUT_SEC")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(10),
            ),
            connect_timeout: Duration::from_secs(5),
            poll_interval: Duration::from_secs(1),
            poll_budget: Duration::from_secs(30),
        }
    }
}

impl CameraConfig {
    /// Base URL for the camera's HTTP endpoint
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.camera_ip, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url() {
        let config = CameraConfig {
            camera_ip: "192.168.1.1".to_string(),
            port: 80,
            ..CameraConfig::default()
        };
        assert_eq!(config.base_url(), "http://192.168.1.1:80");
    }
}

//! Camera feed request contract and status
//!
//! The browser side (`getUserMedia`) lives in the presenter; this module holds
//! the constraints it sends and the one-shot status machine it reports into.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::CameraError;

/// Which camera the browser should prefer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    /// Front / selfie camera
    User,
    /// Rear camera
    Environment,
}

impl FacingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FacingMode::User => "user",
            FacingMode::Environment => "environment",
        }
    }
}

impl fmt::Display for FacingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Video-only stream request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CameraRequest {
    pub facing_mode: FacingMode,
}

impl CameraRequest {
    /// `MediaStreamConstraints` document
    pub fn constraints(&self) -> serde_json::Value {
        json!({
            "audio": false,
            "video": { "facingMode": self.facing_mode.as_str() },
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CameraStatus {
    Idle,
    Requesting,
    Streaming,
    Unavailable(String),
    Closed,
}

/// One camera request per viewer lifetime; no retries
#[derive(Debug, Clone)]
pub struct CameraFeed {
    facing_mode: FacingMode,
    status: CameraStatus,
}

impl CameraFeed {
    pub fn new(facing_mode: FacingMode) -> Self {
        Self {
            facing_mode,
            status: CameraStatus::Idle,
        }
    }

    pub fn status(&self) -> &CameraStatus {
        &self.status
    }

    pub fn is_streaming(&self) -> bool {
        self.status == CameraStatus::Streaming
    }

    /// Start the request; fails if one was already made
    pub fn begin(&mut self) -> Result<CameraRequest, CameraError> {
        if self.status != CameraStatus::Idle {
            return Err(CameraError::AlreadyRequested);
        }
        self.status = CameraStatus::Requesting;
        log::info!("Requesting {} camera", self.facing_mode);
        Ok(CameraRequest {
            facing_mode: self.facing_mode,
        })
    }

    /// The stream arrived. Returns false if the feed was closed meanwhile,
    /// in which case the caller must stop the stream.
    pub fn started(&mut self) -> bool {
        if self.status != CameraStatus::Requesting {
            return false;
        }
        self.status = CameraStatus::Streaming;
        log::info!("Camera streaming");
        true
    }

    /// The request failed; the viewer continues without a backdrop
    pub fn failed(&mut self, error: &CameraError) {
        log::error!("Camera unavailable: {}", error);
        if self.status == CameraStatus::Requesting {
            self.status = CameraStatus::Unavailable(error.to_string());
        }
    }

    /// Teardown. Returns true if a live stream needs stopping.
    pub fn close(&mut self) -> bool {
        let was_streaming = self.is_streaming();
        self.status = CameraStatus::Closed;
        was_streaming
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constraints_document() {
        let request = CameraRequest {
            facing_mode: FacingMode::Environment,
        };
        assert_eq!(
            request.constraints().to_string(),
            r#"{"audio":false,"video":{"facingMode":"environment"}}"#
        );
    }

    #[test]
    fn test_single_request_per_lifetime() {
        let mut feed = CameraFeed::new(FacingMode::Environment);
        assert!(feed.begin().is_ok());
        assert_eq!(feed.begin(), Err(CameraError::AlreadyRequested));

        assert!(feed.started());
        assert!(feed.is_streaming());
        assert!(feed.close());
        assert_eq!(feed.status(), &CameraStatus::Closed);
        assert_eq!(feed.begin(), Err(CameraError::AlreadyRequested));
    }

    #[test]
    fn test_denied_request() {
        let mut feed = CameraFeed::new(FacingMode::User);
        feed.begin().unwrap();
        feed.failed(&CameraError::Denied("NotAllowedError".into()));
        assert!(matches!(feed.status(), CameraStatus::Unavailable(reason) if reason.contains("NotAllowedError")));
        assert!(!feed.close());
    }

    #[test]
    fn test_stream_arriving_after_close() {
        let mut feed = CameraFeed::new(FacingMode::Environment);
        feed.begin().unwrap();
        assert!(!feed.close());
        assert!(!feed.started());
        assert_eq!(feed.status(), &CameraStatus::Closed);
    }
}

//! Error taxonomy for the tracking control loop.

use thiserror::Error;

/// Errors produced by the capture, tracking, control and actuator layers.
///
/// Only [`Error::DeviceUnavailable`] is fatal, and only when the system starts.
/// Everything else is reported and the loop carries on.
#[derive(Error, Debug)]
pub enum Error {
    /// The capture device could not be opened.
    #[error("capture device unavailable: {0}")]
    DeviceUnavailable(String),

    /// The tracker rejected the initial bounding box or could not be created.
    #[error("target acquisition failed: {0}")]
    AcquisitionFailed(String),

    /// The tracker lost the target on a per-frame update.
    #[error("tracking lost with {algorithm}")]
    TrackingLost {
        /// Algorithm that lost the target.
        algorithm: String,
    },

    /// Actuator I/O failed.
    #[error("actuator sink unavailable: {0}")]
    SinkUnavailable(String),

    /// A tracker identifier did not name a supported algorithm.
    #[error("unknown tracking algorithm: {0:?}")]
    UnknownAlgorithm(String),

    /// No frame has been captured yet.
    #[error("no frame available")]
    NoFrame,

    /// The session was stepped while not tracking.
    #[error("tracker session is not tracking")]
    NotTracking,

    /// Configuration validation failure.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration file could not be read.
    #[error("failed to read configuration: {0}")]
    ConfigIo(#[from] std::io::Error),

    /// Configuration file could not be parsed.
    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_json::Error),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

mod algorithm;
mod bbox;
mod error_estimator;
mod session;
mod track_state;

pub use algorithm::{Algorithm, TrackerFactory, TrackerFailure, VisualTracker};
pub use bbox::BoundingBox;
pub use error_estimator::pixel_error;
pub use session::TrackerSession;
pub use track_state::TrackState;

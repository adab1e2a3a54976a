//! Capability interface for external single-target tracking algorithms.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::capture::Frame;
use crate::error::Error;
use crate::tracker::BoundingBox;

/// Failure reported by a tracker implementation.
pub type TrackerFailure = Box<dyn std::error::Error + Send + Sync>;

/// Supported tracking algorithms.
///
/// The set is closed: identifiers are resolved to a variant once, when the
/// configuration is read, and to an instance once per acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Algorithm {
    /// Discriminative correlation filter with channel and spatial reliability
    #[default]
    Csrt,
    /// Kernelized correlation filter
    Kcf,
    /// Multiple instance learning
    Mil,
    /// Minimum output sum of squared error filter
    Mosse,
}

impl Algorithm {
    /// All algorithms in switching order.
    pub const ALL: [Algorithm; 4] = [
        Algorithm::Csrt,
        Algorithm::Kcf,
        Algorithm::Mil,
        Algorithm::Mosse,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Algorithm::Csrt => "CSRT",
            Algorithm::Kcf => "KCF",
            Algorithm::Mil => "MIL",
            Algorithm::Mosse => "MOSSE",
        }
    }

    /// The algorithm after this one, wrapping around.
    pub fn next(self) -> Self {
        let idx = Self::ALL.iter().position(|a| *a == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Algorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|a| a.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::UnknownAlgorithm(s.to_string()))
    }
}

impl TryFrom<String> for Algorithm {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Algorithm> for String {
    fn from(value: Algorithm) -> Self {
        value.name().to_string()
    }
}

/// A single-target visual tracker.
///
/// # Example
///
/// ```ignore
/// use pantilt_rs::{BoundingBox, Frame, TrackerFailure, VisualTracker};
///
/// struct MyTracker { /* model state */ }
///
/// impl VisualTracker for MyTracker {
///     fn init(&mut self, frame: &Frame, bbox: BoundingBox) -> Result<(), TrackerFailure> {
///         // Build the appearance model from the selected region
///         Ok(())
///     }
///
///     fn update(&mut self, frame: &Frame) -> Option<BoundingBox> {
///         // Locate the target in the new frame
///         None
///     }
/// }
/// ```
pub trait VisualTracker: Send {
    /// Initialize on `frame` with the target inside `bbox`.
    fn init(&mut self, frame: &Frame, bbox: BoundingBox) -> Result<(), TrackerFailure>;

    /// Locate the target in `frame`, or `None` when it can no longer be found.
    fn update(&mut self, frame: &Frame) -> Option<BoundingBox>;
}

/// Creates tracker instances for an algorithm.
pub trait TrackerFactory: Send {
    fn create(&self, algorithm: Algorithm) -> Result<Box<dyn VisualTracker>, TrackerFailure>;
}

impl<F> TrackerFactory for F
where
    F: Fn(Algorithm) -> Result<Box<dyn VisualTracker>, TrackerFailure> + Send,
{
    fn create(&self, algorithm: Algorithm) -> Result<Box<dyn VisualTracker>, TrackerFailure> {
        self(algorithm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_case_insensitive() {
        assert_eq!("csrt".parse::<Algorithm>().unwrap(), Algorithm::Csrt);
        assert_eq!("MOSSE".parse::<Algorithm>().unwrap(), Algorithm::Mosse);
        assert_eq!(" Kcf ".parse::<Algorithm>().unwrap(), Algorithm::Kcf);
    }

    #[test]
    fn test_unknown_identifier() {
        let err = "MedianFlow".parse::<Algorithm>().unwrap_err();
        assert!(matches!(err, Error::UnknownAlgorithm(name) if name == "MedianFlow"));
    }

    #[test]
    fn test_next_cycles() {
        let mut algorithm = Algorithm::Csrt;
        let mut seen = Vec::new();
        for _ in 0..4 {
            algorithm = algorithm.next();
            seen.push(algorithm);
        }
        assert_eq!(
            seen,
            vec![Algorithm::Kcf, Algorithm::Mil, Algorithm::Mosse, Algorithm::Csrt]
        );
    }

    #[test]
    fn test_serde_uses_names() {
        let json = serde_json::to_string(&Algorithm::Mil).unwrap();
        assert_eq!(json, "\"MIL\"");
        let parsed: Algorithm = serde_json::from_str("\"mosse\"").unwrap();
        assert_eq!(parsed, Algorithm::Mosse);
    }
}

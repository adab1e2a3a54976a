/// Observable state of a tracker session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackState {
    /// No target; waiting for an acquisition request
    #[default]
    Idle,
    /// Target locked, tracker updated every frame
    Tracking,
    /// Tracker reported failure; needs an explicit re-acquisition
    Lost,
}

impl TrackState {
    pub fn label(self) -> &'static str {
        match self {
            TrackState::Idle => "idle",
            TrackState::Tracking => "tracking",
            TrackState::Lost => "lost",
        }
    }
}

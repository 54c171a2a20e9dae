/// Lifecycle of a motion (ByteTrack) track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackState {
    /// Newly created track, not yet confirmed
    #[default]
    New,
    /// Actively tracked object
    Tracked,
    /// Temporarily lost track
    Lost,
    /// Removed from tracking
    Removed,
}

/// Lifecycle of an appearance track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConfirmationState {
    /// Seen for fewer than `n_init` consecutive frames
    #[default]
    Tentative,
    Confirmed,
    /// Dropped; never returned again
    Deleted,
}

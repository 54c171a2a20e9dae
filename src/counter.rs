//! Counting lines and the crossing counter that updates them.

mod line;
mod object_counter;

pub use line::{
    ClassId, CountingLine, DEFAULT_PALETTE, Direction, DirectionCounts, LineAuthoring,
    LineCounts, LineRegistry, TrackId, TrackedObject,
};
pub use object_counter::{CountingPolicy, ObjectCounter};

//! Line-crossing state machine.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::counter::line::{ClassId, CountingLine, Direction, LineRegistry, TrackedObject};
use crate::geometry::{adaptive_threshold, bbox_center, is_near_segment, side_of_line};
use crate::tracking::Track;

/// Whether a track may be counted more than once on the same line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountingPolicy {
    /// At most one count per `(line, track)` for the lifetime of the track.
    #[default]
    OneShot,
    /// Every move from one half-plane (`side > 0` vs `side <= 0`) into the
    /// other while near the line is counted.
    Rearmable,
}

/// Drives the crossing state of every line from the tracks of one frame.
#[derive(Debug, Clone, Default)]
pub struct ObjectCounter {
    allowed_classes: HashSet<ClassId>,
    policy: CountingPolicy,
}

impl ObjectCounter {
    /// An empty allow-list accepts every class.
    pub fn new(allowed_classes: impl IntoIterator<Item = ClassId>) -> Self {
        Self {
            allowed_classes: allowed_classes.into_iter().collect(),
            policy: CountingPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: CountingPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> CountingPolicy {
        self.policy
    }

    /// Apply one frame's tracks to every line of the registry.
    pub fn update(&self, tracks: &[Track], registry: &mut LineRegistry) {
        for line in registry.lines_mut() {
            self.process_line(line, tracks);
        }
    }

    fn process_line(&self, line: &mut CountingLine, tracks: &[Track]) {
        for track in tracks {
            let Some(class_id) = self.valid_class(track) else {
                continue;
            };

            let ltrb = track.ltrb();
            let center = bbox_center(ltrb);
            let threshold = adaptive_threshold(ltrb);

            if !is_near_segment(center, line.start_point, line.end_point, threshold) {
                continue;
            }

            let current_side = side_of_line(center, line.start_point, line.end_point);
            self.update_crossing(line, track.track_id, class_id, current_side);
        }
    }

    /// Class of a track that should take part in counting, if any.
    fn valid_class(&self, track: &Track) -> Option<ClassId> {
        if !track.is_confirmed {
            return None;
        }
        let class_id = track.class_id?;
        if self.allowed_classes.is_empty() || self.allowed_classes.contains(&class_id) {
            Some(class_id)
        } else {
            None
        }
    }

    fn update_crossing(
        &self,
        line: &mut CountingLine,
        track_id: u64,
        class_id: ClassId,
        current_side: f32,
    ) {
        let Some(state) = line.tracked_objects.get_mut(&track_id) else {
            line.tracked_objects.insert(
                track_id,
                TrackedObject {
                    prev_side: current_side,
                    class: class_id,
                    counted: false,
                },
            );
            return;
        };

        let crossed = match self.policy {
            CountingPolicy::OneShot => !state.counted && state.prev_side * current_side <= 0.0,
            CountingPolicy::Rearmable => (state.prev_side > 0.0) != (current_side > 0.0),
        };

        if crossed {
            let direction = Direction::from_side(current_side);
            line.counts.increment(direction, class_id);
            state.counted = true;
            debug!(
                line = %line.name,
                track_id,
                class_id,
                direction = direction.as_str(),
                "line crossed"
            );
        }

        state.prev_side = current_side;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;
    use crate::tracker::Rect;

    fn track_at(id: u64, cx: f32, cy: f32, size: f32, class_id: Option<ClassId>) -> Track {
        Track {
            track_id: id,
            tlwh: Rect::new(cx - size / 2.0, cy - size / 2.0, size, size),
            is_confirmed: true,
            class_id,
            score: 0.9,
        }
    }

    fn two_lines() -> LineRegistry {
        LineRegistry::new(vec![
            CountingLine::new("A", Point::new(0.0, 300.0), Point::new(640.0, 300.0)),
            CountingLine::new("B", Point::new(400.0, 0.0), Point::new(400.0, 480.0)),
        ])
        .unwrap()
    }

    const CAR: ClassId = 2;

    #[test]
    fn test_straight_path_counts_once_on_crossed_line_only() {
        let mut registry = two_lines();
        let counter = ObjectCounter::new([]);

        for cy in [250.0, 275.0, 300.0, 325.0, 350.0] {
            counter.update(&[track_at(7, 320.0, cy, 40.0, Some(CAR))], &mut registry);
        }

        let a = registry.get("A").unwrap();
        let total = a.counts.total(Direction::Up) + a.counts.total(Direction::Down);
        assert_eq!(total, 1);
        // The centre lands exactly on the line at y=300, side 0 counts as up.
        assert_eq!(a.counts.count(Direction::Up, CAR), 1);
        assert!(a.tracked_objects[&7].counted);

        let b = registry.get("B").unwrap();
        assert_eq!(b.counts, Default::default());
        assert!(b.tracked_objects.is_empty());
    }

    #[test]
    fn test_clean_crossing_direction_follows_sign() {
        let mut registry = two_lines();
        let counter = ObjectCounter::new([]);

        for cy in [260.0, 290.0, 310.0, 340.0] {
            counter.update(&[track_at(1, 100.0, cy, 40.0, Some(CAR))], &mut registry);
        }
        for cy in [340.0, 310.0, 290.0] {
            counter.update(&[track_at(2, 200.0, cy, 40.0, Some(CAR))], &mut registry);
        }

        let a = registry.get("A").unwrap();
        assert_eq!(a.counts.count(Direction::Down, CAR), 1);
        assert_eq!(a.counts.count(Direction::Up, CAR), 1);
    }

    #[test]
    fn test_no_sign_change_never_counts() {
        let mut registry = two_lines();
        let counter = ObjectCounter::new([]);

        for cy in [250.0, 260.0, 270.0, 280.0, 290.0, 280.0, 260.0] {
            counter.update(&[track_at(3, 320.0, cy, 40.0, Some(CAR))], &mut registry);
        }

        let a = registry.get("A").unwrap();
        assert!(!a.tracked_objects[&3].counted);
        assert_eq!(a.counts.total(Direction::Up) + a.counts.total(Direction::Down), 0);
    }

    #[test]
    fn test_one_shot_ignores_repeated_crossings() {
        let mut registry = two_lines();
        let counter = ObjectCounter::new([]);

        for _ in 0..5 {
            for cy in [280.0, 320.0] {
                counter.update(&[track_at(4, 320.0, cy, 40.0, Some(CAR))], &mut registry);
            }
        }

        let a = registry.get("A").unwrap();
        assert_eq!(a.counts.total(Direction::Up) + a.counts.total(Direction::Down), 1);
        // prev_side keeps following the track after the count.
        assert_eq!(a.tracked_objects[&4].prev_side, 20.0);
    }

    #[test]
    fn test_rearmable_counts_every_half_plane_change() {
        let mut registry = two_lines();
        let counter = ObjectCounter::new([]).with_policy(CountingPolicy::Rearmable);

        for cy in [280.0, 300.0, 320.0, 280.0, 320.0] {
            counter.update(&[track_at(5, 320.0, cy, 40.0, Some(CAR))], &mut registry);
        }

        let a = registry.get("A").unwrap();
        assert_eq!(a.counts.count(Direction::Down, CAR), 2);
        assert_eq!(a.counts.count(Direction::Up, CAR), 1);
        assert!(a.tracked_objects[&5].counted);
    }

    #[test]
    fn test_far_tracks_leave_no_state() {
        let mut registry = two_lines();
        let counter = ObjectCounter::new([]);

        // Crosses y=300 but far outside the segment span (x > 640).
        for cy in [280.0, 320.0] {
            counter.update(&[track_at(6, 900.0, cy, 40.0, Some(CAR))], &mut registry);
        }
        assert!(registry.get("A").unwrap().tracked_objects.is_empty());
    }

    #[test]
    fn test_invalid_tracks_are_skipped() {
        let mut registry = two_lines();
        let counter = ObjectCounter::new([0, CAR]);

        let mut unconfirmed = track_at(10, 320.0, 280.0, 40.0, Some(CAR));
        unconfirmed.is_confirmed = false;
        let unlabeled = track_at(11, 320.0, 280.0, 40.0, None);
        let disallowed = track_at(12, 320.0, 280.0, 40.0, Some(5));

        for cy in [280.0, 320.0] {
            let mut tracks = vec![unconfirmed.clone(), unlabeled.clone(), disallowed.clone()];
            for t in &mut tracks {
                t.tlwh.y = cy - 20.0;
            }
            counter.update(&tracks, &mut registry);
        }

        let a = registry.get("A").unwrap();
        assert!(a.tracked_objects.is_empty());
        assert_eq!(a.counts, Default::default());
    }

    #[test]
    fn test_counts_use_current_class() {
        let mut registry = two_lines();
        let counter = ObjectCounter::new([]);

        counter.update(&[track_at(8, 320.0, 280.0, 40.0, Some(CAR))], &mut registry);
        counter.update(&[track_at(8, 320.0, 320.0, 40.0, Some(7))], &mut registry);

        let a = registry.get("A").unwrap();
        assert_eq!(a.tracked_objects[&8].class, CAR);
        assert_eq!(a.counts.count(Direction::Down, 7), 1);
    }
}

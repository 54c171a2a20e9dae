//! BYTE association: motion-only multi-object tracking.
//!
//! High-score detections are matched first against every tracked and lost
//! track, leftover tracks then get a second chance against low-score
//! detections. Detections carry no class, so the tracker never sees labels.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::tracker::kalman_filter::KalmanFilter;
use crate::tracker::matching::{self, AssignmentResult, Detection};
use crate::tracker::rect::{Rect, iou_batch};
use crate::tracker::strack::STrack;
use crate::tracker::track_state::TrackState;

/// Source rate assumed when a container reports none.
pub const FALLBACK_FPS: f32 = 30.0;

/// Configuration for the BYTETracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub track_thresh: f32,
    pub match_thresh: f32,
    pub track_buffer: u32,
    /// Rate at which `update` is called, in frames per second
    pub frame_rate: f32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            track_thresh: 0.5,
            match_thresh: 0.8,
            track_buffer: 30,
            frame_rate: 30.0,
        }
    }
}

impl TrackerConfig {
    /// Match the motion model to the processed cadence: a source at
    /// `nominal_fps` decimated by `frame_skip` feeds the tracker at
    /// `nominal_fps / frame_skip`. A missing rate (zero, negative or not
    /// finite) is taken as [`FALLBACK_FPS`].
    pub fn with_cadence(mut self, nominal_fps: f32, frame_skip: u32) -> Self {
        let fps = if nominal_fps.is_finite() && nominal_fps > 0.0 {
            nominal_fps
        } else {
            warn!(nominal_fps, fallback = FALLBACK_FPS, "source reports no usable frame rate");
            FALLBACK_FPS
        };
        self.frame_rate = fps / frame_skip.max(1) as f32;
        self
    }
}

pub struct BYTETracker {
    tracked_stracks: Vec<STrack>,
    lost_stracks: Vec<STrack>,
    frame_id: u32,
    next_id: u64,
    config: TrackerConfig,
    max_time_lost: u32,
    kalman_filter: KalmanFilter,
}

impl BYTETracker {
    pub fn new(config: TrackerConfig) -> Self {
        let max_time_lost = (config.frame_rate / 30.0 * config.track_buffer as f32) as u32;
        Self {
            tracked_stracks: Vec::new(),
            lost_stracks: Vec::new(),
            frame_id: 0,
            next_id: 0,
            config,
            max_time_lost,
            kalman_filter: KalmanFilter::default(),
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn max_time_lost(&self) -> u32 {
        self.max_time_lost
    }

    fn next_track_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Advance one frame and return the activated tracks.
    pub fn update(&mut self, detections: Vec<Detection>) -> Vec<STrack> {
        self.frame_id += 1;

        let mut activated_stracks = Vec::new();
        let mut refind_stracks = Vec::new();
        let mut lost_stracks = Vec::new();

        // Step 1: split detections into high-score and low-score
        let mut detections_high = Vec::new();
        let mut detections_low = Vec::new();
        for det in detections {
            if det.score >= self.config.track_thresh {
                detections_high.push(STrack::new(det.bbox, det.score));
            } else if det.score > 0.1 {
                detections_low.push(STrack::new(det.bbox, det.score));
            }
        }

        let (tracked_stracks, mut unconfirmed): (Vec<_>, Vec<_>) = self
            .tracked_stracks
            .drain(..)
            .partition(|t| t.is_activated);

        let mut strack_pool = joint_stracks(tracked_stracks, &self.lost_stracks);

        // Step 2: first association, with high score detections
        STrack::multi_predict(&mut strack_pool, &self.kalman_filter);

        let pool_rects: Vec<Rect> = strack_pool.iter().map(STrack::rect).collect();
        let det_rects: Vec<Rect> = detections_high.iter().map(STrack::rect).collect();
        let mut dists = matching::iou_distance(&pool_rects, &det_rects);
        let det_wrappers: Vec<Detection> = detections_high
            .iter()
            .map(|t| Detection::from_rect(t.rect(), t.score))
            .collect();
        matching::fuse_score(&mut dists, &det_wrappers);

        let AssignmentResult {
            matches,
            unmatched_tracks,
            unmatched_detections,
        } = matching::linear_assignment(&dists, self.config.match_thresh);

        for (itracked, idet) in matches {
            let mut track = strack_pool[itracked].clone();
            let det = &detections_high[idet];
            if track.state == TrackState::Tracked {
                track.update(det, &self.kalman_filter, self.frame_id);
                activated_stracks.push(track);
            } else {
                track.re_activate(det, &self.kalman_filter, self.frame_id);
                refind_stracks.push(track);
            }
        }

        // Step 3: second association, with low score detections
        let r_tracked_stracks: Vec<STrack> = unmatched_tracks
            .iter()
            .filter(|&&idx| strack_pool[idx].state == TrackState::Tracked)
            .map(|&idx| strack_pool[idx].clone())
            .collect();

        let r_rects: Vec<Rect> = r_tracked_stracks.iter().map(STrack::rect).collect();
        let det_low_rects: Vec<Rect> = detections_low.iter().map(STrack::rect).collect();
        let dists_second = matching::iou_distance(&r_rects, &det_low_rects);

        let AssignmentResult {
            matches: matches_second,
            unmatched_tracks: unmatched_tracks_second,
            ..
        } = matching::linear_assignment(&dists_second, 0.5);

        for (itracked, idet) in matches_second {
            let mut track = r_tracked_stracks[itracked].clone();
            let det = &detections_low[idet];
            if track.state == TrackState::Tracked {
                track.update(det, &self.kalman_filter, self.frame_id);
                activated_stracks.push(track);
            } else {
                track.re_activate(det, &self.kalman_filter, self.frame_id);
                refind_stracks.push(track);
            }
        }

        for idx in unmatched_tracks_second {
            let mut track = r_tracked_stracks[idx].clone();
            if track.state != TrackState::Lost {
                track.mark_lost();
                lost_stracks.push(track);
            }
        }

        // Unconfirmed tracks, usually tracks with only one beginning frame
        let detections_rem: Vec<STrack> = unmatched_detections
            .iter()
            .map(|&idx| detections_high[idx].clone())
            .collect();

        let unconfirmed_rects: Vec<Rect> = unconfirmed.iter().map(STrack::rect).collect();
        let det_rem_rects: Vec<Rect> = detections_rem.iter().map(STrack::rect).collect();
        let mut dist_unconfirmed = matching::iou_distance(&unconfirmed_rects, &det_rem_rects);
        let det_rem_wrappers: Vec<Detection> = detections_rem
            .iter()
            .map(|t| Detection::from_rect(t.rect(), t.score))
            .collect();
        matching::fuse_score(&mut dist_unconfirmed, &det_rem_wrappers);

        let AssignmentResult {
            matches: matches_unconfirmed,
            unmatched_tracks: unmatched_unconfirmed,
            unmatched_detections: unmatched_new,
        } = matching::linear_assignment(&dist_unconfirmed, 0.7);

        for (itracked, idet) in matches_unconfirmed {
            unconfirmed[itracked].update(&detections_rem[idet], &self.kalman_filter, self.frame_id);
            activated_stracks.push(unconfirmed[itracked].clone());
        }
        for idx in unmatched_unconfirmed {
            unconfirmed[idx].mark_removed();
        }

        // Step 4: init new stracks
        for idx in unmatched_new {
            let mut track = detections_rem[idx].clone();
            if track.score < self.config.track_thresh + 0.1 {
                continue;
            }
            let track_id = self.next_track_id();
            track.activate(&self.kalman_filter, self.frame_id, track_id);
            activated_stracks.push(track);
        }

        // Step 5: update state
        for mut track in self.lost_stracks.drain(..) {
            if self.frame_id - track.end_frame() > self.max_time_lost {
                track.mark_removed();
            } else {
                lost_stracks.push(track);
            }
        }

        self.tracked_stracks = activated_stracks
            .into_iter()
            .chain(refind_stracks)
            .filter(|t| t.state == TrackState::Tracked)
            .collect();

        self.lost_stracks = sub_stracks(lost_stracks, &self.tracked_stracks);

        let (tracked, lost) = remove_duplicate_stracks(&self.tracked_stracks, &self.lost_stracks);
        self.tracked_stracks = tracked;
        self.lost_stracks = lost;

        trace!(
            frame_id = self.frame_id,
            tracked = self.tracked_stracks.len(),
            lost = self.lost_stracks.len(),
            "bytetrack update"
        );

        self.tracked_stracks
            .iter()
            .filter(|t| t.is_activated)
            .cloned()
            .collect()
    }
}

pub fn joint_stracks(tlista: Vec<STrack>, tlistb: &[STrack]) -> Vec<STrack> {
    let mut exists: HashSet<u64> = tlista.iter().map(|t| t.track_id).collect();
    let mut res = tlista;
    for t in tlistb {
        if exists.insert(t.track_id) {
            res.push(t.clone());
        }
    }
    res
}

pub fn sub_stracks(tlista: Vec<STrack>, tlistb: &[STrack]) -> Vec<STrack> {
    let b_ids: HashSet<u64> = tlistb.iter().map(|t| t.track_id).collect();
    tlista
        .into_iter()
        .filter(|t| !b_ids.contains(&t.track_id))
        .collect()
}

/// Drop the younger of any tracked/lost pair that overlaps almost entirely.
pub fn remove_duplicate_stracks(
    stracksa: &[STrack],
    stracksb: &[STrack],
) -> (Vec<STrack>, Vec<STrack>) {
    if stracksa.is_empty() || stracksb.is_empty() {
        return (stracksa.to_vec(), stracksb.to_vec());
    }

    let a_rects: Vec<Rect> = stracksa.iter().map(STrack::rect).collect();
    let b_rects: Vec<Rect> = stracksb.iter().map(STrack::rect).collect();
    let ious = iou_batch(&a_rects, &b_rects);

    let mut dupa = vec![false; stracksa.len()];
    let mut dupb = vec![false; stracksb.len()];

    let (rows, cols) = ious.dim();
    for i in 0..rows {
        for j in 0..cols {
            if ious[[i, j]] > 0.85 {
                let time_a = stracksa[i].frame_id - stracksa[i].start_frame;
                let time_b = stracksb[j].frame_id - stracksb[j].start_frame;
                if time_a > time_b {
                    dupb[j] = true;
                } else {
                    dupa[i] = true;
                }
            }
        }
    }

    let keep = |tracks: &[STrack], dup: &[bool]| {
        tracks
            .iter()
            .zip(dup)
            .filter(|(_, d)| !**d)
            .map(|(t, _)| t.clone())
            .collect()
    };

    (keep(stracksa, &dupa), keep(stracksb, &dupb))
}

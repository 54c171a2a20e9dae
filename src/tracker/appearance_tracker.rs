//! Appearance-assisted tracking in the DeepSORT style.
//!
//! Confirmed tracks are associated by a matching cascade over the cosine
//! distance between their feature gallery and each detection's appearance
//! feature, gated by the Kalman Mahalanobis distance. Whatever is left
//! (tentative tracks and tracks missed for a single frame) falls back to IoU
//! matching. Class ids travel with detections into the tracks.

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::tracker::kalman_filter::KalmanFilter;
use crate::tracker::matching::{self, AssignmentResult};
use crate::tracker::rect::Rect;
use crate::tracker::track_state::ConfirmationState;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppearanceConfig {
    /// Frames a track may go unmatched before it is deleted
    pub max_age: u32,
    /// Consecutive hits needed to confirm a tentative track
    pub n_init: u32,
    pub max_cosine_distance: f32,
    pub max_iou_distance: f32,
    /// Features kept per track; `None` keeps everything
    pub nn_budget: Option<usize>,
}

impl Default for AppearanceConfig {
    fn default() -> Self {
        Self {
            max_age: 30,
            n_init: 3,
            max_cosine_distance: 0.2,
            max_iou_distance: 0.7,
            nn_budget: Some(100),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppearanceDetection {
    pub bbox: Rect,
    pub score: f32,
    pub class_id: u32,
    /// L2-normalised appearance embedding
    pub feature: Option<Array1<f32>>,
}

#[derive(Debug, Clone)]
pub struct AppearanceTrack {
    pub track_id: u64,
    pub state: ConfirmationState,
    pub hits: u32,
    pub age: u32,
    pub time_since_update: u32,
    pub score: f32,
    pub class_id: u32,
    pub mean: Array1<f64>,
    pub covariance: Array2<f64>,
    features: Vec<Array1<f32>>,
}

impl AppearanceTrack {
    fn new(
        detection: AppearanceDetection,
        track_id: u64,
        kalman_filter: &KalmanFilter,
        n_init: u32,
    ) -> Self {
        let (mean, covariance) = kalman_filter.initiate(detection.bbox.to_measurement());
        let state = if n_init <= 1 {
            ConfirmationState::Confirmed
        } else {
            ConfirmationState::Tentative
        };
        Self {
            track_id,
            state,
            hits: 1,
            age: 1,
            time_since_update: 0,
            score: detection.score,
            class_id: detection.class_id,
            mean,
            covariance,
            features: detection.feature.into_iter().collect(),
        }
    }

    /// Filtered box estimate.
    pub fn rect(&self) -> Rect {
        Rect::from_xyah(
            self.mean[0] as f32,
            self.mean[1] as f32,
            self.mean[2] as f32,
            self.mean[3] as f32,
        )
    }

    pub fn is_confirmed(&self) -> bool {
        self.state == ConfirmationState::Confirmed
    }

    pub fn is_deleted(&self) -> bool {
        self.state == ConfirmationState::Deleted
    }

    pub fn features(&self) -> &[Array1<f32>] {
        &self.features
    }

    fn predict(&mut self, kalman_filter: &KalmanFilter) {
        let (mean, covariance) = kalman_filter.predict(&self.mean, &self.covariance);
        self.mean = mean;
        self.covariance = covariance;
        self.age += 1;
        self.time_since_update += 1;
    }

    fn update(
        &mut self,
        detection: &AppearanceDetection,
        config: &AppearanceConfig,
        kf: &KalmanFilter,
    ) {
        let (mean, covariance) =
            kf.update(&self.mean, &self.covariance, detection.bbox.to_measurement());
        self.mean = mean;
        self.covariance = covariance;

        if let Some(feature) = &detection.feature {
            self.features.push(feature.clone());
            if let Some(budget) = config.nn_budget {
                let excess = self.features.len().saturating_sub(budget);
                self.features.drain(..excess);
            }
        }

        self.score = detection.score;
        self.class_id = detection.class_id;
        self.hits += 1;
        self.time_since_update = 0;

        if self.state == ConfirmationState::Tentative && self.hits >= config.n_init {
            self.state = ConfirmationState::Confirmed;
        }
    }

    fn mark_missed(&mut self, max_age: u32) {
        if self.state == ConfirmationState::Tentative || self.time_since_update > max_age {
            self.state = ConfirmationState::Deleted;
        }
    }
}

pub struct AppearanceTracker {
    tracks: Vec<AppearanceTrack>,
    next_id: u64,
    config: AppearanceConfig,
    kalman_filter: KalmanFilter,
}

impl AppearanceTracker {
    pub fn new(config: AppearanceConfig) -> Self {
        Self {
            tracks: Vec::new(),
            next_id: 0,
            config,
            kalman_filter: KalmanFilter::default(),
        }
    }

    pub fn config(&self) -> &AppearanceConfig {
        &self.config
    }

    /// Advance one frame. Returns every live track, tentative ones included.
    pub fn update(&mut self, detections: Vec<AppearanceDetection>) -> Vec<AppearanceTrack> {
        for track in &mut self.tracks {
            track.predict(&self.kalman_filter);
        }

        let AssignmentResult {
            matches,
            unmatched_tracks,
            unmatched_detections,
        } = self.associate(&detections);

        for (itrack, idet) in matches {
            self.tracks[itrack].update(&detections[idet], &self.config, &self.kalman_filter);
        }
        for itrack in unmatched_tracks {
            self.tracks[itrack].mark_missed(self.config.max_age);
        }

        let mut detections: Vec<Option<AppearanceDetection>> =
            detections.into_iter().map(Some).collect();
        for idet in unmatched_detections {
            if let Some(detection) = detections[idet].take() {
                self.next_id += 1;
                self.tracks.push(AppearanceTrack::new(
                    detection,
                    self.next_id,
                    &self.kalman_filter,
                    self.config.n_init,
                ));
            }
        }

        self.tracks.retain(|t| !t.is_deleted());

        trace!(
            tracks = self.tracks.len(),
            confirmed = self.tracks.iter().filter(|t| t.is_confirmed()).count(),
            "appearance update"
        );

        self.tracks.clone()
    }

    fn associate(&self, detections: &[AppearanceDetection]) -> AssignmentResult {
        let (confirmed, unconfirmed): (Vec<usize>, Vec<usize>) =
            (0..self.tracks.len()).partition(|&i| self.tracks[i].is_confirmed());

        // Matching cascade: most recently updated tracks pick first.
        let mut unmatched_dets: Vec<usize> = (0..detections.len()).collect();
        let mut matches = Vec::new();
        for level in 0..self.config.max_age {
            if unmatched_dets.is_empty() {
                break;
            }
            let level_tracks: Vec<usize> = confirmed
                .iter()
                .copied()
                .filter(|&i| self.tracks[i].time_since_update == level + 1)
                .collect();
            if level_tracks.is_empty() {
                continue;
            }

            let cost = self.appearance_cost(&level_tracks, &unmatched_dets, detections);
            let result = matching::linear_assignment(&cost, self.config.max_cosine_distance);
            matches.extend(
                result
                    .matches
                    .iter()
                    .map(|&(r, c)| (level_tracks[r], unmatched_dets[c])),
            );
            unmatched_dets = result
                .unmatched_detections
                .iter()
                .map(|&c| unmatched_dets[c])
                .collect();
        }

        let matched_tracks: Vec<usize> = matches.iter().map(|&(t, _)| t).collect();
        let cascade_leftovers: Vec<usize> = confirmed
            .iter()
            .copied()
            .filter(|i| !matched_tracks.contains(i))
            .collect();

        // IoU fallback for tentative tracks and tracks missed this frame only.
        let (iou_tracks, stale): (Vec<usize>, Vec<usize>) = cascade_leftovers
            .into_iter()
            .partition(|&i| self.tracks[i].time_since_update == 1);
        let iou_tracks: Vec<usize> = unconfirmed.into_iter().chain(iou_tracks).collect();

        let track_rects: Vec<Rect> = iou_tracks.iter().map(|&i| self.tracks[i].rect()).collect();
        let det_rects: Vec<Rect> = unmatched_dets.iter().map(|&j| detections[j].bbox).collect();
        let cost = matching::iou_distance(&track_rects, &det_rects);
        let result = matching::linear_assignment(&cost, self.config.max_iou_distance);

        matches.extend(
            result
                .matches
                .iter()
                .map(|&(r, c)| (iou_tracks[r], unmatched_dets[c])),
        );

        let unmatched_tracks = stale
            .into_iter()
            .chain(result.unmatched_tracks.iter().map(|&r| iou_tracks[r]))
            .collect();
        let unmatched_detections = result
            .unmatched_detections
            .iter()
            .map(|&c| unmatched_dets[c])
            .collect();

        AssignmentResult {
            matches,
            unmatched_tracks,
            unmatched_detections,
        }
    }

    fn appearance_cost(
        &self,
        track_indices: &[usize],
        det_indices: &[usize],
        detections: &[AppearanceDetection],
    ) -> Array2<f32> {
        let galleries: Vec<&[Array1<f32>]> = track_indices
            .iter()
            .map(|&i| self.tracks[i].features())
            .collect();
        let dim = galleries
            .iter()
            .flat_map(|g| g.first())
            .map(|f| f.len())
            .next()
            .unwrap_or(0);
        let features: Vec<Array1<f32>> = det_indices
            .iter()
            .map(|&j| {
                detections[j]
                    .feature
                    .clone()
                    .unwrap_or_else(|| Array1::zeros(dim))
            })
            .collect();

        let mut cost = matching::cosine_distance(&galleries, &features);

        let states: Vec<(&Array1<f64>, &Array2<f64>)> = track_indices
            .iter()
            .map(|&i| (&self.tracks[i].mean, &self.tracks[i].covariance))
            .collect();
        let measurements: Vec<[f64; 4]> = det_indices
            .iter()
            .map(|&j| detections[j].bbox.to_measurement())
            .collect();
        matching::gate_cost_matrix(&mut cost, &self.kalman_filter, &states, &measurements);

        cost
    }
}

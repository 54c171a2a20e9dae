//! Single object track (STrack) of the motion tracker.

use ndarray::{Array1, Array2};

use crate::tracker::kalman_filter::KalmanFilter;
use crate::tracker::rect::Rect;
use crate::tracker::track_state::TrackState;

#[derive(Debug, Clone)]
pub struct STrack {
    /// Identifier assigned on activation, unique within one tracker
    pub track_id: u64,
    pub state: TrackState,
    /// Whether the track has been activated (confirmed)
    pub is_activated: bool,
    /// Score of the detection last associated with the track
    pub score: f32,
    /// Frame of the last association
    pub frame_id: u32,
    pub start_frame: u32,
    pub tracklet_len: u32,
    /// Kalman filter state mean (8-dim)
    pub mean: Option<Array1<f64>>,
    /// Kalman filter state covariance (8x8)
    pub covariance: Option<Array2<f64>>,
    /// Detection box the track was created from (TLWH)
    pub tlwh: Rect,
}

impl STrack {
    pub fn new(tlwh: Rect, score: f32) -> Self {
        Self {
            track_id: 0,
            state: TrackState::New,
            is_activated: false,
            score,
            frame_id: 0,
            start_frame: 0,
            tracklet_len: 0,
            mean: None,
            covariance: None,
            tlwh,
        }
    }

    /// Current box: the filtered estimate once activated, the raw detection before.
    pub fn rect(&self) -> Rect {
        match &self.mean {
            Some(mean) => Rect::from_xyah(
                mean[0] as f32,
                mean[1] as f32,
                mean[2] as f32,
                mean[3] as f32,
            ),
            None => self.tlwh,
        }
    }

    pub fn end_frame(&self) -> u32 {
        self.frame_id
    }

    /// Start a new tracklet. Only tracks born on the very first frame are
    /// activated immediately; the rest wait for a second association.
    pub fn activate(&mut self, kalman_filter: &KalmanFilter, frame_id: u32, track_id: u64) {
        self.track_id = track_id;

        let (mean, covariance) = kalman_filter.initiate(self.tlwh.to_measurement());
        self.mean = Some(mean);
        self.covariance = Some(covariance);
        self.tracklet_len = 0;
        self.state = TrackState::Tracked;

        if frame_id == 1 {
            self.is_activated = true;
        }

        self.frame_id = frame_id;
        self.start_frame = frame_id;
    }

    pub fn re_activate(&mut self, new_track: &STrack, kalman_filter: &KalmanFilter, frame_id: u32) {
        self.correct(new_track, kalman_filter);

        self.tracklet_len = 0;
        self.state = TrackState::Tracked;
        self.is_activated = true;
        self.frame_id = frame_id;
        self.score = new_track.score;
    }

    pub fn update(&mut self, new_track: &STrack, kalman_filter: &KalmanFilter, frame_id: u32) {
        self.frame_id = frame_id;
        self.tracklet_len += 1;

        self.correct(new_track, kalman_filter);

        self.state = TrackState::Tracked;
        self.is_activated = true;
        self.score = new_track.score;
    }

    fn correct(&mut self, new_track: &STrack, kalman_filter: &KalmanFilter) {
        if let (Some(mean), Some(cov)) = (&self.mean, &self.covariance) {
            let (new_mean, new_cov) =
                kalman_filter.update(mean, cov, new_track.tlwh.to_measurement());
            self.mean = Some(new_mean);
            self.covariance = Some(new_cov);
        }
    }

    pub fn predict(&mut self, kalman_filter: &KalmanFilter) {
        if let (Some(mean), Some(cov)) = (&self.mean, &self.covariance) {
            let mut mean_to_predict = mean.clone();
            if self.state != TrackState::Tracked {
                mean_to_predict[7] = 0.0;
            }
            let (new_mean, new_cov) = kalman_filter.predict(&mean_to_predict, cov);
            self.mean = Some(new_mean);
            self.covariance = Some(new_cov);
        }
    }

    pub fn mark_lost(&mut self) {
        self.state = TrackState::Lost;
    }

    pub fn mark_removed(&mut self) {
        self.state = TrackState::Removed;
    }

    pub fn multi_predict(stracks: &mut [STrack], kalman_filter: &KalmanFilter) {
        for strack in stracks.iter_mut() {
            strack.predict(kalman_filter);
        }
    }
}

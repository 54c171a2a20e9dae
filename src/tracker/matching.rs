//! Cost matrices and assignment shared by the tracking backends.

use crate::tracker::kalman_filter::{CHI2_INV_95_4DOF, KalmanFilter};
use crate::tracker::rect::Rect;
use ndarray::{Array1, Array2};

/// Cost assigned to associations that must never be made.
pub const INFTY_COST: f32 = 1e5;

/// Detection input for the motion tracker: a box and a score, no class.
#[derive(Debug, Clone)]
pub struct Detection {
    /// Bounding box, built from TLBR (x1, y1, x2, y2)
    pub bbox: Rect,
    pub score: f32,
}

impl Detection {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32, score: f32) -> Self {
        Self {
            bbox: Rect::from_tlbr(x1, y1, x2, y2),
            score,
        }
    }

    pub fn from_rect(bbox: Rect, score: f32) -> Self {
        Self { bbox, score }
    }
}

/// IoU distance matrix between tracks and detections.
pub fn iou_distance(track_boxes: &[Rect], det_boxes: &[Rect]) -> Array2<f32> {
    let mut dists = Array2::zeros((track_boxes.len(), det_boxes.len()));
    for (i, t) in track_boxes.iter().enumerate() {
        for (j, d) in det_boxes.iter().enumerate() {
            dists[[i, j]] = 1.0 - t.iou(d);
        }
    }
    dists
}

/// Smallest cosine distance between each track's feature gallery and each
/// detection feature. Features are expected to be L2-normalised.
pub fn cosine_distance(galleries: &[&[Array1<f32>]], features: &[Array1<f32>]) -> Array2<f32> {
    let mut dists = Array2::from_elem((galleries.len(), features.len()), 1.0);
    for (i, gallery) in galleries.iter().enumerate() {
        for (j, feature) in features.iter().enumerate() {
            let best = gallery
                .iter()
                .map(|g| 1.0 - g.dot(feature))
                .fold(f32::INFINITY, f32::min);
            if best.is_finite() {
                dists[[i, j]] = best;
            }
        }
    }
    dists
}

/// Invalidate entries whose Kalman gating distance exceeds the 95% chi-square bound.
pub fn gate_cost_matrix(
    cost_matrix: &mut Array2<f32>,
    kalman_filter: &KalmanFilter,
    states: &[(&Array1<f64>, &Array2<f64>)],
    measurements: &[[f64; 4]],
) {
    for (i, (mean, covariance)) in states.iter().enumerate() {
        let gating = kalman_filter.gating_distance(mean, covariance, measurements);
        for (j, d) in gating.into_iter().enumerate() {
            if d > CHI2_INV_95_4DOF {
                cost_matrix[[i, j]] = INFTY_COST;
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct AssignmentResult {
    pub matches: Vec<(usize, usize)>,
    pub unmatched_tracks: Vec<usize>,
    pub unmatched_detections: Vec<usize>,
}

/// Solve the rectangular assignment with lapjv, rejecting pairs costing more than `thresh`.
pub fn linear_assignment(cost_matrix: &Array2<f32>, thresh: f32) -> AssignmentResult {
    let (num_rows, num_cols) = cost_matrix.dim();

    if num_rows == 0 {
        return AssignmentResult {
            matches: vec![],
            unmatched_tracks: vec![],
            unmatched_detections: (0..num_cols).collect(),
        };
    }

    if num_cols == 0 {
        return AssignmentResult {
            matches: vec![],
            unmatched_tracks: (0..num_rows).collect(),
            unmatched_detections: vec![],
        };
    }

    let size = num_rows.max(num_cols);
    let mut padded = Array2::<f64>::from_elem((size, size), 1e6);
    for i in 0..num_rows {
        for j in 0..num_cols {
            padded[[i, j]] = cost_matrix[[i, j]] as f64;
        }
    }

    let mut matches = vec![];
    let mut unmatched_tracks = vec![];
    let mut unmatched_detections_mask = vec![true; num_cols];

    match lapjv::lapjv(&padded) {
        Ok((row_to_col, _)) => {
            for (row_idx, &col_idx) in row_to_col.iter().enumerate().take(num_rows) {
                if col_idx < num_cols && cost_matrix[[row_idx, col_idx]] <= thresh {
                    matches.push((row_idx, col_idx));
                    unmatched_detections_mask[col_idx] = false;
                } else {
                    unmatched_tracks.push(row_idx);
                }
            }
        }
        Err(_) => {
            unmatched_tracks = (0..num_rows).collect();
        }
    }

    let unmatched_detections = unmatched_detections_mask
        .iter()
        .enumerate()
        .filter_map(|(i, &u)| u.then_some(i))
        .collect();

    AssignmentResult {
        matches,
        unmatched_tracks,
        unmatched_detections,
    }
}

/// Blend detection confidence into an IoU distance matrix.
pub fn fuse_score(cost_matrix: &mut Array2<f32>, detections: &[Detection]) {
    let (rows, cols) = cost_matrix.dim();
    for i in 0..rows {
        for j in 0..cols {
            let iou_sim = 1.0 - cost_matrix[[i, j]];
            cost_matrix[[i, j]] = 1.0 - iou_sim * detections[j].score;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_linear_assignment_threshold() {
        let cost = array![[0.1, 0.9], [0.8, 0.95]];
        let result = linear_assignment(&cost, 0.5);
        assert_eq!(result.matches, vec![(0, 0)]);
        assert_eq!(result.unmatched_tracks, vec![1]);
        assert_eq!(result.unmatched_detections, vec![1]);
    }

    #[test]
    fn test_linear_assignment_empty() {
        let cost = Array2::<f32>::zeros((0, 3));
        let result = linear_assignment(&cost, 0.5);
        assert_eq!(result.unmatched_detections, vec![0, 1, 2]);
    }

    #[test]
    fn test_cosine_distance_takes_best_gallery_entry() {
        let a = array![1.0_f32, 0.0];
        let b = array![0.0_f32, 1.0];
        let gallery = vec![a.clone(), b.clone()];
        let empty: Vec<Array1<f32>> = vec![];

        let d = cosine_distance(&[gallery.as_slice(), empty.as_slice()], &[b]);
        assert!(d[[0, 0]].abs() < 1e-6);
        assert_eq!(d[[1, 0]], 1.0);
    }
}

use crossline_rs::integration::{DetectionBatch, DetectionBuilder, Frame};
use crossline_rs::tracker::{AppearanceConfig, BYTETracker, Detection, TrackerConfig};
use crossline_rs::tracking::{LabelMatching, TrackerManager, TrackingConfig};

const CAR: u32 = 2;
const PERSON: u32 = 0;

fn batch(entries: &[([f32; 4], f32, u32)]) -> DetectionBatch {
    entries
        .iter()
        .map(|&(b, s, l)| {
            DetectionBuilder::new()
                .tlbr(b[0], b[1], b[2], b[3])
                .score(s)
                .label(l)
                .build()
        })
        .collect()
}

#[test]
fn test_basic_tracking() {
    let mut tracker = BYTETracker::new(TrackerConfig::default());

    // Frame 1: 0.9 clears track_thresh + 0.1, activated on the first frame
    let tracks1 = tracker.update(vec![Detection::new(100.0, 100.0, 200.0, 200.0, 0.9)]);
    assert_eq!(tracks1.len(), 1);
    let id1 = tracks1[0].track_id;
    assert_eq!(id1, 1);

    // Frame 2: Same object moved slightly
    let tracks2 = tracker.update(vec![Detection::new(105.0, 105.0, 205.0, 205.0, 0.9)]);
    assert_eq!(tracks2.len(), 1);
    assert_eq!(tracks2[0].track_id, id1);

    // Frame 3: low score, recovered by the second association
    let tracks3 = tracker.update(vec![Detection::new(110.0, 110.0, 210.0, 210.0, 0.2)]);
    assert_eq!(tracks3.len(), 1);
    assert_eq!(tracks3[0].track_id, id1);

    // Frame 4: Object disappears
    let tracks4 = tracker.update(vec![]);
    assert_eq!(tracks4.len(), 0);

    // Frame 5: refound within the track buffer
    let tracks5 = tracker.update(vec![Detection::new(115.0, 115.0, 215.0, 215.0, 0.9)]);
    assert_eq!(tracks5.len(), 1);
    assert_eq!(tracks5[0].track_id, id1);
}

#[test]
fn test_track_ids_are_per_tracker() {
    let mut a = BYTETracker::new(TrackerConfig::default());
    let mut b = BYTETracker::new(TrackerConfig::default());

    let ta = a.update(vec![Detection::new(0.0, 0.0, 50.0, 50.0, 0.9)]);
    let tb = b.update(vec![Detection::new(0.0, 0.0, 50.0, 50.0, 0.9)]);
    assert_eq!(ta[0].track_id, tb[0].track_id);
}

#[test]
fn test_manager_keeps_best_label_through_misclassification() {
    let mut manager =
        TrackerManager::new("bytetrack", &TrackingConfig::default(), 30.0, 1).unwrap();
    let frame = Frame::blank(640, 480);

    let t1 = manager
        .update(&frame, &batch(&[([100.0, 100.0, 200.0, 200.0], 0.9, CAR)]))
        .unwrap();
    assert_eq!(t1[0].class_id, Some(CAR));

    // A weaker one-frame misclassification does not flip the class.
    let t2 = manager
        .update(&frame, &batch(&[([104.0, 100.0, 204.0, 200.0], 0.7, PERSON)]))
        .unwrap();
    assert_eq!(t2[0].track_id, t1[0].track_id);
    assert_eq!(t2[0].class_id, Some(CAR));
}

#[test]
fn test_manager_iou_label_matching() {
    let config = TrackingConfig {
        labels: LabelMatching::Iou { min_iou: 0.5 },
        ..TrackingConfig::default()
    };
    let mut manager = TrackerManager::new("bytetrack", &config, 30.0, 1).unwrap();

    let tracks = manager
        .update(
            &Frame::blank(640, 480),
            &batch(&[
                ([100.0, 100.0, 200.0, 200.0], 0.9, CAR),
                ([400.0, 100.0, 450.0, 220.0], 0.8, PERSON),
            ]),
        )
        .unwrap();

    assert_eq!(tracks.len(), 2);
    for track in &tracks {
        let expected = if track.ltrb()[0] < 300.0 { CAR } else { PERSON };
        assert_eq!(track.class_id, Some(expected));
    }
}

#[test]
fn test_appearance_confirmation_latency() {
    let config = TrackingConfig {
        deepsort: AppearanceConfig {
            n_init: 3,
            ..AppearanceConfig::default()
        },
        ..TrackingConfig::default()
    };
    let mut manager = TrackerManager::new("deepsort", &config, 30.0, 1).unwrap();

    let mut confirmed = Vec::new();
    for step in 0..4 {
        let x = 100.0 + step as f32 * 4.0;
        let mut frame = Frame::blank(320, 240);
        frame.fill_rect(x as u32, 80, x as u32 + 40, 160, [20, 200, 20]);

        let tracks = manager
            .update(&frame, &batch(&[([x, 80.0, x + 40.0, 160.0], 0.85, PERSON)]))
            .unwrap();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].class_id, Some(PERSON));
        confirmed.push(tracks[0].is_confirmed);
    }

    assert_eq!(confirmed, vec![false, false, true, true]);
}

#[test]
fn test_manager_without_source_rate_survives_dropout() {
    let mut manager =
        TrackerManager::new("bytetrack", &TrackingConfig::default(), 0.0, 1).unwrap();
    let frame = Frame::blank(640, 480);
    let car_a = ([100.0, 100.0, 200.0, 200.0], 0.9, CAR);
    let car_b = ([400.0, 100.0, 500.0, 200.0], 0.9, CAR);

    let first = manager.update(&frame, &batch(&[car_a, car_b])).unwrap();
    let id_a = first.iter().find(|t| t.ltrb()[0] < 300.0).unwrap().track_id;

    // A is occluded for two frames while B stays visible.
    for _ in 0..2 {
        manager.update(&frame, &batch(&[car_b])).unwrap();
    }

    let back = manager.update(&frame, &batch(&[car_a, car_b])).unwrap();
    assert_eq!(back.len(), 2);
    assert!(back.iter().any(|t| t.track_id == id_a));
}

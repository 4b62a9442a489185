//! End-to-end scenarios through `AnalysisEngine`

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use proptest::prelude::*;

use posecoach::config::SessionConfig;
use posecoach::pose::LandmarkIndex;
use posecoach::{AnalysisEngine, Config, EngineError, Landmark, LandmarkPassthrough, Pose, PoseSource};

/// Side-on squat pose with both knees bent to `knee_deg`
fn squat_pose(knee_deg: f32, visibility: f32) -> Pose {
    let mut landmarks = vec![Landmark::default(); LandmarkIndex::COUNT];
    let theta = (180.0 - knee_deg).to_radians();
    let hip = (0.5, 0.5);
    let knee = (0.5, 0.7);
    let ankle = (knee.0 - 0.2 * theta.sin(), knee.1 + 0.2 * theta.cos());
    let sides = [
        (LandmarkIndex::LeftShoulder, LandmarkIndex::LeftHip, LandmarkIndex::LeftKnee, LandmarkIndex::LeftAnkle),
        (LandmarkIndex::RightShoulder, LandmarkIndex::RightHip, LandmarkIndex::RightKnee, LandmarkIndex::RightAnkle),
    ];
    for (s, h, k, a) in sides {
        landmarks[s.index()] = Landmark::new(0.5, 0.25, 0.0, visibility);
        landmarks[h.index()] = Landmark::new(hip.0, hip.1, 0.0, visibility);
        landmarks[k.index()] = Landmark::new(knee.0, knee.1, 0.0, visibility);
        landmarks[a.index()] = Landmark::new(ankle.0, ankle.1, 0.0, visibility);
    }
    Pose::new(landmarks)
}

fn engine() -> AnalysisEngine<LandmarkPassthrough> {
    AnalysisEngine::new(Config::default(), LandmarkPassthrough).unwrap()
}

#[test]
fn test_identical_frames_hit_cache() {
    let engine = engine();
    let id = engine.start_session_at("u1", "squat", 0).unwrap();
    let pose = squat_pose(170.0, 0.95);

    let mut results = Vec::new();
    for i in 0..5u64 {
        results.push(engine.submit_frame(id, pose.clone(), i * 33).unwrap().unwrap());
    }

    let stats = engine.performance_stats();
    assert_eq!(stats.cache_misses, 1);
    assert_eq!(stats.cache_hits, 4);
    assert_eq!(stats.frames_processed, 5);
    assert_eq!(engine.session_history(id).unwrap().len(), 5);

    assert!(!results[0].from_cache);
    assert!(results[1..].iter().all(|r| r.from_cache));
    assert!(results.iter().all(|r| r.form_score == results[0].form_score));
    assert_eq!(results[4].timestamp_ms, 132);
}

#[test]
fn test_empty_session_summary() {
    let engine = engine();
    let id = engine.start_session("u1", "squat").unwrap();
    let summary = engine.end_session(id).unwrap();
    assert_eq!(summary.total_reps, 0);
    assert_eq!(summary.average_score, 0.0);
    assert_eq!(summary.user_id, "u1");
    assert!(!summary.next_session_recommendations.is_empty());

    // ended sessions are gone
    assert!(matches!(engine.end_session(id), Err(EngineError::SessionNotFound { .. })));
}

#[test]
fn test_unknown_exercise_is_configuration_error() {
    let engine = engine();
    let err = engine.start_session("u1", "burpee").unwrap_err();
    assert!(matches!(err, EngineError::Configuration { .. }));
    assert!(err.to_string().contains("squat"));

    let id = engine.start_session("u1", "squat").unwrap();
    let err = engine.set_active_exercise(id, "burpee").unwrap_err();
    assert!(matches!(err, EngineError::Configuration { .. }));
}

#[test]
fn test_unknown_session() {
    let engine = engine();
    let other = engine_with_session_removed(&engine);
    let err = engine.submit_frame(other, Pose::default(), 0).unwrap_err();
    assert!(matches!(err, EngineError::SessionNotFound { .. }));
    assert!(engine.analysis(other).is_err());
}

fn engine_with_session_removed(engine: &AnalysisEngine<LandmarkPassthrough>) -> posecoach::SessionId {
    let id = engine.start_session("u1", "squat").unwrap();
    engine.end_session(id).unwrap();
    id
}

#[test]
fn test_supported_exercises() {
    let names = engine().supported_exercises();
    assert_eq!(
        names,
        vec!["bench_press", "deadlift", "lunge", "plank", "pull_up", "push_up", "squat"]
    );
}

#[test]
fn test_squat_rep_counted_end_to_end() {
    let mut config = Config::default();
    config.cache.enabled = false;
    let engine = AnalysisEngine::new(config, LandmarkPassthrough).unwrap();
    let id = engine.start_session_at("u1", "squat", 0).unwrap();

    let mut ts = 0;
    let mut submit = |knee: f32, frames: usize| {
        let mut last = None;
        for _ in 0..frames {
            ts += 40;
            last = engine.submit_frame(id, squat_pose(knee, 0.95), ts).unwrap();
        }
        last
    };
    submit(170.0, 5);
    submit(90.0, 8);
    let last = submit(170.0, 8).unwrap();
    assert_eq!(last.rep_count, 1);

    let analysis = engine.analysis(id).unwrap();
    assert_eq!(analysis.repetition_analysis.total_reps, 1);

    // switching exercise keeps the count
    engine.set_active_exercise(id, "lunge").unwrap();
    let summary = engine.end_session(id).unwrap();
    assert_eq!(summary.total_reps, 1);
    assert_eq!(summary.exercise_type, "lunge");
}

/// Every rep after the first replays the first rep's poses, so most frames
/// are cache hits
#[test]
fn test_reps_counted_through_cache_hits() {
    let engine = engine();
    let id = engine.start_session_at("u1", "squat", 0).unwrap();

    let mut ts = 0;
    let mut last = None;
    let held: Vec<(f32, usize)> = vec![(170.0, 5), (90.0, 8), (170.0, 8)];
    let continuous: Vec<(f32, usize)> = (0..=18)
        .map(|i| (170.0 - 5.0 * i as f32, 1))
        .chain((1..=18).map(|i| (80.0 + 5.0 * i as f32, 1)))
        .chain([(170.0, 4)])
        .collect();
    for rep in [&held, &held, &continuous, &continuous] {
        for &(knee, frames) in rep.iter() {
            for _ in 0..frames {
                ts += 40;
                last = engine.submit_frame(id, squat_pose(knee, 0.95), ts).unwrap();
            }
        }
    }

    let last = last.unwrap();
    assert!(last.from_cache);
    assert_eq!(last.rep_count, 4);
    let stats = engine.performance_stats();
    assert!(stats.cache_hits > stats.cache_misses);
    assert_eq!(engine.analysis(id).unwrap().repetition_analysis.total_reps, 4);
    assert_eq!(engine.end_session(id).unwrap().total_reps, 4);
}

/// Blocks in `evaluate` while the test holds the gate
struct GatedSource {
    gate: Arc<Mutex<()>>,
}

impl PoseSource for GatedSource {
    type Frame = u64;

    fn evaluate(&self, frame: &u64) -> anyhow::Result<Pose> {
        let _open = self.gate.lock();
        Ok(squat_pose(150.0 + (*frame % 20) as f32, 0.95))
    }
}

#[test]
fn test_backpressure_drops_and_supersedes() {
    let gate = Arc::new(Mutex::new(()));
    let engine = Arc::new(
        AnalysisEngine::new(Config::default(), GatedSource { gate: Arc::clone(&gate) }).unwrap(),
    );
    let id = engine.start_session_at("u1", "squat", 0).unwrap();

    // completes right away and sets the budget reference near t=0
    let first = engine.submit_frame(id, 0, 0).unwrap().unwrap();
    assert_eq!(first.timestamp_ms, 0);

    let held = gate.lock();
    let worker = {
        let engine = Arc::clone(&engine);
        thread::spawn(move || engine.submit_frame(id, 1, 100))
    };
    while !engine.is_evaluating() {
        thread::sleep(Duration::from_millis(1));
    }

    // in flight and inside the 16ms budget: dropped, latest result returned
    let before = engine.performance_stats().frames_skipped;
    let r = engine.submit_frame(id, 2, 5).unwrap().unwrap();
    assert_eq!(r.timestamp_ms, 0);
    assert_eq!(engine.performance_stats().frames_skipped, before + 1);
    engine.submit_frame(id, 3, 8).unwrap();
    assert_eq!(engine.performance_stats().frames_skipped, before + 2);

    // past the budget: queued, newest wins
    engine.submit_frame(id, 4, 60).unwrap();
    engine.submit_frame(id, 5, 70).unwrap();
    assert_eq!(engine.performance_stats().frames_superseded, 1);

    drop(held);
    worker.join().unwrap().unwrap();

    let stats = engine.performance_stats();
    // frame 0, the blocked frame 1, then frame 5 drained from the slot
    assert_eq!(stats.frames_processed, 3);
    assert_eq!(stats.frames_skipped, 2);
    let history = engine.session_history(id).unwrap();
    let stamps: Vec<u64> = history.iter().map(|r| r.timestamp_ms).collect();
    assert_eq!(stamps, vec![0, 100, 70]);
    assert!(!engine.is_evaluating());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_results_stay_in_bounds(
        frames in prop::collection::vec((10.0f32..180.0, 0.0f32..1.0), 1..60)
    ) {
        let mut config = Config::default();
        config.session = SessionConfig {
            history_cap: 20,
            history_keep: 10,
            ..SessionConfig::default()
        };
        let engine = AnalysisEngine::new(config, LandmarkPassthrough).unwrap();
        let id = engine.start_session_at("u1", "squat", 0).unwrap();

        let mut last_reps = 0;
        for (i, (knee, visibility)) in frames.into_iter().enumerate() {
            let result = engine
                .submit_frame(id, squat_pose(knee, visibility), i as u64 * 33)
                .unwrap()
                .unwrap();
            prop_assert!((0.0..=100.0).contains(&result.form_score));
            prop_assert!((0.0..=100.0).contains(&result.confidence));
            prop_assert!(result.rep_count >= last_reps);
            last_reps = result.rep_count;
            prop_assert!(engine.session_history(id).unwrap().len() <= 20);
        }

        let analysis = engine.analysis(id).unwrap();
        prop_assert!((0.0..=100.0).contains(&analysis.overall_score));
        prop_assert!((0.0..=100.0).contains(&analysis.repetition_analysis.consistency_score));
    }
}

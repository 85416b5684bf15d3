//! Snapshot, recording and replay tests driven by the CPU engine

use glam::Vec3;
use rand::rngs::StdRng;
use rand::SeedableRng;
use starfield_persistence::{
    load_snapshot, save_snapshot, PersistenceError, PersistenceSession, SaveDirectories,
    SessionMode, StreamBoundary, StreamLayout, StreamRecorder, StreamReplayer,
};
use starfield_physics::{PointMassState, SimulationState};
use starfield_simulation::{
    CpuSimulation, SimulationError, SimulationParams, StateExchange, StreamActivity, StreamLock,
};
use std::fs;
use std::path::PathBuf;

/// Fresh, empty directory unique to this test
fn scratch_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("starfield-{tag}-{}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn engine(num_masses: usize, seed: u64) -> CpuSimulation {
    let mut rng = StdRng::seed_from_u64(seed);
    let state = SimulationState::disc(num_masses, &mut rng);
    CpuSimulation::new(&state, SimulationParams::default()).unwrap()
}

/// Record `frames` frames, stepping between each, and return what was recorded
fn record(path: &std::path::Path, sim: &mut CpuSimulation, frames: usize) -> Vec<SimulationState> {
    let mut recorder = StreamRecorder::create(path, sim).unwrap();
    let mut recorded = Vec::new();
    for _ in 0..frames {
        recorder.record_step(sim).unwrap();
        recorded.push(sim.simulation_state().unwrap());
        sim.step(0.001);
    }
    assert_eq!(recorder.finish().unwrap(), frames as u64);
    recorded
}

fn assert_matches_recording(replayed: &SimulationState, recorded: &SimulationState) {
    assert_eq!(replayed.num_masses(), recorded.num_masses());
    for (r, o) in replayed.masses().iter().zip(recorded.masses()) {
        assert_eq!(r.mass, o.mass);
        assert_eq!(r.position, o.position);
        assert_eq!(r.velocity, [o.speed(), 0.0, 0.0]);
        assert_eq!(r.acceleration, [0.0; 3]);
    }
}

#[test]
fn snapshot_round_trip_is_byte_exact() {
    let dir = scratch_dir("snapshot");
    let path = dir.join("state.simstate");

    let mut sim = engine(64, 1);
    sim.step(0.01);
    let state = sim.simulation_state().unwrap();

    save_snapshot(&sim, &path).unwrap();
    assert_eq!(fs::read(&path).unwrap(), state.as_bytes());
    assert_eq!(load_snapshot(&path).unwrap(), state);
}

#[test]
fn snapshot_of_wrong_length_is_rejected() {
    let dir = scratch_dir("snapshot-bad");
    let path = dir.join("bad.simstate");
    fs::write(&path, [0u8; 41]).unwrap();

    assert!(matches!(
        load_snapshot(&path),
        Err(PersistenceError::Format { .. })
    ));
}

#[test]
fn missing_files_are_not_io_errors() {
    let dir = scratch_dir("missing");
    let mut sim = engine(4, 2);

    assert!(matches!(
        load_snapshot(&dir.join("nope.simstate")),
        Err(PersistenceError::FileNotFound { .. })
    ));
    assert!(matches!(
        StreamReplayer::open(&dir.join("nope.simstream"), &mut sim),
        Err(PersistenceError::FileNotFound { .. })
    ));
}

#[test]
fn stream_file_has_expected_size() {
    let dir = scratch_dir("stream-size");
    let path = dir.join("run.simstream");
    let mut sim = engine(10, 3);
    record(&path, &mut sim, 7);

    let layout = StreamLayout::new(10);
    let len = fs::metadata(&path).unwrap().len();
    assert_eq!(len, 4 + 4 * 10 + 16 * 10 * 7);
    assert_eq!(layout.frame_count(len), 7);
}

#[test]
fn forward_replay_reproduces_recording() {
    let dir = scratch_dir("forward");
    let path = dir.join("run.simstream");
    let mut sim = engine(16, 4);
    let recorded = record(&path, &mut sim, 5);

    // Replay into an engine of a different size; it is resized to the stream
    let mut target = engine(3, 5);
    let mut replayer = StreamReplayer::open(&path, &mut target).unwrap();
    assert_eq!(replayer.step(), 1);
    assert_eq!(replayer.current_frame(), Some(0));
    assert_eq!(target.num_masses(), 16);
    assert_matches_recording(&target.simulation_state().unwrap(), &recorded[0]);

    for frame in recorded.iter().skip(1) {
        replayer.update(&mut target).unwrap();
        assert_matches_recording(&target.simulation_state().unwrap(), frame);
    }
    assert_eq!(replayer.current_frame(), Some(4));

    // Last frame with step 1 hits the end and pauses
    let before = target.simulation_state().unwrap();
    let err = replayer.update(&mut target).unwrap_err();
    assert!(matches!(
        err,
        PersistenceError::StreamBoundary(StreamBoundary::End)
    ));
    assert!(err.is_stream_boundary());
    assert_eq!(replayer.step(), 0);
    assert_eq!(replayer.current_frame(), Some(4));
    assert_eq!(target.simulation_state().unwrap(), before);

    // Paused updates are no-ops
    replayer.update(&mut target).unwrap();
    assert_eq!(replayer.current_frame(), Some(4));
}

#[test]
fn reverse_and_skipping_replay() {
    let dir = scratch_dir("reverse");
    let path = dir.join("run.simstream");
    let mut sim = engine(8, 6);
    let recorded = record(&path, &mut sim, 6);

    let mut target = engine(8, 7);
    let mut replayer = StreamReplayer::open(&path, &mut target).unwrap();

    replayer.set_step(3);
    replayer.update(&mut target).unwrap();
    assert_eq!(replayer.current_frame(), Some(3));
    assert_matches_recording(&target.simulation_state().unwrap(), &recorded[3]);

    replayer.set_step(-1);
    replayer.update(&mut target).unwrap();
    assert_eq!(replayer.current_frame(), Some(2));
    assert_matches_recording(&target.simulation_state().unwrap(), &recorded[2]);

    replayer.set_step(-2);
    replayer.update(&mut target).unwrap();
    assert_eq!(replayer.current_frame(), Some(0));

    // First frame with a negative step hits the start
    replayer.set_step(-1);
    assert!(matches!(
        replayer.update(&mut target),
        Err(PersistenceError::StreamBoundary(StreamBoundary::Start))
    ));
    assert_eq!(replayer.step(), 0);
    assert_eq!(replayer.current_frame(), Some(0));

    // Overshooting the end is a boundary, not a clamp
    replayer.set_step(10);
    assert!(matches!(
        replayer.update(&mut target),
        Err(PersistenceError::StreamBoundary(StreamBoundary::End))
    ));
    assert_eq!(replayer.current_frame(), Some(0));
}

#[test]
fn torn_trailing_frame_is_ignored() {
    let dir = scratch_dir("torn");
    let path = dir.join("run.simstream");
    let mut sim = engine(4, 8);
    let recorded = record(&path, &mut sim, 3);

    let mut bytes = fs::read(&path).unwrap();
    bytes.extend_from_slice(&[0u8; 20]);
    fs::write(&path, &bytes).unwrap();

    let mut target = engine(4, 9);
    let mut replayer = StreamReplayer::open(&path, &mut target).unwrap();
    assert_eq!(replayer.frame_count(), 3);

    replayer.set_step(2);
    replayer.update(&mut target).unwrap();
    assert_matches_recording(&target.simulation_state().unwrap(), &recorded[2]);
    assert!(replayer.update(&mut target).is_err());
}

#[test]
fn stream_without_frames_is_rejected() {
    let dir = scratch_dir("empty-stream");
    let path = dir.join("run.simstream");
    let mut sim = engine(4, 10);
    StreamRecorder::create(&path, &sim).unwrap().finish().unwrap();

    assert!(matches!(
        StreamReplayer::open(&path, &mut sim),
        Err(PersistenceError::Format { kind: "stream", .. })
    ));
}

#[test]
fn oversized_body_count_is_a_format_error() {
    let dir = scratch_dir("oversized");
    let path = dir.join("corrupt.simstream");
    let mut bytes = i32::MAX.to_le_bytes().to_vec();
    bytes.extend_from_slice(&[0u8; 8]);
    fs::write(&path, &bytes).unwrap();

    let mut sim = engine(4, 16);
    let err = StreamReplayer::open(&path, &mut sim).unwrap_err();
    assert!(matches!(err, PersistenceError::Format { kind: "stream", .. }));
    assert!(err.to_string().contains("truncated mass block"));

    // The failed open leaves the engine free
    assert_eq!(sim.stream_lock().activity(), None);
    assert_eq!(sim.num_masses(), 4);
}

#[test]
fn recorder_rejects_resized_engine() {
    let dir = scratch_dir("resized");
    let mut sim = engine(4, 11);
    let mut recorder = StreamRecorder::create(&dir.join("run.simstream"), &sim).unwrap();

    sim.set_simulation_state(&SimulationState::new(vec![PointMassState::at_rest(
        1.0,
        Vec3::ZERO,
    )]))
    .unwrap();

    assert!(matches!(
        recorder.record_step(&sim),
        Err(PersistenceError::BodyCountChanged {
            expected: 4,
            actual: 1
        })
    ));
}

#[test]
fn dropped_recorder_flushes() {
    let dir = scratch_dir("drop-flush");
    let path = dir.join("run.simstream");
    let sim = engine(32, 12);

    {
        let mut recorder = StreamRecorder::create(&path, &sim).unwrap();
        for _ in 0..3 {
            recorder.record_step(&sim).unwrap();
        }
    }

    let len = fs::metadata(&path).unwrap().len();
    assert_eq!(StreamLayout::new(32).frame_count(len), 3);
}

#[test]
fn session_modes_are_exclusive() {
    let dir = scratch_dir("session");
    let mut sim = engine(8, 13);
    let mut session = PersistenceSession::new(SaveDirectories::create(&dir).unwrap());

    assert_eq!(session.mode(), SessionMode::Idle);
    assert!(matches!(
        session.record_step(&sim),
        Err(PersistenceError::ResourceState {
            mode: SessionMode::Idle,
            ..
        })
    ));
    assert!(session.end_replay().is_err());

    session.start_recording("run", &sim).unwrap();
    assert!(session.is_recording());
    assert!(matches!(
        session.start_replay("run", &mut sim),
        Err(PersistenceError::ResourceState {
            mode: SessionMode::Recording,
            ..
        })
    ));
    assert!(session.start_recording("other", &sim).is_err());
    assert!(session.end_replay().is_err());
    // Failed calls leave the recording running
    assert!(session.is_recording());

    for _ in 0..4 {
        session.record_step(&sim).unwrap();
        sim.step(0.001);
    }
    assert_eq!(session.end_recording().unwrap(), 4);
    assert_eq!(session.mode(), SessionMode::Idle);

    session.start_replay("run", &mut sim).unwrap();
    assert_eq!(session.replay_step(), Some(1));
    assert!(matches!(
        session.start_recording("run", &sim),
        Err(PersistenceError::ResourceState {
            mode: SessionMode::Replaying,
            ..
        })
    ));
    assert!(session.end_recording().is_err());

    session.set_replay_step(3).unwrap();
    session.update_replay(&mut sim).unwrap();
    assert_eq!(session.replayer().and_then(|r| r.current_frame()), Some(3));

    session.end_replay().unwrap();
    assert_eq!(session.replay_step(), None);
    assert!(session.set_replay_step(1).is_err());
}

#[test]
fn session_resolves_save_names() {
    let dir = scratch_dir("session-names");
    let sim = engine(5, 14);
    let session = PersistenceSession::new(SaveDirectories::create(&dir).unwrap());

    let path = session.save_snapshot("saved_state", &sim).unwrap();
    assert_eq!(path, dir.join("SavedStates").join("saved_state.simstate"));
    assert_eq!(
        session.load_snapshot("saved_state").unwrap(),
        sim.simulation_state().unwrap()
    );
    assert!(matches!(
        session.load_snapshot("missing"),
        Err(PersistenceError::FileNotFound { .. })
    ));
}

#[test]
fn dropping_session_closes_recording() {
    let dir = scratch_dir("session-drop");
    let sim = engine(6, 15);

    {
        let mut session = PersistenceSession::new(SaveDirectories::create(&dir).unwrap());
        session.start_recording("run", &sim).unwrap();
        session.record_step(&sim).unwrap();
        session.record_step(&sim).unwrap();
    }

    let path = SaveDirectories::new(&dir).stream_path("run");
    let len = fs::metadata(path).unwrap().len();
    assert_eq!(StreamLayout::new(6).frame_count(len), 2);
}

#[test]
fn engine_is_exclusive_across_sessions() {
    let dir = scratch_dir("cross-session");
    let dirs = SaveDirectories::create(&dir).unwrap();
    record(&dirs.stream_path("source"), &mut engine(8, 17), 3);

    let mut sim = engine(8, 18);
    let mut first = PersistenceSession::new(dirs.clone());
    let mut second = PersistenceSession::new(dirs);

    first.start_recording("live", &sim).unwrap();
    assert!(matches!(
        second.start_replay("source", &mut sim),
        Err(PersistenceError::ResourceState {
            mode: SessionMode::Recording,
            ..
        })
    ));
    assert!(matches!(
        second.start_recording("other", &sim),
        Err(PersistenceError::ResourceState {
            mode: SessionMode::Recording,
            ..
        })
    ));
    assert_eq!(second.mode(), SessionMode::Idle);

    first.record_step(&sim).unwrap();
    assert_eq!(first.end_recording().unwrap(), 1);

    second.start_replay("source", &mut sim).unwrap();
    assert_eq!(sim.stream_lock().activity(), Some(StreamActivity::Replaying));
    assert!(matches!(
        first.start_recording("live", &sim),
        Err(PersistenceError::ResourceState {
            mode: SessionMode::Replaying,
            ..
        })
    ));

    // Other engines are unaffected
    let other = engine(8, 19);
    first.start_recording("live", &other).unwrap();

    second.end_replay().unwrap();
    assert_eq!(sim.stream_lock().activity(), None);
    drop(first);
    assert_eq!(other.stream_lock().activity(), None);
}

#[test]
fn steps_must_use_the_claimed_engine() {
    let dir = scratch_dir("claimed-engine");
    let path = dir.join("run.simstream");
    let claimed = engine(4, 20);
    let mut other = engine(4, 21);

    let mut recorder = StreamRecorder::create(&path, &claimed).unwrap();
    assert!(matches!(
        recorder.record_step(&other),
        Err(PersistenceError::EngineMismatch {
            mode: SessionMode::Recording,
            ..
        })
    ));
    recorder.record_step(&claimed).unwrap();
    recorder.finish().unwrap();

    let mut target = engine(4, 22);
    let mut replayer = StreamReplayer::open(&path, &mut target).unwrap();
    let before = other.simulation_state().unwrap();
    assert!(matches!(
        replayer.update(&mut other),
        Err(PersistenceError::EngineMismatch {
            mode: SessionMode::Replaying,
            ..
        })
    ));
    assert_eq!(other.simulation_state().unwrap(), before);
}

/// Reports a few spare bytes past the last record
struct PaddedEngine(CpuSimulation);

impl StateExchange for PaddedEngine {
    fn num_masses(&self) -> usize {
        self.0.num_masses()
    }

    fn stream_lock(&self) -> &StreamLock {
        self.0.stream_lock()
    }

    fn state_len(&self) -> usize {
        self.0.state_len() + 3
    }

    fn state_bytes(&self, buf: &mut [u8]) -> Result<(), SimulationError> {
        self.0.state_bytes(buf)
    }

    fn set_state_bytes(&mut self, buf: &[u8], num_masses: usize) -> Result<(), SimulationError> {
        self.0.set_state_bytes(buf, num_masses)
    }
}

#[test]
fn padded_state_len_records_every_body() {
    let dir = scratch_dir("padded");
    let path = dir.join("run.simstream");
    let sim = PaddedEngine(engine(5, 23));
    let expected = sim.0.simulation_state().unwrap();

    let mut recorder = StreamRecorder::create(&path, &sim).unwrap();
    assert_eq!(recorder.num_masses(), 5);
    recorder.record_step(&sim).unwrap();
    recorder.finish().unwrap();

    let mut target = engine(2, 24);
    StreamReplayer::open(&path, &mut target).unwrap();
    assert_matches_recording(&target.simulation_state().unwrap(), &expected);
}

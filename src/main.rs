//! Headless galaxy simulation
//!
//! Runs the GPU engine through a full session: free run, stream recording,
//! snapshot save, replay forward and back, snapshot restore.

use starfield_binning::{ScreenBinner, ScreenCamera};
use starfield_persistence::{PersistenceError, PersistenceSession, SaveDirectories};
use starfield_physics::{GalaxyParams, SimulationState};
use starfield_simulation::{
    request_compute_device, EnergyReport, GpuSimulation, SimulationParams, StateExchange,
};
use std::error::Error;
use std::time::Instant;

const MASS_COUNT: usize = 10240;
const SCREEN_WIDTH: u32 = 1280;
const SCREEN_HEIGHT: u32 = 720;
const TIME_STEP: f32 = 0.01;

const FREE_RUN_FRAMES: usize = 120;
const RECORD_FRAMES: usize = 240;
const ENERGY_INTERVAL: usize = 60;
const CAMERA_SPIN: f32 = 0.002;

const SAVE_ROOT: &str = ".";
const STREAM_NAME: &str = "galaxy";
const SNAPSHOT_NAME: &str = "saved_state";
const REPLAY_SPEED: i32 = 2;

struct Frame<'a> {
    simulation: &'a mut GpuSimulation,
    binner: &'a mut ScreenBinner,
    camera: &'a mut ScreenCamera,
}

impl Frame<'_> {
    /// Step, spin the camera and bin
    fn advance(&mut self) -> Result<usize, Box<dyn Error>> {
        self.simulation.step(TIME_STEP);
        self.camera.rotate(CAMERA_SPIN, 0.0);
        Ok(self.binner.bin(self.simulation, self.camera)?)
    }

    fn log_energy(&self, frame: usize, initial: &EnergyReport) -> Result<(), Box<dyn Error>> {
        let energy = self.simulation.total_energy()?;
        log::info!(
            "Frame {frame}: kinetic={:.3} potential={:.3} total={:.3} drift={:.2e}",
            energy.kinetic,
            energy.potential,
            energy.total,
            energy.relative_drift(initial)
        );
        Ok(())
    }
}

/// Replay at the session's current step until a stream boundary, binning each frame
fn replay_until_boundary(
    session: &mut PersistenceSession,
    frame: &mut Frame,
) -> Result<usize, Box<dyn Error>> {
    let mut frames = 0;
    loop {
        match session.update_replay(frame.simulation) {
            Ok(()) => {
                frame.binner.bin(frame.simulation, frame.camera)?;
                frames += 1;
            }
            Err(e @ PersistenceError::StreamBoundary(_)) => {
                log::info!("✓ {e} after {frames} frames");
                return Ok(frames);
            }
            Err(e) => return Err(e.into()),
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    // Initialize logger (RUST_LOG=debug for verbose output)
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("Starting galaxy simulation with {MASS_COUNT} masses...");

    let (device, queue) = request_compute_device()?;

    let state = SimulationState::galaxy(MASS_COUNT, &GalaxyParams::default(), &mut rand::rng());
    let mut simulation = GpuSimulation::new(device, queue, &state, SimulationParams::default())?;
    log::info!("✓ Simulation initialized");

    let mut binner = ScreenBinner::new(
        simulation.device(),
        simulation.queue(),
        SCREEN_WIDTH,
        SCREEN_HEIGHT,
    );
    let mut camera = ScreenCamera::new(SCREEN_WIDTH, SCREEN_HEIGHT);
    log::info!("✓ Binner initialized");

    let mut session = PersistenceSession::new(SaveDirectories::create(SAVE_ROOT)?);

    let initial_energy = simulation.total_energy()?;
    let mut frame = Frame {
        simulation: &mut simulation,
        binner: &mut binner,
        camera: &mut camera,
    };
    frame.log_energy(0, &initial_energy)?;

    // Free run
    let start = Instant::now();
    for i in 1..=FREE_RUN_FRAMES {
        let on_screen = frame.advance()?;
        if i % ENERGY_INTERVAL == 0 {
            frame.log_energy(i, &initial_energy)?;
            log::info!("  {on_screen} of {MASS_COUNT} masses on screen");
        }
    }
    let elapsed = start.elapsed().as_secs_f32();
    log::info!(
        "✓ Free run: {FREE_RUN_FRAMES} frames in {elapsed:.2}s ({:.1} FPS)",
        FREE_RUN_FRAMES as f32 / elapsed
    );

    // Record
    session.start_recording(STREAM_NAME, frame.simulation)?;
    for i in 1..=RECORD_FRAMES {
        frame.advance()?;
        session.record_step(frame.simulation)?;
        if i % ENERGY_INTERVAL == 0 {
            frame.log_energy(FREE_RUN_FRAMES + i, &initial_energy)?;
        }
    }
    let recorded = session.end_recording()?;
    log::info!("✓ Recorded {recorded} frames");

    let snapshot = session.save_snapshot(SNAPSHOT_NAME, frame.simulation)?;
    log::info!("✓ Saved snapshot to {}", snapshot.display());

    // Replay forward, then back to the first frame
    session.start_replay(STREAM_NAME, frame.simulation)?;
    session.set_replay_step(REPLAY_SPEED)?;
    replay_until_boundary(&mut session, &mut frame)?;
    session.set_replay_step(-1)?;
    replay_until_boundary(&mut session, &mut frame)?;
    session.end_replay()?;

    // Restore the saved state
    let saved = session.load_snapshot(SNAPSHOT_NAME)?;
    frame.simulation.set_simulation_state(&saved)?;
    frame.binner.bin(frame.simulation, frame.camera)?;
    frame.log_energy(FREE_RUN_FRAMES + RECORD_FRAMES, &initial_energy)?;
    log::info!("✓ Restored {} masses", frame.simulation.num_masses());

    // Teardown
    session.close()?;
    simulation.release_buffers(true);
    log::info!("✓ Shut down cleanly");

    Ok(())
}

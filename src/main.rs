//! Powder Run headless shell
//!
//! Drives the simulation at the fixed timestep with a scripted autopilot,
//! standing in for the renderer/audio/input collaborators: events drain to
//! the log and score changes persist to disk. Useful for smoke-testing a
//! full run end to end.

use std::path::PathBuf;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use powder_run::consts::SIM_DT;
use powder_run::sim::{GameEvent, GameState, TickInput, tick};
use powder_run::scores;

/// Hard cap on simulated time so the demo always terminates
const DEMO_TIME_LIMIT: f64 = 120.0;

fn score_path() -> PathBuf {
    std::env::temp_dir().join("powder-run-scores.bin")
}

/// Scripted input: start a run from the boot menu, weave down the slope
/// throwing snowballs, quit from the death menu
fn autopilot(state: &GameState, started: &mut bool) -> TickInput {
    let mut input = TickInput::default();
    if state.phase.menu_open() {
        if !*started {
            *started = true;
            input.action = true;
        } else if state.menu_selection == 0 {
            input.move_dir.y = 1.0;
        } else {
            input.action = true;
        }
    } else {
        input.move_dir.x = (state.play_time * 0.5).sin() as f32;
        input.action = (state.play_time * 2.0) as i64 % 7 == 0;
    }
    input
}

fn main() {
    env_logger::init();
    log::info!("Powder Run (headless) starting...");

    let path = score_path();
    let saved = scores::load(&path);
    log::info!(
        "loaded scores: wins={} lowest={} fastest={}",
        saved.wins,
        saved.lowest,
        saved.fastest_time
    );

    let seed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let mut state = GameState::new(seed, saved);
    let mut started = false;

    let frame = Duration::from_secs_f32(SIM_DT);
    while !state.quit && state.play_time < DEMO_TIME_LIMIT {
        let frame_start = Instant::now();
        let input = autopilot(&state, &mut started);
        tick(&mut state, &input, SIM_DT);

        for event in state.events.drain(..) {
            match event {
                GameEvent::Play(sound) => log::debug!("play {sound:?}"),
                GameEvent::Stop(sound) => log::debug!("stop {sound:?}"),
                GameEvent::PauseAll => log::debug!("pause all sounds"),
                GameEvent::ResumeAll => log::debug!("resume all sounds"),
                GameEvent::MusicVolume { .. } => {}
                GameEvent::ScoresChanged(scores) => {
                    log::info!(
                        "scores changed: wins={} lowest={:.0} fastest={:.2} fewest_hits={}",
                        scores.wins,
                        scores.lowest,
                        scores.fastest_time,
                        scores.fewest_hits
                    );
                    scores::save(&path, &scores);
                }
            }
        }

        if let Some(remaining) = frame.checked_sub(frame_start.elapsed()) {
            std::thread::sleep(remaining);
        }
    }

    log::info!(
        "demo over after {:.1}s simulated, altitude {:.0}",
        state.play_time,
        state.player().y
    );
}

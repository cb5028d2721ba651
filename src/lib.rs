//! Powder Run - an endless downhill arcade game
//!
//! A bear on a sled races down a procedurally generated mountain, dodging
//! trees, rocks and bear traps, freezing rival penguin skiers with thrown
//! snowballs, and collecting the items they drop.
//!
//! Core modules:
//! - `sim`: Deterministic simulation (entities, physics, spawning, game state)
//! - `scores`: Best-run record with fixed-layout binary persistence
//!
//! Rendering, audio playback and input polling are external collaborators:
//! the simulation consumes a per-tick [`sim::TickInput`] snapshot and emits
//! [`sim::GameEvent`]s for the shell to act on. It performs no I/O itself.

pub mod scores;
pub mod sim;

pub use scores::Scores;
pub use sim::{GameEvent, GamePhase, GameState, TickInput, tick};

use serde::{Deserialize, Serialize};

/// Game configuration constants
pub mod consts {
    /// Fixed simulation timestep (60 Hz, regardless of measured frame time)
    pub const SIM_DT: f32 = 1.0 / 60.0;

    /// Window dimensions (the projection math bakes these in)
    pub const WINDOW_WIDTH: f32 = 600.0;
    pub const WINDOW_HEIGHT: f32 = 800.0;

    /// Entity pool capacity (hard cap, allocation past this silently fails)
    pub const MAX_ENTITIES: usize = 512;
    /// The player always lives at this pool index
    pub const PLAYER_INDEX: usize = 1;

    /// Camera / projection
    pub const CLIPPING_PLANE: f32 = 10.0;
    pub const VIEW_DISTANCE: f32 = 2500.0;
    pub const CAMERA_FOLLOW_DISTANCE: f32 = 150.0;
    /// Downward drift speed of the camera once the player is gone
    pub const CAMERA_SCROLL_SPEED: f32 = 300.0;
    /// Snap vertical tracking every frame instead of smoothing it
    pub const TRACK_Y_PERFECTLY: bool = true;

    /// Slope geometry
    pub const HILL_WIDTH: f32 = 2000.0;
    pub const BARRIER_DISTANCE: f32 = 100.0;
    /// Altitude the run starts at; reaching 0 wins
    pub const STARTING_HEIGHT: f32 = 300_000.0;

    /// Player tuning
    pub const PLAYER_WIDTH: f32 = 50.0;
    pub const PLAYER_ACCELERATION: f32 = 200.0;
    pub const SNOWBALL_SPEED: f32 = 1000.0;
    pub const SNOWBALL_ROTATION_SPEED: f32 = 600.0;
    pub const BOOST_TIME: f32 = 5.0;
    pub const BOOST_SPEED: f32 = 3000.0;

    /// Rival skier tuning
    pub const SKIER_ACCELERATION: f32 = 1000.0;

    /// Particle gravity (z axis, units per second squared)
    pub const DOT_GRAVITY: f32 = 1000.0;
    /// Dots spawned by a death explosion
    pub const EXPLOSION_DOTS: usize = 30;

    /// Placement rejection sampling gives up after this many candidates
    pub const PLACEMENT_MAX_TRIES: u32 = 100;
}

/// Axis-aligned rectangle in world or screen space
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Rect {
    #[inline]
    pub const fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }
}

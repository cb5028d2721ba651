//! Game state aggregate and the phase machine
//!
//! All state that must survive a tick lives here. The aggregate owns the
//! fixed entity pool, the seeded RNG and the outgoing event queue; nothing
//! in the sim reaches outside it.

use glam::Vec2;
use rand::SeedableRng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use crate::consts::{
    BARRIER_DISTANCE, CAMERA_FOLLOW_DISTANCE, MAX_ENTITIES, PLAYER_INDEX, STARTING_HEIGHT,
    VIEW_DISTANCE,
};
use crate::scores::Scores;

use super::camera::Camera;
use super::entity::{Entity, Timer};
use super::events::GameEvent;
use super::spawn;

/// Current phase of the run
///
/// Replaces the usual tangle of `menu_open && hp > 0` style guards with one
/// closed set of states. The simulation is frozen only in `MenuPaused`;
/// `Dying` and `MenuDead` keep ticking so death particles and the camera
/// drift can play out behind the menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GamePhase {
    /// Menu open with the player alive; simulation frozen
    MenuPaused,
    /// Full simulation
    Playing,
    /// Player hp reached zero; death timer counting down
    Dying,
    /// Death timer expired; menu forced open over a still-live world
    MenuDead,
}

impl GamePhase {
    /// Whether the world simulates this tick
    pub fn simulating(self) -> bool {
        !matches!(self, GamePhase::MenuPaused)
    }

    /// Whether the menu is on screen
    pub fn menu_open(self) -> bool {
        matches!(self, GamePhase::MenuPaused | GamePhase::MenuDead)
    }
}

/// Menu rows, top to bottom
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MenuItem {
    NewRun,
    Quit,
}

impl MenuItem {
    pub fn from_index(index: i32) -> Self {
        if index <= 0 { MenuItem::NewRun } else { MenuItem::Quit }
    }
}

/// Which sled loop is currently audible
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SlideLoop {
    #[default]
    None,
    Center,
    Side,
}

/// Health bar display state (fullness chases hp, shakes on hits)
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct HealthBar {
    pub fullness: f32,
    pub shake_magnitude: f32,
    pub shake_x: f32,
    pub shake_y: f32,
}

/// Input snapshot for a single tick
///
/// Booleans are edge-triggered (pressed this frame); `move_dir` is the
/// normalized movement vector.
#[derive(Debug, Clone, Copy, Default)]
pub struct TickInput {
    pub move_dir: Vec2,
    pub pause: bool,
    pub action: bool,
    pub mute: bool,
}

/// Complete game state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameState {
    /// Elapsed simulated play time in seconds
    pub play_time: f64,
    /// Spawn currency, one accumulator per obstacle category
    pub skier_points: f32,
    pub tree_points: f32,
    pub rock_points: f32,
    pub trap_points: f32,
    pub outer_tree_points: f32,
    pub debris_points: f32,
    /// Lowest altitude the camera has reached (monotonic, decreasing)
    pub furthest_y: f32,
    /// Altitude of the last placed barrier row
    pub last_barrier_y: f32,
    pub death_timer: Timer,
    /// Cooldown between rival skier reinforcements
    pub skier_timer: Timer,
    pub notification_timer: Timer,
    pub notification_text: String,
    /// Times the player was hit this run
    pub hits: i16,
    pub menu_selection: i32,
    pub phase: GamePhase,
    pub quit: bool,
    /// One-shot: the run reached altitude zero (endless mode from here on)
    pub finished: bool,
    pub muted: bool,
    pub music_volume: f32,
    pub menu_music_volume: f32,
    /// Loop bookkeeping so Play/Stop events fire only on change
    pub scoop_playing: bool,
    pub slide_loop: SlideLoop,
    pub camera: Camera,
    pub health_bar: HealthBar,
    pub scores: Scores,
    pub rng: Pcg32,
    /// Fixed-capacity entity pool; index [`PLAYER_INDEX`] is the player
    pub entities: Vec<Entity>,
    /// Side effects queued this tick, drained by the shell
    #[serde(skip)]
    pub events: Vec<GameEvent>,
}

impl GameState {
    /// Boot state: world built, player dead, menu open over the title scene
    pub fn new(seed: u64, scores: Scores) -> Self {
        let mut state = Self::bare();
        state.rng = Pcg32::seed_from_u64(seed);
        state.scores = scores;
        state.new_run();
        // Boot into the menu over a lifeless slope; the camera sits where
        // the player would be rather than ahead of them
        state.entities[PLAYER_INDEX].hp = 0;
        state.camera.y -= CAMERA_FOLLOW_DISTANCE;
        state.phase = GamePhase::MenuDead;
        state
    }

    /// The player entity (fixed pool index)
    pub fn player(&self) -> &Entity {
        &self.entities[PLAYER_INDEX]
    }

    pub fn player_mut(&mut self) -> &mut Entity {
        &mut self.entities[PLAYER_INDEX]
    }

    pub fn push_event(&mut self, event: GameEvent) {
        self.events.push(event);
    }

    /// Full reset for a fresh run, preserving mute, scores and the RNG stream
    pub fn new_run(&mut self) {
        let muted = self.muted;
        let scores = self.scores;
        let rng = self.rng.clone();
        let events = std::mem::take(&mut self.events);
        *self = Self {
            muted,
            scores,
            rng,
            events,
            ..Self::bare()
        };

        spawn::add_player(&mut self.entities);
        let player = self.player();
        let (px, py) = (player.x, player.y);
        self.camera.x = px;
        self.camera.y = py + CAMERA_FOLLOW_DISTANCE;
        self.health_bar.fullness = 1.0;
        self.furthest_y = STARTING_HEIGHT;
        if !self.muted {
            self.music_volume = 1.0;
        }

        // Seed the first screenful of barrier rows
        let mut y = py;
        while y > py - VIEW_DISTANCE {
            spawn::add_barriers(y, &mut self.entities);
            y -= BARRIER_DISTANCE;
        }
        self.last_barrier_y = y + BARRIER_DISTANCE;
    }

    /// Zeroed aggregate without a player or barriers
    fn bare() -> Self {
        Self {
            play_time: 0.0,
            skier_points: 0.0,
            tree_points: 0.0,
            rock_points: 0.0,
            trap_points: 0.0,
            outer_tree_points: 0.0,
            debris_points: 0.0,
            furthest_y: STARTING_HEIGHT,
            last_barrier_y: 0.0,
            death_timer: Timer::with_max(3.0),
            skier_timer: Timer::with_max(5.0),
            notification_timer: Timer::with_max(2.0),
            notification_text: String::new(),
            hits: 0,
            menu_selection: 0,
            phase: GamePhase::Playing,
            quit: false,
            finished: false,
            muted: false,
            music_volume: 0.0,
            menu_music_volume: 0.0,
            scoop_playing: false,
            slide_loop: SlideLoop::default(),
            camera: Camera::default(),
            health_bar: HealthBar::default(),
            scores: Scores::default(),
            rng: Pcg32::seed_from_u64(0),
            entities: vec![Entity::default(); MAX_ENTITIES],
            events: Vec::new(),
        }
    }
}

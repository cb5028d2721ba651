//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must be pure and deterministic:
//! - Fixed timestep only
//! - Seeded RNG only, owned by the state
//! - Fixed entity pool with stable iteration order (slot index)
//! - No rendering, audio or platform dependencies; side effects leave the
//!   simulation as [`GameEvent`]s

pub mod camera;
pub mod collision;
pub mod entity;
pub mod events;
pub mod spawn;
pub mod state;
pub mod tick;

pub use camera::{Camera, project_dot, project_rect};
pub use collision::{overlap_size, rects_overlap, resolve_collisions};
pub use entity::{Anim, Behavior, Dot, DotKind, Entity, SpriteSet, Timer, first_empty};
pub use events::{GameEvent, MusicTrack, Sound};
pub use state::{GamePhase, GameState, HealthBar, MenuItem, TickInput};
pub use tick::tick;

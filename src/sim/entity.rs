//! Pooled entities and their building blocks
//!
//! There is no subtyping: an entity's "type" is entirely its [`Behavior`]
//! flag set plus numeric fields. A slot is free iff its behavior set is
//! empty, and freeing an entity means zeroing the whole record.

use bitflags::bitflags;
use rand::Rng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use crate::Rect;
use crate::consts::{DOT_GRAVITY, EXPLOSION_DOTS};

use super::events::Sound;

bitflags! {
    /// Capability flags composing an entity's type
    ///
    /// `has_behavior` tests are strict AND-masks: every requested flag must
    /// be present. An empty set marks a free pool slot.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    pub struct Behavior: u64 {
        const EXISTS = 1 << 0;
        /// Frozen solid; skips integration until death or despawn
        const ICED = 1 << 2;
        const SKIER = 1 << 3;
        const CAN_BE_ICED = 1 << 4;
        const EARNS_POINTS = 1 << 5;
        const DYNAMIC = 1 << 6;
        const SOLID = 1 << 7;
        const CAUSES_ICE = 1 << 8;
        const DROPS_ITEM = 1 << 9;
        const EXPLODES_ON_DEATH = 1 << 10;
        /// Freed once all of its dots have expired
        const EXPLOSION = 1 << 11;
        const LOW = 1 << 12;
        const HIGH = 1 << 13;
        /// Ignores solid-body separation, destroying what it touches
        const SMASH_EVERYTHING = 1 << 14;
        const INVINCIBLE = 1 << 15;
    }
}

/// Countdown scalar; "active" means `time > 0`
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Timer {
    pub time: f32,
    pub max: f32,
}

impl Timer {
    pub const fn with_max(max: f32) -> Self {
        Self { time: 0.0, max }
    }

    pub fn reset(&mut self) {
        self.time = self.max;
    }

    /// Decrement by one frame delta (may go negative)
    pub fn tick(&mut self, dt: f32) {
        self.time -= dt;
    }

    pub fn active(&self) -> bool {
        self.time > 0.0
    }
}

/// Particle color/material tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DotKind {
    /// Free slot in the dot array
    #[default]
    None,
    Snow,
    Ice,
    Blood,
    Tree,
    Rock,
    Boost,
}

/// A short-lived ballistic particle owned by one entity
///
/// `z` is height above the ground plane; dots bounce when it reaches zero.
/// `expiry` is an absolute game time.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Dot {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub vx: f32,
    pub vy: f32,
    pub vz: f32,
    pub expiry: f64,
    pub kind: DotKind,
}

/// Which sprite sheet an entity animates from
///
/// The renderer owns the textures; the sim only needs the set identity (it
/// doubles as a coarse "what is this" tag, e.g. trap-close detection) and
/// the number of frames available for random variant picks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SpriteSet {
    #[default]
    None,
    Bear,
    Penguin,
    Trees,
    Rock,
    Trap,
    Snowball,
    Debris,
    Pole,
}

impl SpriteSet {
    /// Number of frames in the set
    pub fn frame_count(self) -> i32 {
        match self {
            SpriteSet::None => 0,
            SpriteSet::Bear => 10,
            SpriteSet::Penguin => 4,
            SpriteSet::Trees => 2,
            SpriteSet::Rock => 3,
            SpriteSet::Trap => 2,
            SpriteSet::Snowball => 2,
            SpriteSet::Debris => 6,
            SpriteSet::Pole => 1,
        }
    }
}

// Frame indices with gameplay meaning. The active index is render state but
// also a coarse facing/state indicator read back by the sim.
pub const LEFT_FRAME: i32 = 0;
pub const CENTER_FRAME: i32 = 1;
pub const RIGHT_FRAME: i32 = 2;
pub const SHOCKED_FRAME: i32 = 3;
pub const LEFT_GRAB_FRAME: i32 = 3;
pub const LEFT_THROW_FRAME: i32 = 4;
pub const CENTER_GRAB_FRAME: i32 = 5;
pub const CENTER_THROW_FRAME: i32 = 6;
pub const RIGHT_GRAB_FRAME: i32 = 7;
pub const RIGHT_THROW_FRAME: i32 = 8;
pub const HURT_FRAME: i32 = 9;
pub const TRAP_OPEN_FRAME: i32 = 0;
pub const TRAP_CLOSED_FRAME: i32 = 1;

/// Animation state: sprite set plus active frame
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Anim {
    pub set: SpriteSet,
    pub active_index: i32,
    pub time_started: f64,
}

impl Anim {
    pub fn new(set: SpriteSet, active_index: i32) -> Self {
        Self {
            set,
            active_index,
            time_started: 0.0,
        }
    }
}

/// One pooled entity record
///
/// `x` is lateral offset from the slope center; `y` is altitude and goes
/// down as the run progresses. Visual extent is display-only; collisions
/// use the local `hitbox` offset from `(x, y)`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Entity {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub width: f32,
    pub height: f32,
    /// Nonzero enables spin animation (snowballs)
    pub rotation_speed: f32,
    pub behavior: Behavior,
    pub hp: i32,
    pub hp_max: i32,
    pub damage: i32,
    /// Target descent speed, approached via acceleration
    pub wish_speed: f32,
    /// Lateral position a skier oscillates around
    pub center_x: f32,
    pub hitbox: Rect,
    pub death_sound: Option<Sound>,
    pub explosion_kind: DotKind,
    pub attack_timer: Timer,
    pub invuln_timer: Timer,
    pub boost_timer: Timer,
    pub smash_timer: Timer,
    pub shocked_timer: Timer,
    pub snow_timer: Timer,
    pub anim: Anim,
    pub dots: Vec<Dot>,
    pub flipped: bool,
}

impl Entity {
    /// Strict AND-mask capability test: all requested flags must be present
    #[inline]
    pub fn has_behavior(&self, flags: Behavior) -> bool {
        self.behavior.contains(flags)
    }

    /// A slot is free iff its behavior set is empty
    #[inline]
    pub fn is_free(&self) -> bool {
        self.behavior.is_empty()
    }

    /// Free the slot by zeroing the whole record
    pub fn clear(&mut self) {
        *self = Entity::default();
    }

    /// World-space collision rectangle
    pub fn hitbox_world(&self) -> Rect {
        Rect::new(
            self.x + self.hitbox.x,
            self.y + self.hitbox.y,
            self.hitbox.w,
            self.hitbox.h,
        )
    }

    /// Apply damage; a survivor gets its invulnerability window back
    pub fn add_damage(&mut self, damage: i32) {
        self.hp -= damage;
        if self.hp > 0 {
            self.invuln_timer.reset();
        }
    }

    /// Request `count` particle slots tagged `kind`
    ///
    /// Scans for expired-or-unused slots first; if the request cannot be
    /// satisfied the array doubles (never shrinks) and the scan restarts.
    pub fn add_trail(
        &mut self,
        x: f32,
        y: f32,
        z: f32,
        vx: f32,
        vy: f32,
        vz: f32,
        now: f64,
        expiry: f64,
        mut count: u32,
        kind: DotKind,
    ) {
        while count > 0 {
            for dot in self.dots.iter_mut() {
                if count == 0 {
                    return;
                }
                if dot.kind == DotKind::None || dot.expiry < now {
                    *dot = Dot {
                        x,
                        y,
                        z,
                        vx,
                        vy,
                        vz,
                        expiry,
                        kind,
                    };
                    count -= 1;
                }
            }
            if count > 0 {
                let new_len = (self.dots.len() * 2).max(1);
                self.dots.resize(new_len, Dot::default());
            }
        }
    }

    /// Advance all dots one frame; returns whether any are still alive
    ///
    /// Expired dots are recycled in place (zeroed), keeping the array
    /// allocation around for reuse.
    pub fn update_dots(&mut self, now: f64, dt: f32) -> bool {
        let mut living = false;
        for dot in self.dots.iter_mut() {
            if dot.expiry < now {
                *dot = Dot::default();
            } else {
                living = true;
                dot.vz -= DOT_GRAVITY * dt;
                dot.x += dot.vx * dt;
                dot.y += dot.vy * dt;
                dot.z += dot.vz * dt;
                if dot.z <= 0.0 {
                    dot.z = 0.0;
                    dot.vz = -dot.vz;
                }
            }
        }
        living
    }

    /// Replace the dot array with a death-explosion burst
    ///
    /// `vy` carries the momentum of whatever killed this entity. Iced
    /// entities shatter half ice, half their own material.
    pub fn explode(&mut self, vy: f32, now: f64, rng: &mut Pcg32) {
        let iced = self.has_behavior(Behavior::ICED);
        self.dots = (0..EXPLOSION_DOTS)
            .map(|i| {
                let kind = if iced && i % 2 == 0 {
                    DotKind::Ice
                } else {
                    self.explosion_kind
                };
                Dot {
                    x: self.x,
                    y: self.y,
                    z: self.height / 2.0,
                    vx: rng.random_range(-800..=800) as f32,
                    vy,
                    vz: rng.random_range(-800..=800) as f32,
                    expiry: now + 1.0,
                    kind,
                }
            })
            .collect();
    }
}

/// First-fit pool allocation: index of the first free slot, if any
///
/// Pool exhaustion is not an error; callers skip the spawn and may retry
/// next frame.
pub fn first_empty(entities: &[Entity]) -> Option<usize> {
    entities.iter().position(|e| e.is_free())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;

    #[test]
    fn test_has_behavior_is_strict_and_mask() {
        let mut e = Entity::default();
        e.behavior = Behavior::EXISTS | Behavior::SKIER | Behavior::CAN_BE_ICED;

        assert!(e.has_behavior(Behavior::EXISTS));
        assert!(e.has_behavior(Behavior::SKIER | Behavior::CAN_BE_ICED));
        // Partial overlap is not enough
        assert!(!e.has_behavior(Behavior::SKIER | Behavior::SOLID));
    }

    #[test]
    fn test_pool_first_fit_and_exhaustion() {
        let mut pool = vec![Entity::default(); 4];
        pool[0].behavior = Behavior::EXISTS;
        pool[2].behavior = Behavior::EXISTS;

        assert_eq!(first_empty(&pool), Some(1));
        pool[1].behavior = Behavior::EXISTS;
        assert_eq!(first_empty(&pool), Some(3));
        pool[3].behavior = Behavior::EXISTS;
        // Full pool: allocation fails, nothing is overwritten
        assert_eq!(first_empty(&pool), None);
        assert!(pool.iter().all(|e| e.behavior == Behavior::EXISTS));
    }

    #[test]
    fn test_clear_frees_slot() {
        let mut e = Entity::default();
        e.behavior = Behavior::EXISTS | Behavior::SOLID;
        e.hp = 3;
        e.dots = vec![Dot::default(); 8];
        e.clear();
        assert!(e.is_free());
        assert_eq!(e.hp, 0);
        assert!(e.dots.is_empty());
    }

    #[test]
    fn test_timer_countdown_boundary() {
        let dt: f32 = 1.0 / 60.0;
        let mut timer = Timer::with_max(3.0);
        timer.reset();
        assert_eq!(timer.time, 3.0);

        let steps = (3.0 / dt).round() as usize;
        for _ in 0..steps {
            timer.tick(dt);
        }
        // Exactly max/dt decrements of size dt must leave the timer inactive
        assert!(!timer.active());
    }

    proptest! {
        #[test]
        fn prop_timer_reset_then_n_ticks(max in 0.1f32..10.0, n in 0u32..100) {
            let dt = 1.0 / 60.0;
            let mut timer = Timer::with_max(max);
            timer.reset();
            for _ in 0..n {
                timer.tick(dt);
            }
            let expected = max - n as f32 * dt;
            prop_assert!((timer.time - expected).abs() < 1e-4);
        }
    }

    #[test]
    fn test_add_trail_grows_geometrically_preserving_live_dots() {
        let mut e = Entity::default();
        let now = 10.0;

        e.add_trail(1.0, 2.0, 0.0, 0.0, 0.0, 0.0, now, now + 5.0, 1, DotKind::Snow);
        assert_eq!(e.dots.len(), 1);
        let first = e.dots[0];
        assert_eq!(first.kind, DotKind::Snow);

        // No free slot: the array must double and the live dot survive intact
        e.add_trail(3.0, 4.0, 0.0, 0.0, 0.0, 0.0, now, now + 5.0, 3, DotKind::Blood);
        assert!(e.dots.len() >= 4);
        assert_eq!(e.dots[0], first);
        assert_eq!(
            e.dots.iter().filter(|d| d.kind == DotKind::Blood).count(),
            3
        );
    }

    #[test]
    fn test_expired_dot_recycled_on_update() {
        let mut e = Entity::default();
        let t0 = 100.0;
        e.add_trail(0.0, 0.0, 5.0, 0.0, 0.0, 0.0, t0, t0 + 0.5, 1, DotKind::Snow);

        // Still alive just before expiry
        assert!(e.update_dots(t0 + 0.4, 1.0 / 60.0));
        // Past expiry: slot resets to None
        assert!(!e.update_dots(t0 + 0.6, 1.0 / 60.0));
        assert_eq!(e.dots[0].kind, DotKind::None);
    }

    #[test]
    fn test_dots_bounce_at_ground_plane() {
        let mut e = Entity::default();
        e.dots = vec![Dot {
            z: 0.5,
            vz: -300.0,
            expiry: 1.0,
            kind: DotKind::Snow,
            ..Dot::default()
        }];
        e.update_dots(0.0, 1.0 / 60.0);
        assert_eq!(e.dots[0].z, 0.0);
        assert!(e.dots[0].vz > 0.0);
    }

    #[test]
    fn test_add_damage_resets_invuln_only_while_alive() {
        let mut e = Entity::default();
        e.hp = 3;
        e.invuln_timer = Timer::with_max(3.0);

        e.add_damage(1);
        assert_eq!(e.hp, 2);
        assert_eq!(e.invuln_timer.time, 3.0);

        e.invuln_timer.time = 0.0;
        e.add_damage(5);
        assert_eq!(e.hp, -3);
        assert!(!e.invuln_timer.active());
    }

    #[test]
    fn test_explosion_burst_alternates_ice_when_iced() {
        let mut rng = Pcg32::seed_from_u64(7);
        let mut e = Entity::default();
        e.behavior = Behavior::EXISTS | Behavior::ICED;
        e.explosion_kind = DotKind::Blood;
        e.height = 80.0;

        e.explode(-300.0, 2.0, &mut rng);
        assert_eq!(e.dots.len(), EXPLOSION_DOTS);
        for (i, dot) in e.dots.iter().enumerate() {
            let expected = if i % 2 == 0 { DotKind::Ice } else { DotKind::Blood };
            assert_eq!(dot.kind, expected);
            assert_eq!(dot.vy, -300.0);
            assert_eq!(dot.z, 40.0);
            assert_eq!(dot.expiry, 3.0);
        }
    }
}

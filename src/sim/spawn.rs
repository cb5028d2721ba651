//! Procedural spawning
//!
//! Every obstacle category owns a points accumulator fed by distance
//! travelled. A category cost (constant, or scaled inversely by the
//! altitude-band difficulty weight) converts points into spawn attempts.
//! Placement is rejection-sampled against a fixed proximity box around
//! existing entities, with a bounded retry count; exhausting the retries
//! skips that attempt.

use rand::Rng;
use rand_pcg::Pcg32;

use crate::Rect;
use crate::consts::{
    BARRIER_DISTANCE, BOOST_TIME, HILL_WIDTH, PLACEMENT_MAX_TRIES, PLAYER_INDEX, PLAYER_WIDTH,
    SNOWBALL_ROTATION_SPEED, STARTING_HEIGHT, VIEW_DISTANCE,
};

use super::collision::rects_overlap;
use super::entity::{
    Anim, Behavior, DotKind, Entity, SpriteSet, TRAP_OPEN_FRAME, Timer, first_empty,
};
use super::events::Sound;
use super::state::GameState;

/// Spawn-placement proximity box: a coarse fixed-size footprint, distinct
/// from the gameplay hitbox
fn proximity_box(x: f32, y: f32) -> Rect {
    Rect::new(x - 10.0, y - 25.0, 20.0, 50.0)
}

fn placement_blocked(x: f32, y: f32, entities: &[Entity]) -> bool {
    let candidate = proximity_box(x, y);
    entities
        .iter()
        .filter(|e| !e.is_free())
        .any(|e| rects_overlap(proximity_box(e.x, e.y), candidate))
}

/// Draw a clear spot on the slope near the spawn frontier
///
/// Returns `None` once the retries run out; the caller skips this spawn
/// attempt rather than spinning on a dense slope.
fn place_on_slope(frontier_y: f32, entities: &[Entity], rng: &mut Pcg32) -> Option<(f32, f32)> {
    let half = HILL_WIDTH as i32 / 2;
    for _ in 0..PLACEMENT_MAX_TRIES {
        let x = rng.random_range(-half..=half) as f32;
        let y = frontier_y + rng.random_range(-300..=0) as f32;
        if !placement_blocked(x, y, entities) {
            return Some((x, y));
        }
    }
    None
}

/// Solid tree obstacle; freezable, shatters into wood
pub fn add_tree(frontier_y: f32, entities: &mut [Entity], rng: &mut Pcg32) -> bool {
    let Some(slot) = first_empty(entities) else {
        return false;
    };
    let frame = rng.random_range(0..SpriteSet::Trees.frame_count());
    let flipped = rng.random_range(0..=1) == 0;
    let Some((x, y)) = place_on_slope(frontier_y, entities, rng) else {
        return false;
    };
    entities[slot] = Entity {
        x,
        y,
        width: 200.0,
        height: 400.0,
        hitbox: Rect::new(-50.0, -12.5, 100.0, 25.0),
        behavior: Behavior::EXISTS
            | Behavior::CAN_BE_ICED
            | Behavior::SOLID
            | Behavior::EXPLODES_ON_DEATH,
        hp: 1,
        damage: 1,
        explosion_kind: DotKind::Tree,
        death_sound: Some(Sound::TreeBreak),
        flipped,
        anim: Anim::new(SpriteSet::Trees, frame),
        ..Entity::default()
    };
    true
}

/// Solid boulder; sturdier-looking but mechanically a tree that can't freeze
pub fn add_rock(frontier_y: f32, entities: &mut [Entity], rng: &mut Pcg32) -> bool {
    let Some(slot) = first_empty(entities) else {
        return false;
    };
    let frame = rng.random_range(0..SpriteSet::Rock.frame_count());
    let flipped = rng.random_range(0..=1) == 0;
    let Some((x, y)) = place_on_slope(frontier_y, entities, rng) else {
        return false;
    };
    entities[slot] = Entity {
        x,
        y,
        width: 200.0,
        height: 200.0,
        hitbox: Rect::new(-80.0, -12.5, 160.0, 25.0),
        behavior: Behavior::EXISTS | Behavior::SOLID | Behavior::EXPLODES_ON_DEATH,
        hp: 1,
        damage: 1,
        explosion_kind: DotKind::Rock,
        death_sound: Some(Sound::RockBreak),
        flipped,
        anim: Anim::new(SpriteSet::Rock, frame),
        ..Entity::default()
    };
    true
}

/// Ground-level bear trap: indestructible, massive damage, sits below the
/// HIGH tier so thrown snowballs sail over it
pub fn add_trap(frontier_y: f32, entities: &mut [Entity], rng: &mut Pcg32) -> bool {
    let Some(slot) = first_empty(entities) else {
        return false;
    };
    let flipped = rng.random_range(0..=1) == 0;
    let Some((x, y)) = place_on_slope(frontier_y, entities, rng) else {
        return false;
    };
    entities[slot] = Entity {
        x,
        y,
        width: 200.0,
        height: 150.0,
        hitbox: Rect::new(-80.0, -12.5, 160.0, 25.0),
        behavior: Behavior::EXISTS | Behavior::LOW | Behavior::INVINCIBLE,
        hp: 100,
        damage: 100,
        flipped,
        anim: Anim::new(SpriteSet::Trap, TRAP_OPEN_FRAME),
        ..Entity::default()
    };
    true
}

/// Oversized scenery tree on the outer margins, outside the playable slope
pub fn add_outer_tree(frontier_y: f32, entities: &mut [Entity], rng: &mut Pcg32) -> bool {
    let Some(slot) = first_empty(entities) else {
        return false;
    };
    let full = HILL_WIDTH as i32;
    let mut x = None;
    for _ in 0..PLACEMENT_MAX_TRIES {
        let candidate = rng.random_range(-full..=full) as f32;
        if !(-HILL_WIDTH / 2.0 - 50.0..=HILL_WIDTH / 2.0 + 50.0).contains(&candidate) {
            x = Some(candidate);
            break;
        }
    }
    let Some(x) = x else {
        return false;
    };
    let y = frontier_y + rng.random_range(-300..=0) as f32;
    let frame = rng.random_range(0..SpriteSet::Trees.frame_count());
    entities[slot] = Entity {
        x,
        y,
        width: 400.0,
        height: 800.0,
        behavior: Behavior::EXISTS | Behavior::INVINCIBLE,
        hp: 100,
        flipped: rng.random_range(0..=1) == 0,
        anim: Anim::new(SpriteSet::Trees, frame),
        ..Entity::default()
    };
    true
}

/// Harmless roadside debris, decoration with a despawn lifecycle
pub fn add_debris(frontier_y: f32, entities: &mut [Entity], rng: &mut Pcg32) -> bool {
    let Some(slot) = first_empty(entities) else {
        return false;
    };
    let frame = rng.random_range(0..SpriteSet::Debris.frame_count());
    let flipped = rng.random_range(0..=1) == 0;
    let full = HILL_WIDTH as i32;
    let mut placed = None;
    for _ in 0..PLACEMENT_MAX_TRIES {
        let x = rng.random_range(-full..=full) as f32;
        let y = frontier_y + rng.random_range(-300..=0) as f32;
        if !placement_blocked(x, y, entities) {
            placed = Some((x, y));
            break;
        }
    }
    let Some((x, y)) = placed else {
        return false;
    };
    entities[slot] = Entity {
        x,
        y,
        width: 100.0,
        height: 50.0,
        behavior: Behavior::EXISTS | Behavior::LOW | Behavior::INVINCIBLE,
        hp: 100,
        flipped,
        anim: Anim::new(SpriteSet::Debris, frame),
        ..Entity::default()
    };
    true
}

/// Rival penguin skier, the only entity with its own AI
pub fn add_skier(frontier_y: f32, entities: &mut [Entity], rng: &mut Pcg32) -> bool {
    let half = HILL_WIDTH as i32 / 2;
    let x = rng.random_range(-half + 300..=half - 300) as f32;
    let mut vx = 800.0;
    if rng.random_range(0..=1) == 1 {
        vx = -vx;
    }
    let Some(slot) = first_empty(entities) else {
        return false;
    };
    entities[slot] = Entity {
        x,
        y: frontier_y,
        center_x: x,
        width: 100.0,
        height: 80.0,
        wish_speed: 500.0,
        vy: -500.0,
        vx,
        hitbox: Rect::new(-50.0, -25.0, 100.0, 50.0),
        hp: 1,
        damage: 1,
        death_sound: Some(Sound::SkierCrunch),
        explosion_kind: DotKind::Blood,
        shocked_timer: Timer::with_max(0.25),
        snow_timer: Timer::with_max(0.05),
        anim: Anim::new(SpriteSet::Penguin, 0),
        behavior: Behavior::EXISTS
            | Behavior::SKIER
            | Behavior::CAN_BE_ICED
            | Behavior::DROPS_ITEM
            | Behavior::EXPLODES_ON_DEATH,
        ..Entity::default()
    };
    true
}

/// Thrown snowball: fast, HIGH tier, freezes whatever it hits
pub fn add_snowball(
    x: f32,
    y: f32,
    vy: f32,
    entities: &mut [Entity],
    rng: &mut Pcg32,
) -> bool {
    let Some(slot) = first_empty(entities) else {
        return false;
    };
    let frame = rng.random_range(0..SpriteSet::Snowball.frame_count());
    entities[slot] = Entity {
        x,
        y,
        vy,
        width: 50.0,
        height: 50.0,
        hitbox: Rect::new(-25.0, -25.0, 50.0, 50.0),
        hp: 1,
        rotation_speed: SNOWBALL_ROTATION_SPEED,
        explosion_kind: DotKind::Snow,
        death_sound: Some(Sound::SnowballImpact),
        anim: Anim::new(SpriteSet::Snowball, frame),
        behavior: Behavior::EXISTS
            | Behavior::DYNAMIC
            | Behavior::SOLID
            | Behavior::CAUSES_ICE
            | Behavior::EXPLODES_ON_DEATH
            | Behavior::HIGH,
        ..Entity::default()
    };
    true
}

/// Place a left/right pole pair marking the slope edges at altitude `y`
pub fn add_barriers(y: f32, entities: &mut [Entity]) {
    for x in [-HILL_WIDTH / 2.0, HILL_WIDTH / 2.0] {
        let Some(slot) = first_empty(entities) else {
            return;
        };
        entities[slot] = Entity {
            x,
            y,
            hp: 100,
            width: 20.0,
            height: 100.0,
            behavior: Behavior::EXISTS | Behavior::INVINCIBLE,
            anim: Anim::new(SpriteSet::Pole, 0),
            ..Entity::default()
        };
    }
}

/// (Re)build the player in its fixed pool slot
pub fn add_player(entities: &mut [Entity]) {
    entities[PLAYER_INDEX] = Entity {
        vy: -300.0,
        y: STARTING_HEIGHT,
        width: 100.0,
        height: 150.0,
        hitbox: Rect::new(-PLAYER_WIDTH / 2.0, -12.5, PLAYER_WIDTH, 25.0),
        hp: 3,
        hp_max: 3,
        damage: 3,
        death_sound: Some(Sound::PlayerDeath),
        invuln_timer: Timer::with_max(3.0),
        wish_speed: 700.0,
        attack_timer: Timer::with_max(1.0),
        boost_timer: Timer::with_max(BOOST_TIME),
        snow_timer: Timer::with_max(0.01),
        smash_timer: Timer::with_max(BOOST_TIME + 1.0),
        anim: Anim::new(SpriteSet::Bear, 0),
        explosion_kind: DotKind::Blood,
        behavior: Behavior::EXISTS
            | Behavior::EARNS_POINTS
            | Behavior::DYNAMIC
            | Behavior::SOLID
            | Behavior::EXPLODES_ON_DEATH,
        ..Entity::default()
    };
}

/// Per-band difficulty weights for (tree, rock, trap)
///
/// Three altitude bands blend tree-dominant terrain into rocks and then
/// traps as the run approaches the bottom; below zero only traps remain
/// (endless mode).
pub fn difficulty_weights(player_y: f32) -> (f32, f32, f32) {
    let band = STARTING_HEIGHT / 3.0;
    if player_y > band * 2.0 {
        ((band * 3.0 - player_y) / band, 0.0, 0.0)
    } else if player_y > band {
        let rock = (band * 2.0 - player_y) / (band * 2.0);
        (1.0 - rock, rock, 0.0)
    } else if player_y > 0.0 {
        let rock = (band - player_y) / (band * 3.0);
        let trap = (band - player_y) / (band * 3.0);
        (1.0 - rock - trap, rock, trap)
    } else {
        (0.0, 0.0, 1.0)
    }
}

/// Spend accumulated points on obstacle spawns at the frontier
pub fn spawn_obstacles(state: &mut GameState) {
    let frontier = state.camera.y - VIEW_DISTANCE;
    let player_y = state.entities[PLAYER_INDEX].y;
    let (tree_difficulty, rock_difficulty, trap_difficulty) = difficulty_weights(player_y);

    if tree_difficulty > 0.0 {
        let cost = 50.0 / tree_difficulty;
        while state.tree_points > cost {
            if add_tree(frontier, &mut state.entities, &mut state.rng) {
                state.tree_points -= cost;
            } else {
                break;
            }
        }
    }
    if rock_difficulty > 0.0 {
        let cost = 50.0 / rock_difficulty;
        while state.rock_points > cost {
            if add_rock(frontier, &mut state.entities, &mut state.rng) {
                state.rock_points -= cost;
            } else {
                break;
            }
        }
    }
    if trap_difficulty > 0.0 {
        let cost = 100.0 / trap_difficulty;
        while state.trap_points > cost {
            if add_trap(frontier, &mut state.entities, &mut state.rng) {
                state.trap_points -= cost;
            } else {
                break;
            }
        }
    }
    while state.debris_points > 50.0 {
        if add_debris(frontier, &mut state.entities, &mut state.rng) {
            state.debris_points -= 50.0;
        } else {
            break;
        }
    }
    while state.outer_tree_points > 25.0 {
        if add_outer_tree(frontier, &mut state.entities, &mut state.rng) {
            state.outer_tree_points -= 25.0;
        } else {
            break;
        }
    }
}

/// Send in a rival skier when the pack thins out
///
/// Holds off while the cooldown runs, while two are already on the slope,
/// or while the player is boosting (they would never catch up).
pub fn spawn_skier_reinforcement(state: &mut GameState) {
    let skier_count = state
        .entities
        .iter()
        .filter(|e| e.has_behavior(Behavior::SKIER))
        .count();
    let boosting = state.entities[PLAYER_INDEX].boost_timer.active();
    if !state.skier_timer.active() && skier_count < 2 && !boosting {
        let frontier = state.camera.y - VIEW_DISTANCE;
        add_skier(frontier, &mut state.entities, &mut state.rng);
        state.skier_timer.reset();
    }
}

/// Advance the barrier rows whenever the spawn frontier crosses the last
/// placed pair; runs independently of the points economy
pub fn advance_barriers(state: &mut GameState) {
    if state.camera.y - VIEW_DISTANCE <= state.last_barrier_y - BARRIER_DISTANCE {
        add_barriers(state.last_barrier_y - BARRIER_DISTANCE, &mut state.entities);
        state.last_barrier_y -= BARRIER_DISTANCE;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::MAX_ENTITIES;
    use rand::SeedableRng;

    fn empty_pool() -> Vec<Entity> {
        vec![Entity::default(); MAX_ENTITIES]
    }

    #[test]
    fn test_difficulty_band_extremes() {
        // Top of the mountain: trees only, weight approaching zero
        let (tree, rock, trap) = difficulty_weights(STARTING_HEIGHT);
        assert_eq!((rock, trap), (0.0, 0.0));
        assert!(tree >= 0.0 && tree <= 0.001);

        // Near the bottom the three weights still sum to one
        let (tree, rock, trap) = difficulty_weights(1.0);
        assert!((tree + rock + trap - 1.0).abs() < 1e-5);
        assert!(rock > 0.3 && trap > 0.3);

        // Endless mode: traps own the slope
        assert_eq!(difficulty_weights(-500.0), (0.0, 0.0, 1.0));
    }

    #[test]
    fn test_difficulty_blends_across_band_two() {
        let band = STARTING_HEIGHT / 3.0;
        let (tree, rock, trap) = difficulty_weights(band * 1.5);
        assert!((tree + rock - 1.0).abs() < 1e-5);
        assert_eq!(trap, 0.0);
        assert!(rock > 0.0 && tree > 0.0);
    }

    #[test]
    fn test_add_tree_uses_first_free_slot() {
        let mut pool = empty_pool();
        let mut rng = Pcg32::seed_from_u64(1);
        pool[0].behavior = Behavior::EXISTS;

        assert!(add_tree(-1000.0, &mut pool, &mut rng));
        assert!(pool[1].has_behavior(Behavior::EXISTS | Behavior::SOLID));
        assert_eq!(pool[1].anim.set, SpriteSet::Trees);
        assert_eq!(pool[1].hp, 1);
    }

    #[test]
    fn test_spawn_fails_on_full_pool() {
        let mut pool = empty_pool();
        let mut rng = Pcg32::seed_from_u64(2);
        for e in pool.iter_mut() {
            e.behavior = Behavior::EXISTS;
        }
        let before: Vec<f32> = pool.iter().map(|e| e.x).collect();

        assert!(!add_tree(-1000.0, &mut pool, &mut rng));
        assert!(!add_skier(-1000.0, &mut pool, &mut rng));
        assert!(!add_snowball(0.0, 0.0, -1000.0, &mut pool, &mut rng));

        let after: Vec<f32> = pool.iter().map(|e| e.x).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_placement_avoids_occupied_spots() {
        let mut pool = empty_pool();
        let mut rng = Pcg32::seed_from_u64(3);
        // Occupy a spot near the frontier; new trees must not stack on it
        pool[0].behavior = Behavior::EXISTS | Behavior::SOLID;
        pool[0].x = 0.0;
        pool[0].y = -1100.0;

        for _ in 0..20 {
            add_tree(-1000.0, &mut pool, &mut rng);
        }
        for e in pool.iter().skip(1).filter(|e| !e.is_free()) {
            assert!(!rects_overlap(
                proximity_box(pool[0].x, pool[0].y),
                proximity_box(e.x, e.y)
            ));
        }
    }

    #[test]
    fn test_outer_tree_lands_off_slope() {
        let mut pool = empty_pool();
        let mut rng = Pcg32::seed_from_u64(4);
        for _ in 0..10 {
            add_outer_tree(-1000.0, &mut pool, &mut rng);
        }
        for e in pool.iter().filter(|e| !e.is_free()) {
            assert!(e.x.abs() > HILL_WIDTH / 2.0 + 50.0);
        }
    }

    #[test]
    fn test_barrier_pair_placed_at_slope_edges() {
        let mut pool = empty_pool();
        add_barriers(-500.0, &mut pool);
        let poles: Vec<&Entity> = pool.iter().filter(|e| !e.is_free()).collect();
        assert_eq!(poles.len(), 2);
        assert_eq!(poles[0].x, -HILL_WIDTH / 2.0);
        assert_eq!(poles[1].x, HILL_WIDTH / 2.0);
        assert!(poles.iter().all(|p| p.y == -500.0));
        // Pure scenery, drawn the same way on both edges
        assert!(
            poles
                .iter()
                .all(|p| p.has_behavior(Behavior::INVINCIBLE) && !p.flipped)
        );
    }

    #[test]
    fn test_outer_tree_points_convert_at_cost() {
        use crate::Scores;

        let mut state = GameState::new(5, Scores::default());
        let live_before = state.entities.iter().filter(|e| !e.is_free()).count();
        state.outer_tree_points = 26.0;

        spawn_obstacles(&mut state);

        let live_after = state.entities.iter().filter(|e| !e.is_free()).count();
        assert_eq!(live_after, live_before + 1);
        assert!(state.outer_tree_points < 25.0);
    }

    #[test]
    fn test_player_record() {
        let mut pool = empty_pool();
        add_player(&mut pool);
        let player = &pool[PLAYER_INDEX];
        assert_eq!(player.y, STARTING_HEIGHT);
        assert_eq!(player.hp, 3);
        assert!(player.has_behavior(
            Behavior::EXISTS | Behavior::DYNAMIC | Behavior::SOLID | Behavior::EXPLODES_ON_DEATH
        ));
        assert!(!player.has_behavior(Behavior::INVINCIBLE));
    }
}

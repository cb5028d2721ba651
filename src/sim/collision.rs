//! AABB collision detection and pair resolution
//!
//! Detection is brute-force all-pairs over the live pool. Only entities
//! flagged Dynamic|Solid initiate a pair scan as the attacker, but every
//! other live entity is considered as the defender. Resolution applies, in
//! order: icing, solid separation, damage (each side independently), player
//! death bookkeeping, item drops, then death/explosion transitions. The
//! left-to-right evaluation order is part of the combat model: a snowball
//! can ice a skier before the skier's own damage check runs.

use glam::Vec2;
use rand_pcg::Pcg32;

use crate::Rect;
use crate::consts::{BOOST_SPEED, MAX_ENTITIES, PLAYER_INDEX};

use super::entity::{
    Anim, Behavior, CENTER_FRAME, Entity, SpriteSet, TRAP_CLOSED_FRAME,
};
use super::events::{GameEvent, Sound};
use super::state::{GameState, SlideLoop};

/// Strict AABB overlap test (touching edges do not collide)
#[inline]
pub fn rects_overlap(r1: Rect, r2: Rect) -> bool {
    r1.x + r1.w > r2.x && r1.x < r2.x + r2.w && r1.y + r1.h > r2.y && r1.y < r2.y + r2.h
}

/// Overlap extents of two rectangles, or `None` when they don't collide
pub fn overlap_size(r1: Rect, r2: Rect) -> Option<Vec2> {
    if !rects_overlap(r1, r2) {
        return None;
    }
    Some(Vec2::new(
        (r1.x + r1.w - r2.x).min(r2.x + r2.w - r1.x),
        (r1.y + r1.h - r2.y).min(r2.y + r2.h - r1.y),
    ))
}

/// Disjoint mutable borrows of two pool slots
fn pair_mut(entities: &mut [Entity], i: usize, j: usize) -> (&mut Entity, &mut Entity) {
    debug_assert_ne!(i, j);
    if i < j {
        let (head, tail) = entities.split_at_mut(j);
        (&mut head[i], &mut tail[0])
    } else {
        let (head, tail) = entities.split_at_mut(i);
        (&mut tail[0], &mut head[j])
    }
}

/// Icing: a CAUSES_ICE entity freezes a CAN_BE_ICED one, sacrificing hp
/// equal to the target's damage (a snowball spends itself on the freeze)
fn try_ice(causer: &mut Entity, target: &mut Entity, events: &mut Vec<GameEvent>) {
    if causer.has_behavior(Behavior::CAUSES_ICE) && target.has_behavior(Behavior::CAN_BE_ICED) {
        target.behavior |= Behavior::ICED;
        causer.add_damage(target.damage);
        events.push(GameEvent::Play(Sound::Iced));
    }
}

/// Damage one side of a colliding pair; returns whether it landed
///
/// Misses on: active invulnerability window, harmless attacker, iced
/// attacker, or mismatched height tiers (HIGH attacks sail over LOW
/// defenders and vice versa).
fn try_damage(victim: &mut Entity, attacker: &mut Entity, events: &mut Vec<GameEvent>) -> bool {
    let miss = (victim.has_behavior(Behavior::HIGH) && attacker.has_behavior(Behavior::LOW))
        || (victim.has_behavior(Behavior::LOW) && attacker.has_behavior(Behavior::HIGH));
    if !victim.invuln_timer.active()
        && attacker.damage > 0
        && !attacker.has_behavior(Behavior::ICED)
        && !miss
    {
        victim.add_damage(attacker.damage);
        victim.wish_speed *= 0.75;
        if attacker.anim.set == SpriteSet::Trap {
            events.push(GameEvent::Play(Sound::TrapClosing));
            attacker.anim.active_index = TRAP_CLOSED_FRAME;
        }
        true
    } else {
        false
    }
}

/// Death/explosion transition for one entity
///
/// `vy` carries the momentum to hand the explosion dots (the player's
/// pre-resolution momentum when the other side of the pair is the player).
fn try_death(
    entity: &mut Entity,
    vy: f32,
    now: f64,
    rng: &mut Pcg32,
    events: &mut Vec<GameEvent>,
) {
    if entity.hp <= 0 {
        if entity.has_behavior(Behavior::ICED) {
            events.push(GameEvent::Play(Sound::IceBreak));
        }
        if let Some(sound) = entity.death_sound {
            events.push(GameEvent::Play(sound));
        }
        if entity.has_behavior(Behavior::EXPLODES_ON_DEATH) {
            entity.vx = 0.0;
            entity.vy = 0.0;
            entity.explode(vy, now, rng);
            entity.anim = Anim::default();
            // Pure explosion from here: lives until its dots expire
            entity.behavior = Behavior::EXPLOSION;
        }
    }
}

/// Hand the player whichever item a defeated skier dropped
///
/// Health when below max hp, otherwise a timed boost with invincibility and
/// smash-through.
fn grant_item(state: &mut GameState) {
    use rand::Rng;

    let heal = {
        let player = state.player();
        player.hp < player.hp_max
    };
    if heal {
        state.player_mut().hp += 1;
        state.health_bar.shake_magnitude += 50.0;
        let flavor = [
            "DELICIOUS!",
            "DELECTABLE!",
            "SCRUMPTIOUS!",
            "YUMMY!",
            "MMMM!",
            "TASTY!",
        ];
        let which = state.rng.random_range(0..flavor.len());
        state.notification_text = flavor[which].to_string();
    } else {
        let player = state.player_mut();
        player.vy = -BOOST_SPEED;
        player.vx = 0.0;
        player.behavior |= Behavior::INVINCIBLE | Behavior::SMASH_EVERYTHING;
        player.boost_timer.reset();
        player.smash_timer.reset();
        player.attack_timer.time = 0.0;
        player.anim.active_index = CENTER_FRAME;
        if state.scoop_playing {
            state.scoop_playing = false;
            state.events.push(GameEvent::Stop(Sound::Scoop));
        }
        state.events.push(GameEvent::Play(Sound::Boost));
        state.notification_text = "BOOST!".to_string();
    }
    state.events.push(GameEvent::Play(Sound::Item));
    state.notification_timer.reset();
    state.skier_timer.reset();
}

/// Resolve everything a single overlapping pair implies
///
/// `player_momentum` is the player's vertical velocity sampled before any
/// resolution this frame.
fn resolve_pair(
    state: &mut GameState,
    i1: usize,
    i2: usize,
    overlap_h: f32,
    player_momentum: f32,
) {
    let now = state.play_time;
    let is_player_1 = i1 == PLAYER_INDEX;
    let is_player_2 = i2 == PLAYER_INDEX;

    {
        let (e1, e2) = pair_mut(&mut state.entities, i1, i2);

        if is_player_1 && e2.has_behavior(Behavior::SOLID) {
            state.camera.shake_magnitude += 30.0;
        }

        try_ice(e1, e2, &mut state.events);
        try_ice(e2, e1, &mut state.events);

        // Solid separation along the vertical axis, split by each side's
        // share of the relative velocity. Smash-override and iced defenders
        // skip it entirely.
        if !e1.has_behavior(Behavior::SMASH_EVERYTHING)
            && e2.has_behavior(Behavior::SOLID)
            && !e2.has_behavior(Behavior::ICED)
        {
            let dv = (e1.vy - e2.vy).abs();
            if dv > 0.0 {
                e1.y += -e1.vy / dv * overlap_h;
                e2.y += -e2.vy / dv * overlap_h;
            } else {
                // Identical velocities would divide by zero; push the pair
                // apart evenly instead
                e1.y += overlap_h / 2.0;
                e2.y -= overlap_h / 2.0;
            }
            e1.vy = (-e1.vy).clamp(-100.0, 100.0);
            e2.vy = (-e2.vy).clamp(-100.0, 100.0);
            assert!(
                e1.x.is_finite() && e1.y.is_finite() && e2.x.is_finite() && e2.y.is_finite(),
                "non-finite position after collision separation"
            );
        }

        if !e1.has_behavior(Behavior::INVINCIBLE) {
            let damaged = try_damage(e1, e2, &mut state.events);
            if is_player_1 && damaged {
                state.hits += 1;
                state.health_bar.shake_magnitude += 50.0;
                state.events.push(GameEvent::Play(Sound::Impact));
            }
        }
        if !e2.has_behavior(Behavior::INVINCIBLE) {
            let damaged = try_damage(e2, e1, &mut state.events);
            if is_player_2 && damaged {
                state.hits += 1;
                state.health_bar.shake_magnitude += 50.0;
                state.events.push(GameEvent::Play(Sound::Impact));
            }
        }
    }

    // The player just died inside this pair: record the run's low point,
    // silence the movement loops and start the death timer
    if (is_player_1 || is_player_2) && state.player().hp <= 0 {
        let player_y = state.player().y;
        state.scores.lowest = state.scores.lowest.min(player_y);
        if state.scoop_playing {
            state.scoop_playing = false;
            state.events.push(GameEvent::Stop(Sound::Scoop));
        }
        match state.slide_loop {
            SlideLoop::Center => state.events.push(GameEvent::Stop(Sound::SlideCenter)),
            SlideLoop::Side => state.events.push(GameEvent::Stop(Sound::SlideSide)),
            SlideLoop::None => {}
        }
        state.slide_loop = SlideLoop::None;
        let scores = state.scores;
        state.events.push(GameEvent::ScoresChanged(scores));
        state.death_timer.reset();
    }

    // Item drops go to the player even when they weren't part of the pair
    // (a snowball kill still pays out)
    let dropped = {
        let e1 = &state.entities[i1];
        let e2 = &state.entities[i2];
        (e1.has_behavior(Behavior::DROPS_ITEM) && e1.hp <= 0)
            || (e2.has_behavior(Behavior::DROPS_ITEM) && e2.hp <= 0)
    };
    if dropped {
        grant_item(state);
    }

    let vy1 = if is_player_2 { player_momentum } else { 0.0 };
    try_death(&mut state.entities[i1], vy1, now, &mut state.rng, &mut state.events);
    let vy2 = if is_player_1 { player_momentum } else { 0.0 };
    try_death(&mut state.entities[i2], vy2, now, &mut state.rng, &mut state.events);
}

/// Brute-force pair scan and resolution over the whole pool
pub fn resolve_collisions(state: &mut GameState, player_momentum: f32) {
    for i1 in 0..MAX_ENTITIES {
        {
            let e1 = &state.entities[i1];
            if !e1.has_behavior(Behavior::DYNAMIC | Behavior::SOLID) || e1.hp <= 0 {
                continue;
            }
        }
        for i2 in 0..MAX_ENTITIES {
            if i1 == i2 {
                continue;
            }
            if state.entities[i2].hp <= 0 {
                continue;
            }
            let overlap = overlap_size(
                state.entities[i1].hitbox_world(),
                state.entities[i2].hitbox_world(),
            );
            let Some(overlap) = overlap else { continue };

            resolve_pair(state, i1, i2, overlap.y, player_momentum);

            // The attacker may have died or stopped being solid mid-pair
            let e1 = &state.entities[i1];
            if !e1.has_behavior(Behavior::DYNAMIC | Behavior::SOLID) || e1.hp <= 0 {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Scores;
    use crate::consts::SIM_DT;
    use crate::sim::entity::{DotKind, Timer};

    fn blank_state() -> GameState {
        let mut state = GameState::new(42, Scores::default());
        for e in state.entities.iter_mut() {
            e.clear();
        }
        state.events.clear();
        state
    }

    fn overlapping_pair() -> (Entity, Entity) {
        let mut a = Entity::default();
        a.behavior = Behavior::EXISTS | Behavior::DYNAMIC | Behavior::SOLID;
        a.hp = 3;
        a.hitbox = Rect::new(-25.0, -25.0, 50.0, 50.0);
        let mut b = a.clone();
        b.behavior = Behavior::EXISTS | Behavior::SOLID;
        b.x = 10.0;
        (a, b)
    }

    #[test]
    fn test_overlap_strictness() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let touching = Rect::new(10.0, 0.0, 10.0, 10.0);
        let overlapping = Rect::new(9.0, 5.0, 10.0, 10.0);
        assert!(!rects_overlap(a, touching));
        assert!(rects_overlap(a, overlapping));
        assert_eq!(overlap_size(a, overlapping), Some(Vec2::new(1.0, 5.0)));
        assert_eq!(overlap_size(a, touching), None);
    }

    #[test]
    fn test_damage_respects_invuln_window() {
        let mut state = blank_state();
        let (mut a, b) = overlapping_pair();
        a.invuln_timer = Timer::with_max(3.0);
        state.entities[PLAYER_INDEX] = a;
        state.entities[2] = b;
        state.entities[2].damage = 1;
        state.entities[2].hp = 100;
        state.entities[2].behavior |= Behavior::INVINCIBLE;

        resolve_collisions(&mut state, 0.0);
        assert_eq!(state.player().hp, 2);
        assert_eq!(state.hits, 1);
        // Survivor gets the full window back
        assert_eq!(state.player().invuln_timer.time, 3.0);

        // A second overlapping frame inside the window must not land
        state.player_mut().invuln_timer.tick(SIM_DT);
        state.player_mut().y = 0.0;
        state.entities[2].y = 0.0;
        resolve_collisions(&mut state, 0.0);
        assert_eq!(state.player().hp, 2);
        assert_eq!(state.hits, 1);
    }

    #[test]
    fn test_height_tier_mismatch_misses() {
        let mut state = blank_state();
        let (mut a, mut b) = overlapping_pair();
        a.behavior |= Behavior::HIGH;
        a.hp = 1;
        b.behavior |= Behavior::LOW;
        b.damage = 100;
        b.hp = 100;
        state.entities[3] = a;
        state.entities[4] = b;

        resolve_collisions(&mut state, 0.0);
        // The HIGH attacker flies over the LOW defender: no damage either way
        assert_eq!(state.entities[3].hp, 1);
        assert_eq!(state.entities[4].hp, 100);
    }

    #[test]
    fn test_icing_costs_the_causer_its_hp() {
        let mut state = blank_state();
        let (mut ball, mut skier) = overlapping_pair();
        ball.behavior |= Behavior::CAUSES_ICE | Behavior::EXPLODES_ON_DEATH;
        ball.hp = 1;
        ball.explosion_kind = DotKind::Snow;
        skier.behavior |= Behavior::CAN_BE_ICED;
        skier.hp = 1;
        skier.damage = 1;
        state.entities[2] = ball;
        state.entities[3] = skier;

        resolve_collisions(&mut state, 0.0);

        // Skier frozen in place, snowball spent and exploded
        assert!(state.entities[3].has_behavior(Behavior::ICED));
        assert_eq!(state.entities[2].behavior, Behavior::EXPLOSION);
        assert!(!state.entities[2].dots.is_empty());
        assert!(state.events.contains(&GameEvent::Play(Sound::Iced)));
    }

    #[test]
    fn test_separation_skipped_when_smashing() {
        let mut state = blank_state();
        let (mut a, b) = overlapping_pair();
        a.behavior |= Behavior::SMASH_EVERYTHING | Behavior::INVINCIBLE;
        a.vy = -3000.0;
        let y_before = a.y;
        state.entities[2] = a;
        state.entities[3] = b;

        resolve_collisions(&mut state, 0.0);
        assert_eq!(state.entities[2].y, y_before);
        assert_eq!(state.entities[2].vy, -3000.0);
    }

    #[test]
    fn test_separation_bounces_and_clamps() {
        let mut state = blank_state();
        let (mut a, b) = overlapping_pair();
        a.vy = -700.0;
        state.entities[2] = a;
        state.entities[3] = b;

        resolve_collisions(&mut state, 0.0);
        // Reflected and clamped into the small anti-penetration range
        assert_eq!(state.entities[2].vy, 100.0);
        assert!(state.entities[2].y > 0.0);
    }

    #[test]
    fn test_equal_velocity_pair_separates_without_nan() {
        let mut state = blank_state();
        let (mut a, mut b) = overlapping_pair();
        a.vy = -50.0;
        b.vy = -50.0;
        state.entities[2] = a;
        state.entities[3] = b;

        resolve_collisions(&mut state, 0.0);
        assert!(state.entities[2].y.is_finite());
        assert!(state.entities[3].y.is_finite());
        assert_ne!(state.entities[2].y, state.entities[3].y);
    }

    #[test]
    fn test_item_drop_grants_health_below_max() {
        let mut state = blank_state();
        let (mut ball, mut skier) = overlapping_pair();
        ball.behavior |= Behavior::CAUSES_ICE;
        ball.hp = 1;
        skier.behavior |= Behavior::CAN_BE_ICED | Behavior::DROPS_ITEM | Behavior::EXPLODES_ON_DEATH;
        skier.hp = 1;
        skier.damage = 1;
        skier.explosion_kind = DotKind::Blood;
        state.entities[2] = ball;
        state.entities[3] = skier;

        // Damage the freshly killed skier's hp below zero via icing cost:
        // the skier dies to the ball's damage exchange
        state.entities[2].damage = 1;
        let mut player = Entity::default();
        player.behavior = Behavior::EXISTS | Behavior::DYNAMIC | Behavior::SOLID;
        player.hp = 1;
        player.hp_max = 3;
        player.x = 5000.0; // far away, not part of the pair
        state.entities[PLAYER_INDEX] = player;

        resolve_collisions(&mut state, 0.0);
        assert_eq!(state.player().hp, 2, "kill payout reaches the player");
        assert!(state.events.contains(&GameEvent::Play(Sound::Item)));
        assert!(state.notification_timer.active());
    }

    #[test]
    fn test_item_drop_grants_boost_at_full_health() {
        let mut state = blank_state();
        let mut player = Entity::default();
        player.behavior = Behavior::EXISTS | Behavior::DYNAMIC | Behavior::SOLID;
        player.hp = 3;
        player.hp_max = 3;
        player.hitbox = Rect::new(-25.0, -25.0, 50.0, 50.0);
        player.boost_timer = Timer::with_max(5.0);
        player.smash_timer = Timer::with_max(6.0);
        // Inside the invulnerability window: the skier can't chip the
        // player's hp on the way in, so the drop pays out as a boost
        player.invuln_timer = Timer { time: 1.0, max: 3.0 };
        state.entities[PLAYER_INDEX] = player;

        let mut skier = Entity::default();
        skier.behavior = Behavior::EXISTS | Behavior::SOLID | Behavior::DROPS_ITEM;
        skier.hp = 1;
        skier.damage = 1;
        skier.x = 10.0;
        skier.hitbox = Rect::new(-25.0, -25.0, 50.0, 50.0);
        state.entities[2] = skier;

        // Player at full hp runs the skier down (player damage kills it)
        state.entities[PLAYER_INDEX].damage = 3;
        resolve_collisions(&mut state, -700.0);

        let player = state.player();
        assert_eq!(player.vy, -BOOST_SPEED);
        assert!(player.has_behavior(Behavior::INVINCIBLE | Behavior::SMASH_EVERYTHING));
        assert!(player.boost_timer.active());
        assert!(player.smash_timer.active());
        assert_eq!(state.notification_text, "BOOST!");
    }

    #[test]
    fn test_player_death_records_low_point_and_starts_timer() {
        let mut state = blank_state();
        state.scores.lowest = 100_000.0;

        let mut player = Entity::default();
        player.behavior =
            Behavior::EXISTS | Behavior::DYNAMIC | Behavior::SOLID | Behavior::EXPLODES_ON_DEATH;
        player.hp = 1;
        player.y = 50_000.0;
        player.hitbox = Rect::new(-25.0, -25.0, 50.0, 50.0);
        player.explosion_kind = DotKind::Blood;
        state.entities[PLAYER_INDEX] = player;

        let mut trap = Entity::default();
        trap.behavior = Behavior::EXISTS | Behavior::INVINCIBLE;
        trap.hp = 100;
        trap.damage = 100;
        trap.x = 10.0;
        trap.y = 50_000.0;
        trap.hitbox = Rect::new(-25.0, -25.0, 50.0, 50.0);
        state.entities[2] = trap;

        resolve_collisions(&mut state, -700.0);

        assert!(state.player().hp <= 0);
        assert_eq!(state.scores.lowest, 50_000.0);
        assert!(state.death_timer.active());
        assert!(
            state
                .events
                .iter()
                .any(|e| matches!(e, GameEvent::ScoresChanged(_)))
        );
        // Momentum hands off to what the player kills, not to the player's
        // own death burst
        assert_eq!(state.player().behavior, Behavior::EXPLOSION);
        assert!(state.player().dots.iter().all(|d| d.vy == 0.0));
    }
}

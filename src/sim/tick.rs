//! Per-frame orchestration and the phase machine
//!
//! [`tick`] runs one fixed-timestep frame in a strict order: menu/phase
//! transitions, player control, spawning, entity integration, collision
//! resolution, then the presentation-adjacent bookkeeping (camera, health
//! bar, win check, menu navigation). The order is load-bearing; collision
//! resolution in particular must see positions integrated this frame.

use rand::Rng;

use crate::consts::{
    BOOST_SPEED, CAMERA_FOLLOW_DISTANCE, CAMERA_SCROLL_SPEED, HILL_WIDTH, MAX_ENTITIES,
    PLAYER_ACCELERATION, PLAYER_INDEX, PLAYER_WIDTH, SKIER_ACCELERATION, SNOWBALL_SPEED,
};

use super::collision::resolve_collisions;
use super::entity::{
    Behavior, CENTER_FRAME, CENTER_GRAB_FRAME, CENTER_THROW_FRAME, DotKind, HURT_FRAME,
    LEFT_FRAME, LEFT_GRAB_FRAME, LEFT_THROW_FRAME, RIGHT_FRAME, RIGHT_GRAB_FRAME,
    RIGHT_THROW_FRAME, SHOCKED_FRAME,
};
use super::events::{GameEvent, MusicTrack, Sound};
use super::spawn;
use super::state::{GamePhase, GameState, MenuItem, SlideLoop, TickInput};

/// Menu open/close and forced-death transitions, evaluated on last frame's
/// state before anything simulates
fn update_phase(state: &mut GameState, input: &TickInput) {
    if input.pause {
        match state.phase {
            GamePhase::Playing => {
                state.phase = GamePhase::MenuPaused;
                state.push_event(GameEvent::PauseAll);
            }
            GamePhase::MenuPaused => {
                state.phase = GamePhase::Playing;
                state.push_event(GameEvent::ResumeAll);
            }
            GamePhase::Dying => {
                state.phase = GamePhase::MenuDead;
                state.push_event(GameEvent::PauseAll);
            }
            GamePhase::MenuDead if state.death_timer.active() => {
                state.phase = GamePhase::Dying;
                state.push_event(GameEvent::ResumeAll);
            }
            GamePhase::MenuDead => {}
        }
    }
    if state.phase == GamePhase::Dying && !state.death_timer.active() {
        state.phase = GamePhase::MenuDead;
        state.push_event(GameEvent::PauseAll);
    }
    if input.mute {
        state.muted = !state.muted;
    }
}

/// Tick the player's action timers, firing their expiry edges
fn update_player_timers(state: &mut GameState, dt: f32) {
    let was_scooping = state.player().attack_timer.active();
    state.player_mut().attack_timer.tick(dt);
    if was_scooping && !state.player().attack_timer.active() {
        state.push_event(GameEvent::Play(Sound::SnowballReady));
    }

    let was_boosting = state.player().boost_timer.active();
    state.player_mut().boost_timer.tick(dt);
    if was_boosting && !state.player().boost_timer.active() {
        // Invulnerability lingers past the boost so running out mid-pack
        // isn't an instant death
        state.player_mut().invuln_timer.reset();
        state.skier_timer.reset();
        state.player_mut().behavior.remove(Behavior::INVINCIBLE);
        state.push_event(GameEvent::Stop(Sound::Boost));
    }

    let was_smashing = state.player().smash_timer.active();
    state.player_mut().smash_timer.tick(dt);
    if was_smashing && !state.player().smash_timer.active() {
        state.player_mut().behavior.remove(Behavior::SMASH_EVERYTHING);
    }
}

/// Player control: throwing, steering, descent, trails and the movement
/// sound loops
fn update_player(state: &mut GameState, input: &TickInput, dt: f32) {
    if state.player().hp <= 0 {
        return;
    }
    let now = state.play_time;

    if !state.player().boost_timer.active() {
        if input.action && !state.player().attack_timer.active() {
            let (px, py, pvy) = {
                let p = state.player();
                (p.x, p.y, p.vy)
            };
            if spawn::add_snowball(
                px,
                py - 50.0,
                pvy - SNOWBALL_SPEED,
                &mut state.entities,
                &mut state.rng,
            ) {
                state.player_mut().attack_timer.reset();
                state.push_event(GameEvent::Play(Sound::SnowballThrow));
            }
        }

        {
            let player = &mut state.entities[PLAYER_INDEX];
            let (throw_frame, grab_frame, idle_frame, steer) = if input.move_dir.x > 0.0 {
                (RIGHT_THROW_FRAME, RIGHT_GRAB_FRAME, RIGHT_FRAME, 1.0)
            } else if input.move_dir.x < 0.0 {
                (LEFT_THROW_FRAME, LEFT_GRAB_FRAME, LEFT_FRAME, -1.0)
            } else {
                (CENTER_THROW_FRAME, CENTER_GRAB_FRAME, CENTER_FRAME, 0.0)
            };
            // The first 20% of the attack window shows the throw, the rest
            // the scoop-up
            let attack = player.attack_timer;
            player.anim.active_index = if attack.time > attack.max * 0.8 {
                throw_frame
            } else if attack.time > 0.0 {
                grab_frame
            } else {
                idle_frame
            };
            player.vx = steer * player.wish_speed * 2.0;
        }

        let target = if state.player().vx == 0.0 {
            SlideLoop::Center
        } else {
            SlideLoop::Side
        };
        if state.slide_loop != target {
            match state.slide_loop {
                SlideLoop::Center => state.push_event(GameEvent::Stop(Sound::SlideCenter)),
                SlideLoop::Side => state.push_event(GameEvent::Stop(Sound::SlideSide)),
                SlideLoop::None => {}
            }
            state.push_event(GameEvent::Play(match target {
                SlideLoop::Side => Sound::SlideSide,
                _ => Sound::SlideCenter,
            }));
            state.slide_loop = target;
        }

        if state.player().vy > 0.0 {
            state.player_mut().anim.active_index = HURT_FRAME;
        }

        // Speed-scaled snow trail: the faster the descent, the more frames
        // pass the random gate
        let speed = state.player().vy.abs() as i32;
        if state.rng.random_range(0..=700) < speed && !state.player().snow_timer.active() {
            let x = state.rng.random_range(-10..=10) as f32;
            let y = state.rng.random_range(-30..=0) as f32;
            let vx = state.rng.random_range(-100..=100) as f32;
            let vz = state.rng.random_range(-100..=100) as f32;
            let player = &mut state.entities[PLAYER_INDEX];
            player.add_trail(
                player.x + x,
                player.y + y,
                0.0,
                vx,
                0.0,
                300.0 + vz,
                now,
                now + 0.5,
                1,
                DotKind::Snow,
            );
            player.snow_timer.reset();
        }

        // Scoop loop runs during the grab portion of the attack window
        let attack = state.player().attack_timer;
        if attack.time > attack.max * 0.8 {
        } else if attack.time > 0.0 {
            if !state.scoop_playing {
                state.scoop_playing = true;
                state.push_event(GameEvent::Play(Sound::Scoop));
            }
        } else if state.scoop_playing {
            state.scoop_playing = false;
            state.push_event(GameEvent::Stop(Sound::Scoop));
        }

        // Descent approach: accelerate toward -wish_speed, five times harder
        // when over-speed (post-boost recovery)
        let player = &mut state.entities[PLAYER_INDEX];
        if player.vy > -player.wish_speed {
            player.vy -= PLAYER_ACCELERATION * dt;
            player.vy = player.vy.max(-player.wish_speed);
        } else if player.vy < -player.wish_speed {
            player.vy += 5.0 * PLAYER_ACCELERATION * dt;
            player.vy = player.vy.min(-player.wish_speed);
        }
        player.x = player
            .x
            .clamp(-HILL_WIDTH / 2.0 + PLAYER_WIDTH, HILL_WIDTH / 2.0 - PLAYER_WIDTH);
        // Difficulty ramp: wish speed creeps up with distance travelled
        player.wish_speed += (-player.vy * dt).max(0.0) / 100.0;
    } else {
        // Boosting: no control, speed pinned, rocket trail
        if !state.player().snow_timer.active() {
            for _ in 0..10 {
                let (w, h) = {
                    let p = state.player();
                    (p.width, p.height)
                };
                let x = state
                    .rng
                    .random_range(-(w / 2.0) as i32..=(w / 2.0) as i32) as f32;
                let y = state.rng.random_range(-30..=0) as f32;
                let z = state
                    .rng
                    .random_range((h * 0.2) as i32..=(h * 0.8) as i32) as f32;
                let vx = state.rng.random_range(-100..=100) as f32;
                let player = &mut state.entities[PLAYER_INDEX];
                player.add_trail(
                    player.x + x,
                    player.y + y,
                    z,
                    vx,
                    -2000.0,
                    0.0,
                    now,
                    now + 0.5,
                    1,
                    DotKind::Boost,
                );
            }
            state.player_mut().snow_timer.reset();
        }
        state.player_mut().vy = -BOOST_SPEED;
        state.camera.shake_magnitude = 100.0;
    }
}

/// Integrate every pool slot: skier AI, movement, particles, despawn and
/// per-entity timers
fn update_entities(state: &mut GameState, dt: f32) {
    let now = state.play_time;
    let camera_y = state.camera.y;

    for i in 0..MAX_ENTITIES {
        // Skier AI reads the player through a per-slot snapshot; the player
        // sits at a low index so later slots see this frame's position
        let (player_x, player_y, player_wish, player_boosting) = {
            let p = &state.entities[PLAYER_INDEX];
            (p.x, p.y, p.wish_speed, p.boost_timer.active())
        };
        let entity = &mut state.entities[i];

        if !entity.has_behavior(Behavior::ICED) {
            if entity.hp <= 0 {
                // Dead but still animating: bleed off momentum
                entity.vy *= 1.0 - 0.5 * dt;
                entity.vx *= 1.0 - 0.5 * dt;
            } else if entity.has_behavior(Behavior::SKIER) {
                if entity.x < entity.center_x {
                    entity.vx += SKIER_ACCELERATION * dt;
                } else {
                    entity.vx -= SKIER_ACCELERATION * dt;
                }
                entity.anim.active_index = if entity.vx < -400.0 {
                    LEFT_FRAME
                } else if entity.vx < 400.0 {
                    CENTER_FRAME
                } else {
                    RIGHT_FRAME
                };

                // Skiers race ahead but never drop more than 50 behind the
                // player (unless the player is boosting past them)
                if !player_boosting {
                    entity.y = entity.y.min(player_y - 50.0);
                }
                if entity.y == player_y - 50.0 && (player_x - entity.x).abs() < 200.0 {
                    // Pinned at the edge with the player closing in: surge
                    entity.wish_speed = player_wish + 400.0;
                    if !entity.shocked_timer.active() {
                        state.events.push(GameEvent::Play(Sound::Squawk));
                    }
                    entity.shocked_timer.reset();
                } else {
                    entity.wish_speed = (entity.wish_speed - 25.0 * dt).max(500.0);
                }
                entity.vy = -entity.wish_speed;
                if entity.shocked_timer.active() {
                    entity.anim.active_index = SHOCKED_FRAME;
                }

                if !entity.snow_timer.active() {
                    let x = state.rng.random_range(-10..=10) as f32;
                    let y = state.rng.random_range(-30..=0) as f32;
                    let vx = state.rng.random_range(-100..=100) as f32;
                    let vz = state.rng.random_range(-100..=100) as f32;
                    entity.add_trail(
                        entity.x + x,
                        entity.y + y,
                        0.0,
                        vx,
                        0.0,
                        300.0 + vz,
                        now,
                        now + 2.0,
                        1,
                        DotKind::Snow,
                    );
                    entity.snow_timer.reset();
                }
            }
            entity.y += entity.vy * dt;
            entity.x += entity.vx * dt;
        }

        let dots_living = entity.update_dots(now, dt);

        if i != PLAYER_INDEX {
            if entity.has_behavior(Behavior::EXPLOSION) {
                if !dots_living {
                    entity.clear();
                }
            } else if entity.y > camera_y + 50.0 || entity.y < camera_y - 3000.0 {
                entity.clear();
            }
        }

        entity.invuln_timer.tick(dt);
        entity.shocked_timer.tick(dt);
        entity.snow_timer.tick(dt);
    }
}

/// Health bar fullness chases hp with overshoot snap
fn update_health_bar(state: &mut GameState, dt: f32) {
    let (hp, hp_max) = {
        let p = state.player();
        (p.hp.max(0), p.hp_max.max(1))
    };
    let health = hp as f32 / hp_max as f32;
    let diff = health - state.health_bar.fullness;
    let change = diff * 3.0;
    if (change * dt).abs() > diff.abs() {
        state.health_bar.fullness = health;
    } else {
        state.health_bar.fullness += change * dt;
    }
}

/// One-shot endless-mode transition at altitude zero
fn update_win(state: &mut GameState) {
    if state.player().y <= 0.0 && !state.finished {
        state.finished = true;
        state.push_event(GameEvent::Play(Sound::Win));
        state.notification_text = "FINISHED!\nNow playing endless mode...".to_string();
        state.notification_timer.reset();
        state.scores.wins += 1;
        if state.scores.fastest_time <= -1.0 {
            state.scores.fastest_time = state.play_time;
        } else {
            state.scores.fastest_time = state.scores.fastest_time.min(state.play_time);
        }
        if state.scores.fewest_hits <= -1 {
            state.scores.fewest_hits = state.hits;
        } else {
            state.scores.fewest_hits = state.scores.fewest_hits.min(state.hits);
        }
        let scores = state.scores;
        state.push_event(GameEvent::ScoresChanged(scores));
    }
}

/// Menu navigation and confirmation
fn update_menu(state: &mut GameState, input: &TickInput) {
    if !state.phase.menu_open() {
        return;
    }
    if input.move_dir.y > 0.0 {
        let prev = state.menu_selection;
        state.menu_selection = (state.menu_selection + 1).min(1);
        if state.menu_selection != prev {
            state.push_event(GameEvent::Play(Sound::Click));
        }
    } else if input.move_dir.y < 0.0 {
        let prev = state.menu_selection;
        state.menu_selection = (state.menu_selection - 1).max(0);
        if state.menu_selection != prev {
            state.push_event(GameEvent::Play(Sound::Click));
        }
    }
    if input.action {
        match MenuItem::from_index(state.menu_selection) {
            MenuItem::NewRun => {
                state.new_run();
                state.push_event(GameEvent::ResumeAll);
            }
            MenuItem::Quit => state.quit = true,
        }
        state.push_event(GameEvent::Play(Sound::Click));
    }
}

/// Advance the simulation by one fixed timestep
pub fn tick(state: &mut GameState, input: &TickInput, dt: f32) {
    // Sampled before resolution so explosions inherit pre-impact momentum
    let player_momentum = state.player().vy;

    update_phase(state, input);

    if state.phase.simulating() {
        state.play_time += dt as f64;
        // Exponential music crossfade toward gameplay
        state.music_volume = (1.0 - (1.0 - state.music_volume) * 0.9).min(1.0);
        state.menu_music_volume = (state.menu_music_volume * 0.9).max(0.0);

        update_player_timers(state, dt);
        state.death_timer.tick(dt);
        state.skier_timer.tick(dt);
        state.camera.shake_magnitude = (state.camera.shake_magnitude - dt * 200.0).max(0.0);
        state.health_bar.shake_magnitude =
            (state.health_bar.shake_magnitude - dt * 200.0).max(0.0);
        state.notification_timer.tick(dt);

        update_player(state, input, dt);
        spawn::advance_barriers(state);
        spawn::spawn_obstacles(state);
        spawn::spawn_skier_reinforcement(state);
        update_entities(state, dt);
        resolve_collisions(state, player_momentum);

        if state.phase == GamePhase::Playing && state.player().hp <= 0 {
            state.phase = GamePhase::Dying;
        }
    } else {
        // Paused: crossfade toward the menu track
        state.menu_music_volume = (1.0 - (1.0 - state.menu_music_volume) * 0.9).min(1.0);
        state.music_volume = (state.music_volume * 0.9).max(0.0);
    }

    update_health_bar(state, dt);

    // Camera: follow while the run plays out, drift downhill over the dead
    // menu scene
    let (player_hp, player_x, player_y) = {
        let p = state.player();
        (p.hp, p.x, p.y)
    };
    if player_hp > 0 || state.death_timer.active() {
        state
            .camera
            .track(player_x, player_y + CAMERA_FOLLOW_DISTANCE, 40.0, dt);
    } else {
        let target_y = state.camera.y - CAMERA_SCROLL_SPEED * dt;
        state.camera.track(0.0, target_y, 5.0, dt);
    }

    // Redraw shake offsets every other tick so the jitter reads as noise
    // rather than a smooth orbit
    if (state.play_time * 200.0) as i64 % 2 == 0 {
        state.camera.shake_x = state.rng.random_range(-50..=50) as f32 / 100.0;
        state.camera.shake_y = state.rng.random_range(-50..=50) as f32 / 100.0;
        state.health_bar.shake_x = state.rng.random_range(-50..=50) as f32 / 100.0;
        state.health_bar.shake_y = state.rng.random_range(-50..=50) as f32 / 100.0;
    }

    // Every unit of new descent funds every spawn category equally
    if state.camera.y < state.furthest_y {
        let points_added = state.furthest_y - state.camera.y;
        state.furthest_y = state.camera.y;
        state.skier_points += points_added;
        state.outer_tree_points += points_added;
        state.debris_points += points_added;
        state.tree_points += points_added;
        state.trap_points += points_added;
        state.rock_points += points_added;
    }

    update_win(state);
    update_menu(state, input);

    // Mirror the music volumes out every tick; muting zeroes them without
    // touching the stored fade state
    let (gameplay, menu) = if state.muted {
        (0.0, 0.0)
    } else {
        (state.music_volume, state.menu_music_volume)
    };
    state.push_event(GameEvent::MusicVolume {
        track: MusicTrack::Gameplay,
        volume: gameplay,
    });
    state.push_event(GameEvent::MusicVolume {
        track: MusicTrack::Menu,
        volume: menu,
    });
}

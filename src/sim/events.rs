//! Simulation output events
//!
//! The sim never touches the audio device or the filesystem. Anything with a
//! side effect outside the game state is queued as a [`GameEvent`] and drained
//! by the shell after each tick.

use serde::{Deserialize, Serialize};

use crate::scores::Scores;

/// Sound effect identifiers, mapped to actual clips by the shell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sound {
    Boost,
    Click,
    IceBreak,
    Iced,
    Impact,
    Item,
    SkierCrunch,
    PlayerDeath,
    Squawk,
    RockBreak,
    /// Looping snow-scooping sound while winding up a throw
    Scoop,
    SnowballImpact,
    SnowballReady,
    SnowballThrow,
    TrapClosing,
    TreeBreak,
    Win,
    /// Looping sled noise while going straight
    SlideCenter,
    /// Looping carve noise while steering
    SlideSide,
}

/// Music streams with independent volume control
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MusicTrack {
    Gameplay,
    Menu,
}

/// One side effect requested by the simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GameEvent {
    Play(Sound),
    Stop(Sound),
    /// Pause every playing sound (menu opened)
    PauseAll,
    /// Resume previously paused sounds (menu closed)
    ResumeAll,
    MusicVolume { track: MusicTrack, volume: f32 },
    /// Best-run record changed; the shell should persist it
    ScoresChanged(Scores),
}

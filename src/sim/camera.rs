//! Tracking camera and the pseudo-3D projection
//!
//! The slope is drawn with a fake perspective: a pure function maps world
//! rectangles to screen rectangles, shrinking and converging toward a
//! vanishing point as the y-distance from the camera grows. The projection
//! constants are load-bearing; renderers rely on them being reproduced
//! exactly.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::Rect;
use crate::consts::{
    CAMERA_FOLLOW_DISTANCE, CLIPPING_PLANE, TRACK_Y_PERFECTLY, VIEW_DISTANCE, WINDOW_HEIGHT,
    WINDOW_WIDTH,
};

use super::entity::Dot;

/// Smoothed player-tracking camera with screen shake
///
/// Shares the entity coordinate system: x lateral, y altitude.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Camera {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    /// Decays linearly toward zero; scales the shake offsets
    pub shake_magnitude: f32,
    pub shake_x: f32,
    pub shake_y: f32,
}

impl Camera {
    /// Approach `(x, y)` with a velocity proportional to the remaining gap,
    /// snapping when a step would overshoot. Never oscillates.
    ///
    /// Vertical tracking snaps every frame when [`TRACK_Y_PERFECTLY`] is set.
    pub fn track(&mut self, x: f32, y: f32, speed: f32, dt: f32) {
        let diff_x = x - self.x;
        let vx = diff_x * speed;
        if (vx * dt).abs() > diff_x.abs() {
            self.x = x;
        } else {
            self.x += vx * dt;
        }
        if TRACK_Y_PERFECTLY {
            self.y = y;
        } else {
            let diff_y = y - self.y;
            let vy = diff_y * speed;
            if (vy * dt).abs() > diff_y.abs() {
                self.y = y;
            } else {
                self.y += vy * dt;
            }
        }
    }
}

/// Project a world rectangle to screen space
///
/// Returns the screen rectangle and whether it falls inside the visible
/// depth range `[CLIPPING_PLANE, VIEW_DISTANCE]`.
pub fn project_rect(camera: &Camera, input: Rect) -> (Rect, bool) {
    // y distance relative to the camera, flipped since we look downhill
    let y_diff = -((input.y + input.h) - camera.y);
    if !(CLIPPING_PLANE..=VIEW_DISTANCE).contains(&y_diff) {
        return (Rect::default(), false);
    }
    let x_diff = (input.x + input.w / 2.0) - camera.x;
    let scale = CAMERA_FOLLOW_DISTANCE / y_diff;

    let w = input.w * scale;
    let h = input.h * scale;
    let mut x = (x_diff * scale - w / 2.0) + WINDOW_WIDTH / 2.0;
    // Ground-plane curve: https://www.desmos.com/calculator/lutldqk9dn
    let mut y = WINDOW_HEIGHT - (500.0 - (500.0 * 105.0) / y_diff) - h;

    x -= camera.shake_x * scale * camera.shake_magnitude;
    y -= camera.shake_y * scale * camera.shake_magnitude;

    (Rect::new(x, y, w, h), true)
}

/// Project a single dot, returning its screen position and size
///
/// Dots render as fixed 10-unit world squares lifted by their `z` height.
pub fn project_dot(camera: &Camera, y: f32, dot: &Dot) -> (Vec2, f32) {
    let y_diff = -((y + 10.0) - camera.y);

    let x_diff = (dot.x + 10.0 / 2.0) - camera.x;
    let scale = CAMERA_FOLLOW_DISTANCE / y_diff;

    let size = 10.0 * scale;
    let mut x = (x_diff * scale - size / 2.0) + WINDOW_WIDTH / 2.0;
    let mut y = WINDOW_HEIGHT - (500.0 - (500.0 * 105.0) / y_diff) - size - dot.z * scale;

    x -= camera.shake_x * scale * camera.shake_magnitude;
    y -= camera.shake_y * scale * camera.shake_magnitude;

    (Vec2::new(x, y), size)
}

//! Viewport scaling engine
//!
//! Maps the core's fixed-size framebuffer onto an arbitrary display surface.
//! Everything here is a pure function of its inputs so it can run on every
//! surface resize without touching the core.
//!
//! # Policies
//!
//! - **FitScreen**: stretch to the whole surface, aspect ratio ignored.
//! - **MaintainAspect**: largest real-valued scale that fits, centered.
//! - **PixelPerfect**: largest integer scale that fits, clamped to
//!   `1..=MAX_INTEGER_SCALE`, centered.

use crate::types::GameGeometry;
use serde::{Deserialize, Serialize};

/// Largest integer factor used by [`ScalingPolicy::PixelPerfect`].
pub const MAX_INTEGER_SCALE: u32 = 8;

/// How the framebuffer is fitted into the surface. Persisted as an integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum ScalingPolicy {
    #[default]
    FitScreen,
    MaintainAspect,
    PixelPerfect,
}

impl ScalingPolicy {
    pub const ALL: [ScalingPolicy; 3] = [
        ScalingPolicy::FitScreen,
        ScalingPolicy::MaintainAspect,
        ScalingPolicy::PixelPerfect,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ScalingPolicy::FitScreen => "fit-screen",
            ScalingPolicy::MaintainAspect => "maintain-aspect",
            ScalingPolicy::PixelPerfect => "pixel-perfect",
        }
    }

    /// Parse either the kebab-case name or the stored integer.
    pub fn from_name(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "fit-screen" | "fit" | "0" => Some(ScalingPolicy::FitScreen),
            "maintain-aspect" | "aspect" | "1" => Some(ScalingPolicy::MaintainAspect),
            "pixel-perfect" | "integer" | "2" => Some(ScalingPolicy::PixelPerfect),
            _ => None,
        }
    }
}

impl From<i64> for ScalingPolicy {
    /// Unknown values fall back to the default policy.
    fn from(value: i64) -> Self {
        match value {
            1 => ScalingPolicy::MaintainAspect,
            2 => ScalingPolicy::PixelPerfect,
            _ => ScalingPolicy::FitScreen,
        }
    }
}

impl From<ScalingPolicy> for i64 {
    fn from(policy: ScalingPolicy) -> Self {
        match policy {
            ScalingPolicy::FitScreen => 0,
            ScalingPolicy::MaintainAspect => 1,
            ScalingPolicy::PixelPerfect => 2,
        }
    }
}

/// Destination rectangle inside the surface, origin at the top-left.
///
/// Offsets are signed: a pixel-perfect image on a surface smaller than the
/// source is cropped evenly on both sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Viewport {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    /// A degenerate viewport; callers must skip drawing.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Compute the viewport for `policy` using the default integer scale cap.
pub fn compute_viewport(
    geometry: &GameGeometry,
    surface_width: u32,
    surface_height: u32,
    policy: ScalingPolicy,
) -> Viewport {
    compute_viewport_capped(
        geometry,
        surface_width,
        surface_height,
        policy,
        MAX_INTEGER_SCALE,
    )
}

/// Same as [`compute_viewport`] with an explicit cap for the integer scale.
/// A cap of 0 is treated as 1.
pub fn compute_viewport_capped(
    geometry: &GameGeometry,
    surface_width: u32,
    surface_height: u32,
    policy: ScalingPolicy,
    max_scale: u32,
) -> Viewport {
    let degenerate = surface_width == 0
        || surface_height == 0
        || geometry.base_width == 0
        || geometry.base_height == 0;

    let (width, height) = match policy {
        ScalingPolicy::FitScreen => {
            return Viewport {
                x: 0,
                y: 0,
                width: surface_width,
                height: surface_height,
            }
        }
        _ if degenerate => return Viewport::default(),
        ScalingPolicy::MaintainAspect => {
            let scale = real_scale(geometry, surface_width, surface_height);
            (
                (geometry.base_width as f64 * scale).round() as u32,
                (geometry.base_height as f64 * scale).round() as u32,
            )
        }
        ScalingPolicy::PixelPerfect => {
            let scale = integer_scale(geometry, surface_width, surface_height, max_scale);
            (geometry.base_width * scale, geometry.base_height * scale)
        }
    };

    Viewport {
        x: centered_offset(surface_width, width),
        y: centered_offset(surface_height, height),
        width,
        height,
    }
}

/// `min(sw / bw, sh / bh)` in real numbers.
fn real_scale(geometry: &GameGeometry, surface_width: u32, surface_height: u32) -> f64 {
    let sx = surface_width as f64 / geometry.base_width as f64;
    let sy = surface_height as f64 / geometry.base_height as f64;
    sx.min(sy)
}

/// Integer scale factor for pixel-perfect output, always in `1..=max_scale`.
pub fn integer_scale(
    geometry: &GameGeometry,
    surface_width: u32,
    surface_height: u32,
    max_scale: u32,
) -> u32 {
    if geometry.base_width == 0 || geometry.base_height == 0 {
        return 1;
    }
    let fit = (surface_width / geometry.base_width).min(surface_height / geometry.base_height);
    fit.clamp(1, max_scale.max(1))
}

fn centered_offset(surface: u32, scaled: u32) -> i32 {
    ((surface as i64 - scaled as i64) / 2) as i32
}

//! Core binding primitives shared by every front-end crate.
//!
//! The emulation core itself lives behind the [`binding::CoreBinding`] trait.
//! This crate only describes what crosses that boundary (geometry, frames,
//! cheats) plus the pure viewport math that depends on it.

pub mod binding;
pub mod testing;
pub mod viewport;

pub use binding::{CoreBinding, GameInfo, MemoryRegion, Region};
pub use viewport::{compute_viewport, ScalingPolicy, Viewport, MAX_INTEGER_SCALE};

pub mod types {
    use serde::{Deserialize, Serialize};
    use thiserror::Error;

    /// A video frame as delivered by the core, 0xAARRGGBB per pixel.
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Frame {
        pub width: u32,
        pub height: u32,
        pub pixels: Vec<u32>,
    }

    impl Frame {
        pub fn new(width: u32, height: u32) -> Self {
            Self {
                width,
                height,
                pixels: vec![0; (width * height) as usize],
            }
        }
    }

    pub type AudioSample = i16;

    /// Native framebuffer description reported by the core after a load.
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct GameGeometry {
        pub base_width: u32,
        pub base_height: u32,
        pub max_width: u32,
        pub max_height: u32,
        pub aspect_ratio: f32,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
    #[error("core reported an invalid base geometry of {width}x{height}")]
    pub struct GeometryError {
        pub width: u32,
        pub height: u32,
    }

    impl GameGeometry {
        /// Base dimensions must both be non-zero for any scaling to make sense.
        pub fn validate(&self) -> Result<(), GeometryError> {
            if self.base_width == 0 || self.base_height == 0 {
                return Err(GeometryError {
                    width: self.base_width,
                    height: self.base_height,
                });
            }
            Ok(())
        }

        /// Aspect ratio the core asked for, falling back to the pixel ratio
        /// when the core leaves it unset (libretro uses <= 0.0 for that).
        pub fn display_aspect(&self) -> f32 {
            if self.aspect_ratio > 0.0 {
                self.aspect_ratio
            } else if self.base_height == 0 {
                0.0
            } else {
                self.base_width as f32 / self.base_height as f32
            }
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct SystemTiming {
        pub fps: f64,
        pub sample_rate: f64,
    }

    /// Geometry and timing of the loaded game. Only valid after a successful load.
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct AvInfo {
        pub geometry: GameGeometry,
        pub timing: SystemTiming,
    }

    /// A single cheat as entered by the user. Identity is the entry's
    /// position in its list; two entries may share the same code.
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct CheatEntry {
        pub code: String,
        #[serde(default)]
        pub description: String,
        #[serde(default = "enabled_by_default")]
        pub enabled: bool,
    }

    fn enabled_by_default() -> bool {
        true
    }

    impl CheatEntry {
        pub fn new(code: impl Into<String>, description: impl Into<String>) -> Self {
            Self {
                code: code.into(),
                description: description.into(),
                enabled: true,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::types::*;

    #[test]
    fn frame_initialization() {
        let f = Frame::new(10, 10);
        assert_eq!(f.pixels.len(), 100);
        assert_eq!(f.width, 10);
        assert_eq!(f.height, 10);
    }

    #[test]
    fn geometry_rejects_zero_base() {
        let geometry = GameGeometry {
            base_width: 256,
            base_height: 0,
            max_width: 256,
            max_height: 240,
            aspect_ratio: 0.0,
        };
        let err = geometry.validate().unwrap_err();
        assert_eq!(err.width, 256);
        assert_eq!(err.height, 0);
    }

    #[test]
    fn display_aspect_falls_back_to_pixel_ratio() {
        let mut geometry = GameGeometry {
            base_width: 256,
            base_height: 240,
            max_width: 256,
            max_height: 240,
            aspect_ratio: 0.0,
        };
        assert!((geometry.display_aspect() - 256.0 / 240.0).abs() < f32::EPSILON);

        geometry.aspect_ratio = 4.0 / 3.0;
        assert!((geometry.display_aspect() - 4.0 / 3.0).abs() < f32::EPSILON);
    }

    #[test]
    fn cheat_entry_defaults_to_enabled() {
        let entry: CheatEntry =
            serde_json::from_str(r#"{"code":"SXIOPO","description":"Infinite lives"}"#)
                .expect("deserialize");
        assert!(entry.enabled);
        assert_eq!(entry.code, "SXIOPO");

        let bare: CheatEntry = serde_json::from_str(r#"{"code":"AAAA"}"#).expect("deserialize");
        assert_eq!(bare.description, "");
    }
}

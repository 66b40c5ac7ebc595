//! Session front-end for a libretro-style emulation core.
//!
//! [`Session`] owns one core through [`retro_core::CoreBinding`] and drives it
//! from vsync callbacks. Everything that outlives a session (cheats, save
//! states, preferences) goes through [`persistence`] and [`settings`].

pub mod error;
pub mod frame_loop;
pub mod input;
pub mod pacing;
pub mod persistence;
pub mod render;
pub mod rom_id;
pub mod session;
pub mod settings;

pub use error::{ErrorKind, LoadError, LoadStateError, PersistError, SaveStateError, SessionError};
pub use input::{InputRouter, VirtualButton};
pub use pacing::FramePacer;
pub use persistence::{PersistenceManager, SaveSlot, SlotInfo};
pub use render::{NullSink, RenderSink};
pub use rom_id::RomId;
pub use session::{FrameOutcome, Session, SessionState, SessionStats};
pub use settings::{JsonPreferences, MemoryPreferences, PreferenceStore, Settings};

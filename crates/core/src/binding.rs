//! The contract every emulation core must satisfy.
//!
//! The shape follows the libretro API: a globally stateful core that is
//! initialized once, handed a game, then stepped one frame at a time while
//! the caller feeds it polled input. Video and audio produced by a frame are
//! buffered inside the binding and pulled out separately.
//!
//! Implementations carry no internal concurrency guard. Callers must never
//! have two `run_frame` calls in flight for the same binding.

use crate::types::{AvInfo, CheatEntry, Frame};

/// libretro API revision this front-end speaks.
pub const API_VERSION: u32 = 1;

/// Device class ids understood by `input_state`/`set_input_state`.
pub const DEVICE_NONE: u32 = 0;
pub const DEVICE_JOYPAD: u32 = 1;

/// Upper bounds of the polled input table.
pub const MAX_PORTS: u32 = 16;
pub const MAX_DEVICES: u32 = 4;
pub const MAX_INDICES: u32 = 2;
pub const MAX_INPUT_IDS: u32 = 128;

/// Game handed to the core. `data` is always populated; `path` is informational.
#[derive(Debug, Clone, Copy)]
pub struct GameInfo<'a> {
    pub path: Option<&'a str>,
    pub data: &'a [u8],
    pub meta: Option<&'a str>,
}

impl<'a> GameInfo<'a> {
    pub fn from_bytes(data: &'a [u8]) -> Self {
        Self {
            path: None,
            data,
            meta: None,
        }
    }
}

/// Video standard reported by the core for the loaded game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    Ntsc,
    Pal,
}

impl Region {
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            1 => Region::Pal,
            _ => Region::Ntsc,
        }
    }
}

/// Raw memory areas a core may expose for tooling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryRegion {
    SaveRam,
    Rtc,
    SystemRam,
    VideoRam,
}

impl MemoryRegion {
    pub const ALL: [MemoryRegion; 4] = [
        MemoryRegion::SaveRam,
        MemoryRegion::Rtc,
        MemoryRegion::SystemRam,
        MemoryRegion::VideoRam,
    ];

    pub fn id(self) -> u32 {
        match self {
            MemoryRegion::SaveRam => 0,
            MemoryRegion::Rtc => 1,
            MemoryRegion::SystemRam => 2,
            MemoryRegion::VideoRam => 3,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            MemoryRegion::SaveRam => "save-ram",
            MemoryRegion::Rtc => "rtc",
            MemoryRegion::SystemRam => "system-ram",
            MemoryRegion::VideoRam => "video-ram",
        }
    }
}

/// Capability object wrapping a native emulation core.
pub trait CoreBinding {
    /// API revision the core was built against.
    fn api_version(&self) -> u32;

    /// Global core setup. Called at most once per session.
    fn init(&mut self);

    /// Global core teardown. Called at most once per session, after `init`.
    fn deinit(&mut self);

    fn load_game(&mut self, game: &GameInfo<'_>) -> bool;

    fn unload_game(&mut self);

    fn reset(&mut self);

    /// Advance exactly one emulated frame.
    fn run_frame(&mut self);

    /// Only meaningful after a successful `load_game`.
    fn av_info(&self) -> AvInfo;

    fn region(&self) -> Region;

    fn input_state(&self, port: u32, device: u32, index: u32, id: u32) -> i16;

    /// Latch a polled input value. Out-of-range coordinates are ignored.
    fn set_input_state(&mut self, port: u32, device: u32, index: u32, id: u32, value: i16);

    fn set_controller_port_device(&mut self, port: u32, device: u32);

    /// Most recent frame produced by `run_frame`, if any was produced since
    /// the previous call.
    fn take_frame(&mut self) -> Option<Frame>;

    /// Move buffered interleaved stereo samples into `out`; returns how many
    /// samples were appended.
    fn drain_audio(&mut self, out: &mut Vec<i16>) -> usize;

    /// Size in bytes of a serialized state, 0 when unsupported.
    fn serialize_size(&self) -> usize;

    /// `buf.len()` must equal `serialize_size()`.
    fn serialize(&mut self, buf: &mut [u8]) -> bool;

    fn deserialize(&mut self, buf: &[u8]) -> bool;

    fn cheat_reset(&mut self);

    fn cheat_set(&mut self, index: u32, enabled: bool, code: &str);

    /// Apply a full cheat list. Must behave exactly like calling `cheat_set`
    /// for each entry in order at its positional index.
    fn cheat_set_batch(&mut self, entries: &[CheatEntry]) {
        for (index, entry) in entries.iter().enumerate() {
            self.cheat_set(index as u32, entry.enabled, &entry.code);
        }
    }

    /// 0 for regions the core does not expose.
    fn memory_size(&self, region: MemoryRegion) -> usize;

    /// Copy of a memory region, `None` when unsupported.
    fn memory_data(&self, region: MemoryRegion) -> Option<Vec<u8>>;
}

//! Scripted stand-in for a native core.
//!
//! `ScriptedCore` records every call made through [`CoreBinding`] and answers
//! with results configured up front, so session and persistence code can be
//! exercised without a shared library. Its "memory" is a byte vector that
//! `run_frame` mutates, which is enough to observe save/load round-trips.

use crate::binding::{CoreBinding, GameInfo, MemoryRegion, Region, API_VERSION};
use crate::types::{AvInfo, Frame, GameGeometry, SystemTiming};

/// One recorded boundary crossing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreCall {
    Init,
    Deinit,
    LoadGame { size: usize },
    UnloadGame,
    Reset,
    RunFrame,
    SetInput { port: u32, device: u32, index: u32, id: u32, value: i16 },
    SetControllerPortDevice { port: u32, device: u32 },
    Serialize { len: usize },
    Deserialize { len: usize },
    CheatReset,
    CheatSet { index: u32, enabled: bool, code: String },
}

/// Results the scripted core hands back.
#[derive(Debug, Clone)]
pub struct Script {
    pub api_version: u32,
    pub load_ok: bool,
    pub serialize_ok: bool,
    pub deserialize_ok: bool,
    /// Overrides the reported serialize size; `None` reports the real size.
    pub serialize_size: Option<usize>,
    pub geometry: GameGeometry,
    pub timing: SystemTiming,
    pub region: Region,
    /// Produce no frame on these (1-based) frame numbers.
    pub drop_frames: Vec<u64>,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            api_version: API_VERSION,
            load_ok: true,
            serialize_ok: true,
            deserialize_ok: true,
            serialize_size: None,
            geometry: GameGeometry {
                base_width: 256,
                base_height: 240,
                max_width: 256,
                max_height: 240,
                aspect_ratio: 4.0 / 3.0,
            },
            timing: SystemTiming {
                fps: 60.0988,
                sample_rate: 44100.0,
            },
            region: Region::Ntsc,
            drop_frames: Vec::new(),
        }
    }
}

const STATE_SIZE: usize = 64;
const SAMPLES_PER_FRAME: usize = 8;

pub struct ScriptedCore {
    pub script: Script,
    pub calls: Vec<CoreCall>,
    /// Emulated memory; the first 8 bytes hold the frame counter.
    pub memory: Vec<u8>,
    pub inputs: Vec<((u32, u32, u32, u32), i16)>,
    pub cheats: Vec<Option<(bool, String)>>,
    frames_run: u64,
    pending_frame: Option<Frame>,
    audio: Vec<i16>,
    loaded: bool,
}

impl ScriptedCore {
    pub fn new() -> Self {
        Self::with_script(Script::default())
    }

    pub fn with_script(script: Script) -> Self {
        Self {
            script,
            calls: Vec::new(),
            memory: vec![0; STATE_SIZE],
            inputs: Vec::new(),
            cheats: Vec::new(),
            frames_run: 0,
            pending_frame: None,
            audio: Vec::new(),
            loaded: false,
        }
    }

    pub fn frames_run(&self) -> u64 {
        self.frames_run
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Count recorded calls matching `pred`.
    pub fn count(&self, pred: impl Fn(&CoreCall) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(c)).count()
    }

    /// Position of the first call matching `pred`.
    pub fn position(&self, pred: impl Fn(&CoreCall) -> bool) -> Option<usize> {
        self.calls.iter().position(pred)
    }

    /// Cheats currently active in the core, in index order.
    pub fn active_cheats(&self) -> Vec<(u32, String)> {
        self.cheats
            .iter()
            .enumerate()
            .filter_map(|(i, c)| match c {
                Some((true, code)) => Some((i as u32, code.clone())),
                _ => None,
            })
            .collect()
    }
}

impl Default for ScriptedCore {
    fn default() -> Self {
        Self::new()
    }
}

impl CoreBinding for ScriptedCore {
    fn api_version(&self) -> u32 {
        self.script.api_version
    }

    fn init(&mut self) {
        self.calls.push(CoreCall::Init);
    }

    fn deinit(&mut self) {
        self.calls.push(CoreCall::Deinit);
    }

    fn load_game(&mut self, game: &GameInfo<'_>) -> bool {
        self.calls.push(CoreCall::LoadGame {
            size: game.data.len(),
        });
        self.loaded = self.script.load_ok;
        self.loaded
    }

    fn unload_game(&mut self) {
        self.calls.push(CoreCall::UnloadGame);
        self.loaded = false;
    }

    fn reset(&mut self) {
        self.calls.push(CoreCall::Reset);
        self.memory.iter_mut().for_each(|b| *b = 0);
    }

    fn run_frame(&mut self) {
        self.calls.push(CoreCall::RunFrame);
        self.frames_run += 1;
        self.memory[..8].copy_from_slice(&self.frames_run.to_le_bytes());
        let slot = 8 + (self.frames_run as usize % (STATE_SIZE - 8));
        self.memory[slot] = self.memory[slot].wrapping_add(1);

        if !self.script.drop_frames.contains(&self.frames_run) {
            let g = self.script.geometry;
            let mut frame = Frame::new(g.base_width, g.base_height);
            if let Some(p) = frame.pixels.first_mut() {
                *p = 0xFF00_0000 | self.frames_run as u32;
            }
            self.pending_frame = Some(frame);
        }
        self.audio
            .extend(std::iter::repeat(self.frames_run as i16).take(SAMPLES_PER_FRAME));
    }

    fn av_info(&self) -> AvInfo {
        AvInfo {
            geometry: self.script.geometry,
            timing: self.script.timing,
        }
    }

    fn region(&self) -> Region {
        self.script.region
    }

    fn input_state(&self, port: u32, device: u32, index: u32, id: u32) -> i16 {
        self.inputs
            .iter()
            .rev()
            .find(|(key, _)| *key == (port, device, index, id))
            .map(|(_, v)| *v)
            .unwrap_or(0)
    }

    fn set_input_state(&mut self, port: u32, device: u32, index: u32, id: u32, value: i16) {
        self.calls.push(CoreCall::SetInput {
            port,
            device,
            index,
            id,
            value,
        });
        self.inputs.push(((port, device, index, id), value));
    }

    fn set_controller_port_device(&mut self, port: u32, device: u32) {
        self.calls
            .push(CoreCall::SetControllerPortDevice { port, device });
    }

    fn take_frame(&mut self) -> Option<Frame> {
        self.pending_frame.take()
    }

    fn drain_audio(&mut self, out: &mut Vec<i16>) -> usize {
        let n = self.audio.len();
        out.append(&mut self.audio);
        n
    }

    fn serialize_size(&self) -> usize {
        self.script.serialize_size.unwrap_or(self.memory.len())
    }

    fn serialize(&mut self, buf: &mut [u8]) -> bool {
        self.calls.push(CoreCall::Serialize { len: buf.len() });
        if !self.script.serialize_ok || buf.len() != self.memory.len() {
            return false;
        }
        buf.copy_from_slice(&self.memory);
        true
    }

    fn deserialize(&mut self, buf: &[u8]) -> bool {
        self.calls.push(CoreCall::Deserialize { len: buf.len() });
        if !self.script.deserialize_ok || buf.len() != self.memory.len() {
            return false;
        }
        self.memory.copy_from_slice(buf);
        true
    }

    fn cheat_reset(&mut self) {
        self.calls.push(CoreCall::CheatReset);
        self.cheats.clear();
    }

    fn cheat_set(&mut self, index: u32, enabled: bool, code: &str) {
        self.calls.push(CoreCall::CheatSet {
            index,
            enabled,
            code: code.to_string(),
        });
        let i = index as usize;
        if self.cheats.len() <= i {
            self.cheats.resize(i + 1, None);
        }
        self.cheats[i] = Some((enabled, code.to_string()));
    }

    fn memory_size(&self, region: MemoryRegion) -> usize {
        match region {
            MemoryRegion::SystemRam => self.memory.len(),
            _ => 0,
        }
    }

    fn memory_data(&self, region: MemoryRegion) -> Option<Vec<u8>> {
        match region {
            MemoryRegion::SystemRam => Some(self.memory.clone()),
            _ => None,
        }
    }
}

//! Binding of [`CoreBinding`] to a libretro shared library.
//!
//! The library is opened with `libloading`, every `retro_*` entry point is
//! resolved up front (a missing symbol fails the bind) and the callbacks in
//! [`callbacks`] are installed before `retro_init`. A libretro core is a
//! process-wide singleton, so at most one `LibretroCore` may exist at a time.

mod callbacks;
pub mod ffi;

pub use callbacks::{convert_frame, input_slot, MAX_QUEUED_SAMPLES};
pub use ffi::PixelFormat;

use ffi::*;
use libloading::Library;
use retro_core::binding::{CoreBinding, GameInfo, MemoryRegion, Region};
use retro_core::types::{AvInfo, Frame, GameGeometry, SystemTiming};
use std::ffi::{c_char, c_uint, c_void, CString};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

static BOUND: AtomicBool = AtomicBool::new(false);

#[derive(Debug, Error)]
pub enum BindError {
    #[error("a libretro core is already bound in this process")]
    AlreadyBound,

    #[error("failed to open core library {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },

    #[error("core library is missing symbol {name}: {source}")]
    MissingSymbol {
        name: &'static str,
        #[source]
        source: libloading::Error,
    },

    #[error("directory path contains a NUL byte: {0}")]
    InvalidDirectory(PathBuf),
}

/// Directories reported to the core through the environment callback.
#[derive(Debug, Clone, Default)]
pub struct CoreDirectories {
    pub system: PathBuf,
    pub save: PathBuf,
}

struct Api {
    set_environment: unsafe extern "C" fn(EnvironmentFn),
    set_video_refresh: unsafe extern "C" fn(VideoRefreshFn),
    set_audio_sample: unsafe extern "C" fn(AudioSampleFn),
    set_audio_sample_batch: unsafe extern "C" fn(AudioSampleBatchFn),
    set_input_poll: unsafe extern "C" fn(InputPollFn),
    set_input_state: unsafe extern "C" fn(InputStateFn),
    init: unsafe extern "C" fn(),
    deinit: unsafe extern "C" fn(),
    api_version: unsafe extern "C" fn() -> c_uint,
    get_system_av_info: unsafe extern "C" fn(*mut RetroSystemAvInfo),
    set_controller_port_device: unsafe extern "C" fn(c_uint, c_uint),
    reset: unsafe extern "C" fn(),
    run: unsafe extern "C" fn(),
    serialize_size: unsafe extern "C" fn() -> usize,
    serialize: unsafe extern "C" fn(*mut c_void, usize) -> bool,
    unserialize: unsafe extern "C" fn(*const c_void, usize) -> bool,
    cheat_reset: unsafe extern "C" fn(),
    cheat_set: unsafe extern "C" fn(c_uint, bool, *const c_char),
    load_game: unsafe extern "C" fn(*const RetroGameInfo) -> bool,
    unload_game: unsafe extern "C" fn(),
    get_region: unsafe extern "C" fn() -> c_uint,
    get_memory_data: unsafe extern "C" fn(c_uint) -> *mut c_void,
    get_memory_size: unsafe extern "C" fn(c_uint) -> usize,
}

/// Copy a function pointer out of the library.
///
/// # Safety
/// `T` must match the real signature of `name`.
unsafe fn symbol<T: Copy>(lib: &Library, name: &'static str) -> Result<T, BindError> {
    let mut bytes = Vec::with_capacity(name.len() + 1);
    bytes.extend_from_slice(name.as_bytes());
    bytes.push(0);
    // SAFETY: forwarded to the caller.
    let sym = unsafe { lib.get::<T>(&bytes) }
        .map_err(|source| BindError::MissingSymbol { name, source })?;
    Ok(*sym)
}

impl Api {
    /// # Safety
    /// `lib` must be a libretro core built against API version 1.
    unsafe fn resolve(lib: &Library) -> Result<Self, BindError> {
        // SAFETY: the signatures below are the libretro v1 prototypes.
        unsafe {
            Ok(Self {
                set_environment: symbol(lib, "retro_set_environment")?,
                set_video_refresh: symbol(lib, "retro_set_video_refresh")?,
                set_audio_sample: symbol(lib, "retro_set_audio_sample")?,
                set_audio_sample_batch: symbol(lib, "retro_set_audio_sample_batch")?,
                set_input_poll: symbol(lib, "retro_set_input_poll")?,
                set_input_state: symbol(lib, "retro_set_input_state")?,
                init: symbol(lib, "retro_init")?,
                deinit: symbol(lib, "retro_deinit")?,
                api_version: symbol(lib, "retro_api_version")?,
                get_system_av_info: symbol(lib, "retro_get_system_av_info")?,
                set_controller_port_device: symbol(lib, "retro_set_controller_port_device")?,
                reset: symbol(lib, "retro_reset")?,
                run: symbol(lib, "retro_run")?,
                serialize_size: symbol(lib, "retro_serialize_size")?,
                serialize: symbol(lib, "retro_serialize")?,
                unserialize: symbol(lib, "retro_unserialize")?,
                cheat_reset: symbol(lib, "retro_cheat_reset")?,
                cheat_set: symbol(lib, "retro_cheat_set")?,
                load_game: symbol(lib, "retro_load_game")?,
                unload_game: symbol(lib, "retro_unload_game")?,
                get_region: symbol(lib, "retro_get_region")?,
                get_memory_data: symbol(lib, "retro_get_memory_data")?,
                get_memory_size: symbol(lib, "retro_get_memory_size")?,
            })
        }
    }
}

pub struct LibretroCore {
    api: Api,
    path: PathBuf,
    // Keeps the code behind `api` mapped; dropped last.
    _lib: Library,
}

impl LibretroCore {
    /// Open the core at `path` and install the front-end callbacks.
    ///
    /// Does not call `retro_init`; that is [`CoreBinding::init`].
    pub fn load(path: &Path, dirs: &CoreDirectories) -> Result<Self, BindError> {
        if BOUND.swap(true, Ordering::SeqCst) {
            return Err(BindError::AlreadyBound);
        }

        match Self::open(path, dirs) {
            Ok(core) => Ok(core),
            Err(e) => {
                BOUND.store(false, Ordering::SeqCst);
                Err(e)
            }
        }
    }

    fn open(path: &Path, dirs: &CoreDirectories) -> Result<Self, BindError> {
        let system_dir = dir_cstring(&dirs.system)?;
        let save_dir = dir_cstring(&dirs.save)?;

        // SAFETY: loading a shared library runs its initializers; the caller
        // chose this library as a libretro core.
        let lib = unsafe { Library::new(path) }.map_err(|source| BindError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        // SAFETY: resolved against a libretro core.
        let api = unsafe { Api::resolve(&lib)? };

        callbacks::install(callbacks::CallbackState::new(system_dir, save_dir));

        // SAFETY: the callbacks are `extern "C"` with libretro signatures and
        // stay valid for the lifetime of the process.
        unsafe {
            (api.set_environment)(callbacks::environment);
            (api.set_video_refresh)(callbacks::video_refresh);
            (api.set_audio_sample)(callbacks::audio_sample);
            (api.set_audio_sample_batch)(callbacks::audio_sample_batch);
            (api.set_input_poll)(callbacks::input_poll);
            (api.set_input_state)(callbacks::input_state);
        }

        log::info!("bound libretro core {}", path.display());
        Ok(Self {
            api,
            path: path.to_path_buf(),
            _lib: lib,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Samples dropped because the front-end did not drain audio fast enough.
    pub fn dropped_audio_samples(&self) -> u64 {
        callbacks::with_state(|s| s.dropped_samples).unwrap_or(0)
    }
}

fn dir_cstring(path: &Path) -> Result<CString, BindError> {
    CString::new(path.to_string_lossy().as_bytes())
        .map_err(|_| BindError::InvalidDirectory(path.to_path_buf()))
}

impl Drop for LibretroCore {
    fn drop(&mut self) {
        callbacks::clear();
        BOUND.store(false, Ordering::SeqCst);
    }
}

impl CoreBinding for LibretroCore {
    fn api_version(&self) -> u32 {
        // SAFETY: resolved libretro entry point.
        unsafe { (self.api.api_version)() }
    }

    fn init(&mut self) {
        // SAFETY: resolved libretro entry point.
        unsafe { (self.api.init)() }
    }

    fn deinit(&mut self) {
        // SAFETY: resolved libretro entry point.
        unsafe { (self.api.deinit)() }
    }

    fn load_game(&mut self, game: &GameInfo<'_>) -> bool {
        let path = game.path.and_then(|p| CString::new(p).ok());
        let meta = game.meta.and_then(|m| CString::new(m).ok());
        let info = RetroGameInfo {
            path: path.as_ref().map_or(std::ptr::null(), |p| p.as_ptr()),
            data: game.data.as_ptr() as *const c_void,
            size: game.data.len(),
            meta: meta.as_ref().map_or(std::ptr::null(), |m| m.as_ptr()),
        };
        // SAFETY: `info` and the buffers it points to outlive the call.
        unsafe { (self.api.load_game)(&info) }
    }

    fn unload_game(&mut self) {
        // SAFETY: resolved libretro entry point.
        unsafe { (self.api.unload_game)() }
    }

    fn reset(&mut self) {
        // SAFETY: resolved libretro entry point.
        unsafe { (self.api.reset)() }
    }

    fn run_frame(&mut self) {
        // SAFETY: resolved libretro entry point; `&mut self` rules out a
        // second concurrent run on this binding.
        unsafe { (self.api.run)() }
    }

    fn av_info(&self) -> AvInfo {
        let mut raw = RetroSystemAvInfo::default();
        // SAFETY: `raw` is a valid, writable retro_system_av_info.
        unsafe { (self.api.get_system_av_info)(&mut raw) };
        AvInfo {
            geometry: GameGeometry {
                base_width: raw.geometry.base_width,
                base_height: raw.geometry.base_height,
                max_width: raw.geometry.max_width,
                max_height: raw.geometry.max_height,
                aspect_ratio: raw.geometry.aspect_ratio,
            },
            timing: SystemTiming {
                fps: raw.timing.fps,
                sample_rate: raw.timing.sample_rate,
            },
        }
    }

    fn region(&self) -> Region {
        // SAFETY: resolved libretro entry point.
        Region::from_raw(unsafe { (self.api.get_region)() })
    }

    fn input_state(&self, port: u32, device: u32, index: u32, id: u32) -> i16 {
        input_slot(port, device, index, id)
            .and_then(|slot| callbacks::with_state(|s| s.inputs[slot]))
            .unwrap_or(0)
    }

    fn set_input_state(&mut self, port: u32, device: u32, index: u32, id: u32, value: i16) {
        if let Some(slot) = input_slot(port, device, index, id) {
            callbacks::with_state(|s| s.inputs[slot] = value);
        }
    }

    fn set_controller_port_device(&mut self, port: u32, device: u32) {
        // SAFETY: resolved libretro entry point.
        unsafe { (self.api.set_controller_port_device)(port, device) }
    }

    fn take_frame(&mut self) -> Option<Frame> {
        callbacks::with_state(|s| s.frame.take()).flatten()
    }

    fn drain_audio(&mut self, out: &mut Vec<i16>) -> usize {
        callbacks::with_state(|s| {
            let n = s.audio.len();
            out.append(&mut s.audio);
            n
        })
        .unwrap_or(0)
    }

    fn serialize_size(&self) -> usize {
        // SAFETY: resolved libretro entry point.
        unsafe { (self.api.serialize_size)() }
    }

    fn serialize(&mut self, buf: &mut [u8]) -> bool {
        // SAFETY: `buf` is writable for `buf.len()` bytes.
        unsafe { (self.api.serialize)(buf.as_mut_ptr() as *mut c_void, buf.len()) }
    }

    fn deserialize(&mut self, buf: &[u8]) -> bool {
        // SAFETY: `buf` is readable for `buf.len()` bytes.
        unsafe { (self.api.unserialize)(buf.as_ptr() as *const c_void, buf.len()) }
    }

    fn cheat_reset(&mut self) {
        // SAFETY: resolved libretro entry point.
        unsafe { (self.api.cheat_reset)() }
    }

    fn cheat_set(&mut self, index: u32, enabled: bool, code: &str) {
        let Ok(code) = CString::new(code) else {
            log::warn!("skipping cheat {}: code contains a NUL byte", index);
            return;
        };
        // SAFETY: `code` is a valid C string for the duration of the call.
        unsafe { (self.api.cheat_set)(index, enabled, code.as_ptr()) }
    }

    fn memory_size(&self, region: MemoryRegion) -> usize {
        // SAFETY: resolved libretro entry point.
        unsafe { (self.api.get_memory_size)(region.id()) }
    }

    fn memory_data(&self, region: MemoryRegion) -> Option<Vec<u8>> {
        let size = self.memory_size(region);
        if size == 0 {
            return None;
        }
        // SAFETY: resolved libretro entry point.
        let ptr = unsafe { (self.api.get_memory_data)(region.id()) };
        if ptr.is_null() {
            return None;
        }
        // SAFETY: non-null, and the core guarantees `size` readable bytes.
        let data = unsafe { std::slice::from_raw_parts(ptr as *const u8, size) };
        Some(data.to_vec())
    }
}

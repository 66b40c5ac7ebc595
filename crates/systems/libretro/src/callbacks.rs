//! C callbacks handed to the core and the process-global state they write to.
//!
//! libretro callbacks carry no user pointer, so whatever they produce has to
//! live in a static. Only one core can be bound per process, which keeps the
//! static single-owner.

use crate::ffi::{
    PixelFormat, ENVIRONMENT_GET_CAN_DUPE, ENVIRONMENT_GET_SAVE_DIRECTORY,
    ENVIRONMENT_GET_SYSTEM_DIRECTORY, ENVIRONMENT_SET_PIXEL_FORMAT,
};
use retro_core::binding::{MAX_DEVICES, MAX_INDICES, MAX_INPUT_IDS, MAX_PORTS};
use retro_core::types::Frame;
use std::ffi::{c_char, c_uint, c_void, CString};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Roughly a quarter second of 48 kHz stereo; older samples are dropped.
pub const MAX_QUEUED_SAMPLES: usize = 48_000 / 2;

/// Frames larger than this in either dimension are rejected as bogus.
const MAX_FRAME_DIMENSION: u32 = 4096;

const INPUT_TABLE_LEN: usize = (MAX_PORTS * MAX_DEVICES * MAX_INDICES * MAX_INPUT_IDS) as usize;

pub(crate) struct CallbackState {
    pub pixel_format: PixelFormat,
    pub frame: Option<Frame>,
    pub audio: Vec<i16>,
    pub dropped_samples: u64,
    pub inputs: Box<[i16]>,
    pub system_dir: CString,
    pub save_dir: CString,
}

impl CallbackState {
    pub fn new(system_dir: CString, save_dir: CString) -> Self {
        Self {
            // libretro's documented default
            pixel_format: PixelFormat::Rgb1555,
            frame: None,
            audio: Vec::with_capacity(4096),
            dropped_samples: 0,
            inputs: vec![0i16; INPUT_TABLE_LEN].into_boxed_slice(),
            system_dir,
            save_dir,
        }
    }

    fn push_audio(&mut self, samples: &[i16]) {
        self.audio.extend_from_slice(samples);
        if self.audio.len() > MAX_QUEUED_SAMPLES {
            let excess = self.audio.len() - MAX_QUEUED_SAMPLES;
            self.audio.drain(..excess);
            self.dropped_samples += excess as u64;
        }
    }
}

static STATE: Mutex<Option<CallbackState>> = Mutex::new(None);

fn lock_state() -> MutexGuard<'static, Option<CallbackState>> {
    STATE.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn install(state: CallbackState) {
    *lock_state() = Some(state);
}

pub(crate) fn clear() {
    *lock_state() = None;
}

pub(crate) fn with_state<F, R>(f: F) -> Option<R>
where
    F: FnOnce(&mut CallbackState) -> R,
{
    lock_state().as_mut().map(f)
}

/// Flat index into the input table, `None` when out of range.
pub fn input_slot(port: u32, device: u32, index: u32, id: u32) -> Option<usize> {
    if port >= MAX_PORTS || device >= MAX_DEVICES || index >= MAX_INDICES || id >= MAX_INPUT_IDS {
        return None;
    }
    let slot = ((port * MAX_DEVICES + device) * MAX_INDICES + index) * MAX_INPUT_IDS + id;
    Some(slot as usize)
}

/// Convert a core framebuffer to 0xAARRGGBB.
///
/// `src` must hold at least `pitch * (height - 1) + width * bpp` bytes; rows
/// that run past the end are left black.
pub fn convert_frame(
    src: &[u8],
    width: u32,
    height: u32,
    pitch: usize,
    format: PixelFormat,
) -> Frame {
    let mut frame = Frame::new(width, height);
    let bpp = format.bytes_per_pixel();

    for y in 0..height as usize {
        let row = y * pitch;
        for x in 0..width as usize {
            let offset = row + x * bpp;
            if offset + bpp > src.len() {
                break;
            }
            let rgb = match format {
                PixelFormat::Xrgb8888 => {
                    let p = u32::from_ne_bytes([
                        src[offset],
                        src[offset + 1],
                        src[offset + 2],
                        src[offset + 3],
                    ]);
                    p & 0x00FF_FFFF
                }
                PixelFormat::Rgb565 => {
                    let p = u16::from_ne_bytes([src[offset], src[offset + 1]]) as u32;
                    let r = expand(p >> 11 & 0x1F, 5);
                    let g = expand(p >> 5 & 0x3F, 6);
                    let b = expand(p & 0x1F, 5);
                    r << 16 | g << 8 | b
                }
                PixelFormat::Rgb1555 => {
                    let p = u16::from_ne_bytes([src[offset], src[offset + 1]]) as u32;
                    let r = expand(p >> 10 & 0x1F, 5);
                    let g = expand(p >> 5 & 0x1F, 5);
                    let b = expand(p & 0x1F, 5);
                    r << 16 | g << 8 | b
                }
            };
            frame.pixels[y * width as usize + x] = 0xFF00_0000 | rgb;
        }
    }

    frame
}

/// Scale an n-bit channel to 8 bits, replicating high bits into the low ones.
fn expand(value: u32, bits: u32) -> u32 {
    (value << (8 - bits)) | (value >> (2 * bits - 8))
}

pub(crate) unsafe extern "C" fn environment(cmd: c_uint, data: *mut c_void) -> bool {
    match cmd {
        ENVIRONMENT_SET_PIXEL_FORMAT => {
            if data.is_null() {
                return false;
            }
            // SAFETY: non-null; libretro passes a pointer to an enum-sized int here.
            let raw = unsafe { *(data as *const c_uint) };
            let Some(format) = PixelFormat::from_raw(raw) else {
                log::warn!("core requested unknown pixel format {}", raw);
                return false;
            };
            log::debug!("core selected pixel format {:?}", format);
            with_state(|s| s.pixel_format = format).is_some()
        }
        ENVIRONMENT_GET_SYSTEM_DIRECTORY | ENVIRONMENT_GET_SAVE_DIRECTORY => {
            if data.is_null() {
                return false;
            }
            let ptr = with_state(|s| {
                if cmd == ENVIRONMENT_GET_SYSTEM_DIRECTORY {
                    s.system_dir.as_ptr()
                } else {
                    s.save_dir.as_ptr()
                }
            });
            // The CStrings live in STATE until the core is dropped, which is
            // after deinit, so the pointer outlives every core access.
            // SAFETY: non-null; data points to a `const char *` slot.
            unsafe {
                *(data as *mut *const c_char) = ptr.unwrap_or(std::ptr::null());
            }
            true
        }
        ENVIRONMENT_GET_CAN_DUPE => {
            if !data.is_null() {
                // SAFETY: non-null; data points to a bool for this command.
                unsafe {
                    *(data as *mut bool) = true;
                }
            }
            true
        }
        _ => false,
    }
}

pub(crate) unsafe extern "C" fn video_refresh(
    data: *const c_void,
    width: c_uint,
    height: c_uint,
    pitch: usize,
) {
    // A null buffer is a dupe: the previous frame stays on screen.
    if data.is_null() || width == 0 || height == 0 || pitch == 0 {
        return;
    }
    if width > MAX_FRAME_DIMENSION || height > MAX_FRAME_DIMENSION {
        log::warn!("ignoring oversized frame {}x{}", width, height);
        return;
    }

    with_state(|state| {
        let len = pitch * (height as usize - 1)
            + width as usize * state.pixel_format.bytes_per_pixel();
        // SAFETY: the core guarantees `data` covers `height` rows of `pitch`
        // bytes; `len` never exceeds that.
        let src = unsafe { std::slice::from_raw_parts(data as *const u8, len) };
        state.frame = Some(convert_frame(src, width, height, pitch, state.pixel_format));
    });
}

pub(crate) unsafe extern "C" fn audio_sample(left: i16, right: i16) {
    with_state(|s| s.push_audio(&[left, right]));
}

pub(crate) unsafe extern "C" fn audio_sample_batch(data: *const i16, frames: usize) -> usize {
    if data.is_null() {
        return 0;
    }
    // SAFETY: the core passes `frames` interleaved stereo pairs.
    let samples = unsafe { std::slice::from_raw_parts(data, frames * 2) };
    with_state(|s| s.push_audio(samples));
    frames
}

pub(crate) unsafe extern "C" fn input_poll() {
    // Input is latched by the front-end before every run; nothing to poll.
}

pub(crate) unsafe extern "C" fn input_state(
    port: c_uint,
    device: c_uint,
    index: c_uint,
    id: c_uint,
) -> i16 {
    input_slot(port, device, index, id)
        .and_then(|slot| with_state(|s| s.inputs[slot]))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_slot_bounds() {
        assert_eq!(input_slot(0, 0, 0, 0), Some(0));
        assert_eq!(input_slot(0, 0, 0, 127), Some(127));
        assert_eq!(input_slot(0, 0, 1, 0), Some(128));
        assert_eq!(input_slot(15, 3, 1, 127), Some(INPUT_TABLE_LEN - 1));
        assert_eq!(input_slot(16, 0, 0, 0), None);
        assert_eq!(input_slot(0, 4, 0, 0), None);
        assert_eq!(input_slot(0, 0, 2, 0), None);
        assert_eq!(input_slot(0, 0, 0, 128), None);
    }

    #[test]
    fn convert_xrgb8888() {
        let px = 0x0012_3456u32.to_ne_bytes();
        let frame = convert_frame(&px, 1, 1, 4, PixelFormat::Xrgb8888);
        assert_eq!(frame.pixels[0], 0xFF12_3456);
    }

    #[test]
    fn convert_rgb565_extremes() {
        let white = 0xFFFFu16.to_ne_bytes();
        let red = 0xF800u16.to_ne_bytes();
        let src = [white[0], white[1], red[0], red[1]];
        let frame = convert_frame(&src, 2, 1, 4, PixelFormat::Rgb565);
        assert_eq!(frame.pixels[0], 0xFFFF_FFFF);
        assert_eq!(frame.pixels[1], 0xFFFF_0000);
    }

    #[test]
    fn convert_rgb1555_blue() {
        let blue = 0x001Fu16.to_ne_bytes();
        let frame = convert_frame(&blue, 1, 1, 2, PixelFormat::Rgb1555);
        assert_eq!(frame.pixels[0], 0xFF00_00FF);
    }

    #[test]
    fn convert_honours_pitch_padding() {
        // Two rows of one XRGB pixel each, padded to 8 bytes per row.
        let mut src = vec![0u8; 12];
        src[0..4].copy_from_slice(&0x0000_00AAu32.to_ne_bytes());
        src[8..12].copy_from_slice(&0x0000_00BBu32.to_ne_bytes());
        let frame = convert_frame(&src, 1, 2, 8, PixelFormat::Xrgb8888);
        assert_eq!(frame.pixels, vec![0xFF00_00AA, 0xFF00_00BB]);
    }

    #[test]
    fn audio_queue_is_bounded() {
        let mut state = CallbackState::new(CString::default(), CString::default());
        let chunk = vec![1i16; MAX_QUEUED_SAMPLES];
        state.push_audio(&chunk);
        state.push_audio(&[2, 2]);
        assert_eq!(state.audio.len(), MAX_QUEUED_SAMPLES);
        assert_eq!(state.dropped_samples, 2);
        assert_eq!(state.audio.last(), Some(&2));
    }
}

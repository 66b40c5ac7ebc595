//! Logical button state latched into the core once per frame.

use retro_core::binding::DEVICE_JOYPAD;
use retro_core::CoreBinding;
use serde::{Deserialize, Serialize};

/// Buttons of the libretro joypad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VirtualButton {
    B,
    Y,
    Select,
    Start,
    Up,
    Down,
    Left,
    Right,
    A,
    X,
    L,
    R,
}

impl VirtualButton {
    pub const ALL: [VirtualButton; 12] = [
        VirtualButton::B,
        VirtualButton::Y,
        VirtualButton::Select,
        VirtualButton::Start,
        VirtualButton::Up,
        VirtualButton::Down,
        VirtualButton::Left,
        VirtualButton::Right,
        VirtualButton::A,
        VirtualButton::X,
        VirtualButton::L,
        VirtualButton::R,
    ];

    /// Joypad id as the core polls it.
    pub fn id(self) -> u32 {
        match self {
            VirtualButton::B => 0,
            VirtualButton::Y => 1,
            VirtualButton::Select => 2,
            VirtualButton::Start => 3,
            VirtualButton::Up => 4,
            VirtualButton::Down => 5,
            VirtualButton::Left => 6,
            VirtualButton::Right => 7,
            VirtualButton::A => 8,
            VirtualButton::X => 9,
            VirtualButton::L => 10,
            VirtualButton::R => 11,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            VirtualButton::B => "b",
            VirtualButton::Y => "y",
            VirtualButton::Select => "select",
            VirtualButton::Start => "start",
            VirtualButton::Up => "up",
            VirtualButton::Down => "down",
            VirtualButton::Left => "left",
            VirtualButton::Right => "right",
            VirtualButton::A => "a",
            VirtualButton::X => "x",
            VirtualButton::L => "l",
            VirtualButton::R => "r",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|b| b.name() == name)
    }

    fn bit(self) -> u16 {
        1 << self.id()
    }
}

/// Number of ports the router tracks.
pub const ROUTED_PORTS: usize = 2;

/// Held-button state per port.
///
/// `press`/`release` only touch this state; the core sees it when
/// [`InputRouter::latch`] runs right before `run_frame`. Only changed
/// buttons are pushed, so a steady hold costs nothing per frame.
#[derive(Debug, Clone, Default)]
pub struct InputRouter {
    held: [u16; ROUTED_PORTS],
    latched: [u16; ROUTED_PORTS],
}

impl InputRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when `port` is not routed.
    pub fn press(&mut self, port: u32, button: VirtualButton) -> bool {
        match self.held.get_mut(port as usize) {
            Some(mask) => {
                *mask |= button.bit();
                true
            }
            None => {
                log::debug!("ignoring press on unrouted port {}", port);
                false
            }
        }
    }

    pub fn release(&mut self, port: u32, button: VirtualButton) -> bool {
        match self.held.get_mut(port as usize) {
            Some(mask) => {
                *mask &= !button.bit();
                true
            }
            None => false,
        }
    }

    pub fn release_all(&mut self) {
        self.held = [0; ROUTED_PORTS];
    }

    pub fn is_held(&self, port: u32, button: VirtualButton) -> bool {
        self.held
            .get(port as usize)
            .is_some_and(|mask| mask & button.bit() != 0)
    }

    /// Declare every routed port as a joypad.
    pub fn attach<C: CoreBinding + ?Sized>(&mut self, core: &mut C) {
        for port in 0..ROUTED_PORTS as u32 {
            core.set_controller_port_device(port, DEVICE_JOYPAD);
        }
        self.latched = [0; ROUTED_PORTS];
    }

    /// Push changed button states into the core's input table.
    pub fn latch<C: CoreBinding + ?Sized>(&mut self, core: &mut C) {
        for (port, (held, latched)) in self.held.iter().zip(self.latched.iter_mut()).enumerate() {
            let changed = held ^ *latched;
            if changed == 0 {
                continue;
            }
            for button in VirtualButton::ALL {
                if changed & button.bit() != 0 {
                    let value = i16::from(held & button.bit() != 0);
                    core.set_input_state(port as u32, DEVICE_JOYPAD, 0, button.id(), value);
                }
            }
            *latched = *held;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use retro_core::testing::{CoreCall, ScriptedCore};

    fn inputs_pushed(core: &ScriptedCore) -> usize {
        core.count(|c| matches!(c, CoreCall::SetInput { .. }))
    }

    #[test]
    fn ids_match_libretro_joypad() {
        assert_eq!(VirtualButton::B.id(), 0);
        assert_eq!(VirtualButton::Start.id(), 3);
        assert_eq!(VirtualButton::A.id(), 8);
        assert_eq!(VirtualButton::R.id(), 11);
    }

    #[test]
    fn names_round_trip() {
        for b in VirtualButton::ALL {
            assert_eq!(VirtualButton::from_name(b.name()), Some(b));
        }
        assert_eq!(VirtualButton::from_name(" START "), Some(VirtualButton::Start));
        assert_eq!(VirtualButton::from_name("turbo"), None);
    }

    #[test]
    fn press_is_invisible_until_latched() {
        let mut router = InputRouter::new();
        let mut core = ScriptedCore::new();
        router.press(0, VirtualButton::A);
        assert_eq!(core.input_state(0, DEVICE_JOYPAD, 0, 8), 0);

        router.latch(&mut core);
        assert_eq!(core.input_state(0, DEVICE_JOYPAD, 0, 8), 1);
    }

    #[test]
    fn held_button_is_latched_once() {
        let mut router = InputRouter::new();
        let mut core = ScriptedCore::new();
        router.press(1, VirtualButton::Left);
        router.latch(&mut core);
        router.latch(&mut core);
        router.latch(&mut core);
        assert_eq!(inputs_pushed(&core), 1);

        router.release(1, VirtualButton::Left);
        router.latch(&mut core);
        assert_eq!(inputs_pushed(&core), 2);
        assert_eq!(core.input_state(1, DEVICE_JOYPAD, 0, 6), 0);
    }

    #[test]
    fn press_and_release_between_frames_is_lost() {
        let mut router = InputRouter::new();
        let mut core = ScriptedCore::new();
        router.press(0, VirtualButton::B);
        router.release(0, VirtualButton::B);
        router.latch(&mut core);
        assert_eq!(inputs_pushed(&core), 0);
    }

    #[test]
    fn unrouted_port_is_ignored() {
        let mut router = InputRouter::new();
        assert!(!router.press(5, VirtualButton::A));
        assert!(!router.is_held(5, VirtualButton::A));
    }

    #[test]
    fn attach_declares_joypads() {
        let mut router = InputRouter::new();
        let mut core = ScriptedCore::new();
        router.attach(&mut core);
        assert_eq!(
            core.calls,
            vec![
                CoreCall::SetControllerPortDevice { port: 0, device: DEVICE_JOYPAD },
                CoreCall::SetControllerPortDevice { port: 1, device: DEVICE_JOYPAD },
            ]
        );
    }
}

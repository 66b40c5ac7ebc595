//! The emulation session: one core, one loaded game, one frame loop.
//!
//! Lifecycle:
//!
//! ```text
//! Uninitialized -> CoreBound -> Running <-> Paused -> TornDown
//! ```
//!
//! A failed load goes straight to `TornDown`. Every other failure leaves the
//! state untouched.

use crate::error::{LoadError, SessionError};
use crate::frame_loop::FrameLoop;
use crate::input::{InputRouter, VirtualButton};
use crate::pacing::FramePacer;
use crate::persistence::{apply_cheats, PersistenceManager, SaveSlot, SlotInfo};
use crate::render::RenderSink;
use crate::rom_id::RomId;
use crate::settings::PreferenceStore;
use retro_core::binding::API_VERSION;
use retro_core::types::{AvInfo, CheatEntry, Frame};
use retro_core::{
    compute_viewport, CoreBinding, GameInfo, MemoryRegion, Region, ScalingPolicy, Viewport,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    CoreBound,
    Running,
    Paused,
    TornDown,
}

impl SessionState {
    pub fn has_game(self) -> bool {
        matches!(self, SessionState::Running | SessionState::Paused)
    }
}

/// What a single vsync callback did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameOutcome {
    /// The core advanced one frame.
    pub ran: bool,
    /// A frame reached the render sink.
    pub presented: bool,
    /// Another callback is scheduled.
    pub rearmed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionStats {
    pub frames_run: u64,
    pub frames_presented: u64,
    /// Frames the sink failed to present.
    pub frames_dropped: u64,
    /// Frames for which the core produced no new image.
    pub frames_duplicated: u64,
    pub late_frames: u64,
}

struct LoadedGame {
    rom: RomId,
    av_info: AvInfo,
    cheats: Vec<CheatEntry>,
    /// The list was edited and may differ from what is on disk.
    cheats_dirty: bool,
}

pub struct Session<C: CoreBinding, S: RenderSink> {
    core: C,
    sink: S,
    persistence: PersistenceManager,
    prefs: Box<dyn PreferenceStore>,
    state: SessionState,
    frame_loop: FrameLoop,
    input: InputRouter,
    game: Option<LoadedGame>,
    policy: ScalingPolicy,
    surface: (u32, u32),
    viewport: Viewport,
    pacer: Option<FramePacer>,
    audio: Vec<i16>,
    last_frame: Option<Frame>,
    stats: SessionStats,
    audio_enabled: bool,
}

impl<C: CoreBinding, S: RenderSink> Session<C, S> {
    pub fn new(
        core: C,
        sink: S,
        persistence: PersistenceManager,
        prefs: Box<dyn PreferenceStore>,
    ) -> Self {
        let policy = prefs.scaling_policy();
        Self {
            core,
            sink,
            persistence,
            prefs,
            state: SessionState::Uninitialized,
            frame_loop: FrameLoop::new(),
            input: InputRouter::new(),
            game: None,
            policy,
            surface: (0, 0),
            viewport: Viewport::default(),
            pacer: None,
            audio: Vec::new(),
            last_frame: None,
            stats: SessionStats::default(),
            audio_enabled: true,
        }
    }

    /// Check the core's API revision and initialize it.
    pub fn initialize(&mut self) -> Result<(), SessionError> {
        self.expect_state(SessionState::Uninitialized, "an uninitialized session")?;

        let found = self.core.api_version();
        if found != API_VERSION {
            log::error!("core speaks API version {}, expected {}", found, API_VERSION);
            self.sink.release();
            self.state = SessionState::TornDown;
            return Err(LoadError::ApiVersion {
                found,
                expected: API_VERSION,
            }
            .into());
        }

        self.core.init();
        self.state = SessionState::CoreBound;
        log::debug!("core initialized");
        Ok(())
    }

    /// Hand `rom` to the core and start playing.
    ///
    /// `locator` is where the ROM came from; it names the cheat and save
    /// files. On any failure the core is unloaded and deinitialized and the
    /// session is torn down.
    pub fn load_game(&mut self, locator: &str, rom: &[u8]) -> Result<AvInfo, SessionError> {
        self.expect_state(SessionState::CoreBound, "a bound core")?;

        if rom.is_empty() {
            self.abort_load(false);
            return Err(LoadError::EmptyRom.into());
        }

        let info = GameInfo {
            path: Some(locator),
            data: rom,
            meta: None,
        };
        if !self.core.load_game(&info) {
            log::error!("core rejected ROM {}", locator);
            self.abort_load(false);
            return Err(LoadError::CoreRejected.into());
        }

        let av_info = self.core.av_info();
        if let Err(e) = av_info.geometry.validate() {
            log::error!("{}", e);
            self.abort_load(true);
            return Err(LoadError::from(e).into());
        }

        let rom_id = RomId::from_locator(locator);
        log::info!(
            "loaded {} ({}x{} @ {:.3} fps, {:?})",
            rom_id,
            av_info.geometry.base_width,
            av_info.geometry.base_height,
            av_info.timing.fps,
            self.core.region()
        );

        self.input.attach(&mut self.core);
        let cheats = self.persistence.load_cheats(&rom_id);
        if !cheats.is_empty() {
            apply_cheats(&mut self.core, &cheats);
        }

        self.game = Some(LoadedGame {
            rom: rom_id,
            av_info,
            cheats,
            cheats_dirty: false,
        });
        self.pacer = Some(FramePacer::new(av_info.timing.fps));
        self.recompute_viewport();
        self.state = SessionState::Running;
        self.frame_loop.start();
        Ok(av_info)
    }

    fn abort_load(&mut self, loaded: bool) {
        self.sink.release();
        if loaded {
            self.core.unload_game();
        }
        self.core.deinit();
        self.state = SessionState::TornDown;
    }

    /// Start scheduling frames. Returns false if nothing changed.
    pub fn start_loop(&mut self) -> bool {
        if self.state != SessionState::Running {
            return false;
        }
        self.frame_loop.start()
    }

    /// Stop scheduling frames. Returns false if nothing changed.
    pub fn stop_loop(&mut self) -> bool {
        self.frame_loop.stop()
    }

    pub fn is_loop_running(&self) -> bool {
        self.frame_loop.is_running()
    }

    /// With audio off, samples are still drained from the core but never
    /// reach the sink.
    pub fn set_audio_enabled(&mut self, enabled: bool) {
        self.audio_enabled = enabled;
    }

    /// Block until the next frame is due at the core's refresh rate.
    pub fn pace(&mut self) {
        if let Some(pacer) = self.pacer.as_mut() {
            pacer.wait();
        }
    }

    /// Vsync callback: run at most one frame and re-arm if still running.
    pub fn on_vsync(&mut self) -> FrameOutcome {
        if !self.frame_loop.fire() {
            return FrameOutcome {
                rearmed: self.frame_loop.is_armed(),
                ..FrameOutcome::default()
            };
        }

        self.input.latch(&mut self.core);
        self.core.run_frame();
        self.stats.frames_run += 1;

        self.audio.clear();
        if self.core.drain_audio(&mut self.audio) > 0 && self.audio_enabled {
            self.sink.queue_audio(&self.audio);
        }

        let presented = match self.core.take_frame() {
            Some(frame) => self.present(frame),
            None => {
                log::trace!("core produced no frame");
                self.stats.frames_duplicated += 1;
                false
            }
        };

        FrameOutcome {
            ran: true,
            presented,
            rearmed: self.frame_loop.is_armed(),
        }
    }

    fn present(&mut self, frame: Frame) -> bool {
        let mut presented = false;
        if !self.viewport.is_empty() {
            match self.sink.present(&frame, self.viewport) {
                Ok(()) => {
                    self.stats.frames_presented += 1;
                    presented = true;
                }
                Err(e) => {
                    log::warn!("frame {} not presented: {}", self.stats.frames_run, e);
                    self.stats.frames_dropped += 1;
                }
            }
        }
        self.last_frame = Some(frame);
        presented
    }

    /// Host went to the background.
    pub fn pause(&mut self) -> Result<(), SessionError> {
        match self.state {
            SessionState::Paused => Ok(()),
            SessionState::Running => {
                self.frame_loop.stop();
                self.input.release_all();
                self.sink.suspend();
                self.state = SessionState::Paused;
                log::debug!("session paused");
                Ok(())
            }
            _ => Err(self.invalid_state("a loaded game")),
        }
    }

    /// Host came back to the foreground.
    pub fn resume(&mut self) -> Result<(), SessionError> {
        match self.state {
            SessionState::Running => Ok(()),
            SessionState::Paused => {
                self.sink.resume();
                if let Some(pacer) = self.pacer.as_mut() {
                    pacer.reset();
                }
                self.state = SessionState::Running;
                self.frame_loop.start();
                log::debug!("session resumed");
                Ok(())
            }
            _ => Err(self.invalid_state("a loaded game")),
        }
    }

    pub fn reset(&mut self) -> Result<(), SessionError> {
        self.require_game()?;
        self.core.reset();
        log::info!("game reset");
        Ok(())
    }

    /// Record a new surface size and recompute the viewport.
    pub fn surface_changed(&mut self, width: u32, height: u32) -> Viewport {
        self.surface = (width, height);
        self.recompute_viewport();
        self.viewport
    }

    /// Switch scaling policy. The new viewport applies immediately; the
    /// returned error only concerns persisting the choice.
    pub fn set_scaling_policy(&mut self, policy: ScalingPolicy) -> Result<Viewport, SessionError> {
        self.policy = policy;
        self.recompute_viewport();
        self.prefs.set_scaling_policy(policy)?;
        Ok(self.viewport)
    }

    fn recompute_viewport(&mut self) {
        let (width, height) = self.surface;
        self.viewport = match &self.game {
            Some(game) => compute_viewport(&game.av_info.geometry, width, height, self.policy),
            None => Viewport::default(),
        };
        log::debug!(
            "viewport {:?} for surface {}x{} ({})",
            self.viewport,
            width,
            height,
            self.policy.name()
        );
    }

    pub fn press(&mut self, port: u32, button: VirtualButton) -> bool {
        self.input.press(port, button)
    }

    pub fn release(&mut self, port: u32, button: VirtualButton) -> bool {
        self.input.release(port, button)
    }

    pub fn save_state(&mut self, slot: SaveSlot) -> Result<usize, SessionError> {
        let rom = self.require_game()?.rom.clone();
        self.persistence
            .save_state(&rom, slot, &mut self.core)
            .map_err(|e| {
                log::warn!("save to slot {} failed: {}", slot, e);
                e.into()
            })
    }

    pub fn load_state(&mut self, slot: SaveSlot) -> Result<(), SessionError> {
        let rom = self.require_game()?.rom.clone();
        self.persistence
            .load_state(&rom, slot, &mut self.core)
            .map_err(|e| {
                log::warn!("load from slot {} failed: {}", slot, e);
                e.into()
            })
    }

    pub fn slots(&self) -> Result<Vec<SlotInfo>, SessionError> {
        let game = self.require_game()?;
        Ok(self.persistence.slot_info(&game.rom))
    }

    pub fn cheats(&self) -> &[CheatEntry] {
        self.game
            .as_ref()
            .map(|g| g.cheats.as_slice())
            .unwrap_or(&[])
    }

    pub fn set_cheats(&mut self, cheats: Vec<CheatEntry>) -> Result<(), SessionError> {
        self.edit_cheats(|list| {
            *list = cheats;
            Ok(())
        })
    }

    /// Append a cheat, returning its index.
    pub fn add_cheat(&mut self, cheat: CheatEntry) -> Result<usize, SessionError> {
        if cheat.code.trim().is_empty() {
            return Err(SessionError::EmptyCheatCode);
        }
        self.edit_cheats(|list| {
            list.push(cheat);
            Ok(list.len() - 1)
        })
    }

    pub fn remove_cheat(&mut self, index: usize) -> Result<CheatEntry, SessionError> {
        self.edit_cheats(|list| {
            if index >= list.len() {
                return Err(SessionError::NoSuchCheat(index));
            }
            Ok(list.remove(index))
        })
    }

    pub fn set_cheat_enabled(&mut self, index: usize, enabled: bool) -> Result<(), SessionError> {
        self.edit_cheats(|list| {
            let entry = list.get_mut(index).ok_or(SessionError::NoSuchCheat(index))?;
            entry.enabled = enabled;
            Ok(())
        })
    }

    /// Apply `edit` to the cheat list, then save and hot-apply the result.
    fn edit_cheats<R>(
        &mut self,
        edit: impl FnOnce(&mut Vec<CheatEntry>) -> Result<R, SessionError>,
    ) -> Result<R, SessionError> {
        if !self.state.has_game() {
            return Err(self.invalid_state("a loaded game"));
        }
        let Some(game) = self.game.as_mut() else {
            return Err(self.invalid_state("a loaded game"));
        };
        let result = edit(&mut game.cheats)?;
        game.cheats_dirty = true;
        self.persistence
            .save_cheats(&game.rom, &game.cheats, &mut self.core)?;
        Ok(result)
    }

    pub fn region(&self) -> Option<Region> {
        self.state.has_game().then(|| self.core.region())
    }

    pub fn memory(&self, region: MemoryRegion) -> Option<Vec<u8>> {
        if !self.state.has_game() || self.core.memory_size(region) == 0 {
            return None;
        }
        self.core.memory_data(region)
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            late_frames: self.pacer.as_ref().map_or(0, FramePacer::late_frames),
            ..self.stats
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn scaling_policy(&self) -> ScalingPolicy {
        self.policy
    }

    pub fn rom_id(&self) -> Option<&RomId> {
        self.game.as_ref().map(|g| &g.rom)
    }

    pub fn av_info(&self) -> Option<AvInfo> {
        self.game.as_ref().map(|g| g.av_info)
    }

    /// Most recent frame produced by the core.
    pub fn last_frame(&self) -> Option<&Frame> {
        self.last_frame.as_ref()
    }

    pub fn core(&self) -> &C {
        &self.core
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn persistence(&self) -> &PersistenceManager {
        &self.persistence
    }

    /// Stop the loop, release the sink, flush edited cheats, unload, deinit.
    ///
    /// Safe to call more than once; also runs on drop.
    pub fn teardown(&mut self) {
        let state = self.state;
        if state == SessionState::TornDown {
            return;
        }
        self.state = SessionState::TornDown;

        self.frame_loop.stop();
        self.sink.release();
        self.last_frame = None;

        if let Some(game) = self.game.take() {
            if !game.cheats_dirty {
                log::trace!("cheats for {} unchanged", game.rom);
            } else if let Err(e) = self.persistence.write_cheats(&game.rom, &game.cheats) {
                log::error!("failed to flush cheats for {}: {}", game.rom, e);
            }
            self.core.unload_game();
        }
        if state != SessionState::Uninitialized {
            self.core.deinit();
        }
        log::debug!("session torn down from {:?}", state);
    }

    fn require_game(&self) -> Result<&LoadedGame, SessionError> {
        match &self.game {
            Some(game) if self.state.has_game() => Ok(game),
            _ => Err(self.invalid_state("a loaded game")),
        }
    }

    fn expect_state(&self, expected: SessionState, what: &'static str) -> Result<(), SessionError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(self.invalid_state(what))
        }
    }

    fn invalid_state(&self, expected: &'static str) -> SessionError {
        SessionError::InvalidState {
            expected,
            actual: self.state,
        }
    }
}

impl<C: CoreBinding, S: RenderSink> Drop for Session<C, S> {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::NullSink;
    use crate::settings::MemoryPreferences;
    use retro_core::testing::{CoreCall, Script, ScriptedCore};

    fn session_with(
        script: Script,
        dir: &tempfile::TempDir,
    ) -> Session<ScriptedCore, NullSink> {
        Session::new(
            ScriptedCore::with_script(script),
            NullSink::new(),
            PersistenceManager::new(dir.path()),
            Box::new(MemoryPreferences::new()),
        )
    }

    fn running(dir: &tempfile::TempDir) -> Session<ScriptedCore, NullSink> {
        let mut s = session_with(Script::default(), dir);
        s.initialize().unwrap();
        s.load_game("/roms/Contra.nes", &[1, 2, 3]).unwrap();
        s
    }

    #[test]
    fn lifecycle_happy_path() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = session_with(Script::default(), &dir);
        assert_eq!(s.state(), SessionState::Uninitialized);
        s.initialize().unwrap();
        assert_eq!(s.state(), SessionState::CoreBound);
        let av = s.load_game("/roms/Contra.nes", &[1, 2, 3]).unwrap();
        assert_eq!(av.geometry.base_width, 256);
        assert_eq!(s.state(), SessionState::Running);
        assert_eq!(s.rom_id().unwrap().as_str(), "Contra");
        assert!(s.is_loop_running());
    }

    #[test]
    fn wrong_api_version_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = session_with(
            Script {
                api_version: 2,
                ..Script::default()
            },
            &dir,
        );
        let err = s.initialize().unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::FatalLoad);
        assert_eq!(s.state(), SessionState::TornDown);
        assert!(s.core().calls.is_empty());
        assert!(s.sink().released);
    }

    #[test]
    fn load_before_initialize_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = session_with(Script::default(), &dir);
        assert!(matches!(
            s.load_game("x.nes", &[1]),
            Err(SessionError::InvalidState { .. })
        ));
        assert_eq!(s.state(), SessionState::Uninitialized);
    }

    #[test]
    fn empty_rom_tears_down() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = session_with(Script::default(), &dir);
        s.initialize().unwrap();
        assert!(matches!(
            s.load_game("x.nes", &[]),
            Err(SessionError::Load(LoadError::EmptyRom))
        ));
        assert_eq!(s.state(), SessionState::TornDown);
        assert_eq!(s.core().calls, vec![CoreCall::Init, CoreCall::Deinit]);
        assert!(s.sink().released);
    }

    #[test]
    fn zero_geometry_unloads_and_deinits() {
        let dir = tempfile::tempdir().unwrap();
        let mut script = Script::default();
        script.geometry.base_width = 0;
        let mut s = session_with(script, &dir);
        s.initialize().unwrap();
        assert!(matches!(
            s.load_game("x.nes", &[1]),
            Err(SessionError::Load(LoadError::Geometry(_)))
        ));
        let calls = &s.core().calls;
        assert_eq!(
            &calls[calls.len() - 2..],
            &[CoreCall::UnloadGame, CoreCall::Deinit]
        );
        assert_eq!(s.state(), SessionState::TornDown);
        assert!(s.sink().released);
    }

    #[test]
    fn vsync_runs_one_frame_and_rearms() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = running(&dir);
        s.surface_changed(512, 480);
        let out = s.on_vsync();
        assert_eq!(
            out,
            FrameOutcome {
                ran: true,
                presented: true,
                rearmed: true
            }
        );
        assert_eq!(s.core().frames_run(), 1);
        assert_eq!(s.sink().frames_presented, 1);
        assert!(s.sink().samples_queued > 0);
    }

    #[test]
    fn empty_viewport_skips_drawing() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = running(&dir);
        s.set_scaling_policy(ScalingPolicy::MaintainAspect).unwrap();
        s.surface_changed(0, 0);
        let out = s.on_vsync();
        assert!(out.ran);
        assert!(!out.presented);
        assert!(s.last_frame().is_some());
        assert_eq!(s.stats().frames_dropped, 0);
    }

    #[test]
    fn missing_frame_keeps_loop_alive() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = session_with(
            Script {
                drop_frames: vec![1],
                ..Script::default()
            },
            &dir,
        );
        s.initialize().unwrap();
        s.load_game("a.nes", &[1]).unwrap();
        s.surface_changed(256, 240);
        let out = s.on_vsync();
        assert!(out.ran && !out.presented && out.rearmed);
        assert!(s.on_vsync().presented);
        assert_eq!(s.stats().frames_duplicated, 1);
    }

    #[test]
    fn pause_stops_before_suspend_and_resume_restarts() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = running(&dir);
        s.pause().unwrap();
        assert_eq!(s.state(), SessionState::Paused);
        assert!(s.sink().suspended);
        assert!(!s.is_loop_running());
        assert!(!s.on_vsync().ran);
        assert!(!s.on_vsync().ran);

        s.resume().unwrap();
        assert!(!s.sink().suspended);
        assert!(s.on_vsync().ran);
        assert_eq!(s.core().frames_run(), 1);
    }

    #[test]
    fn pause_releases_held_buttons() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = running(&dir);
        s.press(0, VirtualButton::Start);
        s.on_vsync();
        s.pause().unwrap();
        assert!(!s.input.is_held(0, VirtualButton::Start));

        s.resume().unwrap();
        s.on_vsync();
        assert!(s
            .core()
            .calls
            .contains(&CoreCall::SetInput { port: 0, device: 1, index: 0, id: 3, value: 0 }));
        assert_eq!(s.core().input_state(0, 1, 0, 3), 0);
    }

    #[test]
    fn disabled_audio_is_drained_but_not_queued() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = running(&dir);
        s.set_audio_enabled(false);
        assert!(s.on_vsync().ran);
        assert_eq!(s.sink().samples_queued, 0);

        s.set_audio_enabled(true);
        s.on_vsync();
        assert!(s.sink().samples_queued > 0);
    }

    #[test]
    fn start_and_stop_loop_are_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = running(&dir);
        assert!(!s.start_loop());
        assert!(s.stop_loop());
        assert!(!s.stop_loop());
        assert!(s.start_loop());
        assert!(s.on_vsync().ran);
    }

    #[test]
    fn policy_change_recomputes_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = running(&dir);
        assert_eq!(s.surface_changed(1920, 1080).width, 1920);
        let vp = s.set_scaling_policy(ScalingPolicy::PixelPerfect).unwrap();
        assert_eq!((vp.x, vp.y, vp.width, vp.height), (448, 60, 1024, 960));
        assert_eq!(s.prefs.scaling_policy(), ScalingPolicy::PixelPerfect);
    }

    #[test]
    fn input_is_latched_before_run_frame() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = running(&dir);
        s.press(0, VirtualButton::Start);
        s.on_vsync();
        let calls = &s.core().calls;
        let set = calls
            .iter()
            .position(|c| matches!(c, CoreCall::SetInput { id: 3, value: 1, .. }))
            .unwrap();
        let run = calls.iter().position(|c| *c == CoreCall::RunFrame).unwrap();
        assert!(set < run);
    }

    #[test]
    fn cheat_edits_hot_apply() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = running(&dir);
        s.add_cheat(CheatEntry::new("AAAA", "a")).unwrap();
        s.add_cheat(CheatEntry::new("BBBB", "b")).unwrap();
        s.set_cheat_enabled(0, false).unwrap();
        assert_eq!(s.core().active_cheats(), vec![(1, "BBBB".to_string())]);

        let removed = s.remove_cheat(1).unwrap();
        assert_eq!(removed.code, "BBBB");
        assert!(s.core().active_cheats().is_empty());
        assert!(matches!(
            s.remove_cheat(7),
            Err(SessionError::NoSuchCheat(7))
        ));

        let stored = s.persistence().load_cheats(&RomId::new("Contra"));
        assert_eq!(stored, s.cheats());
    }

    #[test]
    fn empty_cheat_code_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = running(&dir);
        let err = s.add_cheat(CheatEntry::new("  ", "blank")).unwrap_err();
        assert!(matches!(err, SessionError::EmptyCheatCode));
        assert!(s.cheats().is_empty());
        assert!(!s
            .persistence()
            .cheats_path(&RomId::new("Contra"))
            .exists());
    }

    #[test]
    fn stored_cheats_apply_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let pm = PersistenceManager::new(dir.path());
        pm.write_cheats(&RomId::new("Contra"), &[CheatEntry::new("SXIOPO", "lives")])
            .unwrap();

        let s = running(&dir);
        assert_eq!(s.cheats().len(), 1);
        assert_eq!(s.core().active_cheats(), vec![(0, "SXIOPO".to_string())]);
        assert_eq!(s.core().count(|c| *c == CoreCall::CheatReset), 1);
    }

    #[test]
    fn teardown_order_and_idempotence() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = running(&dir);
        s.teardown();
        s.teardown();
        assert_eq!(s.state(), SessionState::TornDown);
        assert!(s.sink().released);
        let calls = &s.core().calls;
        assert_eq!(
            &calls[calls.len() - 2..],
            &[CoreCall::UnloadGame, CoreCall::Deinit]
        );
        assert_eq!(s.core().count(|c| *c == CoreCall::Deinit), 1);
        // nothing was edited, so nothing was written
        assert!(!s
            .persistence()
            .cheats_path(&RomId::new("Contra"))
            .exists());
        assert!(matches!(
            s.reset(),
            Err(SessionError::InvalidState { .. })
        ));
    }

    #[test]
    fn tooling_accessors() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = session_with(Script::default(), &dir);
        assert_eq!(s.region(), None);
        s.initialize().unwrap();
        s.load_game("a.nes", &[1]).unwrap();
        assert_eq!(s.region(), Some(Region::Ntsc));
        assert_eq!(s.memory(MemoryRegion::SystemRam).map(|m| m.len()), Some(64));
        assert_eq!(s.memory(MemoryRegion::SaveRam), None);
    }
}

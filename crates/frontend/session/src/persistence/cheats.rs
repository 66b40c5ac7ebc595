use super::{write_atomic, PersistenceManager};
use crate::error::PersistError;
use crate::rom_id::RomId;
use retro_core::types::CheatEntry;
use retro_core::CoreBinding;
use std::fs;
use std::io;

impl PersistenceManager {
    /// Stored cheats for `rom`, in order.
    ///
    /// A missing file is the normal "no cheats yet" case. An unreadable or
    /// corrupt file is logged and also treated as empty.
    pub fn load_cheats(&self, rom: &RomId) -> Vec<CheatEntry> {
        let path = self.cheats_path(rom);
        let contents = self.locks().with_lock(&path, || fs::read_to_string(&path));

        match contents {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(entries) => entries,
                Err(e) => {
                    log::warn!("ignoring corrupt cheat file {}: {}", path.display(), e);
                    Vec::new()
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::debug!("no cheats stored for {}", rom);
                Vec::new()
            }
            Err(e) => {
                log::warn!("failed to read cheat file {}: {}", path.display(), e);
                Vec::new()
            }
        }
    }

    /// Replace the stored cheat list for `rom`.
    pub fn write_cheats(&self, rom: &RomId, entries: &[CheatEntry]) -> Result<(), PersistError> {
        let path = self.cheats_path(rom);
        let contents = serde_json::to_string_pretty(entries)?;
        self.locks()
            .with_lock(&path, || write_atomic(&path, contents.as_bytes()))?;
        log::debug!("wrote {} cheats for {}", entries.len(), rom);
        Ok(())
    }

    /// Persist `entries` and hot-apply them to `core`.
    ///
    /// The core's cheat table is cleared first so entries removed from the
    /// list stop applying. The core is updated even when the write fails,
    /// in which case the write error is returned afterwards.
    pub fn save_cheats<C>(
        &self,
        rom: &RomId,
        entries: &[CheatEntry],
        core: &mut C,
    ) -> Result<(), PersistError>
    where
        C: CoreBinding + ?Sized,
    {
        let written = self.write_cheats(rom, entries);
        if let Err(e) = &written {
            log::error!("failed to save cheats for {}: {}", rom, e);
        }
        apply_cheats(core, entries);
        written
    }
}

/// Reset the core's cheat table and apply `entries` at their positions.
pub(crate) fn apply_cheats<C: CoreBinding + ?Sized>(core: &mut C, entries: &[CheatEntry]) {
    core.cheat_reset();
    core.cheat_set_batch(entries);
    log::debug!(
        "applied {} cheats ({} enabled)",
        entries.len(),
        entries.iter().filter(|e| e.enabled).count()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use retro_core::testing::{CoreCall, ScriptedCore};

    fn setup() -> (tempfile::TempDir, PersistenceManager, RomId) {
        let dir = tempfile::tempdir().unwrap();
        let pm = PersistenceManager::new(dir.path());
        (dir, pm, RomId::new("Contra"))
    }

    #[test]
    fn unknown_rom_has_no_cheats() {
        let (_dir, pm, _) = setup();
        assert!(pm.load_cheats(&RomId::new("never-seen")).is_empty());
    }

    #[test]
    fn corrupt_file_reads_as_empty() {
        let (_dir, pm, rom) = setup();
        let path = pm.cheats_path(&rom);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "{ not json").unwrap();
        assert!(pm.load_cheats(&rom).is_empty());
    }

    #[test]
    fn enabled_defaults_to_true() {
        let (_dir, pm, rom) = setup();
        let path = pm.cheats_path(&rom);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, r#"[{"code":"SXIOPO"},{"code":"AAAA","enabled":false}]"#).unwrap();

        let cheats = pm.load_cheats(&rom);
        assert_eq!(cheats.len(), 2);
        assert!(cheats[0].enabled);
        assert_eq!(cheats[0].description, "");
        assert!(!cheats[1].enabled);
    }

    #[test]
    fn save_resets_then_applies_in_order() {
        let (_dir, pm, rom) = setup();
        let mut core = ScriptedCore::new();
        let entries = vec![
            CheatEntry::new("AAAA", "lives"),
            CheatEntry {
                code: "BBBB".into(),
                description: "off".into(),
                enabled: false,
            },
        ];

        pm.save_cheats(&rom, &entries, &mut core).unwrap();

        assert_eq!(core.calls[0], CoreCall::CheatReset);
        assert_eq!(
            core.calls[1],
            CoreCall::CheatSet {
                index: 0,
                enabled: true,
                code: "AAAA".into()
            }
        );
        assert_eq!(core.active_cheats(), vec![(0, "AAAA".to_string())]);
        assert_eq!(pm.load_cheats(&rom), entries);
    }

    #[test]
    fn removed_cheats_stop_applying() {
        let (_dir, pm, rom) = setup();
        let mut core = ScriptedCore::new();
        let two = vec![CheatEntry::new("AAAA", ""), CheatEntry::new("BBBB", "")];
        pm.save_cheats(&rom, &two, &mut core).unwrap();
        pm.save_cheats(&rom, &two[..1], &mut core).unwrap();
        assert_eq!(core.active_cheats(), vec![(0, "AAAA".to_string())]);
    }
}

use super::{write_atomic, PersistenceManager};
use crate::error::{LoadStateError, SaveStateError};
use crate::rom_id::RomId;
use chrono::{DateTime, Local};
use retro_core::CoreBinding;
use std::fmt;
use std::fs;
use std::io;

/// Number of save-state slots per ROM.
pub const SLOT_COUNT: u8 = 10;

/// A save-state slot, numbered 1..=10 as in the file name.
///
/// Slot pickers are 0-based; use [`SaveSlot::from_ui_index`] to convert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SaveSlot(u8);

impl SaveSlot {
    pub fn new(number: u8) -> Option<Self> {
        (1..=SLOT_COUNT).contains(&number).then_some(SaveSlot(number))
    }

    pub fn from_ui_index(index: usize) -> Option<Self> {
        u8::try_from(index + 1).ok().and_then(Self::new)
    }

    pub fn number(self) -> u8 {
        self.0
    }

    pub fn ui_index(self) -> usize {
        self.0 as usize - 1
    }

    pub fn all() -> impl Iterator<Item = SaveSlot> {
        (1..=SLOT_COUNT).map(SaveSlot)
    }
}

impl Default for SaveSlot {
    fn default() -> Self {
        SaveSlot(1)
    }
}

impl fmt::Display for SaveSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Occupancy of one slot on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotInfo {
    pub slot: SaveSlot,
    /// Blob size in bytes, `None` when the slot is empty.
    pub size: Option<u64>,
    pub modified: Option<DateTime<Local>>,
}

impl SlotInfo {
    pub fn is_occupied(&self) -> bool {
        self.size.is_some()
    }
}

impl PersistenceManager {
    /// Serialize `core` into `slot`. Returns the number of bytes written.
    ///
    /// Nothing is written unless the core produced a complete state, so a
    /// failed save leaves the previous blob in place.
    pub fn save_state<C>(
        &self,
        rom: &RomId,
        slot: SaveSlot,
        core: &mut C,
    ) -> Result<usize, SaveStateError>
    where
        C: CoreBinding + ?Sized,
    {
        let size = core.serialize_size();
        if size == 0 {
            return Err(SaveStateError::Unsupported);
        }

        let mut buf = vec![0u8; size];
        if !core.serialize(&mut buf) {
            return Err(SaveStateError::CoreRejected);
        }

        let path = self.state_path(rom, slot);
        self.locks().with_lock(&path, || write_atomic(&path, &buf))?;
        log::info!("saved state for {} to slot {} ({} bytes)", rom, slot, size);
        Ok(size)
    }

    /// Restore `core` from `slot`.
    pub fn load_state<C>(&self, rom: &RomId, slot: SaveSlot, core: &mut C) -> Result<(), LoadStateError>
    where
        C: CoreBinding + ?Sized,
    {
        let path = self.state_path(rom, slot);
        let data = match self.locks().with_lock(&path, || fs::read(&path)) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::debug!("slot {} is empty for {}", slot, rom);
                return Err(LoadStateError::NotFound(slot.number()));
            }
            Err(e) => return Err(e.into()),
        };

        if !core.deserialize(&data) {
            return Err(LoadStateError::CoreRejected);
        }
        log::info!("loaded state for {} from slot {}", rom, slot);
        Ok(())
    }

    /// All ten slots for `rom`, in order.
    pub fn slot_info(&self, rom: &RomId) -> Vec<SlotInfo> {
        SaveSlot::all()
            .map(|slot| {
                let path = self.state_path(rom, slot);
                match fs::metadata(&path) {
                    Ok(meta) if meta.is_file() => SlotInfo {
                        slot,
                        size: Some(meta.len()),
                        modified: meta.modified().ok().map(DateTime::<Local>::from),
                    },
                    _ => SlotInfo {
                        slot,
                        size: None,
                        modified: None,
                    },
                }
            })
            .collect()
    }

    /// Remove the blob in `slot`. Returns whether anything was removed.
    pub fn delete_state(&self, rom: &RomId, slot: SaveSlot) -> io::Result<bool> {
        let path = self.state_path(rom, slot);
        self.locks().with_lock(&path, || match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use retro_core::testing::{Script, ScriptedCore};

    fn setup() -> (tempfile::TempDir, PersistenceManager, RomId) {
        let dir = tempfile::tempdir().unwrap();
        let pm = PersistenceManager::new(dir.path());
        (dir, pm, RomId::new("Metroid"))
    }

    fn slot(n: u8) -> SaveSlot {
        SaveSlot::new(n).unwrap()
    }

    #[test]
    fn slot_numbering() {
        assert_eq!(SaveSlot::new(0), None);
        assert_eq!(SaveSlot::new(11), None);
        assert_eq!(SaveSlot::from_ui_index(0), Some(slot(1)));
        assert_eq!(SaveSlot::from_ui_index(9), Some(slot(10)));
        assert_eq!(SaveSlot::from_ui_index(10), None);
        assert_eq!(slot(4).ui_index(), 3);
        assert_eq!(SaveSlot::all().count(), 10);
    }

    #[test]
    fn save_writes_exact_size() {
        let (_dir, pm, rom) = setup();
        let mut core = ScriptedCore::new();
        core.run_frame();
        let written = pm.save_state(&rom, slot(2), &mut core).unwrap();
        assert_eq!(written, core.serialize_size());
        assert_eq!(fs::read(pm.state_path(&rom, slot(2))).unwrap(), core.memory);
    }

    #[test]
    fn zero_size_is_unsupported() {
        let (_dir, pm, rom) = setup();
        let mut core = ScriptedCore::with_script(Script {
            serialize_size: Some(0),
            ..Script::default()
        });
        assert!(matches!(
            pm.save_state(&rom, slot(1), &mut core),
            Err(SaveStateError::Unsupported)
        ));
    }

    #[test]
    fn rejected_serialize_keeps_previous_blob() {
        let (_dir, pm, rom) = setup();
        let mut core = ScriptedCore::new();
        core.run_frame();
        pm.save_state(&rom, slot(1), &mut core).unwrap();
        let before = fs::read(pm.state_path(&rom, slot(1))).unwrap();

        core.run_frame();
        core.script.serialize_ok = false;
        assert!(matches!(
            pm.save_state(&rom, slot(1), &mut core),
            Err(SaveStateError::CoreRejected)
        ));
        assert_eq!(fs::read(pm.state_path(&rom, slot(1))).unwrap(), before);
    }

    #[test]
    fn empty_slot_is_not_found() {
        let (_dir, pm, rom) = setup();
        let mut core = ScriptedCore::new();
        let err = pm.load_state(&rom, slot(5), &mut core).unwrap_err();
        assert!(matches!(err, LoadStateError::NotFound(5)));
        assert!(core.calls.is_empty());
    }

    #[test]
    fn rejected_deserialize() {
        let (_dir, pm, rom) = setup();
        let mut core = ScriptedCore::new();
        pm.save_state(&rom, slot(1), &mut core).unwrap();
        core.script.deserialize_ok = false;
        assert!(matches!(
            pm.load_state(&rom, slot(1), &mut core),
            Err(LoadStateError::CoreRejected)
        ));
    }

    #[test]
    fn slot_info_and_delete() {
        let (_dir, pm, rom) = setup();
        let mut core = ScriptedCore::new();
        pm.save_state(&rom, slot(7), &mut core).unwrap();

        let info = pm.slot_info(&rom);
        assert_eq!(info.len(), 10);
        let occupied: Vec<u8> = info
            .iter()
            .filter(|i| i.is_occupied())
            .map(|i| i.slot.number())
            .collect();
        assert_eq!(occupied, vec![7]);
        assert_eq!(info[6].size, Some(core.serialize_size() as u64));
        assert!(info[6].modified.is_some());

        assert!(pm.delete_state(&rom, slot(7)).unwrap());
        assert!(!pm.delete_state(&rom, slot(7)).unwrap());
        assert!(pm.slot_info(&rom).iter().all(|i| !i.is_occupied()));
    }
}

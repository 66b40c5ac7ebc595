//! Durable per-ROM storage: cheat lists and save-state slots.
//!
//! Layout under the data directory:
//!
//! ```text
//! <data>/cheats/<rom-id>.json
//! <data>/saves/<rom-id>/slot<N>.sav
//! ```
//!
//! Every file is written to a sibling temp file and renamed into place, so a
//! reader sees either the old contents or the new ones.

mod cheats;
mod locks;
mod states;

pub(crate) use cheats::apply_cheats;
pub use locks::KeyedLocks;
pub use states::{SaveSlot, SlotInfo, SLOT_COUNT};

use crate::rom_id::RomId;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const CHEATS_DIR: &str = "cheats";
const SAVES_DIR: &str = "saves";

#[derive(Debug, Clone)]
pub struct PersistenceManager {
    root: PathBuf,
    locks: Arc<KeyedLocks>,
}

impl PersistenceManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            locks: Arc::new(KeyedLocks::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn cheats_path(&self, rom: &RomId) -> PathBuf {
        self.root
            .join(CHEATS_DIR)
            .join(format!("{}.json", rom.as_str()))
    }

    pub fn states_dir(&self, rom: &RomId) -> PathBuf {
        self.root.join(SAVES_DIR).join(rom.as_str())
    }

    pub fn state_path(&self, rom: &RomId, slot: SaveSlot) -> PathBuf {
        self.states_dir(rom)
            .join(format!("slot{}.sav", slot.number()))
    }

    pub(crate) fn locks(&self) -> &KeyedLocks {
        &self.locks
    }
}

/// Write `bytes` to `path` via a temp file in the same directory.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no parent"))?;
    fs::create_dir_all(dir)?;

    let file_name = path
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;
    let mut tmp_name = file_name.to_os_string();
    tmp_name.push(".tmp");
    let tmp = dir.join(tmp_name);

    let result = (|| {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        fs::rename(&tmp, path)
    })();
    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}

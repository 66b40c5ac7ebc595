//! Error types for the session front-end.
//!
//! Every error maps onto an [`ErrorKind`] which tells the caller how to react:
//! fatal load errors end the session, transient frame errors are only logged,
//! persistence misses mean "nothing stored", and core rejections are reported
//! to the user while the session keeps running.

use crate::session::SessionState;
use retro_core::types::GeometryError;
use std::io;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The ROM or core could not be brought up; the session never starts.
    FatalLoad,
    /// A single frame failed; playback continues.
    TransientFrame,
    /// No stored data exists; treated as empty or absent.
    PersistenceMiss,
    /// The core refused a serialize, deserialize or similar request.
    CoreRejected,
    /// Filesystem failure while persisting.
    Io,
    /// The operation is not valid in the current session state, or was
    /// given an unusable argument.
    InvalidState,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("ROM image is empty")]
    EmptyRom,

    #[error("core API version {found} is not supported (expected {expected})")]
    ApiVersion { found: u32, expected: u32 },

    #[error("core rejected the ROM")]
    CoreRejected,

    #[error(transparent)]
    Geometry(#[from] GeometryError),
}

#[derive(Debug, Error)]
pub enum SaveStateError {
    #[error("core does not support save states")]
    Unsupported,

    #[error("core failed to serialize its state")]
    CoreRejected,

    #[error("failed to write save state: {0}")]
    Io(#[from] io::Error),
}

impl SaveStateError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SaveStateError::Unsupported | SaveStateError::CoreRejected => ErrorKind::CoreRejected,
            SaveStateError::Io(_) => ErrorKind::Io,
        }
    }
}

#[derive(Debug, Error)]
pub enum LoadStateError {
    #[error("no save state in slot {0}")]
    NotFound(u8),

    #[error("core rejected the save state")]
    CoreRejected,

    #[error("failed to read save state: {0}")]
    Io(#[from] io::Error),
}

impl LoadStateError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LoadStateError::NotFound(_) => ErrorKind::PersistenceMiss,
            LoadStateError::CoreRejected => ErrorKind::CoreRejected,
            LoadStateError::Io(_) => ErrorKind::Io,
        }
    }
}

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("encoding error: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("render surface is not available")]
    SurfaceLost,

    #[error("render backend error: {0}")]
    Backend(String),
}

impl RenderError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::TransientFrame
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to load game: {0}")]
    Load(#[from] LoadError),

    #[error("operation requires {expected}, session is {actual:?}")]
    InvalidState {
        expected: &'static str,
        actual: SessionState,
    },

    #[error("no cheat at index {0}")]
    NoSuchCheat(usize),

    #[error("cheat code is empty")]
    EmptyCheatCode,

    #[error(transparent)]
    SaveState(#[from] SaveStateError),

    #[error(transparent)]
    LoadState(#[from] LoadStateError),

    #[error("failed to persist: {0}")]
    Persist(#[from] PersistError),
}

impl SessionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::Load(_) => ErrorKind::FatalLoad,
            SessionError::InvalidState { .. }
            | SessionError::NoSuchCheat(_)
            | SessionError::EmptyCheatCode => ErrorKind::InvalidState,
            SessionError::SaveState(e) => e.kind(),
            SessionError::LoadState(e) => e.kind(),
            SessionError::Persist(_) => ErrorKind::Io,
        }
    }
}

//! Structured errors surfaced by the control-plane API.
//!
//! Mirrors the error kinds of the engine's wire surface: name conflicts,
//! allocation failure, invalid gate indices, busy ogates, missing modules,
//! and opaque class-defined init errors. Modeled by hand, in the style the
//! rest of this crate uses for its error enums (a plain enum plus manual
//! `Display`/`Error` impls, no derive-macro error crate).

use std::error::Error as StdError;
use std::fmt::{self, Debug, Display};

/// An error returned by a control-plane operation.
///
/// On any failure the graph is left exactly as it was before the call
/// (create-module frees everything it allocated; connect frees any gate it
/// newly allocated).
pub enum EngineError {
    /// A module with this name is already registered.
    NameConflict(String),
    /// An allocation needed to satisfy the request failed.
    OutOfMemory,
    /// A gate index was out of range, or the downstream class has no
    /// `process_batch` hook.
    InvalidArgument(String),
    /// The requested ogate is already connected.
    Busy,
    /// The named module, or an active ogate required for the operation,
    /// does not exist.
    NotFound(String),
    /// `ModuleClass::init` returned an error.
    ModuleInit(Box<dyn StdError + Send + Sync>),
    /// Opening a tap fifo failed.
    Io(std::io::Error),
}

impl Debug for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NameConflict(name) => write!(f, "NameConflict({name:?})"),
            Self::OutOfMemory => write!(f, "OutOfMemory"),
            Self::InvalidArgument(msg) => write!(f, "InvalidArgument({msg:?})"),
            Self::Busy => write!(f, "Busy"),
            Self::NotFound(what) => write!(f, "NotFound({what:?})"),
            Self::ModuleInit(err) => write!(f, "ModuleInit({err})"),
            Self::Io(err) => write!(f, "Io({err})"),
        }
    }
}

impl Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NameConflict(name) => write!(f, "module name '{name}' already registered"),
            Self::OutOfMemory => write!(f, "allocation failed"),
            Self::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            Self::Busy => write!(f, "ogate already connected"),
            Self::NotFound(what) => write!(f, "not found: {what}"),
            Self::ModuleInit(err) => write!(f, "module init failed: {err}"),
            Self::Io(err) => write!(f, "I/O error: {err}"),
        }
    }
}

impl StdError for EngineError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::ModuleInit(err) => Some(err.as_ref()),
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

/// The conventional negative-errno-style codes used by the connect/disconnect
/// protocol, for callers that want to match on them without
/// destructuring [`EngineError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrCode {
    /// `-EINVAL`
    Invalid,
    /// `-EBUSY`
    Busy,
    /// `-ENOMEM`
    NoMem,
    /// `-ENOENT`
    NotFound,
    /// `-EEXIST`
    Exists,
}

impl EngineError {
    /// Maps this error onto the negative-errno-style code used by the
    /// connect/disconnect protocol's return values.
    #[must_use]
    pub fn code(&self) -> ErrCode {
        match self {
            Self::NameConflict(_) => ErrCode::Exists,
            Self::OutOfMemory => ErrCode::NoMem,
            Self::InvalidArgument(_) | Self::ModuleInit(_) | Self::Io(_) => ErrCode::Invalid,
            Self::Busy => ErrCode::Busy,
            Self::NotFound(_) => ErrCode::NotFound,
        }
    }
}

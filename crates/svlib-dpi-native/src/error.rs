use std::io;

use svlib_contracts::{STATUS_CONTRACT_VIOLATION, STATUS_INVALID_HANDLE, STATUS_PATTERN_COMPILE};

/// Everything that can go wrong inside the bridge. Converted to a status code
/// only at the `extern "C"` edge.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("out of memory")]
    OutOfMemory,

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("not supported: {0}")]
    Unsupported(String),

    #[error("{what} exceeds maximum buffer length {limit}")]
    Overflow { what: &'static str, limit: usize },

    #[error("out of range: {0}")]
    OutOfRange(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid handle {0:#x}")]
    InvalidHandle(i64),

    #[error("contract violation: {0}")]
    ContractViolation(String),

    #[error("{0}")]
    PatternCompile(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

impl BridgeError {
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        BridgeError::Io {
            context: context.into(),
            source,
        }
    }

    pub fn status(&self) -> i32 {
        match self {
            BridgeError::OutOfMemory => libc::ENOMEM,
            BridgeError::PermissionDenied(_) => libc::EACCES,
            BridgeError::Unsupported(_) => libc::ENOTSUP,
            BridgeError::Overflow { .. } | BridgeError::OutOfRange(_) => libc::ERANGE,
            BridgeError::InvalidArgument(_) => libc::EINVAL,
            BridgeError::InvalidHandle(_) => STATUS_INVALID_HANDLE,
            BridgeError::ContractViolation(_) => STATUS_CONTRACT_VIOLATION,
            BridgeError::PatternCompile(_) => STATUS_PATTERN_COMPILE,
            BridgeError::Io { source, .. } => map_io_err(source),
        }
    }
}

fn map_io_err(e: &io::Error) -> i32 {
    if let Some(code) = e.raw_os_error() {
        return code;
    }
    match e.kind() {
        io::ErrorKind::NotFound => libc::ENOENT,
        io::ErrorKind::PermissionDenied => libc::EACCES,
        io::ErrorKind::AlreadyExists => libc::EEXIST,
        io::ErrorKind::InvalidInput => libc::EINVAL,
        io::ErrorKind::OutOfMemory => libc::ENOMEM,
        io::ErrorKind::Unsupported => libc::ENOTSUP,
        _ => libc::EIO,
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;

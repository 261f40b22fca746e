use std::io;

use thiserror::Error;

/// Errors raised by the OpenFlow transport and the controller core.
#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The switch speaks an OpenFlow version older than 1.3, or changed version mid-session.
    #[error("unsupported OpenFlow version {0:#04x}")]
    UnsupportedVersion(u8),

    #[error("unknown OpenFlow message type {0}")]
    UnknownMessageType(u8),

    /// An outbound message longer than the 16-bit OpenFlow length field allows.
    #[error("message of {0} bytes exceeds the OpenFlow length limit")]
    MessageTooLarge(usize),

    #[error("malformed {what}: {reason}")]
    Malformed { what: &'static str, reason: String },

    /// An ethernet frame shorter than its link-layer header.
    #[error("truncated ethernet frame of {0} bytes")]
    TruncatedFrame(usize),

    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn malformed(what: &'static str, reason: impl Into<String>) -> Self {
        Error::Malformed {
            what,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

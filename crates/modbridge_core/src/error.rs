//! Error types shared by the registry, extension core and dispatcher.

use crate::abi::ModuleHandle;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type HostResult<T> = Result<T, HostError>;
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Failures reported by the host collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    ConfigRegistrationRejected { handle: ModuleHandle, reason: String },
    InvalidName(String),
}

impl Display for HostError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConfigRegistrationRejected { handle, reason } => write!(
                f,
                "host rejected configuration entries for module {handle}: {reason}"
            ),
            Self::InvalidName(value) => {
                write!(f, "name cannot be passed to the host: {value:?}")
            }
        }
    }
}

impl Error for HostError {}

/// Lifecycle failures surfaced to the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    UnresolvedHandle(ModuleHandle),
    Host(HostError),
}

impl Display for BridgeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnresolvedHandle(handle) => {
                write!(f, "no extension registered for module handle {handle}")
            }
            Self::Host(err) => write!(f, "{err}"),
        }
    }
}

impl Error for BridgeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Host(err) => Some(err),
            Self::UnresolvedHandle(_) => None,
        }
    }
}

impl From<HostError> for BridgeError {
    fn from(value: HostError) -> Self {
        Self::Host(value)
    }
}

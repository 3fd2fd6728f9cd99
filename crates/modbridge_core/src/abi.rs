//! Host ABI target markers and the small value types crossing the host boundary.
//!
//! # Responsibility
//! - Pin the host module API number and build id this bridge is compiled for.
//! - Give the raw integers the host passes around (`type`, module number,
//!   status) distinct Rust types.
//!
//! # Invariants
//! - `HostStatus::Success` encodes as `0`, `HostStatus::Failure` as `-1`.
//! - Module handles are assigned by the host; this crate never invents one.

use serde::Serialize;
use std::fmt::{Display, Formatter};

/// Module API number of the host ABI this bridge targets.
pub const HOST_MODULE_API_NO: u32 = 20170718;

/// Host build id this bridge targets.
#[cfg(all(feature = "thread-safe", not(feature = "debug-host")))]
pub const HOST_BUILD_ID: &str = "API20170718,TS";
#[cfg(all(not(feature = "thread-safe"), not(feature = "debug-host")))]
pub const HOST_BUILD_ID: &str = "API20170718,NTS";
#[cfg(all(feature = "thread-safe", feature = "debug-host"))]
pub const HOST_BUILD_ID: &str = "API20170718,TS,debug";
#[cfg(all(not(feature = "thread-safe"), feature = "debug-host"))]
pub const HOST_BUILD_ID: &str = "API20170718,NTS,debug";

/// API version an extension must declare to be driven through the full lifecycle.
///
/// Extensions declaring anything else are installed in the inert mismatch mode.
pub const BRIDGE_API_VERSION: u32 = 0x0001_0000;

/// Compatibility markers copied into every module descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HostAbi {
    pub module_api_no: u32,
    pub debug: bool,
    pub thread_safe: bool,
    pub build_id: &'static str,
}

impl HostAbi {
    /// Returns the markers for the host build selected at compile time.
    pub fn current() -> Self {
        Self {
            module_api_no: HOST_MODULE_API_NO,
            debug: cfg!(feature = "debug-host"),
            thread_safe: cfg!(feature = "thread-safe"),
            build_id: HOST_BUILD_ID,
        }
    }
}

/// Numeric module handle (host "module number") assigned at load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ModuleHandle(pub i32);

impl ModuleHandle {
    pub fn get(self) -> i32 {
        self.0
    }
}

impl Display for ModuleHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Module type the host passes to every lifecycle callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleType(pub i32);

impl ModuleType {
    /// Module loaded for the whole process lifetime.
    pub const PERSISTENT: Self = Self(1);
    /// Module loaded at runtime, for example through a script-level `dl()`.
    pub const TEMPORARY: Self = Self(2);
}

impl Display for ModuleType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match *self {
            Self::PERSISTENT => write!(f, "persistent"),
            Self::TEMPORARY => write!(f, "temporary"),
            Self(other) => write!(f, "unknown({other})"),
        }
    }
}

/// Status code returned to the host from lifecycle callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostStatus {
    Success,
    Failure,
}

impl HostStatus {
    pub fn from_bool(ok: bool) -> Self {
        if ok {
            Self::Success
        } else {
            Self::Failure
        }
    }

    /// Host-side integer encoding.
    pub fn as_raw(self) -> i32 {
        match self {
            Self::Success => 0,
            Self::Failure => -1,
        }
    }

    pub fn is_success(self) -> bool {
        self == Self::Success
    }
}

#[cfg(test)]
mod tests {
    use super::{HostAbi, HostStatus, ModuleType, HOST_MODULE_API_NO};

    #[test]
    fn status_encoding_matches_host_convention() {
        assert_eq!(HostStatus::Success.as_raw(), 0);
        assert_eq!(HostStatus::Failure.as_raw(), -1);
        assert_eq!(HostStatus::from_bool(false), HostStatus::Failure);
    }

    #[test]
    fn current_abi_reports_targeted_api_number() {
        let abi = HostAbi::current();
        assert_eq!(abi.module_api_no, HOST_MODULE_API_NO);
        assert_eq!(abi.thread_safe, cfg!(feature = "thread-safe"));
        assert!(abi.build_id.starts_with("API20170718"));
    }

    #[test]
    fn debug_marker_and_build_id_follow_host_build() {
        let abi = HostAbi::current();
        assert_eq!(abi.debug, cfg!(feature = "debug-host"));
        assert_eq!(abi.build_id.ends_with(",debug"), abi.debug);
        let ts_marker = if abi.thread_safe { ",TS" } else { ",NTS" };
        assert!(abi.build_id.contains(ts_marker));
    }

    #[test]
    fn module_type_display_names_known_values() {
        assert_eq!(ModuleType::PERSISTENT.to_string(), "persistent");
        assert_eq!(ModuleType(9).to_string(), "unknown(9)");
    }
}

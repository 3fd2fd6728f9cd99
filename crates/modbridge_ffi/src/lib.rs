//! C ABI surface of the module bridge.
//!
//! Builds the host's module, function and configuration records from core
//! descriptors and routes the host's lifecycle callbacks back into the core
//! dispatcher.

pub mod api;
pub mod host;
pub mod raw;
pub mod thunks;

pub use api::{core_version, host_installed, init_logging_from_env, install_host, module_entry};
pub use host::{bridge_globals_ctor, CallbackHost, GlobalsCtor, HostCallbacks, ModuleVisitor};
pub use raw::{LifecycleFn, RawArgInfo, RawFunctionEntry, RawIniEntryDef, RawModuleEntry};

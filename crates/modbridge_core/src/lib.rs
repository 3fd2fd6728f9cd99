//! Registration and correlation layer between extension objects and a host
//! that only understands C-style module descriptors.
//! This crate owns the lock, descriptor and handle-resolution invariants.

pub mod abi;
pub mod callable;
pub mod config_entry;
pub mod descriptor;
pub mod dispatcher;
pub mod error;
pub mod extension;
pub mod host;
pub mod logging;
pub mod registry;

pub use abi::{HostAbi, HostStatus, ModuleHandle, ModuleType, BRIDGE_API_VERSION};
pub use callable::{ArgumentKind, ArgumentSpec, Arguments, Callable, FunctionSlot, InvokeHandler};
pub use config_entry::{ConfigEntry, ConfigSlot, ConfigValueKind, Modifiable};
pub use descriptor::{
    DescriptorSnapshot, EntryPoint, FunctionTable, LifecycleEntryPoints, ModuleDescriptor,
};
pub use dispatcher::{HostContext, LifecycleEvent, ModuleLifecycle};
pub use error::{BridgeError, BridgeResult, HostError, HostResult};
pub use extension::{Extension, LifecycleHandler};
pub use host::{DiagnosticLevel, Host, LoadedModule, SimulatedHost};
pub use logging::{default_log_level, init_logging, logging_status, LoggingConfig};
pub use registry::ExtensionRegistry;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

//! Lifecycle dispatcher behind the host's `(type, module number)` callbacks.
//!
//! # Responsibility
//! - Resolve the owning extension from a bare module handle.
//! - Forward the lifecycle event and translate the outcome to a host status.
//!
//! # Invariants
//! - Dispatch functions are stateless; all state lives in the resolved
//!   extension and the shared `HostContext`.
//! - Startup with an unresolvable handle reports failure.
//! - Request and shutdown events always report success; an unresolvable
//!   handle is logged and skipped.
//! - Mismatch startup always reports success and emits exactly one
//!   diagnostic.

use crate::abi::{HostStatus, ModuleHandle, ModuleType};
use crate::error::{BridgeError, BridgeResult};
use crate::host::{init_globals, DiagnosticLevel, Host};
use crate::registry::ExtensionRegistry;
use log::{error, warn};
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Lifecycle event delivered by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Startup,
    RequestActivate,
    RequestDeactivate,
    Shutdown,
}

impl LifecycleEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Startup => "startup",
            Self::RequestActivate => "request_activate",
            Self::RequestDeactivate => "request_deactivate",
            Self::Shutdown => "shutdown",
        }
    }
}

impl Display for LifecycleEvent {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Target of a dispatched lifecycle event.
pub trait ModuleLifecycle {
    fn name(&self) -> &str;
    fn version(&self) -> &str;
    fn handle_event(
        &self,
        event: LifecycleEvent,
        host: &dyn Host,
        handle: ModuleHandle,
    ) -> BridgeResult<()>;
}

/// Registry and host shared by every dispatch in one process.
#[derive(Clone)]
pub struct HostContext {
    pub registry: Arc<ExtensionRegistry>,
    pub host: Arc<dyn Host>,
}

impl HostContext {
    pub fn new(registry: Arc<ExtensionRegistry>, host: Arc<dyn Host>) -> Self {
        Self { registry, host }
    }

    /// Context over the process-wide registry.
    pub fn with_global_registry(host: Arc<dyn Host>) -> Self {
        Self::new(ExtensionRegistry::global(), host)
    }
}

pub fn process_startup(
    ctx: &HostContext,
    module_type: ModuleType,
    handle: ModuleHandle,
) -> HostStatus {
    ctx.host.init_module_globals(init_globals);

    let result = match ctx.registry.resolve_by_handle(handle, ctx.host.as_ref()) {
        Some(extension) => {
            let target: &dyn ModuleLifecycle = &*extension;
            target.handle_event(LifecycleEvent::Startup, ctx.host.as_ref(), handle)
        }
        None => Err(BridgeError::UnresolvedHandle(handle)),
    };

    match result {
        Ok(()) => HostStatus::Success,
        Err(err) => {
            error!(
                "event=module_startup module=dispatcher status=error type={} handle={} error={}",
                module_type, handle, err
            );
            HostStatus::Failure
        }
    }
}

pub fn process_request_activate(
    ctx: &HostContext,
    module_type: ModuleType,
    handle: ModuleHandle,
) -> HostStatus {
    dispatch_best_effort(ctx, LifecycleEvent::RequestActivate, module_type, handle)
}

pub fn process_request_deactivate(
    ctx: &HostContext,
    module_type: ModuleType,
    handle: ModuleHandle,
) -> HostStatus {
    dispatch_best_effort(ctx, LifecycleEvent::RequestDeactivate, module_type, handle)
}

pub fn process_shutdown(
    ctx: &HostContext,
    module_type: ModuleType,
    handle: ModuleHandle,
) -> HostStatus {
    dispatch_best_effort(ctx, LifecycleEvent::Shutdown, module_type, handle)
}

/// Startup replacement for extensions declaring a foreign API version.
pub fn process_mismatch(
    ctx: &HostContext,
    module_type: ModuleType,
    handle: ModuleHandle,
) -> HostStatus {
    let message = match ctx.registry.resolve_by_handle(handle, ctx.host.as_ref()) {
        Some(extension) => mismatch_message(&*extension),
        None => format!(
            "Version mismatch between module bridge and extension with module number {handle} (recompile needed?)"
        ),
    };

    ctx.host.emit_diagnostic(DiagnosticLevel::Warning, &message);
    warn!(
        "event=version_mismatch module=dispatcher status=ok type={} handle={} message={}",
        module_type, handle, message
    );
    HostStatus::Success
}

fn mismatch_message(extension: &dyn ModuleLifecycle) -> String {
    format!(
        "Version mismatch between module bridge and extension {} {} (recompile needed?)",
        extension.name(),
        extension.version()
    )
}

fn dispatch_best_effort(
    ctx: &HostContext,
    event: LifecycleEvent,
    module_type: ModuleType,
    handle: ModuleHandle,
) -> HostStatus {
    let Some(extension) = ctx.registry.resolve_by_handle(handle, ctx.host.as_ref()) else {
        warn!(
            "event=unresolved_handle module=dispatcher status=skip lifecycle={} type={} handle={}",
            event, module_type, handle
        );
        return HostStatus::Success;
    };

    let target: &dyn ModuleLifecycle = &*extension;
    if let Err(err) = target.handle_event(event, ctx.host.as_ref(), handle) {
        warn!(
            "event={} module=dispatcher status=error type={} handle={} error={}",
            event, module_type, handle, err
        );
    }
    HostStatus::Success
}

#[cfg(test)]
mod tests {
    use super::{process_request_activate, process_shutdown, process_startup, HostContext};
    use crate::abi::{HostStatus, ModuleHandle, ModuleType, BRIDGE_API_VERSION};
    use crate::extension::Extension;
    use crate::host::SimulatedHost;
    use crate::registry::ExtensionRegistry;
    use std::sync::Arc;

    fn context() -> (HostContext, Arc<SimulatedHost>) {
        let host = Arc::new(SimulatedHost::new());
        let ctx = HostContext::new(Arc::new(ExtensionRegistry::new()), host.clone());
        (ctx, host)
    }

    #[test]
    fn startup_with_unknown_handle_fails() {
        let (ctx, host) = context();
        let status = process_startup(&ctx, ModuleType::PERSISTENT, ModuleHandle(11));

        assert_eq!(status, HostStatus::Failure);
        assert_eq!(host.scan_count(), 1);
        assert_eq!(host.globals_init_count(), 1);
    }

    #[test]
    fn request_events_with_unknown_handle_are_skipped() {
        let (ctx, _host) = context();

        assert_eq!(
            process_request_activate(&ctx, ModuleType::PERSISTENT, ModuleHandle(11)),
            HostStatus::Success
        );
        assert_eq!(
            process_shutdown(&ctx, ModuleType::PERSISTENT, ModuleHandle(11)),
            HostStatus::Success
        );
    }

    #[test]
    fn startup_failure_from_host_is_reported_and_keeps_unlocked() {
        let (ctx, host) = context();
        let ext = Extension::with_registry(&ctx.registry, "strict", "1.0", BRIDGE_API_VERSION);
        host.load_module("strict", ModuleHandle(2));
        host.reject_config_registration("table full");

        let status = process_startup(&ctx, ModuleType::PERSISTENT, ModuleHandle(2));

        assert_eq!(status, HostStatus::Failure);
        assert!(!ext.is_locked());
    }
}

//! `extern "C"` lifecycle thunks wired into module entries.
//!
//! # Responsibility
//! - Hold the process-wide `HostContext` the host-installed thunks dispatch through.
//! - Translate `(type, module_number)` into a core dispatch and back into a raw status.
//!
//! # Invariants
//! - Thunks never unwind into the host; a panic reports failure.
//! - Before a host is installed, startup fails and every other event is skipped.

use crate::raw::LifecycleFn;
use log::{error, warn};
use modbridge_core::{EntryPoint, HostContext, HostStatus, ModuleHandle, ModuleType};
use std::ffi::c_int;
use std::panic;
use std::sync::OnceLock;

static HOST_CONTEXT: OnceLock<HostContext> = OnceLock::new();

const ALL_ENTRY_POINTS: [EntryPoint; 5] = [
    EntryPoint::Startup,
    EntryPoint::MismatchStartup,
    EntryPoint::RequestActivate,
    EntryPoint::RequestDeactivate,
    EntryPoint::Shutdown,
];

/// Installs the context; returns it back if one is already installed.
pub(crate) fn install_context(ctx: HostContext) -> Result<(), HostContext> {
    HOST_CONTEXT.set(ctx)
}

pub(crate) fn host_installed() -> bool {
    HOST_CONTEXT.get().is_some()
}

/// C function pointer wired for `entry`.
pub fn thunk_for(entry: EntryPoint) -> LifecycleFn {
    match entry {
        EntryPoint::Startup => bridge_module_startup,
        EntryPoint::MismatchStartup => bridge_mismatch_startup,
        EntryPoint::RequestActivate => bridge_request_startup,
        EntryPoint::RequestDeactivate => bridge_request_shutdown,
        EntryPoint::Shutdown => bridge_module_shutdown,
    }
}

/// Reverse of `thunk_for`; `None` for pointers this crate did not hand out.
pub fn entry_point_of(function: LifecycleFn) -> Option<EntryPoint> {
    let address = function as usize;
    ALL_ENTRY_POINTS
        .into_iter()
        .find(|entry| thunk_for(*entry) as usize == address)
}

pub extern "C" fn bridge_module_startup(module_type: c_int, module_number: c_int) -> c_int {
    dispatch(EntryPoint::Startup, module_type, module_number)
}

pub extern "C" fn bridge_mismatch_startup(module_type: c_int, module_number: c_int) -> c_int {
    dispatch(EntryPoint::MismatchStartup, module_type, module_number)
}

pub extern "C" fn bridge_request_startup(module_type: c_int, module_number: c_int) -> c_int {
    dispatch(EntryPoint::RequestActivate, module_type, module_number)
}

pub extern "C" fn bridge_request_shutdown(module_type: c_int, module_number: c_int) -> c_int {
    dispatch(EntryPoint::RequestDeactivate, module_type, module_number)
}

pub extern "C" fn bridge_module_shutdown(module_type: c_int, module_number: c_int) -> c_int {
    dispatch(EntryPoint::Shutdown, module_type, module_number)
}

fn dispatch(entry: EntryPoint, module_type: c_int, module_number: c_int) -> c_int {
    let module_type = ModuleType(module_type);
    let handle = ModuleHandle(module_number);
    let outcome = panic::catch_unwind(|| match HOST_CONTEXT.get() {
        Some(ctx) => entry.invoke(ctx, module_type, handle),
        None => without_host(entry, module_type, handle),
    });

    match outcome {
        Ok(status) => status.as_raw(),
        Err(_) => {
            error!(
                "event=panic_captured module=ffi status=error entry={:?} type={} handle={}",
                entry, module_type, handle
            );
            HostStatus::Failure.as_raw()
        }
    }
}

fn without_host(entry: EntryPoint, module_type: ModuleType, handle: ModuleHandle) -> HostStatus {
    if entry == EntryPoint::Startup {
        error!(
            "event=module_startup module=ffi status=error type={} handle={} error=host_not_installed",
            module_type, handle
        );
        return HostStatus::Failure;
    }
    warn!(
        "event=unresolved_handle module=ffi status=skip entry={:?} type={} handle={} error=host_not_installed",
        entry, module_type, handle
    );
    HostStatus::Success
}

#[cfg(test)]
mod tests {
    use super::{entry_point_of, thunk_for, ALL_ENTRY_POINTS};

    #[test]
    fn every_entry_point_maps_to_a_distinct_thunk() {
        for entry in ALL_ENTRY_POINTS {
            assert_eq!(entry_point_of(thunk_for(entry)), Some(entry));
        }
    }

    #[test]
    fn foreign_function_pointer_is_not_recognized() {
        extern "C" fn foreign(_module_type: i32, _module_number: i32) -> i32 {
            0
        }
        assert_eq!(entry_point_of(foreign), None);
    }
}

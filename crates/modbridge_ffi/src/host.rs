//! Host adapter over a table of C callbacks.
//!
//! # Responsibility
//! - Let a native host supply the module-table scan, configuration
//!   registration, diagnostic sink and globals declaration as plain function
//!   pointers.
//! - Keep every configuration table handed to the host alive.
//!
//! # Invariants
//! - Callbacks are only invoked from the thread running the lifecycle event.
//! - A non-zero status from `register_ini_entries` is a rejection.

use crate::raw::{RawIniEntryDef, RawIniTable};
use log::warn;
use modbridge_core::host::{init_globals, BridgeGlobals, GlobalsInitializer};
use modbridge_core::{
    ConfigSlot, DiagnosticLevel, Host, HostError, HostResult, LoadedModule, ModuleHandle,
};
use std::collections::BTreeMap;
use std::ffi::{c_char, c_int, c_void, CStr, CString};
use std::sync::{Mutex, PoisonError};

/// Called once per loaded module during a scan.
pub type ModuleVisitor =
    unsafe extern "C" fn(visit_ctx: *mut c_void, name: *const c_char, module_number: c_int);

/// Per-context constructor the host runs on freshly allocated globals.
pub type GlobalsCtor = unsafe extern "C" fn(globals: *mut c_void);

/// Services a native host exposes to the bridge.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct HostCallbacks {
    /// Walks the live module table, calling `visitor` with `visit_ctx` for
    /// every entry.
    pub for_each_module: unsafe extern "C" fn(visit_ctx: *mut c_void, visitor: ModuleVisitor),
    /// Registers a terminated configuration-entry array; returns `0` on success.
    pub register_ini_entries:
        unsafe extern "C" fn(entries: *const RawIniEntryDef, module_number: c_int) -> c_int,
    /// Emits a message at a host error-level bitmask.
    pub emit_diagnostic: unsafe extern "C" fn(level: c_int, message: *const c_char),
    /// Declares the bridge globals structure. When absent the bridge runs the
    /// initializer itself, as a host without per-context globals would.
    pub declare_globals: Option<unsafe extern "C" fn(globals_size: usize, ctor: GlobalsCtor)>,
}

/// `Host` implementation forwarding to `HostCallbacks`.
pub struct CallbackHost {
    callbacks: HostCallbacks,
    ini_tables: Mutex<BTreeMap<ModuleHandle, RawIniTable>>,
}

impl CallbackHost {
    pub fn new(callbacks: HostCallbacks) -> Self {
        Self {
            callbacks,
            ini_tables: Mutex::new(BTreeMap::new()),
        }
    }
}

impl Host for CallbackHost {
    fn loaded_modules(&self) -> Vec<LoadedModule> {
        let mut modules: Vec<LoadedModule> = Vec::new();
        let visit_ctx = (&mut modules as *mut Vec<LoadedModule>).cast::<c_void>();
        // SAFETY: `visit_ctx` points at `modules`, which outlives the call, and
        // `collect_module` is the only visitor that dereferences it.
        unsafe { (self.callbacks.for_each_module)(visit_ctx, collect_module) };
        modules
    }

    fn register_config_entries(
        &self,
        table: &[ConfigSlot],
        handle: ModuleHandle,
    ) -> HostResult<()> {
        let raw = RawIniTable::build(table)?;
        // SAFETY: `raw` owns a terminated array and is kept alive below.
        let status = unsafe { (self.callbacks.register_ini_entries)(raw.as_ptr(), handle.get()) };
        if status != 0 {
            return Err(HostError::ConfigRegistrationRejected {
                handle,
                reason: format!("host returned status {status}"),
            });
        }
        self.ini_tables
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(handle, raw);
        Ok(())
    }

    /// Hands the structure size and `bridge_globals_ctor` to the host. The
    /// host's constructor always runs `init_globals`, so a different
    /// `initializer` only applies when no declaration callback is installed.
    fn init_module_globals(&self, initializer: GlobalsInitializer) {
        match self.callbacks.declare_globals {
            // SAFETY: the ctor only writes through a non-null pointer the host
            // allocated with the declared size.
            Some(declare) => unsafe {
                declare(std::mem::size_of::<BridgeGlobals>(), bridge_globals_ctor)
            },
            None => initializer(&mut BridgeGlobals::default()),
        }
    }

    fn emit_diagnostic(&self, level: DiagnosticLevel, message: &str) {
        let Ok(text) = CString::new(message.replace('\0', " ")) else {
            warn!("event=diagnostic_dropped module=ffi status=error level={level:?}");
            return;
        };
        // SAFETY: `text` is a valid C string for the duration of the call.
        unsafe { (self.callbacks.emit_diagnostic)(level.host_code(), text.as_ptr()) };
    }
}

/// Constructor handed to the host for each execution context's globals.
///
/// # Safety
/// `globals` must be null or point to storage of the declared globals size.
pub unsafe extern "C" fn bridge_globals_ctor(globals: *mut c_void) {
    if globals.is_null() {
        return;
    }
    init_globals(&mut *globals.cast::<BridgeGlobals>());
}

unsafe extern "C" fn collect_module(
    visit_ctx: *mut c_void,
    name: *const c_char,
    module_number: c_int,
) {
    if visit_ctx.is_null() || name.is_null() {
        return;
    }
    let modules = &mut *visit_ctx.cast::<Vec<LoadedModule>>();
    let name = CStr::from_ptr(name).to_string_lossy().into_owned();
    modules.push(LoadedModule::new(name, ModuleHandle(module_number)));
}

#[cfg(test)]
mod tests {
    use super::{bridge_globals_ctor, CallbackHost, GlobalsCtor, HostCallbacks, ModuleVisitor};
    use crate::raw::RawIniEntryDef;
    use modbridge_core::host::BridgeGlobals;
    use modbridge_core::Host;
    use std::ffi::{c_char, c_int, c_void};
    use std::sync::atomic::{AtomicUsize, Ordering};

    static LOCAL_INITS: AtomicUsize = AtomicUsize::new(0);
    static BYPASSED_INITS: AtomicUsize = AtomicUsize::new(0);
    static DECLARED_SIZE: AtomicUsize = AtomicUsize::new(usize::MAX);
    static DECLARATIONS: AtomicUsize = AtomicUsize::new(0);

    unsafe extern "C" fn no_modules(_visit_ctx: *mut c_void, _visitor: ModuleVisitor) {}

    unsafe extern "C" fn accept_ini(
        _entries: *const RawIniEntryDef,
        _module_number: c_int,
    ) -> c_int {
        0
    }

    unsafe extern "C" fn drop_diagnostic(_level: c_int, _message: *const c_char) {}

    unsafe extern "C" fn record_declaration(globals_size: usize, ctor: GlobalsCtor) {
        DECLARED_SIZE.store(globals_size, Ordering::SeqCst);
        DECLARATIONS.fetch_add(1, Ordering::SeqCst);
        let mut globals = BridgeGlobals::default();
        ctor((&mut globals as *mut BridgeGlobals).cast::<c_void>());
    }

    fn count_local_init(_globals: &mut BridgeGlobals) {
        LOCAL_INITS.fetch_add(1, Ordering::SeqCst);
    }

    fn count_bypassed_init(_globals: &mut BridgeGlobals) {
        BYPASSED_INITS.fetch_add(1, Ordering::SeqCst);
    }

    fn callbacks(
        declare_globals: Option<unsafe extern "C" fn(usize, GlobalsCtor)>,
    ) -> HostCallbacks {
        HostCallbacks {
            for_each_module: no_modules,
            register_ini_entries: accept_ini,
            emit_diagnostic: drop_diagnostic,
            declare_globals,
        }
    }

    #[test]
    fn globals_are_declared_to_host_when_callback_present() {
        let host = CallbackHost::new(callbacks(Some(record_declaration)));

        host.init_module_globals(count_bypassed_init);

        assert_eq!(DECLARATIONS.load(Ordering::SeqCst), 1);
        assert_eq!(
            DECLARED_SIZE.load(Ordering::SeqCst),
            std::mem::size_of::<BridgeGlobals>()
        );
        assert_eq!(BYPASSED_INITS.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn globals_initializer_runs_locally_without_callback() {
        let host = CallbackHost::new(callbacks(None));
        let before = LOCAL_INITS.load(Ordering::SeqCst);

        host.init_module_globals(count_local_init);

        assert_eq!(LOCAL_INITS.load(Ordering::SeqCst), before + 1);
    }

    #[test]
    fn globals_ctor_ignores_null_pointer() {
        unsafe { bridge_globals_ctor(std::ptr::null_mut()) };
    }
}

//! Host collaborator contract.
//!
//! # Responsibility
//! - Describe the few host services the bridge consumes: the live module table
//!   scan, configuration-table registration, the diagnostic sink and the
//!   globals declaration hook.
//! - Provide `SimulatedHost`, an in-process host for tests and smoke probes.
//!
//! # Invariants
//! - `loaded_modules` reflects the host's module table at call time.
//! - The bridge never holds its registry lock while calling into the host.

use crate::abi::ModuleHandle;
use crate::config_entry::ConfigSlot;
use crate::error::{HostError, HostResult};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// One entry of the host's live module table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedModule {
    pub name: String,
    pub handle: ModuleHandle,
}

impl LoadedModule {
    pub fn new(name: impl Into<String>, handle: ModuleHandle) -> Self {
        Self {
            name: name.into(),
            handle,
        }
    }
}

/// Severity accepted by the host diagnostic sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticLevel {
    Notice,
    Warning,
    Error,
}

impl DiagnosticLevel {
    /// Host error-level bitmask.
    pub fn host_code(self) -> i32 {
        match self {
            Self::Error => 1,
            Self::Warning => 2,
            Self::Notice => 8,
        }
    }
}

/// Per-context globals the bridge declares to the host.
///
/// Carries no state; user handlers keep their own.
#[derive(Debug, Default)]
pub struct BridgeGlobals {
    _reserved: (),
}

pub type GlobalsInitializer = fn(&mut BridgeGlobals);

/// Initializer handed to the host for each execution context. Does nothing.
pub fn init_globals(_globals: &mut BridgeGlobals) {}

/// Services the host runtime provides to the bridge.
pub trait Host: Send + Sync {
    /// Snapshot of the host's currently loaded module descriptors.
    fn loaded_modules(&self) -> Vec<LoadedModule>;

    /// Registers a terminated configuration table for `handle`.
    fn register_config_entries(&self, table: &[ConfigSlot], handle: ModuleHandle)
        -> HostResult<()>;

    fn emit_diagnostic(&self, level: DiagnosticLevel, message: &str);

    /// Declares the bridge globals; non-threaded hosts run the initializer once.
    fn init_module_globals(&self, initializer: GlobalsInitializer) {
        let mut globals = BridgeGlobals::default();
        initializer(&mut globals);
    }
}

#[derive(Default)]
struct SimulatedState {
    modules: Vec<LoadedModule>,
    config_tables: BTreeMap<ModuleHandle, Vec<ConfigSlot>>,
    diagnostics: Vec<(DiagnosticLevel, String)>,
    reject_config: Option<String>,
}

/// In-process host with an inspectable module table.
#[derive(Default)]
pub struct SimulatedHost {
    state: Mutex<SimulatedState>,
    scan_count: AtomicUsize,
    globals_inits: AtomicUsize,
}

impl SimulatedHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a module to the live table, as the host does when loading one.
    pub fn load_module(&self, name: impl Into<String>, handle: ModuleHandle) {
        self.lock_state()
            .modules
            .push(LoadedModule::new(name, handle));
    }

    /// Makes every later configuration registration fail with `reason`.
    pub fn reject_config_registration(&self, reason: impl Into<String>) {
        self.lock_state().reject_config = Some(reason.into());
    }

    /// Number of module-table scans performed so far.
    pub fn scan_count(&self) -> usize {
        self.scan_count.load(Ordering::SeqCst)
    }

    pub fn globals_init_count(&self) -> usize {
        self.globals_inits.load(Ordering::SeqCst)
    }

    /// Configuration table registered for `handle`, terminator included.
    pub fn registered_config(&self, handle: ModuleHandle) -> Option<Vec<ConfigSlot>> {
        self.lock_state().config_tables.get(&handle).cloned()
    }

    pub fn diagnostics(&self) -> Vec<(DiagnosticLevel, String)> {
        self.lock_state().diagnostics.clone()
    }

    fn lock_state(&self) -> MutexGuard<'_, SimulatedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Host for SimulatedHost {
    fn loaded_modules(&self) -> Vec<LoadedModule> {
        self.scan_count.fetch_add(1, Ordering::SeqCst);
        self.lock_state().modules.clone()
    }

    fn register_config_entries(
        &self,
        table: &[ConfigSlot],
        handle: ModuleHandle,
    ) -> HostResult<()> {
        let mut state = self.lock_state();
        if let Some(reason) = &state.reject_config {
            return Err(HostError::ConfigRegistrationRejected {
                handle,
                reason: reason.clone(),
            });
        }
        state.config_tables.insert(handle, table.to_vec());
        Ok(())
    }

    fn emit_diagnostic(&self, level: DiagnosticLevel, message: &str) {
        self.lock_state()
            .diagnostics
            .push((level, message.to_string()));
    }

    fn init_module_globals(&self, initializer: GlobalsInitializer) {
        self.globals_inits.fetch_add(1, Ordering::SeqCst);
        let mut globals = BridgeGlobals::default();
        initializer(&mut globals);
    }
}

#[cfg(test)]
mod tests {
    use super::{Host, SimulatedHost};
    use crate::abi::ModuleHandle;
    use crate::config_entry::ConfigSlot;
    use crate::error::HostError;

    #[test]
    fn scan_is_counted_and_returns_loaded_modules() {
        let host = SimulatedHost::new();
        host.load_module("sample", ModuleHandle(7));

        let modules = host.loaded_modules();
        assert_eq!(modules.len(), 1);
        assert_eq!(modules[0].handle, ModuleHandle(7));
        assert_eq!(host.scan_count(), 1);
    }

    #[test]
    fn rejected_config_registration_reports_handle() {
        let host = SimulatedHost::new();
        host.reject_config_registration("duplicate entry");

        let err = host
            .register_config_entries(&[ConfigSlot::default()], ModuleHandle(2))
            .expect_err("rejection must surface");
        assert!(matches!(
            err,
            HostError::ConfigRegistrationRejected { handle, .. } if handle == ModuleHandle(2)
        ));
        assert!(host.registered_config(ModuleHandle(2)).is_none());
    }
}

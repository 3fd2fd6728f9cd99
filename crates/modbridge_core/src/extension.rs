//! Extension core: identity, registered surface, lifecycle handlers and lock.
//!
//! # Responsibility
//! - Collect functions and configuration entries in registration order.
//! - Build and cache the host descriptor.
//! - Run the startup algorithm and flip the one-way lock.
//!
//! # Invariants
//! - `locked` starts false and becomes true exactly once, at startup.
//! - After lock every structural call (functions, configuration entries,
//!   handlers) is a silent no-op that returns the extension unchanged.
//!   Callers that need to know must check `is_locked()` first.
//! - Once a function table is built the same descriptor instance is returned.
//! - User handlers run without any extension lock held.
//!
//! # See also
//! - `registry` for handle resolution, `dispatcher` for host entry points.

use crate::abi::{ModuleHandle, BRIDGE_API_VERSION};
use crate::callable::{Arguments, Callable, InvokeHandler};
use crate::config_entry::{ConfigEntry, ConfigSlot};
use crate::descriptor::{FunctionTable, LifecycleEntryPoints, ModuleDescriptor};
use crate::dispatcher::{LifecycleEvent, ModuleLifecycle};
use crate::error::BridgeResult;
use crate::host::Host;
use crate::registry::ExtensionRegistry;
use log::{debug, error, info};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Zero-argument user callback attached to a lifecycle event.
pub type LifecycleHandler = Arc<dyn Fn() + Send + Sync>;

#[derive(Default, Clone)]
struct LifecycleHandlers {
    startup: Option<LifecycleHandler>,
    request_activate: Option<LifecycleHandler>,
    request_deactivate: Option<LifecycleHandler>,
    shutdown: Option<LifecycleHandler>,
}

#[derive(Default)]
struct ExtensionState {
    functions: Vec<Callable>,
    config_entries: Vec<ConfigEntry>,
    handlers: LifecycleHandlers,
    locked: bool,
    descriptor: Option<Arc<ModuleDescriptor>>,
}

/// One logical extension installed into the host.
pub struct Extension {
    name: String,
    version: String,
    api_version: u32,
    entry_points: LifecycleEntryPoints,
    registry: Arc<ExtensionRegistry>,
    state: Mutex<ExtensionState>,
}

impl Extension {
    /// Creates an extension registered in the process-wide registry.
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        api_version: u32,
    ) -> Arc<Self> {
        Self::with_registry(&ExtensionRegistry::global(), name, version, api_version)
    }

    /// Creates an extension registered in `registry`.
    ///
    /// An `api_version` other than `BRIDGE_API_VERSION` still registers the
    /// extension, but wires the inert mismatch entry points.
    pub fn with_registry(
        registry: &Arc<ExtensionRegistry>,
        name: impl Into<String>,
        version: impl Into<String>,
        api_version: u32,
    ) -> Arc<Self> {
        let entry_points = if api_version == BRIDGE_API_VERSION {
            LifecycleEntryPoints::standard()
        } else {
            LifecycleEntryPoints::mismatch()
        };
        let extension = Arc::new(Self {
            name: name.into(),
            version: version.into(),
            api_version,
            entry_points,
            registry: Arc::clone(registry),
            state: Mutex::new(ExtensionState::default()),
        });
        registry.register_by_name(&extension.name, &extension);
        extension
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn api_version(&self) -> u32 {
        self.api_version
    }

    /// Whether the declared API version differs from `BRIDGE_API_VERSION`.
    pub fn is_mismatched(&self) -> bool {
        self.entry_points.is_mismatch()
    }

    pub fn is_locked(&self) -> bool {
        self.lock_state().locked
    }

    pub fn set_startup_handler<F>(&self, handler: F) -> &Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.update_handlers(|handlers| handlers.startup = Some(Arc::new(handler)))
    }

    pub fn set_request_activate_handler<F>(&self, handler: F) -> &Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.update_handlers(|handlers| handlers.request_activate = Some(Arc::new(handler)))
    }

    pub fn set_request_deactivate_handler<F>(&self, handler: F) -> &Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.update_handlers(|handlers| handlers.request_deactivate = Some(Arc::new(handler)))
    }

    pub fn set_shutdown_handler<F>(&self, handler: F) -> &Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.update_handlers(|handlers| handlers.shutdown = Some(Arc::new(handler)))
    }

    /// Appends a function. No-op after lock; duplicate names are not checked.
    pub fn register_function(
        &self,
        name: impl Into<String>,
        handler: InvokeHandler,
        arguments: impl Into<Arguments>,
    ) -> &Self {
        let mut state = self.lock_state();
        if state.locked {
            return self;
        }
        state
            .functions
            .push(Callable::new(name, handler, arguments.into()));
        let table_pending = state.descriptor.as_ref().is_some_and(|descriptor| {
            descriptor.functions.is_none() && !descriptor.is_mismatch()
        });
        if table_pending {
            state.descriptor = None;
        }
        self
    }

    /// Appends a configuration entry. No-op after lock.
    pub fn register_config_entry(&self, entry: ConfigEntry) -> &Self {
        let mut state = self.lock_state();
        if !state.locked {
            state.config_entries.push(entry);
        }
        self
    }

    pub fn function_quantity(&self) -> usize {
        self.lock_state().functions.len()
    }

    pub fn config_entry_quantity(&self) -> usize {
        self.lock_state().config_entries.len()
    }

    pub fn function_names(&self) -> Vec<String> {
        self.lock_state()
            .functions
            .iter()
            .map(|callable| callable.name().to_string())
            .collect()
    }

    pub fn config_entry_names(&self) -> Vec<String> {
        self.lock_state()
            .config_entries
            .iter()
            .map(|entry| entry.name().to_string())
            .collect()
    }

    /// Returns the host descriptor, building the function table on first use.
    ///
    /// The table is skipped for mismatch extensions and for extensions
    /// without functions; such a descriptor is rebuilt if a function is
    /// registered before lock.
    pub fn descriptor(&self) -> Arc<ModuleDescriptor> {
        let mut state = self.lock_state();
        if let Some(descriptor) = &state.descriptor {
            return Arc::clone(descriptor);
        }

        let functions = if self.is_mismatched() || state.functions.is_empty() {
            None
        } else {
            Some(FunctionTable::build(&state.functions))
        };
        if let Some(table) = &functions {
            debug!(
                "event=descriptor_built module=extension status=ok name={} slots={}",
                self.name,
                table.len()
            );
        }

        let descriptor = Arc::new(ModuleDescriptor::new(
            self.name.clone(),
            self.version.clone(),
            functions,
            self.entry_points,
        ));
        state.descriptor = Some(Arc::clone(&descriptor));
        descriptor
    }

    /// Startup algorithm for one real module load.
    ///
    /// Registers the terminated configuration table with the host, runs the
    /// startup handler if any, then locks. The lock is set whether or not a
    /// handler exists. A host rejection is returned as-is and leaves the
    /// extension unlocked.
    pub fn initialize(&self, host: &dyn Host, handle: ModuleHandle) -> BridgeResult<()> {
        let table = {
            let state = self.lock_state();
            let mut table = vec![ConfigSlot::default(); state.config_entries.len() + 1];
            for (slot, entry) in table.iter_mut().zip(&state.config_entries) {
                entry.fill_slot(slot, handle);
            }
            table
        };

        if let Err(err) = host.register_config_entries(&table, handle) {
            error!(
                "event=config_entries_registered module=extension status=error name={} handle={} error={}",
                self.name, handle, err
            );
            return Err(err.into());
        }
        debug!(
            "event=config_entries_registered module=extension status=ok name={} handle={} count={}",
            self.name,
            handle,
            table.len() - 1
        );

        let startup = self.lock_state().handlers.startup.clone();
        if let Some(handler) = startup {
            handler();
        }

        self.lock_state().locked = true;
        info!(
            "event=module_startup module=extension status=ok name={} version={} handle={}",
            self.name, self.version, handle
        );
        Ok(())
    }

    /// Runs the request-activate handler, if set.
    pub fn activate_request(&self) {
        let handler = self.lock_state().handlers.request_activate.clone();
        if let Some(handler) = handler {
            handler();
        }
    }

    /// Runs the request-deactivate handler, if set.
    pub fn deactivate_request(&self) {
        let handler = self.lock_state().handlers.request_deactivate.clone();
        if let Some(handler) = handler {
            handler();
        }
    }

    /// Runs the shutdown handler, if set. The lock is kept.
    pub fn shutdown(&self, handle: ModuleHandle) {
        let handler = self.lock_state().handlers.shutdown.clone();
        if let Some(handler) = handler {
            handler();
        }
        info!(
            "event=module_shutdown module=extension status=ok name={} handle={}",
            self.name, handle
        );
    }

    fn update_handlers(&self, apply: impl FnOnce(&mut LifecycleHandlers)) -> &Self {
        let mut state = self.lock_state();
        if !state.locked {
            apply(&mut state.handlers);
        }
        self
    }

    fn lock_state(&self) -> MutexGuard<'_, ExtensionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ModuleLifecycle for Extension {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn handle_event(
        &self,
        event: LifecycleEvent,
        host: &dyn Host,
        handle: ModuleHandle,
    ) -> BridgeResult<()> {
        match event {
            LifecycleEvent::Startup => self.initialize(host, handle),
            LifecycleEvent::RequestActivate => {
                self.activate_request();
                Ok(())
            }
            LifecycleEvent::RequestDeactivate => {
                self.deactivate_request();
                Ok(())
            }
            LifecycleEvent::Shutdown => {
                self.shutdown(handle);
                Ok(())
            }
        }
    }
}

impl Drop for Extension {
    fn drop(&mut self) {
        self.registry
            .unregister_if_current(&self.name, self as *const Self);
    }
}

#[cfg(test)]
mod tests {
    use super::Extension;
    use crate::abi::{ModuleHandle, BRIDGE_API_VERSION};
    use crate::callable::Arguments;
    use crate::host::SimulatedHost;
    use crate::registry::ExtensionRegistry;
    use std::ffi::c_void;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    unsafe extern "C" fn noop(_execute_data: *mut c_void, _return_value: *mut c_void) {}

    fn extension(name: &str) -> Arc<Extension> {
        let registry = Arc::new(ExtensionRegistry::new());
        Extension::with_registry(&registry, name, "1.0", BRIDGE_API_VERSION)
    }

    #[test]
    fn handlers_set_after_lock_are_ignored() {
        let ext = extension("late");
        let host = SimulatedHost::new();
        let calls = Arc::new(AtomicUsize::new(0));
        ext.initialize(&host, ModuleHandle(1)).expect("startup succeeds");

        let counter = Arc::clone(&calls);
        ext.set_shutdown_handler(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        ext.shutdown(ModuleHandle(1));

        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn last_handler_before_lock_wins() {
        let ext = extension("overwrite");
        let host = SimulatedHost::new();
        let calls = Arc::new(AtomicUsize::new(0));

        ext.set_startup_handler(|| panic!("replaced handler must not run"));
        let counter = Arc::clone(&calls);
        ext.set_startup_handler(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        ext.initialize(&host, ModuleHandle(1)).expect("startup succeeds");

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn handler_may_query_extension_without_deadlock() {
        let ext = extension("reentrant");
        let host = SimulatedHost::new();
        let observed = Arc::new(AtomicUsize::new(0));

        let inner = Arc::clone(&ext);
        let seen = Arc::clone(&observed);
        ext.set_startup_handler(move || {
            seen.store(inner.function_quantity() + 1, Ordering::SeqCst);
        });
        ext.initialize(&host, ModuleHandle(1)).expect("startup succeeds");

        assert_eq!(observed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn empty_descriptor_is_rebuilt_once_functions_arrive() {
        let ext = extension("lazy");
        let empty = ext.descriptor();
        assert!(empty.functions.is_none());
        assert!(Arc::ptr_eq(&empty, &ext.descriptor()));

        ext.register_function("late", noop, Arguments::none());
        let built = ext.descriptor();
        assert!(!Arc::ptr_eq(&empty, &built));
        assert_eq!(built.functions.as_ref().map(|table| table.len()), Some(2));
    }

    #[test]
    fn built_table_is_not_rebuilt_before_lock() {
        let ext = extension("cached");
        ext.register_function("one", noop, Arguments::none());
        let first = ext.descriptor();

        ext.register_function("two", noop, Arguments::none());
        let second = ext.descriptor();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(ext.function_quantity(), 2);
        assert_eq!(second.functions.as_ref().map(|table| table.len()), Some(2));
    }
}

//! Host module descriptor as built from an extension.
//!
//! # Responsibility
//! - Hold the identity, ABI markers, function table and lifecycle entry points
//!   the host reads from a module descriptor.
//! - Build the terminated function table from registered callables.
//!
//! # Invariants
//! - A function table always ends with exactly one terminator slot.
//! - An extension with no functions has no table at all, never a
//!   terminator-only table.
//! - Mismatch descriptors expose only the mismatch startup entry point.

use crate::abi::{HostAbi, HostStatus, ModuleHandle, ModuleType};
use crate::callable::{Callable, FunctionSlot};
use crate::dispatcher::{self, HostContext};
use serde::Serialize;

/// Terminated function table in registration order.
#[derive(Debug, Clone)]
pub struct FunctionTable {
    slots: Vec<FunctionSlot>,
}

impl FunctionTable {
    /// Materializes `functions` slot by slot and appends the terminator.
    pub fn build(functions: &[Callable]) -> Self {
        let mut slots = vec![FunctionSlot::default(); functions.len() + 1];
        for (slot, callable) in slots.iter_mut().zip(functions) {
            callable.fill_slot(slot);
        }
        Self { slots }
    }

    /// All slots, terminator included.
    pub fn slots(&self) -> &[FunctionSlot] {
        &self.slots
    }

    /// Real entries, terminator excluded.
    pub fn entries(&self) -> &[FunctionSlot] {
        &self.slots[..self.slots.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.len() <= 1
    }
}

/// Static lifecycle entry point wired into a descriptor slot.
///
/// Each variant is a stateless adapter: it resolves the extension by handle
/// and forwards to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryPoint {
    Startup,
    MismatchStartup,
    RequestActivate,
    RequestDeactivate,
    Shutdown,
}

impl EntryPoint {
    pub fn invoke(
        self,
        ctx: &HostContext,
        module_type: ModuleType,
        handle: ModuleHandle,
    ) -> HostStatus {
        match self {
            Self::Startup => dispatcher::process_startup(ctx, module_type, handle),
            Self::MismatchStartup => dispatcher::process_mismatch(ctx, module_type, handle),
            Self::RequestActivate => {
                dispatcher::process_request_activate(ctx, module_type, handle)
            }
            Self::RequestDeactivate => {
                dispatcher::process_request_deactivate(ctx, module_type, handle)
            }
            Self::Shutdown => dispatcher::process_shutdown(ctx, module_type, handle),
        }
    }
}

/// The four lifecycle slots of a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LifecycleEntryPoints {
    pub startup: Option<EntryPoint>,
    pub shutdown: Option<EntryPoint>,
    pub request_activate: Option<EntryPoint>,
    pub request_deactivate: Option<EntryPoint>,
}

impl LifecycleEntryPoints {
    pub fn standard() -> Self {
        Self {
            startup: Some(EntryPoint::Startup),
            shutdown: Some(EntryPoint::Shutdown),
            request_activate: Some(EntryPoint::RequestActivate),
            request_deactivate: Some(EntryPoint::RequestDeactivate),
        }
    }

    /// Inert wiring: startup only reports the version mismatch.
    pub fn mismatch() -> Self {
        Self {
            startup: Some(EntryPoint::MismatchStartup),
            shutdown: None,
            request_activate: None,
            request_deactivate: None,
        }
    }

    pub fn is_mismatch(&self) -> bool {
        self.startup == Some(EntryPoint::MismatchStartup)
    }
}

/// Host-facing module descriptor.
#[derive(Debug, Clone)]
pub struct ModuleDescriptor {
    pub name: String,
    pub version: String,
    pub abi: HostAbi,
    pub functions: Option<FunctionTable>,
    pub entry_points: LifecycleEntryPoints,
}

impl ModuleDescriptor {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        functions: Option<FunctionTable>,
        entry_points: LifecycleEntryPoints,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            abi: HostAbi::current(),
            functions,
            entry_points,
        }
    }

    pub fn is_mismatch(&self) -> bool {
        self.entry_points.is_mismatch()
    }

    pub fn snapshot(&self) -> DescriptorSnapshot {
        DescriptorSnapshot {
            name: self.name.clone(),
            version: self.version.clone(),
            abi: self.abi,
            functions: self.functions.as_ref().map(|table| {
                table
                    .entries()
                    .iter()
                    .filter_map(|slot| slot.name.clone())
                    .collect()
            }),
            entry_points: self.entry_points,
        }
    }
}

/// Serializable view of a descriptor for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DescriptorSnapshot {
    pub name: String,
    pub version: String,
    pub abi: HostAbi,
    pub functions: Option<Vec<String>>,
    pub entry_points: LifecycleEntryPoints,
}

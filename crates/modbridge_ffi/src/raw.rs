//! Byte-level host records built from a `ModuleDescriptor`.
//!
//! # Responsibility
//! - Mirror the host's module entry, function entry, argument info and
//!   configuration-entry definition layouts with `#[repr(C)]` structs.
//! - Own every C string and array those records point into.
//!
//! # Invariants
//! - Function and configuration arrays end with one all-zero record.
//! - A `RawModule` never moves its heap buffers; the `entry` pointers stay
//!   valid for as long as the owning `RawModule` lives.

use crate::thunks;
use modbridge_core::{
    ConfigSlot, FunctionSlot, HostError, HostResult, InvokeHandler, ModuleDescriptor,
};
use std::ffi::{c_char, c_int, c_void, CString};
use std::ptr;
use std::sync::Arc;

/// `(type, module_number) -> status` host lifecycle callback.
pub type LifecycleFn = unsafe extern "C" fn(module_type: c_int, module_number: c_int) -> c_int;

/// Argument info record. The first record of a function carries the
/// required argument count in `name`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RawArgInfo {
    pub name: *const c_char,
    pub type_: usize,
    pub pass_by_reference: u8,
    pub is_variadic: u8,
}

/// Function-table record.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RawFunctionEntry {
    pub fname: *const c_char,
    pub handler: Option<InvokeHandler>,
    pub arg_info: *const RawArgInfo,
    pub num_args: u32,
    pub flags: u32,
}

impl RawFunctionEntry {
    pub const TERMINATOR: Self = Self {
        fname: ptr::null(),
        handler: None,
        arg_info: ptr::null(),
        num_args: 0,
        flags: 0,
    };

    pub fn is_terminator(&self) -> bool {
        self.fname.is_null()
    }
}

/// Configuration-entry definition record.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RawIniEntryDef {
    pub name: *const c_char,
    pub on_modify: *const c_void,
    pub mh_arg1: *mut c_void,
    pub mh_arg2: *mut c_void,
    pub mh_arg3: *mut c_void,
    pub value: *const c_char,
    pub displayer: *const c_void,
    pub modifiable: c_int,
    pub name_length: u32,
    pub value_length: u32,
}

impl RawIniEntryDef {
    pub const TERMINATOR: Self = Self {
        name: ptr::null(),
        on_modify: ptr::null(),
        mh_arg1: ptr::null_mut(),
        mh_arg2: ptr::null_mut(),
        mh_arg3: ptr::null_mut(),
        value: ptr::null(),
        displayer: ptr::null(),
        modifiable: 0,
        name_length: 0,
        value_length: 0,
    };

    pub fn is_terminator(&self) -> bool {
        self.name.is_null()
    }
}

/// Module entry record the host reads when loading a module.
#[repr(C)]
#[derive(Debug)]
pub struct RawModuleEntry {
    pub size: u16,
    pub zend_api: u32,
    pub zend_debug: u8,
    pub zts: u8,
    pub ini_entry: *const c_void,
    pub deps: *const c_void,
    pub name: *const c_char,
    pub functions: *const RawFunctionEntry,
    pub module_startup_func: Option<LifecycleFn>,
    pub module_shutdown_func: Option<LifecycleFn>,
    pub request_startup_func: Option<LifecycleFn>,
    pub request_shutdown_func: Option<LifecycleFn>,
    pub info_func: *const c_void,
    pub version: *const c_char,
    pub globals_size: usize,
    pub globals_ptr: *mut c_void,
    pub globals_ctor: *const c_void,
    pub globals_dtor: *const c_void,
    pub post_deactivate_func: *const c_void,
    pub module_started: c_int,
    pub type_: u8,
    pub handle: *mut c_void,
    pub module_number: c_int,
    pub build_id: *const c_char,
}

/// Owner of one module entry and everything it points into.
pub struct RawModule {
    entry: RawModuleEntry,
    descriptor: Arc<ModuleDescriptor>,
    _strings: Vec<CString>,
    _functions: Vec<RawFunctionEntry>,
    _arg_infos: Vec<Vec<RawArgInfo>>,
}

// SAFETY: the raw pointers in `entry` only point into buffers owned by this
// struct, which are never mutated after construction.
unsafe impl Send for RawModule {}

impl RawModule {
    /// Materializes `descriptor` into host records.
    ///
    /// # Errors
    /// - `HostError::InvalidName` when a name, version or argument name
    ///   contains an interior NUL byte.
    pub fn build(descriptor: Arc<ModuleDescriptor>) -> HostResult<Self> {
        let mut strings = Vec::new();
        let name = intern(&mut strings, &descriptor.name)?;
        let version = intern(&mut strings, &descriptor.version)?;
        let build_id = intern(&mut strings, descriptor.abi.build_id)?;

        let mut arg_infos = Vec::new();
        let mut functions = Vec::new();
        if let Some(table) = &descriptor.functions {
            for slot in table.slots() {
                if slot.is_terminator() {
                    functions.push(RawFunctionEntry::TERMINATOR);
                    continue;
                }
                let infos = arg_info_records(&mut strings, slot)?;
                functions.push(RawFunctionEntry {
                    fname: intern(&mut strings, slot.name.as_deref().unwrap_or_default())?,
                    handler: slot.handler,
                    arg_info: infos.as_ptr(),
                    num_args: slot.num_args(),
                    flags: slot.flags,
                });
                arg_infos.push(infos);
            }
        }

        let points = descriptor.entry_points;
        let entry = RawModuleEntry {
            size: std::mem::size_of::<RawModuleEntry>() as u16,
            zend_api: descriptor.abi.module_api_no,
            zend_debug: u8::from(descriptor.abi.debug),
            zts: u8::from(descriptor.abi.thread_safe),
            ini_entry: ptr::null(),
            deps: ptr::null(),
            name,
            functions: if functions.is_empty() {
                ptr::null()
            } else {
                functions.as_ptr()
            },
            module_startup_func: points.startup.map(thunks::thunk_for),
            module_shutdown_func: points.shutdown.map(thunks::thunk_for),
            request_startup_func: points.request_activate.map(thunks::thunk_for),
            request_shutdown_func: points.request_deactivate.map(thunks::thunk_for),
            info_func: ptr::null(),
            version,
            globals_size: 0,
            globals_ptr: ptr::null_mut(),
            globals_ctor: ptr::null(),
            globals_dtor: ptr::null(),
            post_deactivate_func: ptr::null(),
            module_started: 0,
            type_: 0,
            handle: ptr::null_mut(),
            module_number: 0,
            build_id,
        };

        Ok(Self {
            entry,
            descriptor,
            _strings: strings,
            _functions: functions,
            _arg_infos: arg_infos,
        })
    }

    pub fn entry(&self) -> &RawModuleEntry {
        &self.entry
    }

    pub fn descriptor(&self) -> &Arc<ModuleDescriptor> {
        &self.descriptor
    }
}

/// Owned, terminated configuration-entry definitions for one registration.
pub struct RawIniTable {
    entries: Vec<RawIniEntryDef>,
    _strings: Vec<CString>,
}

// SAFETY: same ownership argument as `RawModule`.
unsafe impl Send for RawIniTable {}

impl RawIniTable {
    /// # Errors
    /// - `HostError::InvalidName` for names or values with interior NUL.
    pub fn build(slots: &[ConfigSlot]) -> HostResult<Self> {
        let mut strings = Vec::new();
        let mut entries = Vec::with_capacity(slots.len());
        for slot in slots {
            let (Some(name), Some(value)) = (&slot.name, &slot.default_value) else {
                entries.push(RawIniEntryDef::TERMINATOR);
                continue;
            };
            entries.push(RawIniEntryDef {
                name: intern(&mut strings, name)?,
                value: intern(&mut strings, value)?,
                modifiable: c_int::from(slot.modifiable),
                name_length: name.len() as u32,
                value_length: value.len() as u32,
                ..RawIniEntryDef::TERMINATOR
            });
        }
        Ok(Self {
            entries,
            _strings: strings,
        })
    }

    pub fn as_ptr(&self) -> *const RawIniEntryDef {
        self.entries.as_ptr()
    }

    pub fn entries(&self) -> &[RawIniEntryDef] {
        &self.entries
    }
}

fn intern(strings: &mut Vec<CString>, value: &str) -> HostResult<*const c_char> {
    let owned = CString::new(value).map_err(|_| HostError::InvalidName(value.to_string()))?;
    let pointer = owned.as_ptr();
    strings.push(owned);
    Ok(pointer)
}

fn arg_info_records(
    strings: &mut Vec<CString>,
    slot: &FunctionSlot,
) -> HostResult<Vec<RawArgInfo>> {
    let mut records = Vec::with_capacity(slot.arg_info.len() + 1);
    records.push(RawArgInfo {
        name: slot.required_num_args as usize as *const c_char,
        type_: 0,
        pass_by_reference: 0,
        is_variadic: 0,
    });
    for arg in &slot.arg_info {
        records.push(RawArgInfo {
            name: intern(strings, &arg.name)?,
            type_: encode_type(arg.type_code, arg.allow_null),
            pass_by_reference: u8::from(arg.pass_by_reference),
            is_variadic: u8::from(arg.is_variadic),
        });
    }
    Ok(records)
}

/// Packs a type code and the nullable bit; an untyped argument keeps the bit.
fn encode_type(type_code: u8, allow_null: bool) -> usize {
    (usize::from(type_code) << 1) | usize::from(allow_null)
}

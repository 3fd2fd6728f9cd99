//! Callable registration records and their host function-table slots.
//!
//! # Responsibility
//! - Hold one registered function: name, invocation thunk, parameter metadata.
//! - Materialize into exactly one function-table slot.
//!
//! # Invariants
//! - A record is immutable once constructed.
//! - A default `FunctionSlot` is the all-zero table terminator.

use serde::Serialize;
use std::ffi::c_void;
use std::fmt::{Debug, Formatter};

/// Invocation thunk the host calls with its execute data and return slot.
///
/// The value model behind both pointers belongs to the scripting engine.
pub type InvokeHandler = unsafe extern "C" fn(execute_data: *mut c_void, return_value: *mut c_void);

/// Declared type of one parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgumentKind {
    Mixed,
    Bool,
    Long,
    Double,
    String,
    Array,
    Object,
    Callable,
}

impl ArgumentKind {
    /// Host type code written into argument info, per the targeted module API.
    pub fn type_code(self) -> u8 {
        match self {
            Self::Mixed => 0,
            Self::Bool => 13,
            Self::Long => 4,
            Self::Double => 5,
            Self::String => 6,
            Self::Array => 7,
            Self::Object => 8,
            Self::Callable => 14,
        }
    }
}

/// Parameter metadata for one declared argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArgumentSpec {
    pub name: String,
    pub kind: ArgumentKind,
    pub required: bool,
    pub nullable: bool,
    pub by_reference: bool,
    pub variadic: bool,
}

impl ArgumentSpec {
    pub fn required(name: impl Into<String>, kind: ArgumentKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: true,
            nullable: false,
            by_reference: false,
            variadic: false,
        }
    }

    pub fn optional(name: impl Into<String>, kind: ArgumentKind) -> Self {
        Self {
            required: false,
            ..Self::required(name, kind)
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn by_reference(mut self) -> Self {
        self.by_reference = true;
        self
    }

    /// Marks the argument as variadic; a variadic argument is never required.
    pub fn variadic(mut self) -> Self {
        self.variadic = true;
        self.required = false;
        self
    }
}

/// Ordered parameter list of one callable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Arguments(Vec<ArgumentSpec>);

impl Arguments {
    pub fn new(arguments: Vec<ArgumentSpec>) -> Self {
        Self(arguments)
    }

    pub fn none() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ArgumentSpec> {
        self.0.iter()
    }

    /// Count of leading arguments the caller must always pass.
    pub fn required_count(&self) -> usize {
        self.0.iter().take_while(|arg| arg.required).count()
    }
}

impl From<Vec<ArgumentSpec>> for Arguments {
    fn from(value: Vec<ArgumentSpec>) -> Self {
        Self::new(value)
    }
}

/// Argument info as written into a function-table slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgInfoSlot {
    pub name: String,
    pub type_code: u8,
    pub allow_null: bool,
    pub pass_by_reference: bool,
    pub is_variadic: bool,
}

/// One function-table slot. `Default` is the terminator.
#[derive(Clone, Default)]
pub struct FunctionSlot {
    pub name: Option<String>,
    pub handler: Option<InvokeHandler>,
    pub arg_info: Vec<ArgInfoSlot>,
    pub required_num_args: u32,
    pub flags: u32,
}

impl FunctionSlot {
    pub fn is_terminator(&self) -> bool {
        self.name.is_none() && self.handler.is_none()
    }

    pub fn num_args(&self) -> u32 {
        self.arg_info.len() as u32
    }
}

impl Debug for FunctionSlot {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionSlot")
            .field("name", &self.name)
            .field("has_handler", &self.handler.is_some())
            .field("arg_info", &self.arg_info)
            .field("required_num_args", &self.required_num_args)
            .field("flags", &self.flags)
            .finish()
    }
}

/// A registered extension function.
#[derive(Clone)]
pub struct Callable {
    name: String,
    handler: InvokeHandler,
    arguments: Arguments,
}

impl Callable {
    pub fn new(name: impl Into<String>, handler: InvokeHandler, arguments: Arguments) -> Self {
        Self {
            name: name.into(),
            handler,
            arguments,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arguments(&self) -> &Arguments {
        &self.arguments
    }

    /// Writes this record into its function-table slot.
    pub fn fill_slot(&self, slot: &mut FunctionSlot) {
        slot.name = Some(self.name.clone());
        slot.handler = Some(self.handler);
        slot.arg_info = self
            .arguments
            .iter()
            .map(|arg| ArgInfoSlot {
                name: arg.name.clone(),
                type_code: arg.kind.type_code(),
                allow_null: arg.nullable,
                pass_by_reference: arg.by_reference,
                is_variadic: arg.variadic,
            })
            .collect();
        slot.required_num_args = self.arguments.required_count() as u32;
        slot.flags = 0;
    }
}

impl Debug for Callable {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Callable")
            .field("name", &self.name)
            .field("arguments", &self.arguments)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::{ArgumentKind, ArgumentSpec, Arguments, Callable, FunctionSlot};
    use std::ffi::c_void;

    unsafe extern "C" fn noop(_execute_data: *mut c_void, _return_value: *mut c_void) {}

    #[test]
    fn type_codes_follow_targeted_module_api() {
        assert_eq!(ArgumentKind::Mixed.type_code(), 0);
        assert_eq!(ArgumentKind::Long.type_code(), 4);
        assert_eq!(ArgumentKind::Bool.type_code(), 13);
        assert_eq!(ArgumentKind::Callable.type_code(), 14);
    }

    #[test]
    fn required_count_stops_at_first_optional_argument() {
        let arguments = Arguments::new(vec![
            ArgumentSpec::required("a", ArgumentKind::Long),
            ArgumentSpec::optional("b", ArgumentKind::Long),
            ArgumentSpec::required("c", ArgumentKind::Long),
        ]);
        assert_eq!(arguments.required_count(), 1);
    }

    #[test]
    fn variadic_argument_is_not_required() {
        let spec = ArgumentSpec::required("rest", ArgumentKind::Mixed).variadic();
        assert!(spec.variadic);
        assert!(!spec.required);
    }

    #[test]
    fn fill_slot_writes_name_handler_and_arg_info() {
        let callable = Callable::new(
            "add",
            noop,
            Arguments::new(vec![
                ArgumentSpec::required("x", ArgumentKind::Long),
                ArgumentSpec::optional("y", ArgumentKind::Double).nullable(),
            ]),
        );
        let mut slot = FunctionSlot::default();
        assert!(slot.is_terminator());

        callable.fill_slot(&mut slot);

        assert!(!slot.is_terminator());
        assert_eq!(slot.name.as_deref(), Some("add"));
        assert!(slot.handler.is_some());
        assert_eq!(slot.num_args(), 2);
        assert_eq!(slot.required_num_args, 1);
        assert_eq!(slot.arg_info[1].type_code, ArgumentKind::Double.type_code());
        assert!(slot.arg_info[1].allow_null);
    }
}

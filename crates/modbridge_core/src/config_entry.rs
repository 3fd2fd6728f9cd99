//! Configuration entry records and their host configuration-table slots.

use crate::abi::ModuleHandle;
use serde::Serialize;

/// Scopes from which the host allows a configuration entry to be changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Modifiable {
    User,
    PerDir,
    System,
    All,
}

impl Modifiable {
    /// Host permission bitmask.
    pub fn bits(self) -> u8 {
        match self {
            Self::User => 1,
            Self::PerDir => 2,
            Self::System => 4,
            Self::All => 7,
        }
    }
}

/// Declared value type; the host stores every default as text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigValueKind {
    String,
    Bool,
    Int,
    Float,
}

/// A named, typed configuration entry owned by an extension.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigEntry {
    name: String,
    default_value: String,
    kind: ConfigValueKind,
    modifiable: Modifiable,
}

impl ConfigEntry {
    /// Creates a string entry modifiable from every scope.
    pub fn new(name: impl Into<String>, default_value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default_value: default_value.into(),
            kind: ConfigValueKind::String,
            modifiable: Modifiable::All,
        }
    }

    pub fn bool(name: impl Into<String>, default_value: bool) -> Self {
        let text = if default_value { "1" } else { "0" };
        Self::new(name, text).with_kind(ConfigValueKind::Bool)
    }

    pub fn int(name: impl Into<String>, default_value: i64) -> Self {
        Self::new(name, default_value.to_string()).with_kind(ConfigValueKind::Int)
    }

    pub fn float(name: impl Into<String>, default_value: f64) -> Self {
        Self::new(name, default_value.to_string()).with_kind(ConfigValueKind::Float)
    }

    pub fn with_kind(mut self, kind: ConfigValueKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_modifiable(mut self, modifiable: Modifiable) -> Self {
        self.modifiable = modifiable;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn default_value(&self) -> &str {
        &self.default_value
    }

    pub fn kind(&self) -> ConfigValueKind {
        self.kind
    }

    pub fn modifiable(&self) -> Modifiable {
        self.modifiable
    }

    /// Writes this entry into its configuration-table slot for `handle`.
    pub fn fill_slot(&self, slot: &mut ConfigSlot, handle: ModuleHandle) {
        slot.name = Some(self.name.clone());
        slot.default_value = Some(self.default_value.clone());
        slot.modifiable = self.modifiable.bits();
        slot.module_handle = Some(handle);
    }
}

/// One configuration-table slot. `Default` is the terminator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigSlot {
    pub name: Option<String>,
    pub default_value: Option<String>,
    pub modifiable: u8,
    pub module_handle: Option<ModuleHandle>,
}

impl ConfigSlot {
    pub fn is_terminator(&self) -> bool {
        self.name.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigEntry, ConfigSlot, ConfigValueKind, Modifiable};
    use crate::abi::ModuleHandle;

    #[test]
    fn typed_constructors_render_host_text() {
        assert_eq!(ConfigEntry::bool("math.strict", true).default_value(), "1");
        assert_eq!(ConfigEntry::int("math.precision", 14).default_value(), "14");
        assert_eq!(
            ConfigEntry::float("math.epsilon", 0.5).kind(),
            ConfigValueKind::Float
        );
    }

    #[test]
    fn fill_slot_records_owning_handle_and_permissions() {
        let entry = ConfigEntry::new("math.mode", "fast").with_modifiable(Modifiable::System);
        let mut slot = ConfigSlot::default();
        entry.fill_slot(&mut slot, ModuleHandle(3));

        assert!(!slot.is_terminator());
        assert_eq!(slot.name.as_deref(), Some("math.mode"));
        assert_eq!(slot.default_value.as_deref(), Some("fast"));
        assert_eq!(slot.modifiable, 4);
        assert_eq!(slot.module_handle, Some(ModuleHandle(3)));
    }
}

//! Fixed component name sets shown on every experiment form.
//!
//! Records store sparse maps keyed by these names; the sets themselves are
//! never persisted.

use crate::error::CoreError;

pub const TRANSISTOR_NAMES: &[&str] = &[
    "M_r", "M_dp", "M_dn", "M_ONp", "M_ONn", "M_OFFp", "M_OFFn", "M_R1a", "M_R2a", "M_R3a",
    "M_invp", "M_invn", "M_R1b", "M_R2b", "M_R3b", "M_ref", "M_RA", "M_CA",
];

pub const CAPACITOR_NAMES: &[&str] = &["C1", "C2", "C3"];

pub const VOLTAGE_NAMES: &[&str] = &["V_diff", "V_don", "V_doff", "V_refr"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentKind {
    Transistor,
    Capacitor,
    Voltage,
}

impl ComponentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transistor => "transistor",
            Self::Capacitor => "capacitor",
            Self::Voltage => "voltage",
        }
    }

    pub fn names(&self) -> &'static [&'static str] {
        match self {
            Self::Transistor => TRANSISTOR_NAMES,
            Self::Capacitor => CAPACITOR_NAMES,
            Self::Voltage => VOLTAGE_NAMES,
        }
    }

    /// Resolve a user-supplied name against the set, returning the canonical spelling.
    pub fn canonical(&self, name: &str) -> Result<&'static str, CoreError> {
        self.names()
            .iter()
            .copied()
            .find(|known| *known == name)
            .ok_or_else(|| CoreError::UnknownComponent {
                kind: self.as_str(),
                name: name.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_sizes() {
        assert_eq!(TRANSISTOR_NAMES.len(), 18);
        assert_eq!(CAPACITOR_NAMES.len(), 3);
        assert_eq!(VOLTAGE_NAMES.len(), 4);
    }

    #[test]
    fn canonical_is_case_sensitive() {
        assert_eq!(ComponentKind::Transistor.canonical("M_ONp").unwrap(), "M_ONp");
        assert!(ComponentKind::Transistor.canonical("m_onp").is_err());
        assert!(ComponentKind::Voltage.canonical("C1").is_err());
    }
}

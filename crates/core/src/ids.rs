use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::CoreError;

/// Namespace for ids derived from pre-UUID legacy identifiers.
const LEGACY_NAMESPACE: Uuid = Uuid::from_u128(0x6c61_626e_6f74_6500_8000_0000_0000_0001);

macro_rules! uuid_id {
    ($name:ident) => {
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn from_bytes(bytes: [u8; 16]) -> Self {
                Self(Uuid::from_bytes(bytes))
            }

            pub fn as_bytes(&self) -> &[u8; 16] {
                self.0.as_bytes()
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }

            /// First eight hex digits, as shown next to a record heading.
            pub fn short(&self) -> String {
                self.0.simple().to_string()[..8].to_string()
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), &self.0.to_string()[..8])
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = CoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s)
                    .map(Self)
                    .map_err(|e| CoreError::InvalidData(format!("invalid {}: {e}", stringify!($name))))
            }
        }
    };
}

uuid_id!(RecordId);
uuid_id!(OwnerId);

impl RecordId {
    /// Map an identifier from the local-only format onto a record id.
    ///
    /// Old notebooks used eight-character random strings. Those are hashed
    /// into a stable v5 UUID so the same legacy entry always maps to the
    /// same record.
    pub fn from_legacy(raw: &str) -> Self {
        match Uuid::parse_str(raw) {
            Ok(uuid) => Self(uuid),
            Err(_) => Self(Uuid::new_v5(&LEGACY_NAMESPACE, raw.as_bytes())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_ids_are_stable() {
        let a = RecordId::from_legacy("k3j9x0qa");
        let b = RecordId::from_legacy("k3j9x0qa");
        let c = RecordId::from_legacy("zz000000");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn legacy_uuid_passes_through() {
        let id = RecordId::new();
        assert_eq!(RecordId::from_legacy(&id.to_string()), id);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!("not-a-uuid".parse::<RecordId>().is_err());
        let id = OwnerId::new();
        assert_eq!(id.to_string().parse::<OwnerId>().unwrap(), id);
    }

    #[test]
    fn short_form_is_eight_hex_digits() {
        let id = RecordId::new();
        let short = id.short();
        assert_eq!(short.len(), 8);
        assert!(id.to_string().starts_with(&short));
    }
}

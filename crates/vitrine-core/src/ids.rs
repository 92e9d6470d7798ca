//! Strongly Typed Identifiers
//!
//! Newtype wrappers that keep the different identifier spaces apart at
//! compile time. Local identifiers (tenants, runs) are UUIDs; identifiers
//! minted by the remote catalog are opaque strings (for example
//! `gid://catalog/Product/42`) and are never parsed or generated locally.
//!
//! # Example
//!
//! ```
//! use vitrine_core::{RemoteEntryId, TenantId, VariantId};
//!
//! let tenant = TenantId::new();
//! let entry = RemoteEntryId::new("gid://catalog/Product/42");
//! let variant = VariantId::new("gid://catalog/ProductVariant/7");
//!
//! // Type safety: cannot pass a VariantId where a RemoteEntryId is expected
//! fn requires_entry(id: &RemoteEntryId) -> &str {
//!     id.as_str()
//! }
//!
//! assert_eq!(requires_entry(&entry), "gid://catalog/Product/42");
//! // requires_entry(&variant); // This would not compile!
//! # let _ = (tenant, variant);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use uuid::Uuid;

/// Error type for ID parsing failures
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    /// The type of ID that failed to parse
    pub id_type: &'static str,
    /// The underlying parse error message
    pub message: String,
}

impl Display for ParseIdError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Failed to parse {}: {}", self.id_type, self.message)
    }
}

impl std::error::Error for ParseIdError {}

/// Macro to define a UUID-backed ID type
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random ID using UUID v4.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates an ID from an existing UUID.
            #[must_use]
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns a reference to the underlying UUID.
            #[must_use]
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                Uuid::parse_str(s)
                    .map(Self)
                    .map_err(|e| ParseIdError {
                        id_type: stringify!($name),
                        message: e.to_string(),
                    })
            }
        }
    };
}

/// Macro to define an opaque, remote-issued ID type
macro_rules! define_remote_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wraps an identifier issued by the remote catalog.
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Returns the raw identifier.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consumes the ID and returns the raw identifier.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return Err(ParseIdError {
                        id_type: stringify!($name),
                        message: "identifier is blank".to_string(),
                    });
                }
                Ok(Self(trimmed.to_string()))
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }
    };
}

define_id!(
    /// Strongly typed identifier for tenants.
    ///
    /// The remote catalog is multi-tenant; every store row and every engine
    /// instance is scoped to exactly one tenant.
    ///
    /// # Example
    ///
    /// ```
    /// use vitrine_core::TenantId;
    ///
    /// let tenant_id: TenantId = "550e8400-e29b-41d4-a716-446655440000".parse().unwrap();
    /// assert_eq!(tenant_id.to_string(), "550e8400-e29b-41d4-a716-446655440000");
    /// ```
    TenantId
);

define_id!(
    /// Identifier of a single sync or reconciliation run.
    RunId
);

define_remote_id!(
    /// Identifier of a catalog entry (product) in the remote catalog.
    RemoteEntryId
);

define_remote_id!(
    /// Identifier of a variant of a remote catalog entry.
    VariantId
);

define_remote_id!(
    /// Identifier of a stock location in the remote catalog.
    LocationId
);

define_remote_id!(
    /// Identifier of a remote collection.
    CollectionId
);

#[cfg(test)]
mod tests {
    use super::*;

    mod tenant_id_tests {
        use super::*;

        #[test]
        fn test_new_creates_valid_id() {
            let id = TenantId::new();
            assert_eq!(id.to_string().len(), 36);
        }

        #[test]
        fn test_from_uuid_preserves_value() {
            let uuid = Uuid::new_v4();
            let id = TenantId::from_uuid(uuid);
            assert_eq!(id.as_uuid(), &uuid);
        }

        #[test]
        fn test_parse_rejects_garbage() {
            let err = "not-a-uuid".parse::<TenantId>().unwrap_err();
            assert_eq!(err.id_type, "TenantId");
        }
    }

    mod remote_id_tests {
        use super::*;

        #[test]
        fn test_display_is_raw_value() {
            let id = RemoteEntryId::new("gid://catalog/Product/1");
            assert_eq!(id.to_string(), "gid://catalog/Product/1");
        }

        #[test]
        fn test_parse_trims_and_rejects_blank() {
            let id: VariantId = "  gid://catalog/ProductVariant/9 ".parse().unwrap();
            assert_eq!(id.as_str(), "gid://catalog/ProductVariant/9");

            let err = "   ".parse::<CollectionId>().unwrap_err();
            assert_eq!(err.id_type, "CollectionId");
        }

        #[test]
        fn test_serde_is_transparent() {
            let id = LocationId::new("loc-1");
            let json = serde_json::to_string(&id).unwrap();
            assert_eq!(json, "\"loc-1\"");
            let back: LocationId = serde_json::from_str(&json).unwrap();
            assert_eq!(back, id);
        }
    }
}

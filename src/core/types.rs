//! core::types
//!
//! Strong types for core domain concepts.
//!
//! # Types
//!
//! - [`ShopId`] - Validated tenant identifier scoping every API call
//! - [`TaskId`] - Opaque sharded task identifier
//! - [`FileId`] - Opaque server-side file identifier
//! - [`Entity`] - Resources that support bulk export/import
//! - [`ExportFormat`], [`LengthUnit`], [`WeightUnit`], [`StorageClass`] - Closed
//!   enumerations with explicit defaults
//!
//! # Validation
//!
//! These types enforce validity at construction time. A value that made it
//! past the CLI boundary is safe to splice into a request path.
//!
//! # Examples
//!
//! ```
//! use shopcli::core::types::{LengthUnit, ShopId};
//!
//! let shop = ShopId::new("48213").unwrap();
//! assert_eq!(shop.as_str(), "48213");
//!
//! assert!(ShopId::new("").is_err());
//! assert!(ShopId::new("a/b").is_err());
//!
//! assert_eq!(LengthUnit::default(), LengthUnit::Cm);
//! assert_eq!("in".parse::<LengthUnit>().unwrap(), LengthUnit::In);
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid shop id: {0}")]
    InvalidShopId(String),

    #[error("invalid identifier: {0}")]
    InvalidId(String),

    #[error("unknown {kind} '{value}', expected one of: {expected}")]
    UnknownVariant {
        kind: &'static str,
        value: String,
        expected: String,
    },
}

/// A validated shop (tenant) identifier.
///
/// Shop ids are spliced into request paths, so they cannot be empty and
/// cannot contain whitespace, `/`, `?` or `#`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ShopId(String);

impl ShopId {
    /// Create a new validated shop id.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidShopId` if the value is empty or contains
    /// characters that are not allowed in a path segment.
    pub fn new(id: impl Into<String>) -> Result<Self, TypeError> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err(TypeError::InvalidShopId("shop id cannot be empty".into()));
        }
        if trimmed
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || matches!(c, '/' | '?' | '#'))
        {
            return Err(TypeError::InvalidShopId(format!(
                "'{}' contains characters not allowed in a shop id",
                trimmed
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Get the shop id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ShopId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ShopId {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ShopId> for String {
    fn from(value: ShopId) -> Self {
        value.0
    }
}

impl FromStr for ShopId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Create a new identifier, rejecting empty values.
            pub fn new(id: impl Into<String>) -> Result<Self, TypeError> {
                let id = id.into();
                if id.trim().is_empty() {
                    return Err(TypeError::InvalidId(format!(
                        "{} cannot be empty",
                        stringify!($name)
                    )));
                }
                Ok(Self(id))
            }

            /// Get the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl TryFrom<String> for $name {
            type Error = TypeError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl FromStr for $name {
            type Err = TypeError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }
    };
}

opaque_id!(
    /// Server-assigned identifier of a sharded (background) task.
    TaskId
);

opaque_id!(
    /// Server-assigned identifier of a stored file.
    FileId
);

/// Declares a closed, string-backed enumeration with a default variant.
///
/// The generated type parses from its wire name, displays as its wire name,
/// and (de)serializes as a lowercase string.
macro_rules! closed_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:literal, default = $default:ident,
        { $($variant:ident => $wire:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
        pub enum $name {
            $(
                #[serde(rename = $wire)]
                #[value(name = $wire)]
                $variant,
            )+
        }

        impl $name {
            /// All variants, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// The wire name of this variant.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $wire,)+
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                $name::$default
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = TypeError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($wire => Ok($name::$variant),)+
                    other => Err(TypeError::UnknownVariant {
                        kind: $kind,
                        value: other.to_string(),
                        expected: $name::ALL
                            .iter()
                            .map(|v| v.as_str())
                            .collect::<Vec<_>>()
                            .join(", "),
                    }),
                }
            }
        }
    };
}

closed_enum!(
    /// Resources that support bulk export and import.
    Entity, "entity", default = Products,
    {
        Products => "products",
        Customers => "customers",
        Orders => "orders",
        Inventory => "inventory",
        Categories => "categories",
        Brands => "brands",
    }
);

closed_enum!(
    /// File format produced by an export task.
    ExportFormat, "export format", default = Csv,
    {
        Csv => "csv",
        Xlsx => "xlsx",
    }
);

closed_enum!(
    /// Length unit applied to dimension columns during product import.
    LengthUnit, "length unit", default = Cm,
    {
        Mm => "mm",
        Cm => "cm",
        M => "m",
        In => "in",
        Ft => "ft",
    }
);

closed_enum!(
    /// Weight unit applied to weight columns during product import.
    WeightUnit, "weight unit", default = Kg,
    {
        G => "g",
        Kg => "kg",
        Lb => "lb",
        Oz => "oz",
    }
);

closed_enum!(
    /// Storage class tag for uploaded files.
    StorageClass, "storage class", default = Private,
    {
        Private => "private",
        Public => "public",
    }
);

impl ExportFormat {
    /// File extension for files in this format.
    pub fn extension(&self) -> &'static str {
        self.as_str()
    }
}

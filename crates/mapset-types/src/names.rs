//! Name tokens for mapsets, locations and user groups.
//!
//! All three share one grammar because they end up as path components of a
//! [`LeaseKey`](crate::LeaseKey) and as directory names on disk:
//! - Must be non-empty and at most 255 bytes
//! - Only ASCII letters, digits, `_`, `-` and `.`
//! - Must not start with `.`
//! - Must not contain `..`

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{TypeError, TypeResult};

/// Maximum length of a name in bytes.
pub const MAX_NAME_LEN: usize = 255;

/// What a validated name refers to. Used in error messages.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NameKind {
    Mapset,
    Location,
    Group,
}

impl fmt::Display for NameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Mapset => "mapset",
            Self::Location => "location",
            Self::Group => "group",
        };
        f.write_str(s)
    }
}

/// Validate a name token, returning `Ok(())` if valid.
///
/// # Examples
///
/// ```
/// use mapset_types::{validate_name, NameKind};
///
/// assert!(validate_name(NameKind::Mapset, "landsat_2016").is_ok());
/// assert!(validate_name(NameKind::Mapset, "").is_err());
/// assert!(validate_name(NameKind::Mapset, "a/b").is_err());
/// ```
pub fn validate_name(kind: NameKind, name: &str) -> TypeResult<()> {
    let invalid = |reason: String| TypeError::InvalidName {
        kind,
        name: name.to_string(),
        reason,
    };

    if name.is_empty() {
        return Err(invalid("must not be empty".into()));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(invalid(format!("longer than {MAX_NAME_LEN} bytes")));
    }
    if let Some(ch) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')))
    {
        return Err(invalid(format!("contains forbidden character: {ch:?}")));
    }
    if name.starts_with('.') {
        return Err(invalid("must not start with '.'".into()));
    }
    if name.contains("..") {
        return Err(invalid("must not contain '..'".into()));
    }
    Ok(())
}

macro_rules! name_type {
    ($(#[$meta:meta])* $ty:ident, $kind:expr) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $ty(String);

        impl $ty {
            /// Validate and wrap a name.
            pub fn new(name: impl Into<String>) -> TypeResult<Self> {
                let name = name.into();
                validate_name($kind, &name)?;
                Ok(Self(name))
            }

            /// The name as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $ty {
            type Error = TypeError;

            fn try_from(value: String) -> TypeResult<Self> {
                Self::new(value)
            }
        }

        impl TryFrom<&str> for $ty {
            type Error = TypeError;

            fn try_from(value: &str) -> TypeResult<Self> {
                Self::new(value)
            }
        }

        impl From<$ty> for String {
            fn from(value: $ty) -> String {
                value.0
            }
        }

        impl AsRef<str> for $ty {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl PartialEq<str> for $ty {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl fmt::Debug for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({:?})", stringify!($ty), self.0)
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

name_type!(
    /// Name of a mapset: an independently lockable, mergeable dataset container.
    MapsetName,
    NameKind::Mapset
);

name_type!(
    /// Name of a location, the parent container of mapsets.
    LocationName,
    NameKind::Location
);

name_type!(
    /// Name of the user group whose database holds the location.
    UserGroup,
    NameKind::Group
);

//! # Secret Mappings
//!
//! A [`SecretMapping`] ties one field of a settings type to one key vault
//! secret. Types register their mappings by implementing [`SecretFields`],
//! usually through [`secret_fields!`](crate::secret_fields):
//!
//! ```
//! use serde::Deserialize;
//!
//! #[derive(Debug, Default, Deserialize)]
//! struct DatabaseSettings {
//!     host: String,
//!     password: String,
//!     pool_size: u32,
//! }
//!
//! vaultbind::secret_fields!(DatabaseSettings {
//!     password => "db-password",
//!     pool_size => "db-pool-size",
//! });
//!
//! use vaultbind::mapping::SecretFields;
//! assert_eq!(DatabaseSettings::secret_fields().len(), 2);
//! ```
//!
//! Callers can pass extra mappings at bind time with [`SecretMapping::new`];
//! the two sets are merged by [`collect_mappings`].

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::errors::{Result, VaultBindError};

type AssignFn<T> = dyn Fn(&mut T, &str) -> Result<()> + Send + Sync;

/// One `(field, secret)` pair plus the code that writes the secret into
/// the field.
pub struct SecretMapping<T> {
    field: String,
    secret: String,
    assign: Arc<AssignFn<T>>,
}

impl<T> SecretMapping<T> {
    pub fn new<F>(field: impl Into<String>, secret: impl Into<String>, assign: F) -> Self
    where
        F: Fn(&mut T, &str) -> Result<()> + Send + Sync + 'static,
    {
        Self { field: field.into(), secret: secret.into(), assign: Arc::new(assign) }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// Write `value` into the mapped field of `target`.
    pub fn assign(&self, target: &mut T, value: &str) -> Result<()> {
        (self.assign)(target, value)
    }

    fn same_pair(&self, other: &Self) -> bool {
        self.field == other.field && self.secret == other.secret
    }
}

impl<T> Clone for SecretMapping<T> {
    fn clone(&self) -> Self {
        Self { field: self.field.clone(), secret: self.secret.clone(), assign: self.assign.clone() }
    }
}

impl<T> fmt::Debug for SecretMapping<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretMapping")
            .field("field", &self.field)
            .field("secret", &self.secret)
            .finish_non_exhaustive()
    }
}

/// Settings types that declare which fields come from the key vault.
pub trait SecretFields: Sized {
    fn secret_fields() -> Vec<SecretMapping<Self>> {
        Vec::new()
    }
}

/// Parse a secret into a field's type. Used by [`secret_fields!`](crate::secret_fields).
pub fn parse_secret<V>(field: &str, value: &str) -> Result<V>
where
    V: FromStr,
    V::Err: fmt::Display,
{
    value
        .parse::<V>()
        .map_err(|e| VaultBindError::binding(field, format!("cannot parse secret value: {}", e)))
}

/// Union of declared and manual mappings, keyed on `(field, secret)`.
///
/// Declared mappings come first. The same field may appear with different
/// secrets; both mappings are kept and applied in order.
pub fn collect_mappings<T>(
    declared: Vec<SecretMapping<T>>,
    manual: &[SecretMapping<T>],
) -> Vec<SecretMapping<T>> {
    let mut mappings: Vec<SecretMapping<T>> = Vec::with_capacity(declared.len() + manual.len());

    for mapping in declared.into_iter().chain(manual.iter().cloned()) {
        if !mappings.iter().any(|m| m.same_pair(&mapping)) {
            mappings.push(mapping);
        }
    }

    mappings
}

/// Implement [`SecretFields`](crate::mapping::SecretFields) for a struct.
///
/// Each `field => "secret-name"` entry parses the secret with `FromStr` into
/// the field's type. A parse failure becomes a binding error naming the field.
#[macro_export]
macro_rules! secret_fields {
    ($ty:ty { $($field:ident => $secret:expr),+ $(,)? }) => {
        impl $crate::mapping::SecretFields for $ty {
            fn secret_fields() -> ::std::vec::Vec<$crate::mapping::SecretMapping<Self>> {
                ::std::vec![$(
                    $crate::mapping::SecretMapping::new(
                        ::std::stringify!($field),
                        $secret,
                        |target: &mut Self, value: &str| {
                            target.$field =
                                $crate::mapping::parse_secret(::std::stringify!($field), value)?;
                            ::std::result::Result::Ok(())
                        },
                    )
                ),+]
            }
        }
    };
}

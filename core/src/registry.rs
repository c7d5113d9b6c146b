//! Bidirectional name/code lookup for closed wire vocabularies.
//!
//! A registry is populated once through `RegistryBuilder` and is immutable
//! afterwards. The builder rejects duplicate names and duplicate codes, so
//! every name maps to exactly one code and back.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt::Display;
use std::hash::Hash;

use thiserror::Error;
use tracing::warn;

use crate::error::CallerError;

/// Construction-time violation of the one-to-one mapping.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("{vocabulary}: name `{name}` registered twice")]
    DuplicateName { vocabulary: String, name: String },

    #[error("{vocabulary}: code `{code}` registered twice")]
    DuplicateCode { vocabulary: String, code: String },
}

/// Fixed mapping between human-readable names and wire codes.
#[derive(Debug, Clone)]
pub struct EnumRegistry<N, C> {
    vocabulary: String,
    entries: Vec<(N, C)>,
    by_name: HashMap<N, C>,
    by_code: HashMap<C, N>,
}

/// Populates an `EnumRegistry`. Consumed by `build`.
#[derive(Debug)]
pub struct RegistryBuilder<N, C> {
    registry: EnumRegistry<N, C>,
}

impl<N, C> RegistryBuilder<N, C>
where
    N: Eq + Hash + Clone + Display,
    C: Eq + Hash + Copy + Display,
{
    pub fn set(mut self, name: N, code: C) -> Result<Self, RegistryError> {
        let registry = &mut self.registry;
        if registry.by_name.contains_key(&name) {
            return Err(RegistryError::DuplicateName {
                vocabulary: registry.vocabulary.clone(),
                name: name.to_string(),
            });
        }
        if registry.by_code.contains_key(&code) {
            return Err(RegistryError::DuplicateCode {
                vocabulary: registry.vocabulary.clone(),
                code: code.to_string(),
            });
        }
        registry.by_name.insert(name.clone(), code);
        registry.by_code.insert(code, name.clone());
        registry.entries.push((name, code));
        Ok(self)
    }

    pub fn build(self) -> EnumRegistry<N, C> {
        self.registry
    }
}

impl<N, C> EnumRegistry<N, C>
where
    N: Eq + Hash + Clone + Display,
    C: Eq + Hash + Copy + Display,
{
    /// Start a registry for the named vocabulary (used in error messages).
    pub fn builder(vocabulary: impl Into<String>) -> RegistryBuilder<N, C> {
        RegistryBuilder {
            registry: EnumRegistry {
                vocabulary: vocabulary.into(),
                entries: Vec::new(),
                by_name: HashMap::new(),
                by_code: HashMap::new(),
            },
        }
    }

    /// Build from a static table. Entries that would break the one-to-one
    /// mapping are skipped; the built-in tables are checked by unit tests.
    pub(crate) fn from_table(vocabulary: &str, table: &[(N, C)]) -> Self {
        let mut registry = Self::builder(vocabulary).build();
        for (name, code) in table {
            if registry.by_name.contains_key(name) || registry.by_code.contains_key(code) {
                warn!(vocabulary, name = %name, code = %code, "skipping duplicate vocabulary entry");
                continue;
            }
            registry.by_name.insert(name.clone(), *code);
            registry.by_code.insert(*code, name.clone());
            registry.entries.push((name.clone(), *code));
        }
        registry
    }

    pub fn vocabulary(&self) -> &str {
        &self.vocabulary
    }

    pub fn has_name<Q>(&self, name: &Q) -> bool
    where
        N: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.by_name.contains_key(name)
    }

    pub fn has_code(&self, code: &C) -> bool {
        self.by_code.contains_key(code)
    }

    /// Code for `name`, or a caller error listing the valid names.
    pub fn get<Q>(&self, name: &Q) -> Result<C, CallerError>
    where
        N: Borrow<Q>,
        Q: Hash + Eq + Display + ?Sized,
    {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| CallerError::UnknownName {
                vocabulary: self.vocabulary.clone(),
                value: name.to_string(),
                options: self.names().map(ToString::to_string).collect(),
            })
    }

    /// Name for `code`, or a caller error listing the valid codes.
    pub fn get_by_code(&self, code: &C) -> Result<N, CallerError> {
        self.by_code
            .get(code)
            .cloned()
            .ok_or_else(|| CallerError::UnknownCode {
                vocabulary: self.vocabulary.clone(),
                value: code.to_string(),
                options: self.codes().map(|c| c.to_string()).collect(),
            })
    }

    /// Names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &N> {
        self.entries.iter().map(|(name, _)| name)
    }

    /// Codes in registration order.
    pub fn codes(&self) -> impl Iterator<Item = C> + '_ {
        self.entries.iter().map(|(_, code)| *code)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&N, C)> {
        self.entries.iter().map(|(name, code)| (name, *code))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

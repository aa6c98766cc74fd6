// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Repository catalog.
//!
//! The __catalog__ holds every named entry of the `repositories` table of the
//! settings file. Each entry is either an __alias__ that names exactly one
//! repository, or a __composite__ that lists child specs, which may name
//! other catalog entries in turn.
//!
//! The catalog only performs one level of expansion. Flattening composites
//! into concrete repositories is left to [`SpecResolver`].
//!
//! # Entry Forms
//!
//! | Settings value                    | Catalog entry                       |
//! |-----------------------------------|-------------------------------------|
//! | `""`                              | alias of a spec named after itself  |
//! | `"rsync@sol"`                     | alias of given spec                 |
//! | `"mirrors"` (another entry name)  | composite of that entry             |
//! | `"a b"`, `["a", {config = "b"}]`  | composite of each spec              |
//! | `{ config = "a", host = "sol" }`  | alias of structured spec            |
//! | `{ children = ["a", "b"] }`       | composite of catalog references     |
//!
//! Children listed under `children` must name other catalog entries, unless
//! they are written in full form, i.e., contain `@` or `~`.
//!
//! [`SpecResolver`]: crate::resolve::SpecResolver

use crate::{
    config::{RepositoryEntry, SpecEntry, StructuredSpec},
    spec::{FullSpec, RepoSpec, SpecError, SpecParser},
};

use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Catalog entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogEntry {
    /// Name of exactly one repository.
    Alias(FullSpec),

    /// Ordered listing of child specs.
    Composite(Vec<RepoSpec>),
}

/// Named aliases and composites loaded from settings.
///
/// # Invariant
///
/// - Every [`RepoSpec::Alias`] child names an entry of the catalog.
/// - Read-only once built.
#[derive(Debug, Default, Clone)]
pub struct RepositoryCatalog {
    entries: HashMap<String, CatalogEntry>,
}

impl RepositoryCatalog {
    /// Construct new empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build catalog from `repositories` table of settings.
    ///
    /// # Errors
    ///
    /// - Return [`CatalogError::InvalidName`] if an entry name is empty or
    ///   contains whitespace.
    /// - Return [`CatalogError::Spec`] if an entry holds a malformed spec.
    /// - Return [`CatalogError::UnknownRepository`] if a composite child is
    ///   not in the catalog, and is not a full form spec.
    pub fn from_settings(
        repositories: &BTreeMap<String, RepositoryEntry>,
        parser: &SpecParser,
    ) -> Result<Self> {
        for name in repositories.keys() {
            if name.is_empty() || name.contains(char::is_whitespace) {
                return Err(CatalogError::InvalidName { name: name.clone() });
            }
        }

        let builder = EntryBuilder {
            repositories,
            parser,
        };
        let mut entries = HashMap::with_capacity(repositories.len());
        for (name, value) in repositories {
            let entry = builder.build(name, value)?;
            debug!("catalog entry {name:?}: {entry:?}");
            entries.insert(name.clone(), entry);
        }

        Ok(Self { entries })
    }

    /// Check if name is a catalog entry.
    pub fn is_known(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Expand name by one level.
    ///
    /// # Errors
    ///
    /// - Return [`CatalogError::UnknownRepository`] if name is not in catalog.
    pub fn resolve_name(&self, name: &str) -> Result<&CatalogEntry> {
        self.entries
            .get(name)
            .ok_or_else(|| CatalogError::UnknownRepository {
                name: name.into(),
                parent: None,
            })
    }
}

struct EntryBuilder<'a> {
    repositories: &'a BTreeMap<String, RepositoryEntry>,
    parser: &'a SpecParser,
}

impl EntryBuilder<'_> {
    fn build(&self, name: &str, value: &RepositoryEntry) -> Result<CatalogEntry> {
        match value {
            RepositoryEntry::Text(text) => {
                let specs = text.split_whitespace().collect::<Vec<_>>();
                match specs.as_slice() {
                    [] => Ok(CatalogEntry::Alias(self.parser.parse_full(name)?)),
                    [spec] => self.single(name, spec),
                    specs => specs
                        .iter()
                        .map(|spec| self.listed(name, spec))
                        .collect::<Result<Vec<_>>>()
                        .map(CatalogEntry::Composite),
                }
            }
            RepositoryEntry::List(list) => match list.as_slice() {
                [] => Ok(CatalogEntry::Alias(self.parser.parse_full(name)?)),
                [SpecEntry::Text(spec)] => self.single(name, spec),
                [SpecEntry::Structured(spec)] => Ok(CatalogEntry::Alias(self.structured(spec)?)),
                list => list
                    .iter()
                    .map(|entry| match entry {
                        SpecEntry::Text(spec) => self.listed(name, spec),
                        SpecEntry::Structured(spec) => self.structured(spec).map(RepoSpec::Full),
                    })
                    .collect::<Result<Vec<_>>>()
                    .map(CatalogEntry::Composite),
            },
            RepositoryEntry::Structured(spec) => Ok(CatalogEntry::Alias(self.structured(spec)?)),
            RepositoryEntry::Composite(composite) => composite
                .children
                .to_vec()
                .iter()
                .map(|child| self.child(name, child))
                .collect::<Result<Vec<_>>>()
                .map(CatalogEntry::Composite),
        }
    }

    // A lone spec naming another entry pulls that entry in, otherwise it is
    // an alias of the spec under this entry's name.
    fn single(&self, name: &str, spec: &str) -> Result<CatalogEntry> {
        if spec != name && self.repositories.contains_key(spec) {
            return Ok(CatalogEntry::Composite(vec![RepoSpec::Alias(spec.into())]));
        }

        Ok(CatalogEntry::Alias(self.parser.parse_full(spec)?))
    }

    // Listed specs naming other entries are references, anything else is a
    // literal spec.
    fn listed(&self, name: &str, spec: &str) -> Result<RepoSpec> {
        if spec != name && self.repositories.contains_key(spec) {
            return Ok(RepoSpec::Alias(spec.into()));
        }

        Ok(RepoSpec::Full(self.parser.parse_full(spec)?))
    }

    fn child(&self, name: &str, child: &str) -> Result<RepoSpec> {
        if self.repositories.contains_key(child) {
            return Ok(RepoSpec::Alias(child.into()));
        }

        match self.parser.parse(child)? {
            RepoSpec::Full(spec) => Ok(RepoSpec::Full(spec)),
            RepoSpec::Alias(child) => Err(CatalogError::UnknownRepository {
                name: child,
                parent: Some(name.into()),
            }),
        }
    }

    fn structured(&self, spec: &StructuredSpec) -> Result<FullSpec> {
        Ok(self
            .parser
            .from_parts(&spec.config, spec.host.as_deref(), spec.user.as_deref())?)
    }
}

/// Catalog error types.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    /// Name does not refer to any catalog entry.
    #[error("unknown repository {name:?}{}", referenced_by(.parent))]
    UnknownRepository {
        name: String,
        parent: Option<String>,
    },

    /// Entry name cannot be used to refer to a repository.
    #[error("invalid repository name {name:?}")]
    InvalidName { name: String },

    /// Entry holds malformed spec.
    #[error(transparent)]
    Spec(#[from] SpecError),
}

fn referenced_by(parent: &Option<String>) -> String {
    parent
        .as_ref()
        .map(|parent| format!(" referenced by {parent:?}"))
        .unwrap_or_default()
}

/// Friendly result alias :3
type Result<T, E = CatalogError> = std::result::Result<T, E>;

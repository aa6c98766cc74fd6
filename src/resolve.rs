// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Repository spec resolution.
//!
//! Expand the specs requested by the user into a flat listing of concrete
//! repositories. Composite catalog entries are expanded depth first, and the
//! result keeps the order in which each repository was first reached. A
//! repository reached more than once, e.g., a child shared by two
//! composites, is only reported once.
//!
//! Expansion runs off an explicit work stack instead of the call stack. The
//! names of composites currently being expanded are tracked on a visit path,
//! so a composite that reaches itself again is caught as a cycle.

use crate::{
    catalog::{CatalogEntry, CatalogError, RepositoryCatalog},
    spec::{FullSpec, RepoSpec, SpecError, SpecParser},
};

use std::collections::HashSet;
use tracing::debug;

/// Concrete repository produced by resolution.
///
/// Identity is the canonical full spec. Two resolved repositories with the
/// same full spec are the same repository regardless of display name.
#[derive(Debug, Clone)]
pub struct ResolvedRepository {
    name: String,
    spec: String,
    full: FullSpec,
}

impl ResolvedRepository {
    /// Construct new resolved repository.
    pub fn new(name: impl Into<String>, spec: impl Into<String>, full: FullSpec) -> Self {
        Self {
            name: name.into(),
            spec: spec.into(),
            full,
        }
    }

    /// Display name, i.e., the catalog alias or the spec itself.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Spec text this repository was produced from.
    pub fn spec(&self) -> &str {
        &self.spec
    }

    pub fn full_spec(&self) -> String {
        self.full.full_spec()
    }

    pub fn config(&self) -> &str {
        self.full.config()
    }

    pub fn host(&self) -> &str {
        self.full.host()
    }

    pub fn user(&self) -> &str {
        self.full.user()
    }

    pub fn is_local_host(&self) -> bool {
        self.full.is_local_host()
    }

    pub fn as_full_spec(&self) -> &FullSpec {
        &self.full
    }
}

impl PartialEq for ResolvedRepository {
    fn eq(&self, other: &Self) -> bool {
        self.full_spec() == other.full_spec()
    }
}

impl Eq for ResolvedRepository {}

/// Unit of pending expansion work.
enum Work {
    /// Resolve a spec, possibly expanding it.
    Visit(RepoSpec),

    /// Composite is fully expanded, remove it from visit path.
    Leave(String),
}

/// Resolve requested specs into concrete repositories.
#[derive(Debug, Clone, Copy)]
pub struct SpecResolver<'a> {
    catalog: &'a RepositoryCatalog,
    parser: &'a SpecParser,
}

impl<'a> SpecResolver<'a> {
    /// Construct new resolver over a catalog.
    pub fn new(catalog: &'a RepositoryCatalog, parser: &'a SpecParser) -> Self {
        Self { catalog, parser }
    }

    /// Resolve requested specs.
    ///
    /// Uses default spec if nothing was requested. Catalog names take
    /// precedence over reading a token as a literal spec. Bare names that are
    /// not in the catalog are taken as literal config names.
    ///
    /// # Errors
    ///
    /// - Return [`ResolveError::NoRepositorySpecified`] if nothing was
    ///   requested, and there is no default.
    /// - Return [`ResolveError::CyclicComposite`] if a composite reaches
    ///   itself through its children.
    /// - Return [`ResolveError::Spec`] if a requested spec is malformed.
    /// - Return [`ResolveError::Catalog`] if catalog lookup fails.
    pub fn resolve(
        &self,
        requested: &[impl AsRef<str>],
        default: Option<&str>,
    ) -> Result<Vec<ResolvedRepository>> {
        let requested = requested
            .iter()
            .map(|token| token.as_ref().trim())
            .filter(|token| !token.is_empty())
            .collect::<Vec<_>>();
        let requested = match (requested.is_empty(), default) {
            (false, _) => requested,
            (true, Some(default)) if !default.trim().is_empty() => vec![default.trim()],
            (true, _) => return Err(ResolveError::NoRepositorySpecified),
        };

        let mut stack = requested
            .iter()
            .rev()
            .map(|token| self.classify(token).map(Work::Visit))
            .collect::<Result<Vec<_>>>()?;
        let mut path: Vec<String> = Vec::new();
        let mut seen = HashSet::new();
        let mut resolved = Vec::new();

        while let Some(work) = stack.pop() {
            let (name, full) = match work {
                Work::Leave(name) => {
                    // INVARIANT: Leave markers pop in reverse order of entry.
                    path.pop();
                    debug!("finished expanding {name:?}");
                    continue;
                }
                Work::Visit(RepoSpec::Full(full)) => (full.text().to_string(), full),
                Work::Visit(RepoSpec::Alias(name)) if !self.catalog.is_known(&name) => {
                    let full = self.parser.parse_full(&name)?;
                    (name, full)
                }
                Work::Visit(RepoSpec::Alias(name)) => match self.catalog.resolve_name(&name)? {
                    CatalogEntry::Alias(full) => (name, full.clone()),
                    CatalogEntry::Composite(children) => {
                        if let Some(start) = path.iter().position(|entry| *entry == name) {
                            let mut cycle = path[start..].to_vec();
                            cycle.push(name);
                            return Err(ResolveError::CyclicComposite { cycle });
                        }

                        debug!("expanding {name:?} into {} children", children.len());
                        path.push(name.clone());
                        stack.push(Work::Leave(name));
                        stack.extend(children.iter().rev().cloned().map(Work::Visit));
                        continue;
                    }
                },
            };

            let spec = full.text().to_string();
            let repository = ResolvedRepository::new(name, spec, full);
            if seen.insert(repository.full_spec()) {
                debug!("resolved {:?}", repository.full_spec());
                resolved.push(repository);
            } else {
                debug!("skip duplicate {:?}", repository.full_spec());
            }
        }

        Ok(resolved)
    }

    // Catalog lookup goes first so that names that also read as full specs
    // refer to their catalog entry.
    fn classify(&self, token: &str) -> Result<RepoSpec> {
        if self.catalog.is_known(token) {
            return Ok(RepoSpec::Alias(token.into()));
        }

        Ok(self.parser.parse(token)?)
    }
}

/// Resolution error types.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    /// Nothing was requested, and no default repository is configured.
    #[error("no repository specified, and there is no default repository")]
    NoRepositorySpecified,

    /// Composite reaches itself through its children.
    #[error("cyclic composite repository: {}", .cycle.join(" -> "))]
    CyclicComposite { cycle: Vec<String> },

    /// Requested spec is malformed.
    #[error(transparent)]
    Spec(#[from] SpecError),

    /// Catalog lookup fails.
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// Friendly result alias :3
type Result<T, E = ResolveError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::Settings, spec::LocalIdentity};
    use pretty_assertions::assert_eq;

    const SERVERS: &str = r#"
        [repositories]
        rsync = ""
        borgbase = ""
        dev = "dev@sol"
        mail = "mail@mars~root"
        home = { children = ["rsync", "borgbase"] }
        servers = { children = ["dev", "mail", "rsync"] }
        all = { children = ["home", "servers"] }
    "#;

    struct Fixture {
        parser: SpecParser,
        catalog: RepositoryCatalog,
    }

    impl Fixture {
        fn new(settings: &str) -> Self {
            let settings: Settings = settings.parse().unwrap();
            let parser = SpecParser::new(LocalIdentity::new("earth", "ada"));
            let catalog = RepositoryCatalog::from_settings(&settings.repositories, &parser).unwrap();
            Self { parser, catalog }
        }

        fn resolve(&self, requested: &[&str], default: Option<&str>) -> Result<Vec<ResolvedRepository>> {
            SpecResolver::new(&self.catalog, &self.parser).resolve(requested, default)
        }

        fn full_specs(&self, requested: &[&str]) -> Vec<String> {
            self.resolve(requested, None)
                .unwrap()
                .iter()
                .map(ResolvedRepository::full_spec)
                .collect()
        }
    }

    #[test]
    fn nested_composites_expand_depth_first() {
        let fixture = Fixture::new(SERVERS);
        assert_eq!(
            fixture.full_specs(&["all"]),
            vec![
                "rsync@earth~ada",
                "borgbase@earth~ada",
                "dev@sol~ada",
                "mail@mars~root",
            ]
        );
    }

    #[test]
    fn display_names_come_from_aliases() -> anyhow::Result<()> {
        let fixture = Fixture::new(SERVERS);
        let names = fixture
            .resolve(&["servers"], None)?
            .iter()
            .map(|repo| repo.name().to_string())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["dev", "mail", "rsync"]);
        Ok(())
    }

    #[test]
    fn duplicates_keep_first_occurrence() {
        let fixture = Fixture::new(SERVERS);
        assert_eq!(
            fixture.full_specs(&["mail@mars~root", "servers", "rsync@earth~ada"]),
            vec!["mail@mars~root", "dev@sol~ada", "rsync@earth~ada"]
        );
    }

    #[test]
    fn default_substitutes_for_empty_request() -> anyhow::Result<()> {
        let fixture = Fixture::new(SERVERS);
        let empty: [&str; 0] = [];
        assert_eq!(
            fixture.resolve(&empty, Some("home"))?,
            fixture.resolve(&["home"], None)?
        );
        Ok(())
    }

    #[test]
    fn empty_request_without_default_fails() {
        let fixture = Fixture::new(SERVERS);
        assert_eq!(
            fixture.resolve(&[], None).unwrap_err(),
            ResolveError::NoRepositorySpecified
        );
        assert_eq!(
            fixture.resolve(&["  "], Some("")).unwrap_err(),
            ResolveError::NoRepositorySpecified
        );
    }

    #[test]
    fn mutual_composites_are_cyclic() {
        let fixture = Fixture::new(
            r#"
            [repositories]
            a = { children = ["b"] }
            b = { children = ["a"] }
            "#,
        );
        assert_eq!(
            fixture.resolve(&["a"], None).unwrap_err(),
            ResolveError::CyclicComposite {
                cycle: vec!["a".into(), "b".into(), "a".into()],
            }
        );
    }

    #[test]
    fn self_referencing_composite_is_cyclic() {
        let fixture = Fixture::new("[repositories]\nloop = { children = [\"loop\"] }\n");
        assert!(matches!(
            fixture.resolve(&["loop"], None),
            Err(ResolveError::CyclicComposite { .. })
        ));
    }

    #[test]
    fn shared_composite_is_not_a_cycle() {
        let fixture = Fixture::new(
            r#"
            [repositories]
            rsync = ""
            home = { children = ["rsync"] }
            left = { children = ["home"] }
            right = { children = ["home"] }
            both = { children = ["left", "right"] }
            "#,
        );
        assert_eq!(fixture.full_specs(&["both"]), vec!["rsync@earth~ada"]);
    }

    #[test]
    fn unknown_bare_name_is_literal_config() -> anyhow::Result<()> {
        let fixture = Fixture::new(SERVERS);
        let repos = fixture.resolve(&["scratch"], None)?;
        assert_eq!(repos.len(), 1);
        assert_eq!(repos[0].name(), "scratch");
        assert_eq!(repos[0].full_spec(), "scratch@earth~ada");
        Ok(())
    }

    #[test]
    fn catalog_name_takes_precedence_over_literal_spec() {
        let fixture = Fixture::new(
            r#"
            [repositories]
            "primary@neptune" = "backup@pluto"
            "#,
        );
        assert_eq!(fixture.full_specs(&["primary@neptune"]), vec!["backup@pluto~ada"]);
    }

    #[test]
    fn malformed_request_fails() {
        let fixture = Fixture::new(SERVERS);
        assert!(matches!(
            fixture.resolve(&["a@b@c"], None),
            Err(ResolveError::Spec(SpecError::Delimiters { .. }))
        ));
    }

    #[test]
    fn deep_chains_terminate() {
        let mut settings = String::from("[repositories]\nr0 = \"\"\n");
        for depth in 1..2000 {
            settings.push_str(&format!("r{depth} = {{ children = [\"r{}\"] }}\n", depth - 1));
        }
        let fixture = Fixture::new(&settings);
        assert_eq!(fixture.full_specs(&["r1999"]), vec!["r0@earth~ada"]);
    }
}

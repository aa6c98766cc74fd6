// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Repository specification parsing.
//!
//! A __spec__ is how the user refers to a repository. It comes in one of two
//! forms:
//!
//! - __alias form__: a bare name like `home`, which must be looked up in the
//!   repository catalog before it means anything.
//! - __full form__: `config[@host][~user]`, e.g., `primary@neptune~root`,
//!   which names the Emborg configuration, the host it runs on, and the user
//!   that runs it.
//!
//! Host and user default to the local host and the current user when absent.
//! The canonical form of a full spec always carries all three components, i.e.,
//! `config@host~user`. Display drops `@host` and `~user` when they are the
//! local defaults.

use std::fmt::{Display, Formatter, Result as FmtResult};

/// Identity of the machine and user running the report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalIdentity {
    host: String,
    user: String,
}

impl LocalIdentity {
    /// Construct new local identity from known values.
    pub fn new(host: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            user: user.into(),
        }
    }

    /// Detect local identity of current process.
    ///
    /// Host name is shortened to exclude any domain name.
    pub fn detect() -> Self {
        let host = hostname::get()
            .map(|h| h.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "localhost".into());
        let host = host.split('.').next().unwrap_or_default().to_string();

        Self::new(host, whoami::username())
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn user(&self) -> &str {
        &self.user
    }
}

/// Parsed repository specification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepoSpec {
    /// Bare name that requires catalog lookup.
    Alias(String),

    /// Fully qualified `config@host~user` specification.
    Full(FullSpec),
}

impl RepoSpec {
    /// Text the spec was parsed from.
    pub fn text(&self) -> &str {
        match self {
            Self::Alias(name) => name,
            Self::Full(full) => full.text(),
        }
    }
}

/// Full form repository specification.
///
/// # Invariant
///
/// - Config is never empty.
/// - Host and user are always filled in, using local defaults when the
///   original text left them out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FullSpec {
    config: String,
    host: String,
    user: String,
    is_local_host: bool,
    is_local_user: bool,
    text: String,
}

impl FullSpec {
    pub fn config(&self) -> &str {
        &self.config
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    /// Original text this spec was parsed or built from.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Host is the local host.
    pub fn is_local_host(&self) -> bool {
        self.is_local_host
    }

    /// Canonical `config@host~user` string used for identity comparison.
    pub fn full_spec(&self) -> String {
        format!("{}@{}~{}", self.config, self.host, self.user)
    }
}

impl Display for FullSpec {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(&self.config)?;
        if !self.is_local_host {
            write!(fmt, "@{}", self.host)?;
        }
        if !self.is_local_user {
            write!(fmt, "~{}", self.user)?;
        }

        Ok(())
    }
}

/// Parse repository specification strings.
#[derive(Debug, Clone)]
pub struct SpecParser {
    local: LocalIdentity,
}

impl SpecParser {
    /// Construct new parser with local defaults for host and user.
    pub fn new(local: LocalIdentity) -> Self {
        Self { local }
    }

    pub fn local(&self) -> &LocalIdentity {
        &self.local
    }

    /// Parse a spec into alias or full form.
    ///
    /// A bare token without `@` or `~` comes back in alias form. Whether it
    /// names a catalog entry is up to the caller to decide.
    ///
    /// # Errors
    ///
    /// - Return [`SpecError::Malformed`] if config is empty, or a component
    ///   contains invalid characters.
    /// - Return [`SpecError::Delimiters`] if `@` or `~` appear more than once,
    ///   or out of order.
    pub fn parse(&self, text: &str) -> Result<RepoSpec> {
        let text = text.trim();
        if !text.contains(['@', '~']) {
            check_component(text, text, "config")?;
            return Ok(RepoSpec::Alias(text.to_string()));
        }

        self.parse_full(text).map(RepoSpec::Full)
    }

    /// Parse a spec in full form only.
    ///
    /// Bare tokens are taken as config names.
    ///
    /// # Errors
    ///
    /// - Return [`SpecError::Malformed`] if config is empty, or a component
    ///   contains invalid characters.
    /// - Return [`SpecError::Delimiters`] if `@` or `~` appear more than once,
    ///   or out of order.
    pub fn parse_full(&self, text: &str) -> Result<FullSpec> {
        let text = text.trim();
        if text.matches('@').count() > 1 || text.matches('~').count() > 1 {
            return Err(SpecError::Delimiters { spec: text.into() });
        }

        let (prefix, user) = match text.split_once('~') {
            Some((prefix, user)) => (prefix, Some(user)),
            None => (text, None),
        };
        if user.is_some_and(|user| user.contains('@')) {
            return Err(SpecError::Delimiters { spec: text.into() });
        }

        let (config, host) = match prefix.split_once('@') {
            Some((config, host)) => (config, Some(host)),
            None => (prefix, None),
        };

        if config.is_empty() {
            return Err(SpecError::Malformed {
                spec: text.into(),
                reason: "missing Emborg config name".into(),
            });
        }
        check_component(text, config, "config")?;

        self.build(config, host, user, text)
    }

    /// Build full spec from structured components.
    ///
    /// # Errors
    ///
    /// - Return [`SpecError::Malformed`] if config is empty, or a component
    ///   contains invalid characters.
    pub fn from_parts(
        &self,
        config: &str,
        host: Option<&str>,
        user: Option<&str>,
    ) -> Result<FullSpec> {
        let mut text = config.to_string();
        if let Some(host) = host.filter(|host| !host.is_empty()) {
            text.push('@');
            text.push_str(host);
        }
        if let Some(user) = user.filter(|user| !user.is_empty()) {
            text.push('~');
            text.push_str(user);
        }

        if config.is_empty() {
            return Err(SpecError::Malformed {
                spec: text,
                reason: "missing Emborg config name".into(),
            });
        }
        check_component(&text, config, "config")?;

        self.build(config, host, user, &text)
    }

    fn build(
        &self,
        config: &str,
        host: Option<&str>,
        user: Option<&str>,
        text: &str,
    ) -> Result<FullSpec> {
        // INVARIANT: Empty host or user means local default.
        let host = host.filter(|host| !host.is_empty());
        let user = user.filter(|user| !user.is_empty());
        if let Some(host) = host {
            check_component(text, host, "host")?;
        }
        if let Some(user) = user {
            check_component(text, user, "user")?;
        }

        let host = host.unwrap_or(self.local.host());
        let user = user.unwrap_or(self.local.user());

        Ok(FullSpec {
            config: config.into(),
            host: host.into(),
            user: user.into(),
            is_local_host: host == self.local.host(),
            is_local_user: user == self.local.user(),
            text: text.into(),
        })
    }
}

// Components may begin with a digit, e.g., "3neptune".
fn check_component(spec: &str, component: &str, kind: &str) -> Result<()> {
    if component.is_empty() {
        return Err(SpecError::Malformed {
            spec: spec.into(),
            reason: format!("missing {kind} name"),
        });
    }

    if let Some(bad) = component
        .chars()
        .find(|c| !(c.is_alphanumeric() || matches!(c, '_' | '-' | '.')))
    {
        return Err(SpecError::Malformed {
            spec: spec.into(),
            reason: format!("invalid character {bad:?} in {kind} name"),
        });
    }

    Ok(())
}

/// Spec parsing error types.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpecError {
    /// Spec is missing its config, or has invalid component names.
    #[error("malformed repository spec {spec:?}: {reason}")]
    Malformed { spec: String, reason: String },

    /// Spec has repeated or misplaced `@` and `~` delimiters.
    #[error("malformed repository spec {spec:?}: expected config[@host][~user]")]
    Delimiters { spec: String },
}

/// Friendly result alias :3
type Result<T, E = SpecError> = std::result::Result<T, E>;

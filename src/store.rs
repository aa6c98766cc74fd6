// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Size record storage.
//!
//! The __record store__ reads the latest size record that Emborg left behind
//! for a repository, and keeps the history of recorded sizes for each
//! repository.
//!
//! # Record Sources
//!
//! Emborg writes its latest record for a configuration to
//! `~<user>/.local/share/emborg/<config>.latest.nt` on the host that runs it.
//! Records of the local host are read directly. Records of other hosts are
//! read through a [`RemoteReader`], which uses ssh by default. Each read may
//! fail on its own, e.g., unreachable host, permission denied, or Emborg never
//! ran for that configuration.
//!
//! # History Layout
//!
//! Every repository gets one history file in the history directory, named
//! after its canonical full spec, e.g., `home@earth~ada`. Each line of a
//! history file is one JSON encoded [`SizeRecord`]. Recording appends a line,
//! it never rewrites or deduplicates existing ones.

use crate::{
    path::{user_home_dir, PathError},
    record::{RecordError, SizeRecord},
    resolve::ResolvedRepository,
    spec::LocalIdentity,
};

use chrono::{DateTime, FixedOffset, Local};
use std::{
    collections::HashMap,
    ffi::OsStr,
    fs::{create_dir_all, read_to_string, OpenOptions},
    io::Write,
    path::PathBuf,
    process::Command,
};
use tracing::{debug, info, instrument, warn};

/// Read files living on other hosts.
pub trait RemoteReader {
    /// Read entire content of file at path on host.
    fn read_file(&self, host: &str, path: &str) -> std::io::Result<String>;
}

/// Remote access through the ssh binary.
#[derive(Debug, Default, Clone, Copy)]
pub struct SshReader;

impl RemoteReader for SshReader {
    #[instrument(skip(self), level = "debug")]
    fn read_file(&self, host: &str, path: &str) -> std::io::Result<String> {
        syscall_non_interactive("ssh", [host, format!("cat {path}").as_str()])
    }
}

/// Latest records and recorded history of repositories.
#[derive(Debug)]
pub struct RecordStore<R = SshReader>
where
    R: RemoteReader,
{
    history_dir: PathBuf,
    home: PathBuf,
    local: LocalIdentity,
    reader: R,
}

impl<R> RecordStore<R>
where
    R: RemoteReader,
{
    /// Construct new record store.
    ///
    /// The `home` path is the home directory of the local user.
    pub fn new(
        history_dir: impl Into<PathBuf>,
        home: impl Into<PathBuf>,
        local: LocalIdentity,
        reader: R,
    ) -> Self {
        Self {
            history_dir: history_dir.into(),
            home: home.into(),
            local,
            reader,
        }
    }

    /// Read latest size record of repository, stamped with current time.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::RecordUnavailable`] if record cannot be read,
    ///   is empty, or cannot be parsed.
    pub fn latest(&self, repo: &ResolvedRepository) -> Result<SizeRecord> {
        self.latest_at(repo, Local::now().fixed_offset())
    }

    /// Read latest size record of repository, stamped with given time.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::RecordUnavailable`] if record cannot be read,
    ///   is empty, or cannot be parsed.
    #[instrument(skip(self, repo), fields(repo = %repo.full_spec()), level = "debug")]
    pub fn latest_at(
        &self,
        repo: &ResolvedRepository,
        timestamp: DateTime<FixedOffset>,
    ) -> Result<SizeRecord> {
        let unavailable = |reason| StoreError::RecordUnavailable {
            full_spec: repo.full_spec(),
            reason,
        };
        let file_name = format!("{}.latest.nt", repo.config());

        let content = if repo.is_local_host() {
            let path = self
                .home_of(repo.user())
                .map_err(|err| unavailable(Unavailable::Home(err)))?
                .join(".local/share/emborg")
                .join(file_name);
            debug!("read local record {:?}", path.display());
            read_to_string(&path)
                .map_err(|source| unavailable(Unavailable::Read { path, source }))?
        } else {
            let path = format!("~{}/.local/share/emborg/{file_name}", repo.user());
            debug!("read remote record {path:?} on {:?}", repo.host());
            self.reader
                .read_file(repo.host(), &path)
                .map_err(|source| {
                    unavailable(Unavailable::Remote {
                        host: repo.host().into(),
                        source,
                    })
                })?
        };

        SizeRecord::from_latest(&content, timestamp)
            .map_err(|err| unavailable(Unavailable::Record(err)))
    }

    /// Read latest size record of each repository.
    ///
    /// Failure to read one repository does not stop reading the others.
    /// Results are keyed by full spec.
    pub fn collect(
        &self,
        repos: &[ResolvedRepository],
    ) -> HashMap<String, Result<SizeRecord>> {
        let timestamp = Local::now().fixed_offset();
        repos
            .iter()
            .map(|repo| {
                let result = self.latest_at(repo, timestamp);
                if let Err(err) = &result {
                    warn!("{err}");
                }
                (repo.full_spec(), result)
            })
            .collect()
    }

    /// Append size record to history of repository.
    ///
    /// Creates history directory and file when missing.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::WriteHistory`] if history file cannot be
    ///   written to.
    /// - Return [`StoreError::Serialize`] if record cannot be encoded.
    #[instrument(skip(self, repo, record), fields(repo = %repo.full_spec()), level = "debug")]
    pub fn append(&self, repo: &ResolvedRepository, record: &SizeRecord) -> Result<()> {
        let path = self.history_path(repo);
        let write_err = |source| StoreError::WriteHistory {
            source,
            path: path.clone(),
        };

        create_dir_all(&self.history_dir).map_err(write_err)?;
        let line = serde_json::to_string(record)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(write_err)?;
        writeln!(file, "{line}").map_err(write_err)?;
        info!("record {} for {}", record.size, repo.full_spec());

        Ok(())
    }

    /// Read recorded history of repository, oldest first.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::ReadHistory`] if history file cannot be read.
    /// - Return [`StoreError::ParseHistory`] if a line cannot be decoded.
    pub fn history(&self, repo: &ResolvedRepository) -> Result<Vec<SizeRecord>> {
        let path = self.history_path(repo);
        let content = read_to_string(&path).map_err(|source| StoreError::ReadHistory {
            source,
            path: path.clone(),
        })?;

        content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(index, line)| {
                serde_json::from_str(line).map_err(|source| StoreError::ParseHistory {
                    source,
                    path: path.clone(),
                    line: index + 1,
                })
            })
            .collect()
    }

    /// Path to history file of repository.
    pub fn history_path(&self, repo: &ResolvedRepository) -> PathBuf {
        self.history_dir.join(repo.full_spec())
    }

    // Other local users are looked up in the password database.
    fn home_of(&self, user: &str) -> Result<PathBuf, PathError> {
        if user == self.local.user() {
            return Ok(self.home.clone());
        }

        user_home_dir(user)
    }
}

fn syscall_non_interactive(
    cmd: impl AsRef<OsStr>,
    args: impl IntoIterator<Item = impl AsRef<OsStr>>,
) -> std::io::Result<String> {
    let output = Command::new(cmd.as_ref()).args(args).output()?;
    let stdout = String::from_utf8_lossy(output.stdout.as_slice()).into_owned();
    let stderr = String::from_utf8_lossy(output.stderr.as_slice()).into_owned();

    if !output.status.success() {
        // INVARIANT: Chomp trailing newlines.
        let stderr = stderr.trim_end();
        return Err(std::io::Error::other(format!(
            "command {:?} failed: {stderr}",
            cmd.as_ref()
        )));
    }

    Ok(stdout)
}

/// Reason a latest record is unavailable.
#[derive(Debug, thiserror::Error)]
pub enum Unavailable {
    /// Local record file cannot be read.
    #[error("cannot read {:?}: {source}", path.display())]
    Read {
        source: std::io::Error,
        path: PathBuf,
    },

    /// Remote record file cannot be read.
    #[error("cannot read record on {host:?}: {source}")]
    Remote {
        source: std::io::Error,
        host: String,
    },

    /// Home directory of local user is unknown.
    #[error(transparent)]
    Home(PathError),

    /// Record content is unusable.
    #[error(transparent)]
    Record(#[from] RecordError),
}

/// Record store error types.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Latest record of repository cannot be obtained.
    #[error("{full_spec}: {reason}")]
    RecordUnavailable {
        full_spec: String,
        reason: Unavailable,
    },

    /// History file cannot be written to.
    #[error("failed to write history file at {:?}", path.display())]
    WriteHistory {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// History file cannot be read from.
    #[error("failed to read history file at {:?}", path.display())]
    ReadHistory {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// History file line cannot be decoded.
    #[error("invalid record on line {line} of history file {:?}", path.display())]
    ParseHistory {
        #[source]
        source: serde_json::Error,
        path: PathBuf,
        line: usize,
    },

    /// Record cannot be encoded.
    #[error(transparent)]
    Serialize(#[from] serde_json::Error),
}

/// Friendly result alias :3
pub type Result<T, E = StoreError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{record::Size, spec::SpecParser};
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;
    use std::{cell::RefCell, fs::write};

    /// Remote reader serving canned files, failing for unknown hosts.
    #[derive(Default)]
    struct FakeReader {
        files: HashMap<(String, String), String>,
        calls: RefCell<Vec<String>>,
    }

    impl FakeReader {
        fn with_file(mut self, host: &str, path: &str, content: &str) -> Self {
            self.files
                .insert((host.into(), path.into()), content.into());
            self
        }
    }

    impl RemoteReader for FakeReader {
        fn read_file(&self, host: &str, path: &str) -> std::io::Result<String> {
            self.calls.borrow_mut().push(format!("{host}:{path}"));
            self.files
                .get(&(host.to_string(), path.to_string()))
                .cloned()
                .ok_or_else(|| std::io::Error::other(format!("ssh: connect to host {host}")))
        }
    }

    fn local() -> LocalIdentity {
        LocalIdentity::new("earth", "ada")
    }

    fn repo(spec: &str) -> ResolvedRepository {
        let full = SpecParser::new(local()).parse_full(spec).unwrap();
        ResolvedRepository::new(spec, spec, full)
    }

    fn store(reader: FakeReader) -> RecordStore<FakeReader> {
        let cwd = std::env::current_dir().unwrap();
        RecordStore::new(cwd.join("history"), cwd.join("home/ada"), local(), reader)
    }

    fn stamp(text: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(text).unwrap()
    }

    #[sealed_test]
    fn latest_reads_local_record() -> anyhow::Result<()> {
        create_dir_all("home/ada/.local/share/emborg")?;
        write(
            "home/ada/.local/share/emborg/home.latest.nt",
            "repository size: 3 MB\n",
        )?;

        let store = store(FakeReader::default());
        let record = store.latest(&repo("home"))?;
        assert_eq!(record.size, Size::new(3_000_000));
        assert!(store.reader.calls.borrow().is_empty());

        Ok(())
    }

    #[sealed_test]
    fn latest_ignores_home_next_door_for_other_users() -> anyhow::Result<()> {
        create_dir_all("home/no-such-borg-space-user/.local/share/emborg")?;
        write(
            "home/no-such-borg-space-user/.local/share/emborg/system.latest.nt",
            "repository size: 7 kB\n",
        )?;

        let result = store(FakeReader::default()).latest(&repo("system~no-such-borg-space-user"));
        assert!(matches!(
            result,
            Err(StoreError::RecordUnavailable {
                reason: Unavailable::Home(PathError::UnknownUser { .. }),
                ..
            })
        ));

        Ok(())
    }

    #[cfg(target_os = "linux")]
    #[sealed_test]
    fn latest_reads_other_local_user_from_real_home() {
        let result = store(FakeReader::default()).latest(&repo("borg-space-absent~root"));
        let Err(StoreError::RecordUnavailable {
            reason: Unavailable::Read { path, .. },
            ..
        }) = &result
        else {
            panic!("expected unreadable record, got {result:?}");
        };
        assert_eq!(
            path,
            &PathBuf::from("/root/.local/share/emborg/borg-space-absent.latest.nt")
        );
    }

    #[test]
    fn latest_reads_remote_record() -> anyhow::Result<()> {
        let reader = FakeReader::default().with_file(
            "neptune",
            "~root/.local/share/emborg/primary.latest.nt",
            "repository size: 2 GiB\n",
        );
        let store = RecordStore::new("/nowhere", "/home/ada", local(), reader);
        let record = store.latest(&repo("primary@neptune~root"))?;
        assert_eq!(record.size, Size::new(2 * 1024 * 1024 * 1024));
        Ok(())
    }

    #[sealed_test]
    fn missing_local_record_is_unavailable() {
        let result = store(FakeReader::default()).latest(&repo("home"));
        assert!(matches!(
            result,
            Err(StoreError::RecordUnavailable {
                reason: Unavailable::Read { .. },
                ..
            })
        ));
    }

    #[sealed_test]
    fn empty_local_record_is_unavailable() -> anyhow::Result<()> {
        create_dir_all("home/ada/.local/share/emborg")?;
        write("home/ada/.local/share/emborg/home.latest.nt", "")?;

        let result = store(FakeReader::default()).latest(&repo("home"));
        assert!(matches!(
            result,
            Err(StoreError::RecordUnavailable {
                reason: Unavailable::Record(RecordError::Empty),
                ..
            })
        ));

        Ok(())
    }

    #[test]
    fn collect_isolates_failures() {
        let reader = FakeReader::default()
            .with_file("sol", "~ada/.local/share/emborg/y.latest.nt", "repository size: 1 MB\n")
            .with_file("sol", "~ada/.local/share/emborg/z.latest.nt", "repository size: 2 MB\n");
        let store = RecordStore::new("/nowhere", "/home/ada", local(), reader);
        let repos = [repo("x@pluto"), repo("y@sol"), repo("z@sol")];

        let records = store.collect(&repos);
        assert_eq!(records.len(), 3);
        assert!(records["x@pluto~ada"].is_err());
        assert_eq!(records["y@sol~ada"].as_ref().unwrap().size, Size::new(1_000_000));
        assert_eq!(records["z@sol~ada"].as_ref().unwrap().size, Size::new(2_000_000));
        assert_eq!(store.reader.calls.borrow().len(), 3);
    }

    #[sealed_test]
    fn append_never_deduplicates() -> anyhow::Result<()> {
        let store = store(FakeReader::default());
        let repo = repo("home");
        let record = SizeRecord {
            timestamp: stamp("2023-04-08T12:00:00-07:00"),
            size: Size::new(42),
            last_create: Some(stamp("2023-04-08T02:00:00-07:00")),
            last_prune: None,
            last_compact: None,
        };

        store.append(&repo, &record)?;
        store.append(&repo, &record)?;

        let content = read_to_string("history/home@earth~ada")?;
        assert_eq!(content.lines().count(), 2);
        assert_eq!(store.history(&repo)?, vec![record.clone(), record]);

        Ok(())
    }

    #[sealed_test]
    fn history_reports_bad_line() -> anyhow::Result<()> {
        create_dir_all("history")?;
        write("history/home@earth~ada", "{\"timestamp\": \"nope\"}\n")?;

        let result = store(FakeReader::default()).history(&repo("home"));
        assert!(matches!(result, Err(StoreError::ParseHistory { line: 1, .. })));

        Ok(())
    }

    #[sealed_test]
    fn missing_history_is_an_error() {
        let result = store(FakeReader::default()).history(&repo("home"));
        assert!(matches!(result, Err(StoreError::ReadHistory { .. })));
    }
}

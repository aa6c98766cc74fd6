// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Report how much storage Borg repositories consume.
//!
//! Repositories are requested through __repository specs__ of the form
//! `config[@host][~user]`, or through names defined in the `repositories`
//! table of the settings file. Named entries may be aliases of one spec, or
//! __composites__ that stand for several other entries at once.
//!
//! Sizes come from the latest record that Emborg leaves behind on the host
//! that backs up each repository. Those records can be appended to a local
//! history, which in turn can be graphed.
//!
//! The flow from request to report goes like this:
//!
//! 1. [`SpecResolver`] expands requested specs into a deduplicated, ordered
//!    listing of [`ResolvedRepository`] through a [`RepositoryCatalog`].
//! 2. [`RecordStore`] fetches the latest [`SizeRecord`] of each repository.
//! 3. [`ReportAssembler`] joins both into [`ReportRow`]s.
//! 4. [`Reporter`] renders the rows in the requested [`ReportStyle`].

pub mod catalog;
pub mod config;
pub mod graph;
pub mod path;
pub mod record;
pub mod report;
pub mod resolve;
pub mod spec;
pub mod store;

#[doc(inline)]
pub use catalog::{CatalogEntry, RepositoryCatalog};

#[doc(inline)]
pub use config::Settings;

#[doc(inline)]
pub use record::{Size, SizeRecord};

#[doc(inline)]
pub use report::{ReportAssembler, ReportRow, ReportStyle, Reporter};

#[doc(inline)]
pub use resolve::{ResolvedRepository, SpecResolver};

#[doc(inline)]
pub use spec::{FullSpec, LocalIdentity, RepoSpec, SpecParser};

#[doc(inline)]
pub use store::{RecordStore, RemoteReader, SshReader};

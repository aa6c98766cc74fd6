// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use borg_space::{
    graph::{collect_traces, summarize, Plot, SvgPlot},
    path::{history_dir, home_dir, settings_file},
    LocalIdentity, RecordStore, ReportAssembler, ReportStyle, Reporter, RepositoryCatalog,
    Settings, SpecParser, SpecResolver, SshReader,
};

use anyhow::Result;
use clap::Parser;
use std::{path::PathBuf, process::exit};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "\n  borg-space [options] [<repo>...]\n  borg-space [--graph] [--svg <file>] [--log-y] [<repo>...]",
    version
)]
struct Cli {
    /// Do not output sizes.
    #[arg(short, long)]
    pub quiet: bool,

    /// Report style: compact, table, tree, nestedtext, nt, or json.
    #[arg(short, long, value_name = "style")]
    pub style: Option<ReportStyle>,

    /// Record the sizes.
    #[arg(short, long)]
    pub record: bool,

    /// Graph the recorded sizes.
    #[arg(short, long)]
    pub graph: bool,

    /// Use a logarithmic Y-axis when graphing.
    #[arg(short, long)]
    pub log_y: bool,

    /// Produce graph as SVG file.
    #[arg(short = 'S', long, value_name = "file")]
    pub svg: Option<PathBuf>,

    /// Repository specs or names, e.g., `home`, `root@earth~root`.
    #[arg(value_name = "repo")]
    pub repos: Vec<String>,
}

impl Cli {
    fn is_graphing(&self) -> bool {
        self.graph || self.log_y || self.svg.is_some()
    }

    /// Run command, returning whether every repository was reported on and,
    /// when recording, recorded.
    fn run(self) -> Result<bool> {
        let settings = Settings::load(settings_file()?)?;
        let local = LocalIdentity::detect();
        let parser = SpecParser::new(local.clone());
        let catalog = RepositoryCatalog::from_settings(&settings.repositories, &parser)?;
        let repos = SpecResolver::new(&catalog, &parser)
            .resolve(self.repos.as_slice(), settings.default_repository.as_deref())?;
        let store = RecordStore::new(history_dir()?, home_dir()?, local, SshReader);

        if self.is_graphing() {
            let traces = collect_traces(&store, &repos);
            match &self.svg {
                Some(path) => SvgPlot::new(self.log_y).plot_to(&traces, path)?,
                None => println!("{}", summarize(&traces)?),
            }

            return Ok(true);
        }

        let records = store.collect(&repos);
        let mut recorded = true;
        if self.record {
            for repo in &repos {
                if let Some(Ok(record)) = records.get(&repo.full_spec()) {
                    if let Err(err) = store.append(repo, record) {
                        error!("cannot record {}: {err}", repo.as_full_spec());
                        recorded = false;
                    }
                }
            }
        }

        let rows = ReportAssembler::new(&settings).assemble(&repos, &records);
        if !self.quiet {
            let style = self.style.unwrap_or_else(|| settings.report_style());
            let report = Reporter::new(&settings).render(&rows, style)?;
            if !report.is_empty() {
                println!("{report}");
            }
        }

        let failed = rows.iter().filter(|row| row.is_failed()).count();
        if failed > 0 {
            info!("{failed} of {} repositories could not be reported on", rows.len());
        }

        Ok(failed == 0 && recorded)
    }
}

fn main() {
    let cli = Cli::parse();
    let level = if cli.quiet { "error" } else { "info" };

    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    match cli.run() {
        Ok(true) => exit(0),
        Ok(false) => exit(1),
        Err(error) => {
            error!("{error:?}");
            exit(1);
        }
    }
}

//! Command-line surface: `goenv versions` and `goenv cache`

use std::fmt::{self, Write};
use std::time::Duration;

use chrono::Local;
use clap::{Args, Parser, Subcommand};
use tracing::info;

use crate::config::{Settings, data_dir, db_path, github_token, settings_path};
use crate::version::cache::Cache;
use crate::version::catalog::{CatalogStorer, refresh_catalog, should_update};
use crate::version::fetcher::FetchOptions;
use crate::version::model::VersionsData;
use crate::version::registries::GitHubTagRegistry;

#[derive(Parser)]
#[command(name = "goenv")]
#[command(version, about = "Go version management tool")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// List available Go versions, grouped by major.minor
    Versions(VersionsArgs),
    /// Inspect or clear the cached version catalog
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Args, Debug, Default)]
pub struct VersionsArgs {
    /// Force update from GitHub
    #[arg(long)]
    pub update: bool,
    /// Minimum version to fetch (e.g., go1.22)
    #[arg(long, value_name = "VERSION")]
    pub min_version: Option<String>,
    /// Minimum year to fetch versions from (e.g., 2020)
    #[arg(long, value_name = "YEAR")]
    pub min_year: Option<i64>,
    /// Fetch all versions (ignore filters)
    #[arg(long)]
    pub all: bool,
    /// Print the catalog as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheAction {
    /// Print the catalog database path
    Path,
    /// Remove the cached catalog
    Clear,
}

impl VersionsArgs {
    pub fn fetch_options(&self, timeout: Duration) -> FetchOptions {
        FetchOptions {
            min_version: self.min_version.clone(),
            min_year: self.min_year,
            all_versions: self.all,
            timeout,
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Versions(args) => run_versions(&args).await,
        Command::Cache { action } => run_cache(action),
    }
}

async fn run_versions(args: &VersionsArgs) -> anyhow::Result<()> {
    let settings = Settings::load(&settings_path())?;
    let cache = Cache::new(&db_path())?;

    let cached = cache.load_catalog()?;
    let max_age = chrono::Duration::milliseconds(settings.cache.refresh_interval);

    let catalog = if args.update || should_update(cached.as_ref(), max_age, chrono::Utc::now()) {
        let registry = GitHubTagRegistry::new(&settings.github.base_url, github_token())
            .with_repository(&settings.github.owner, &settings.github.repo);
        let options = args.fetch_options(Duration::from_secs(settings.fetch.timeout_secs));

        eprintln!("Fetching versions from GitHub...");
        let outcome = refresh_catalog(&cache, &registry, &options).await?;
        if let Some(e) = &outcome.fetch_error {
            eprintln!("Warning: Error occurred while fetching tags: {e}");
            eprintln!(
                "Continuing with {} versions ({} new).",
                outcome.catalog.len(),
                outcome.added
            );
        }
        Some(outcome.catalog)
    } else {
        info!("Using cached catalog");
        cached
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&catalog)?);
    } else {
        print!("{}", render_catalog(catalog.as_ref()));
    }

    Ok(())
}

fn run_cache(action: CacheAction) -> anyhow::Result<()> {
    match action {
        CacheAction::Path => println!("{}", db_path().display()),
        CacheAction::Clear => {
            if db_path().exists() {
                Cache::new(&db_path())?.clear()?;
            }
            println!("Cleared cached versions in {}", data_dir().display());
        }
    }
    Ok(())
}

/// Render the catalog as the human-readable listing
pub fn render_catalog(data: Option<&VersionsData>) -> String {
    let Some(data) = data.filter(|d| !d.is_empty()) else {
        return "No versions found.\n".to_string();
    };

    let mut out = String::new();
    write_catalog(&mut out, data).map(|()| out).unwrap_or_default()
}

fn write_catalog(out: &mut impl Write, data: &VersionsData) -> fmt::Result {
    writeln!(
        out,
        "\nAvailable Go versions (fetched at {}):\n",
        data.fetched_at
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S")
    )?;

    for group in &data.groups {
        writeln!(out, "Go {}:", group.major_minor)?;
        for v in &group.versions {
            if v.is_release_candidate {
                writeln!(out, "  - {} (RC{})", v.tag, v.candidate_number)?;
            } else {
                writeln!(out, "  - {}", v.tag)?;
            }
        }
        writeln!(out)?;
    }

    Ok(())
}

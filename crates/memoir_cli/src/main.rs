//! `memoir` command line entry point.
//!
//! Thin wrapper over `memoir_core` for local operation: database
//! self-test, importing a photo directory tree, and printing table counts.

mod fs_source;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use fs_source::FsPhotoSource;
use memoir_core::{
    init_logging, run_self_test, table_counts, MemoirConfig, MemoirDb, StartupImporter,
};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "memoir", version, about = "Local photo journal storage tools")]
struct Cli {
    /// Config file (TOML). Defaults apply when it does not exist.
    #[arg(long, short = 'c', default_value = "memoir.toml")]
    config: PathBuf,

    /// Database file, overriding `db_path` from the config.
    #[arg(long)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the database scenario checks against a scratch database.
    SelfTest,
    /// Import photos below a directory, one album per folder.
    Import {
        /// Directory tree to scan.
        root: PathBuf,
        /// Comma-separated folder allow-list (`*` for all), overriding config.
        #[arg(long)]
        folders: Option<String>,
    },
    /// Print row counts per table.
    Summary,
}

fn main() {
    let cli = Cli::parse();

    if let Err(err) = run(cli) {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = MemoirConfig::load(&cli.config)?;
    if let Some(log_dir) = &config.log_dir {
        let level = config
            .log_level
            .as_deref()
            .unwrap_or_else(|| memoir_core::default_log_level());
        init_logging(level, log_dir)?;
    }
    let db_path = cli.db.unwrap_or_else(|| config.db_path.clone());

    match cli.command {
        Commands::SelfTest => {
            let suites = run_self_test();
            let mut failed = 0;
            for suite in &suites {
                println!("{}", suite.name);
                for result in &suite.results {
                    let mark = if result.passed { "ok  " } else { "FAIL" };
                    println!("  [{mark}] {}: {}", result.name, result.details);
                    if !result.passed {
                        failed += 1;
                    }
                }
            }
            if failed > 0 {
                bail!("{failed} self-test check(s) failed");
            }
            Ok(())
        }
        Commands::Import { root, folders } => {
            let db = open(&db_path)?;
            let mut import = config.import.clone();
            import.enabled = true;
            if let Some(folders) = folders {
                import.folders = folders;
            }

            let report = StartupImporter::new(&db, FsPhotoSource::new(root))
                .run(&import)
                .context("import failed")?;
            println!(
                "processed={} created_photos={} updated_photos={} created_albums={} created_entries={} linked_album_photos={} linked_entry_photos={} linked_photo_tags={}",
                report.processed,
                report.created_photos,
                report.updated_photos,
                report.created_albums,
                report.created_entries,
                report.linked_album_photos,
                report.linked_entry_photos,
                report.linked_photo_tags
            );
            Ok(())
        }
        Commands::Summary => {
            let db = open(&db_path)?;
            for (table, count) in table_counts(db.connection())? {
                println!("{table:<14} {count}");
            }
            Ok(())
        }
    }
}

fn open(path: &Path) -> Result<MemoirDb> {
    MemoirDb::open(path).with_context(|| format!("failed to open `{}`", path.display()))
}

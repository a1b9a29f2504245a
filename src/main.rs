use anyhow::{anyhow, Result};
use clap::{Parser, ValueEnum};
use findex::engine::{Indexer, RepositoryInfo};
use findex::{dedup, intersect, logging};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "findex")]
#[command(version, about = "Persistent file index with duplicate detection")]
struct Cli {
    /// Root of the tree to index.
    #[arg(long = "baseDir")]
    base_dir: Option<PathBuf>,

    /// Where the index store lives. Defaults to <baseDir>/fileIndexerDb.
    #[arg(long = "indexDir")]
    index_dir: Option<PathBuf>,

    /// Operation to run.
    #[arg(long = "op", value_enum, default_value = "info")]
    op: Op,

    /// Tree to intersect with, walked and hashed live.
    #[arg(long = "intersectDir")]
    intersect_dir: Option<PathBuf>,

    /// Index to intersect with, read as-is.
    #[arg(long = "intersectIndexDir")]
    intersect_index_dir: Option<PathBuf>,

    /// Increase logging verbosity (use together with RUST_LOG for fine control).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Relative path whose meta to print with --op info.
    path: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Op {
    Update,
    Info,
    List,
    Dedup,
    Qscan,
    Intersect,
}

fn main() {
    if let Err(e) = run() {
        eprintln!("{:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose)?;

    let base_dir = cli
        .base_dir
        .ok_or_else(|| anyhow!("--baseDir must be specified"))?;

    let mut indexer = Indexer::open_or_create(&base_dir, cli.index_dir.as_deref())?;

    match cli.op {
        Op::Update => {
            indexer.update()?;
        }

        Op::Info => {
            println!("{:?}", indexer.db_meta());
            let rel_path = cli.path.unwrap_or_default();
            match indexer.get_file_or_dir_meta(&rel_path)? {
                Some(meta) => println!("{:?}", meta),
                None => println!("No meta found for {rel_path}"),
            }
        }

        Op::List => {
            indexer.iter_files(|rel_path, meta| {
                println!("{rel_path} {meta:?}");
                Ok(())
            })?;
        }

        Op::Dedup => {
            let report = dedup::report(&indexer)?;
            dedup::print_report(&report);
        }

        Op::Qscan => {
            let mut info = RepositoryInfo::default();
            indexer.quick_scan(&mut info)?;
            println!("Total File:{}, Total Size:{}", info.file_count, info.file_size);
        }

        Op::Intersect => {
            let stats = match (&cli.intersect_dir, &cli.intersect_index_dir) {
                (Some(dir), _) => intersect::with_dir(&indexer, dir)?,
                (None, Some(index_dir)) => intersect::with_index(&indexer, index_dir)?,
                (None, None) => {
                    return Err(anyhow!(
                        "please provide --intersectDir or --intersectIndexDir"
                    ))
                }
            };
            intersect::print_stats(&stats);
        }
    }

    Ok(())
}

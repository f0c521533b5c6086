use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "sorload")]
#[command(version, about = "Load daily statement-of-reasons dumps into SQLite")]
#[command(propagate_version = true)]
pub struct Cli {
    /// YAML configuration file
    #[arg(long, global = true, env = "SORLOAD_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download, parse and store every daily dump in a date range
    Import(ImportArgs),

    /// Print the dump URLs for a date range without downloading anything
    Urls {
        #[command(flatten)]
        range: RangeArgs,

        #[command(flatten)]
        source: SourceArgs,
    },
}

#[derive(Args, Debug, Clone)]
pub struct RangeArgs {
    /// First day to import (YYYY-MM-DD)
    #[arg(long)]
    pub from: NaiveDate,

    /// Last day to import, inclusive (YYYY-MM-DD)
    #[arg(long)]
    pub to: NaiveDate,
}

#[derive(Args, Debug, Clone, Default)]
pub struct SourceArgs {
    /// Base URL the dumps are served from
    #[arg(long)]
    pub base_url: Option<String>,

    /// Dump file name prefix
    #[arg(long)]
    pub prefix: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct ImportArgs {
    #[command(flatten)]
    pub range: RangeArgs,

    #[command(flatten)]
    pub source: SourceArgs,

    /// Number of dumps processed in parallel (1-5 recommended)
    #[arg(long, short = 'w')]
    pub workers: Option<usize>,

    /// SQLite database file
    #[arg(long, env = "SORLOAD_DATABASE")]
    pub database: Option<PathBuf>,

    /// When a dump contains already-stored ids, write it again replacing them
    #[arg(long)]
    pub overwrite_duplicates: bool,

    /// Always replace existing rows without trying a plain insert first
    #[arg(long, requires = "overwrite_duplicates")]
    pub skip_duplicate_check: bool,

    /// Output the run report as JSON
    #[arg(long)]
    pub json: bool,
}

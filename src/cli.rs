use clap::builder::RangedU64ValueParser;
use clap::Parser;
use std::path::PathBuf;
use stig_audit::application::dto::{OutputFormat, MAX_CONCURRENCY_LIMIT};

/// Evaluate STIG controls against a SQL Server instance
///
/// Exit status: 0 compliant, 1 findings (fail or error), 2 invalid
/// arguments, 3 fatal error, 130 cancelled.
#[derive(Parser, Debug)]
#[command(name = "stig-audit")]
#[command(version)]
#[command(about = "Evaluate STIG controls against a SQL Server instance", long_about = None)]
pub struct Args {
    /// Control file or directory (defaults to ./controls)
    #[arg(short, long, value_name = "PATH")]
    pub controls: Option<PathBuf>,

    /// Configuration file (defaults to ./stig-audit.config.yml when present)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Output format: json or markdown
    #[arg(short, long)]
    pub format: Option<OutputFormat>,

    /// Output file path (if not specified, outputs to stdout)
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Evaluate against a captured snapshot file instead of a live instance
    #[arg(long, value_name = "PATH")]
    pub snapshot: Option<PathBuf>,

    /// Query gateway host
    #[arg(long)]
    pub host: Option<String>,

    /// Query gateway port
    #[arg(long)]
    pub port: Option<u16>,

    /// SQL Server instance name
    #[arg(long)]
    pub instance: Option<String>,

    /// Login used for the audit session (password: STIG_AUDIT_PASSWORD)
    #[arg(long)]
    pub user: Option<String>,

    /// Database the session starts in
    #[arg(long)]
    pub database: Option<String>,

    /// Talk plain HTTP to the gateway (lab use only)
    #[arg(long)]
    pub insecure_http: bool,

    /// Only run controls whose id matches (supports wildcards: * and ?)
    /// Can be specified multiple times: -i "V-677*" -i "V-67871"
    #[arg(short, long = "include", value_name = "PATTERN")]
    pub include: Vec<String>,

    /// Skip controls whose id matches (supports wildcards: * and ?)
    #[arg(short, long = "exclude", value_name = "PATTERN")]
    pub exclude: Vec<String>,

    /// Deadline for each query or lookup, in seconds
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: Option<u64>,

    /// Controls evaluated in parallel when the target allows concurrent reads
    #[arg(
        long,
        value_name = "N",
        value_parser = RangedU64ValueParser::<usize>::new().range(1..=MAX_CONCURRENCY_LIMIT as u64)
    )]
    pub max_concurrency: Option<usize>,

    /// Report automated controls as errors instead of aborting when the
    /// target cannot be reached
    #[arg(long)]
    pub continue_without_target: bool,

    /// Send every query to the target, even repeated ones
    #[arg(long)]
    pub no_cache: bool,

    /// Validate controls and configuration without opening a session
    #[arg(long)]
    pub dry_run: bool,
}

impl Args {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

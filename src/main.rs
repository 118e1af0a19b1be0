mod cli;

use cli::Args;
use std::path::PathBuf;
use std::process;
use std::time::Duration;
use stig_audit::adapters::outbound::console::StderrProgressReporter;
use stig_audit::adapters::outbound::filesystem::{FileSystemControlSource, SnapshotConnector};
use stig_audit::adapters::outbound::network::{
    CachingConnector, GatewayConnector, GatewaySettings, DEFAULT_GATEWAY_PORT,
};
use stig_audit::application::dto::{OutputFormat, RunRequest};
use stig_audit::application::factories::{FormatterFactory, PresenterFactory, PresenterType};
use stig_audit::application::read_models::ReportReadModelBuilder;
use stig_audit::application::use_cases::RunControlsUseCase;
use stig_audit::application::CancellationSignal;
use stig_audit::config::{
    discover_config, load_config_from_path, ConfigFile, ConnectionKind, CONFIG_FILENAME,
};
use stig_audit::ports::outbound::TargetConnector;
use stig_audit::shared::error::{AuditError, ExitCode};
use stig_audit::shared::Result;

/// Environment variable holding the gateway password
const PASSWORD_ENV: &str = "STIG_AUDIT_PASSWORD";

/// Catalog location when neither the CLI nor the config names one
const DEFAULT_CONTROLS_DIR: &str = "controls";

const DEFAULT_DATABASE: &str = "master";

#[tokio::main]
async fn main() {
    let args = Args::parse_args();

    let code = match run(args).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("\n❌ An error occurred:\n");
            eprintln!("{}", e);

            // Display error chain
            let mut source = e.source();
            while let Some(err) = source {
                eprintln!("\nCaused by: {}", err);
                source = err.source();
            }

            eprintln!();
            ExitCode::ApplicationError
        }
    };
    process::exit(code.as_i32());
}

/// How the audited target is reached
#[derive(Debug, PartialEq)]
enum TargetSettings {
    Snapshot(PathBuf),
    Gateway(GatewaySettings),
}

/// Everything the run needs after the CLI and the config file are merged
#[derive(Debug)]
struct Settings {
    target: TargetSettings,
    cache_queries: bool,
    run: RunSettings,
}

#[derive(Debug)]
struct RunSettings {
    controls: PathBuf,
    format: OutputFormat,
    output: Option<PathBuf>,
    request: RunRequest,
}

async fn run(args: Args) -> Result<ExitCode> {
    let config = match &args.config {
        Some(path) => load_config_from_path(path)?,
        None => {
            let cwd = std::env::current_dir()?;
            match discover_config(&cwd)? {
                Some(config) => {
                    eprintln!(
                        "📄 Auto-discovered config file: {}",
                        cwd.join(CONFIG_FILENAME).display()
                    );
                    config
                }
                None => ConfigFile::default(),
            }
        }
    };
    let settings = resolve_settings(args, config, std::env::var(PASSWORD_ENV).ok())?;

    let signal = CancellationSignal::new();
    install_interrupt_handler(signal.clone());

    let Settings {
        target,
        cache_queries,
        run: run_settings,
    } = settings;
    match target {
        TargetSettings::Snapshot(path) => {
            audit(SnapshotConnector::new(path), cache_queries, run_settings, signal).await
        }
        TargetSettings::Gateway(gateway) => {
            audit(GatewayConnector::new(gateway)?, cache_queries, run_settings, signal).await
        }
    }
}

/// Merges CLI arguments over config file values; CLI wins
fn resolve_settings(
    args: Args,
    config: ConfigFile,
    env_password: Option<String>,
) -> Result<Settings> {
    let format = match (args.format, config.format.as_deref()) {
        (Some(format), _) => format,
        (None, Some(format)) => format
            .parse()
            .map_err(|e: String| AuditError::configuration(e, "Use 'json' or 'markdown'"))?,
        (None, None) => OutputFormat::default(),
    };

    let include = if args.include.is_empty() {
        config.include.unwrap_or_default()
    } else {
        args.include
    };
    let exclude = if args.exclude.is_empty() {
        config.exclude.unwrap_or_default()
    } else {
        args.exclude
    };

    let mut builder = RunRequest::builder()
        .inputs(config.inputs.unwrap_or_default())
        .include_patterns(include)
        .exclude_patterns(exclude)
        .continue_without_target(
            args.continue_without_target || config.continue_without_target.unwrap_or(false),
        )
        .dry_run(args.dry_run);
    if let Some(secs) = args.timeout.or(config.query_timeout_secs) {
        builder = builder.query_timeout(Duration::from_secs(secs));
    }
    if let Some(max) = args.max_concurrency.or(config.max_concurrency) {
        builder = builder.max_concurrency(max);
    }

    let connection = config.connection.unwrap_or_default();
    let target = match args.snapshot {
        Some(path) => TargetSettings::Snapshot(path),
        None => match (connection.kind, connection.snapshot) {
            (Some(ConnectionKind::Snapshot), Some(path)) | (None, Some(path)) => {
                TargetSettings::Snapshot(path)
            }
            (Some(ConnectionKind::Snapshot), None) => {
                return Err(AuditError::configuration(
                    "connection.kind is 'snapshot' but connection.snapshot is not set",
                    "Point connection.snapshot at a captured target file, or pass --snapshot",
                )
                .into())
            }
            _ => TargetSettings::Gateway(GatewaySettings {
                host: args.host.or(connection.host).unwrap_or_default(),
                port: args
                    .port
                    .or(connection.port)
                    .unwrap_or(DEFAULT_GATEWAY_PORT),
                instance: args.instance.or(connection.instance).unwrap_or_default(),
                user: args.user.or(connection.user).unwrap_or_default(),
                password: env_password
                    .filter(|password| !password.is_empty())
                    .or(connection.password)
                    .unwrap_or_default(),
                database: args
                    .database
                    .or(connection.database)
                    .unwrap_or_else(|| DEFAULT_DATABASE.to_string()),
                tls: !args.insecure_http && connection.tls.unwrap_or(true),
            }),
        },
    };

    Ok(Settings {
        target,
        cache_queries: !args.no_cache && config.cache_queries.unwrap_or(true),
        run: RunSettings {
            controls: args
                .controls
                .or(config.controls)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CONTROLS_DIR)),
            format,
            output: args.output,
            request: builder.build()?,
        },
    })
}

/// Ctrl-C stops the run; finished controls keep their results.
/// A second Ctrl-C exits at once.
fn install_interrupt_handler(signal: CancellationSignal) {
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if signal.is_cancelled() {
                eprintln!("\n⚠️  Interrupted again, exiting without a report.");
                process::exit(ExitCode::Cancelled.as_i32());
            }
            eprintln!("\n⚠️  Interrupt received, stopping the run (Ctrl-C again to exit)...");
            signal.cancel();
        }
    });
}

async fn audit<TC: TargetConnector>(
    connector: TC,
    cache_queries: bool,
    settings: RunSettings,
    signal: CancellationSignal,
) -> Result<ExitCode> {
    if cache_queries {
        execute(CachingConnector::new(connector), settings, signal).await
    } else {
        execute(connector, settings, signal).await
    }
}

async fn execute<TC: TargetConnector>(
    connector: TC,
    settings: RunSettings,
    signal: CancellationSignal,
) -> Result<ExitCode> {
    // Create adapters (Dependency Injection)
    let control_source = FileSystemControlSource::new(settings.controls);
    let progress_reporter = StderrProgressReporter::new();

    let use_case = RunControlsUseCase::new(control_source, connector, progress_reporter)
        .with_cancellation(signal);
    let response = use_case.execute(settings.request).await?;

    let Some(report) = response.report.as_ref() else {
        return Ok(response.exit_code());
    };

    eprintln!("{}", FormatterFactory::progress_message(settings.format));
    let model = ReportReadModelBuilder::build(&response.controls, report);
    let formatted_output = FormatterFactory::create(settings.format).format(&model)?;

    let presenter = PresenterFactory::create(PresenterType::from(settings.output));
    presenter.present(&formatted_output)?;

    Ok(response.exit_code())
}

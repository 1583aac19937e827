use clap::Parser;
use serde::Serialize;
use tech_radar::utils::error::ErrorSeverity;
use tech_radar::utils::{logger, validation::Validate};
use tech_radar::{build_app, Cli, Command, RadarConfig, RadarError, SourceStatus};

#[derive(Serialize)]
struct StatusReport {
    snapshot_path: String,
    patent_records: usize,
    project_records: usize,
    #[serde(flatten)]
    sources: SourceStatus,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.json_logs {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("Starting tech-radar CLI");
    if cli.verbose {
        tracing::debug!("CLI args: {:?}", cli);
    }

    let config = if cli.config.exists() {
        RadarConfig::from_file(&cli.config)
    } else {
        tracing::warn!(
            "⚠️ Config file {} not found, using defaults",
            cli.config.display()
        );
        Ok(RadarConfig::default())
    };
    let config = match config.and_then(|c| c.validate().map(|_| c)) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("❌ Configuration validation failed: {}", e);
            tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
            eprintln!("❌ {}", e.user_friendly_message());
            std::process::exit(1);
        }
    };

    if let Err(e) = run(cli.command, &config).await {
        tracing::error!(
            "❌ Command failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 Suggestion: {}", e.recovery_suggestion());

        let exit_code = match e.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        };
        if exit_code > 0 {
            std::process::exit(exit_code);
        }
    }

    Ok(())
}

async fn run(command: Command, config: &RadarConfig) -> Result<(), RadarError> {
    let app = build_app(config).await?;

    match command {
        Command::Analyze { term, years, pretty } => {
            let years = years.unwrap_or(config.radar.default_horizon_years);
            let response = app.engine.analyze_request(&term, Some(years)).await?;
            tracing::info!(
                "✅ Analysis finished in {}ms ({} warnings, {} alerts)",
                response.transparency.elapsed_ms,
                response.transparency.warnings.len(),
                response.transparency.alerts.len()
            );
            print_json(&response, pretty)?;
        }
        Command::Suggest { prefix, limit } => {
            for title in app.engine.suggest(&prefix, limit).await? {
                println!("{}", title);
            }
        }
        Command::Status => {
            let report = StatusReport {
                snapshot_path: config.data.snapshot_path.clone(),
                patent_records: app.patent_records,
                project_records: app.project_records,
                sources: app.engine.status().await?,
            };
            print_json(&report, true)?;
        }
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<(), RadarError> {
    let rendered = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", rendered);
    Ok(())
}


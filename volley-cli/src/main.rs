use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use std::fs;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use volley_config::{BenchConfig, ConfigLoader};
use volley_core::{Attacker, Benchmark, ProgressFn, ReadinessProber, StdoutSink};
use volley_http::ReqwestClient;
use volley_resilience::CancellationSource;

mod cli;
use cli::{Cli, Commands, ConfigCommands, RunArgs};

fn load_config(config_path: Option<&PathBuf>) -> Result<BenchConfig> {
    let loader = ConfigLoader::new();

    match config_path {
        Some(path) => {
            if path.exists() {
                info!("Loading configuration from: {:?}", path);
                loader
                    .from_file(path)
                    .context(format!("Failed to load configuration from {:?}", path))
            } else {
                warn!("Configuration file not found: {:?}. Using defaults.", path);
                loader
                    .from_env()
                    .context("Failed to load configuration from environment")
            }
        }
        None => {
            debug!("No configuration file specified. Loading from environment or defaults.");
            loader
                .from_env()
                .context("Failed to load configuration from environment")
        }
    }
}

/// Fold command-line overrides into the loaded configuration and re-validate
fn apply_run_overrides(config: &mut BenchConfig, args: &RunArgs) -> Result<()> {
    if let Some(base_url) = &args.base_url {
        config.target.base_url = base_url.clone();
    }
    if !args.limits.is_empty() {
        config.plan.limits = args.limits.clone();
    }
    if !args.concurrency.is_empty() {
        config.plan.concurrency_levels = args.concurrency.clone();
    }
    if let Some(duration) = args.duration {
        config.plan.duration = duration;
    }
    if args.attach {
        config.server = None;
    }

    config
        .validate_all()
        .context("Invalid configuration after command-line overrides")
}

/// Run the benchmark matrix
async fn run_command(config_path: Option<&PathBuf>, log_level: Option<&str>, args: RunArgs) -> Result<()> {
    let mut config = load_config(config_path)?;
    apply_run_overrides(&mut config, &args)?;
    volley_logging::init_tracing(&config.logging, log_level)?;

    let source = CancellationSource::new();
    source.cancel_on_ctrl_c();
    if let Some(deadline) = args.deadline {
        source.cancel_after(deadline);
    }

    let color = !args.no_color && std::io::stdout().is_terminal();
    let progress = ProgressFn(|message: &str| eprintln!("{}", message.dimmed()));

    let benchmark = Benchmark::from_config(&config)?
        .sink(Arc::new(StdoutSink::new(color)))
        .progress(Arc::new(progress))
        .build()?;

    info!(
        base_url = benchmark.base_url(),
        cells = benchmark.plan().len(),
        "Starting benchmark"
    );

    match benchmark.run(&source.token()).await {
        Ok(report) => {
            if let Some(path) = &args.json {
                let json = report.to_json().context("Failed to serialize report")?;
                fs::write(path, json).context(format!("Failed to write report to {:?}", path))?;
                info!("Report written to {:?}", path);
            }
            println!("✅ {}", report.message);
            Ok(())
        }
        Err(e) => {
            let summary = e.summary();
            error!("{}: {}", summary, e);
            Err(anyhow::Error::new(e).context(summary))
        }
    }
}

/// Wait for the target's health endpoint without running the matrix
async fn probe_command(
    config_path: Option<&PathBuf>,
    log_level: Option<&str>,
    base_url: Option<String>,
    timeout: Option<std::time::Duration>,
) -> Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(base_url) = base_url {
        config.target.base_url = base_url;
    }
    if let Some(timeout) = timeout {
        config.readiness.timeout = timeout;
    }
    config.validate_all().context("Invalid configuration")?;
    volley_logging::init_tracing(&config.logging, log_level)?;

    let client = ReqwestClient::with_config(&config.http)
        .context("Failed to create HTTP client")?
        .with_timeout(config.readiness.probe_timeout);
    let prober = ReadinessProber::from_config(
        Attacker::new(Arc::new(client)),
        &config.target,
        &config.readiness,
    );

    let source = CancellationSource::new();
    source.cancel_on_ctrl_c();

    let report = prober
        .wait_until_ready(&config.target.base_url, &source.token())
        .await?;

    if report.ready {
        println!(
            "✅ {} is ready after {} probe(s) ({:?})",
            config.target.base_url, report.attempts, report.elapsed
        );
        Ok(())
    } else {
        println!(
            "❌ {} not ready within {:?} ({} probes)",
            config.target.base_url,
            prober.budget(),
            report.attempts
        );
        Err(anyhow::anyhow!(
            "Server failed to start within {:?}",
            prober.budget()
        ))
    }
}

/// Handle configuration validation
fn handle_config_validate(config_file: &PathBuf) -> Result<()> {
    info!("Validating configuration file: {:?}", config_file);

    if !config_file.exists() {
        return Err(anyhow::anyhow!(
            "Configuration file not found: {:?}",
            config_file
        ));
    }

    match load_config(Some(config_file)) {
        Ok(config) => {
            println!("✅ Configuration file is valid");
            println!(
                "   {} benchmark cells against {}",
                config.plan.cell_count(),
                config.target.base_url
            );
            Ok(())
        }
        Err(e) => {
            println!("❌ Configuration validation failed: {:#}", e);
            error!("Configuration validation failed: {:#}", e);
            Err(e)
        }
    }
}

/// Handle configuration generation
fn handle_config_generate(output: &PathBuf, force: bool) -> Result<()> {
    info!("Generating sample configuration at: {:?}", output);

    if output.exists() && !force {
        return Err(anyhow::anyhow!(
            "Output file already exists: {:?}. Use --force to overwrite.",
            output
        ));
    }

    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).context("Failed to create output directory")?;
        }
    }

    fs::write(output, BenchConfig::generate_sample())
        .context(format!("Failed to write configuration to {:?}", output))?;

    println!("✅ Sample configuration written to {:?}", output);
    Ok(())
}

/// Render the effective configuration
fn render_config(config: &BenchConfig, format: &str) -> Result<String> {
    match format.to_lowercase().as_str() {
        "yaml" | "yml" => serde_yaml::to_string(config).context("Failed to serialize to YAML"),
        "json" => serde_json::to_string_pretty(config).context("Failed to serialize to JSON"),
        _ => Err(anyhow::anyhow!(
            "Unknown output format: {}. Valid formats: yaml, json",
            format
        )),
    }
}

/// Handle configuration display
fn handle_config_show(config_file: Option<&PathBuf>, format: &str) -> Result<()> {
    let config = load_config(config_file)?;
    println!("{}", render_config(&config, format)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_level = cli.log_level.as_deref();

    match cli.command {
        Commands::Run(args) => run_command(cli.config.as_ref(), log_level, args).await,
        Commands::Probe { base_url, timeout } => {
            probe_command(cli.config.as_ref(), log_level, base_url, timeout).await
        }
        Commands::Config { config_cmd } => {
            volley_logging::init_simple_tracing(log_level.unwrap_or("warn"))?;
            match config_cmd {
                ConfigCommands::Validate { config_file } => handle_config_validate(&config_file),
                ConfigCommands::Generate { output, force } => handle_config_generate(&output, force),
                ConfigCommands::Show {
                    config_file,
                    format,
                } => handle_config_show(config_file.as_ref().or(cli.config.as_ref()), &format),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use volley_config::Validatable;

    #[test]
    fn test_run_overrides_replace_plan() {
        let mut config = BenchConfig::default();
        config.server = Some(Default::default());

        let args = RunArgs {
            base_url: Some("http://127.0.0.1:9000".to_string()),
            limits: vec![5],
            concurrency: vec![2, 4],
            duration: Some(Duration::from_secs(3)),
            attach: true,
            ..Default::default()
        };
        apply_run_overrides(&mut config, &args).unwrap();

        assert_eq!(config.target.base_url, "http://127.0.0.1:9000");
        assert_eq!(config.plan.limits, vec![5]);
        assert_eq!(config.plan.concurrency_levels, vec![2, 4]);
        assert_eq!(config.plan.duration, Duration::from_secs(3));
        assert!(config.server.is_none());
    }

    #[test]
    fn test_invalid_override_rejected() {
        let mut config = BenchConfig::default();
        let args = RunArgs {
            base_url: Some("not a url".to_string()),
            ..Default::default()
        };
        assert!(apply_run_overrides(&mut config, &args).is_err());
    }

    #[test]
    fn test_generate_refuses_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("volley.yaml");

        handle_config_generate(&path, false).unwrap();
        assert!(handle_config_generate(&path, false).is_err());
        handle_config_generate(&path, true).unwrap();

        let written = fs::read_to_string(&path).unwrap();
        let parsed: BenchConfig = serde_yaml::from_str(&written).unwrap();
        assert!(parsed.target.validate().is_ok());
        assert!(parsed.server.is_some());
    }

    #[test]
    fn test_render_config_formats() {
        let config = BenchConfig::default();
        assert!(render_config(&config, "json").unwrap().contains("\"base_url\""));
        assert!(render_config(&config, "YAML").unwrap().contains("base_url:"));
        assert!(render_config(&config, "toml").is_err());
    }
}

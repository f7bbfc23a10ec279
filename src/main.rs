//! Slidecast - narrated slide videos in many languages
//!
//! Entry point: loads the configuration, installs logging and dispatches the
//! `run`, `cache`, `check` and `init` commands.

use anyhow::{Result, bail};
use chrono::{DateTime, Local};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{Level, info, warn};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use walkdir::WalkDir;

use slidecast::cancel::CancellationToken;
use slidecast::cli::{Args, CacheAction, Commands, parse_languages};
use slidecast::config::{Config, PipelineConfig};
use slidecast::language::display_name;
use slidecast::media::MediaProcessorFactory;
use slidecast::progress::{IndicatifProgress, LogProgress, ProgressSink};
use slidecast::slides::DirectorySlideSource;
use slidecast::speech::SynthesizerFactory;
use slidecast::translate::TranslatorFactory;
use slidecast::workflow::{LanguageOutcome, Pipeline, PipelineReport, Services};

const DEFAULT_CONFIG_FILE: &str = "slidecast.toml";

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if let Commands::Init { path, force } = &args.command {
        return init_config(path, *force);
    }

    let mut config = match &args.config {
        Some(config_path) => Config::from_file(config_path)?,
        None => {
            if Path::new(DEFAULT_CONFIG_FILE).exists() {
                Config::from_file(DEFAULT_CONFIG_FILE)?
            } else {
                Config::default()
            }
        }
    };

    if let Commands::Run { root: Some(root), .. } = &args.command {
        config.pipeline.root_dir = root.clone();
    }

    setup_logging(args.verbose, &config.pipeline.root_dir)?;
    info!("Starting Slidecast");

    match args.command {
        Commands::Init { .. } => {}
        Commands::Check => {
            let media = MediaProcessorFactory::create_processor(config.media.clone());
            media.check_availability().await?;
            println!("{}", media.version().await?);
            println!("{} and {} are available", config.media.binary_path, config.media.probe_path);
        }
        Commands::Cache { action } => {
            let cache_dir = config.pipeline.root_dir.join(&config.pipeline.cache_dir);
            match action {
                CacheAction::Info => print_cache_info(&cache_dir),
                CacheAction::Clear { language } => clear_cache(&cache_dir, language.as_deref()).await?,
            }
        }
        Commands::Run {
            languages,
            input_language,
            transition,
            transition_duration,
            timeout,
            no_progress,
            ..
        } => {
            if let Some(languages) = languages {
                config.pipeline.output_languages = parse_languages(&languages);
            }
            if let Some(input_language) = input_language {
                config.pipeline.input_language = input_language;
            }
            if let Some(kind) = transition {
                config.transition.kind = kind;
            }
            if let Some(duration) = transition_duration {
                config.transition.duration = duration;
            }
            if timeout.is_some() {
                config.pipeline.timeout_secs = timeout;
            }

            let report = run_pipeline(&config, no_progress).await?;
            let root = std::path::absolute(&config.pipeline.root_dir)?;
            print_summary(&report, &root);

            let failed = report.failed().count();
            if failed > 0 {
                bail!("{} of {} language(s) failed", failed, report.outcomes.len());
            }
        }
    }

    info!("Slidecast completed successfully");
    Ok(())
}

async fn run_pipeline(config: &Config, no_progress: bool) -> Result<PipelineReport> {
    let pipeline_config = PipelineConfig::from_config(config)?;

    let media = MediaProcessorFactory::create_processor(config.media.clone());
    media.check_availability().await?;

    let progress: Arc<dyn ProgressSink> = if no_progress {
        Arc::new(LogProgress)
    } else {
        Arc::new(IndicatifProgress::new())
    };

    let services = Services {
        translator: Arc::from(TranslatorFactory::create_translator(config.translate.clone())?),
        synthesizer: Arc::from(SynthesizerFactory::create_synthesizer(config.speech.clone())?),
        audio_format: config.speech.format.clone(),
        media: Arc::from(media),
        slides: Arc::new(DirectorySlideSource::new(&pipeline_config.slides_dir)),
        progress,
    };

    let cancel = CancellationToken::new(pipeline_config.timeout);
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling run");
            on_interrupt.cancel();
        }
    });

    let pipeline = Pipeline::new(pipeline_config, services);
    Ok(pipeline.run(&cancel).await?)
}

fn print_summary(report: &PipelineReport, root: &Path) {
    println!("\nSummary:");
    println!("{:<8} {:<20} {:<10} {}", "Code", "Language", "Status", "Result");
    println!("{}", "-".repeat(75));

    for (language, outcome) in &report.outcomes {
        let name = display_name(language);
        match outcome {
            LanguageOutcome::Completed { output_path } => {
                let shown = pathdiff::diff_paths(output_path, root).unwrap_or_else(|| output_path.clone());
                println!("{:<8} {:<20} {:<10} {}", language, name, "done", shown.display());
            }
            LanguageOutcome::Failed { stage, error } => {
                println!("{:<8} {:<20} {:<10} {} ({})", language, name, "failed", error, stage);
            }
        }
    }
}

fn init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists, use --force to overwrite", path.display());
    }
    Config::default().save_to_file(path)?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}

struct LanguageCache {
    language: String,
    files: usize,
    bytes: u64,
    newest: Option<SystemTime>,
}

fn scan_cache(cache_dir: &Path) -> Vec<LanguageCache> {
    let mut languages: Vec<PathBuf> = WalkDir::new(cache_dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_dir())
        .map(|e| e.into_path())
        .collect();
    languages.sort();

    languages
        .into_iter()
        .map(|dir| {
            let mut entry = LanguageCache {
                language: dir.file_name().unwrap_or_default().to_string_lossy().to_string(),
                files: 0,
                bytes: 0,
                newest: None,
            };
            for file in WalkDir::new(&dir).into_iter().filter_map(|e| e.ok()) {
                let Ok(metadata) = file.metadata() else { continue };
                if !metadata.is_file() {
                    continue;
                }
                entry.files += 1;
                entry.bytes += metadata.len();
                if let Ok(modified) = metadata.modified() {
                    entry.newest = entry.newest.max(Some(modified));
                }
            }
            entry
        })
        .collect()
}

fn print_cache_info(cache_dir: &Path) {
    let entries = scan_cache(cache_dir);
    if entries.is_empty() {
        println!("No cached files in {}", cache_dir.display());
        return;
    }

    println!("\nCache: {}", cache_dir.display());
    println!("{:<10} {:<8} {:<12} {:<20}", "Language", "Files", "Size (MB)", "Last updated");
    println!("{}", "-".repeat(55));

    let mut total = 0;
    for entry in &entries {
        let updated = entry
            .newest
            .map(|t| DateTime::<Local>::from(t).format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<10} {:<8} {:<12.2} {:<20}",
            entry.language,
            entry.files,
            entry.bytes as f64 / 1024.0 / 1024.0,
            updated
        );
        total += entry.bytes;
    }
    println!("Total cache size: {:.2} MB", total as f64 / 1024.0 / 1024.0);
}

async fn clear_cache(cache_dir: &Path, language: Option<&str>) -> Result<()> {
    let target = match language {
        Some(language) => cache_dir.join(language),
        None => cache_dir.to_path_buf(),
    };
    if !target.exists() {
        println!("Nothing cached at {}", target.display());
        return Ok(());
    }

    tokio::fs::remove_dir_all(&target).await?;
    println!("Cleared {}", target.display());
    Ok(())
}

/// Setup logging to both console and file
fn setup_logging(verbose: bool, root: &Path) -> Result<()> {
    let log_dir = root.join(".slidecast").join("log");
    std::fs::create_dir_all(&log_dir)?;

    // Set up file appender with daily rotation
    let file_appender = rolling::daily(&log_dir, "slidecast.log");
    let (non_blocking_file, guard) = non_blocking(file_appender);
    // Keep the guard alive for the duration of the program
    std::mem::forget(guard);

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    let console_layer = fmt::layer()
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!(
        "Logging initialized - console: {}, file: {}",
        log_level,
        log_dir.join("slidecast.log").display()
    );

    Ok(())
}

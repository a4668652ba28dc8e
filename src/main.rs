use anyhow::Result;
use clap::{Parser, ValueEnum};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use channel_scraper::cli::{Cli, Commands, OutputFormat};
use channel_scraper::config::Config;
use channel_scraper::output;
use channel_scraper::pipeline::{
    AcquisitionPipeline, EventKind, LogLevel, RunEvent, RunOutcome, RunState, ScrapeOptions,
};
use channel_scraper::utils::{format_duration, Capabilities};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let default_filter = if cli.verbose {
        "channel_scraper=debug"
    } else {
        "channel_scraper=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::load().await?;

    match cli.command {
        Commands::Scrape {
            url,
            max_videos,
            method,
            api_key,
            no_transcripts,
            output: output_path,
            format,
        } => {
            let max_videos = max_videos
                .map(|n| n as usize)
                .unwrap_or(config.scrape.max_videos);
            let mut options = ScrapeOptions::from_config(&config);
            if let Some(method) = method {
                options.strategy = method;
            }
            if api_key.is_some() {
                options.api_key = api_key;
            }
            if no_transcripts {
                options.include_transcripts = false;
            }

            let format = match format {
                Some(format) => format,
                None => OutputFormat::from_str(&config.app.default_output_format, true)
                    .map_err(|e| anyhow::anyhow!("Invalid app.default_output_format: {}", e))?,
            };

            let capabilities = Capabilities::detect(&config).await;
            if options.include_transcripts {
                let missing = capabilities.missing();
                if !missing.is_empty() {
                    eprintln!("⚠️  Transcript sources limited:");
                    for dep in missing {
                        eprintln!("   • {}", dep);
                    }
                    eprintln!("   (Continuing with the sources that are available)");
                }
            }

            let state = Arc::new(RunState::new(max_videos));
            scrape(&config, capabilities, url, options, state, output_path, format, cli.quiet)
                .await?;
        }
        Commands::Config { show } => {
            if !show {
                config.save().await?;
                println!("Configuration saved.");
            }
            config.display();
        }
        Commands::Check => {
            let capabilities = Capabilities::detect(&config).await;
            let mark = |ok: bool| {
                if ok {
                    style("✓").green()
                } else {
                    style("✗").red()
                }
            };

            println!("Environment:");
            println!("  {} yt-dlp", mark(capabilities.yt_dlp));
            println!("  {} ffmpeg", mark(capabilities.ffmpeg));
            println!("  {} speech-to-text (AWS Transcribe)", mark(capabilities.speech_to_text));
            println!("Transcript tiers:");
            println!("  {} captions", mark(capabilities.captions()));
            println!("  {} audio transcription", mark(capabilities.audio_transcription()));
        }
    }

    Ok(())
}

async fn scrape(
    config: &Config,
    capabilities: Capabilities,
    url: String,
    options: ScrapeOptions,
    state: Arc<RunState>,
    output_path: Option<PathBuf>,
    format: OutputFormat,
    quiet: bool,
) -> Result<()> {
    let pipeline = AcquisitionPipeline::new(config, capabilities).await?;
    let (events, mut receiver) = mpsc::unbounded_channel::<RunEvent>();

    // The first Ctrl-C stops the run after the current unit of work
    let cancel = state.cancel_flag();
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if cancel.cancel() {
                eprintln!("{}", style("Stopping after the current step...").yellow());
            }
        }
    });

    let progress = if quiet {
        ProgressBar::hidden()
    } else {
        let progress = ProgressBar::new(state.target() as u64);
        progress.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
                .progress_chars("#>-"),
        );
        progress
    };

    let started = std::time::Instant::now();
    let run = tokio::spawn({
        let state = state.clone();
        async move { pipeline.run(&url, &options, state, Arc::new(events)).await }
    });

    while let Some(event) = receiver.recv().await {
        render(&progress, event);
    }
    progress.finish_and_clear();

    let result = run.await??;
    let elapsed = format_duration(started.elapsed().as_secs_f64());
    println!("{}", style(format!("Finished in {}", elapsed)).dim());

    if let RunOutcome::Aborted(detail) = &result.outcome {
        tracing::warn!(%detail, records = result.records.len(), "run aborted; saving partial results");
    }

    if result.records.is_empty() {
        return Ok(());
    }

    match output_path {
        Some(path) => {
            let written = output::save_to_file(&result.records, &path, format)?;
            println!("Saved {} videos to: {}", result.records.len(), written.display());
        }
        None => output::print_to_console(&result.records, format)?,
    }

    Ok(())
}

/// Draw one run event above the progress bar
fn render(progress: &ProgressBar, event: RunEvent) {
    match event.kind {
        EventKind::Progress { processed, target } => {
            progress.set_length(target as u64);
            progress.set_position(processed as u64);
        }
        EventKind::Log { level, message } => {
            let time = event.at.with_timezone(&chrono::Local).format("%H:%M:%S");
            let message = match level {
                LogLevel::Info => style(message),
                LogLevel::Success => style(message).green(),
                LogLevel::Warning => style(message).yellow(),
                LogLevel::Error => style(message).red(),
            };
            let line = format!("[{}] {}", style(time).dim(), message);

            if progress.is_hidden() {
                println!("{}", line);
            } else {
                progress.println(line);
            }
        }
    }
}

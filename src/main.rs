use anyhow::{Context, Result};
use clap::Parser;
use console::style;
use std::io::Read;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use debate_scribe::captions::MalformedCuePolicy;
use debate_scribe::cli::{Cli, Commands};
use debate_scribe::config::Config;
use debate_scribe::extractors::ExtractorRegistry;
use debate_scribe::pipeline::{load_records, DebatePipeline, PipelineOptions};
use debate_scribe::storage::DriveCredentials;
use debate_scribe::{output, transcribe, utils};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing; logs go to stderr so command output stays clean
    let default_filter = if cli.verbose {
        "debate_scribe=debug"
    } else {
        "debate_scribe=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = Config::load(cli.config.as_deref()).await?;
    let show_progress = !cli.quiet;

    match cli.command {
        Commands::Process {
            input,
            output_root,
            master_json,
            force,
            keep_going,
            with_video,
            hf_token,
        } => {
            if let Some(input) = input {
                config.paths.input = input;
            }
            if let Some(root) = output_root {
                config.paths.output_root = root;
            }
            if let Some(master) = master_json {
                config.paths.master_json = master;
            }
            if hf_token.is_some() {
                config.transcription.hf_token = hf_token;
            }
            config.video.enabled |= with_video;
            config.validate()?;

            warn_missing_tools(&config).await;

            let records = load_records(&config.paths.input)?;
            tracing::info!("Processing {} debates from {}", records.len(), config.paths.input.display());

            let master_json = config.paths.master_json.clone();
            let pipeline = DebatePipeline::new(
                config,
                PipelineOptions {
                    force,
                    keep_going,
                    show_progress,
                },
            );
            let summaries = pipeline.process_all(&records).await?;

            println!(
                "Processed {} of {} debates, summary saved to: {}",
                summaries.len(),
                records.len(),
                master_json.display()
            );
        }
        Commands::Captions {
            input,
            output,
            skip_malformed,
        } => {
            let policy = if skip_malformed {
                MalformedCuePolicy::Skip
            } else {
                config.captions.on_malformed
            };

            match output {
                Some(path) => {
                    let entries = transcribe::convert_captions(&input, &path, policy)?;
                    println!("{} transcript entries saved to: {}", entries.len(), path.display());
                }
                None => {
                    let content = fs_err::read_to_string(&input)?;
                    let cues = debate_scribe::captions::parse_vtt(&content)?;
                    let entries = debate_scribe::Normalizer::new(policy).normalize(&cues)?;
                    println!("{}", serde_json::to_string_pretty(&entries)?);
                }
            }
        }
        Commands::Playlist { slug, dir, output } => {
            let pipeline = DebatePipeline::new(
                config,
                PipelineOptions {
                    show_progress,
                    ..PipelineOptions::default()
                },
            );
            let segments_dir = dir.unwrap_or_else(|| pipeline.segments_dir(&slug));
            let playlist = pipeline.build_playlist(&slug, &segments_dir).await?;

            match output {
                Some(path) => {
                    output::write_text(&path, &playlist.render())?;
                    println!(
                        "Playlist with {} segments saved to: {}",
                        playlist.entries.len(),
                        path.display()
                    );
                }
                None => print!("{}", playlist),
            }
        }
        Commands::Credentials {
            rclone_config,
            section,
        } => {
            let content = match rclone_config.as_deref() {
                Some(path) if path.as_os_str() == "-" => {
                    let mut buf = String::new();
                    std::io::stdin()
                        .read_to_string(&mut buf)
                        .context("Failed to read rclone config from stdin")?;
                    buf
                }
                Some(path) => fs_err::read_to_string(path)?,
                None => {
                    let path = match &config.storage.rclone_config {
                        Some(path) => path.clone(),
                        None => debate_scribe::storage::credentials::default_rclone_config()?,
                    };
                    fs_err::read_to_string(path)?
                }
            };

            let section = section.unwrap_or_else(|| config.storage.remote.clone());
            let credentials = DriveCredentials::from_rclone_config(&content, &section)?;
            println!("{}", serde_json::to_string(&credentials)?);
        }
        Commands::Config { show } => {
            if show {
                config.display();
            } else {
                let path = match cli.config {
                    Some(path) => path,
                    None => Config::config_path()?,
                };
                println!("Configuration file: {}", path.display());
                println!("Edit it to change tools, whisperx settings and the storage remote.");
            }
        }
        Commands::Sites => {
            println!("Supported debate sites:");
            for site in ExtractorRegistry::new().list_sites() {
                println!("  • {}", site);
            }
        }
    }

    Ok(())
}

/// Warn about missing external tools (non-fatal, they may still be reachable)
async fn warn_missing_tools(config: &Config) {
    let tools = &config.tools;
    let mut required = vec![
        (tools.ffmpeg.as_str(), "-version", "required for audio download"),
        (tools.whisperx.as_str(), "--help", "required for transcription"),
    ];
    if config.video.enabled {
        required.push((tools.ffprobe.as_str(), "-version", "required for segment durations"));
        required.push((tools.rclone.as_str(), "version", "required for segment upload"));
    }

    let missing = utils::check_dependencies(&required).await;
    if !missing.is_empty() {
        eprintln!("{}", style("⚠️  Dependency check warnings:").yellow());
        for dep in missing {
            eprintln!("   • {}", dep);
        }
        eprintln!("   (Continuing anyway - tools may be available)");
    }
}

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "debates",
    about = "Debate Scribe - Transcribe and publish Portuguese political debates",
    version,
    long_about = "Finds the stream behind SIC Notícias and RTP Play debate pages, downloads the audio, transcribes it with speaker labels using whisperx, and optionally publishes the video as an HLS playlist of segments stored on an rclone remote."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (defaults to ./debates.config.yaml or the user config dir)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Process every debate in the input list
    Process {
        /// YAML list of debates (`- title: ...\n  url: ...`)
        #[arg(short, long, value_name = "FILE")]
        input: Option<PathBuf>,

        /// Directory for per-debate artifacts
        #[arg(long, value_name = "DIR")]
        output_root: Option<PathBuf>,

        /// Where to write the summary of all processed debates
        #[arg(long, value_name = "FILE")]
        master_json: Option<PathBuf>,

        /// Re-process debates that already have a descriptor
        #[arg(short, long)]
        force: bool,

        /// Continue with the next debate when one fails
        #[arg(long)]
        keep_going: bool,

        /// Also segment, upload and publish the video playlist
        #[arg(long)]
        with_video: bool,

        /// Hugging Face token used by whisperx for diarization
        #[arg(long, env = "HF_TOKEN", hide_env_values = true)]
        hf_token: Option<String>,
    },

    /// Convert a WebVTT caption file into a JSON transcript
    Captions {
        /// WebVTT file produced by whisperx
        #[arg(value_name = "VTT")]
        input: PathBuf,

        /// Output JSON file (prints to console if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Skip cues without a speaker label instead of failing
        #[arg(long)]
        skip_malformed: bool,
    },

    /// Build the HLS playlist of a debate whose segments are on the remote
    Playlist {
        /// Debate slug
        #[arg(value_name = "SLUG")]
        slug: String,

        /// Local segment directory (defaults to <output_root>/segments/<slug>)
        #[arg(short, long, value_name = "DIR")]
        dir: Option<PathBuf>,

        /// Output playlist (prints to console if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Print the Drive OAuth credentials of an rclone remote as JSON
    Credentials {
        /// rclone config file, or `-` to read it from stdin
        #[arg(long, env = "RCLONE_CONFIG", value_name = "FILE")]
        rclone_config: Option<PathBuf>,

        /// Remote (config section) name; defaults to the configured remote
        #[arg(short, long, value_name = "NAME")]
        section: Option<String>,
    },

    /// Show or initialise the configuration
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,
    },

    /// List supported debate sites
    Sites,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_process_flags() {
        let cli = Cli::try_parse_from([
            "debates",
            "process",
            "--input",
            "list.yaml",
            "--force",
            "--keep-going",
            "--with-video",
            "-q",
        ])
        .unwrap();

        assert!(cli.quiet);
        match cli.command {
            Commands::Process {
                input,
                force,
                keep_going,
                with_video,
                ..
            } => {
                assert_eq!(input, Some(PathBuf::from("list.yaml")));
                assert!(force && keep_going && with_video);
            }
            _ => panic!("expected process"),
        }
    }
}

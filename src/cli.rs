use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Produce one narrated video per language
    Run {
        /// Project directory holding slides and narration
        #[arg(short, long)]
        root: Option<PathBuf>,

        /// Output languages (comma-separated)
        #[arg(short, long)]
        languages: Option<String>,

        /// Language the narration file is written in
        #[arg(short, long)]
        input_language: Option<String>,

        /// Transition between slides (none, fade, dissolve, wipeleft, ...)
        #[arg(short, long)]
        transition: Option<String>,

        /// Transition length in seconds
        #[arg(long)]
        transition_duration: Option<f64>,

        /// Abort the run after this many seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Log progress instead of drawing progress bars
        #[arg(long)]
        no_progress: bool,
    },

    /// Inspect or clear cached translations, audio and segments
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Check that ffmpeg and ffprobe are available
    Check,

    /// Write a default configuration file
    Init {
        /// Destination of the configuration file
        #[arg(default_value = "slidecast.toml")]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(Subcommand)]
pub enum CacheAction {
    /// Show cache size per language
    Info,

    /// Remove cached artifacts
    Clear {
        /// Only clear this language
        #[arg(short, long)]
        language: Option<String>,
    },
}

/// Split a comma-separated language list, dropping empty entries.
pub fn parse_languages(list: &str) -> Vec<String> {
    list.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_overrides_parse() {
        let args = Args::parse_from([
            "slidecast", "-v", "run", "--languages", "fr, de", "--transition", "wipeleft",
            "--transition-duration", "0.8",
        ]);
        assert!(args.verbose);
        match args.command {
            Commands::Run { languages, transition, transition_duration, .. } => {
                assert_eq!(parse_languages(&languages.unwrap()), vec!["fr", "de"]);
                assert_eq!(transition.as_deref(), Some("wipeleft"));
                assert_eq!(transition_duration, Some(0.8));
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_cache_clear_takes_language() {
        let args = Args::parse_from(["slidecast", "cache", "clear", "--language", "ja"]);
        assert!(matches!(
            args.command,
            Commands::Cache { action: CacheAction::Clear { language: Some(ref l) } } if l == "ja"
        ));
    }

    #[test]
    fn test_parse_languages_skips_blanks() {
        assert_eq!(parse_languages("en,,ja ,"), vec!["en", "ja"]);
    }
}

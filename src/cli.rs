use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::download::progress::Mode;

#[derive(Parser)]
#[command(name = "yturl")]
#[command(author, version, about = "Download social videos as MP4 or MP3 over HTTP or Telegram", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the web API, plus the Telegram bot when TELEGRAM_BOT is set
    Serve {
        /// Port to listen on (defaults to WEB_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Run only the Telegram bot
    Bot,

    /// Show the format choices for a URL
    Info {
        /// Video URL
        url: String,

        /// Which choices to list
        #[arg(short, long, default_value_t = Mode::Video)]
        mode: Mode,

        /// Print the choices as JSON
        #[arg(long)]
        json: bool,
    },

    /// Download one format and print progress events
    Download {
        /// Video URL
        url: String,

        /// Format id (from `info`)
        #[arg(short, long)]
        format: String,

        #[arg(short, long, default_value_t = Mode::Video)]
        mode: Mode,

        /// Output directory (defaults to the current directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_no_command() {
        let cli = Cli::try_parse_from(["yturl"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_download_args() {
        let cli = Cli::try_parse_from(["yturl", "download", "https://youtu.be/x", "-f", "140", "--mode", "audio"]).unwrap();
        match cli.command {
            Some(Commands::Download { format, mode, output, .. }) => {
                assert_eq!(format, "140");
                assert_eq!(mode, Mode::Audio);
                assert!(output.is_none());
            }
            _ => panic!("expected download"),
        }
    }

    #[test]
    fn test_download_requires_format() {
        assert!(Cli::try_parse_from(["yturl", "download", "https://youtu.be/x"]).is_err());
    }
}

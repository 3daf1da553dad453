use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use medbot::commands::{ingest, serve, status};
use medbot::config::Config;

#[derive(Parser)]
#[command(name = "medbot")]
#[command(about = "Retrieval-augmented medical question answering over a PDF corpus")]
#[command(version)]
struct Cli {
    /// Path to the configuration file (defaults to ./medbot.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Chunk, embed, and index a directory of PDF files
    Ingest {
        /// Directory containing the PDF corpus
        dir: PathBuf,
    },
    /// Start the chat web service
    Serve {
        /// Override the bind port from the config file
        #[arg(long)]
        port: Option<u16>,
    },
    /// Show external collaborator health and index statistics
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Secrets come from the environment; a local .env file is honored.
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Ingest { dir } => {
            ingest(&config, &dir).await?;
        }
        Commands::Serve { port } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            serve(&config).await?;
        }
        Commands::Status => {
            status(&config).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn cli_parsing() {
        let cli = Cli::try_parse_from(["medbot", "status"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            matches!(parsed.command, Commands::Status);
        }
    }

    #[test]
    fn ingest_command_with_dir() {
        let cli = Cli::try_parse_from(["medbot", "ingest", "data"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Ingest { dir } = parsed.command {
                assert_eq!(dir, PathBuf::from("data"));
            }
        }
    }

    #[test]
    fn serve_command_with_port() {
        let cli = Cli::try_parse_from(["medbot", "serve", "--port", "9000"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Serve { port } = parsed.command {
                assert_eq!(port, Some(9000));
            }
        }
    }

    #[test]
    fn global_config_flag() {
        let cli = Cli::try_parse_from(["medbot", "--config", "custom.toml", "status"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            assert_eq!(parsed.config, Some(PathBuf::from("custom.toml")));
        }
    }

    #[test]
    fn invalid_command() {
        let cli = Cli::try_parse_from(["medbot", "invalid"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::InvalidSubcommand);
        }
    }

    #[test]
    fn help_message() {
        let cli = Cli::try_parse_from(["medbot", "--help"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::DisplayHelp);
        }
    }
}

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "taskscope")]
#[command(
    author,
    version,
    about = "Classify registry models with an LLM and cache the results"
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP service
    Serve(ServeArgs),

    /// Warm a running service's cache with the most-run models
    Seed(SeedArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct ServeArgs {
    /// Configuration file path
    #[arg(short, long, default_value = "config.yaml")]
    pub config: String,

    /// Listen address
    #[arg(short = 'l', long, default_value = "0.0.0.0")]
    pub listen: String,

    /// Listen port
    #[arg(short = 'P', long, default_value = "8787")]
    pub port: u16,

    /// Model registry base URL
    #[arg(long)]
    pub registry_url: Option<String>,

    /// Chat completions base URL
    #[arg(long)]
    pub llm_url: Option<String>,

    /// LLM model identifier
    #[arg(long)]
    pub llm_model: Option<String>,

    /// SQLite database path; selects the SQLite cache
    #[arg(long)]
    pub cache_path: Option<PathBuf>,

    /// Admit plain HTTP and private upstream hosts (local mocks)
    #[arg(long)]
    pub allow_insecure_upstreams: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Args, Debug, Clone)]
pub struct SeedArgs {
    /// JSON file with an array of `{owner, name, run_count}` records
    #[arg(short, long)]
    pub models: PathBuf,

    /// Base URL of a running taskscope service
    #[arg(short, long, default_value = "http://localhost:8787")]
    pub target: String,

    /// Number of models to classify
    #[arg(long, default_value = "1000")]
    pub max: usize,

    /// Pause after each freshly computed classification
    #[arg(long, default_value = "10")]
    pub delay_secs: u64,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_serve_overrides() {
        let cli = Cli::try_parse_from([
            "taskscope",
            "serve",
            "--port",
            "9000",
            "--cache-path",
            "/tmp/cache.db",
            "--allow-insecure-upstreams",
        ])
        .unwrap();

        match cli.command {
            Commands::Serve(args) => {
                assert_eq!(args.port, 9000);
                assert_eq!(args.config, "config.yaml");
                assert_eq!(args.cache_path, Some(PathBuf::from("/tmp/cache.db")));
                assert!(args.allow_insecure_upstreams);
            }
            other => panic!("expected serve, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_seed_defaults() {
        let cli = Cli::try_parse_from(["taskscope", "seed", "--models", "models.json"]).unwrap();
        match cli.command {
            Commands::Seed(args) => {
                assert_eq!(args.max, 1000);
                assert_eq!(args.delay_secs, 10);
                assert_eq!(args.target, "http://localhost:8787");
            }
            other => panic!("expected seed, got {:?}", other),
        }
    }
}

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "quire")]
#[command(about = "A static site generator for markdown blogs", long_about = None)]
struct Cli {
    /// Log every written file
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the site once
    Build {
        #[arg(long, short, default_value = "site.yml")]
        config: PathBuf,
    },
    /// Build, serve the output and rebuild on changes
    Serve {
        #[arg(long, short, default_value = "site.yml")]
        config: PathBuf,

        /// Overrides the configured port
        #[arg(long)]
        port: Option<u16>,

        #[arg(long)]
        open: bool,
    },
    /// Scaffold a new post under the content directory
    New {
        /// Path relative to the content directory, e.g. `blog/hello.md`
        path: PathBuf,

        #[arg(long, short, default_value = "site.yml")]
        config: PathBuf,
    },
    /// Minify the HTML in the build directory
    Minify {
        #[arg(long, short, default_value = "site.yml")]
        config: PathBuf,
    },
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Build { config } => commands::build_site(&config),
        Commands::Serve { config, port, open } => {
            commands::serve_site(&config, port, open).await
        }
        Commands::New { path, config } => commands::new_post(&config, &path),
        Commands::Minify { config } => commands::minify_site(&config),
    };

    if let Err(error) = result {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

mod enhance;
mod locate;
mod runtime;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "jarweave",
    version,
    about = "Injects extension methods into JVM archives",
    long_about = "jarweave copies jars into a versioned overlay cache and appends extension methods \
                  to the classes they contain. Originals are never modified."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Enhance the given archives and print the resulting archive list
    Enhance {
        /// Configuration file describing the extension methods
        #[arg(long, value_name = "FILE")]
        config: PathBuf,
        /// Archives to process, in classpath order
        #[arg(value_name = "ARCHIVE", required = true)]
        archives: Vec<PathBuf>,
    },
    /// Collect and enhance the runtime environment's archives
    #[command(
        long_about = "Walks the runtime archive directory (from the configuration or JAVA_HOME), \
                      applies the include and exclude filters, and enhances what it finds."
    )]
    Runtime {
        /// Configuration file describing the extension methods
        #[arg(long, value_name = "FILE")]
        config: PathBuf,
    },
    /// Print where an artifact lives locally and remotely
    Locate {
        group: String,
        artifact: String,
        version: String,
        /// File extension including the dot
        #[arg(long, default_value = ".jar")]
        extension: String,
        /// Remote repository base URL
        #[arg(long, value_name = "URL")]
        repository: Option<String>,
    },
}

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let _guard = jarweave_core::logging::init_logging("cli", true);

    match cli.command {
        Commands::Enhance { config, archives } => enhance::run(&config, archives),
        Commands::Runtime { config } => runtime::run(&config),
        Commands::Locate {
            group,
            artifact,
            version,
            extension,
            repository,
        } => locate::run(&group, &artifact, &version, &extension, repository.as_deref()),
    }
}

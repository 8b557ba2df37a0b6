mod deps;
mod settings;
mod tree;
mod watch;

use clap::{Parser, Subcommand};
use solscope_core::TreeConfig;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(
    name = "solscope",
    version,
    about = "A live solution explorer tree for .NET solutions",
    long_about = "Solscope parses a .sln file and its project manifests into a lazily loaded \
                  display tree of solution folders, projects, dependencies and files, and keeps \
                  that tree in sync with the file system."
)]
pub struct Cli {
    /// JSON config file overriding the default tree settings
    #[arg(long, global = true, value_name = "CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the display tree of a solution as JSON
    #[command(
        long_about = "Builds the tree for the given solution and prints it as JSON. Projects are \
                            collapsed unless --expand-all is given, which loads every node."
    )]
    Tree {
        #[arg(value_name = "SOLUTION")]
        path: PathBuf,

        /// Expand and load every node before printing
        #[arg(long)]
        expand_all: bool,
    },
    /// Print the dependency categories of a single project
    Deps {
        #[arg(value_name = "PROJECT")]
        path: PathBuf,
    },
    /// Keep a solution tree in sync with the file system
    #[command(
        long_about = "Opens the solution with a file watcher and logs every tree update until \
                            interrupted. Expansion state is persisted under ~/.solscope/state/."
    )]
    Watch {
        #[arg(value_name = "SOLUTION")]
        path: PathBuf,
    },
    /// Show or change per-user solution settings stored next to the .sln
    Settings {
        #[arg(value_name = "SOLUTION")]
        path: PathBuf,

        /// Startup project GUID; an empty value clears it
        #[arg(long)]
        startup: Option<String>,

        /// Active target framework; an empty value clears it
        #[arg(long)]
        framework: Option<String>,

        /// Target framework filter; an empty value clears it
        #[arg(long)]
        filter: Option<String>,
    },
}

fn load_config(path: Option<&Path>) -> Result<TreeConfig, Box<dyn std::error::Error>> {
    match path {
        Some(path) => Ok(TreeConfig::from_file(path)?),
        None => Ok(TreeConfig::default()),
    }
}

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Only the long-running watcher mirrors logs to stderr; stdout stays JSON.
    let to_stderr = matches!(cli.command, Commands::Watch { .. });
    let _guard = solscope_core::logging::init_logging("cli", to_stderr);

    let config = load_config(cli.config.as_deref())?;
    let rt = tokio::runtime::Runtime::new()?;

    match cli.command {
        Commands::Tree { path, expand_all } => rt.block_on(tree::run(path, config, expand_all)),
        Commands::Deps { path } => rt.block_on(deps::run(path, config)),
        Commands::Watch { path } => rt.block_on(watch::run(path, config)),
        Commands::Settings {
            path,
            startup,
            framework,
            filter,
        } => rt.block_on(settings::run(
            path,
            config,
            settings::Changes {
                startup,
                framework,
                filter,
            },
        )),
    }
}

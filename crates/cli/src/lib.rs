mod build;
mod report;
mod session;
mod watch;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub use session::{Session, discover_projects};

#[derive(Parser)]
#[command(
    name = "kiln",
    version,
    about = "Incremental build engine for Java workspaces",
    long_about = "Kiln compiles Java projects incrementally. It reads the class files it produces \
                  to track which sources depend on which, and rebuilds only what a change affects."
)]
pub struct Cli {
    /// Also log to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build every project in a workspace
    #[command(
        long_about = "Builds every project found under the workspace directory. A project is a \
                      directory holding a build.kiln settings file; without any, the workspace \
                      root is the only project."
    )]
    Build {
        /// Workspace directory. Defaults to the current directory.
        #[arg(value_name = "WORKSPACE_PATH")]
        path: Option<PathBuf>,

        /// Remove all build output first
        #[arg(long)]
        clean: bool,
    },
    /// Remove all build output
    Clean {
        #[arg(value_name = "WORKSPACE_PATH")]
        path: Option<PathBuf>,
    },
    /// Build, then rebuild whenever files change
    Watch {
        #[arg(value_name = "WORKSPACE_PATH")]
        path: Option<PathBuf>,
    },
    /// Build and list the issues found
    Issues {
        #[arg(value_name = "WORKSPACE_PATH")]
        path: Option<PathBuf>,

        /// Print issues as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show what a source file depends on and what depends on it
    Deps {
        /// Source file, relative to the workspace or absolute
        #[arg(value_name = "FILE")]
        file: PathBuf,

        #[arg(long, value_name = "WORKSPACE_PATH")]
        path: Option<PathBuf>,

        /// Also list the symbols the file refers to
        #[arg(long)]
        refs: bool,
    },
    /// Dump the header and constant pool of a class file
    Inspect {
        #[arg(value_name = "CLASS_FILE")]
        file: PathBuf,
    },
}

fn workspace_path(path: Option<PathBuf>) -> PathBuf {
    path.unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
}

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let component = match &cli.command {
        Commands::Watch { .. } => "watch",
        _ => "cli",
    };
    let _guard = kiln_core::logging::init_logging(component, cli.verbose);

    let rt = tokio::runtime::Runtime::new()?;
    match cli.command {
        Commands::Build { path, clean } => rt.block_on(build::run(workspace_path(path), clean)),
        Commands::Clean { path } => rt.block_on(build::clean(workspace_path(path))),
        Commands::Watch { path } => rt.block_on(watch::run(workspace_path(path))),
        Commands::Issues { path, json } => rt.block_on(report::issues(workspace_path(path), json)),
        Commands::Deps { file, path, refs } => {
            rt.block_on(report::deps(workspace_path(path), file, refs))
        }
        Commands::Inspect { file } => report::inspect(&file),
    }
}

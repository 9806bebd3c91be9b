mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{
    doc::DocSubcommand,
    item::{ItemSubcommand, TaskSubcommand},
    repos::ReposSubcommand,
    test::TestSubcommand,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "agelum",
    about = "Markdown-backed task boards, documents and browser tests for a project",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .agelum/ or .git/)
    #[arg(long, global = true, env = "AGELUM_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the .agelum directory tree
    Init,

    /// Move legacy agelum/ and flat .agelum/ content into the current layout
    Migrate {
        /// Report what would move without touching anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Manage tasks
    Task {
        #[command(subcommand)]
        subcommand: TaskSubcommand,
    },

    /// Manage epics
    Epic {
        #[command(subcommand)]
        subcommand: ItemSubcommand,
    },

    /// Manage ideas
    Idea {
        #[command(subcommand)]
        subcommand: ItemSubcommand,
    },

    /// Read and write documents under .agelum/
    Doc {
        #[command(subcommand)]
        subcommand: DocSubcommand,
    },

    /// Manage and run browser tests
    Test {
        #[command(subcommand)]
        subcommand: TestSubcommand,
    },

    /// Run agent-browser; `browser navigate <test>` replays a test's steps
    Browser {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
        args: Vec<String>,
    },

    /// List repositories known to the user settings, or add and remove them
    Repos {
        #[command(subcommand)]
        subcommand: Option<ReposSubcommand>,
    },

    /// Start the HTTP API server
    Serve {
        /// Interface to bind; use 0.0.0.0 to expose the API on the network
        #[arg(long, default_value = agelum_server::DEFAULT_HOST)]
        host: String,

        /// Port to listen on (0 = OS-assigned)
        #[arg(long, default_value = "6500")]
        port: u16,

        /// Don't open browser automatically
        #[arg(long)]
        no_open: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Serve { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Init => cmd::init::run(&root, cli.json),
        Commands::Migrate { dry_run } => cmd::migrate::run(&root, dry_run, cli.json),
        Commands::Task { subcommand } => cmd::item::run_task(&root, subcommand, cli.json),
        Commands::Epic { subcommand } => {
            cmd::item::run(&root, agelum_core::types::ItemKind::Epic, subcommand, cli.json)
        }
        Commands::Idea { subcommand } => {
            cmd::item::run(&root, agelum_core::types::ItemKind::Idea, subcommand, cli.json)
        }
        Commands::Doc { subcommand } => cmd::doc::run(&root, subcommand, cli.json),
        Commands::Test { subcommand } => cmd::test::run(&root, subcommand, cli.json),
        Commands::Browser { args } => cmd::browser::run(&root, &args, cli.json),
        Commands::Repos { subcommand } => cmd::repos::run(subcommand, cli.json),
        Commands::Serve {
            host,
            port,
            no_open,
        } => cmd::serve::run(&root, &host, port, no_open),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

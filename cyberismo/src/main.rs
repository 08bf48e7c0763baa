use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use cyberismo::cli::{Cli, Commands};
use cyberismo::commands;
use cyberismo_core::project::Project;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Init(args) => commands::handle_init(&args).await,
        command => {
            let project = get_project(cli.project).await?;
            match command {
                Commands::Init(_) => unreachable!("handled above"),
                Commands::Tree => commands::handle_tree(project).await,
                Commands::List(args) => commands::handle_list(args, project).await,
                Commands::Show(args) => commands::handle_show(args, project).await,
                Commands::Create(args) => commands::handle_create(args, project).await,
                Commands::Update(args) => commands::handle_update(args, project).await,
                Commands::Rename(args) => commands::handle_rename(args, project).await,
                Commands::Remove(args) => commands::handle_remove(args, project).await,
                Commands::Validate(args) => commands::handle_validate(args, project).await,
                Commands::Usage(args) => commands::handle_usage(args, project).await,
                Commands::Card(args) => commands::handle_card(args.command, project).await,
                Commands::Module(args) => commands::handle_module(args.command, project).await,
            }
        }
    }
}

fn init_tracing(verbose: u8, quiet: bool) {
    let default_level = if quiet {
        "error"
    } else {
        match verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn get_project(flag: Option<PathBuf>) -> Result<Arc<Project>> {
    if let Some(path) = flag {
        return Project::open(&path).await.map_err(|e| {
            anyhow::anyhow!("Failed to open project at {}: {}", path.display(), e)
        });
    }

    // No --project flag: search the current directory and its parents.
    let mut dir = std::env::current_dir()?;
    loop {
        if let Ok(project) = Project::open(&dir).await {
            return Ok(project);
        }
        match dir.parent() {
            Some(parent) => dir = parent.to_path_buf(),
            None => break,
        }
    }
    Err(anyhow::anyhow!(
        "No project found in the current directory or its parents"
    ))
}

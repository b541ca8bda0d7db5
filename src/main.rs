use std::fs::{self, OpenOptions};
use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use livenote::config::{save_storage_backend, StorageBackend};
use livenote::core::services::{CreateNotebookParams, NotebookService};
use livenote::export::ExportFormat;
use livenote::model::Id;
use livenote::{util, Config, LivenoteCore};

#[derive(Parser)]
#[command(author, version, about = "Chaptered live notebooks", long_about = None)]
struct Cli {
    /// Data directory (defaults to ~/.livenote)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a notebook
    New {
        title: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// List stored notebooks, most recently updated first
    List,
    /// Show a notebook's chapters
    Show {
        id: Id,
        /// Print the whole document as JSON
        #[arg(long)]
        json: bool,
    },
    /// Append a chapter
    AddChapter {
        id: Id,
        #[arg(default_value = "")]
        title: String,
    },
    /// Rename a chapter
    RenameChapter {
        id: Id,
        chapter_id: Id,
        title: String,
    },
    /// Remove a chapter (the last one cannot be removed)
    RemoveChapter { id: Id, chapter_id: Id },
    /// Delete a notebook
    Delete { id: Id },
    /// Export a notebook to a file
    Export {
        id: Id,
        /// notebook, html, html-interactive, markdown or chapters (zip)
        #[arg(long, default_value = "notebook", value_parser = parse_format)]
        format: ExportFormat,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Import a notebook or HTML export
    Import { path: PathBuf },
    /// Remove expired clone handoff entries
    PurgeClones,
    /// Edit the config file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Select the storage backend (sqlite or key-value)
    SetBackend { backend: String },
    /// Print the config file path
    Path,
}

fn parse_format(s: &str) -> Result<ExportFormat, String> {
    ExportFormat::parse(s).ok_or_else(|| format!("unknown format '{s}'"))
}

fn init_logging() -> Result<()> {
    // Initialize logging to file (~/.livenote/logs/livenote.log)
    fs::create_dir_all(util::logs_dir())?;

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(util::log_file_path())?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(log_file)
        .with_ansi(false) // Disable ANSI colors in log file
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    util::init_data_dir(cli.data_dir);
    init_logging()?;

    if let Commands::Config { command } = &cli.command {
        return run_config(command);
    }

    let config = Config::load();
    let core = LivenoteCore::new(config)?;

    match cli.command {
        Commands::New { title, description } => {
            let notebook =
                NotebookService::create_notebook(&core, CreateNotebookParams { title, description })?;
            println!("{}", notebook.id());
        }
        Commands::List => {
            let notebooks = NotebookService::list_notebooks(&core)?;
            if notebooks.is_empty() {
                println!("No notebooks");
            }
            for summary in notebooks {
                println!(
                    "{}\t{}\t{}",
                    summary.id,
                    summary.title,
                    summary.updated_at.format("%Y-%m-%d %H:%M")
                );
            }
        }
        Commands::Show { id, json } => {
            let notebook = NotebookService::get_notebook(&core, &id)?;
            if json {
                println!("{}", notebook.to_json()?);
            } else {
                println!("{}", notebook.title);
                let active = notebook.active_chapter_id();
                for chapter in notebook.chapters() {
                    let marker = if Some(chapter.id()) == active { "*" } else { " " };
                    println!(
                        "{marker} {}\t{}\t{} cells",
                        chapter.id(),
                        chapter.title,
                        chapter.cells().len()
                    );
                }
            }
        }
        Commands::AddChapter { id, title } => {
            let chapter = NotebookService::add_chapter(&core, &id, &title)?;
            println!("{}", chapter.id());
        }
        Commands::RenameChapter {
            id,
            chapter_id,
            title,
        } => {
            NotebookService::rename_chapter(&core, &id, &chapter_id, &title)?;
        }
        Commands::RemoveChapter { id, chapter_id } => {
            NotebookService::remove_chapter(&core, &id, &chapter_id)?;
        }
        Commands::Delete { id } => {
            NotebookService::delete_notebook(&core, &id)?;
        }
        Commands::Export { id, format, out } => {
            let path = NotebookService::export_notebook(&core, &id, format, out.as_deref())?;
            println!("{}", path.display());
        }
        Commands::Import { path } => {
            let notebook = NotebookService::import_notebook(&core, &path)?;
            println!("{}", notebook.id());
        }
        Commands::PurgeClones => {
            let purged = core.purge_expired_clones()?;
            println!("{purged}");
        }
        Commands::Config { .. } => {}
    }

    Ok(())
}

fn run_config(command: &ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::SetBackend { backend } => {
            let backend = StorageBackend::parse(backend)
                .ok_or_else(|| anyhow!("unknown backend '{backend}' (sqlite or key-value)"))?;
            save_storage_backend(backend)?;
            println!("{}", backend.as_str());
        }
        ConfigCommands::Path => println!("{}", util::config_path().display()),
    }
    Ok(())
}

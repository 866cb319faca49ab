use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use pdf_folder_search_core::config::{
    DEFAULT_FAN_OUT, DEFAULT_OPENAI_DIMENSIONS, DEFAULT_OPENAI_ENDPOINT, DEFAULT_OPENAI_MODEL,
};
use pdf_folder_search_core::{
    ChunkingConfig, EmbeddingConfig, EmbeddingProvider, FailurePolicy, FolderSearch, FolderState,
    IndexOutcome, PipelineConfig, SearchResult, DEFAULT_EMBEDDING_DIMENSIONS,
};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "pdf-folder-search", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Directory whose immediate subdirectories are the selectable folders
    #[arg(long, env = "PDF_SEARCH_DATA_ROOT", default_value = ".")]
    data_root: PathBuf,

    /// Directory holding one persisted index per folder
    #[arg(long, env = "PDF_SEARCH_VECTOR_DB", default_value = "vector_db")]
    vector_db: PathBuf,

    /// Maximum chunk length in characters
    #[arg(long, default_value_t = 300)]
    chunk_size: usize,

    /// Characters shared by consecutive chunks
    #[arg(long, default_value_t = 100)]
    chunk_overlap: usize,

    /// Nearest chunks fetched per query before per-file deduplication
    #[arg(long, default_value_t = DEFAULT_FAN_OUT)]
    fan_out: usize,

    /// Embedding backend
    #[arg(long, value_enum, default_value_t = ProviderArg::Openai)]
    embedding_provider: ProviderArg,

    /// Embedding service credential
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    openai_api_key: Option<String>,

    /// Embedding model identifier recorded in every index
    #[arg(long, default_value = DEFAULT_OPENAI_MODEL)]
    embedding_model: String,

    /// Embedding vector length (defaults to the provider's native size)
    #[arg(long)]
    embedding_dimensions: Option<usize>,

    /// Base URL of an OpenAI-compatible embeddings API
    #[arg(long, default_value = DEFAULT_OPENAI_ENDPOINT)]
    embedding_endpoint: String,

    /// Per-request timeout for the embedding service
    #[arg(long, default_value_t = 60)]
    embedding_timeout_secs: u64,

    /// Leave unreadable PDFs out of the index instead of failing the build
    #[arg(long, default_value_t = false)]
    skip_unreadable: bool,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ProviderArg {
    /// Remote OpenAI embeddings
    Openai,
    /// Offline character trigram hashing
    Ngram,
}

#[derive(Subcommand)]
enum Command {
    /// List the selectable folders and whether each one is indexed.
    Folders,
    /// List the PDF files directly inside a folder.
    Files {
        #[arg(long)]
        folder: String,
    },
    /// Build the folder's index if it does not exist yet, otherwise load it.
    Index {
        #[arg(long)]
        folder: String,
    },
    /// Search a folder and print one result per matching file.
    Search {
        #[arg(long)]
        folder: String,
        #[arg(long)]
        query: String,
        /// Print results as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Pick folders and run queries in a loop.
    Interactive,
}

impl Cli {
    fn pipeline_config(&self) -> PipelineConfig {
        let (provider, native_dimensions) = match self.embedding_provider {
            ProviderArg::Openai => (EmbeddingProvider::OpenAi, DEFAULT_OPENAI_DIMENSIONS),
            ProviderArg::Ngram => (EmbeddingProvider::Ngram, DEFAULT_EMBEDDING_DIMENSIONS),
        };

        PipelineConfig {
            data_root: self.data_root.clone(),
            vector_db_root: self.vector_db.clone(),
            chunking: ChunkingConfig {
                chunk_size: self.chunk_size,
                chunk_overlap: self.chunk_overlap,
            },
            fan_out: self.fan_out,
            failure_policy: if self.skip_unreadable {
                FailurePolicy::SkipUnreadable
            } else {
                FailurePolicy::Abort
            },
            embedding: EmbeddingConfig {
                provider,
                api_key: self.openai_api_key.clone(),
                model: self.embedding_model.clone(),
                dimensions: self.embedding_dimensions.unwrap_or(native_dimensions),
                endpoint: self.embedding_endpoint.clone(),
                timeout_secs: self.embedding_timeout_secs,
                ..EmbeddingConfig::default()
            },
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();
    let config = cli.pipeline_config();
    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        data_root = %config.data_root.display(),
        vector_db = %config.vector_db_root.display(),
        "pdf-folder-search boot"
    );

    let mut search =
        FolderSearch::from_config(config).context("invalid search configuration")?;

    match cli.command {
        Command::Folders => {
            let folders = search.list_folders().context("unable to list folders")?;
            if folders.is_empty() {
                println!(
                    "no folders under {}; add a subfolder containing PDFs",
                    search.config().data_root.display()
                );
            }
            for folder in folders {
                println!("{folder}\t{}", state_label(search.state(&folder)));
            }
        }
        Command::Files { folder } => {
            let files = search.list_folder_pdfs(&folder)?;
            if files.is_empty() {
                println!("no PDF files in folder {folder}");
            }
            for file in files {
                println!("{file}");
            }
        }
        Command::Index { folder } => {
            let outcome = search.ensure_index(&folder).await?;
            report_outcome(&folder, &outcome);
        }
        Command::Search {
            folder,
            query,
            json,
        } => {
            let results = search.search(&folder, &query).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else {
                print_results(&query, &results);
            }
        }
        Command::Interactive => run_interactive(&mut search).await?,
    }

    Ok(())
}

fn state_label(state: FolderState) -> &'static str {
    match state {
        FolderState::Indexed => "indexed",
        FolderState::NotIndexed => "not indexed",
    }
}

fn report_outcome(folder: &str, outcome: &IndexOutcome) {
    match outcome {
        IndexOutcome::Built {
            documents,
            chunks,
            skipped,
        } => {
            for skipped_pdf in skipped {
                warn!(path = %skipped_pdf.path.display(), reason = %skipped_pdf.reason, "skipped pdf");
            }
            println!(
                "built index for {folder}: {documents} documents, {chunks} chunks, {} skipped",
                skipped.len()
            );
        }
        IndexOutcome::Loaded { chunks, built_at } => {
            println!(
                "loaded index for {folder}: {chunks} chunks, built {}",
                built_at.to_rfc3339()
            );
        }
        IndexOutcome::EmptyFolder => {
            println!("folder {folder} has no PDF files to index");
        }
    }
}

fn print_results(query: &str, results: &[SearchResult]) {
    println!("query: {query}");
    if results.is_empty() {
        println!("no results");
        return;
    }

    for (rank, result) in results.iter().enumerate() {
        println!("{}. {} score={:.2}", rank + 1, result.file, result.score);
        println!("   folder: {}", result.folder);
        println!("   matched: {}", result.matched_text);
    }
}

fn prompt(
    lines: &mut impl Iterator<Item = io::Result<String>>,
    label: &str,
) -> anyhow::Result<Option<String>> {
    print!("{label}> ");
    io::stdout().flush()?;
    match lines.next() {
        Some(line) => Ok(Some(line?.trim().to_string())),
        None => Ok(None),
    }
}

fn pick_folder(folders: &[String], answer: &str) -> Option<String> {
    if let Ok(number) = answer.parse::<usize>() {
        return number
            .checked_sub(1)
            .and_then(|position| folders.get(position))
            .cloned();
    }
    folders.iter().find(|folder| folder.as_str() == answer).cloned()
}

async fn run_interactive(search: &mut FolderSearch) -> anyhow::Result<()> {
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        let folders = search.list_folders().context("unable to list folders")?;
        if folders.is_empty() {
            println!(
                "no folders under {}; add a subfolder containing PDFs",
                search.config().data_root.display()
            );
            return Ok(());
        }

        println!("folders:");
        for (position, folder) in folders.iter().enumerate() {
            println!("  {}. {folder} ({})", position + 1, state_label(search.state(folder)));
        }

        let Some(answer) = prompt(&mut lines, "folder")? else {
            return Ok(());
        };
        if answer == ":quit" {
            return Ok(());
        }
        let Some(folder) = pick_folder(&folders, &answer) else {
            println!("unknown folder: {answer}");
            continue;
        };

        match search.list_folder_pdfs(&folder) {
            Ok(files) if files.is_empty() => {
                println!("no PDF files in folder {folder}");
                continue;
            }
            Ok(files) => {
                println!("PDF files in {folder}:");
                for file in files {
                    println!("  {file}");
                }
            }
            Err(error) => {
                println!("unable to read folder {folder}: {error}");
                continue;
            }
        }

        if search.state(&folder) == FolderState::NotIndexed {
            println!("building index for {folder}, this may take a while...");
        }
        match search.ensure_index(&folder).await {
            Ok(IndexOutcome::EmptyFolder) => {
                report_outcome(&folder, &IndexOutcome::EmptyFolder);
                continue;
            }
            Ok(outcome) => report_outcome(&folder, &outcome),
            Err(error) => {
                println!("unable to prepare index for {folder}: {error}");
                continue;
            }
        }

        println!("enter a query; empty line or :folders to switch folder, :quit to exit");
        loop {
            let Some(query) = prompt(&mut lines, &folder)? else {
                return Ok(());
            };
            match query.as_str() {
                ":quit" => return Ok(()),
                "" | ":folders" => break,
                _ => match search.search(&folder, &query).await {
                    Ok(results) => print_results(&query, &results),
                    Err(error) => println!("search failed: {error}"),
                },
            }
        }
    }
}

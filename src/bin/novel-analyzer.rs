//! Novel Analyzer CLI
//!
//! Usage:
//!   novel-analyzer analyze <book> [--mode quick|standard|deep] [--type genre] [--from N] [--to N]
//!   novel-analyzer resume <book>
//!   novel-analyzer checkpoint show|delete <title>
//!   novel-analyzer merge <a.json> <b.json> -o <out.json>
//!   novel-analyzer show <title>

use clap::{Parser, Subcommand};
use novel_analyzer::analysis::{
    AnalysisController, AnalysisMode, AnalysisOutcome, AnalysisRequest, AnalysisService,
    ChapterRange, LogObserver, MergeService, ModedResult, NoteWriter,
};
use novel_analyzer::{
    load_book, AnalysisError, AnalysisRecord, CheckpointStore, FileStore, HttpCompletionClient,
    ParsedBook, RecordStore, Settings,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const EXIT_CANCELLED: i32 = 130;

#[derive(Parser)]
#[command(
    name = "novel-analyzer",
    version,
    about = "Staged literary analysis of novels through a text-completion service"
)]
struct Cli {
    /// Path to the YAML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a book (JSON or plain text)
    Analyze {
        book: PathBuf,
        /// quick, standard or deep
        #[arg(long, default_value = "standard")]
        mode: AnalysisMode,
        /// Genre, used to tailor the prompts
        #[arg(long = "type", default_value = "")]
        novel_type: String,
        /// First chapter index to analyze
        #[arg(long)]
        from: Option<usize>,
        /// Last chapter index to analyze (inclusive)
        #[arg(long)]
        to: Option<usize>,
    },
    /// Continue an interrupted analysis from its checkpoint
    Resume { book: PathBuf },
    /// Inspect or remove checkpoints
    Checkpoint {
        #[command(subcommand)]
        action: CheckpointAction,
    },
    /// Merge two stored analysis records into one file
    Merge {
        a: PathBuf,
        b: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Print the stored analysis record for a title
    Show { title: String },
}

#[derive(Subcommand)]
enum CheckpointAction {
    /// Print the checkpoint for a title
    Show { title: String },
    /// Delete the checkpoint for a title
    Delete { title: String },
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

/// Stores rooted at the configured data directory
struct Workspace {
    files: Arc<FileStore>,
    checkpoints: CheckpointStore,
    records: RecordStore,
}

fn open_workspace(settings: &Settings) -> Result<Workspace, String> {
    let dir = settings.data_dir();
    let files = Arc::new(
        FileStore::open(&dir)
            .map_err(|e| format!("cannot open data directory {}: {}", dir.display(), e))?,
    );
    Ok(Workspace {
        checkpoints: CheckpointStore::new(files.clone()),
        records: RecordStore::new(files.clone()),
        files,
    })
}

fn build_service(settings: &Settings, workspace: &Workspace) -> Result<AnalysisService, String> {
    let client = HttpCompletionClient::new(settings.http_config())
        .map_err(|e| format!("cannot create completion client: {}", e))?;
    let mut service = AnalysisService::new(Arc::new(client), settings.completion.model.clone())
        .with_limits(settings.chunk_limits())
        .with_checkpoints(workspace.checkpoints.clone())
        .with_observer(Arc::new(LogObserver));
    if settings.write_notes {
        service = service.with_notes(NoteWriter::new(workspace.files.clone()));
    }
    Ok(service)
}

fn load(path: &Path) -> Result<ParsedBook, String> {
    load_book(path).map_err(|e| format!("cannot load {}: {}", path.display(), e))
}

/// Run a future on a fresh runtime with Ctrl-C wired to `controller.stop()`
fn block_on_analysis<F>(controller: &AnalysisController, fut: F) -> Result<AnalysisOutcome, AnalysisError>
where
    F: std::future::Future<Output = Result<AnalysisOutcome, AnalysisError>>,
{
    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| AnalysisError::Internal(format!("failed to create tokio runtime: {}", e)))?;
    rt.block_on(async {
        let handle = controller.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("Stopping after the current stage...");
                handle.stop();
            }
        });
        fut.await
    })
}

fn finish(
    settings: &Settings,
    workspace: &Workspace,
    title: &str,
    result: Result<AnalysisOutcome, AnalysisError>,
) -> i32 {
    let outcome = match result {
        Ok(o) => o,
        Err(e) if e.is_cancelled() => {
            eprintln!("Analysis stopped. Run `novel-analyzer resume` to continue.");
            return EXIT_CANCELLED;
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    match workspace
        .records
        .merge_into_record(title, &outcome, &MergeService::new())
    {
        Ok(record) => println!(
            "Saved analysis of '{}' ({} range(s)) under {}",
            title,
            record.ranges.len(),
            settings.data_dir().join(RecordStore::key_for(title)).display()
        ),
        Err(e) => {
            eprintln!("Error: cannot save analysis record: {}", e);
            return 1;
        }
    }

    if outcome.is_complete() {
        0
    } else {
        let failed: Vec<&str> = outcome.failed_stages.iter().map(|s| s.id()).collect();
        eprintln!(
            "Stages failed: {}. Run `novel-analyzer resume` to retry them.",
            failed.join(", ")
        );
        1
    }
}

fn cmd_analyze(
    settings: &Settings,
    book_path: &Path,
    mode: AnalysisMode,
    novel_type: &str,
    from: Option<usize>,
    to: Option<usize>,
) -> i32 {
    let book = match load(book_path) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let (workspace, service) = match open_workspace(settings)
        .and_then(|w| build_service(settings, &w).map(|s| (w, s)))
    {
        Ok(pair) => pair,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    let mut request = AnalysisRequest::new(settings.analysis_config(mode, novel_type))
        .with_book_path(book_path.display().to_string());
    if from.is_some() || to.is_some() {
        let last = book.chapter_count().saturating_sub(1);
        request = request.with_range(ChapterRange::new(from.unwrap_or(0), to.unwrap_or(last)));
    }

    let controller = AnalysisController::new();
    let result = block_on_analysis(&controller, service.analyze(&book, request, &controller));
    finish(settings, &workspace, book.title(), result)
}

fn cmd_resume(settings: &Settings, book_path: &Path) -> i32 {
    let book = match load(book_path) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let (workspace, service) = match open_workspace(settings)
        .and_then(|w| build_service(settings, &w).map(|s| (w, s)))
    {
        Ok(pair) => pair,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let controller = AnalysisController::new();
    let result = block_on_analysis(&controller, service.resume(&book, &controller));
    finish(settings, &workspace, book.title(), result)
}

fn cmd_checkpoint(settings: &Settings, action: CheckpointAction) -> i32 {
    let workspace = match open_workspace(settings) {
        Ok(w) => w,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    match action {
        CheckpointAction::Show { title } => match workspace.checkpoints.get(&title) {
            Some(cp) => {
                let stages: Vec<&str> = cp.completed_stages.iter().map(|s| s.id()).collect();
                println!("Book:      {} ({})", cp.book_title, cp.book_path);
                println!("Mode:      {}", cp.config.mode);
                if let Some(r) = cp.chapter_range {
                    println!("Chapters:  {}..={}", r.start, r.end);
                }
                println!("Completed: {}", stages.join(", "));
                if let Some(stage) = cp.current_stage {
                    println!("Last:      {}", stage);
                }
                println!("Updated:   {}", cp.updated_at.to_rfc3339());
                0
            }
            None => {
                eprintln!("No checkpoint for '{}'", title);
                1
            }
        },
        CheckpointAction::Delete { title } => {
            if workspace.checkpoints.delete(&title) {
                println!("Deleted checkpoint for '{}'", title);
                0
            } else {
                eprintln!("No checkpoint for '{}'", title);
                1
            }
        }
    }
}

fn read_record(path: &Path) -> Result<AnalysisRecord, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
    serde_json::from_str(&text).map_err(|e| format!("invalid record {}: {}", path.display(), e))
}

fn cmd_merge(a: &Path, b: &Path, output: &Path) -> i32 {
    let records = match read_record(a).and_then(|ra| read_record(b).map(|rb| (ra, rb))) {
        Ok(pair) => pair,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let inputs: Vec<ModedResult> = vec![records.0.into(), records.1.into()];
    let merged = match MergeService::new().merge_all(inputs) {
        Some(m) => AnalysisRecord::from(m),
        None => {
            eprintln!("Error: nothing to merge");
            return 1;
        }
    };
    let written = serde_json::to_string_pretty(&merged)
        .map_err(|e| e.to_string())
        .and_then(|json| std::fs::write(output, json).map_err(|e| e.to_string()));
    match written {
        Ok(()) => {
            println!("Wrote merged analysis to {}", output.display());
            0
        }
        Err(e) => {
            eprintln!("Error: cannot write {}: {}", output.display(), e);
            1
        }
    }
}

fn cmd_show(settings: &Settings, title: &str) -> i32 {
    let workspace = match open_workspace(settings) {
        Ok(w) => w,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    match workspace.records.load(title) {
        Ok(Some(record)) => match serde_json::to_string_pretty(&record) {
            Ok(json) => {
                println!("{}", json);
                0
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                1
            }
        },
        Ok(None) => {
            eprintln!("No analysis stored for '{}'", title);
            1
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let settings = match Settings::load_or_default(cli.config.as_deref()) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let code = match cli.command {
        Commands::Analyze {
            book,
            mode,
            novel_type,
            from,
            to,
        } => cmd_analyze(&settings, &book, mode, &novel_type, from, to),
        Commands::Resume { book } => cmd_resume(&settings, &book),
        Commands::Checkpoint { action } => cmd_checkpoint(&settings, action),
        Commands::Merge { a, b, output } => cmd_merge(&a, &b, &output),
        Commands::Show { title } => cmd_show(&settings, &title),
    };
    std::process::exit(code);
}

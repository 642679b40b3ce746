use std::path::PathBuf;

use clap::{Parser, Subcommand};

use paperscope_core::{
    API_URL_ENV, AnalysisKind, ApiClient, Config, ExportFormat, ExportTarget, ExtractionKind, PaperId, Session,
};

mod commands;
mod output;

use output::Painter;

/// Paperscope: upload research papers, run extractions and build visualizations
/// against a paper analysis service.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Backend base URL (overrides the config file and PAPERSCOPE_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Config file (default: <config dir>/paperscope/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Log verbosity: -v for info, -vv for debug
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check that the backend is up
    Health,
    /// List papers known to the backend
    List,
    /// Show one paper's metadata
    Info { paper_id: String },
    /// List the available extraction types
    Kinds,
    /// Upload PDF files
    Upload {
        #[arg(required = true)]
        pdfs: Vec<PathBuf>,
    },
    /// Run one extraction against a paper
    Extract {
        paper_id: String,
        /// Extraction type, e.g. contributions, experiments, future-work
        kind: ExtractionKind,
        /// Print the raw items as JSON
        #[arg(long)]
        json: bool,
    },
    /// Ask a free-form question about one paper
    Ask { paper_id: String, question: String },
    /// Aggregate contributions, experiments, patterns or gaps across papers
    Analyze {
        /// contributions, experiments, patterns or gaps
        kind: AnalysisKind,
        /// Paper to include (repeatable)
        #[arg(long = "paper", required = true)]
        papers: Vec<String>,
        /// Print the report rows as JSON
        #[arg(long)]
        json: bool,
    },
    /// Generate a visualization across papers and save it as a sandboxed HTML page
    Visualize {
        query: String,
        /// Paper to include (repeatable)
        #[arg(long = "paper", required = true)]
        papers: Vec<String>,
        #[arg(long, default_value = "visualization.html")]
        out: PathBuf,
        /// Also print the sampled contributions the visualization was built from
        #[arg(long)]
        verify: bool,
    },
    /// Download an export of a paper's extracted data
    Export {
        paper_id: String,
        /// contributions, experiments or all
        target: ExportTarget,
        /// json, csv or markdown
        #[arg(long, default_value = "json")]
        format: ExportFormat,
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(args: &Args) -> anyhow::Result<Config> {
    // CLI flags > env vars > config file > defaults
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => {
            let default_path = dirs::config_dir().map(|d| d.join("paperscope").join("config.toml"));
            Config::load_or_default(default_path.as_deref())?
        }
    };
    config.override_api_url(std::env::var(API_URL_ENV).ok());
    config.override_api_url(args.api_url.clone());
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    init_logging(args.verbose);

    let config = load_config(&args)?;
    tracing::info!(api_url = %config.api_url, "using backend");
    let mut session = Session::new(ApiClient::new(config.api_url.clone()), &config);
    let p = Painter::new(!args.no_color);

    match args.command {
        Command::Health => commands::health(&session, p).await,
        Command::List => commands::list(&mut session, p).await,
        Command::Info { paper_id } => commands::info(&session, &PaperId::from(paper_id), p).await,
        Command::Kinds => {
            commands::kinds(p);
            Ok(())
        }
        Command::Upload { pdfs } => commands::upload(&mut session, &pdfs, p).await,
        Command::Extract {
            paper_id,
            kind,
            json,
        } => commands::extract(&mut session, PaperId::from(paper_id), kind, json, p).await,
        Command::Ask { paper_id, question } => {
            commands::ask(&session, PaperId::from(paper_id), &question, p).await
        }
        Command::Analyze { kind, papers, json } => {
            let ids: Vec<PaperId> = papers.into_iter().map(PaperId::from).collect();
            commands::analyze(&session, kind, &ids, json, p).await
        }
        Command::Visualize {
            query,
            papers,
            out,
            verify,
        } => {
            let ids: Vec<PaperId> = papers.into_iter().map(PaperId::from).collect();
            commands::visualize(&mut session, &query, &ids, &out, verify, p).await
        }
        Command::Export {
            paper_id,
            target,
            format,
            out_dir,
        } => commands::export(&session, PaperId::from(paper_id), target, format, &out_dir, p).await,
    }
}

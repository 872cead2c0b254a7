pub mod cache;
pub mod chart;
pub mod config;
pub mod extract;
pub mod highlight;
pub mod model;
pub mod paginator;
pub mod protocol;
pub mod service;
pub mod session;
pub mod ui;

use anyhow::{Context, Result, bail};
use clap::{CommandFactory, Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use config::ClientConfig;
use highlight::Markup;
use service::HttpSearchService;
use session::{ResultsView, SearchSession, SessionOptions, SubmitOutcome};

/// Command-line interface.
#[derive(Parser, Debug)]
#[command(
    name = "subsearch",
    version,
    about = "Search video transcript archives from the terminal"
)]
pub struct Cli {
    /// Config file (defaults to config.toml in the platform config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Search server URL, overriding config and environment
    #[arg(long, global = true)]
    pub server: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Launch interactive TUI (default)
    Tui {
        /// Load archives, render once and exit
        #[arg(long, default_value_t = false)]
        once: bool,
    },
    /// List searchable archives
    Archives {
        #[arg(long)]
        json: bool,
    },
    /// Run one search and print a page of results
    Search {
        pattern: String,

        /// Archive to search (defaults to config, then the first listed)
        #[arg(long)]
        archive: Option<String>,

        /// 1-based page to print
        #[arg(long, default_value_t = 1)]
        page: usize,

        /// Print the page as JSON
        #[arg(long)]
        json: bool,
    },
    /// Write clip-extraction commands for every match of a search
    Export {
        pattern: String,

        #[arg(long)]
        archive: Option<String>,

        /// Output file (stdout when omitted)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Generate shell completions to stdout
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate man page to stdout
    Man,
}

impl Cli {
    pub fn is_tui(&self) -> bool {
        matches!(self.command, None | Some(Commands::Tui { .. }))
    }
}

/// Install the global subscriber. The TUI owns the terminal, so it logs to a
/// daily file under the data dir; everything else logs to stderr.
pub fn init_logging(cli: &Cli) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("subsearch=info"));

    if cli.is_tui() {
        let dir = config::default_data_dir().join("logs");
        if let Err(e) = std::fs::create_dir_all(&dir) {
            eprintln!("logging disabled: cannot create {}: {e}", dir.display());
            return None;
        }
        let appender = tracing_appender::rolling::daily(dir, "subsearch.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(writer)
            .with_ansi(false)
            .try_init();
        Some(guard)
    } else {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init();
        None
    }
}

pub async fn run(cli: Cli) -> Result<()> {
    match &cli.command {
        Some(Commands::Completions { shell }) => {
            let mut cmd = Cli::command();
            clap_complete::generate(*shell, &mut cmd, "subsearch", &mut std::io::stdout());
            return Ok(());
        }
        Some(Commands::Man) => {
            let cmd = Cli::command();
            let man = clap_mangen::Man::new(cmd);
            let mut out = std::io::stdout();
            man.render(&mut out)?;
            return Ok(());
        }
        _ => {}
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        built = option_env!("VERGEN_BUILD_TIMESTAMP").unwrap_or("unknown"),
        target = option_env!("VERGEN_CARGO_TARGET_TRIPLE").unwrap_or("unknown"),
        "starting"
    );
    let mut config = ClientConfig::load(cli.config.as_deref()).context("loading configuration")?;
    if let Some(server) = cli.server {
        config.server_url = server;
        config.validate().context("invalid --server")?;
    }
    let columns = crossterm::terminal::size().ok().map(|(cols, _)| cols);

    match cli.command.unwrap_or(Commands::Tui { once: false }) {
        Commands::Tui { once } => {
            let mut session = open_session(&config, Markup::TERMINAL, columns)?;
            let export_dir = config
                .export_dir
                .clone()
                .unwrap_or_else(|| config::default_data_dir().join("exports"));
            ui::tui::run_tui(
                &mut session,
                config.default_archive.as_deref(),
                export_dir,
                once,
            )
            .await
        }
        Commands::Archives { json } => {
            let mut session = open_session(&config, Markup::PLAIN, columns)?;
            session.load_archives(None).await?;
            let mut out = std::io::stdout().lock();
            if json {
                serde_json::to_writer_pretty(&mut out, session.archives())?;
                writeln!(out)?;
            } else {
                for archive in session.archives() {
                    writeln!(out, "{}", archive.name)?;
                }
            }
            Ok(())
        }
        Commands::Search {
            pattern,
            archive,
            page,
            json,
        } => {
            let markup = if json { Markup::HTML } else { Markup::PLAIN };
            let mut session = open_session(&config, markup, columns)?;
            let preferred = config.default_archive.as_deref();
            if !search_once(&mut session, archive.as_deref(), preferred, &pattern).await? {
                if json {
                    println!("null");
                } else {
                    println!("No results");
                }
                return Ok(());
            }
            if page == 0 {
                bail!("pages are numbered from 1");
            }
            session.select_page(page - 1)?;
            let view = session
                .view()
                .context("search produced no result to display")?;
            let mut out = std::io::stdout().lock();
            if json {
                serde_json::to_writer_pretty(&mut out, &view)?;
                writeln!(out)?;
            } else {
                print_view(&mut out, &view)?;
            }
            Ok(())
        }
        Commands::Export {
            pattern,
            archive,
            output,
        } => {
            let mut session = open_session(&config, Markup::PLAIN, columns)?;
            let preferred = config.default_archive.as_deref();
            let doc = if search_once(&mut session, archive.as_deref(), preferred, &pattern).await? {
                session.export_document().unwrap_or_default()
            } else {
                String::new()
            };
            match output {
                Some(path) => std::fs::write(&path, doc)
                    .with_context(|| format!("writing {}", path.display()))?,
                None => std::io::stdout().lock().write_all(doc.as_bytes())?,
            }
            Ok(())
        }
        Commands::Completions { .. } | Commands::Man => Ok(()),
    }
}

/// Session over the configured HTTP service.
pub fn open_session(
    config: &ClientConfig,
    markup: Markup,
    columns: Option<u16>,
) -> Result<SearchSession<HttpSearchService>> {
    let service = HttpSearchService::new(config.service_config())?;
    let options = SessionOptions {
        segment_width: config.segment_width_for(columns),
        clip: config.clip.clone(),
        markup,
    };
    Ok(SearchSession::new(service, options))
}

/// Load archives, select one and run `pattern`. An explicit `archive` must
/// be listed; `preferred` falls back to the first archive. Returns `false`
/// when the server had no matches.
async fn search_once(
    session: &mut SearchSession<HttpSearchService>,
    archive: Option<&str>,
    preferred: Option<&str>,
    pattern: &str,
) -> Result<bool> {
    session.load_archives(archive.or(preferred)).await?;
    if let Some(name) = archive {
        session.set_context(name)?;
    }
    match session.submit(pattern).await? {
        SubmitOutcome::Ready { .. } => Ok(true),
        SubmitOutcome::Empty => Ok(false),
        SubmitOutcome::NoContext => Err(session::SessionError::NoArchiveContext.into()),
        SubmitOutcome::Duplicate | SubmitOutcome::Superseded => {
            bail!("query was not applied")
        }
    }
}

fn print_view(out: &mut impl Write, view: &ResultsView) -> std::io::Result<()> {
    let pages = view.page_labels.len().max(1);
    writeln!(
        out,
        "{} results for \"{}\" in {} (page {}/{})",
        view.count,
        view.pattern,
        view.archive,
        view.selected_page + 1,
        pages
    )?;
    for group in &view.groups {
        writeln!(out)?;
        writeln!(
            out,
            "{} • {} • {}",
            group.upload_date, group.title, group.video_id
        )?;
        for row in &group.rows {
            writeln!(out, "  {}  {}  {}", row.timestamp, row.marked_text, row.url)?;
        }
    }
    Ok(())
}

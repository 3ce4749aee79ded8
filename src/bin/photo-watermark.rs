use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process;

use clap::{Args, Parser, Subcommand};

use photo_watermark::export::save_composite;
use photo_watermark::{
    delete_confirmed, Anchor, Config, FileRemoval, HistoryStore, Opacity, Result, Session,
};

#[derive(Parser)]
#[command(
    name = "photo-watermark",
    about = "Stamp a semi-transparent watermark onto photos and keep a history of exports",
    version,
    after_help = "Simple usage: photo-watermark apply <image> <logo.png> --opacity 60 --anchor bottom-right\n\n\
                  Settings are read from ./photo-watermark.toml when present."
)]
struct Cli {
    /// Settings file (default: ./photo-watermark.toml if it exists)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory exported images are written to
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    /// History database file
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all non-error output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Watermark an image, save it to the output directory and record it
    Apply {
        /// Photo to watermark (PNG or JPEG)
        image: PathBuf,
        /// Watermark image (PNG)
        watermark: PathBuf,
        #[command(flatten)]
        controls: Controls,
    },
    /// Render a 300x300 preview without recording anything
    Preview {
        /// Photo to watermark (PNG or JPEG)
        image: PathBuf,
        /// Watermark image (PNG)
        watermark: PathBuf,
        /// Where to write the preview
        #[arg(short, long, default_value = "preview.png")]
        output: PathBuf,
        #[command(flatten)]
        controls: Controls,
    },
    /// Browse or delete exported images
    History {
        #[command(subcommand)]
        command: HistoryCommand,
    },
}

#[derive(Subcommand)]
enum HistoryCommand {
    /// List exports, newest first
    List,
    /// Delete an exported image and its history entries
    Delete {
        /// Exported file (a bare name is looked up in the output directory)
        file: String,
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },
    /// Drop entries whose file no longer exists
    Prune,
}

#[derive(Args)]
struct Controls {
    /// Watermark opacity in percent
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
    opacity: Option<u8>,

    /// Corner to place the watermark in (top-left, top-right, bottom-left, bottom-right)
    #[arg(short, long)]
    anchor: Option<Anchor>,
}

impl Controls {
    fn resolve(&self, config: &Config) -> Result<(Opacity, Anchor)> {
        let opacity = Opacity::from_percent(self.opacity.unwrap_or(config.opacity))?;
        Ok((opacity, self.anchor.unwrap_or(config.anchor)))
    }
}

fn init_logger(verbose: bool, quiet: bool) {
    let level = if quiet {
        log::LevelFilter::Error
    } else if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Warn
    };

    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format(|buf, record| {
            let style = buf.default_level_style(record.level());
            writeln!(
                buf,
                "[{} {style}{}{style:#}] {}",
                chrono::Local::now().format("%H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logger(cli.verbose, cli.quiet);

    match run(&cli) {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}

/// Returns `Ok(false)` when the command ran but did not fully succeed.
fn run(cli: &Cli) -> Result<bool> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(dir) = &cli.output_dir {
        config.output_dir.clone_from(dir);
    }
    if let Some(db) = &cli.db {
        config.db_path.clone_from(db);
    }

    match &cli.command {
        Command::Apply {
            image,
            watermark,
            controls,
        } => {
            let session = new_session(image, watermark, controls, &config)?;
            let store = HistoryStore::open(&config.db_path)?;
            let outcome = session.export(&store, &config.output_dir)?;
            if !cli.quiet {
                eprintln!(
                    "[OK] Watermark applied! Saved at: {}",
                    outcome.output_path.display()
                );
            }
            Ok(true)
        }
        Command::Preview {
            image,
            watermark,
            output,
            controls,
        } => {
            let mut session = new_session(image, watermark, controls, &config)?;
            if let Err(e) = session.refresh_preview() {
                log::warn!("preview not updated: {e}");
                return Ok(false);
            }
            if let Some(preview) = session.preview() {
                save_composite(preview, output)?;
                if !cli.quiet {
                    eprintln!("[OK] Preview written to {}", output.display());
                }
            }
            Ok(true)
        }
        Command::History { command } => {
            let store = HistoryStore::open(&config.db_path)?;
            run_history(command, &store, &config, cli.quiet)
        }
    }
}

fn new_session(
    image: &Path,
    watermark: &Path,
    controls: &Controls,
    config: &Config,
) -> Result<Session> {
    let (opacity, anchor) = controls.resolve(config)?;
    let mut session = Session::new(opacity, anchor);
    session.select_image(image)?;
    session.select_watermark(watermark)?;
    Ok(session)
}

fn run_history(
    command: &HistoryCommand,
    store: &HistoryStore,
    config: &Config,
    quiet: bool,
) -> Result<bool> {
    match command {
        HistoryCommand::List => {
            let records = store.list()?;
            if records.is_empty() {
                if !quiet {
                    eprintln!("No exports yet.");
                }
                return Ok(true);
            }
            for record in &records {
                let status = if record.file_exists() { "" } else { "  (missing)" };
                println!("{}  {}{status}", record.timestamp, record.display_name());
            }
            Ok(true)
        }
        HistoryCommand::Delete { file, yes } => {
            let file_name = resolve_history_name(file, &config.output_dir);
            let report = delete_confirmed(store, &file_name, |name| *yes || ask_confirmation(name))?;
            let Some(report) = report else {
                if !quiet {
                    eprintln!("Cancelled.");
                }
                return Ok(true);
            };

            if let FileRemoval::Failed(e) = &report.file {
                eprintln!("[FAIL] Failed to delete {file_name}: {e}");
                return Ok(false);
            }
            if !quiet {
                eprintln!(
                    "[OK] Deleted {file_name} ({} history entr{})",
                    report.records_removed,
                    if report.records_removed == 1 { "y" } else { "ies" }
                );
            }
            Ok(true)
        }
        HistoryCommand::Prune => {
            let removed = store.prune_missing()?;
            if !quiet {
                eprintln!("[OK] Removed {removed} dangling entr{}", if removed == 1 { "y" } else { "ies" });
            }
            Ok(true)
        }
    }
}

/// A bare file name refers to an export in the output directory.
fn resolve_history_name(file: &str, output_dir: &Path) -> String {
    let path = Path::new(file);
    let is_bare = path
        .parent()
        .is_none_or(|p| p.as_os_str().is_empty());
    if is_bare {
        output_dir.join(path).to_string_lossy().into_owned()
    } else {
        file.to_string()
    }
}

fn ask_confirmation(file_name: &str) -> bool {
    eprint!("Are you sure you want to delete '{file_name}'? [y/N] ");
    let _ = io::stderr().flush();

    let mut answer = String::new();
    if io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

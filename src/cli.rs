//! Command-line drivers over the library operations.
//!
//! Each subcommand is a thin wrapper that loads the library, performs one
//! catalog operation and propagates success or failure to the process exit
//! code.

use std::io::{self, Write};
use std::path::PathBuf;

use clap::Parser;
use log::{info, warn};
use thiserror::Error;

use crate::commands::{self, CommandContext, CommandOutcome};
use crate::config::{default_config_file, Config, ConfigError};
use crate::display::DisplayLayout;
use crate::library::{LibraryError, MediaLibrary, LIBRARY_PLAYLIST};
use crate::metadata_tags::{self, TagUpdates};
use crate::query::Query;
use crate::record::{MetaField, MetaRecord};
use crate::sort::SortOrder;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Library(#[from] LibraryError),
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("'{0}' is not in the database")]
    NotFound(String),
    #[error("{0}")]
    Tagging(String),
    #[error("no tag values given; nothing to do")]
    NothingToTag,
    #[error("script line {line}: {message} (code {code})")]
    Script {
        line: usize,
        code: u32,
        message: String,
    },
}

#[derive(Parser)]
#[command(name = "tunedeck", about = "Terminal music-library manager")]
pub struct Cli {
    /// Config file location (defaults to the platform config directory).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
pub enum Command {
    /// Create the database file and playlist directory
    Init,
    /// Recursively catalog audio files under the given directories
    Add {
        /// Directories to scan
        #[arg(required = true)]
        dirs: Vec<PathBuf>,
    },
    /// Show raw, sanitized and catalogued metadata for files
    Check {
        /// Files to inspect
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Remove an entry from the database
    Rm {
        /// Catalogued path or URL
        path: String,
    },
    /// Write tag values into files and refresh their database entries
    Tag {
        /// Files to re-tag
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[arg(long)]
        artist: Option<String>,
        #[arg(long)]
        album: Option<String>,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        track: Option<u32>,
        #[arg(long)]
        year: Option<u32>,
        #[arg(long)]
        genre: Option<String>,
        #[arg(long)]
        comment: Option<String>,
    },
    /// Re-extract metadata for catalogued files that changed on disk
    Update,
    /// Dump the database as CSV on stdout
    Dump,
    /// Run a file of interactive commands, stopping at the first failure
    Exec {
        /// Script file, one command per line ('#' starts a comment)
        script: PathBuf,
    },
}

pub fn run(cli: Cli) -> Result<(), CliError> {
    let config_file = cli.config.unwrap_or_else(default_config_file);
    let config = Config::load(&config_file)?;

    match cli.command {
        Command::Init => {
            MediaLibrary::setup_files(&config.db_file, &config.playlist_dir)?;
            println!("database: {}", config.db_file.display());
            println!("playlists: {}", config.playlist_dir.display());
            Ok(())
        }
        Command::Add { dirs } => {
            let mut library = MediaLibrary::load(&config.db_file, &config.playlist_dir)?;
            let summary = library.scan_dirs(&dirs);
            library.save_database()?;
            println!(
                "{} added, {} updated, {} removed, {} skipped",
                summary.added, summary.updated, summary.removed, summary.skipped
            );
            Ok(())
        }
        Command::Check { files } => {
            let library = MediaLibrary::load(&config.db_file, &config.playlist_dir)?;
            let stdout = io::stdout();
            let mut out = stdout.lock();
            for path in files {
                check_file(&library, &path, &mut out)?;
            }
            Ok(())
        }
        Command::Rm { path } => {
            let mut library = MediaLibrary::load(&config.db_file, &config.playlist_dir)?;
            if !library.remove_record(&path) {
                return Err(CliError::NotFound(path));
            }
            library.save_database()?;
            info!("removed '{}'", path);
            Ok(())
        }
        Command::Tag {
            files,
            artist,
            album,
            title,
            track,
            year,
            genre,
            comment,
        } => {
            let updates = TagUpdates {
                artist,
                album,
                title,
                track,
                year,
                genre,
                comment,
            };
            if updates.is_empty() {
                return Err(CliError::NothingToTag);
            }
            let mut library = MediaLibrary::load(&config.db_file, &config.playlist_dir)?;
            for path in files {
                metadata_tags::write_tags(&path, &updates).map_err(CliError::Tagging)?;
                refresh_entry(&mut library, &path);
            }
            library.save_database()?;
            Ok(())
        }
        Command::Update => {
            let mut library = MediaLibrary::load(&config.db_file, &config.playlist_dir)?;
            let summary = library.rescan_files();
            library.save_database()?;
            println!(
                "{} updated, {} removed, {} skipped",
                summary.updated, summary.removed, summary.skipped
            );
            Ok(())
        }
        Command::Dump => {
            let library = MediaLibrary::load(&config.db_file, &config.playlist_dir)?;
            let stdout = io::stdout();
            library.export_csv(&mut stdout.lock())?;
            Ok(())
        }
        Command::Exec { script } => {
            let mut library = MediaLibrary::load(&config.db_file, &config.playlist_dir)?;
            exec_script(&mut library, &config, &script)
        }
    }
}

/// Executes a command script line by line. Any failing command aborts the
/// rest of the file, reporting the line and the command's numeric code.
fn exec_script(
    library: &mut MediaLibrary,
    config: &Config,
    script: &std::path::Path,
) -> Result<(), CliError> {
    let text = std::fs::read_to_string(script)?;

    let mut query = Query::new(config.match_filename);
    let mut sort_order = SortOrder::default();
    let mut display = DisplayLayout::default();
    let mut yank_buffer = Vec::new();
    let mut viewed = LIBRARY_PLAYLIST;

    for (line_number, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut ctx = CommandContext {
            library: &mut *library,
            viewed,
            query: &mut query,
            sort_order: &mut sort_order,
            display: &mut display,
            yank_buffer: &mut yank_buffer,
        };
        match commands::execute(&mut ctx, line) {
            Ok(CommandOutcome::Quit) => return Ok(()),
            Ok(CommandOutcome::Message(message)) => {
                viewed = ctx.viewed;
                if !message.is_empty() {
                    println!("{message}");
                }
            }
            Err(err) => {
                return Err(CliError::Script {
                    line: line_number + 1,
                    code: err.code(),
                    message: err.to_string(),
                });
            }
        }
    }
    Ok(())
}

/// Re-extracts one file after its tags were rewritten, updating the record
/// in place when catalogued and appending it otherwise.
fn refresh_entry(library: &mut MediaLibrary, path: &std::path::Path) {
    let filename = path.to_string_lossy().into_owned();
    match metadata_tags::extract_record(path) {
        Some(fresh) => match library.find_record(&filename) {
            Some(record_ref) => *record_ref.borrow_mut() = fresh,
            None => {
                // add_record cannot refuse: we just failed to find it.
                let _ = library.add_record(fresh);
            }
        },
        None => warn!("{}: still no usable metadata after tagging", filename),
    }
}

fn print_record(label: &str, record: &MetaRecord, out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "  {label}:")?;
    for field in MetaField::TEXT_FIELDS {
        if let Some(value) = record.field(field) {
            writeln!(out, "    {:8} {}", field.name(), value)?;
        }
    }
    Ok(())
}

fn check_file(
    library: &MediaLibrary,
    path: &std::path::Path,
    out: &mut impl Write,
) -> io::Result<()> {
    writeln!(out, "{}:", path.display())?;

    match metadata_tags::extract_record_raw(path) {
        Some(raw) => {
            print_record("raw", &raw, out)?;
            let mut sanitized = raw;
            sanitized.sanitize();
            print_record("sanitized", &sanitized, out)?;
        }
        None => writeln!(out, "  no usable metadata")?,
    }

    match library.find_record(&path.to_string_lossy()) {
        Some(record_ref) => print_record("database", &record_ref.borrow(), out)?,
        None => writeln!(out, "  not in the database")?,
    }
    Ok(())
}

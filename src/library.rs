//! The media library: record store, playlists and their on-disk homes.
//!
//! The library owns every playlist. Slot 0 is the Library pseudo-playlist,
//! whose file vector doubles as the record store; slot 1 is the
//! Filter-results pseudo-playlist, overwritten by each new filter. Both are
//! excluded from removal and from in-place saving.

use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::UNIX_EPOCH;

use log::{debug, info, warn};
use thiserror::Error;

use crate::db::{self, DatabaseError};
use crate::metadata_tags;
use crate::playlist::{Playlist, PlaylistError};
use crate::record::{self, MetaRecord, RecordRef};

pub const LIBRARY_PLAYLIST: usize = 0;
pub const FILTER_PLAYLIST: usize = 1;
const PSEUDO_PLAYLISTS: usize = 2;

pub const PLAYLIST_EXTENSION: &str = "playlist";

const SUPPORTED_AUDIO_EXTENSIONS: [&str; 7] = ["mp3", "wav", "ogg", "flac", "aac", "m4a", "mp4"];

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error(transparent)]
    Database(#[from] DatabaseError),
    #[error(transparent)]
    Playlist(#[from] PlaylistError),
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("'{0}' is a pseudo-playlist and cannot be removed")]
    PseudoPlaylistRemoval(String),
    #[error("'{0}' is already in the database")]
    DuplicateRecord(String),
    #[error("existing file {0} is not a recognizable database; refusing to touch it")]
    UnrecognizedDatabase(PathBuf),
}

/// Counters reported by a directory scan or rescan pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScanSummary {
    pub added: usize,
    pub updated: usize,
    pub removed: usize,
    pub skipped: usize,
}

pub struct MediaLibrary {
    playlists: Vec<Playlist>,
    db_file: PathBuf,
    playlist_dir: PathBuf,
}

impl MediaLibrary {
    /// Loads the database and every playlist file under `playlist_dir`.
    ///
    /// Playlist entries missing from the database are repaired with stub
    /// records (warned, not rejected). Every playlist comes up clean: a
    /// fresh load has no unsaved changes by definition, even though stub
    /// repair technically mutated the store.
    pub fn load(db_file: &Path, playlist_dir: &Path) -> Result<MediaLibrary, LibraryError> {
        let records = db::read_database(db_file)?;
        let mut store: Vec<RecordRef> = records.into_iter().map(record::share).collect();

        let mut user_playlists = Vec::new();
        for path in playlist_files(playlist_dir)? {
            let (playlist, warnings) = Playlist::load(&path, &mut store)?;
            for warning in warnings {
                warn!("{}: {}", path.display(), warning);
            }
            user_playlists.push(playlist);
        }

        let mut library_view = Playlist::new("Library");
        *library_view.files_mut() = store;

        let mut playlists = Vec::with_capacity(PSEUDO_PLAYLISTS + user_playlists.len());
        playlists.push(library_view);
        playlists.push(Playlist::new("Filter results"));
        playlists.extend(user_playlists);

        for playlist in &mut playlists {
            playlist.needs_saving = false;
        }

        info!(
            "library loaded: {} records, {} playlists",
            playlists[LIBRARY_PLAYLIST].len(),
            playlists.len() - PSEUDO_PLAYLISTS
        );
        Ok(MediaLibrary {
            playlists,
            db_file: db_file.to_path_buf(),
            playlist_dir: playlist_dir.to_path_buf(),
        })
    }

    /// Tears the library down and loads it afresh from disk.
    pub fn reload(&mut self) -> Result<(), LibraryError> {
        *self = MediaLibrary::load(&self.db_file, &self.playlist_dir)?;
        Ok(())
    }

    /// Idempotent first-run initializer: creates the directories and an
    /// empty, versioned database file. An existing database is kept as is;
    /// an existing file that is not a recognizable database is refused.
    pub fn setup_files(db_file: &Path, playlist_dir: &Path) -> Result<(), LibraryError> {
        if let Some(parent) = db_file.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::create_dir_all(playlist_dir)?;

        if db_file.exists() {
            match db::read_database(db_file) {
                Ok(_) => Ok(()),
                Err(DatabaseError::Io(err)) => Err(LibraryError::Io(err)),
                Err(_) => Err(LibraryError::UnrecognizedDatabase(db_file.to_path_buf())),
            }
        } else {
            db::write_database(db_file, &[])?;
            info!("created empty database at {}", db_file.display());
            Ok(())
        }
    }

    pub fn db_file(&self) -> &Path {
        &self.db_file
    }

    pub fn playlist_dir(&self) -> &Path {
        &self.playlist_dir
    }

    pub fn playlists(&self) -> &[Playlist] {
        &self.playlists
    }

    pub fn playlist(&self, index: usize) -> &Playlist {
        &self.playlists[index]
    }

    pub fn playlist_mut(&mut self, index: usize) -> &mut Playlist {
        &mut self.playlists[index]
    }

    pub fn is_pseudo(&self, index: usize) -> bool {
        index < PSEUDO_PLAYLISTS
    }

    /// The record store, i.e. the Library pseudo-playlist's contents.
    pub fn records(&self) -> &[RecordRef] {
        self.playlists[LIBRARY_PLAYLIST].files()
    }

    /// Appends a playlist, returning its index.
    pub fn playlist_add(&mut self, playlist: Playlist) -> usize {
        self.playlists.push(playlist);
        self.playlists.len() - 1
    }

    /// Removes a playlist and deletes its on-disk file. Irreversible; the
    /// per-playlist undo history does not cover this level.
    pub fn playlist_remove(&mut self, index: usize) -> Result<(), LibraryError> {
        if self.is_pseudo(index) {
            return Err(LibraryError::PseudoPlaylistRemoval(
                self.playlists[index].name.clone(),
            ));
        }
        let playlist = self.playlists.remove(index);
        playlist.delete_file()?;
        info!("removed playlist '{}'", playlist.name);
        Ok(())
    }

    /// Overwrites the Filter-results pseudo-playlist with a new result set.
    pub fn set_filter_results(&mut self, results: Playlist) {
        self.playlists[FILTER_PLAYLIST].adopt(results);
    }

    /// Rewrites the database file from the store.
    pub fn save_database(&self) -> Result<(), LibraryError> {
        let file = fs::File::create(&self.db_file)?;
        let mut writer = BufWriter::new(file);
        db::write_header(&mut writer)?;
        for record_ref in self.records() {
            db::write_record(&mut writer, &record_ref.borrow())?;
        }
        writer.flush().map_err(DatabaseError::Io)?;
        debug!(
            "saved {} records to {}",
            self.records().len(),
            self.db_file.display()
        );
        Ok(())
    }

    pub fn find_record(&self, filename: &str) -> Option<RecordRef> {
        self.records()
            .iter()
            .find(|r| r.borrow().filename == filename)
            .map(Rc::clone)
    }

    /// Adds a record to the store after the duplicate scan the store itself
    /// does not perform.
    pub fn add_record(&mut self, record: MetaRecord) -> Result<RecordRef, LibraryError> {
        if self.find_record(&record.filename).is_some() {
            return Err(LibraryError::DuplicateRecord(record.filename));
        }
        let record_ref = record::share(record);
        let store = self.playlists[LIBRARY_PLAYLIST].files_mut();
        store.push(Rc::clone(&record_ref));
        Ok(record_ref)
    }

    /// Drops the record with this filename from the store. Playlists holding
    /// the reference keep it alive; only the catalog forgets it.
    pub fn remove_record(&mut self, filename: &str) -> bool {
        let store = self.playlists[LIBRARY_PLAYLIST].files_mut();
        let before = store.len();
        store.retain(|r| r.borrow().filename != filename);
        before != store.len()
    }

    /// Walks directory subtrees and catalogues every audio file with usable
    /// tags. New files are appended; catalogued files whose modification
    /// time advanced are re-extracted in place (and dropped when extraction
    /// now fails); unchanged files are skipped. Batch maintenance, meant to
    /// run with no user playlists loaded.
    pub fn scan_dirs(&mut self, dirs: &[PathBuf]) -> ScanSummary {
        let mut summary = ScanSummary::default();
        for dir in dirs {
            for path in collect_audio_files(dir) {
                let filename = path.to_string_lossy().into_owned();
                match self.find_record(&filename) {
                    Some(record_ref) => {
                        let last_updated = record_ref.borrow().last_updated;
                        if file_mtime(&path) <= last_updated {
                            summary.skipped += 1;
                            continue;
                        }
                        match metadata_tags::extract_record(&path) {
                            Some(fresh) => {
                                *record_ref.borrow_mut() = fresh;
                                summary.updated += 1;
                            }
                            None => {
                                warn!("dropping {}: no longer has usable metadata", filename);
                                self.remove_record(&filename);
                                summary.removed += 1;
                            }
                        }
                    }
                    None => match metadata_tags::extract_record(&path) {
                        Some(record) => {
                            // Scan candidates were just checked against the
                            // store, so the duplicate scan cannot fire.
                            if self.add_record(record).is_ok() {
                                summary.added += 1;
                            }
                        }
                        None => {
                            debug!("skipping {} (no usable metadata)", path.display());
                            summary.skipped += 1;
                        }
                    },
                }
            }
        }
        info!(
            "scan finished: {} added, {} updated, {} removed, {} skipped",
            summary.added, summary.updated, summary.removed, summary.skipped
        );
        summary
    }

    /// Reconciles every catalogued file against the filesystem: files whose
    /// modification time advanced are re-extracted in place (keeping the
    /// shared reference identity), files that vanished or lost their tags
    /// are dropped from the store, unchanged files are skipped.
    pub fn rescan_files(&mut self) -> ScanSummary {
        let mut summary = ScanSummary::default();
        let mut stale = Vec::new();

        for record_ref in self.records() {
            let (filename, last_updated, is_url) = {
                let record = record_ref.borrow();
                (record.filename.clone(), record.last_updated, record.is_url)
            };
            if is_url {
                summary.skipped += 1;
                continue;
            }

            let path = PathBuf::from(&filename);
            let modified = match fs::metadata(&path).and_then(|meta| meta.modified()) {
                Ok(modified) => modified,
                Err(err) => {
                    warn!("dropping {}: {}", filename, err);
                    stale.push(filename);
                    summary.removed += 1;
                    continue;
                }
            };
            let mtime = modified
                .duration_since(UNIX_EPOCH)
                .map(|elapsed| elapsed.as_secs() as i64)
                .unwrap_or(0);
            if mtime <= last_updated {
                summary.skipped += 1;
                continue;
            }

            match metadata_tags::extract_record(&path) {
                Some(fresh) => {
                    *record_ref.borrow_mut() = fresh;
                    summary.updated += 1;
                }
                None => {
                    // Tags are gone; a stale record must not linger.
                    warn!("dropping {}: no longer has usable metadata", filename);
                    stale.push(filename);
                    summary.removed += 1;
                }
            }
        }

        for filename in stale {
            self.remove_record(&filename);
        }
        info!(
            "rescan finished: {} updated, {} removed, {} skipped",
            summary.updated, summary.removed, summary.skipped
        );
        summary
    }

    /// Dumps the store as CSV.
    pub fn export_csv(&self, writer: &mut impl Write) -> io::Result<()> {
        writeln!(
            writer,
            "filename,artist,album,title,track,year,genre,length,comment"
        )?;
        for record_ref in self.records() {
            let record = record_ref.borrow();
            let fields = [
                Some(record.filename.as_str()),
                record.artist.as_deref(),
                record.album.as_deref(),
                record.title.as_deref(),
                record.track.as_deref(),
                record.year.as_deref(),
                record.genre.as_deref(),
                record.length_text.as_deref(),
                record.comment.as_deref(),
            ];
            let row: Vec<String> = fields
                .iter()
                .map(|field| csv_cell(field.unwrap_or("")))
                .collect();
            writeln!(writer, "{}", row.join(","))?;
        }
        Ok(())
    }
}

/// Modification time as unix seconds; unreadable files report 0, which can
/// never be newer than a recorded update time.
fn file_mtime(path: &Path) -> i64 {
    fs::metadata(path)
        .and_then(|meta| meta.modified())
        .ok()
        .and_then(|modified| modified.duration_since(UNIX_EPOCH).ok())
        .map(|elapsed| elapsed.as_secs() as i64)
        .unwrap_or(0)
}

fn csv_cell(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn is_supported_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            SUPPORTED_AUDIO_EXTENSIONS
                .iter()
                .any(|supported| ext.eq_ignore_ascii_case(supported))
        })
        .unwrap_or(false)
}

/// Recursive walk collecting supported audio files, sorted for stable scan
/// order. Unreadable directories are logged and skipped.
fn collect_audio_files(root: &Path) -> Vec<PathBuf> {
    let mut pending_directories = vec![root.to_path_buf()];
    let mut files = Vec::new();

    while let Some(directory) = pending_directories.pop() {
        let entries = match fs::read_dir(&directory) {
            Ok(entries) => entries,
            Err(err) => {
                debug!("failed to read directory {}: {}", directory.display(), err);
                continue;
            }
        };
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    debug!(
                        "failed to read an entry in {}: {}",
                        directory.display(),
                        err
                    );
                    continue;
                }
            };
            let path = entry.path();
            match entry.file_type() {
                Ok(file_type) if file_type.is_dir() => pending_directories.push(path),
                Ok(file_type) if file_type.is_file() && is_supported_audio_file(&path) => {
                    files.push(path)
                }
                Ok(_) => {}
                Err(err) => debug!("failed to inspect {}: {}", path.display(), err),
            }
        }
    }

    files.sort_unstable();
    files
}

fn playlist_files(playlist_dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(playlist_dir)? {
        let path = entry?.path();
        let is_playlist = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(PLAYLIST_EXTENSION));
        if path.is_file() && is_playlist {
            paths.push(path);
        }
    }
    paths.sort_unstable();
    Ok(paths)
}

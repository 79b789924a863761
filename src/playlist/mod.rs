//! Ordered playlist of shared record references with per-playlist undo/redo.

pub mod history;

use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use log::debug;
use thiserror::Error;

use crate::query::Query;
use crate::record::{self, MetaRecord, RecordRef};
use crate::sort::SortOrder;
use history::{Changeset, History};

#[derive(Debug, Error)]
pub enum PlaylistError {
    #[error("playlist '{0}' has no file; use save-as first")]
    NoFilename(String),
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

/// Named ordered sequence of references into the record store.
///
/// `filename == None` marks a new playlist that has never been saved. The
/// Library and Filter-results pseudo-playlists are ordinary `Playlist`
/// values; their special status (non-deletable, save-as only) is enforced by
/// the owning `MediaLibrary`.
#[derive(Debug)]
pub struct Playlist {
    pub name: String,
    pub filename: Option<PathBuf>,
    files: Vec<RecordRef>,
    pub needs_saving: bool,
    history: History,
}

impl Playlist {
    pub fn new(name: impl Into<String>) -> Playlist {
        Playlist {
            name: name.into(),
            filename: None,
            files: Vec::new(),
            needs_saving: false,
            history: History::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn files(&self) -> &[RecordRef] {
        &self.files
    }

    pub fn file(&self, index: usize) -> &RecordRef {
        &self.files[index]
    }

    /// Store-maintenance access for the owning library; the Library
    /// pseudo-playlist's vector doubles as the record store.
    pub(crate) fn files_mut(&mut self) -> &mut Vec<RecordRef> {
        &mut self.files
    }

    #[cfg(test)]
    pub(crate) fn history(&self) -> &History {
        &self.history
    }

    /// Inserts `refs` at `index` (0 ≤ index ≤ len), shifting later entries
    /// right. With `record_history` the insertion is pushed as an undoable
    /// changeset and the playlist marked dirty.
    pub fn add_files(&mut self, refs: &[RecordRef], index: usize, record_history: bool) {
        if record_history {
            self.history.push(Changeset::Add {
                at: index,
                records: refs.to_vec(),
            });
            self.needs_saving = true;
        }
        self.insert_raw(index, refs);
    }

    /// Removes `count` entries starting at `index`, shifting later entries
    /// left. With `record_history` the removed reference values are captured
    /// so undo can restore them byte for byte.
    pub fn remove_files(&mut self, index: usize, count: usize, record_history: bool) {
        let removed = self.remove_raw(index, count);
        if record_history {
            self.history.push(Changeset::Remove {
                at: index,
                records: removed,
            });
            self.needs_saving = true;
        }
    }

    /// Substitutes the entry at `index`, recording an undoable replace.
    pub fn replace_file(&mut self, index: usize, new_ref: RecordRef) {
        let old = Rc::clone(&self.files[index]);
        self.history.push(Changeset::Replace {
            at: index,
            old,
            new: Rc::clone(&new_ref),
        });
        self.files[index] = new_ref;
        self.needs_saving = true;
    }

    /// Produces a new unnamed playlist holding every reference whose record
    /// matches the query per `want_matches`, preserving order. Returns `None`
    /// when no query is set.
    pub fn filter(&self, query: &Query, want_matches: bool) -> Option<Playlist> {
        if query.is_empty() {
            return None;
        }
        let mut results = Playlist::new(format!("filter: {}", query.raw()));
        results.files = self
            .files
            .iter()
            .filter(|r| query.matches(&r.borrow()) == want_matches)
            .map(Rc::clone)
            .collect();
        debug!(
            "filter '{}' kept {} of {} entries in '{}'",
            query.raw(),
            results.files.len(),
            self.files.len(),
            self.name
        );
        Some(results)
    }

    /// Shallow copy under a new identity: same references, fresh container,
    /// empty history. Used by save-as.
    pub fn duplicate(&self, new_filename: PathBuf, new_name: impl Into<String>) -> Playlist {
        Playlist {
            name: new_name.into(),
            filename: Some(new_filename),
            files: self.files.clone(),
            needs_saving: true,
            history: History::default(),
        }
    }

    /// Takes over another playlist's contents while keeping this playlist's
    /// identity and special status. Used to overwrite the Filter-results
    /// pseudo-playlist on each new filter.
    pub fn adopt(&mut self, source: Playlist) {
        self.files = source.files;
        self.history = History::default();
        self.needs_saving = false;
    }

    /// Stable in-place sort of the reference sequence.
    pub fn sort(&mut self, order: &SortOrder) {
        self.files
            .sort_by(|a, b| order.compare(&a.borrow(), &b.borrow()));
        self.needs_saving = true;
    }

    /// Reads a playlist file (one path or URL per line), resolving each line
    /// against the store. Unresolved entries become stub records appended to
    /// the store; each such repair is returned as a warning.
    pub fn load(
        path: &Path,
        store: &mut Vec<RecordRef>,
    ) -> Result<(Playlist, Vec<String>), PlaylistError> {
        let name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or("unnamed")
            .to_string();

        let reader = BufReader::new(File::open(path)?);
        let mut playlist = Playlist::new(name);
        playlist.filename = Some(path.to_path_buf());
        let mut warnings = Vec::new();

        for line in reader.lines() {
            let line = line?;
            let entry = line.trim();
            if entry.is_empty() {
                continue;
            }

            let resolved = store
                .iter()
                .find(|r| r.borrow().filename == entry)
                .map(Rc::clone);
            let record_ref = match resolved {
                Some(record_ref) => record_ref,
                None => {
                    warnings.push(format!(
                        "'{}': no such entry in the database, added a stub",
                        entry
                    ));

                    let mut stub = MetaRecord::new(entry);
                    stub.is_url = entry.contains("://");
                    let stub = record::share(stub);
                    store.push(Rc::clone(&stub));
                    stub
                }
            };
            playlist.files.push(record_ref);
        }

        Ok((playlist, warnings))
    }

    /// Writes the ordered filenames, one per line, to `self.filename`.
    pub fn save(&mut self) -> Result<(), PlaylistError> {
        let path = self
            .filename
            .as_ref()
            .ok_or_else(|| PlaylistError::NoFilename(self.name.clone()))?;

        let mut writer = BufWriter::new(File::create(path)?);
        for record_ref in &self.files {
            writeln!(writer, "{}", record_ref.borrow().filename)?;
        }
        writer.flush()?;
        self.needs_saving = false;
        debug!("saved playlist '{}' to {}", self.name, path.display());
        Ok(())
    }

    /// Deletes the backing file, if any. Called when the playlist is removed
    /// from the library.
    pub fn delete_file(&self) -> Result<(), PlaylistError> {
        if let Some(path) = &self.filename {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    /// Reverses the most recent recorded change. Returns `false` when there
    /// is nothing to undo.
    pub fn undo(&mut self) -> bool {
        let Some(changeset) = self.history.undo() else {
            return false;
        };
        match changeset {
            Changeset::Add { at, records } => {
                self.remove_raw(at, records.len());
            }
            Changeset::Remove { at, records } => {
                self.insert_raw(at, &records);
            }
            Changeset::Replace { at, old, .. } => {
                self.files[at] = old;
            }
        }
        self.needs_saving = true;
        true
    }

    /// Reapplies the most recently undone change. Returns `false` when there
    /// is nothing to redo.
    pub fn redo(&mut self) -> bool {
        let Some(changeset) = self.history.redo() else {
            return false;
        };
        match changeset {
            Changeset::Add { at, records } => {
                self.insert_raw(at, &records);
            }
            Changeset::Remove { at, records } => {
                self.remove_raw(at, records.len());
            }
            Changeset::Replace { at, new, .. } => {
                self.files[at] = new;
            }
        }
        self.needs_saving = true;
        true
    }

    // Non-recording primitives. Undo/redo route through these directly so
    // applying history never pushes new history.

    fn insert_raw(&mut self, index: usize, refs: &[RecordRef]) {
        self.files
            .splice(index..index, refs.iter().map(Rc::clone));
    }

    fn remove_raw(&mut self, index: usize, count: usize) -> Vec<RecordRef> {
        self.files.drain(index..index + count).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::share;

    fn rec(name: &str) -> RecordRef {
        share(MetaRecord::new(format!("/music/{name}.mp3")))
    }

    fn names(playlist: &Playlist) -> Vec<String> {
        playlist
            .files()
            .iter()
            .map(|r| r.borrow().filename.clone())
            .collect()
    }

    #[test]
    fn add_then_undo_restores_the_original_sequence() {
        let mut playlist = Playlist::new("test");
        playlist.add_files(&[rec("a"), rec("b")], 0, true);
        let before = names(&playlist);

        playlist.add_files(&[rec("c")], 1, true);
        assert_eq!(playlist.len(), 3);

        assert!(playlist.undo());
        assert_eq!(names(&playlist), before);
    }

    #[test]
    fn remove_then_undo_restores_the_exact_references() {
        let mut playlist = Playlist::new("test");
        let a = rec("a");
        let b = rec("b");
        let c = rec("c");
        playlist.add_files(&[Rc::clone(&a), Rc::clone(&b), Rc::clone(&c)], 0, false);

        playlist.remove_files(1, 2, true);
        assert_eq!(playlist.len(), 1);

        assert!(playlist.undo());
        assert_eq!(playlist.len(), 3);
        assert!(Rc::ptr_eq(playlist.file(0), &a));
        assert!(Rc::ptr_eq(playlist.file(1), &b));
        assert!(Rc::ptr_eq(playlist.file(2), &c));
    }

    #[test]
    fn add_remove_undo_redo_scenario_moves_the_cursor() {
        let mut playlist = Playlist::new("test");
        playlist.add_files(&[rec("a"), rec("b"), rec("c")], 0, true);
        assert_eq!(playlist.len(), 3);

        playlist.remove_files(0, 1, true);
        assert_eq!(playlist.len(), 2);
        assert_eq!(playlist.history().present(), Some(1));

        assert!(playlist.undo());
        assert_eq!(playlist.len(), 3);
        assert_eq!(playlist.history().present(), Some(0));

        assert!(playlist.redo());
        assert_eq!(playlist.len(), 2);
        assert_eq!(playlist.history().present(), Some(1));
    }

    #[test]
    fn fresh_change_after_undo_kills_redo() {
        let mut playlist = Playlist::new("test");
        playlist.add_files(&[rec("a")], 0, true);
        playlist.add_files(&[rec("b")], 1, true);

        assert!(playlist.undo());
        assert!(playlist.undo());
        playlist.add_files(&[rec("z")], 0, true);

        // The undone additions are gone for good.
        assert!(!playlist.redo());
        assert_eq!(playlist.len(), 1);
        assert_eq!(playlist.file(0).borrow().filename, "z");
    }

    #[test]
    fn replace_is_undoable() {
        let mut playlist = Playlist::new("test");
        let a = rec("a");
        let b = rec("b");
        playlist.add_files(&[Rc::clone(&a)], 0, false);

        playlist.replace_file(0, Rc::clone(&b));
        assert!(Rc::ptr_eq(playlist.file(0), &b));

        assert!(playlist.undo());
        assert!(Rc::ptr_eq(playlist.file(0), &a));

        assert!(playlist.redo());
        assert!(Rc::ptr_eq(playlist.file(0), &b));
    }

    #[test]
    fn unrecorded_mutations_leave_no_history() {
        let mut playlist = Playlist::new("test");
        playlist.add_files(&[rec("a"), rec("b")], 0, false);
        playlist.remove_files(0, 1, false);
        assert!(!playlist.undo());
        assert!(!playlist.needs_saving);
    }

    #[test]
    fn filter_requires_a_query() {
        let playlist = Playlist::new("test");
        assert!(playlist.filter(&Query::new(false), true).is_none());
    }

    #[test]
    fn filter_keeps_matches_or_non_matches_in_order() {
        let mut playlist = Playlist::new("test");
        let mut jazz = MetaRecord::new("/music/a.mp3");
        jazz.genre = Some("Jazz".to_string());
        let mut rock = MetaRecord::new("/music/b.mp3");
        rock.genre = Some("Rock".to_string());
        playlist.add_files(&[share(jazz), share(rock)], 0, false);

        let query = Query::parse("jazz", false).unwrap();
        let kept = playlist.filter(&query, true).unwrap();
        assert_eq!(names(&kept), vec!["/music/a.mp3"]);

        let dropped = playlist.filter(&query, false).unwrap();
        assert_eq!(names(&dropped), vec!["/music/b.mp3"]);
    }

    #[test]
    fn filter_is_idempotent_on_its_own_results() {
        let mut playlist = Playlist::new("test");
        for name in ["a", "b", "c"] {
            let mut record = MetaRecord::new(format!("/music/{name}.mp3"));
            record.genre = Some("Jazz".to_string());
            playlist.add_files(&[share(record)], playlist.len(), false);
        }

        let query = Query::parse("jazz", false).unwrap();
        let first = playlist.filter(&query, true).unwrap();
        let second = first.filter(&query, true).unwrap();

        assert_eq!(first.len(), second.len());
        for (left, right) in first.files().iter().zip(second.files()) {
            assert!(Rc::ptr_eq(left, right));
        }
    }

    #[test]
    fn sort_orders_records_and_reverses_on_descending() {
        let mut playlist = Playlist::new("test");
        let mut bach = MetaRecord::new("/music/bach.mp3");
        bach.artist = Some("Bach".to_string());
        let mut mozart = MetaRecord::new("/music/mozart.mp3");
        mozart.artist = Some("Mozart".to_string());
        playlist.add_files(&[share(bach), share(mozart)], 0, false);

        playlist.sort(&SortOrder::parse("artist").unwrap());
        assert_eq!(names(&playlist), vec!["/music/bach.mp3", "/music/mozart.mp3"]);

        playlist.sort(&SortOrder::parse("-artist").unwrap());
        assert_eq!(names(&playlist), vec!["/music/mozart.mp3", "/music/bach.mp3"]);
    }

    #[test]
    fn duplicate_shares_references_but_not_identity() {
        let mut playlist = Playlist::new("test");
        let a = rec("a");
        playlist.add_files(&[Rc::clone(&a)], 0, false);

        let copy = playlist.duplicate(PathBuf::from("/tmp/copy.playlist"), "copy");
        assert_eq!(copy.name, "copy");
        assert!(copy.needs_saving);
        assert!(Rc::ptr_eq(copy.file(0), &a));
    }

    #[test]
    fn save_without_filename_fails_loudly() {
        let mut playlist = Playlist::new("test");
        assert!(matches!(
            playlist.save(),
            Err(PlaylistError::NoFilename(_))
        ));
    }

    #[test]
    fn save_and_load_round_trip_with_stub_repair() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mix.playlist");

        let known = rec("known");
        let mut store = vec![Rc::clone(&known)];

        let mut playlist = Playlist::new("mix");
        playlist.filename = Some(path.clone());
        playlist.add_files(&[Rc::clone(&known), rec("missing")], 0, true);
        playlist.save().unwrap();
        assert!(!playlist.needs_saving);

        // "missing" is not in the store, so loading fabricates a stub.
        let (loaded, warnings) = Playlist::load(&path, &mut store).unwrap();
        assert_eq!(loaded.name, "mix");
        assert_eq!(loaded.len(), 2);
        assert_eq!(warnings.len(), 1);
        assert_eq!(store.len(), 2);
        assert!(Rc::ptr_eq(loaded.file(0), &known));
        assert!(Rc::ptr_eq(loaded.file(1), &store[1]));
    }

    #[test]
    fn loaded_url_entries_are_flagged_as_urls() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("radio.playlist");
        std::fs::write(&path, "http://radio.example/stream\n").unwrap();

        let mut store = Vec::new();
        let (loaded, warnings) = Playlist::load(&path, &mut store).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(warnings.len(), 1);
        assert!(loaded.file(0).borrow().is_url);
    }

    #[test]
    fn history_bound_limits_how_far_undo_reaches() {
        let mut playlist = Playlist::new("test");
        // One over capacity: the oldest insert is forgotten.
        for i in 0..=history::DEFAULT_HISTORY_SIZE {
            playlist.add_files(&[rec(&i.to_string())], playlist.len(), true);
        }
        assert_eq!(playlist.history().len(), history::DEFAULT_HISTORY_SIZE);

        let mut undone = 0;
        while playlist.undo() {
            undone += 1;
        }
        assert_eq!(undone, history::DEFAULT_HISTORY_SIZE);
        // The very first insert survives; it fell off the ring.
        assert_eq!(playlist.len(), 1);
    }
}

//! Interactive command language: resolution by unambiguous prefix, plus the
//! cut/yank/paste clipboard operations on the viewed playlist.
//!
//! Every failure carries a numeric code that is stable within its command, so
//! config-file execution can abort on the first non-zero code while the
//! interactive layer shows the human-readable message.

use std::path::PathBuf;
use std::rc::Rc;

use log::info;
use thiserror::Error;

use crate::display::{DisplayLayout, DisplayParseError};
use crate::library::{LibraryError, MediaLibrary, FILTER_PLAYLIST, PLAYLIST_EXTENSION};
use crate::playlist::Playlist;
use crate::query::{Query, QueryParseError};
use crate::record::RecordRef;
use crate::sort::{SortOrder, SortParseError};

const COMMAND_NAMES: [&str; 6] = ["display", "filter", "new", "quit", "sort", "write"];

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("unknown command '{0}'")]
    UnknownCommand(String),
    #[error("ambiguous command '{0}' (matches {1})")]
    AmbiguousCommand(String, String),
    #[error("'{0}' does not take '!'")]
    ForceNotSupported(String),
    #[error("{0}")]
    BadArguments(String),
    #[error("no filter query set")]
    NoQuery,
    #[error(transparent)]
    QueryParse(#[from] QueryParseError),
    #[error(transparent)]
    SortParse(#[from] SortParseError),
    #[error(transparent)]
    DisplayParse(#[from] DisplayParseError),
    #[error("'{0}' is a pseudo-playlist; use 'write <name>' to save a copy")]
    PseudoPlaylistSave(String),
    #[error("playlist '{0}' has no file yet; use 'write <name>'")]
    NoFilenameYet(String),
    #[error("'{0}' already exists; use 'write!' to overwrite")]
    WouldOverwrite(String),
    #[error("unsaved playlists exist; use 'quit!' to discard changes")]
    UnsavedPlaylists,
    #[error(transparent)]
    Library(#[from] LibraryError),
}

impl CommandError {
    /// Stable numeric code identifying the failure condition.
    pub fn code(&self) -> u32 {
        match self {
            CommandError::UnknownCommand(_) => 1,
            CommandError::AmbiguousCommand(..) => 2,
            CommandError::ForceNotSupported(_) => 3,
            CommandError::BadArguments(_) => 4,
            CommandError::NoQuery => 5,
            CommandError::QueryParse(_) => 6,
            CommandError::SortParse(_) => 7,
            CommandError::DisplayParse(_) => 8,
            CommandError::PseudoPlaylistSave(_) => 9,
            CommandError::NoFilenameYet(_) => 10,
            CommandError::WouldOverwrite(_) => 11,
            CommandError::UnsavedPlaylists => 12,
            CommandError::Library(_) => 13,
        }
    }
}

/// Result of a successfully executed command.
#[derive(Debug, PartialEq, Eq)]
pub enum CommandOutcome {
    Message(String),
    Quit,
}

/// Everything a command needs, passed explicitly instead of living in
/// process-wide globals: the library, the viewed playlist, the active
/// descriptors and the clipboard.
pub struct CommandContext<'a> {
    pub library: &'a mut MediaLibrary,
    pub viewed: usize,
    pub query: &'a mut Query,
    pub sort_order: &'a mut SortOrder,
    pub display: &'a mut DisplayLayout,
    pub yank_buffer: &'a mut Vec<RecordRef>,
}

impl CommandContext<'_> {
    fn viewed_playlist_mut(&mut self) -> &mut Playlist {
        self.library.playlist_mut(self.viewed)
    }

    /// Copies a range of the viewed playlist into the clipboard.
    pub fn yank(&mut self, start: usize, count: usize) {
        let playlist = self.library.playlist(self.viewed);
        *self.yank_buffer = playlist.files()[start..start + count]
            .iter()
            .map(Rc::clone)
            .collect();
    }

    /// Removes a range from the viewed playlist into the clipboard,
    /// recording history.
    pub fn cut(&mut self, start: usize, count: usize) {
        self.yank(start, count);
        self.viewed_playlist_mut().remove_files(start, count, true);
    }

    /// Inserts the clipboard at `index`, recording history. Returns how many
    /// entries were pasted.
    pub fn paste(&mut self, index: usize) -> usize {
        let refs = self.yank_buffer.clone();
        self.viewed_playlist_mut().add_files(&refs, index, true);
        refs.len()
    }

    /// Undoes the viewed playlist's latest change; `false` means nothing to
    /// undo.
    pub fn undo(&mut self) -> bool {
        self.viewed_playlist_mut().undo()
    }

    /// Redoes the viewed playlist's latest undone change; `false` means
    /// nothing to redo.
    pub fn redo(&mut self) -> bool {
        self.viewed_playlist_mut().redo()
    }
}

/// Resolves `word` against the command table: an exact match wins, a unique
/// prefix resolves, anything else is unknown or ambiguous.
fn resolve_command(word: &str) -> Result<&'static str, CommandError> {
    if let Some(exact) = COMMAND_NAMES.iter().find(|name| **name == word) {
        return Ok(exact);
    }
    let matches: Vec<&'static str> = COMMAND_NAMES
        .iter()
        .copied()
        .filter(|name| name.starts_with(word))
        .collect();
    match matches.as_slice() {
        [] => Err(CommandError::UnknownCommand(word.to_string())),
        [only] => Ok(only),
        many => Err(CommandError::AmbiguousCommand(
            word.to_string(),
            many.join(", "),
        )),
    }
}

/// Parses and executes one command line.
pub fn execute(ctx: &mut CommandContext, input: &str) -> Result<CommandOutcome, CommandError> {
    let mut words = input.split_whitespace();
    let Some(first) = words.next() else {
        return Ok(CommandOutcome::Message(String::new()));
    };

    let (word, forced) = match first.strip_suffix('!') {
        Some(rest) => (rest, true),
        None => (first, false),
    };
    let name = resolve_command(word)?;
    if forced && !matches!(name, "filter" | "write" | "quit") {
        return Err(CommandError::ForceNotSupported(name.to_string()));
    }

    let args: Vec<&str> = words.collect();
    match name {
        "new" => cmd_new(ctx, &args),
        "filter" => cmd_filter(ctx, &args, forced),
        "sort" => cmd_sort(ctx, &args),
        "display" => cmd_display(ctx, &args),
        "write" => cmd_write(ctx, &args, forced),
        "quit" => cmd_quit(ctx, forced),
        _ => unreachable!("resolve_command only returns table entries"),
    }
}

fn cmd_new(ctx: &mut CommandContext, args: &[&str]) -> Result<CommandOutcome, CommandError> {
    let name = if args.is_empty() {
        "untitled".to_string()
    } else {
        args.join(" ")
    };
    let index = ctx.library.playlist_add(Playlist::new(name.clone()));
    info!("created playlist '{}' at slot {}", name, index);
    Ok(CommandOutcome::Message(format!(
        "created playlist '{name}'"
    )))
}

/// `filter` keeps matches, `filter!` keeps non-matches. With no arguments the
/// stored query is re-applied.
fn cmd_filter(
    ctx: &mut CommandContext,
    args: &[&str],
    forced: bool,
) -> Result<CommandOutcome, CommandError> {
    if !args.is_empty() {
        *ctx.query = Query::parse(&args.join(" "), ctx.query.match_filename())?;
    }

    let viewed = ctx.library.playlist(ctx.viewed);
    let Some(results) = viewed.filter(ctx.query, !forced) else {
        return Err(CommandError::NoQuery);
    };
    let count = results.len();
    ctx.library.set_filter_results(results);
    ctx.viewed = FILTER_PLAYLIST;
    Ok(CommandOutcome::Message(format!(
        "{count} result{} for '{}'",
        if count == 1 { "" } else { "s" },
        ctx.query.raw()
    )))
}

fn cmd_sort(ctx: &mut CommandContext, args: &[&str]) -> Result<CommandOutcome, CommandError> {
    if args.is_empty() {
        return Err(CommandError::BadArguments(
            "sort requires a field list, e.g. 'sort artist,-year'".to_string(),
        ));
    }
    let raw = args.join(",");
    *ctx.sort_order = SortOrder::parse(&raw)?;
    ctx.library.playlist_mut(ctx.viewed).sort(ctx.sort_order);
    Ok(CommandOutcome::Message(format!("sorted by {raw}")))
}

fn cmd_display(ctx: &mut CommandContext, args: &[&str]) -> Result<CommandOutcome, CommandError> {
    match args {
        [] => Err(CommandError::BadArguments(
            "display requires a description, 'show' or 'reset'".to_string(),
        )),
        ["show"] => Ok(CommandOutcome::Message(format!(
            "display: {}",
            ctx.display.describe()
        ))),
        ["reset"] => {
            *ctx.display = DisplayLayout::default();
            Ok(CommandOutcome::Message("display reset".to_string()))
        }
        parts => {
            *ctx.display = DisplayLayout::parse(&parts.join(","))?;
            Ok(CommandOutcome::Message(format!(
                "display: {}",
                ctx.display.describe()
            )))
        }
    }
}

/// `write` saves in place, `write <name>` saves a copy under the playlist
/// directory (guarded against overwriting unless forced).
fn cmd_write(
    ctx: &mut CommandContext,
    args: &[&str],
    forced: bool,
) -> Result<CommandOutcome, CommandError> {
    if args.is_empty() {
        if ctx.library.is_pseudo(ctx.viewed) {
            return Err(CommandError::PseudoPlaylistSave(
                ctx.library.playlist(ctx.viewed).name.clone(),
            ));
        }
        let playlist = ctx.viewed_playlist_mut();
        if playlist.filename.is_none() {
            return Err(CommandError::NoFilenameYet(playlist.name.clone()));
        }
        playlist.save().map_err(LibraryError::Playlist)?;
        return Ok(CommandOutcome::Message(format!(
            "wrote '{}'",
            playlist.name
        )));
    }

    let name = args.join(" ");
    let path: PathBuf = ctx
        .library
        .playlist_dir()
        .join(format!("{name}.{PLAYLIST_EXTENSION}"));
    if path.exists() && !forced {
        return Err(CommandError::WouldOverwrite(path.display().to_string()));
    }

    let mut copy = ctx.library.playlist(ctx.viewed).duplicate(path, &name);
    copy.save().map_err(LibraryError::Playlist)?;
    ctx.library.playlist_add(copy);
    Ok(CommandOutcome::Message(format!("wrote '{name}'")))
}

/// Only user playlists count as unsaved work; the pseudo-playlists cannot
/// be saved in place, so their dirty flags must not block quitting.
fn cmd_quit(ctx: &mut CommandContext, forced: bool) -> Result<CommandOutcome, CommandError> {
    if !forced {
        let dirty = ctx
            .library
            .playlists()
            .iter()
            .enumerate()
            .any(|(index, playlist)| !ctx.library.is_pseudo(index) && playlist.needs_saving);
        if dirty {
            return Err(CommandError::UnsavedPlaylists);
        }
    }
    Ok(CommandOutcome::Quit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::MediaLibrary;
    use crate::record::MetaRecord;
    use std::path::Path;

    struct Env {
        _dir: tempfile::TempDir,
        library: MediaLibrary,
        query: Query,
        sort_order: SortOrder,
        display: DisplayLayout,
        yank_buffer: Vec<RecordRef>,
        viewed: usize,
    }

    impl Env {
        fn new() -> Env {
            let dir = tempfile::tempdir().unwrap();
            let db_file = dir.path().join("library.db");
            let playlist_dir = dir.path().join("playlists");
            MediaLibrary::setup_files(&db_file, &playlist_dir).unwrap();
            Env {
                library: MediaLibrary::load(&db_file, &playlist_dir).unwrap(),
                _dir: dir,
                query: Query::new(false),
                sort_order: SortOrder::default(),
                display: DisplayLayout::default(),
                yank_buffer: Vec::new(),
                viewed: 0,
            }
        }

        fn run(&mut self, input: &str) -> Result<CommandOutcome, CommandError> {
            let mut ctx = CommandContext {
                library: &mut self.library,
                viewed: self.viewed,
                query: &mut self.query,
                sort_order: &mut self.sort_order,
                display: &mut self.display,
                yank_buffer: &mut self.yank_buffer,
            };
            let outcome = execute(&mut ctx, input);
            self.viewed = ctx.viewed;
            outcome
        }

        fn add_record(&mut self, filename: &str, genre: &str) {
            let mut record = MetaRecord::new(filename);
            record.genre = Some(genre.to_string());
            self.library.add_record(record).unwrap();
        }
    }

    #[test]
    fn prefix_resolution_handles_exact_unique_and_ambiguous() {
        assert_eq!(resolve_command("quit").unwrap(), "quit");
        assert_eq!(resolve_command("q").unwrap(), "quit");
        assert_eq!(resolve_command("w").unwrap(), "write");
        assert!(matches!(
            resolve_command("x"),
            Err(CommandError::UnknownCommand(_))
        ));
    }

    #[test]
    fn error_codes_are_distinct_per_condition() {
        let unknown = CommandError::UnknownCommand("x".to_string());
        let unsaved = CommandError::UnsavedPlaylists;
        assert_ne!(unknown.code(), unsaved.code());
        assert_ne!(unknown.code(), 0);
    }

    #[test]
    fn new_creates_a_playlist() {
        let mut env = Env::new();
        let outcome = env.run("new road mix").unwrap();
        assert_eq!(
            outcome,
            CommandOutcome::Message("created playlist 'road mix'".to_string())
        );
        assert_eq!(env.library.playlists().len(), 3);
        assert_eq!(env.library.playlist(2).name, "road mix");
    }

    #[test]
    fn filter_populates_the_results_view_and_switches_to_it() {
        let mut env = Env::new();
        env.add_record("/music/a.mp3", "Jazz");
        env.add_record("/music/b.mp3", "Rock");

        let outcome = env.run("filter jazz").unwrap();
        assert_eq!(
            outcome,
            CommandOutcome::Message("1 result for 'jazz'".to_string())
        );
        assert_eq!(env.viewed, FILTER_PLAYLIST);
        assert_eq!(env.library.playlist(FILTER_PLAYLIST).len(), 1);
    }

    #[test]
    fn negated_filter_keeps_non_matches() {
        let mut env = Env::new();
        env.add_record("/music/a.mp3", "Jazz");
        env.add_record("/music/b.mp3", "Rock");

        env.run("filter! jazz").unwrap();
        let results = env.library.playlist(FILTER_PLAYLIST);
        assert_eq!(results.len(), 1);
        assert_eq!(results.file(0).borrow().filename, "/music/b.mp3");
    }

    #[test]
    fn filter_without_arguments_needs_a_stored_query() {
        let mut env = Env::new();
        let err = env.run("filter").unwrap_err();
        assert!(matches!(err, CommandError::NoQuery));

        env.add_record("/music/a.mp3", "Jazz");
        env.run("filter jazz").unwrap();
        // Re-filtering the results view with the stored query is idempotent.
        let outcome = env.run("filter").unwrap();
        assert_eq!(
            outcome,
            CommandOutcome::Message("1 result for 'jazz'".to_string())
        );
    }

    #[test]
    fn sort_applies_to_the_viewed_playlist() {
        let mut env = Env::new();
        let mut mozart = MetaRecord::new("/music/m.mp3");
        mozart.artist = Some("Mozart".to_string());
        let mut bach = MetaRecord::new("/music/b.mp3");
        bach.artist = Some("Bach".to_string());
        env.library.add_record(mozart).unwrap();
        env.library.add_record(bach).unwrap();

        env.run("sort artist").unwrap();
        let library_view = env.library.playlist(0);
        assert_eq!(library_view.file(0).borrow().filename, "/music/b.mp3");

        env.run("sort -artist").unwrap();
        let library_view = env.library.playlist(0);
        assert_eq!(library_view.file(0).borrow().filename, "/music/m.mp3");
    }

    #[test]
    fn display_show_set_and_reset() {
        let mut env = Env::new();
        env.run("display artist.10 title.20").unwrap();
        assert_eq!(env.display.describe(), "artist.10,title.20");

        let outcome = env.run("display show").unwrap();
        assert_eq!(
            outcome,
            CommandOutcome::Message("display: artist.10,title.20".to_string())
        );

        env.run("display reset").unwrap();
        assert_eq!(env.display, DisplayLayout::default());

        let err = env.run("display bogus.x").unwrap_err();
        assert!(matches!(err, CommandError::DisplayParse(_)));
    }

    #[test]
    fn write_refuses_pseudo_playlists_in_place() {
        let mut env = Env::new();
        let err = env.run("write").unwrap_err();
        assert!(matches!(err, CommandError::PseudoPlaylistSave(_)));
    }

    #[test]
    fn write_as_guards_overwrites_unless_forced() {
        let mut env = Env::new();
        env.add_record("/music/a.mp3", "Jazz");

        env.run("write mix").unwrap();
        let path = env.library.playlist_dir().join("mix.playlist");
        assert!(path.exists());

        let err = env.run("write mix").unwrap_err();
        assert!(matches!(err, CommandError::WouldOverwrite(_)));

        env.run("write! mix").unwrap();
    }

    #[test]
    fn write_in_place_requires_a_filename() {
        let mut env = Env::new();
        env.run("new scratch").unwrap();
        env.viewed = 2;
        let err = env.run("write").unwrap_err();
        assert!(matches!(err, CommandError::NoFilenameYet(_)));
    }

    #[test]
    fn quit_is_blocked_by_dirty_playlists_unless_forced() {
        let mut env = Env::new();
        env.add_record("/music/a.mp3", "Jazz");
        env.run("new scratch").unwrap();
        env.viewed = 2;
        let record_ref = env.library.find_record("/music/a.mp3").unwrap();
        env.library.playlist_mut(2).add_files(&[record_ref], 0, true);

        let err = env.run("quit").unwrap_err();
        assert!(matches!(err, CommandError::UnsavedPlaylists));
        assert_eq!(env.run("quit!").unwrap(), CommandOutcome::Quit);
    }

    #[test]
    fn quit_ignores_dirty_pseudo_playlists() {
        let mut env = Env::new();
        let mut mozart = MetaRecord::new("/music/m.mp3");
        mozart.artist = Some("Mozart".to_string());
        let mut bach = MetaRecord::new("/music/b.mp3");
        bach.artist = Some("Bach".to_string());
        env.library.add_record(mozart).unwrap();
        env.library.add_record(bach).unwrap();

        // Sorting the Library view dirties it, but it is not saveable in
        // place, so quitting must still work.
        env.run("sort artist").unwrap();
        assert!(env.library.playlist(0).needs_saving);
        assert!(matches!(env.run("write"), Err(CommandError::PseudoPlaylistSave(_))));
        assert_eq!(env.run("quit").unwrap(), CommandOutcome::Quit);
    }

    #[test]
    fn force_suffix_is_rejected_where_it_makes_no_sense() {
        let mut env = Env::new();
        let err = env.run("sort! artist").unwrap_err();
        assert!(matches!(err, CommandError::ForceNotSupported(_)));
    }

    #[test]
    fn cut_and_paste_round_trip_through_the_clipboard() {
        let mut env = Env::new();
        env.add_record("/music/a.mp3", "Jazz");
        env.add_record("/music/b.mp3", "Rock");
        env.run("new scratch").unwrap();
        env.viewed = 2;
        let a = env.library.find_record("/music/a.mp3").unwrap();
        let b = env.library.find_record("/music/b.mp3").unwrap();
        env.library
            .playlist_mut(2)
            .add_files(&[a, b], 0, false);

        let mut ctx = CommandContext {
            library: &mut env.library,
            viewed: 2,
            query: &mut env.query,
            sort_order: &mut env.sort_order,
            display: &mut env.display,
            yank_buffer: &mut env.yank_buffer,
        };
        ctx.cut(0, 1);
        assert_eq!(ctx.library.playlist(2).len(), 1);
        assert_eq!(ctx.paste(1), 1);
        assert_eq!(ctx.library.playlist(2).len(), 2);
        assert_eq!(
            ctx.library.playlist(2).file(1).borrow().filename,
            "/music/a.mp3"
        );

        // Both edits recorded history.
        assert!(ctx.undo());
        assert!(ctx.undo());
        assert_eq!(ctx.library.playlist(2).file(0).borrow().filename, "/music/a.mp3");
        assert!(!ctx.undo());
    }

    #[test]
    fn saved_playlist_survives_a_library_reload() {
        let mut env = Env::new();
        env.add_record("/music/a.mp3", "Jazz");
        env.library.save_database().unwrap();
        env.run("write mix").unwrap();

        env.library.reload().unwrap();
        assert_eq!(env.library.playlists().len(), 3);
        assert_eq!(env.library.playlist(2).name, "mix");
        assert!(Path::new(&env.library.playlist_dir().join("mix.playlist")).exists());
    }
}

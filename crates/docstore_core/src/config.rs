//! Store configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Default directory for collection files, relative to the working directory.
pub const DEFAULT_DIR: &str = "datastore";

/// Default debounce window between the last mutation and the flush.
pub const DEFAULT_FLUSH_DELAY: Duration = Duration::from_millis(5000);

/// Configuration for opening a document store.
///
/// The same configuration can be shared by every collection of a
/// [`crate::Registry`]; only `filename` is collection specific and is
/// normally left unset so it is derived from the collection name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Directory holding the collection file.
    pub path: PathBuf,

    /// File name inside `path`. Derived from the collection name when `None`.
    pub filename: Option<String>,

    /// How long to wait after the last mutation before flushing.
    ///
    /// `Duration::ZERO` flushes as soon as the flush worker wakes up.
    pub flush_delay: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_DIR),
            filename: None,
            flush_delay: DEFAULT_FLUSH_DELAY,
        }
    }
}

impl StoreConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the directory holding the collection file.
    #[must_use]
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = path.into();
        self
    }

    /// Sets an explicit file name.
    #[must_use]
    pub fn filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    /// Sets the flush debounce window.
    #[must_use]
    pub fn flush_delay(mut self, delay: Duration) -> Self {
        self.flush_delay = delay;
        self
    }

    /// Flushes after every mutation instead of debouncing.
    #[must_use]
    pub fn immediate(self) -> Self {
        self.flush_delay(Duration::ZERO)
    }

    /// Returns the file name used for the collection `name`.
    #[must_use]
    pub fn filename_for(&self, name: &str) -> String {
        match &self.filename {
            Some(filename) => filename.clone(),
            None => format!("{}.json", slug(name)),
        }
    }

    /// Returns the full path of the file for the collection `name`.
    #[must_use]
    pub fn file_path_for(&self, name: &str) -> PathBuf {
        self.path.join(self.filename_for(name))
    }
}

/// Turns a collection name into a filesystem-safe kebab-case slug.
///
/// Words are split on any non-alphanumeric character, on lower-to-upper
/// case transitions (`fooBar`), at the end of an acronym (`HTTPServer`)
/// and between letters and digits. Words are lowercased and joined by `-`.
/// A name without any alphanumeric character becomes `collection`.
#[must_use]
pub fn slug(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut words: Vec<String> = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if !c.is_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }

        if let Some(&prev) = i.checked_sub(1).and_then(|p| chars.get(p)) {
            let next = chars.get(i + 1).copied();
            let boundary = prev.is_alphanumeric()
                && ((prev.is_lowercase() && c.is_uppercase())
                    || (prev.is_alphabetic() && c.is_numeric())
                    || (prev.is_numeric() && c.is_alphabetic())
                    || (prev.is_uppercase()
                        && c.is_uppercase()
                        && next.is_some_and(char::is_lowercase)));
            if boundary && !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
        }

        current.extend(c.to_lowercase());
    }

    if !current.is_empty() {
        words.push(current);
    }

    if words.is_empty() {
        return "collection".to_string();
    }

    words.join("-")
}

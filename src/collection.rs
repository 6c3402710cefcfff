//! Loads CSV-backed collections from disk. Every `.csv` file directly inside a
//! collection's directory is parsed (header row required) and each row is
//! validated with the collection's [`Record`] schema. Invalid rows are either
//! fatal or skipped depending on [`InvalidRowPolicy`].

use std::fmt::{self, Display};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::record::{RawRecord, Record, ValidationErrors};

const CSV_EXTENSION: &str = "csv";

/// What to do with rows that fail validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidRowPolicy {
    /// Fail the load, reporting every invalid row.
    Fail,

    /// Log and drop invalid rows.
    Skip,
}

impl Default for InvalidRowPolicy {
    fn default() -> Self {
        InvalidRowPolicy::Fail
    }
}

/// Options shared by every collection load.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub policy: InvalidRowPolicy,

    /// The number of worker threads used to parse source files. Fewer than two
    /// means files are parsed on the calling thread.
    pub threads: usize,
}

impl Default for LoadOptions {
    fn default() -> Self {
        LoadOptions {
            policy: InvalidRowPolicy::default(),
            threads: num_cpus::get(),
        }
    }
}

/// The validated records of one collection, in file-name order then row
/// order.
#[derive(Debug)]
pub struct Collection<R> {
    pub records: Vec<R>,

    /// Rows dropped under [`InvalidRowPolicy::Skip`].
    pub skipped: Vec<RowError>,
}

/// A row that failed validation, identified by source file and line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowError {
    pub path: PathBuf,

    /// The 1-based line of the row in its source file (the header is line 1).
    pub line: u64,

    pub errors: ValidationErrors,
}

impl fmt::Display for RowError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}: {}", self.path.display(), self.line, self.errors)
    }
}

/// The validation outcome of each row of one file.
type FileRows<R> = Vec<(u64, std::result::Result<R, ValidationErrors>)>;

/// Loads the collection stored in `directory`. See [`LoadOptions`] for how
/// parsing is spread across threads and how invalid rows are handled.
pub fn load_collection<R>(directory: &Path, options: &LoadOptions) -> Result<Collection<R>>
where
    R: Record + Send + 'static,
{
    let files = source_files(directory, CSV_EXTENSION)?;
    let parsed = if options.threads < 2 || files.len() < 2 {
        files
            .iter()
            .map(|path| parse_file::<R>(path))
            .collect::<Result<Vec<_>>>()?
    } else {
        parse_files_parallel::<R>(&files, options.threads)?
    };

    let mut records = Vec::new();
    let mut locations = Vec::new();
    let mut invalid = Vec::new();
    for (path, rows) in files.into_iter().zip(parsed) {
        for (line, result) in rows {
            match result {
                Ok(record) => {
                    records.push(record);
                    locations.push(Location {
                        path: path.clone(),
                        line,
                    });
                }
                Err(errors) => invalid.push(RowError {
                    path: path.clone(),
                    line,
                    errors,
                }),
            }
        }
    }

    if options.policy == InvalidRowPolicy::Fail && !invalid.is_empty() {
        return Err(Error::InvalidRows(invalid));
    }
    for row in &invalid {
        warn!(collection = R::COLLECTION, "skipping invalid row {}", row);
    }

    let conflicts = slug_conflicts(&records, locations);
    if !conflicts.is_empty() {
        return Err(Error::SlugConflicts(conflicts));
    }

    info!(
        collection = R::COLLECTION,
        records = records.len(),
        skipped = invalid.len(),
        "loaded collection"
    );
    Ok(Collection {
        records,
        skipped: invalid,
    })
}

/// Where a row came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub path: PathBuf,
    pub line: u64,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.path.display(), self.line)
    }
}

/// A record whose slug can't serve as its lookup key and link stem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlugConflict {
    /// The record's name has no characters that survive slugification.
    Empty { name: String, at: Location },

    /// Two records share a slug. `first` is the earlier row.
    Duplicate {
        slug: String,
        first: Location,
        second: Location,
    },
}

impl fmt::Display for SlugConflict {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SlugConflict::Empty { name, at } => {
                write!(f, "{}: name {:?} has an empty slug", at, name)
            }
            SlugConflict::Duplicate {
                slug,
                first,
                second,
            } => write!(
                f,
                "{}: slug `{}` is already used by the row at {}",
                second, slug, first
            ),
        }
    }
}

/// Checks that every record's slug is non-empty and unique. `locations` runs
/// parallel to `records`.
fn slug_conflicts<R: Record>(records: &[R], locations: Vec<Location>) -> Vec<SlugConflict> {
    use std::collections::HashMap;

    let mut seen: HashMap<String, Location> = HashMap::new();
    let mut conflicts = Vec::new();
    for (record, at) in records.iter().zip(locations) {
        let slug = record.slug();
        if slug.is_empty() {
            conflicts.push(SlugConflict::Empty {
                name: record.name().to_owned(),
                at,
            });
        } else if let Some(first) = seen.get(&slug) {
            conflicts.push(SlugConflict::Duplicate {
                slug,
                first: first.clone(),
                second: at,
            });
        } else {
            seen.insert(slug, at);
        }
    }
    conflicts
}

/// Lists the regular files directly inside `directory` with the given
/// extension, sorted by file name.
pub(crate) fn source_files(directory: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    if !directory.is_dir() {
        return Err(Error::MissingDirectory(directory.to_owned()));
    }

    let mut files = Vec::new();
    for result in WalkDir::new(directory)
        .min_depth(1)
        .max_depth(1)
        .sort_by(|a, b| a.file_name().cmp(b.file_name()))
    {
        let entry = result?;
        if entry.file_type().is_file()
            && entry.path().extension().map_or(false, |ext| ext == extension)
        {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Spreads `files` over `threads` workers fed by a channel. The results are
/// returned in the same order as `files`; if several files fail, the error of
/// the first one is returned.
fn parse_files_parallel<R>(files: &[PathBuf], threads: usize) -> Result<Vec<FileRows<R>>>
where
    R: Record + Send + 'static,
{
    use crossbeam_channel::unbounded;
    use std::thread;

    let (tx, rx) = unbounded::<(usize, PathBuf)>();
    let count = threads.min(files.len());
    let mut workers = Vec::with_capacity(count);

    for _ in 0..count {
        let rx = rx.clone();
        workers.push(thread::spawn(move || -> Vec<(usize, Result<FileRows<R>>)> {
            rx.into_iter()
                .map(|(index, path)| (index, parse_file::<R>(&path)))
                .collect()
        }));
    }

    for (index, path) in files.iter().enumerate() {
        tx.send((index, path.clone()))
            .map_err(|_| Error::WorkerPanicked)?;
    }
    drop(tx);

    let mut parsed = Vec::with_capacity(files.len());
    for worker in workers {
        parsed.extend(worker.join().map_err(|_| Error::WorkerPanicked)?);
    }
    parsed.sort_by_key(|(index, _)| *index);
    parsed.into_iter().map(|(_, rows)| rows).collect()
}

/// Parses and validates every row of a single CSV file.
fn parse_file<R: Record>(path: &Path) -> Result<FileRows<R>> {
    debug!(path = %path.display(), "parsing {}", R::COLLECTION);
    let annotate = |err: csv::Error| {
        Error::Annotated(
            format!("parsing `{}`", path.display()),
            Box::new(Error::Csv(err)),
        )
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(annotate)?;
    let headers = reader.headers().map_err(annotate)?.clone();
    for field in R::FIELDS {
        if !headers.iter().any(|header| header == *field) {
            warn!(path = %path.display(), "missing column `{}`", field);
        }
    }

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.map_err(annotate)?;
        let line = record.position().map_or(0, |p| p.line());
        let raw: RawRecord = headers
            .iter()
            .zip(record.iter())
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        rows.push((line, R::validate(&raw)));
    }
    Ok(rows)
}

/// Represents the result of loading a collection.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error loading a collection.
#[derive(Debug)]
pub enum Error {
    /// Returned when a collection's source directory doesn't exist.
    MissingDirectory(PathBuf),

    /// Returned when one or more rows failed validation under
    /// [`InvalidRowPolicy::Fail`].
    InvalidRows(Vec<RowError>),

    /// Returned when records have empty or clashing slugs. Reported whatever
    /// the [`InvalidRowPolicy`].
    SlugConflicts(Vec<SlugConflict>),

    /// Returned for malformed CSV (e.g., a row with the wrong number of
    /// cells).
    Csv(csv::Error),

    /// Returned for WalkDir I/O errors.
    WalkDir(walkdir::Error),

    /// Returned when a parser thread panicked.
    WorkerPanicked,

    /// An error with an annotation.
    Annotated(String, Box<Error>),
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::MissingDirectory(path) => {
                write!(f, "collection directory `{}` not found", path.display())
            }
            Error::InvalidRows(rows) => {
                write!(f, "{} invalid row(s):", rows.len())?;
                for row in rows {
                    write!(f, "\n  {}", row)?;
                }
                Ok(())
            }
            Error::SlugConflicts(conflicts) => {
                write!(f, "{} slug conflict(s):", conflicts.len())?;
                for conflict in conflicts {
                    write!(f, "\n  {}", conflict)?;
                }
                Ok(())
            }
            Error::Csv(err) => err.fmt(f),
            Error::WalkDir(err) => err.fmt(f),
            Error::WorkerPanicked => write!(f, "a parser thread panicked"),
            Error::Annotated(annotation, err) => {
                write!(f, "{}: {}", &annotation, err)
            }
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::MissingDirectory(_) => None,
            Error::InvalidRows(_) => None,
            Error::SlugConflicts(_) => None,
            Error::Csv(err) => Some(err),
            Error::WalkDir(err) => Some(err),
            Error::WorkerPanicked => None,
            Error::Annotated(_, err) => Some(err),
        }
    }
}

impl From<csv::Error> for Error {
    /// Converts a [`csv::Error`] into an [`Error`]. It allows us to use the
    /// `?` operator for CSV reader functions.
    fn from(err: csv::Error) -> Error {
        Error::Csv(err)
    }
}

impl From<walkdir::Error> for Error {
    /// Converts a [`walkdir::Error`] into an [`Error`]. It allows us to use
    /// the `?` operator while listing source files.
    fn from(err: walkdir::Error) -> Error {
        Error::WalkDir(err)
    }
}

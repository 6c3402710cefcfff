//! Defines the [`Page`] type and the logic for loading the free-form
//! `page_content` collection: Markdown files with an optional YAML frontmatter
//! block. Page bodies are carried verbatim; rendering them is up to the site's
//! templates.

use std::fmt::{self, Display};
use std::fs::File;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::collection::{self, source_files};

const MARKDOWN_EXTENSION: &str = "md";

/// A Markdown page from the `page_content` collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page {
    /// The source file's stem, e.g. `about` for `page_content/about.md`.
    pub id: String,
    pub title: Option<String>,
    pub description: Option<String>,

    /// The Markdown source following the frontmatter.
    pub body: String,
}

#[derive(Deserialize, Default)]
struct Frontmatter {
    #[serde(default)]
    title: Option<String>,

    #[serde(default)]
    description: Option<String>,
}

impl Page {
    /// Parses a page from its `id` and file contents. A page that starts with
    /// `---` must close its frontmatter with a `---` at the start of a later
    /// line; a page that doesn't is all body.
    pub fn parse(id: &str, input: &str) -> Result<Page> {
        const FENCE: &str = "---";

        let (frontmatter, body) = if input.starts_with(FENCE) {
            let rest = &input[FENCE.len()..];
            match rest.find("\n---") {
                None => return Err(Error::FrontmatterMissingEndFence),
                Some(offset) => {
                    let yaml = &rest[..offset];
                    let frontmatter = if yaml.trim().is_empty() {
                        Frontmatter::default()
                    } else {
                        serde_yaml::from_str(yaml)?
                    };
                    (frontmatter, &rest[offset + 1 + FENCE.len()..])
                }
            }
        } else {
            (Frontmatter::default(), input)
        };

        Ok(Page {
            id: id.to_owned(),
            title: frontmatter.title,
            description: frontmatter.description,
            body: body.trim_start_matches(|c: char| c == '\r' || c == '\n').to_owned(),
        })
    }
}

/// Loads every `.md` file directly inside `directory`, ordered by id.
pub fn load_pages(directory: &Path) -> Result<Vec<Page>> {
    let mut pages = Vec::new();
    for path in source_files(directory, MARKDOWN_EXTENSION)? {
        pages.push(load_page(&path).map_err(|e| {
            Error::Annotated(format!("parsing page `{}`", path.display()), Box::new(e))
        })?);
    }
    info!(pages = pages.len(), "loaded pages");
    Ok(pages)
}

fn load_page(path: &Path) -> Result<Page> {
    use std::io::Read;

    let id = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .ok_or_else(|| Error::InvalidFileName(path.to_owned()))?;
    let mut contents = String::new();
    File::open(path)?.read_to_string(&mut contents)?;
    Page::parse(id, &contents)
}

/// Represents the result of a [`Page`]-parse operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error parsing a [`Page`].
#[derive(Debug)]
pub enum Error {
    /// Returned when a page opens a frontmatter block (`---`) but never
    /// closes it.
    FrontmatterMissingEndFence,

    /// Returned when there was an error parsing the frontmatter as YAML.
    DeserializeYaml(serde_yaml::Error),

    /// Returned when a source file name isn't valid UTF-8.
    InvalidFileName(PathBuf),

    /// Returned when the pages directory can't be listed.
    Collection(collection::Error),

    /// Returned for other I/O errors.
    Io(std::io::Error),

    /// An error with an annotation.
    Annotated(String, Box<Error>),
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::FrontmatterMissingEndFence => {
                write!(f, "Missing closing `---`")
            }
            Error::DeserializeYaml(err) => err.fmt(f),
            Error::InvalidFileName(path) => {
                write!(f, "invalid file name: {:?}", path)
            }
            Error::Collection(err) => err.fmt(f),
            Error::Io(err) => err.fmt(f),
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
            Error::FrontmatterMissingEndFence => None,
            Error::DeserializeYaml(err) => Some(err),
            Error::InvalidFileName(_) => None,
            Error::Collection(err) => Some(err),
            Error::Io(err) => Some(err),
            Error::Annotated(_, err) => Some(err),
        }
    }
}

impl From<serde_yaml::Error> for Error {
    /// Converts a [`serde_yaml::Error`] into an [`Error`]. It allows us to use
    /// the `?` operator for [`serde_yaml`] deserialization functions.
    fn from(err: serde_yaml::Error) -> Error {
        Error::DeserializeYaml(err)
    }
}

impl From<collection::Error> for Error {
    fn from(err: collection::Error) -> Error {
        Error::Collection(err)
    }
}

impl From<std::io::Error> for Error {
    /// Converts a [`std::io::Error`] into an [`Error`]. It allows us to
    /// use the `?` operator for fallible I/O functions.
    fn from(err: std::io::Error) -> Error {
        Error::Io(err)
    }
}

//! Exports [`load_content`], which loads and validates every collection of a
//! project, and [`build_site`], which additionally publishes the validated
//! content as JSON for the site's page-rendering layer:
//!
//! * `pipelines.json`, `resources.json`: arrays of records, each with a `slug`
//!   and a base-path-prefixed `link`
//! * `pages.json`: the `page_content` pages
//! * `site.json`: the resolved base path, modules, stylesheets and record
//!   counts

use std::fmt::{self, Display};
use std::fs::File;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info};

use crate::collection::{self, load_collection, LoadOptions, RowError};
use crate::config::{BasePath, BuildEnv, Config};
use crate::page::{self, load_pages, Page};
use crate::pipeline::Pipeline;
use crate::query::Catalog;
use crate::record::Record;
use crate::resource::Resource;

/// A project's validated content, plus any rows that were skipped.
#[derive(Debug)]
pub struct Content {
    pub catalog: Catalog,
    pub skipped: Vec<RowError>,
}

/// Loads the pipelines, resources and pages described by `config`. When rows
/// are invalid under [`crate::collection::InvalidRowPolicy::Fail`], the
/// invalid rows of both CSV collections are reported together.
pub fn load_content(config: &Config, options: &LoadOptions) -> Result<Content> {
    let pipelines = load_collection::<Pipeline>(&config.pipelines_directory, options);
    let resources = load_collection::<Resource>(&config.resources_directory, options);
    let (pipelines, resources) = match (pipelines, resources) {
        (Ok(pipelines), Ok(resources)) => (pipelines, resources),
        (
            Err(collection::Error::InvalidRows(mut rows)),
            Err(collection::Error::InvalidRows(more)),
        ) => {
            rows.extend(more);
            return Err(collection::Error::InvalidRows(rows).into());
        }
        (Err(err), _) | (_, Err(err)) => return Err(err.into()),
    };

    let pages = if config.pages_directory.is_dir() {
        load_pages(&config.pages_directory)?
    } else {
        debug!(
            path = %config.pages_directory.display(),
            "no pages directory; skipping pages"
        );
        Vec::new()
    };

    let mut skipped = pipelines.skipped;
    skipped.extend(resources.skipped);
    Ok(Content {
        catalog: Catalog {
            pipelines: pipelines.records,
            resources: resources.records,
            pages,
        },
        skipped,
    })
}

/// Builds the site's content outputs into `output_directory`, replacing
/// whatever was there. Returns the loaded [`Content`]. Refuses to clear an
/// output directory that is, or contains, the project root or one of its
/// content directories.
pub fn build_site(
    config: &Config,
    env: &BuildEnv,
    output_directory: &Path,
    options: &LoadOptions,
) -> Result<Content> {
    let content = load_content(config, options)?;
    let base_path = env.resolve_base_path(config);
    info!(base_path = %base_path, "resolved base path");

    check_output_directory(config, output_directory)?;
    rmdir(output_directory)?;
    std::fs::create_dir_all(output_directory)?;

    let catalog = &content.catalog;
    write_json(
        &output_directory.join("pipelines.json"),
        &entries(&catalog.pipelines, &base_path),
    )?;
    write_json(
        &output_directory.join("resources.json"),
        &entries(&catalog.resources, &base_path),
    )?;
    write_json(
        &output_directory.join("pages.json"),
        &catalog
            .pages
            .iter()
            .map(|page| PageEntry {
                link: match page.id.as_str() {
                    "index" => base_path.to_string(),
                    id => base_path.link(id),
                },
                page,
            })
            .collect::<Vec<_>>(),
    )?;
    write_json(
        &output_directory.join("site.json"),
        &Manifest {
            base_path: &base_path,
            modules: &config.modules,
            css: &config.css,
            devtools: config.devtools,
            compatibility_date: config.compatibility_date,
            pipelines: catalog.pipelines.len(),
            resources: catalog.resources.len(),
            pages: catalog.pages.len(),
        },
    )?;

    info!(
        output = %output_directory.display(),
        pipelines = catalog.pipelines.len(),
        resources = catalog.resources.len(),
        pages = catalog.pages.len(),
        skipped = content.skipped.len(),
        "built site content"
    );
    Ok(content)
}

#[derive(Serialize)]
struct Entry<'a, R> {
    slug: String,
    link: String,
    #[serde(flatten)]
    record: &'a R,
}

#[derive(Serialize)]
struct PageEntry<'a> {
    link: String,
    #[serde(flatten)]
    page: &'a Page,
}

#[derive(Serialize)]
struct Manifest<'a> {
    base_path: &'a BasePath,
    modules: &'a [String],
    css: &'a [String],
    devtools: bool,
    compatibility_date: Option<NaiveDate>,
    pipelines: usize,
    resources: usize,
    pages: usize,
}

fn entries<'a, R: Record>(records: &'a [R], base_path: &BasePath) -> Vec<Entry<'a, R>> {
    records
        .iter()
        .map(|record| {
            let slug = record.slug();
            Entry {
                link: base_path.link(&format!("{}/{}", R::COLLECTION, slug)),
                slug,
                record,
            }
        })
        .collect()
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let file = File::create(path).map_err(|err| Error::Write {
        path: path.to_owned(),
        err,
    })?;
    serde_json::to_writer_pretty(file, value)?;
    Ok(())
}

/// Fails if clearing `output` would delete any of the project's inputs. An
/// output directory that doesn't exist yet is always fine.
fn check_output_directory(config: &Config, output: &Path) -> Result<()> {
    let canonical = |path: &Path| match path.canonicalize() {
        Ok(path) => Ok(Some(path)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(Error::Clean {
            path: path.to_owned(),
            err,
        }),
    };

    let output_canonical = match canonical(output)? {
        Some(path) => path,
        None => return Ok(()),
    };
    let inputs = [
        &config.project_root,
        &config.pipelines_directory,
        &config.resources_directory,
        &config.pages_directory,
    ];
    for input in inputs.iter() {
        if let Some(input_canonical) = canonical(input.as_path())? {
            if input_canonical.starts_with(&output_canonical) {
                return Err(Error::UnsafeOutputDirectory {
                    output: output.to_owned(),
                    input: input.to_path_buf(),
                });
            }
        }
    }
    Ok(())
}

fn rmdir(dir: &Path) -> Result<()> {
    match std::fs::remove_dir_all(dir) {
        Ok(x) => Ok(x),
        Err(e) => match e.kind() {
            std::io::ErrorKind::NotFound => Ok(()),
            _ => Err(Error::Clean {
                path: dir.to_owned(),
                err: e,
            }),
        },
    }
}

type Result<T> = std::result::Result<T, Error>;

/// The error type for building a site. Errors can be during collection
/// loading, page parsing, cleaning the output directory, and writing outputs.
#[derive(Debug)]
pub enum Error {
    /// Returned for errors loading a CSV collection, including invalid rows.
    Collection(collection::Error),

    /// Returned for errors parsing pages.
    Page(page::Error),

    /// Returned when the output directory contains project inputs and so
    /// can't be cleared.
    UnsafeOutputDirectory { output: PathBuf, input: PathBuf },

    /// Returned for I/O problems while cleaning the output directory.
    Clean { path: PathBuf, err: std::io::Error },

    /// Returned for I/O problems while creating an output file.
    Write { path: PathBuf, err: std::io::Error },

    /// Returned for errors serializing output files.
    Serialize(serde_json::Error),

    /// Returned for other I/O errors.
    Io(std::io::Error),
}

impl fmt::Display for Error {
    /// Implements [`fmt::Display`] for [`Error`].
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Collection(err) => err.fmt(f),
            Error::Page(err) => err.fmt(f),
            Error::UnsafeOutputDirectory { output, input } => write!(
                f,
                "refusing to clear output directory '{}': it contains '{}'",
                output.display(),
                input.display()
            ),
            Error::Clean { path, err } => {
                write!(f, "Cleaning directory '{}': {}", path.display(), err)
            }
            Error::Write { path, err } => {
                write!(f, "Creating output file '{}': {}", path.display(), err)
            }
            Error::Serialize(err) => err.fmt(f),
            Error::Io(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements [`std::error::Error`] for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Collection(err) => Some(err),
            Error::Page(err) => Some(err),
            Error::UnsafeOutputDirectory { .. } => None,
            Error::Clean { path: _, err } => Some(err),
            Error::Write { path: _, err } => Some(err),
            Error::Serialize(err) => Some(err),
            Error::Io(err) => Some(err),
        }
    }
}

impl From<collection::Error> for Error {
    /// Converts [`collection::Error`]s into [`Error`]. This allows us to use
    /// the `?` operator.
    fn from(err: collection::Error) -> Error {
        Error::Collection(err)
    }
}

impl From<page::Error> for Error {
    /// Converts [`page::Error`]s into [`Error`]. This allows us to use the `?`
    /// operator.
    fn from(err: page::Error) -> Error {
        Error::Page(err)
    }
}

impl From<serde_json::Error> for Error {
    /// Converts [`serde_json::Error`]s into [`Error`]. This allows us to use
    /// the `?` operator.
    fn from(err: serde_json::Error) -> Error {
        Error::Serialize(err)
    }
}

impl From<std::io::Error> for Error {
    /// Converts [`std::io::Error`]s into [`Error`]. This allows us to use the
    /// `?` operator.
    fn from(err: std::io::Error) -> Error {
        Error::Io(err)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::collection::InvalidRowPolicy;
    use serde_json::Value;

    type TestResult = std::result::Result<(), Box<dyn std::error::Error>>;

    fn options(policy: InvalidRowPolicy) -> LoadOptions {
        LoadOptions { policy, threads: 2 }
    }

    fn read_json(path: &Path) -> std::result::Result<Value, Box<dyn std::error::Error>> {
        Ok(serde_json::from_reader(File::open(path)?)?)
    }

    #[test]
    fn test_build_site() -> TestResult {
        let config = Config::from_directory(Path::new("./testdata/site"))?;
        let output = tempfile::tempdir()?;
        let env = BuildEnv {
            production: true,
            base_path_override: None,
        };
        build_site(
            &config,
            &env,
            output.path(),
            &options(InvalidRowPolicy::Fail),
        )?;

        let pipelines = read_json(&output.path().join("pipelines.json"))?;
        assert_eq!(4, pipelines.as_array().map_or(0, Vec::len));
        assert_eq!("foo", pipelines[0]["slug"]);
        assert_eq!("/pipeline-catalog/pipelines/foo", pipelines[0]["link"]);
        assert_eq!("Foo", pipelines[0]["pipeline_name"]);
        assert_eq!("https://x.com/", pipelines[0]["pipeline_url"]);
        assert_eq!(
            serde_json::json!(["bio", "genomics", "qc"]),
            pipelines[0]["pipeline_keywords"]
        );

        let pages = read_json(&output.path().join("pages.json"))?;
        assert_eq!("/pipeline-catalog/", pages[1]["link"]);

        let site = read_json(&output.path().join("site.json"))?;
        assert_eq!("/pipeline-catalog/", site["base_path"]);
        assert_eq!("2024-04-03", site["compatibility_date"]);
        assert_eq!(4, site["pipelines"]);
        assert_eq!(2, site["resources"]);
        Ok(())
    }

    #[test]
    fn test_build_site_replaces_stale_output() -> TestResult {
        let config = Config::from_directory(Path::new("./testdata/site"))?;
        let output = tempfile::tempdir()?;
        std::fs::write(output.path().join("stale.json"), "[]")?;
        build_site(
            &config,
            &BuildEnv::default(),
            output.path(),
            &options(InvalidRowPolicy::Fail),
        )?;
        assert!(!output.path().join("stale.json").exists());
        let site = read_json(&output.path().join("site.json"))?;
        assert_eq!("/", site["base_path"]);
        Ok(())
    }

    /// Copies `testdata/site` to `<dir>/site` so builds can safely point their
    /// output at the project.
    fn copy_site(dir: &Path) -> std::result::Result<PathBuf, Box<dyn std::error::Error>> {
        let source = Path::new("./testdata/site");
        let root = dir.join("site");
        for entry in walkdir::WalkDir::new(source) {
            let entry = entry?;
            let target = root.join(entry.path().strip_prefix(source)?);
            if entry.file_type().is_dir() {
                std::fs::create_dir_all(&target)?;
            } else {
                std::fs::copy(entry.path(), &target)?;
            }
        }
        Ok(root)
    }

    #[test]
    fn test_build_site_refuses_to_clear_project_inputs() -> TestResult {
        let dir = tempfile::tempdir()?;
        let root = copy_site(dir.path())?;
        let config = Config::from_directory(&root)?;

        let outputs = [
            root.clone(),
            root.join("content"),
            root.join("content/pipelines/.."),
            dir.path().to_owned(),
        ];
        for output in outputs.iter() {
            match build_site(
                &config,
                &BuildEnv::default(),
                output,
                &options(InvalidRowPolicy::Fail),
            ) {
                Err(Error::UnsafeOutputDirectory { .. }) => {}
                other => panic!(
                    "{}: wanted UnsafeOutputDirectory; found {:?}",
                    output.display(),
                    other
                ),
            }
        }

        assert!(root.join("catalog.yaml").is_file());
        assert!(root.join("content/pipelines/core.csv").is_file());
        assert!(root.join("content/resources/resources.csv").is_file());
        assert!(root.join("content/page_content/about.md").is_file());

        // A sibling of the content directory is fine.
        build_site(
            &config,
            &BuildEnv::default(),
            &root.join("_site/content"),
            &options(InvalidRowPolicy::Fail),
        )?;
        assert!(root.join("_site/content/site.json").is_file());
        Ok(())
    }

    #[test]
    fn test_load_content_reports_rows_from_every_collection() -> TestResult {
        let config = Config::from_directory(Path::new("./testdata/invalid"))?;
        match load_content(&config, &options(InvalidRowPolicy::Fail)) {
            Err(Error::Collection(collection::Error::InvalidRows(rows))) => {
                assert_eq!(3, rows.len());
                Ok(())
            }
            other => panic!("wanted InvalidRows; found {:?}", other),
        }
    }

    #[test]
    fn test_load_content_skip() -> TestResult {
        let config = Config::from_directory(Path::new("./testdata/invalid"))?;
        let content = load_content(&config, &options(InvalidRowPolicy::Skip))?;
        assert_eq!(1, content.catalog.pipelines.len());
        assert!(content.catalog.resources.is_empty());
        assert!(content.catalog.pages.is_empty());
        assert_eq!(3, content.skipped.len());
        Ok(())
    }
}

//! Site configuration. A project is a directory holding a `catalog.yaml` file
//! and a content directory:
//!
//! ```text
//! catalog.yaml
//! content/
//!     pipelines/*.csv
//!     resources/*.csv
//!     page_content/*.md
//! ```
//!
//! The base path under which the site is served depends on where it's being
//! deployed, which is described by a [`BuildEnv`]. Library code never reads the
//! process environment; the CLI builds the [`BuildEnv`] from flags and
//! environment variables.

use std::fmt::{self, Display};
use std::fs::File;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::pipeline::Pipeline;
use crate::record::Record;
use crate::resource::Resource;

const PROJECT_FILE: &str = "catalog.yaml";
const PAGES_DIRECTORY: &str = "page_content";

fn default_base_path() -> String {
    String::from("/")
}

fn default_content_directory() -> PathBuf {
    PathBuf::from("content")
}

#[derive(Deserialize)]
struct Project {
    /// The base path used for production builds.
    #[serde(default = "default_base_path")]
    base_path: String,

    #[serde(default)]
    modules: Vec<String>,

    #[serde(default)]
    css: Vec<String>,

    #[serde(default)]
    devtools: bool,

    #[serde(default)]
    compatibility_date: Option<NaiveDate>,

    #[serde(default = "default_content_directory")]
    content_directory: PathBuf,
}

/// The resolved configuration for a project.
#[derive(Debug, Clone)]
pub struct Config {
    pub project_root: PathBuf,
    pub base_path: String,

    /// Framework modules enabled for the site, e.g. `@nuxt/content`.
    pub modules: Vec<String>,

    /// Stylesheet entry paths.
    pub css: Vec<String>,
    pub devtools: bool,
    pub compatibility_date: Option<NaiveDate>,
    pub pipelines_directory: PathBuf,
    pub resources_directory: PathBuf,
    pub pages_directory: PathBuf,
}

impl Config {
    /// Looks for `catalog.yaml` in `dir` and then in each of its ancestors.
    pub fn from_directory(dir: &Path) -> Result<Config> {
        let mut current = Some(dir);
        while let Some(dir) = current {
            let path = dir.join(PROJECT_FILE);
            if path.is_file() {
                return Config::from_project_file(&path);
            }
            current = dir.parent();
        }
        Err(Error::ProjectFileNotFound(dir.to_owned()))
    }

    pub fn from_project_file(path: &Path) -> Result<Config> {
        let annotate = |err: Error| {
            Error::Annotated(
                format!("loading project file `{}`", path.display()),
                Box::new(err),
            )
        };
        let file = File::open(path).map_err(|e| annotate(e.into()))?;
        let project: Project =
            serde_yaml::from_reader(file).map_err(|e| annotate(e.into()))?;
        let project_root = match path.parent() {
            Some(parent) => parent.to_owned(),
            None => return Err(Error::NoParentDirectory(path.to_owned())),
        };
        Ok(Config::from_project(project_root, project))
    }

    fn from_project(project_root: PathBuf, project: Project) -> Config {
        let content = project_root.join(&project.content_directory);
        Config {
            pipelines_directory: content.join(Pipeline::COLLECTION),
            resources_directory: content.join(Resource::COLLECTION),
            pages_directory: content.join(PAGES_DIRECTORY),
            project_root,
            base_path: project.base_path,
            modules: project.modules,
            css: project.css,
            devtools: project.devtools,
            compatibility_date: project.compatibility_date,
        }
    }
}

/// Describes the deployment a build is for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildEnv {
    pub production: bool,

    /// Takes precedence over everything else when set and non-empty.
    pub base_path_override: Option<String>,
}

impl BuildEnv {
    /// Picks the base path: the override, else the configured base path for
    /// production builds, else `/`.
    pub fn resolve_base_path(&self, config: &Config) -> BasePath {
        match &self.base_path_override {
            Some(path) if !path.is_empty() => BasePath::new(path),
            _ if self.production => BasePath::new(&config.base_path),
            _ => BasePath::root(),
        }
    }
}

/// A site base path, always beginning and ending with `/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BasePath(String);

impl BasePath {
    pub fn new(path: &str) -> BasePath {
        let segments: Vec<&str> = path
            .trim()
            .split('/')
            .filter(|segment| !segment.is_empty())
            .collect();
        if segments.is_empty() {
            BasePath::root()
        } else {
            BasePath(format!("/{}/", segments.join("/")))
        }
    }

    pub fn root() -> BasePath {
        BasePath(String::from("/"))
    }

    /// Prefixes a site-relative path with the base path.
    pub fn link(&self, path: &str) -> String {
        format!("{}{}", self.0, path.trim_start_matches('/'))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BasePath {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Represents the result of loading a [`Config`].
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error loading a [`Config`].
#[derive(Debug)]
pub enum Error {
    /// Returned when no `catalog.yaml` exists in the starting directory or
    /// any of its ancestors.
    ProjectFileNotFound(PathBuf),

    /// Returned when the project file path has no parent directory.
    NoParentDirectory(PathBuf),

    /// Returned when the project file isn't valid YAML or doesn't match the
    /// expected structure.
    DeserializeYaml(serde_yaml::Error),

    /// Returned for I/O errors reading the project file.
    Io(std::io::Error),

    /// An error with an annotation.
    Annotated(String, Box<Error>),
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::ProjectFileNotFound(dir) => write!(
                f,
                "could not find `{}` in `{}` or any parent directory",
                PROJECT_FILE,
                dir.display()
            ),
            Error::NoParentDirectory(path) => write!(
                f,
                "can't get parent directory for project file `{}`",
                path.display()
            ),
            Error::DeserializeYaml(err) => err.fmt(f),
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
            Error::ProjectFileNotFound(_) => None,
            Error::NoParentDirectory(_) => None,
            Error::DeserializeYaml(err) => Some(err),
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

impl From<std::io::Error> for Error {
    /// Converts a [`std::io::Error`] into an [`Error`]. It allows us to
    /// use the `?` operator for fallible I/O functions.
    fn from(err: std::io::Error) -> Error {
        Error::Io(err)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn config(base_path: &str) -> Config {
        Config::from_project(
            PathBuf::from("/site"),
            Project {
                base_path: base_path.to_owned(),
                modules: Vec::new(),
                css: Vec::new(),
                devtools: false,
                compatibility_date: None,
                content_directory: default_content_directory(),
            },
        )
    }

    #[test]
    fn test_from_directory_searches_parents() -> Result<()> {
        let config = Config::from_directory(Path::new("./testdata/site/content/pipelines"))?;
        assert_eq!(Path::new("./testdata/site"), config.project_root);
        assert_eq!("/pipeline-catalog/", config.base_path);
        assert_eq!(vec!["@nuxt/content", "@nuxtjs/tailwindcss"], config.modules);
        assert_eq!(vec!["~/assets/css/main.css"], config.css);
        assert!(config.devtools);
        assert_eq!(NaiveDate::from_ymd_opt(2024, 4, 3), config.compatibility_date);
        assert_eq!(
            Path::new("./testdata/site/content/pipelines"),
            config.pipelines_directory
        );
        Ok(())
    }

    #[test]
    fn test_defaults() -> Result<()> {
        let config = Config::from_project_file(Path::new("./testdata/invalid/catalog.yaml"))?;
        assert_eq!("/", config.base_path);
        assert!(config.modules.is_empty());
        assert!(!config.devtools);
        assert_eq!(None, config.compatibility_date);
        Ok(())
    }

    #[test]
    fn test_resolve_base_path() {
        let config = config("docs/catalog");
        let development = BuildEnv::default();
        let production = BuildEnv {
            production: true,
            base_path_override: None,
        };
        let overridden = BuildEnv {
            production: true,
            base_path_override: Some("/preview".to_owned()),
        };
        let empty_override = BuildEnv {
            production: false,
            base_path_override: Some(String::new()),
        };
        assert_eq!("/", development.resolve_base_path(&config).as_str());
        assert_eq!("/docs/catalog/", production.resolve_base_path(&config).as_str());
        assert_eq!("/preview/", overridden.resolve_base_path(&config).as_str());
        assert_eq!("/", empty_override.resolve_base_path(&config).as_str());
    }

    #[test]
    fn test_base_path_link() {
        let base = BasePath::new("catalog//");
        assert_eq!("/catalog/", base.as_str());
        assert_eq!("/catalog/pipelines/foo", base.link("/pipelines/foo"));
        assert_eq!("/about", BasePath::root().link("about"));
    }
}

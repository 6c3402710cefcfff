//! The read-only query interface over a site's validated content. Every
//! comparison (keyword, language and ownership filters, text search and the
//! distinct facet lists) ignores case using the same Unicode-aware folding.

use std::collections::BTreeMap;

use crate::page::Page;
use crate::pipeline::Pipeline;
use crate::record::Record;
use crate::resource::Resource;

/// All of a site's validated content.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub pipelines: Vec<Pipeline>,
    pub resources: Vec<Resource>,
    pub pages: Vec<Page>,
}

impl Catalog {
    pub fn pipeline(&self, slug: &str) -> Option<&Pipeline> {
        self.pipelines.iter().find(|p| p.slug() == slug)
    }

    pub fn resource(&self, slug: &str) -> Option<&Resource> {
        self.resources.iter().find(|r| r.slug() == slug)
    }

    pub fn page(&self, id: &str) -> Option<&Page> {
        self.pages.iter().find(|p| p.id == id)
    }

    pub fn pipelines_with_keyword<'a>(
        &'a self,
        keyword: &'a str,
    ) -> impl Iterator<Item = &'a Pipeline> + 'a {
        with_keyword(&self.pipelines, keyword)
    }

    pub fn resources_with_keyword<'a>(
        &'a self,
        keyword: &'a str,
    ) -> impl Iterator<Item = &'a Resource> + 'a {
        with_keyword(&self.resources, keyword)
    }

    pub fn pipelines_by_language<'a>(
        &'a self,
        language: &'a str,
    ) -> impl Iterator<Item = &'a Pipeline> + 'a {
        self.pipelines
            .iter()
            .filter(move |p| same_folded(&p.language, language))
    }

    pub fn pipelines_by_ownership<'a>(
        &'a self,
        ownership: &'a str,
    ) -> impl Iterator<Item = &'a Pipeline> + 'a {
        self.pipelines
            .iter()
            .filter(move |p| same_folded(&p.ownership, ownership))
    }

    /// Case-insensitive substring search over pipeline and resource names and
    /// descriptions.
    pub fn search(&self, text: &str) -> SearchResults<'_> {
        let needle = fold(text);
        SearchResults {
            pipelines: matching(&self.pipelines, &needle),
            resources: matching(&self.resources, &needle),
        }
    }

    /// The distinct pipeline languages, sorted. Languages differing only in
    /// case are listed once, spelled as they first appear.
    pub fn languages(&self) -> Vec<&str> {
        distinct(self.pipelines.iter().map(|p| p.language.as_str()))
    }

    /// The distinct non-empty keywords across pipelines and resources,
    /// sorted and deduplicated like [`Catalog::languages`].
    pub fn keywords(&self) -> Vec<&str> {
        distinct(
            self.pipelines
                .iter()
                .flat_map(|p| p.keywords.iter())
                .chain(self.resources.iter().flat_map(|r| r.keywords.iter()))
                .map(String::as_str)
                .filter(|k| !k.is_empty()),
        )
    }
}

/// The records matched by [`Catalog::search`], in catalog order.
#[derive(Debug)]
pub struct SearchResults<'a> {
    pub pipelines: Vec<&'a Pipeline>,
    pub resources: Vec<&'a Resource>,
}

impl SearchResults<'_> {
    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty() && self.resources.is_empty()
    }
}

fn fold(s: &str) -> String {
    s.to_lowercase()
}

fn same_folded(a: &str, b: &str) -> bool {
    fold(a) == fold(b)
}

/// Keeps the first spelling of each case-folded value, ordered by the folded
/// value.
fn distinct<'a>(values: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
    let mut seen = BTreeMap::new();
    for value in values {
        seen.entry(fold(value)).or_insert(value);
    }
    seen.into_iter().map(|(_, value)| value).collect()
}

fn with_keyword<'a, R: Record + 'a>(
    records: &'a [R],
    keyword: &'a str,
) -> impl Iterator<Item = &'a R> + 'a {
    records.iter().filter(move |r| {
        r.keywords()
            .iter()
            .any(|k| same_folded(k, keyword))
    })
}

fn matching<'a, R: Record>(records: &'a [R], needle: &str) -> Vec<&'a R> {
    records
        .iter()
        .filter(|r| {
            fold(r.name()).contains(needle) || fold(r.description()).contains(needle)
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use url::Url;

    fn pipeline(name: &str, language: &str, keywords: &[&str]) -> Pipeline {
        Pipeline {
            name: name.to_owned(),
            url: Url::parse("https://example.org/").unwrap(),
            description: format!("{} does things", name),
            language: language.to_owned(),
            ownership: "TeamA".to_owned(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }

    fn catalog() -> Catalog {
        Catalog {
            pipelines: vec![
                pipeline("Variant Caller", "Python", &["bio", "genomics"]),
                pipeline("Assembly Stats", "Rust", &["Genomics", "qc"]),
                pipeline("Untagged", "python", &[""]),
            ],
            resources: vec![Resource {
                name: "Cluster docs".to_owned(),
                url: Url::parse("https://docs.example.org/").unwrap(),
                description: "Running variant calling on the cluster".to_owned(),
                keywords: vec!["hpc".to_owned()],
            }],
            pages: Vec::new(),
        }
    }

    #[test]
    fn test_lookup_by_slug() {
        let catalog = catalog();
        assert_eq!(
            Some("Assembly Stats"),
            catalog.pipeline("assembly-stats").map(|p| p.name.as_str())
        );
        assert!(catalog.resource("cluster-docs").is_some());
        assert!(catalog.pipeline("missing").is_none());
    }

    #[test]
    fn test_keyword_filter_ignores_case() {
        let catalog = catalog();
        let names: Vec<&str> = catalog
            .pipelines_with_keyword("genomics")
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(vec!["Variant Caller", "Assembly Stats"], names);
        assert_eq!(1, catalog.resources_with_keyword("HPC").count());
    }

    #[test]
    fn test_language_filter() {
        let catalog = catalog();
        assert_eq!(2, catalog.pipelines_by_language("Python").count());
        assert_eq!(3, catalog.pipelines_by_ownership("teama").count());
    }

    #[test]
    fn test_search() {
        let catalog = catalog();
        let results = catalog.search("VARIANT");
        assert_eq!(1, results.pipelines.len());
        assert_eq!(1, results.resources.len());
        assert!(catalog.search("nothing matches").is_empty());
    }

    #[test]
    fn test_languages_and_keywords() {
        let catalog = catalog();
        assert_eq!(vec!["Python", "Rust"], catalog.languages());
        assert_eq!(vec!["bio", "genomics", "hpc", "qc"], catalog.keywords());
    }

    #[test]
    fn test_non_ascii_matches_ignore_case() {
        let catalog = Catalog {
            pipelines: vec![
                pipeline("Ökologie Survey", "Élan", &["Ökologie"]),
                pipeline("Field Counts", "élan", &["ökologie", "Étude"]),
            ],
            ..Catalog::default()
        };
        assert_eq!(2, catalog.pipelines_with_keyword("ökologie").count());
        assert_eq!(1, catalog.pipelines_with_keyword("ÉTUDE").count());
        assert_eq!(2, catalog.pipelines_by_language("ÉLAN").count());
        assert_eq!(1, catalog.search("ÖKOLOGIE").pipelines.len());
        assert_eq!(vec!["Élan"], catalog.languages());
        assert_eq!(vec!["Étude", "Ökologie"], catalog.keywords());
    }
}

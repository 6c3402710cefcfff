//! Defines the [`Pipeline`] record, one row of the `pipelines` collection.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::record::{join_keywords, Fields, RawRecord, Record, ValidationErrors};

const NAME: &str = "pipeline_name";
const URL: &str = "pipeline_url";
const DESCRIPTION: &str = "pipeline_description";
const LANGUAGE: &str = "pipeline_language";
const OWNERSHIP: &str = "pipeline_ownership";
const KEYWORDS: &str = "pipeline_keywords";

/// A data-processing pipeline listed on the site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pipeline {
    #[serde(rename = "pipeline_name")]
    pub name: String,

    #[serde(rename = "pipeline_url")]
    pub url: Url,

    #[serde(rename = "pipeline_description")]
    pub description: String,

    /// The implementation language, e.g. `Python`.
    #[serde(rename = "pipeline_language")]
    pub language: String,

    /// The owning team.
    #[serde(rename = "pipeline_ownership")]
    pub ownership: String,

    #[serde(rename = "pipeline_keywords")]
    pub keywords: Vec<String>,
}

impl Record for Pipeline {
    const COLLECTION: &'static str = "pipelines";
    const FIELDS: &'static [&'static str] =
        &[NAME, URL, DESCRIPTION, LANGUAGE, OWNERSHIP, KEYWORDS];

    fn validate(raw: &RawRecord) -> Result<Pipeline, ValidationErrors> {
        let mut fields = Fields::new(raw);
        let name = fields.string(NAME);
        let url = fields.url(URL);
        let description = fields.string(DESCRIPTION);
        let language = fields.string(LANGUAGE);
        let ownership = fields.string(OWNERSHIP);
        let keywords = fields.keywords(KEYWORDS);
        fields.finish(|| {
            Some(Pipeline {
                name: name?,
                url: url?,
                description: description?,
                language: language?,
                ownership: ownership?,
                keywords: keywords?,
            })
        })
    }

    fn to_raw(&self) -> RawRecord {
        let mut raw = RawRecord::new();
        raw.insert(NAME.to_owned(), self.name.clone());
        raw.insert(URL.to_owned(), self.url.to_string());
        raw.insert(DESCRIPTION.to_owned(), self.description.clone());
        raw.insert(LANGUAGE.to_owned(), self.language.clone());
        raw.insert(OWNERSHIP.to_owned(), self.ownership.clone());
        raw.insert(KEYWORDS.to_owned(), join_keywords(&self.keywords));
        raw
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn keywords(&self) -> &[String] {
        &self.keywords
    }

    fn description(&self) -> &str {
        &self.description
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::record::FieldError;

    fn raw(pairs: &[(&str, &str)]) -> RawRecord {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn foo(keywords: &str) -> RawRecord {
        raw(&[
            ("pipeline_name", "Foo"),
            ("pipeline_url", "https://x.com"),
            ("pipeline_description", "d"),
            ("pipeline_language", "Python"),
            ("pipeline_ownership", "TeamA"),
            ("pipeline_keywords", keywords),
        ])
    }

    #[test]
    fn test_validate_valid_pipeline() -> Result<(), Box<dyn std::error::Error>> {
        let pipeline = Pipeline::validate(&foo("bio, genomics,  qc"))?;
        assert_eq!(
            Pipeline {
                name: "Foo".to_owned(),
                url: Url::parse("https://x.com")?,
                description: "d".to_owned(),
                language: "Python".to_owned(),
                ownership: "TeamA".to_owned(),
                keywords: vec!["bio".into(), "genomics".into(), "qc".into()],
            },
            pipeline
        );
        Ok(())
    }

    #[test]
    fn test_validate_empty_keywords() -> Result<(), ValidationErrors> {
        let pipeline = Pipeline::validate(&foo(""))?;
        assert_eq!(vec![String::new()], pipeline.keywords);
        Ok(())
    }

    #[test]
    fn test_validate_invalid_url() {
        let mut row = foo("qc");
        row.insert("pipeline_url".to_owned(), "not-a-url".to_owned());
        assert_eq!(
            Err(ValidationErrors(vec![FieldError::InvalidUrl {
                field: "pipeline_url".to_owned(),
                value: "not-a-url".to_owned(),
            }])),
            Pipeline::validate(&row)
        );
    }

    #[test]
    fn test_validate_reports_all_missing_fields_in_order() {
        let row = raw(&[("pipeline_url", "https://x.com"), ("pipeline_language", "")]);
        let errs = match Pipeline::validate(&row) {
            Ok(p) => panic!("unexpected success: {:?}", p),
            Err(errs) => errs,
        };
        let fields: Vec<&str> = errs.iter().map(FieldError::field).collect();
        assert_eq!(
            vec![
                "pipeline_name",
                "pipeline_description",
                "pipeline_language",
                "pipeline_ownership",
                "pipeline_keywords",
            ],
            fields
        );
    }

    #[test]
    fn test_validate_ignores_unknown_columns() -> Result<(), ValidationErrors> {
        let mut row = foo("qc");
        row.insert("notes".to_owned(), "whatever".to_owned());
        Pipeline::validate(&row)?;
        Ok(())
    }

    #[test]
    fn test_revalidating_raw_form_is_idempotent() -> Result<(), ValidationErrors> {
        let pipeline = Pipeline::validate(&foo(" bio ,genomics, , qc"))?;
        assert_eq!(pipeline, Pipeline::validate(&pipeline.to_raw())?);
        Ok(())
    }

    #[test]
    fn test_slug() -> Result<(), ValidationErrors> {
        let mut row = foo("qc");
        row.insert("pipeline_name".to_owned(), "RNA-seq QC Pipeline".to_owned());
        assert_eq!("rna-seq-qc-pipeline", Pipeline::validate(&row)?.slug());
        Ok(())
    }
}

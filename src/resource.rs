//! Defines the [`Resource`] record, one row of the `resources` collection.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::record::{join_keywords, Fields, RawRecord, Record, ValidationErrors};

const NAME: &str = "resource_name";
const URL: &str = "resource_url";
const DESCRIPTION: &str = "resource_description";
const KEYWORDS: &str = "resource_keywords";

/// A documentation page, dataset, or other link listed on the site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    #[serde(rename = "resource_name")]
    pub name: String,

    #[serde(rename = "resource_url")]
    pub url: Url,

    #[serde(rename = "resource_description")]
    pub description: String,

    #[serde(rename = "resource_keywords")]
    pub keywords: Vec<String>,
}

impl Record for Resource {
    const COLLECTION: &'static str = "resources";
    const FIELDS: &'static [&'static str] = &[NAME, URL, DESCRIPTION, KEYWORDS];

    fn validate(raw: &RawRecord) -> Result<Resource, ValidationErrors> {
        let mut fields = Fields::new(raw);
        let name = fields.string(NAME);
        let url = fields.url(URL);
        let description = fields.string(DESCRIPTION);
        let keywords = fields.keywords(KEYWORDS);
        fields.finish(|| {
            Some(Resource {
                name: name?,
                url: url?,
                description: description?,
                keywords: keywords?,
            })
        })
    }

    fn to_raw(&self) -> RawRecord {
        let mut raw = RawRecord::new();
        raw.insert(NAME.to_owned(), self.name.clone());
        raw.insert(URL.to_owned(), self.url.to_string());
        raw.insert(DESCRIPTION.to_owned(), self.description.clone());
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

use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::config::HttpSettings;
use crate::domain::UniprotAccession;
use crate::error::KiraError;
use crate::http::ApiClient;

const SERVICE: &str = "Protein Atlas";

pub const DEFAULT_ATLAS_BASE: &str = "https://www.proteinatlas.org";

pub trait AtlasClient: Send + Sync {
    /// `Ok(None)` when the atlas has no entry for the accession.
    fn fetch(&self, id: &UniprotAccession) -> Result<Option<AtlasSummary>, KiraError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct AtlasSummary {
    pub chromosome: String,
    pub chromosome_position: String,
    pub protein_class: Vec<String>,
    pub biological_process: Vec<String>,
    pub molecular_function: Vec<String>,
    pub url: String,
}

#[derive(Clone)]
pub struct AtlasHttpClient {
    api: ApiClient,
    base_url: String,
}

impl AtlasHttpClient {
    pub fn new(http: &HttpSettings) -> Result<Self, KiraError> {
        Self::with_base_url(http, DEFAULT_ATLAS_BASE)
    }

    pub fn with_base_url(http: &HttpSettings, base_url: &str) -> Result<Self, KiraError> {
        Ok(Self {
            api: ApiClient::new(SERVICE, http)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

impl AtlasClient for AtlasHttpClient {
    fn fetch(&self, id: &UniprotAccession) -> Result<Option<AtlasSummary>, KiraError> {
        let url = format!("{}/api/search_download.php", self.base_url);
        let raw: Value = self.api.get_json(
            &url,
            &[
                ("search", id.as_str()),
                ("columns", "chr,chrp,pc,upbp,up_mf"),
                ("compress", "no"),
                ("format", "json"),
            ],
        )?;
        info!(accession = %id, "Protein Atlas data retrieved");
        Ok(build_atlas_summary(&raw, id))
    }
}

/// Normalises the first row of a `search_download.php` answer.
pub fn build_atlas_summary(raw: &Value, id: &UniprotAccession) -> Option<AtlasSummary> {
    let row = raw.as_array().and_then(|rows| rows.first())?;
    Some(AtlasSummary {
        chromosome: scalar(row.get("Chromosome")),
        chromosome_position: scalar(row.get("Position")),
        protein_class: string_list(row.get("Protein class")),
        biological_process: string_list(row.get("Biological process")),
        molecular_function: string_list(row.get("Molecular function")),
        url: format!("https://www.proteinatlas.org/search/{}", id.as_str()),
    })
}

fn scalar(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Number(number)) => number.to_string(),
        _ => String::new(),
    }
}

/// The atlas reports multi-valued columns as arrays, single values as strings and gaps as null.
fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_str().map(|v| v.to_string()))
            .collect(),
        Some(Value::String(text)) if !text.is_empty() => vec![text.clone()],
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn summary_from_first_row() {
        let id: UniprotAccession = "P04637".parse().unwrap();
        let raw = json!([{
            "Chromosome": "17",
            "Position": "7661779-7687538",
            "Protein class": ["Cancer-related genes", "Disease related genes"],
            "Biological process": ["Apoptosis", "Cell cycle"],
            "Molecular function": "DNA-binding",
        }]);
        let summary = build_atlas_summary(&raw, &id).unwrap();
        assert_eq!(summary.chromosome, "17");
        assert_eq!(summary.biological_process, vec!["Apoptosis", "Cell cycle"]);
        assert_eq!(summary.molecular_function, vec!["DNA-binding"]);
        assert_eq!(summary.url, "https://www.proteinatlas.org/search/P04637");
    }

    #[test]
    fn empty_answer_has_no_summary() {
        let id: UniprotAccession = "P04637".parse().unwrap();
        assert!(build_atlas_summary(&json!([]), &id).is_none());
    }
}

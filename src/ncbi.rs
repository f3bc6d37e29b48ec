use serde_json::Value;
use tracing::{debug, info};

use crate::config::HttpSettings;
use crate::domain::{NcbiAccession, SequenceRecord, TaxonId};
use crate::error::KiraError;
use crate::http::ApiClient;

const SERVICE: &str = "NCBI Entrez";

pub const DEFAULT_EUTILS_BASE: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";

pub trait SequenceArchive: Send + Sync {
    fn fetch_record(&self, accession: &NcbiAccession) -> Result<SequenceRecord, KiraError>;
}

pub trait TaxonomyLookup: Send + Sync {
    fn by_name(&self, species: &str) -> Result<Option<TaxonId>, KiraError>;
}

#[derive(Clone)]
pub struct NcbiHttpClient {
    api: ApiClient,
    base_url: String,
    email: Option<String>,
    tool: String,
    api_key: Option<String>,
}

impl NcbiHttpClient {
    pub fn new(http: &HttpSettings, email: Option<String>, tool: &str) -> Result<Self, KiraError> {
        Self::with_base_url(http, email, tool, DEFAULT_EUTILS_BASE)
    }

    pub fn with_base_url(
        http: &HttpSettings,
        email: Option<String>,
        tool: &str,
        base_url: &str,
    ) -> Result<Self, KiraError> {
        let api_key = std::env::var("NCBI_API_KEY")
            .ok()
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty());
        Ok(Self {
            api: ApiClient::new(SERVICE, http)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            email,
            tool: tool.to_string(),
            api_key,
        })
    }

    fn common_params(&self) -> Vec<(&str, &str)> {
        let mut params = vec![("tool", self.tool.as_str())];
        if let Some(email) = &self.email {
            params.push(("email", email.as_str()));
        }
        if let Some(key) = &self.api_key {
            params.push(("api_key", key.as_str()));
        }
        params
    }
}

impl SequenceArchive for NcbiHttpClient {
    fn fetch_record(&self, accession: &NcbiAccession) -> Result<SequenceRecord, KiraError> {
        info!(accession = %accession, "fetching protein record from NCBI");
        let url = format!("{}/efetch.fcgi", self.base_url);
        let mut params = vec![
            ("db", "protein"),
            ("id", accession.as_str()),
            ("rettype", "gb"),
            ("retmode", "text"),
        ];
        params.extend(self.common_params());

        let text = match self.api.get_text(&url, &params) {
            Ok(text) => text,
            Err(KiraError::Status { status: 400, .. }) | Err(KiraError::Status { status: 404, .. }) => {
                return Err(KiraError::RecordNotFound(accession.to_string()));
            }
            Err(err) => return Err(err),
        };
        if !text.trim_start().starts_with("LOCUS") {
            return Err(KiraError::RecordNotFound(accession.to_string()));
        }
        parse_genbank(&text)
    }
}

impl TaxonomyLookup for NcbiHttpClient {
    fn by_name(&self, species: &str) -> Result<Option<TaxonId>, KiraError> {
        let url = format!("{}/esearch.fcgi", self.base_url);
        let mut params = vec![("db", "taxonomy"), ("term", species), ("retmode", "json")];
        params.extend(self.common_params());

        let raw: Value = self.api.get_json(&url, &params)?;
        let taxon = raw
            .get("esearchresult")
            .and_then(|v| v.get("idlist"))
            .and_then(|v| v.as_array())
            .and_then(|arr| arr.first())
            .and_then(|v| v.as_str())
            .map(|v| v.parse::<TaxonId>())
            .transpose()?;
        debug!(species, taxon = ?taxon, "taxonomy lookup");
        Ok(taxon)
    }
}

/// Parses the first record of a GenBank flat file. Only the fields the pipeline uses are kept:
/// LOCUS name, DEFINITION (trailing period removed), VERSION (falling back to ACCESSION) and the
/// ORIGIN residues, upper-cased.
pub fn parse_genbank(text: &str) -> Result<SequenceRecord, KiraError> {
    let mut name = None;
    let mut accession = None;
    let mut version = None;
    let mut definition: Vec<&str> = Vec::new();
    let mut sequence = String::new();
    let mut section = "";

    for line in text.lines() {
        if line.starts_with("//") {
            break;
        }
        let (key, rest) = split_keyword(line);
        if !key.is_empty() {
            section = key;
            match key {
                "LOCUS" => name = rest.split_whitespace().next().map(|v| v.to_string()),
                "DEFINITION" => definition.push(rest.trim()),
                "ACCESSION" => accession = rest.split_whitespace().next().map(|v| v.to_string()),
                "VERSION" => version = rest.split_whitespace().next().map(|v| v.to_string()),
                _ => {}
            }
            continue;
        }
        match section {
            "DEFINITION" => definition.push(rest.trim()),
            "ORIGIN" => sequence.extend(
                line.chars()
                    .filter(|c| c.is_ascii_alphabetic())
                    .map(|c| c.to_ascii_uppercase()),
            ),
            _ => {}
        }
    }

    let name = name.ok_or_else(|| KiraError::malformed(SERVICE, "GenBank record without LOCUS"))?;
    let description = definition.join(" ");
    let description = description.strip_suffix('.').unwrap_or(&description).to_string();
    Ok(SequenceRecord {
        accession: version.or(accession).unwrap_or_else(|| name.clone()),
        name,
        description,
        sequence,
    })
}

/// GenBank keywords occupy the first 12 columns; continuation lines leave them blank.
fn split_keyword(line: &str) -> (&str, &str) {
    if line.starts_with(' ') || line.is_empty() {
        return ("", line);
    }
    match line.split_once(char::is_whitespace) {
        Some((key, rest)) => (key, rest),
        None => (line, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_split() {
        assert_eq!(split_keyword("LOCUS       X 10 aa"), ("LOCUS", "      X 10 aa"));
        assert_eq!(split_keyword("            more text"), ("", "            more text"));
        assert_eq!(split_keyword("ORIGIN"), ("ORIGIN", ""));
    }
}

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::HttpSettings;
use crate::domain::{TaxonId, UniprotAccession};
use crate::error::KiraError;
use crate::http::ApiClient;

const SERVICE: &str = "Reactome";

pub const DEFAULT_REACTOME_BASE: &str = "https://reactome.org";

pub trait PathwaySource: Send + Sync {
    fn pathways(
        &self,
        id: &UniprotAccession,
        taxon: Option<TaxonId>,
    ) -> Result<Vec<Pathway>, KiraError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pathway {
    pub name: String,
    pub url: String,
}

impl Pathway {
    pub fn from_stable_id(name: &str, stable_id: &str) -> Self {
        Self {
            name: name.to_string(),
            url: format!("https://reactome.org/content/detail/{stable_id}"),
        }
    }
}

/// Comma-joined pathway names, the form fed to the summary prompt.
pub fn pathway_names(pathways: &[Pathway]) -> String {
    pathways
        .iter()
        .map(|pathway| pathway.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MappedPathway {
    st_id: String,
    display_name: String,
}

#[derive(Clone)]
pub struct ReactomeHttpClient {
    api: ApiClient,
    base_url: String,
}

impl ReactomeHttpClient {
    pub fn new(http: &HttpSettings) -> Result<Self, KiraError> {
        Self::with_base_url(http, DEFAULT_REACTOME_BASE)
    }

    pub fn with_base_url(http: &HttpSettings, base_url: &str) -> Result<Self, KiraError> {
        Ok(Self {
            api: ApiClient::new(SERVICE, http)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

impl PathwaySource for ReactomeHttpClient {
    /// Lower-level pathways the accession participates in. Reactome answers 404 when it has
    /// none, which is reported as an empty list.
    fn pathways(
        &self,
        id: &UniprotAccession,
        taxon: Option<TaxonId>,
    ) -> Result<Vec<Pathway>, KiraError> {
        let url = format!(
            "{}/ContentService/data/mapping/UniProt/{}/pathways",
            self.base_url,
            id.as_str()
        );
        let species = taxon.map(|taxon| taxon.to_string());
        let params: Vec<(&str, &str)> = species
            .as_deref()
            .map(|species| vec![("species", species)])
            .unwrap_or_default();

        let mapped: Vec<MappedPathway> = match self.api.get_json(&url, &params) {
            Ok(mapped) => mapped,
            Err(KiraError::Status { status: 404, .. }) => Vec::new(),
            Err(err) => return Err(err),
        };
        info!(accession = %id, count = mapped.len(), "pathways retrieved");
        Ok(mapped
            .iter()
            .map(|pathway| Pathway::from_stable_id(&pathway.display_name, &pathway.st_id))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_comma_joined() {
        let pathways = vec![
            Pathway::from_stable_id("Apoptosis", "R-HSA-109581"),
            Pathway::from_stable_id("Cell Cycle", "R-HSA-1640170"),
        ];
        assert_eq!(pathway_names(&pathways), "Apoptosis, Cell Cycle");
        assert_eq!(
            pathways[0].url,
            "https://reactome.org/content/detail/R-HSA-109581"
        );
    }
}

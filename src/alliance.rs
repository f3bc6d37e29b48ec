use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::config::HttpSettings;
use crate::domain::{TaxonId, UniprotAccession};
use crate::error::KiraError;
use crate::http::ApiClient;

const SERVICE: &str = "Alliance of Genome Resources";

pub const DEFAULT_ALLIANCE_BASE: &str = "https://www.alliancegenome.org";

const DISEASE_PAGE_LIMIT: &str = "50";
const DISEASE_PAGES: u32 = 3;

/// Disease Ontology slim terms used to bucket annotations, in report order.
pub const DISEASE_SLIM: [(&str, &str); 30] = [
    ("0050117", "All disease by infectious agent"),
    ("104", "Bacterial infectious disease"),
    ("1564", "Fungal infectious disease"),
    ("1398", "Parasitic infectious disease"),
    ("934", "Viral infectious disease"),
    ("7", "All disease of anatomical entity"),
    ("1287", "Cardiovascular system disease"),
    ("331", "Central Nervous system disease"),
    ("28", "Endocrine system disease"),
    ("77", "Gastrointestinal system disease"),
    ("74", "Hematopoietic system disease"),
    ("2914", "Immune system disease"),
    ("16", "Integumentary system disease"),
    ("17", "Musculoskeletal system disease"),
    ("574", "Peripheral nervous system disease"),
    ("15", "Reproductive system disease"),
    ("1579", "Respiratory system disease"),
    ("0050155", "Sensory system disease"),
    ("0060118", "Thoracic disease"),
    ("18", "Urinary system disease"),
    ("0060072", "Benign neoplasm"),
    ("162", "Cancer"),
    ("0060071", "Pre-malignant neoplasm"),
    ("0080014", "Chromosomal disease"),
    ("0050177", "Monogenic disease"),
    ("0080577", "Polygenic disease"),
    ("150", "Disease of mental health"),
    ("0014667", "Disease of metabolism"),
    ("0080015", "Physical disorder"),
    ("225", "Syndrome"),
];

pub trait AllianceClient: Send + Sync {
    fn gene_id(&self, id: &UniprotAccession) -> Result<Option<String>, KiraError>;
    fn gene_info(&self, gene_id: &str) -> Result<GeneInfo, KiraError>;
    fn disease_annotations(
        &self,
        gene_id: &str,
        taxon: Option<TaxonId>,
    ) -> Result<Vec<DiseaseAnnotation>, KiraError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct GeneInfo {
    pub id: String,
    pub symbol: String,
    pub name: String,
    pub synopsis: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiseaseAnnotation {
    pub disease_name: String,
    pub disease_id: String,
    pub association_type: String,
    pub parent_slim_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiseaseLink {
    pub name: String,
    pub curie: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct DiseaseAssociations {
    pub marker_in: Vec<DiseaseLink>,
    pub implicated_in: Vec<DiseaseLink>,
}

impl DiseaseAssociations {
    /// `is_marker_for` relations go to `marker_in`; every other relation counts as implication.
    pub fn from_annotations(annotations: &[DiseaseAnnotation]) -> Self {
        let mut associations = Self::default();
        for annotation in annotations {
            let link = DiseaseLink {
                name: annotation.disease_name.clone(),
                curie: annotation.disease_id.clone(),
            };
            if annotation.association_type == "is_marker_for" {
                associations.marker_in.push(link);
            } else {
                associations.implicated_in.push(link);
            }
        }
        associations
    }

    pub fn is_empty(&self) -> bool {
        self.marker_in.is_empty() && self.implicated_in.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiseaseCategory {
    pub doid: &'static str,
    pub name: &'static str,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiseaseCategoryCounts {
    pub categories: Vec<DiseaseCategory>,
}

impl DiseaseCategoryCounts {
    /// Counts each slim term once per annotation that lists it among its `parentSlimIDs`.
    pub fn from_annotations(annotations: &[DiseaseAnnotation]) -> Self {
        let mut categories: Vec<DiseaseCategory> = DISEASE_SLIM
            .iter()
            .map(|&(doid, name)| DiseaseCategory {
                doid,
                name,
                count: 0,
            })
            .collect();
        for annotation in annotations {
            for parent in &annotation.parent_slim_ids {
                let local = parent.split_once(':').map_or(parent.as_str(), |(_, id)| id);
                for category in categories.iter_mut().filter(|c| c.doid == local) {
                    category.count += 1;
                }
            }
        }
        Self { categories }
    }

    /// Categories worth plotting: no "All ..." roll-ups, no empty buckets, smallest first.
    pub fn chartable(&self) -> Vec<&DiseaseCategory> {
        let mut rows: Vec<&DiseaseCategory> = self
            .categories
            .iter()
            .filter(|category| !category.name.contains("All") && category.count > 0)
            .collect();
        rows.sort_by_key(|category| category.count);
        rows
    }
}

#[derive(Clone)]
pub struct AllianceHttpClient {
    api: ApiClient,
    base_url: String,
}

impl AllianceHttpClient {
    pub fn new(http: &HttpSettings) -> Result<Self, KiraError> {
        Self::with_base_url(http, DEFAULT_ALLIANCE_BASE)
    }

    pub fn with_base_url(http: &HttpSettings, base_url: &str) -> Result<Self, KiraError> {
        Ok(Self {
            api: ApiClient::new(SERVICE, http)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn disease_page(
        &self,
        gene_id: &str,
        taxon: Option<&str>,
        page: u32,
    ) -> Result<Vec<DiseaseAnnotation>, KiraError> {
        let url = format!("{}/api/disease", self.base_url);
        let page = page.to_string();
        let mut params = vec![
            ("asc", "true"),
            ("geneID", gene_id),
            ("includeNegation", "false"),
            ("limit", DISEASE_PAGE_LIMIT),
            ("page", page.as_str()),
        ];
        if let Some(taxon) = taxon {
            params.push(("focusTaxonId", taxon));
        }
        let raw: Value = self.api.get_json(&url, &params)?;
        Ok(parse_disease_annotations(&raw))
    }
}

impl AllianceClient for AllianceHttpClient {
    fn gene_id(&self, id: &UniprotAccession) -> Result<Option<String>, KiraError> {
        let url = format!("{}/api/search", self.base_url);
        let raw: Value = self.api.get_json(
            &url,
            &[("category", "gene"), ("limit", "1"), ("q", id.as_str())],
        )?;
        let gene_id = raw
            .get("results")
            .and_then(|v| v.as_array())
            .and_then(|arr| arr.first())
            .and_then(|v| v.get("id"))
            .and_then(|v| v.as_str())
            .map(|v| v.to_string());
        info!(accession = %id, gene_id = ?gene_id, "Alliance gene id retrieved");
        Ok(gene_id)
    }

    fn gene_info(&self, gene_id: &str) -> Result<GeneInfo, KiraError> {
        let url = format!("{}/api/gene/{}", self.base_url, gene_id);
        let raw: Value = self.api.get_json(&url, &[])?;
        info!(gene_id, "gene information retrieved");
        Ok(build_gene_info(&raw, gene_id))
    }

    /// Up to three pages of annotations. A failing later page keeps what was already collected.
    fn disease_annotations(
        &self,
        gene_id: &str,
        taxon: Option<TaxonId>,
    ) -> Result<Vec<DiseaseAnnotation>, KiraError> {
        let focus = taxon.map(|taxon| format!("NCBITaxon:{taxon}"));
        let mut annotations = Vec::new();
        for page in 1..=DISEASE_PAGES {
            match self.disease_page(gene_id, focus.as_deref(), page) {
                Ok(batch) if batch.is_empty() => break,
                Ok(batch) => {
                    info!(page, count = batch.len(), "disease annotations retrieved");
                    annotations.extend(batch);
                }
                Err(err) if !annotations.is_empty() => {
                    warn!(page, error = %err, "stopping disease pagination");
                    break;
                }
                Err(err) => return Err(err),
            }
        }
        Ok(annotations)
    }
}

pub fn build_gene_info(raw: &Value, gene_id: &str) -> GeneInfo {
    let text = |key: &str| {
        raw.get(key)
            .and_then(|v| v.as_str())
            .map(|v| v.to_string())
    };
    GeneInfo {
        id: text("id").unwrap_or_else(|| gene_id.to_string()),
        symbol: text("symbol").unwrap_or_default(),
        name: text("name").unwrap_or_default(),
        synopsis: text("geneSynopsis")
            .or_else(|| text("automatedGeneSynopsis"))
            .unwrap_or_default(),
    }
}

pub fn parse_disease_annotations(raw: &Value) -> Vec<DiseaseAnnotation> {
    let Some(results) = raw.get("results").and_then(|v| v.as_array()) else {
        return Vec::new();
    };
    results
        .iter()
        .filter_map(|entry| {
            let object = entry.get("object")?;
            let disease_name = object.get("name")?.as_str()?.to_string();
            let disease_id = object
                .get("curie")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string();
            let association_type = entry
                .get("relation")
                .and_then(|v| v.get("name"))
                .or_else(|| entry.get("generatedRelationString"))
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string();
            let parent_slim_ids = entry
                .get("parentSlimIDs")
                .and_then(|v| v.as_array())
                .map(|arr| {
                    arr.iter()
                        .filter_map(|v| v.as_str().map(|v| v.to_string()))
                        .collect()
                })
                .unwrap_or_default();
            Some(DiseaseAnnotation {
                disease_name,
                disease_id,
                association_type,
                parent_slim_ids,
            })
        })
        .collect()
}

use std::thread;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::config::{HttpSettings, ResolverSettings};
use crate::domain::{AnnotationScore, CandidateEntry, ReviewStatus, TaxonId, UniprotAccession};
use crate::error::KiraError;
use crate::http::ApiClient;
use crate::sequence::{ClusterFeature, Location};

const SERVICE: &str = "UniProt";
const PEPTIDE_SERVICE: &str = "UniProt peptide search";

pub const DEFAULT_REST_BASE: &str = "https://rest.uniprot.org";
pub const DEFAULT_PEPTIDE_BASE: &str = "https://peptidesearch.uniprot.org";

/// Batch peptide search: submit residue chunks, wait for the job, return the raw
/// comma-separated list of matching accessions.
pub trait PeptideSearch: Send + Sync {
    fn submit_and_poll(&self, chunks: &[String]) -> Result<String, KiraError>;
}

/// Free-text UniProtKB query restricted to one taxon.
pub trait KnowledgeBaseQuery: Send + Sync {
    fn search(&self, query: &str, taxon: TaxonId) -> Result<Vec<KnowledgeBaseRow>, KiraError>;
}

/// UniParc lookup by archive record name.
pub trait ArchiveClusterQuery: Send + Sync {
    fn search(&self, record_name: &str) -> Result<ArchiveCluster, KiraError>;
}

/// Full entries for a list of UniProtKB accessions.
pub trait AccessionDetailQuery: Send + Sync {
    fn fetch(&self, ids: &[String]) -> Result<Vec<AccessionDetail>, KiraError>;
}

pub trait UniprotClient: Send + Sync {
    fn fetch(&self, id: &UniprotAccession) -> Result<UniprotRecord, KiraError>;
}

/// One row of the UniProtKB TSV stream. Columns other than these are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct KnowledgeBaseRow {
    #[serde(rename = "Entry")]
    pub entry: String,
    #[serde(rename = "Reviewed")]
    pub reviewed: String,
    #[serde(rename = "Annotation")]
    pub annotation: String,
    #[serde(rename = "Sequence", default)]
    pub sequence: String,
}

impl KnowledgeBaseRow {
    pub fn annotation_score(&self) -> Option<AnnotationScore> {
        AnnotationScore::parse(&self.annotation)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveCluster {
    pub sequence: String,
    pub features: Vec<ClusterFeature>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccessionDetail {
    pub primary_accession: String,
    pub organism: String,
    pub entry_type: String,
    pub annotation_score: Option<f64>,
    pub sequence: String,
}

impl AccessionDetail {
    pub fn to_candidate(&self) -> CandidateEntry {
        CandidateEntry {
            entry_id: self.primary_accession.clone(),
            review_status: ReviewStatus::from_label(&self.entry_type),
            annotation_score: self.annotation_score.and_then(AnnotationScore::from_decimal),
            sequence: self.sequence.clone(),
            organism: self.organism.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct UniprotRecord {
    pub raw_json: Value,
    pub summary: ProteinSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProteinSummary {
    pub primary_accession: String,
    pub uniprot_link: String,
    pub filter_level: String,
    pub entry_audit: EntryAudit,
    pub annotation_score: Option<f64>,
    pub organism: OrganismInfo,
    pub full_name: String,
    pub gene_name: String,
    pub sequence: SequenceInfo,
    pub cofactors: String,
    pub tissue_specificity: String,
    pub induction: String,
    pub natural_variants: Vec<VariantSpan>,
    pub mutagenesis: Vec<VariantSpan>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct EntryAudit {
    pub first_public_date: Option<String>,
    pub last_annotation_update_date: Option<String>,
    pub entry_version: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct OrganismInfo {
    pub scientific_name: Option<String>,
    pub common_name: Option<String>,
    pub taxon_id: Option<TaxonId>,
    pub lineage: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct SequenceInfo {
    pub value: String,
    pub length: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct VariantSpan {
    pub start: u64,
    pub end: u64,
}

#[derive(Clone)]
pub struct UniprotHttpClient {
    api: ApiClient,
    peptide_api: ApiClient,
    rest_base: String,
    peptide_base: String,
    poll_attempts: usize,
    poll_interval: Duration,
}

impl UniprotHttpClient {
    pub fn new(http: &HttpSettings, resolver: &ResolverSettings) -> Result<Self, KiraError> {
        Self::with_base_urls(http, resolver, DEFAULT_REST_BASE, DEFAULT_PEPTIDE_BASE)
    }

    pub fn with_base_urls(
        http: &HttpSettings,
        resolver: &ResolverSettings,
        rest_base: &str,
        peptide_base: &str,
    ) -> Result<Self, KiraError> {
        Ok(Self {
            api: ApiClient::new(SERVICE, http)?,
            peptide_api: ApiClient::new(PEPTIDE_SERVICE, http)?,
            rest_base: rest_base.trim_end_matches('/').to_string(),
            peptide_base: peptide_base.trim_end_matches('/').to_string(),
            poll_attempts: resolver.poll_attempts.max(1),
            poll_interval: Duration::from_secs(resolver.poll_interval_secs),
        })
    }

    fn resolve_location(&self, location: &str) -> Result<String, KiraError> {
        if location.starts_with("http://") || location.starts_with("https://") {
            return Ok(location.to_string());
        }
        let base = Url::parse(&format!("{}/", self.peptide_base))
            .map_err(|err| KiraError::malformed(PEPTIDE_SERVICE, err.to_string()))?;
        base.join(location)
            .map(|url| url.to_string())
            .map_err(|err| KiraError::malformed(PEPTIDE_SERVICE, err.to_string()))
    }

    fn poll_job(&self, link: &str) -> Result<String, KiraError> {
        for attempt in 1..=self.poll_attempts {
            let response = self
                .peptide_api
                .send_with_retries(|| self.peptide_api.inner().get(link))?;
            match response.status() {
                StatusCode::OK => {
                    info!("peptide search results retrieved");
                    return response
                        .text()
                        .map_err(|err| KiraError::http(PEPTIDE_SERVICE, err));
                }
                StatusCode::ACCEPTED => {
                    debug!(attempt, "peptide search still processing");
                    thread::sleep(self.poll_interval);
                }
                _ => {
                    self.peptide_api.handle_status(response)?;
                    return Err(KiraError::malformed(
                        PEPTIDE_SERVICE,
                        "unexpected status while polling",
                    ));
                }
            }
        }
        Err(KiraError::NotReady {
            service: PEPTIDE_SERVICE,
            attempts: self.poll_attempts,
        })
    }
}

impl PeptideSearch for UniprotHttpClient {
    fn submit_and_poll(&self, chunks: &[String]) -> Result<String, KiraError> {
        let url = format!("{}/asyncrest", self.peptide_base);
        let peps = chunks.join(",");
        let response = self.peptide_api.post_form(
            &url,
            &[("peps", peps.as_str()), ("lEQi", "off"), ("spOnly", "off")],
        )?;

        if response.status() != StatusCode::ACCEPTED {
            let response = self.peptide_api.handle_status(response)?;
            return Err(KiraError::malformed(
                PEPTIDE_SERVICE,
                format!("expected 202 Accepted, got {}", response.status().as_u16()),
            ));
        }
        info!("peptide search job accepted");

        let location = response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| KiraError::malformed(PEPTIDE_SERVICE, "empty job location"))?;
        let link = self.resolve_location(location.trim())?;
        self.poll_job(&link)
    }
}

impl KnowledgeBaseQuery for UniprotHttpClient {
    fn search(&self, query: &str, taxon: TaxonId) -> Result<Vec<KnowledgeBaseRow>, KiraError> {
        let url = format!("{}/uniprotkb/stream", self.rest_base);
        let full_query = format!("({query} AND (taxonomy_id:{taxon}))");
        let text = self.api.get_text(
            &url,
            &[
                (
                    "fields",
                    "accession,reviewed,id,protein_name,gene_names,annotation_score,sequence",
                ),
                ("format", "tsv"),
                ("query", full_query.as_str()),
            ],
        )?;
        parse_knowledge_base_tsv(&text)
    }
}

impl ArchiveClusterQuery for UniprotHttpClient {
    fn search(&self, record_name: &str) -> Result<ArchiveCluster, KiraError> {
        let url = format!("{}/uniparc/stream", self.rest_base);
        let query = format!("({record_name})");
        let raw: Value = self
            .api
            .get_json(&url, &[("format", "json"), ("query", query.as_str())])?;
        parse_archive_cluster(&raw)
    }
}

impl AccessionDetailQuery for UniprotHttpClient {
    fn fetch(&self, ids: &[String]) -> Result<Vec<AccessionDetail>, KiraError> {
        let url = format!("{}/uniprotkb/accessions", self.rest_base);
        let accessions = ids
            .iter()
            .map(|id| id.trim())
            .filter(|id| !id.is_empty())
            .collect::<Vec<_>>()
            .join(",");
        let raw: Value = self.api.get_json(
            &url,
            &[("accessions", accessions.as_str()), ("format", "json")],
        )?;
        parse_accession_details(&raw)
    }
}

impl UniprotClient for UniprotHttpClient {
    fn fetch(&self, id: &UniprotAccession) -> Result<UniprotRecord, KiraError> {
        info!(accession = %id, "grabbing protein info from UniProt");
        let url = format!("{}/uniprotkb/{}.json", self.rest_base, id.as_str());
        let raw_json: Value = self.api.get_json(&url, &[])?;
        let summary = build_protein_summary(&raw_json)?;
        Ok(UniprotRecord { raw_json, summary })
    }
}

pub fn parse_knowledge_base_tsv(text: &str) -> Result<Vec<KnowledgeBaseRow>, KiraError> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .quoting(false)
        .flexible(true)
        .from_reader(text.as_bytes());
    reader
        .deserialize::<KnowledgeBaseRow>()
        .map(|row| row.map_err(|err| KiraError::malformed(SERVICE, err.to_string())))
        .collect()
}

pub fn parse_archive_cluster(raw: &Value) -> Result<ArchiveCluster, KiraError> {
    let first = raw
        .get("results")
        .and_then(|v| v.as_array())
        .and_then(|arr| arr.first())
        .ok_or_else(|| KiraError::malformed(SERVICE, "UniParc query returned no results"))?;
    let sequence = first
        .get("sequence")
        .and_then(|v| v.get("value"))
        .and_then(|v| v.as_str())
        .ok_or_else(|| KiraError::malformed(SERVICE, "UniParc entry without sequence"))?
        .to_string();

    let mut features = Vec::new();
    if let Some(items) = first.get("sequenceFeatures").and_then(|v| v.as_array()) {
        for item in items {
            let locations = item
                .get("locations")
                .and_then(|v| v.as_array())
                .map(|locs| {
                    locs.iter()
                        .filter_map(|loc| {
                            let start = loc.get("start").and_then(|v| v.as_u64())?;
                            let end = loc.get("end").and_then(|v| v.as_u64())?;
                            Some(Location {
                                start: start as usize,
                                end: end as usize,
                            })
                        })
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default();
            let interpro_group_id = item
                .get("interproGroup")
                .and_then(|v| v.get("id"))
                .and_then(|v| v.as_str())
                .map(|v| v.to_string());
            features.push(ClusterFeature {
                locations,
                interpro_group_id,
            });
        }
    }

    Ok(ArchiveCluster { sequence, features })
}

pub fn parse_accession_details(raw: &Value) -> Result<Vec<AccessionDetail>, KiraError> {
    let results = raw
        .get("results")
        .and_then(|v| v.as_array())
        .ok_or_else(|| KiraError::malformed(SERVICE, "accession query without results"))?;
    Ok(results
        .iter()
        .filter_map(|entry| {
            let primary_accession = entry.get("primaryAccession")?.as_str()?.to_string();
            Some(AccessionDetail {
                primary_accession,
                organism: entry
                    .get("organism")
                    .and_then(|v| v.get("scientificName"))
                    .and_then(|v| v.as_str())
                    .unwrap_or("")
                    .to_string(),
                entry_type: entry
                    .get("entryType")
                    .and_then(|v| v.as_str())
                    .unwrap_or("")
                    .to_string(),
                annotation_score: entry.get("annotationScore").and_then(|v| v.as_f64()),
                sequence: entry
                    .get("sequence")
                    .and_then(|v| v.get("value"))
                    .and_then(|v| v.as_str())
                    .unwrap_or("")
                    .to_string(),
            })
        })
        .collect())
}

/// Flattens a UniProtKB JSON entry into the attributes the report needs. Only the primary
/// accession is mandatory; everything else degrades to empty values.
pub fn build_protein_summary(raw: &Value) -> Result<ProteinSummary, KiraError> {
    let primary_accession = raw
        .get("primaryAccession")
        .and_then(|v| v.as_str())
        .ok_or_else(|| KiraError::malformed(SERVICE, "entry without primaryAccession"))?
        .to_string();

    let entry_audit = raw
        .get("entryAudit")
        .map(|audit| EntryAudit {
            first_public_date: audit
                .get("firstPublicDate")
                .and_then(|v| v.as_str())
                .map(|v| v.to_string()),
            last_annotation_update_date: audit
                .get("lastAnnotationUpdateDate")
                .and_then(|v| v.as_str())
                .map(|v| v.to_string()),
            entry_version: audit.get("entryVersion").and_then(|v| v.as_u64()),
        })
        .unwrap_or_default();

    let organism = raw
        .get("organism")
        .map(|org| OrganismInfo {
            scientific_name: org
                .get("scientificName")
                .and_then(|v| v.as_str())
                .map(|v| v.to_string()),
            common_name: org
                .get("commonName")
                .and_then(|v| v.as_str())
                .map(|v| v.to_string()),
            taxon_id: org
                .get("taxonId")
                .and_then(|v| v.as_u64())
                .and_then(|v| u32::try_from(v).ok())
                .map(TaxonId::new),
            lineage: org
                .get("lineage")
                .and_then(|v| v.as_array())
                .map(|arr| {
                    arr.iter()
                        .filter_map(|v| v.as_str().map(|v| v.to_string()))
                        .collect()
                })
                .unwrap_or_default(),
        })
        .unwrap_or_default();

    let full_name = raw
        .get("proteinDescription")
        .and_then(|v| v.get("recommendedName"))
        .and_then(|v| v.get("fullName"))
        .and_then(|v| v.get("value"))
        .and_then(|v| v.as_str())
        .or_else(|| {
            raw.get("proteinDescription")
                .and_then(|v| v.get("submissionNames"))
                .and_then(|v| v.as_array())
                .and_then(|arr| arr.first())
                .and_then(|v| v.get("fullName"))
                .and_then(|v| v.get("value"))
                .and_then(|v| v.as_str())
        })
        .unwrap_or("")
        .to_string();

    let gene_name = raw
        .get("genes")
        .and_then(|v| v.as_array())
        .and_then(|arr| arr.first())
        .and_then(|v| v.get("geneName"))
        .and_then(|v| v.get("value"))
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();

    let sequence = raw
        .get("sequence")
        .map(|seq| SequenceInfo {
            value: seq
                .get("value")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string(),
            length: seq.get("length").and_then(|v| v.as_u64()).unwrap_or(0),
        })
        .unwrap_or_default();

    let mut cofactors = Vec::new();
    let mut tissue_specificity = String::new();
    let mut induction = String::new();
    if let Some(comments) = raw.get("comments").and_then(|v| v.as_array()) {
        for comment in comments {
            match comment.get("commentType").and_then(|v| v.as_str()) {
                Some("TISSUE SPECIFICITY") => {
                    if let Some(text) = first_text(comment) {
                        tissue_specificity = text;
                    }
                }
                Some("INDUCTION") => {
                    if let Some(text) = first_text(comment) {
                        induction = text;
                    }
                }
                Some("COFACTOR") => cofactors.push(describe_cofactor(comment)),
                _ => {}
            }
        }
    }

    let mut natural_variants = Vec::new();
    let mut mutagenesis = Vec::new();
    if let Some(items) = raw.get("features").and_then(|v| v.as_array()) {
        for item in items {
            let target = match item.get("type").and_then(|v| v.as_str()) {
                Some("Natural variant") => &mut natural_variants,
                Some("Mutagenesis") => &mut mutagenesis,
                _ => continue,
            };
            let start = item
                .get("location")
                .and_then(|v| v.get("start"))
                .and_then(|v| v.get("value"))
                .and_then(|v| v.as_u64());
            let end = item
                .get("location")
                .and_then(|v| v.get("end"))
                .and_then(|v| v.get("value"))
                .and_then(|v| v.as_u64());
            if let (Some(start), Some(end)) = (start, end) {
                target.push(VariantSpan { start, end });
            }
        }
    }

    Ok(ProteinSummary {
        uniprot_link: format!("https://www.uniprot.org/uniprotkb/{primary_accession}/entry"),
        primary_accession,
        filter_level: "reviewed&annotationScore=5".to_string(),
        entry_audit,
        annotation_score: raw.get("annotationScore").and_then(|v| v.as_f64()),
        organism,
        full_name,
        gene_name,
        sequence,
        cofactors: cofactors.join(" "),
        tissue_specificity,
        induction,
        natural_variants,
        mutagenesis,
    })
}

fn first_text(comment: &Value) -> Option<String> {
    comment
        .get("texts")
        .and_then(|v| v.as_array())
        .and_then(|arr| arr.first())
        .and_then(|v| v.get("value"))
        .and_then(|v| v.as_str())
        .map(|v| v.to_string())
}

fn describe_cofactor(comment: &Value) -> String {
    let names = comment
        .get("cofactors")
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|c| c.get("name").and_then(|v| v.as_str()))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .unwrap_or_default();
    let notes = comment
        .get("note")
        .and_then(|v| v.get("texts"))
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|t| t.get("value").and_then(|v| v.as_str()))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .unwrap_or_default();
    if notes.is_empty() {
        names
    } else {
        format!("{names} - {notes}")
    }
}

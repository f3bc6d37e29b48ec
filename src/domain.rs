use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::KiraError;

static NCBI_ACCESSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Z0-9]+(?:_[A-Z0-9]+)?(?:\.[0-9]+)?$").expect("valid accession regex")
});

static NCBI_PROTEIN_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"protein/([A-Za-z0-9]+(?:_[A-Za-z0-9]+)?(?:\.[0-9]+)?)")
        .expect("valid protein url regex")
});

static UNIPROT_ACCESSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[OPQ][0-9][A-Z0-9]{3}[0-9]|[A-NR-Z][0-9](?:[A-Z][A-Z0-9]{2}[0-9]){1,2})$")
        .expect("valid uniprot regex")
});

/// Accession in the NCBI sequence archive (`7XZZ_K`, `NP_000537.3`, ...).
///
/// Parsing also accepts an NCBI protein page URL and pulls the accession out of it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NcbiAccession(String);

impl NcbiAccession {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NcbiAccession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for NcbiAccession {
    type Err = KiraError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let candidate = if trimmed.contains("://") {
            NCBI_PROTEIN_URL
                .captures(trimmed)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str())
                .ok_or_else(|| KiraError::InvalidAccession(value.to_string()))?
        } else {
            trimmed
        };
        let normalized = candidate.to_uppercase();
        if !NCBI_ACCESSION.is_match(&normalized) {
            return Err(KiraError::InvalidAccession(value.to_string()));
        }
        Ok(Self(normalized))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UniprotAccession(String);

impl UniprotAccession {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UniprotAccession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for UniprotAccession {
    type Err = KiraError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_uppercase();
        if !UNIPROT_ACCESSION.is_match(&normalized) {
            return Err(KiraError::InvalidUniprotId(value.to_string()));
        }
        Ok(Self(normalized))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaxonId(u32);

impl TaxonId {
    pub fn new(value: u32) -> Self {
        Self(value)
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for TaxonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TaxonId {
    type Err = KiraError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        value
            .trim()
            .parse::<u32>()
            .map(Self)
            .map_err(|_| KiraError::InvalidTaxonId(value.to_string()))
    }
}

/// Species the caller is interested in. The taxon id is resolved lazily and may be unknown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Organism {
    pub scientific_name: String,
    pub taxon_id: Option<TaxonId>,
}

impl Organism {
    pub fn new(scientific_name: &str, taxon_id: Option<TaxonId>) -> Result<Self, KiraError> {
        let scientific_name = scientific_name.trim();
        if scientific_name.is_empty() {
            return Err(KiraError::EmptySpecies);
        }
        Ok(Self {
            scientific_name: scientific_name.to_string(),
            taxon_id,
        })
    }
}

/// Protein record as held by the sequence archive. Immutable once fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SequenceRecord {
    pub accession: String,
    pub name: String,
    pub description: String,
    pub sequence: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewStatus {
    Reviewed,
    Unreviewed,
}

impl ReviewStatus {
    /// UniProt reports review state either as `reviewed`/`unreviewed` (TSV) or as an entry type
    /// such as `UniProtKB reviewed (Swiss-Prot)` (JSON).
    pub fn from_label(label: &str) -> Self {
        if label.to_lowercase().contains("unreviewed") {
            ReviewStatus::Unreviewed
        } else if label.to_lowercase().contains("reviewed") {
            ReviewStatus::Reviewed
        } else {
            ReviewStatus::Unreviewed
        }
    }
}

/// UniProt annotation score tier, 1 (lowest) to 5 (best curated).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct AnnotationScore(u8);

impl AnnotationScore {
    pub const MAX: u8 = 5;
    pub const MIN: u8 = 1;

    pub fn new(value: u8) -> Option<Self> {
        (Self::MIN..=Self::MAX).contains(&value).then_some(Self(value))
    }

    /// Scores arrive as decimals (`5.0`); anything outside 1..=5 is rejected.
    pub fn from_decimal(value: f64) -> Option<Self> {
        if !value.is_finite() || value.fract() != 0.0 {
            return None;
        }
        Self::new(value as u8)
    }

    pub fn parse(value: &str) -> Option<Self> {
        value.trim().parse::<f64>().ok().and_then(Self::from_decimal)
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// All tiers from best to worst.
    pub fn tiers() -> impl Iterator<Item = AnnotationScore> {
        (Self::MIN..=Self::MAX).rev().map(AnnotationScore)
    }
}

/// Unranked candidate returned by a knowledge-base query; lives for a single resolution call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateEntry {
    pub entry_id: String,
    pub review_status: ReviewStatus,
    pub annotation_score: Option<AnnotationScore>,
    pub sequence: String,
    pub organism: String,
}

use std::cmp::Reverse;

use tracing::debug;

use crate::domain::{AnnotationScore, CandidateEntry, ReviewStatus, TaxonId};
use crate::error::KiraError;
use crate::sequence::longest_common_substring;
use crate::uniprot::{AccessionDetailQuery, KnowledgeBaseQuery, KnowledgeBaseRow};

/// Splits the raw peptide-search answer into accessions. The service answers with a
/// comma-separated list, occasionally spread over several lines.
pub fn parse_id_list(raw: &str) -> Vec<String> {
    raw.split([',', '\n', '\r'])
        .map(|id| id.trim())
        .filter(|id| !id.is_empty())
        .map(|id| id.to_string())
        .collect()
}

pub fn filter_by_organism(candidates: &[CandidateEntry], species: &str) -> Vec<CandidateEntry> {
    candidates
        .iter()
        .filter(|candidate| candidate.organism == species)
        .cloned()
        .collect()
}

pub fn filter_reviewed(candidates: &[CandidateEntry]) -> Vec<CandidateEntry> {
    candidates
        .iter()
        .filter(|candidate| candidate.review_status == ReviewStatus::Reviewed)
        .cloned()
        .collect()
}

/// Candidates of the best annotation tier present, trying 5 down to 1. Entries without a
/// usable score never qualify.
pub fn top_annotation_tier(candidates: &[CandidateEntry]) -> Vec<CandidateEntry> {
    for tier in AnnotationScore::tiers() {
        let matching: Vec<CandidateEntry> = candidates
            .iter()
            .filter(|candidate| candidate.annotation_score == Some(tier))
            .cloned()
            .collect();
        if !matching.is_empty() {
            return matching;
        }
    }
    Vec::new()
}

/// Organism, then review state, then annotation tier. An empty step ends the chain.
pub fn filter_candidates(candidates: &[CandidateEntry], species: &str) -> Vec<CandidateEntry> {
    let same_species = filter_by_organism(candidates, species);
    if same_species.is_empty() {
        debug!(species, "no candidate matches the organism");
        return Vec::new();
    }
    let reviewed = filter_reviewed(&same_species);
    if reviewed.is_empty() {
        debug!("no reviewed candidate left");
        return Vec::new();
    }
    top_annotation_tier(&reviewed)
}

/// Fetches full entries for a peptide-search id list and keeps the best curated one for the
/// species. `Ok(None)` when nothing survives filtering.
pub fn search_and_filter(
    ids: &str,
    species: &str,
    details: &dyn AccessionDetailQuery,
) -> Result<Option<String>, KiraError> {
    let ids = parse_id_list(ids);
    if ids.is_empty() {
        debug!("peptide search returned no candidates");
        return Ok(None);
    }
    let candidates: Vec<CandidateEntry> = details
        .fetch(&ids)?
        .iter()
        .map(|detail| detail.to_candidate())
        .collect();
    let filtered = filter_candidates(&candidates, species);
    Ok(filtered.first().map(|candidate| candidate.entry_id.clone()))
}

/// Reviewed rows of the best annotation tier, ordered by longest common substring against
/// `reference`. The sort is stable, so equal scores keep service order.
pub fn rank_knowledge_base_rows(rows: &[KnowledgeBaseRow], reference: &str) -> Vec<KnowledgeBaseRow> {
    let reviewed: Vec<&KnowledgeBaseRow> = rows
        .iter()
        .filter(|row| row.reviewed == "reviewed")
        .collect();

    let mut best_tier = Vec::new();
    for tier in AnnotationScore::tiers() {
        best_tier = reviewed
            .iter()
            .filter(|row| row.annotation_score() == Some(tier))
            .map(|row| (*row).clone())
            .collect::<Vec<_>>();
        if !best_tier.is_empty() {
            break;
        }
    }

    best_tier.sort_by_cached_key(|row| Reverse(longest_common_substring(&row.sequence, reference)));
    best_tier
}

pub fn knowledge_base_search(
    query: &str,
    taxon: TaxonId,
    reference: &str,
    knowledge_base: &dyn KnowledgeBaseQuery,
) -> Result<Option<String>, KiraError> {
    let rows = knowledge_base.search(query, taxon)?;
    let ranked = rank_knowledge_base_rows(&rows, reference);
    if let Some(top) = ranked.first() {
        debug!(query, entry = %top.entry, "best knowledge-base match");
    }
    Ok(ranked.into_iter().next().map(|row| row.entry))
}

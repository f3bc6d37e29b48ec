use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::domain::{Organism, SequenceRecord, TaxonId};
use crate::error::KiraError;
use crate::ncbi::TaxonomyLookup;
use crate::resolver::candidates::{knowledge_base_search, search_and_filter};
use crate::resolver::{ResolutionStrategy, StrategyKind};
use crate::sequence::{best_member, chunk_sequence, extract_region};
use crate::uniprot::{AccessionDetailQuery, ArchiveClusterQuery, KnowledgeBaseQuery, PeptideSearch};

/// Residue search: chunk the sequence, run a peptide-search job, filter the hits.
#[derive(Clone)]
pub struct PeptideSearchStrategy {
    peptide: Arc<dyn PeptideSearch>,
    details: Arc<dyn AccessionDetailQuery>,
    chunk_size: usize,
}

impl PeptideSearchStrategy {
    pub fn new(
        peptide: Arc<dyn PeptideSearch>,
        details: Arc<dyn AccessionDetailQuery>,
        chunk_size: usize,
    ) -> Self {
        Self {
            peptide,
            details,
            chunk_size,
        }
    }

    pub fn search_sequence(
        &self,
        sequence: &str,
        species: &str,
    ) -> Result<Option<String>, KiraError> {
        let chunks = chunk_sequence(sequence, self.chunk_size);
        if chunks.is_empty() {
            return Ok(None);
        }
        let ids = self.peptide.submit_and_poll(&chunks)?;
        search_and_filter(&ids, species, self.details.as_ref())
    }
}

impl ResolutionStrategy for PeptideSearchStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::PeptideSearch
    }

    fn resolve(&self, record: &SequenceRecord, organism: &Organism) -> Option<String> {
        info!("attempting peptide search");
        settle(
            self.kind(),
            self.search_sequence(&record.sequence, &organism.scientific_name),
        )
    }
}

/// Looks the record up in UniParc, keeps the best-covered region and retries the residue
/// search on that region alone.
pub struct ArchiveClusterStrategy {
    clusters: Arc<dyn ArchiveClusterQuery>,
    knowledge_base: Arc<dyn KnowledgeBaseQuery>,
    peptide: PeptideSearchStrategy,
    hint_search: bool,
}

impl ArchiveClusterStrategy {
    pub fn new(
        clusters: Arc<dyn ArchiveClusterQuery>,
        knowledge_base: Arc<dyn KnowledgeBaseQuery>,
        peptide: PeptideSearchStrategy,
        hint_search: bool,
    ) -> Self {
        Self {
            clusters,
            knowledge_base,
            peptide,
            hint_search,
        }
    }

    fn run(&self, record: &SequenceRecord, organism: &Organism) -> Result<Option<String>, KiraError> {
        let cluster = self.clusters.search(&record.name)?;
        let Some(member) = best_member(&cluster.features) else {
            debug!("UniParc entry has no mapped members");
            return Ok(None);
        };
        let region = extract_region(&cluster.sequence, &member.locations);
        if region.is_empty() {
            return Ok(None);
        }
        debug!(residues = region.len(), "extracted best-covered region");

        if self.hint_search
            && let (Some(group), Some(taxon)) = (&member.interpro_group_id, organism.taxon_id)
        {
            match knowledge_base_search(group, taxon, &region, self.knowledge_base.as_ref()) {
                Ok(hint) => debug!(group = %group, hint = ?hint, "InterPro group search"),
                Err(err) => debug!(group = %group, error = %err, "InterPro group search failed"),
            }
        }

        self.peptide
            .search_sequence(&region, &organism.scientific_name)
    }
}

impl ResolutionStrategy for ArchiveClusterStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::ArchiveCluster
    }

    fn resolve(&self, record: &SequenceRecord, organism: &Organism) -> Option<String> {
        info!("attempting UniParc search");
        settle(self.kind(), self.run(record, organism))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryField {
    Name,
    Description,
    Accession,
}

/// Free-text UniProtKB search on one field of the record, ranked against its sequence.
pub struct KnowledgeBaseStrategy {
    field: QueryField,
    knowledge_base: Arc<dyn KnowledgeBaseQuery>,
    taxonomy: Arc<dyn TaxonomyLookup>,
}

impl KnowledgeBaseStrategy {
    pub fn new(
        field: QueryField,
        knowledge_base: Arc<dyn KnowledgeBaseQuery>,
        taxonomy: Arc<dyn TaxonomyLookup>,
    ) -> Self {
        Self {
            field,
            knowledge_base,
            taxonomy,
        }
    }

    /// The accession strategy always asks the taxonomy service again; the others reuse the
    /// organism's id and only look it up when it is missing.
    fn taxon(&self, organism: &Organism) -> Result<Option<TaxonId>, KiraError> {
        match (self.field, organism.taxon_id) {
            (QueryField::Accession, _) | (_, None) => {
                self.taxonomy.by_name(&organism.scientific_name)
            }
            (_, Some(taxon)) => Ok(Some(taxon)),
        }
    }

    fn run(&self, record: &SequenceRecord, organism: &Organism) -> Result<Option<String>, KiraError> {
        let query = match self.field {
            QueryField::Name => record.name.as_str(),
            QueryField::Description => record.description.as_str(),
            QueryField::Accession => record.accession.as_str(),
        };
        if query.trim().is_empty() {
            return Ok(None);
        }
        let Some(taxon) = self.taxon(organism)? else {
            debug!(species = %organism.scientific_name, "taxon id unknown");
            return Ok(None);
        };
        knowledge_base_search(query, taxon, &record.sequence, self.knowledge_base.as_ref())
    }
}

impl ResolutionStrategy for KnowledgeBaseStrategy {
    fn kind(&self) -> StrategyKind {
        match self.field {
            QueryField::Name => StrategyKind::KnowledgeBaseName,
            QueryField::Description => StrategyKind::KnowledgeBaseDescription,
            QueryField::Accession => StrategyKind::KnowledgeBaseAccession,
        }
    }

    fn resolve(&self, record: &SequenceRecord, organism: &Organism) -> Option<String> {
        info!(strategy = self.kind().as_str(), "attempting UniProtKB search");
        settle(self.kind(), self.run(record, organism))
    }
}

/// Collapses a strategy outcome to "id or nothing". Faults are logged and swallowed.
fn settle(kind: StrategyKind, outcome: Result<Option<String>, KiraError>) -> Option<String> {
    match outcome {
        Ok(Some(id)) if !id.trim().is_empty() => Some(id),
        Ok(_) => {
            debug!(strategy = kind.as_str(), "no match");
            None
        }
        Err(err) => {
            warn!(strategy = kind.as_str(), error = %err, "strategy failed");
            None
        }
    }
}

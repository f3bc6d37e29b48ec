//! Maps an NCBI protein record onto a UniProtKB accession.
//!
//! No direct cross-reference is guaranteed to exist, so the resolver walks an ordered chain of
//! strategies, most precise first, and stops at the first one that produces an identifier.
//! Strategies swallow collaborator faults; nothing raised by a remote service escapes
//! [`IdentifierResolver::resolve`].

pub mod candidates;
pub mod strategies;

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info};

use crate::config::ResolverSettings;
use crate::domain::{Organism, SequenceRecord};
use crate::ncbi::TaxonomyLookup;
use crate::uniprot::{AccessionDetailQuery, ArchiveClusterQuery, KnowledgeBaseQuery, PeptideSearch};

use self::strategies::{
    ArchiveClusterStrategy, KnowledgeBaseStrategy, PeptideSearchStrategy, QueryField,
};

pub trait ResolutionStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;
    fn resolve(&self, record: &SequenceRecord, organism: &Organism) -> Option<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    PeptideSearch,
    ArchiveCluster,
    KnowledgeBaseName,
    KnowledgeBaseDescription,
    KnowledgeBaseAccession,
}

impl StrategyKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StrategyKind::PeptideSearch => "peptide-search",
            StrategyKind::ArchiveCluster => "archive-cluster",
            StrategyKind::KnowledgeBaseName => "knowledge-base-name",
            StrategyKind::KnowledgeBaseDescription => "knowledge-base-description",
            StrategyKind::KnowledgeBaseAccession => "knowledge-base-accession",
        }
    }
}

/// Outcome of one pass over the chain. An empty identifier always comes with `all_good == false`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub identifier: String,
    pub strategy: Option<StrategyKind>,
    pub all_good: bool,
}

impl Resolution {
    pub fn unresolved() -> Self {
        Self {
            identifier: String::new(),
            strategy: None,
            all_good: false,
        }
    }

    pub fn is_resolved(&self) -> bool {
        !self.identifier.is_empty()
    }
}

/// Remote services the default chain is built from.
#[derive(Clone)]
pub struct ResolverServices {
    pub peptide: Arc<dyn PeptideSearch>,
    pub knowledge_base: Arc<dyn KnowledgeBaseQuery>,
    pub clusters: Arc<dyn ArchiveClusterQuery>,
    pub details: Arc<dyn AccessionDetailQuery>,
    pub taxonomy: Arc<dyn TaxonomyLookup>,
}

pub struct IdentifierResolver {
    strategies: Vec<Box<dyn ResolutionStrategy>>,
}

impl IdentifierResolver {
    pub fn new(strategies: Vec<Box<dyn ResolutionStrategy>>) -> Self {
        Self { strategies }
    }

    /// Peptide search, UniParc region search, then UniProtKB by name, description and accession.
    pub fn with_default_chain(services: ResolverServices, settings: &ResolverSettings) -> Self {
        let peptide = PeptideSearchStrategy::new(
            services.peptide.clone(),
            services.details.clone(),
            settings.chunk_size,
        );
        let cluster = ArchiveClusterStrategy::new(
            services.clusters.clone(),
            services.knowledge_base.clone(),
            peptide.clone(),
            settings.cluster_hint_search,
        );
        let knowledge_base = |field: QueryField| {
            Box::new(KnowledgeBaseStrategy::new(
                field,
                services.knowledge_base.clone(),
                services.taxonomy.clone(),
            )) as Box<dyn ResolutionStrategy>
        };
        Self::new(vec![
            Box::new(peptide),
            Box::new(cluster),
            knowledge_base(QueryField::Name),
            knowledge_base(QueryField::Description),
            knowledge_base(QueryField::Accession),
        ])
    }

    pub fn kinds(&self) -> Vec<StrategyKind> {
        self.strategies.iter().map(|strategy| strategy.kind()).collect()
    }

    pub fn resolve(&self, record: &SequenceRecord, organism: &Organism) -> Resolution {
        for strategy in &self.strategies {
            if let Some(identifier) = strategy.resolve(record, organism) {
                info!(
                    accession = %record.accession,
                    identifier = %identifier,
                    strategy = strategy.kind().as_str(),
                    "UniProt identifier established"
                );
                return Resolution {
                    identifier,
                    strategy: Some(strategy.kind()),
                    all_good: true,
                };
            }
        }
        error!(
            accession = %record.accession,
            "CRITICAL: UniProt ID could not be found, report will be incomplete"
        );
        Resolution::unresolved()
    }
}

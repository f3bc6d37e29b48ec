use std::sync::{Arc, Mutex};

use kira_protein_report::config::ResolverSettings;
use kira_protein_report::domain::{
    AnnotationScore, CandidateEntry, Organism, ReviewStatus, SequenceRecord, TaxonId,
};
use kira_protein_report::error::KiraError;
use kira_protein_report::ncbi::TaxonomyLookup;
use kira_protein_report::resolver::candidates::{
    filter_candidates, rank_knowledge_base_rows, search_and_filter,
};
use kira_protein_report::resolver::{IdentifierResolver, ResolverServices, StrategyKind};
use kira_protein_report::sequence::{ClusterFeature, Location};
use kira_protein_report::uniprot::{
    AccessionDetail, AccessionDetailQuery, ArchiveCluster, ArchiveClusterQuery,
    KnowledgeBaseQuery, KnowledgeBaseRow, PeptideSearch,
};

#[derive(Default)]
struct StubPeptide {
    answer: Option<String>,
    submitted: Mutex<Vec<Vec<String>>>,
}

impl PeptideSearch for StubPeptide {
    fn submit_and_poll(&self, chunks: &[String]) -> Result<String, KiraError> {
        self.submitted.lock().unwrap().push(chunks.to_vec());
        match &self.answer {
            Some(ids) => Ok(ids.clone()),
            None => Err(KiraError::NotReady {
                service: "peptide",
                attempts: 10,
            }),
        }
    }
}

#[derive(Default)]
struct StubDetails {
    details: Vec<AccessionDetail>,
    calls: Mutex<usize>,
}

impl AccessionDetailQuery for StubDetails {
    fn fetch(&self, ids: &[String]) -> Result<Vec<AccessionDetail>, KiraError> {
        *self.calls.lock().unwrap() += 1;
        Ok(self
            .details
            .iter()
            .filter(|detail| ids.contains(&detail.primary_accession))
            .cloned()
            .collect())
    }
}

#[derive(Default)]
struct StubClusters {
    cluster: Option<ArchiveCluster>,
    calls: Mutex<usize>,
}

impl ArchiveClusterQuery for StubClusters {
    fn search(&self, _record_name: &str) -> Result<ArchiveCluster, KiraError> {
        *self.calls.lock().unwrap() += 1;
        self.cluster
            .clone()
            .ok_or_else(|| KiraError::malformed("UniProt", "no results"))
    }
}

#[derive(Default)]
struct StubKnowledgeBase {
    rows: Vec<KnowledgeBaseRow>,
    queries: Mutex<Vec<(String, TaxonId)>>,
}

impl KnowledgeBaseQuery for StubKnowledgeBase {
    fn search(&self, query: &str, taxon: TaxonId) -> Result<Vec<KnowledgeBaseRow>, KiraError> {
        self.queries.lock().unwrap().push((query.to_string(), taxon));
        Ok(self.rows.clone())
    }
}

#[derive(Default)]
struct StubTaxonomy {
    calls: Mutex<usize>,
}

impl TaxonomyLookup for StubTaxonomy {
    fn by_name(&self, _species: &str) -> Result<Option<TaxonId>, KiraError> {
        *self.calls.lock().unwrap() += 1;
        Ok(Some(TaxonId::new(9606)))
    }
}

struct Stubs {
    peptide: Arc<StubPeptide>,
    details: Arc<StubDetails>,
    clusters: Arc<StubClusters>,
    knowledge_base: Arc<StubKnowledgeBase>,
    taxonomy: Arc<StubTaxonomy>,
}

impl Stubs {
    fn resolver(&self, settings: &ResolverSettings) -> IdentifierResolver {
        IdentifierResolver::with_default_chain(
            ResolverServices {
                peptide: self.peptide.clone(),
                knowledge_base: self.knowledge_base.clone(),
                clusters: self.clusters.clone(),
                details: self.details.clone(),
                taxonomy: self.taxonomy.clone(),
            },
            settings,
        )
    }
}

fn detail(id: &str, organism: &str, entry_type: &str, score: f64) -> AccessionDetail {
    AccessionDetail {
        primary_accession: id.to_string(),
        organism: organism.to_string(),
        entry_type: entry_type.to_string(),
        annotation_score: Some(score),
        sequence: String::new(),
    }
}

fn row(entry: &str, reviewed: &str, annotation: &str, sequence: &str) -> KnowledgeBaseRow {
    KnowledgeBaseRow {
        entry: entry.to_string(),
        reviewed: reviewed.to_string(),
        annotation: annotation.to_string(),
        sequence: sequence.to_string(),
    }
}

fn record() -> SequenceRecord {
    SequenceRecord {
        accession: "NP_000537.3".to_string(),
        name: "NP_000537".to_string(),
        description: "cellular tumor antigen p53 isoform a [Homo sapiens]".to_string(),
        sequence: "MEEPQSDPSVEPPLSQETFSDLWKLLPENN".to_string(),
    }
}

fn human() -> Organism {
    Organism::new("Homo sapiens", Some(TaxonId::new(9606))).unwrap()
}

fn candidate(id: &str, status: ReviewStatus, score: u8) -> CandidateEntry {
    CandidateEntry {
        entry_id: id.to_string(),
        review_status: status,
        annotation_score: AnnotationScore::new(score),
        sequence: String::new(),
        organism: "Homo sapiens".to_string(),
    }
}

#[test]
fn peptide_hit_short_circuits_chain() {
    let stubs = Stubs {
        peptide: Arc::new(StubPeptide {
            answer: Some("Q53GA5,P04637".to_string()),
            ..StubPeptide::default()
        }),
        details: Arc::new(StubDetails {
            details: vec![
                detail("Q53GA5", "Homo sapiens", "UniProtKB unreviewed (TrEMBL)", 5.0),
                detail("P04637", "Homo sapiens", "UniProtKB reviewed (Swiss-Prot)", 5.0),
            ],
            ..StubDetails::default()
        }),
        clusters: Arc::new(StubClusters::default()),
        knowledge_base: Arc::new(StubKnowledgeBase::default()),
        taxonomy: Arc::new(StubTaxonomy::default()),
    };
    let settings = ResolverSettings {
        chunk_size: 10,
        ..ResolverSettings::default()
    };

    let resolution = stubs.resolver(&settings).resolve(&record(), &human());
    assert_eq!(resolution.identifier, "P04637");
    assert_eq!(resolution.strategy, Some(StrategyKind::PeptideSearch));
    assert!(resolution.all_good);

    let submitted = stubs.peptide.submitted.lock().unwrap();
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].len(), 3);
    assert_eq!(*stubs.clusters.calls.lock().unwrap(), 0);
    assert!(stubs.knowledge_base.queries.lock().unwrap().is_empty());
    assert_eq!(*stubs.taxonomy.calls.lock().unwrap(), 0);
}

#[test]
fn cluster_region_feeds_peptide_search() {
    let stubs = Stubs {
        peptide: Arc::new(StubPeptide::default()),
        details: Arc::new(StubDetails::default()),
        clusters: Arc::new(StubClusters {
            cluster: Some(ArchiveCluster {
                sequence: "ABCDEFGHIJKLMNOP".to_string(),
                features: vec![ClusterFeature {
                    locations: vec![Location { start: 5, end: 10 }],
                    interpro_group_id: Some("IPR011615".to_string()),
                }],
            }),
            ..StubClusters::default()
        }),
        knowledge_base: Arc::new(StubKnowledgeBase::default()),
        taxonomy: Arc::new(StubTaxonomy::default()),
    };

    let resolution = stubs
        .resolver(&ResolverSettings::default())
        .resolve(&record(), &human());
    assert_eq!(resolution.identifier, "");

    let submitted = stubs.peptide.submitted.lock().unwrap();
    assert_eq!(submitted.len(), 2);
    assert_eq!(submitted[1], vec!["EFGHIJ".to_string()]);

    let queries = stubs.knowledge_base.queries.lock().unwrap();
    assert_eq!(queries[0].0, "IPR011615");
}

#[test]
fn cluster_hint_search_can_be_disabled() {
    let stubs = Stubs {
        peptide: Arc::new(StubPeptide::default()),
        details: Arc::new(StubDetails::default()),
        clusters: Arc::new(StubClusters {
            cluster: Some(ArchiveCluster {
                sequence: "ABCDEFGHIJKLMNOP".to_string(),
                features: vec![ClusterFeature {
                    locations: vec![Location { start: 5, end: 10 }],
                    interpro_group_id: Some("IPR011615".to_string()),
                }],
            }),
            ..StubClusters::default()
        }),
        knowledge_base: Arc::new(StubKnowledgeBase::default()),
        taxonomy: Arc::new(StubTaxonomy::default()),
    };
    let settings = ResolverSettings {
        cluster_hint_search: false,
        ..ResolverSettings::default()
    };

    stubs.resolver(&settings).resolve(&record(), &human());
    let queries = stubs.knowledge_base.queries.lock().unwrap();
    assert!(queries.iter().all(|(query, _)| query != "IPR011615"));
}

#[test]
fn exhausted_chain_reports_failure() {
    let stubs = Stubs {
        peptide: Arc::new(StubPeptide::default()),
        details: Arc::new(StubDetails::default()),
        clusters: Arc::new(StubClusters::default()),
        knowledge_base: Arc::new(StubKnowledgeBase::default()),
        taxonomy: Arc::new(StubTaxonomy::default()),
    };

    let resolution = stubs
        .resolver(&ResolverSettings::default())
        .resolve(&record(), &human());
    assert_eq!(resolution.identifier, "");
    assert_eq!(resolution.strategy, None);
    assert!(!resolution.all_good);

    let queries = stubs.knowledge_base.queries.lock().unwrap();
    let texts: Vec<&str> = queries.iter().map(|(query, _)| query.as_str()).collect();
    assert_eq!(
        texts,
        vec![
            "NP_000537",
            "cellular tumor antigen p53 isoform a [Homo sapiens]",
            "NP_000537.3",
        ]
    );
    // Only the accession strategy asks for the taxon again.
    assert_eq!(*stubs.taxonomy.calls.lock().unwrap(), 1);
}

#[test]
fn knowledge_base_fallback_ranks_by_common_substring() {
    let reference = record().sequence;
    let stubs = Stubs {
        peptide: Arc::new(StubPeptide::default()),
        details: Arc::new(StubDetails::default()),
        clusters: Arc::new(StubClusters::default()),
        knowledge_base: Arc::new(StubKnowledgeBase {
            rows: vec![
                row("Q00001", "reviewed", "5.0", "MEEPQ"),
                row("P04637", "reviewed", "5.0", &reference),
                row("A0A000", "unreviewed", "5.0", &reference),
                row("Q00002", "reviewed", "4.0", &reference),
            ],
            ..StubKnowledgeBase::default()
        }),
        taxonomy: Arc::new(StubTaxonomy::default()),
    };

    let resolution = stubs
        .resolver(&ResolverSettings::default())
        .resolve(&record(), &human());
    assert_eq!(resolution.identifier, "P04637");
    assert_eq!(resolution.strategy, Some(StrategyKind::KnowledgeBaseName));
}

#[test]
fn ranking_is_stable_on_ties() {
    let rows = vec![
        row("FIRST", "reviewed", "3.0", "AAAA"),
        row("SECOND", "reviewed", "3.0", "AAAA"),
        row("LOW", "reviewed", "2.0", "MEEPQSD"),
    ];
    let ranked = rank_knowledge_base_rows(&rows, "AAAAMEEPQSD");
    let ids: Vec<&str> = ranked.iter().map(|r| r.entry.as_str()).collect();
    assert_eq!(ids, vec!["FIRST", "SECOND"]);
}

#[test]
fn species_mismatch_yields_nothing() {
    let details = StubDetails {
        details: vec![detail(
            "P02340",
            "Mus musculus",
            "UniProtKB reviewed (Swiss-Prot)",
            5.0,
        )],
        ..StubDetails::default()
    };
    let result = search_and_filter("P02340", "Homo sapiens", &details).unwrap();
    assert_eq!(result, None);
    assert_eq!(search_and_filter(" , ", "Homo sapiens", &details).unwrap(), None);
}

#[test]
fn unreviewed_candidates_yield_nothing() {
    let details = StubDetails {
        details: vec![
            detail("A0A024R", "Homo sapiens", "UniProtKB unreviewed (TrEMBL)", 5.0),
            detail("K7PPA8", "Homo sapiens", "UniProtKB unreviewed (TrEMBL)", 3.0),
        ],
        ..StubDetails::default()
    };
    let result = search_and_filter("A0A024R,K7PPA8", "Homo sapiens", &details).unwrap();
    assert_eq!(result, None);
    assert_eq!(*details.calls.lock().unwrap(), 1);
}

#[test]
fn candidates_without_usable_score_yield_nothing() {
    let mut unscored = detail("P04637", "Homo sapiens", "UniProtKB reviewed (Swiss-Prot)", 5.0);
    unscored.annotation_score = None;
    let details = StubDetails {
        details: vec![
            unscored,
            detail("P04638", "Homo sapiens", "UniProtKB reviewed (Swiss-Prot)", 0.0),
            detail("P04639", "Homo sapiens", "UniProtKB reviewed (Swiss-Prot)", 4.5),
        ],
        ..StubDetails::default()
    };
    let result = search_and_filter("P04637,P04638,P04639", "Homo sapiens", &details).unwrap();
    assert_eq!(result, None);
}

#[test]
fn knowledge_base_rows_without_reviewed_entries_rank_empty() {
    let reference = record().sequence;
    let rows = vec![
        row("A0A024R", "unreviewed", "5.0", &reference),
        row("K7PPA8", "unreviewed", "4.0", &reference),
    ];
    assert!(rank_knowledge_base_rows(&rows, &reference).is_empty());

    let unscored = vec![row("P04637", "reviewed", "", &reference)];
    assert!(rank_knowledge_base_rows(&unscored, &reference).is_empty());
}

#[test]
fn candidate_filtering_is_idempotent() {
    let candidates = vec![
        candidate("A", ReviewStatus::Reviewed, 4),
        candidate("B", ReviewStatus::Unreviewed, 5),
        candidate("C", ReviewStatus::Reviewed, 4),
        candidate("D", ReviewStatus::Reviewed, 2),
    ];
    let once = filter_candidates(&candidates, "Homo sapiens");
    let ids: Vec<&str> = once.iter().map(|c| c.entry_id.as_str()).collect();
    assert_eq!(ids, vec!["A", "C"]);
    assert_eq!(filter_candidates(&once, "Homo sapiens"), once);
}

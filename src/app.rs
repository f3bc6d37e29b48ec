use std::sync::Arc;
use std::time::{Duration, Instant};

use camino::Utf8PathBuf;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::alliance::{
    AllianceClient, AllianceHttpClient, DiseaseAssociations, DiseaseCategoryCounts, GeneInfo,
};
use crate::alphafold::{AlphaFoldClient, AlphaFoldHttpClient, IMAGE_FILE_NAME, ScreenshotJob};
use crate::atlas::{AtlasClient, AtlasHttpClient};
use crate::browser::{ChromeBrowser, HeadlessBrowser};
use crate::charts::{
    DISEASE_CHART_FILE, VARIANT_CHART_FILE, disease_chart_svg, variant_chart_svg, write_chart,
};
use crate::config::ResolvedConfig;
use crate::domain::{NcbiAccession, Organism, SequenceRecord, TaxonId, UniprotAccession};
use crate::error::KiraError;
use crate::ncbi::{NcbiHttpClient, SequenceArchive, TaxonomyLookup};
use crate::reactome::{PathwaySource, ReactomeHttpClient, pathway_names};
use crate::report::{ReportData, render_report, write_report};
use crate::resolver::{IdentifierResolver, Resolution, ResolverServices, StrategyKind};
use crate::summary::{GeminiClient, SummaryClient, summarize_pathways};
use crate::uniprot::{ProteinSummary, UniprotClient, UniprotHttpClient};
use crate::usage::{UsageLedger, UsageStatus};

const GRAPHICS_DIR: &str = "graphics";

#[derive(Debug, Clone)]
pub struct ReportOptions {
    pub output_dir: Utf8PathBuf,
    pub file_name: String,
    pub pdf: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolveResult {
    pub accession: String,
    pub record_name: String,
    pub identifier: Option<String>,
    pub strategy: Option<StrategyKind>,
    pub attempts: usize,
    pub all_good: bool,
    pub resolved_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportResult {
    pub accession: String,
    pub identifier: Option<String>,
    pub strategy: Option<StrategyKind>,
    pub html_path: String,
    pub pdf_path: Option<String>,
    pub protein_image: Option<String>,
    pub charts: Vec<String>,
    pub all_good: bool,
    pub warnings: Vec<String>,
    pub generated_at: String,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

/// Remote collaborators of the pipeline. The summary client is absent when no API key is
/// configured.
#[derive(Clone)]
pub struct Services {
    pub archive: Arc<dyn SequenceArchive>,
    pub taxonomy: Arc<dyn TaxonomyLookup>,
    pub uniprot: Arc<dyn UniprotClient>,
    pub atlas: Arc<dyn AtlasClient>,
    pub alliance: Arc<dyn AllianceClient>,
    pub pathways: Arc<dyn PathwaySource>,
    pub alphafold: Arc<dyn AlphaFoldClient>,
    pub summary: Option<Arc<dyn SummaryClient>>,
    pub browser: Arc<dyn HeadlessBrowser>,
}

pub struct App {
    services: Services,
    resolver: IdentifierResolver,
    ledger: UsageLedger,
    attempts: usize,
}

/// Non-essential stage failures, collected instead of aborting the report.
#[derive(Debug)]
struct Degradation {
    all_good: bool,
    warnings: Vec<String>,
}

impl Degradation {
    fn new(all_good: bool) -> Self {
        Self {
            all_good,
            warnings: Vec::new(),
        }
    }

    fn note(&mut self, message: String) {
        warn!("{message}");
        self.all_good = false;
        self.warnings.push(message);
    }

    fn keep<T>(&mut self, stage: &str, result: Result<T, KiraError>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                self.note(format!("{stage}: {err}"));
                None
            }
        }
    }
}

struct Resolved {
    record: SequenceRecord,
    organism: Organism,
    resolution: Resolution,
    attempts: usize,
}

impl App {
    pub fn new(
        services: Services,
        resolver: IdentifierResolver,
        ledger: UsageLedger,
        attempts: usize,
    ) -> Self {
        Self {
            services,
            resolver,
            ledger,
            attempts: attempts.max(1),
        }
    }

    /// Wires the HTTP clients, the headless browser and the usage ledger from configuration.
    pub fn from_config(config: &ResolvedConfig) -> Result<Self, KiraError> {
        let ncbi = Arc::new(NcbiHttpClient::new(
            &config.http,
            config.ncbi_email.clone(),
            &config.ncbi_tool,
        )?);
        let uniprot = Arc::new(UniprotHttpClient::new(&config.http, &config.resolver)?);
        let summary: Option<Arc<dyn SummaryClient>> =
            match GeminiClient::new(&config.summary, &config.http) {
                Ok(client) => Some(Arc::new(client)),
                Err(KiraError::MissingApiKey(var)) => {
                    info!(env = %var, "no summary API key configured");
                    None
                }
                Err(err) => return Err(err),
            };

        let browser = ChromeBrowser::new(&config.browser);
        match browser.binary() {
            Some(path) => info!(browser = %path.display(), "headless browser found"),
            None => warn!("no headless browser found, structure image and PDF will be skipped"),
        }

        let resolver = IdentifierResolver::with_default_chain(
            ResolverServices {
                peptide: uniprot.clone(),
                knowledge_base: uniprot.clone(),
                clusters: uniprot.clone(),
                details: uniprot.clone(),
                taxonomy: ncbi.clone(),
            },
            &config.resolver,
        );
        debug!(chain = ?resolver.kinds(), "resolver chain");
        let services = Services {
            archive: ncbi.clone(),
            taxonomy: ncbi,
            uniprot,
            atlas: Arc::new(AtlasHttpClient::new(&config.http)?),
            alliance: Arc::new(AllianceHttpClient::new(&config.http)?),
            pathways: Arc::new(ReactomeHttpClient::new(&config.http)?),
            alphafold: Arc::new(AlphaFoldHttpClient::new(&config.http)?),
            summary,
            browser: Arc::new(browser),
        };
        let ledger = UsageLedger::new(config.ledger_path.clone(), config.summary.limits);
        Ok(Self::new(services, resolver, ledger, config.resolver.attempts))
    }

    pub fn resolve(
        &self,
        accession: &NcbiAccession,
        species: &str,
        sink: &dyn ProgressSink,
    ) -> Result<ResolveResult, KiraError> {
        let started = Instant::now();
        let resolved = self.resolve_record(accession, species, sink)?;
        sink.event(ProgressEvent {
            message: "phase=Done; resolution finished".to_string(),
            elapsed: Some(started.elapsed()),
        });
        let identifier = resolved.resolution.identifier.clone();
        Ok(ResolveResult {
            accession: resolved.record.accession.clone(),
            record_name: resolved.record.name.clone(),
            identifier: (!identifier.is_empty()).then_some(identifier),
            strategy: resolved.resolution.strategy,
            attempts: resolved.attempts,
            all_good: resolved.resolution.all_good,
            resolved_at: iso_timestamp(),
        })
    }

    /// Runs the full pipeline. Only the sequence record is essential; every later stage that
    /// fails is recorded as a warning and the report is produced with what is left.
    pub fn report(
        &self,
        accession: &NcbiAccession,
        species: &str,
        options: &ReportOptions,
        sink: &dyn ProgressSink,
    ) -> Result<ReportResult, KiraError> {
        let started = Instant::now();
        let resolved = self.resolve_record(accession, species, sink)?;
        let mut degradation = Degradation::new(resolved.resolution.all_good);
        if !resolved.resolution.is_resolved() {
            degradation
                .warnings
                .push("no UniProt identifier, report limited to the sequence record".to_string());
        }

        let graphics_dir = options.output_dir.join(GRAPHICS_DIR);
        let mut data = ReportData {
            record: Some(resolved.record.clone()),
            ..ReportData::default()
        };
        let mut charts = Vec::new();
        let mut protein_image = None;

        let uniprot_id = if resolved.resolution.is_resolved() {
            degradation.keep(
                "UniProt identifier",
                resolved.resolution.identifier.parse::<UniprotAccession>(),
            )
        } else {
            None
        };

        if let Some(id) = &uniprot_id {
            sink.event(ProgressEvent {
                message: format!("phase=Fetch; UniProt entry {id}"),
                elapsed: Some(started.elapsed()),
            });
            let protein = degradation
                .keep("UniProt entry", self.services.uniprot.fetch(id))
                .map(|record| record.summary);

            let screenshot = match degradation.keep("AlphaFold", self.services.alphafold.pdb_url(id)) {
                Some(Some(pdb_url)) => Some(ScreenshotJob::spawn(
                    self.services.browser.clone(),
                    pdb_url,
                    graphics_dir.join(IMAGE_FILE_NAME).into_std_path_buf(),
                )),
                Some(None) => {
                    degradation.note(format!("AlphaFold: no prediction for {id}"));
                    None
                }
                None => None,
            };

            let taxon = protein
                .as_ref()
                .and_then(|protein| protein.organism.taxon_id)
                .or(resolved.organism.taxon_id);

            sink.event(ProgressEvent {
                message: "phase=Fetch; expression, disease and pathway data".to_string(),
                elapsed: Some(started.elapsed()),
            });
            data.atlas = degradation
                .keep("Protein Atlas", self.services.atlas.fetch(id))
                .flatten();
            let (gene, diseases, counts) = self.disease_data(id, taxon, &mut degradation);
            data.gene = gene;
            data.diseases = diseases;
            data.pathways = degradation
                .keep("Reactome", self.services.pathways.pathways(id, taxon))
                .unwrap_or_default();
            data.pathway_summary = self.pathway_summary(&data, &mut degradation, sink);

            sink.event(ProgressEvent {
                message: "phase=Render; charts".to_string(),
                elapsed: Some(started.elapsed()),
            });
            if let Some(svg) = disease_chart_svg(&counts.chartable()) {
                data.disease_chart = degradation
                    .keep("disease chart", write_chart(&graphics_dir, DISEASE_CHART_FILE, &svg))
                    .map(|path| {
                        charts.push(path.to_string());
                        format!("{GRAPHICS_DIR}/{DISEASE_CHART_FILE}")
                    });
            }
            if let Some(svg) = protein.as_ref().and_then(variant_chart) {
                data.variant_chart = degradation
                    .keep("variant chart", write_chart(&graphics_dir, VARIANT_CHART_FILE, &svg))
                    .map(|path| {
                        charts.push(path.to_string());
                        format!("{GRAPHICS_DIR}/{VARIANT_CHART_FILE}")
                    });
            }

            if let Some(job) = screenshot {
                sink.event(ProgressEvent {
                    message: "phase=Render; waiting for structure image".to_string(),
                    elapsed: Some(started.elapsed()),
                });
                if let Some(path) = degradation.keep("structure image", job.wait()) {
                    protein_image = Some(path.display().to_string());
                    data.protein_image = Some(format!("{GRAPHICS_DIR}/{IMAGE_FILE_NAME}"));
                }
            }
            data.protein = protein;
        }

        sink.event(ProgressEvent {
            message: "phase=Render; report".to_string(),
            elapsed: Some(started.elapsed()),
        });
        let html = render_report(&data);
        let html_path = write_report(&options.output_dir, &options.file_name, &html)?;
        info!(path = %html_path, "report written");

        let pdf_path = if options.pdf {
            let pdf_path = options.output_dir.join(format!("{}.pdf", options.file_name));
            degradation
                .keep(
                    "PDF conversion",
                    self.services
                        .browser
                        .print_to_pdf(html_path.as_std_path(), pdf_path.as_std_path()),
                )
                .map(|()| pdf_path.to_string())
        } else {
            None
        };

        sink.event(ProgressEvent {
            message: format!("phase=Done; all_good={}", degradation.all_good),
            elapsed: Some(started.elapsed()),
        });
        let identifier = resolved.resolution.identifier;
        Ok(ReportResult {
            accession: resolved.record.accession,
            identifier: (!identifier.is_empty()).then_some(identifier),
            strategy: resolved.resolution.strategy,
            html_path: html_path.to_string(),
            pdf_path,
            protein_image,
            charts,
            all_good: degradation.all_good,
            warnings: degradation.warnings,
            generated_at: iso_timestamp(),
        })
    }

    pub fn usage(&self) -> Result<UsageStatus, KiraError> {
        self.ledger.status()
    }

    fn resolve_record(
        &self,
        accession: &NcbiAccession,
        species: &str,
        sink: &dyn ProgressSink,
    ) -> Result<Resolved, KiraError> {
        sink.event(ProgressEvent {
            message: format!("phase=Fetch; sequence record {accession}"),
            elapsed: None,
        });
        let record = self.services.archive.fetch_record(accession)?;
        info!(accession = %record.accession, name = %record.name, "sequence record fetched");

        let taxon = match self.services.taxonomy.by_name(species) {
            Ok(taxon) => taxon,
            Err(err) => {
                warn!(species, error = %err, "taxonomy lookup failed");
                None
            }
        };
        let organism = Organism::new(species, taxon)?;

        let mut resolution = Resolution::unresolved();
        let mut attempts = 0;
        while attempts < self.attempts && !resolution.is_resolved() {
            attempts += 1;
            sink.event(ProgressEvent {
                message: format!("phase=Resolve; attempt {attempts} of {}", self.attempts),
                elapsed: None,
            });
            resolution = self.resolver.resolve(&record, &organism);
        }
        Ok(Resolved {
            record,
            organism,
            resolution,
            attempts,
        })
    }

    fn disease_data(
        &self,
        id: &UniprotAccession,
        taxon: Option<TaxonId>,
        degradation: &mut Degradation,
    ) -> (Option<GeneInfo>, DiseaseAssociations, DiseaseCategoryCounts) {
        let empty = (
            None,
            DiseaseAssociations::default(),
            DiseaseCategoryCounts::from_annotations(&[]),
        );
        let gene_id = match degradation.keep("Alliance gene search", self.services.alliance.gene_id(id)) {
            Some(Some(gene_id)) => gene_id,
            Some(None) => {
                degradation.note(format!("Alliance: no gene for {id}"));
                return empty;
            }
            None => return empty,
        };
        let gene = degradation.keep(
            "Alliance gene info",
            self.services.alliance.gene_info(&gene_id),
        );
        let annotations = degradation
            .keep(
                "Alliance disease annotations",
                self.services.alliance.disease_annotations(&gene_id, taxon),
            )
            .unwrap_or_default();
        (
            gene,
            DiseaseAssociations::from_annotations(&annotations),
            DiseaseCategoryCounts::from_annotations(&annotations),
        )
    }

    fn pathway_summary(
        &self,
        data: &ReportData,
        degradation: &mut Degradation,
        sink: &dyn ProgressSink,
    ) -> Option<String> {
        if data.pathways.is_empty() {
            return None;
        }
        let Some(client) = &self.services.summary else {
            degradation.note("pathway summary skipped: no API key configured".to_string());
            return None;
        };
        sink.event(ProgressEvent {
            message: format!("phase=Summarize; {} pathways", data.pathways.len()),
            elapsed: None,
        });
        let summary = degradation.keep(
            "pathway summary",
            summarize_pathways(client.as_ref(), &self.ledger, &pathway_names(&data.pathways)),
        )?;
        if summary.limited {
            degradation
                .warnings
                .push("pathway summary skipped: usage limit reached".to_string());
        }
        Some(summary.text)
    }
}

fn variant_chart(protein: &ProteinSummary) -> Option<String> {
    variant_chart_svg(
        &protein.natural_variants,
        &protein.mutagenesis,
        protein.sequence.length,
    )
}

fn iso_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

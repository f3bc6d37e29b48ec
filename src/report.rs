//! Paginated HTML report. Print CSS lays it out on US letter pages so the same document can be
//! handed to a headless browser for PDF output.

use std::fmt::Write as _;
use std::fs;

use camino::{Utf8Path, Utf8PathBuf};

use crate::alliance::{DiseaseAssociations, DiseaseLink, GeneInfo};
use crate::atlas::AtlasSummary;
use crate::domain::SequenceRecord;
use crate::error::KiraError;
use crate::reactome::Pathway;
use crate::summary::markdown_html;
use crate::uniprot::ProteinSummary;

/// Everything the document shows. Image paths are relative to the HTML file.
#[derive(Debug, Clone, Default)]
pub struct ReportData {
    pub record: Option<SequenceRecord>,
    pub protein: Option<ProteinSummary>,
    pub atlas: Option<AtlasSummary>,
    pub gene: Option<GeneInfo>,
    pub diseases: DiseaseAssociations,
    pub pathways: Vec<Pathway>,
    pub pathway_summary: Option<String>,
    pub protein_image: Option<String>,
    pub disease_chart: Option<String>,
    pub variant_chart: Option<String>,
}

const STYLE: &str = r#"
@page { size: letter; margin: 0.75in; }
body { font-family: Lexend, Helvetica, Arial, sans-serif; font-weight: 300; color: #1d1d1d; font-size: 11pt; line-height: 1.45; }
h1 { font-size: 30pt; font-weight: 600; color: #25b783; margin: 2in 0 0.2in 0; }
h2 { font-size: 16pt; font-weight: 500; color: #25b783; margin: 0.3in 0 0.1in 0; }
.subtitle { font-size: 16pt; margin-bottom: 0.4in; }
.cover { page-break-after: always; text-align: right; }
.cover img { width: 5in; height: 5in; object-fit: contain; }
.indent { margin-left: 0.3in; }
.keep { page-break-inside: avoid; }
.figure { width: 7in; max-height: 4in; object-fit: contain; }
.notice { border-left: 4px solid #16abe5; padding-left: 0.2in; }
ul.pathways { margin-left: 0.3in; }
a { color: #16abe5; text-decoration: none; }
strong { font-weight: 500; }
.sequence { font-family: monospace; font-size: 9pt; word-break: break-all; }
"#;

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

/// First character upper-cased, the rest lower-cased.
pub fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

fn joined_or(items: &[String], fallback: &str) -> String {
    if items.is_empty() {
        fallback.to_string()
    } else {
        items.join(", ")
    }
}

pub fn render_report(data: &ReportData) -> String {
    let mut html = String::new();
    let title = data
        .protein
        .as_ref()
        .map(|protein| capitalize(&protein.full_name))
        .filter(|name| !name.is_empty())
        .or_else(|| data.record.as_ref().map(|record| record.description.clone()))
        .unwrap_or_default();

    let _ = write!(
        html,
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n<title>Protein Analysis Report</title>\n<style>{STYLE}</style>\n</head>\n<body>\n"
    );

    html.push_str("<section class=\"cover\">\n<h1>Protein Analysis Report</h1>\n");
    let _ = writeln!(html, "<div class=\"subtitle\">{}</div>", escape_html(&title));
    if let Some(image) = &data.protein_image {
        let _ = writeln!(
            html,
            "<img src=\"{}\" alt=\"Predicted structure\">",
            escape_html(image)
        );
    }
    html.push_str("</section>\n");

    match &data.protein {
        Some(protein) => render_protein_sections(&mut html, data, protein),
        None => render_unresolved(&mut html, data),
    }

    html.push_str("</body>\n</html>\n");
    html
}

fn render_protein_sections(html: &mut String, data: &ReportData, protein: &ProteinSummary) {
    let empty = AtlasSummary::default();
    let atlas = data.atlas.as_ref().unwrap_or(&empty);
    let cofactors = if protein.cofactors.is_empty() {
        "None"
    } else {
        protein.cofactors.as_str()
    };
    let chromosome = if atlas.chromosome.is_empty() {
        "unknown"
    } else {
        atlas.chromosome.as_str()
    };

    html.push_str("<section>\n<h2>Core Info</h2>\n<p>");
    let _ = write!(
        html,
        "Protein Name: {}<br>\nGene: {}<br>\nUniprot ID: {}<br>\nAmino Acid length: {}<br>\nCofactor(s): {}<br>\nMolecular Processes: {}<br>\nBiological processes: {}<br>\nFound on Chromosome {}",
        escape_html(&protein.full_name),
        escape_html(&protein.gene_name),
        escape_html(&protein.primary_accession),
        protein.sequence.length,
        escape_html(cofactors),
        escape_html(&joined_or(&atlas.molecular_function, "None found")),
        escape_html(&joined_or(&atlas.biological_process, "None found")),
        escape_html(chromosome),
    );
    html.push_str("</p>\n");

    if let Some(gene) = &data.gene
        && !gene.synopsis.is_empty()
    {
        let _ = writeln!(html, "<p class=\"indent\">{}</p>", escape_html(&gene.synopsis));
    }
    html.push_str("</section>\n");

    let expression: Vec<&str> = [&protein.tissue_specificity, &protein.induction]
        .into_iter()
        .filter(|text| !text.is_empty())
        .map(|text| text.as_str())
        .collect();
    if !expression.is_empty() {
        html.push_str("<section>\n<h2>Protein Expression</h2>\n");
        for text in expression {
            let _ = writeln!(html, "<p class=\"indent\">{}</p>", escape_html(text));
        }
        html.push_str("</section>\n");
    }

    html.push_str("<section>\n<div class=\"keep\">\n<h2>Disease Associations</h2>\n");
    if let Some(chart) = &data.disease_chart {
        let _ = writeln!(
            html,
            "<img class=\"figure\" src=\"{}\" alt=\"Disease annotation chart\">",
            escape_html(chart)
        );
    }
    html.push_str("</div>\n");
    let _ = writeln!(
        html,
        "<p class=\"indent\">This gene is a marker for: {}</p>",
        disease_names(&data.diseases.marker_in)
    );
    let _ = writeln!(
        html,
        "<p class=\"indent\">This gene is implicated in: {}</p>",
        disease_names(&data.diseases.implicated_in)
    );
    html.push_str("</section>\n");

    if let Some(chart) = &data.variant_chart {
        let _ = writeln!(
            html,
            "<section class=\"keep\">\n<h2>Natural Variants &amp; Mutagenesis</h2>\n<img class=\"figure\" src=\"{}\" alt=\"Variant chart\">\n</section>",
            escape_html(chart)
        );
    }

    html.push_str("<section>\n<h2>Pathways</h2>\n");
    if let Some(summary) = &data.pathway_summary {
        let _ = writeln!(html, "<div class=\"indent\">\n{}</div>", markdown_html(summary));
    }
    if !data.pathways.is_empty() {
        html.push_str("<p>Here is the full list of pathways (click for more info):</p>\n<ul class=\"pathways\">\n");
        for pathway in &data.pathways {
            let _ = writeln!(
                html,
                "<li><a href=\"{}\">{}</a></li>",
                escape_html(&pathway.url),
                escape_html(&pathway.name)
            );
        }
        html.push_str("</ul>\n");
    }
    html.push_str("</section>\n");

    html.push_str("<section>\n<h2>Citations</h2>\n");
    let accession = &protein.primary_accession;
    let mut citations = vec![
        ("Uniprot", format!("https://www.uniprot.org/uniprotkb/{accession}")),
        ("Protein Atlas", format!("https://www.proteinatlas.org/search/{accession}")),
        ("AlphaFold", format!("https://alphafold.ebi.ac.uk/entry/{accession}")),
    ];
    if let Some(gene) = &data.gene {
        citations.push((
            "Alliance of Genome Resources",
            format!("https://www.alliancegenome.org/gene/{}", gene.id),
        ));
    }
    for (name, url) in citations {
        let url = escape_html(&url);
        let _ = writeln!(html, "<p><a href=\"{url}\">{name}: {url}</a></p>");
    }
    html.push_str("</section>\n");
}

fn disease_names(links: &[DiseaseLink]) -> String {
    links
        .iter()
        .map(|link| escape_html(&link.name))
        .collect::<Vec<_>>()
        .join(", ")
}

fn render_unresolved(html: &mut String, data: &ReportData) {
    html.push_str("<section>\n<h2>Sequence Record</h2>\n");
    if let Some(record) = &data.record {
        let _ = write!(
            html,
            "<p>Accession: {}<br>\nName: {}<br>\nDescription: {}<br>\nAmino Acid length: {}</p>\n<p class=\"sequence\">{}</p>\n",
            escape_html(&record.accession),
            escape_html(&record.name),
            escape_html(&record.description),
            record.sequence.chars().count(),
            escape_html(&record.sequence),
        );
    }
    html.push_str(
        "<p class=\"notice\">No UniProt identifier could be established for this record. \
         Knowledge-base, expression, disease and pathway sections are omitted.</p>\n</section>\n",
    );
}

pub fn write_report(dir: &Utf8Path, file_name: &str, html: &str) -> Result<Utf8PathBuf, KiraError> {
    fs::create_dir_all(dir).map_err(|err| KiraError::Filesystem(err.to_string()))?;
    let path = dir.join(format!("{file_name}.html"));
    fs::write(&path, html).map_err(|err| KiraError::Filesystem(format!("{path}: {err}")))?;
    Ok(path)
}

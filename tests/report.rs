use std::fs;

use camino::Utf8PathBuf;

use kira_protein_report::alliance::{
    DiseaseAnnotation, DiseaseAssociations, DiseaseCategoryCounts, GeneInfo,
};
use kira_protein_report::charts::{DISEASE_CHART_FILE, disease_chart_svg, write_chart};
use kira_protein_report::domain::SequenceRecord;
use kira_protein_report::reactome::Pathway;
use kira_protein_report::report::{ReportData, render_report, write_report};
use kira_protein_report::uniprot::build_protein_summary;

fn annotation(name: &str, relation: &str, slims: &[&str]) -> DiseaseAnnotation {
    DiseaseAnnotation {
        disease_name: name.to_string(),
        disease_id: format!("DOID:{}", name.len()),
        association_type: relation.to_string(),
        parent_slim_ids: slims.iter().map(|s| s.to_string()).collect(),
    }
}

fn annotations() -> Vec<DiseaseAnnotation> {
    vec![
        annotation("breast cancer", "is_marker_for", &["DOID:162", "DOID:4"]),
        annotation("Li-Fraumeni syndrome", "is_implicated_in", &["DOID:162", "DOID:225"]),
        annotation("hepatocellular carcinoma", "is_implicated_in", &["DOID:162"]),
    ]
}

#[test]
fn disease_chart_orders_smallest_first() {
    let counts = DiseaseCategoryCounts::from_annotations(&annotations());
    let rows = counts.chartable();
    let names: Vec<&str> = rows.iter().map(|row| row.name).collect();
    assert_eq!(names, vec!["Syndrome", "Cancer"]);

    let svg = disease_chart_svg(&rows).unwrap();
    assert!(svg.contains("Figure 1: Disease Annotation Level by Category"));
    assert!(svg.contains("#30b683"));
    assert!(svg.find("Syndrome") < svg.find("Cancer"));

    assert!(disease_chart_svg(&[]).is_none());
}

#[test]
fn chart_and_report_files_land_in_place() {
    let temp = tempfile::tempdir().unwrap();
    let dir = Utf8PathBuf::from_path_buf(temp.path().join("report")).unwrap();

    let chart = write_chart(&dir.join("graphics"), DISEASE_CHART_FILE, "<svg/>").unwrap();
    assert!(chart.ends_with("graphics/disease_annotations_plot.svg"));
    let html = write_report(&dir, "Protein report", "<html></html>").unwrap();
    assert_eq!(html.file_name(), Some("Protein report.html"));
    assert_eq!(fs::read_to_string(html).unwrap(), "<html></html>");
}

#[test]
fn full_report_sections() {
    let raw = fs::read_to_string("tests/fixtures/uniprot_P04637.json").unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    let data = ReportData {
        protein: Some(build_protein_summary(&value).unwrap()),
        gene: Some(GeneInfo {
            id: "HGNC:11998".to_string(),
            symbol: "TP53".to_string(),
            name: "tumor protein p53".to_string(),
            synopsis: "Acts as a tumor suppressor in many tumor types.".to_string(),
        }),
        diseases: DiseaseAssociations::from_annotations(&annotations()),
        pathways: vec![Pathway::from_stable_id("Apoptosis", "R-HSA-109581")],
        pathway_summary: Some(
            "**Cell death:** apoptosis & *friends*.\n\n1. Intrinsic\n2. Extrinsic".to_string(),
        ),
        disease_chart: Some("graphics/disease_annotations_plot.svg".to_string()),
        ..ReportData::default()
    };

    let html = render_report(&data);
    assert!(html.contains("<h1>Protein Analysis Report</h1>"));
    assert!(html.contains("Cellular tumor antigen p53"));
    assert!(html.contains("Cofactor(s): Zn(2+) - Binds 1 zinc ion per subunit."));
    assert!(html.contains("Found on Chromosome unknown"));
    assert!(html.contains("Acts as a tumor suppressor"));
    assert!(html.contains("This gene is a marker for: breast cancer"));
    assert!(html.contains(
        "This gene is implicated in: Li-Fraumeni syndrome, hepatocellular carcinoma"
    ));
    assert!(html.contains("<strong>Cell death:</strong> apoptosis &amp; <em>friends</em>."));
    assert!(html.contains("<li>Intrinsic</li>"));
    assert!(html.contains("https://reactome.org/content/detail/R-HSA-109581"));
    assert!(html.contains("https://www.alliancegenome.org/gene/HGNC:11998"));
    assert!(!html.contains("Natural Variants"));
    assert!(!html.contains("Sequence Record"));
}

#[test]
fn unresolved_report_shows_record_only() {
    let data = ReportData {
        record: Some(SequenceRecord {
            accession: "XP_011.1".to_string(),
            name: "XP_011".to_string(),
            description: "hypothetical <protein>".to_string(),
            sequence: "MKV".to_string(),
        }),
        ..ReportData::default()
    };

    let html = render_report(&data);
    assert!(html.contains("Sequence Record"));
    assert!(html.contains("hypothetical &lt;protein&gt;"));
    assert!(html.contains("Amino Acid length: 3"));
    assert!(!html.contains("Core Info"));
    assert!(!html.contains("Citations"));
}

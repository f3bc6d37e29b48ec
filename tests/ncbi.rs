use std::fs;

use assert_matches::assert_matches;
use httpmock::prelude::*;

use kira_protein_report::config::HttpSettings;
use kira_protein_report::domain::{NcbiAccession, TaxonId};
use kira_protein_report::error::KiraError;
use kira_protein_report::ncbi::{NcbiHttpClient, SequenceArchive, TaxonomyLookup, parse_genbank};

fn client(server: &MockServer) -> NcbiHttpClient {
    let http = HttpSettings {
        max_retries: 2,
        retry_interval_secs: 0,
        timeout_secs: 5,
        transient_retries: 1,
        transient_delay_ms: 0,
    };
    NcbiHttpClient::with_base_url(
        &http,
        Some("lab@example.org".to_string()),
        "kira-protein-report",
        &server.base_url(),
    )
    .unwrap()
}

#[test]
fn genbank_first_record_only() {
    let text = fs::read_to_string("tests/fixtures/NP_000537.gb").unwrap();
    let record = parse_genbank(&text).unwrap();

    assert_eq!(record.name, "NP_000537");
    assert_eq!(record.accession, "NP_000537.3");
    assert_eq!(
        record.description,
        "cellular tumor antigen p53 isoform a [Homo sapiens]"
    );
    assert_eq!(record.sequence.len(), 120);
    assert!(record.sequence.starts_with("MEEPQSDPSVEPPLSQETFS"));
    assert!(record.sequence.chars().all(|c| c.is_ascii_uppercase()));
}

#[test]
fn genbank_without_locus_is_malformed() {
    let err = parse_genbank("DEFINITION  nothing.\n//\n").unwrap_err();
    assert_matches!(err, KiraError::Malformed { .. });
}

#[test]
fn efetch_returns_parsed_record() {
    let server = MockServer::start();
    let body = fs::read_to_string("tests/fixtures/NP_000537.gb").unwrap();
    let mock = server.mock(|when, then| {
        when.method(GET)
            .path("/efetch.fcgi")
            .query_param("db", "protein")
            .query_param("id", "NP_000537.3")
            .query_param("rettype", "gb")
            .query_param("email", "lab@example.org");
        then.status(200).body(body);
    });

    let accession: NcbiAccession = "np_000537.3".parse().unwrap();
    let record = client(&server).fetch_record(&accession).unwrap();
    mock.assert();
    assert_eq!(record.accession, "NP_000537.3");
}

#[test]
fn efetch_unknown_accession_is_not_found() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/efetch.fcgi");
        then.status(400).body("Error: F a i l u r e");
    });

    let accession: NcbiAccession = "XP_999999.1".parse().unwrap();
    let err = client(&server).fetch_record(&accession).unwrap_err();
    assert_matches!(err, KiraError::RecordNotFound(id) if id == "XP_999999.1");
}

#[test]
fn taxonomy_lookup_takes_first_id() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET)
            .path("/esearch.fcgi")
            .query_param("db", "taxonomy")
            .query_param("term", "Homo sapiens");
        then.status(200).json_body(serde_json::json!({
            "esearchresult": { "count": "1", "idlist": ["9606"] }
        }));
    });
    server.mock(|when, then| {
        when.method(GET)
            .path("/esearch.fcgi")
            .query_param("term", "Nonexistent beast");
        then.status(200).json_body(serde_json::json!({
            "esearchresult": { "count": "0", "idlist": [] }
        }));
    });

    let ncbi = client(&server);
    assert_eq!(ncbi.by_name("Homo sapiens").unwrap(), Some(TaxonId::new(9606)));
    assert_eq!(ncbi.by_name("Nonexistent beast").unwrap(), None);
}

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use serde_json::Value;
use tracing::{info, warn};

use crate::browser::HeadlessBrowser;
use crate::config::HttpSettings;
use crate::domain::UniprotAccession;
use crate::error::KiraError;
use crate::http::ApiClient;

const SERVICE: &str = "AlphaFold";

pub const DEFAULT_ALPHAFOLD_BASE: &str = "https://alphafold.ebi.ac.uk";

pub const IMAGE_FILE_NAME: &str = "protein_image.png";

/// Cartoon colour per residue, three-letter code to hex.
pub const RESIDUE_COLOURS: [(&str, &str); 20] = [
    ("ALA", "#9ed696"),
    ("ARG", "#25b783"),
    ("ASN", "#d5e879"),
    ("ASP", "#7ccca9"),
    ("CYS", "#9ed696"),
    ("GLN", "#25b783"),
    ("GLU", "#d5e879"),
    ("GLY", "#7ccca9"),
    ("HIS", "#c4b8a6"),
    ("ILE", "#f1e3a7"),
    ("LEU", "#bad4cc"),
    ("LYS", "#b5e2e6"),
    ("MET", "#f2c2a7"),
    ("PHE", "#b9a48d"),
    ("PRO", "#f7d08a"),
    ("SER", "#c2b9d6"),
    ("THR", "#a5b8d3"),
    ("TRP", "#f0e6c8"),
    ("TYR", "#f0c7ab"),
    ("VAL", "#f2d2e4"),
];

pub trait AlphaFoldClient: Send + Sync {
    /// Coordinates URL of the first model, `Ok(None)` when no prediction exists.
    fn pdb_url(&self, id: &UniprotAccession) -> Result<Option<String>, KiraError>;
}

#[derive(Clone)]
pub struct AlphaFoldHttpClient {
    api: ApiClient,
    base_url: String,
}

impl AlphaFoldHttpClient {
    pub fn new(http: &HttpSettings) -> Result<Self, KiraError> {
        Self::with_base_url(http, DEFAULT_ALPHAFOLD_BASE)
    }

    pub fn with_base_url(http: &HttpSettings, base_url: &str) -> Result<Self, KiraError> {
        Ok(Self {
            api: ApiClient::new(SERVICE, http)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

impl AlphaFoldClient for AlphaFoldHttpClient {
    fn pdb_url(&self, id: &UniprotAccession) -> Result<Option<String>, KiraError> {
        let url = format!("{}/api/prediction/{}", self.base_url, id.as_str());
        let raw: Value = match self.api.get_json(&url, &[]) {
            Ok(raw) => raw,
            Err(KiraError::Status { status: 404, .. }) => return Ok(None),
            Err(err) => return Err(err),
        };
        info!(accession = %id, "AlphaFold prediction retrieved");
        Ok(raw
            .as_array()
            .and_then(|arr| arr.first())
            .and_then(|v| v.get("pdbUrl"))
            .and_then(|v| v.as_str())
            .map(|v| v.to_string()))
    }
}

/// Standalone page rendering the model as a residue-coloured cartoon with 3Dmol.js.
pub fn viewer_html(pdb_url: &str) -> String {
    let palette = RESIDUE_COLOURS
        .iter()
        .map(|(name, colour)| format!("\"{name}\":\"{colour}\""))
        .collect::<Vec<_>>()
        .join(",");
    let pdb_url = serde_json::to_string(pdb_url).unwrap_or_else(|_| "\"\"".to_string());
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<script src="https://3Dmol.org/build/3Dmol-min.js"></script>
<style>html, body {{ margin: 0; background: white; }} #viewer {{ width: 1920px; height: 1080px; position: relative; }}</style>
</head>
<body>
<div id="viewer"></div>
<script>
const palette = {{{palette}}};
const viewer = $3Dmol.createViewer("viewer", {{ backgroundColor: "white" }});
fetch({pdb_url})
  .then((response) => response.text())
  .then((pdb) => {{
    viewer.addModel(pdb, "pdb");
    viewer.setStyle({{}}, {{ cartoon: {{ colorfunc: (atom) => palette[atom.resn] || "white" }} }});
    viewer.zoomTo();
    viewer.zoom(1.1);
    viewer.render();
  }});
</script>
</body>
</html>
"#
    )
}

/// Single best-effort background capture of the structure image.
pub struct ScreenshotJob {
    handle: JoinHandle<Result<PathBuf, KiraError>>,
}

impl ScreenshotJob {
    pub fn spawn(browser: Arc<dyn HeadlessBrowser>, pdb_url: String, destination: PathBuf) -> Self {
        let handle = thread::spawn(move || capture(browser.as_ref(), &pdb_url, &destination));
        Self { handle }
    }

    /// Blocks until the capture has finished or been given up on.
    pub fn wait(self) -> Result<PathBuf, KiraError> {
        match self.handle.join() {
            Ok(result) => result,
            Err(_) => Err(KiraError::Browser("screenshot worker panicked".to_string())),
        }
    }
}

fn capture(
    browser: &dyn HeadlessBrowser,
    pdb_url: &str,
    destination: &Path,
) -> Result<PathBuf, KiraError> {
    let workdir = tempfile::tempdir().map_err(|err| KiraError::Filesystem(err.to_string()))?;
    let page = workdir.path().join("viewer.html");
    fs::write(&page, viewer_html(pdb_url)).map_err(|err| KiraError::Filesystem(err.to_string()))?;
    let shot = workdir.path().join(IMAGE_FILE_NAME);

    if let Err(err) = browser.screenshot(&page, &shot) {
        warn!(error = %err, "structure screenshot failed");
        return Err(err);
    }
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent).map_err(|err| KiraError::Filesystem(err.to_string()))?;
    }
    fs::copy(&shot, destination).map_err(|err| KiraError::Filesystem(err.to_string()))?;
    info!(path = %destination.display(), "protein image saved");
    Ok(destination.to_path_buf())
}

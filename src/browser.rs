use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::BrowserSettings;
use crate::error::KiraError;

const CANDIDATES: [&str; 5] = [
    "chromium",
    "chromium-browser",
    "google-chrome",
    "google-chrome-stable",
    "chrome",
];

/// Headless rendering of local HTML pages.
pub trait HeadlessBrowser: Send + Sync {
    /// Fire-and-wait capture: the browser gets a fixed time budget and is terminated afterwards
    /// whether or not it finished.
    fn screenshot(&self, page: &Path, output: &Path) -> Result<(), KiraError>;
    fn print_to_pdf(&self, page: &Path, output: &Path) -> Result<(), KiraError>;
}

#[derive(Debug, Clone)]
pub struct ChromeBrowser {
    binary: Option<PathBuf>,
    startup_wait: Duration,
    capture_wait: Duration,
}

impl ChromeBrowser {
    pub fn new(settings: &BrowserSettings) -> Self {
        let binary = match &settings.path {
            Some(path) => Some(path.clone().into_std_path_buf()),
            None => CANDIDATES.iter().find_map(|name| find_in_path(name)),
        };
        Self {
            binary,
            startup_wait: Duration::from_secs(settings.startup_wait_secs),
            capture_wait: Duration::from_secs(settings.capture_wait_secs),
        }
    }

    pub fn binary(&self) -> Option<&Path> {
        self.binary.as_deref()
    }

    fn require_binary(&self) -> Result<&PathBuf, KiraError> {
        self.binary
            .as_ref()
            .ok_or_else(|| KiraError::MissingTool("chromium or google-chrome".to_string()))
    }
}

impl HeadlessBrowser for ChromeBrowser {
    fn screenshot(&self, page: &Path, output: &Path) -> Result<(), KiraError> {
        let program = self.require_binary()?;
        let budget = self.startup_wait + self.capture_wait;
        let mut child = Command::new(program)
            .args(headless_args())
            .arg("--window-size=1920,1080")
            .arg(format!("--virtual-time-budget={}", budget.as_millis()))
            .arg(format!("--screenshot={}", output.display()))
            .arg(file_url(page)?)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|err| KiraError::Browser(err.to_string()))?;
        debug!(pid = child.id(), "screenshot browser started");

        thread::sleep(budget);

        if let Err(err) = child.kill() {
            debug!(error = %err, "screenshot browser already exited");
        }
        let _ = child.wait();

        if output.exists() {
            Ok(())
        } else {
            Err(KiraError::Browser(format!(
                "no screenshot written to {}",
                output.display()
            )))
        }
    }

    fn print_to_pdf(&self, page: &Path, output: &Path) -> Result<(), KiraError> {
        let program = self.require_binary()?;
        let result = Command::new(program)
            .args(headless_args())
            .arg("--no-pdf-header-footer")
            .arg(format!("--print-to-pdf={}", output.display()))
            .arg(file_url(page)?)
            .output()
            .map_err(|err| KiraError::Browser(err.to_string()))?;
        if result.status.success() && output.exists() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&result.stderr).trim().to_string();
        let message = if stderr.is_empty() {
            format!("command failed: {}", program.display())
        } else {
            stderr
        };
        warn!(message = %message, "PDF conversion failed");
        Err(KiraError::Browser(message))
    }
}

fn headless_args() -> [&'static str; 4] {
    ["--headless", "--disable-gpu", "--no-sandbox", "--hide-scrollbars"]
}

fn file_url(page: &Path) -> Result<String, KiraError> {
    let absolute =
        std::path::absolute(page).map_err(|err| KiraError::Filesystem(err.to_string()))?;
    Ok(format!("file://{}", absolute.display()))
}

fn find_in_path(name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    for path in std::env::split_paths(&path_var) {
        let exe = path.join(format!("{name}.exe"));
        if exe.exists() {
            return Some(exe);
        }
        let plain = path.join(name);
        if plain.exists() {
            return Some(plain);
        }
    }
    None
}

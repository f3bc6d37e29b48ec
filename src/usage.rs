//! Persisted request/token counters for the summary service.
//!
//! Every reservation is a read-modify-write of one JSON file under an exclusive `fs2` lock.
//! The lock is advisory: it serialises cooperating `kira-pr` processes only.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::UsageLimits;
use crate::error::KiraError;

const DAY_MS: i64 = 86_400_000;
const MINUTE_MS: i64 = 60_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageMark {
    /// Milliseconds since the Unix epoch.
    pub at: i64,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageState {
    #[serde(default)]
    pub requests: Vec<UsageMark>,
    #[serde(default)]
    pub tokens: Vec<UsageMark>,
    #[serde(default)]
    pub requests_today: u64,
    pub last_reset: i64,
}

impl UsageState {
    fn fresh(now: i64) -> Self {
        Self {
            requests: Vec::new(),
            tokens: Vec::new(),
            requests_today: 0,
            last_reset: now,
        }
    }

    /// Daily counter reset and minute-window pruning as of `now`.
    fn roll(&mut self, now: i64) {
        if now - self.last_reset >= DAY_MS {
            debug!("resetting daily summary usage");
            self.requests_today = 0;
            self.last_reset = now;
        }
        self.requests.retain(|mark| now - mark.at < MINUTE_MS);
        self.tokens.retain(|mark| now - mark.at < MINUTE_MS);
    }

    fn window_total(marks: &[UsageMark]) -> u64 {
        marks.iter().map(|mark| mark.count).sum()
    }

    pub fn requests_last_minute(&self) -> u64 {
        Self::window_total(&self.requests)
    }

    pub fn tokens_last_minute(&self) -> u64 {
        Self::window_total(&self.tokens)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UsageStatus {
    pub ledger_path: String,
    pub requests_last_minute: u64,
    pub tokens_last_minute: u64,
    pub requests_today: u64,
    pub limits: UsageLimits,
}

pub struct UsageLedger {
    path: Utf8PathBuf,
    limits: UsageLimits,
}

impl UsageLedger {
    pub fn new(path: impl Into<Utf8PathBuf>, limits: UsageLimits) -> Self {
        Self {
            path: path.into(),
            limits,
        }
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    pub fn try_reserve(&self, requests: u64, tokens: u64) -> Result<bool, KiraError> {
        self.try_reserve_at(requests, tokens, Utc::now())
    }

    /// Records the usage and returns `true` if it fits every limit; otherwise leaves the ledger
    /// untouched and returns `false`.
    pub fn try_reserve_at(
        &self,
        requests: u64,
        tokens: u64,
        now: DateTime<Utc>,
    ) -> Result<bool, KiraError> {
        let now = now.timestamp_millis();
        let file = self.open_locked()?;
        let result = self.reserve_locked(&file, requests, tokens, now);
        FileExt::unlock(&file).map_err(|err| KiraError::Ledger(err.to_string()))?;
        result
    }

    fn reserve_locked(
        &self,
        file: &File,
        requests: u64,
        tokens: u64,
        now: i64,
    ) -> Result<bool, KiraError> {
        let mut state = read_state(file, now)?;
        state.roll(now);

        let limits = &self.limits;
        if state.requests_last_minute() + requests > limits.requests_per_minute
            || state.tokens_last_minute() + tokens > limits.tokens_per_minute
            || state.requests_today + requests > limits.requests_per_day
        {
            info!(requests, tokens, "summary usage limit reached");
            return Ok(false);
        }

        state.requests.push(UsageMark { at: now, count: requests });
        state.tokens.push(UsageMark { at: now, count: tokens });
        state.requests_today += requests;
        write_state(file, &state)?;
        Ok(true)
    }

    pub fn status(&self) -> Result<UsageStatus, KiraError> {
        self.status_at(Utc::now())
    }

    pub fn status_at(&self, now: DateTime<Utc>) -> Result<UsageStatus, KiraError> {
        let now = now.timestamp_millis();
        let mut state = if self.path.exists() {
            let file = File::open(&self.path).map_err(|err| KiraError::Ledger(err.to_string()))?;
            FileExt::lock_shared(&file).map_err(|err| KiraError::Ledger(err.to_string()))?;
            let state = read_state(&file, now);
            FileExt::unlock(&file).map_err(|err| KiraError::Ledger(err.to_string()))?;
            state?
        } else {
            UsageState::fresh(now)
        };
        state.roll(now);
        Ok(UsageStatus {
            ledger_path: self.path.to_string(),
            requests_last_minute: state.requests_last_minute(),
            tokens_last_minute: state.tokens_last_minute(),
            requests_today: state.requests_today,
            limits: self.limits,
        })
    }

    fn open_locked(&self) -> Result<File, KiraError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|err| KiraError::Ledger(err.to_string()))?;
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)
            .map_err(|err| KiraError::Ledger(format!("open {}: {err}", self.path)))?;
        FileExt::lock_exclusive(&file).map_err(|err| KiraError::Ledger(err.to_string()))?;
        Ok(file)
    }
}

/// An empty file is a ledger that has never been used.
fn read_state(mut file: &File, now: i64) -> Result<UsageState, KiraError> {
    let mut data = String::new();
    file.seek(SeekFrom::Start(0))
        .map_err(|err| KiraError::Ledger(err.to_string()))?;
    file.read_to_string(&mut data)
        .map_err(|err| KiraError::Ledger(err.to_string()))?;
    if data.trim().is_empty() {
        return Ok(UsageState::fresh(now));
    }
    serde_json::from_str(&data).map_err(|err| KiraError::Ledger(format!("parse: {err}")))
}

fn write_state(mut file: &File, state: &UsageState) -> Result<(), KiraError> {
    let json = serde_json::to_string_pretty(state)
        .map_err(|err| KiraError::Ledger(format!("serialize: {err}")))?;
    file.set_len(0)
        .map_err(|err| KiraError::Ledger(err.to_string()))?;
    file.seek(SeekFrom::Start(0))
        .map_err(|err| KiraError::Ledger(err.to_string()))?;
    file.write_all(json.as_bytes())
        .map_err(|err| KiraError::Ledger(err.to_string()))?;
    Ok(())
}

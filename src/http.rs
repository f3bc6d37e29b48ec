use std::thread;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::config::HttpSettings;
use crate::error::KiraError;

/// Blocking client shared by every remote source. Transport faults, 429 and 5xx are resent up to
/// `transient_retries` times; `202 Accepted` is polled up to `max_retries` times.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    service: &'static str,
    max_retries: usize,
    retry_interval: Duration,
    transient_retries: usize,
    transient_delay: Duration,
}

impl ApiClient {
    pub fn new(service: &'static str, settings: &HttpSettings) -> Result<Self, KiraError> {
        Self::with_headers(service, settings, HeaderMap::new())
    }

    pub fn with_headers(
        service: &'static str,
        settings: &HttpSettings,
        mut headers: HeaderMap,
    ) -> Result<Self, KiraError> {
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&user_agent()).map_err(|err| KiraError::http(service, err))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|err| KiraError::http(service, err))?;
        Ok(Self {
            client,
            service,
            max_retries: settings.max_retries.max(1),
            retry_interval: Duration::from_secs(settings.retry_interval_secs),
            transient_retries: settings.transient_retries,
            transient_delay: Duration::from_millis(settings.transient_delay_ms),
        })
    }

    pub fn inner(&self) -> &Client {
        &self.client
    }

    pub fn send_with_retries<F>(&self, mut make_req: F) -> Result<Response, KiraError>
    where
        F: FnMut() -> RequestBuilder,
    {
        let mut attempt = 0usize;
        loop {
            let response = make_req().send();
            match response {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if attempt < self.transient_retries && is_retryable_status(status) {
                        debug!(service = self.service, status, attempt, "retrying request");
                        thread::sleep(self.transient_delay * (attempt as u32 + 1));
                        attempt += 1;
                        continue;
                    }
                    return Ok(resp);
                }
                Err(err) => {
                    if attempt < self.transient_retries && is_retryable_error(&err) {
                        debug!(service = self.service, attempt, "retrying after transport error");
                        thread::sleep(self.transient_delay * (attempt as u32 + 1));
                        attempt += 1;
                        continue;
                    }
                    return Err(KiraError::http(self.service, err));
                }
            }
        }
    }

    pub fn handle_status(&self, response: Response) -> Result<Response, KiraError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| format!("{} request failed", self.service));
        Err(KiraError::Status {
            service: self.service,
            status,
            message,
        })
    }

    /// GET until the service answers `200`. `202` means the result is still being prepared and is
    /// retried after the configured interval; any other status fails immediately.
    pub fn get_ready<F>(&self, mut make_req: F) -> Result<Response, KiraError>
    where
        F: FnMut() -> RequestBuilder,
    {
        for attempt in 1..=self.max_retries {
            let response = self.send_with_retries(&mut make_req)?;
            match response.status() {
                StatusCode::OK => return Ok(response),
                StatusCode::ACCEPTED => {
                    debug!(service = self.service, attempt, "request accepted, waiting for data");
                    thread::sleep(self.retry_interval);
                }
                _ => {
                    let response = self.handle_status(response)?;
                    warn!(
                        service = self.service,
                        status = response.status().as_u16(),
                        "unexpected success status"
                    );
                    return Ok(response);
                }
            }
        }
        Err(KiraError::NotReady {
            service: self.service,
            attempts: self.max_retries,
        })
    }

    pub fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T, KiraError> {
        let response = self.get_ready(|| self.client.get(url).query(query))?;
        response
            .json()
            .map_err(|err| KiraError::malformed(self.service, err.to_string()))
    }

    /// Form POST; the raw response is returned so callers can inspect `202` and `Location`.
    pub fn post_form(&self, url: &str, form: &[(&str, &str)]) -> Result<Response, KiraError> {
        self.send_with_retries(|| self.client.post(url).form(form))
    }

    pub fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
        body: &B,
    ) -> Result<T, KiraError> {
        let response = self.send_with_retries(|| self.client.post(url).query(query).json(body))?;
        let response = self.handle_status(response)?;
        response
            .json()
            .map_err(|err| KiraError::malformed(self.service, err.to_string()))
    }

    pub fn get_text(&self, url: &str, query: &[(&str, &str)]) -> Result<String, KiraError> {
        let response = self.get_ready(|| self.client.get(url).query(query))?;
        response
            .text()
            .map_err(|err| KiraError::http(self.service, err))
    }
}

pub fn user_agent() -> String {
    format!("kira-pr/{}", env!("CARGO_PKG_VERSION"))
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}

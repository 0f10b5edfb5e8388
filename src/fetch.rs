use std::future::Future;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::config::Settings;
use crate::error::{Result, SyncError};

const USER_AGENT: &str = concat!("ofac_sync/", env!("CARGO_PKG_VERSION"));

/// Page transport used by every pipeline stage.
pub trait Transport {
    async fn get(&self, url: &str) -> Result<String>;
    async fn post_form(&self, url: &str, form: &[(String, String)]) -> Result<String>;
}

/// reqwest-backed transport. The cookie store keeps the search session
/// alive between the form GET and the POST.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(settings: &Settings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(settings.request_timeout())
            .cookie_store(true)
            .build()
            .map_err(|e| SyncError::transport("<client>", e))?;
        Ok(Self { client })
    }

    async fn read_body(url: &str, response: reqwest::Response, start: Instant) -> Result<String> {
        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::transport(url, format!("HTTP {}", status)));
        }
        let body = response
            .text()
            .await
            .map_err(|e| SyncError::transport(url, e))?;
        debug!(
            "{} -> {} ({} bytes, {}ms)",
            url,
            status,
            body.len(),
            start.elapsed().as_millis()
        );
        Ok(body)
    }
}

impl Transport for HttpTransport {
    async fn get(&self, url: &str) -> Result<String> {
        let start = Instant::now();
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| SyncError::transport(url, e))?;
        Self::read_body(url, response, start).await
    }

    async fn post_form(&self, url: &str, form: &[(String, String)]) -> Result<String> {
        let start = Instant::now();
        let response = self
            .client
            .post(url)
            .form(form)
            .send()
            .await
            .map_err(|e| SyncError::transport(url, e))?;
        Self::read_body(url, response, start).await
    }
}

/// Bounded retry with exponential backoff: `base_backoff * 2^attempt`.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_backoff: Duration,
}

impl RetryPolicy {
    pub fn attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or
    /// the retry budget is spent. The last error is returned.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    let backoff = self.base_backoff * 2u32.pow(attempt);
                    warn!(
                        "{} failed (attempt {}/{}): {}; backing off {:.1}s",
                        label,
                        attempt + 1,
                        self.attempts(),
                        e,
                        backoff.as_secs_f64()
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
pub mod testing {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::Transport;
    use crate::error::{Result, SyncError};
    use crate::resolver::SEARCH_NAME_FIELD;

    const EMPTY_RESULTS: &str =
        r#"<html><body><span id="ctl00_MainContent_lblResults">0 Found</span></body></html>"#;

    pub fn fixture(name: &str) -> String {
        std::fs::read_to_string(format!("tests/fixtures/{}", name)).unwrap()
    }

    /// In-memory transport: GETs are served by URL, search POSTs by the
    /// submitted name. Keys listed in `failures` fail that many times first.
    #[derive(Default)]
    pub struct FakeTransport {
        pages: HashMap<String, String>,
        searches: HashMap<String, String>,
        failures: Mutex<HashMap<String, u32>>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn page(mut self, url: &str, body: impl Into<String>) -> Self {
            self.pages.insert(url.to_string(), body.into());
            self
        }

        pub fn search(mut self, name: &str, body: impl Into<String>) -> Self {
            self.searches.insert(name.to_string(), body.into());
            self
        }

        pub fn failing(self, key: &str, times: u32) -> Self {
            self.failures.lock().unwrap().insert(key.to_string(), times);
            self
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn maybe_fail(&self, key: &str) -> Result<()> {
            let mut failures = self.failures.lock().unwrap();
            match failures.get_mut(key) {
                Some(n) if *n > 0 => {
                    *n -= 1;
                    Err(SyncError::transport(key, "HTTP 503 Service Unavailable"))
                }
                _ => Ok(()),
            }
        }
    }

    impl Transport for FakeTransport {
        async fn get(&self, url: &str) -> Result<String> {
            self.calls.lock().unwrap().push(format!("GET {}", url));
            self.maybe_fail(url)?;
            self.pages
                .get(url)
                .cloned()
                .ok_or_else(|| SyncError::transport(url, "HTTP 404 Not Found"))
        }

        async fn post_form(&self, url: &str, form: &[(String, String)]) -> Result<String> {
            let name = form
                .iter()
                .find(|(k, _)| k == SEARCH_NAME_FIELD)
                .map(|(_, v)| v.clone())
                .unwrap_or_default();
            self.calls.lock().unwrap().push(format!("POST {} {}", url, name));
            self.maybe_fail(&name)?;
            Ok(self
                .searches
                .get(&name)
                .cloned()
                .unwrap_or_else(|| EMPTY_RESULTS.to_string()))
        }
    }
}

// ── Tests ──

use std::path::PathBuf;
use std::time::Duration;

use crate::config::OverpassConfig;

const USER_AGENT: &str = concat!("surveycheck/", env!("CARGO_PKG_VERSION"));

/// Overpass QL query for survey points carrying coordinate tags
///
/// Output is header-free CSV: `id,lat,latitude,lon,longitude`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurveyPointQuery {
    /// Value of the `name` tag of the boundary to search in
    pub area: String,
    pub admin_level: u8,
    /// Server-side timeout in seconds
    pub timeout_secs: u64,
}

impl Default for SurveyPointQuery {
    fn default() -> Self {
        Self {
            area: "Colombia".to_string(),
            admin_level: 2,
            timeout_secs: 180,
        }
    }
}

impl SurveyPointQuery {
    pub fn to_overpass_ql(&self) -> String {
        let area = self.area.replace('\\', "\\\\").replace('"', "\\\"");
        format!(
            r#"[out:csv(::id,::lat,"latitude",::lon,"longitude";false;",")][timeout:{timeout}];
area["name"="{area}"]["admin_level"="{level}"]["boundary"="administrative"]->.searchArea;
node["man_made"="survey_point"]["latitude"]["longitude"](area.searchArea);
out;"#,
            timeout = self.timeout_secs,
            area = area,
            level = self.admin_level,
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("failed to create HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned error status {status}")]
    Status { url: String, status: u16 },
    #[error("failed to read response body from {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("all Overpass mirrors failed, last error: {0}")]
    Exhausted(String),
    #[error("no Overpass URL configured")]
    NoEndpoint,
    #[error("failed to read {path}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Where the raw survey point CSV comes from
pub trait PointSource {
    fn fetch(&self, query: &str) -> Result<String, FetchError>;

    /// Human-readable origin for logs
    fn describe(&self) -> String;
}

/// Fetches from the Overpass interpreter, trying each configured mirror
pub struct OverpassClient {
    config: OverpassConfig,
}

impl OverpassClient {
    pub fn new(config: OverpassConfig) -> Self {
        Self { config }
    }

    fn send_with_retry(
        &self,
        client: &reqwest::blocking::Client,
        url: &str,
        query: &str,
    ) -> Result<String, FetchError> {
        let max_retries = self.config.max_retries;
        let mut last_status = None;

        // One initial attempt plus up to `max_retries` retries
        for attempt in 0..=max_retries {
            if attempt > 0 {
                // Overpass asks clients to back off when it is overloaded
                let wait_secs = self.config.retry_delay_secs * u64::from(attempt);
                tracing::warn!(
                    url,
                    wait_secs,
                    retry = attempt,
                    max_retries,
                    "Overpass busy, retrying"
                );
                std::thread::sleep(Duration::from_secs(wait_secs));
            }

            // Overpass expects form-encoded POST data: data=<query>
            let response = client
                .post(url)
                .form(&[("data", query)])
                .send()
                .map_err(|source| FetchError::Request {
                    url: url.to_string(),
                    source,
                })?;

            let status = response.status();
            if status.is_success() {
                return response.text().map_err(|source| FetchError::Body {
                    url: url.to_string(),
                    source,
                });
            }

            match status.as_u16() {
                // Too Many Requests / Gateway Timeout are retriable
                429 | 504 => last_status = Some(status.as_u16()),
                code => {
                    return Err(FetchError::Status {
                        url: url.to_string(),
                        status: code,
                    });
                }
            }
        }

        Err(FetchError::Status {
            url: url.to_string(),
            status: last_status.unwrap_or_default(),
        })
    }
}

impl PointSource for OverpassClient {
    fn fetch(&self, query: &str) -> Result<String, FetchError> {
        if self.config.urls.is_empty() {
            return Err(FetchError::NoEndpoint);
        }

        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .build()
            .map_err(FetchError::Client)?;

        let mut last_error = None;
        for url in &self.config.urls {
            tracing::info!(url = %url, "Querying Overpass");
            match self.send_with_retry(&client, url, query) {
                Ok(body) => {
                    tracing::debug!(url = %url, bytes = body.len(), "Overpass response received");
                    return Ok(body);
                }
                Err(err) => {
                    tracing::warn!(url = %url, error = %err, "Overpass mirror failed");
                    last_error = Some(err);
                }
            }
        }

        match last_error {
            Some(err) if self.config.urls.len() == 1 => Err(err),
            Some(err) => Err(FetchError::Exhausted(err.to_string())),
            None => Err(FetchError::NoEndpoint),
        }
    }

    fn describe(&self) -> String {
        format!("Overpass ({} mirror(s))", self.config.urls.len())
    }
}

/// Reads a previously saved CSV response instead of querying Overpass
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl PointSource for FileSource {
    fn fetch(&self, _query: &str) -> Result<String, FetchError> {
        std::fs::read_to_string(&self.path).map_err(|source| FetchError::File {
            path: self.path.clone(),
            source,
        })
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

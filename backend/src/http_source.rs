use crate::{
    error::{SourceError, SourceErrorKind},
    types::{DataSource, StandardMarketData},
};
use reqwest::{header, Client};
use tracing::{debug, warn};

/// HTTP client for one upstream market data API
///
/// Expects `GET {base_url}/market/{zip}` to return a camelCase
/// `StandardMarketData` document and `GET {base_url}/health` to answer 2xx.
pub struct HttpSource {
    client: Client,
    source: DataSource,
    base_url: String,
    api_key: Option<String>,
}

impl HttpSource {
    pub fn new(source: DataSource, base_url: &str, api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            source,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    pub async fn fetch_market(
        &self,
        zip_code: &str,
        force_refresh: bool,
    ) -> Result<StandardMarketData, SourceError> {
        let url = format!("{}/market/{}", self.base_url, zip_code);
        debug!("Fetching {} market data from {}", self.source, url);

        let mut request = self.client.get(&url);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        if force_refresh {
            request = request.header(header::CACHE_CONTROL, "no-cache");
        }

        let response = request.send().await.map_err(|e| self.request_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::new(
                self.source,
                SourceErrorKind::Status(status.as_u16()),
            ));
        }

        let mut record: StandardMarketData = response.json().await.map_err(|e| {
            SourceError::new(self.source, SourceErrorKind::Decode(e.to_string()))
        })?;

        if record.zip_code != zip_code {
            return Err(SourceError::new(
                self.source,
                SourceErrorKind::Decode(format!(
                    "asked for {} but received {}",
                    zip_code, record.zip_code
                )),
            ));
        }

        // Upstream payloads never get to pick their own provenance
        record.data_source = self.source;
        Ok(record)
    }

    pub async fn ping(&self) -> bool {
        let url = format!("{}/health", self.base_url);
        match self.client.get(&url).send().await {
            Ok(response) if response.status().is_success() => {
                debug!("{} health check passed", self.source);
                true
            }
            Ok(response) => {
                warn!(
                    "{} health check failed: HTTP {}",
                    self.source,
                    response.status().as_u16()
                );
                false
            }
            Err(e) => {
                warn!("{} health check failed: {}", self.source, e);
                false
            }
        }
    }

    fn request_error(&self, error: reqwest::Error) -> SourceError {
        let kind = if error.is_timeout() {
            SourceErrorKind::Timeout
        } else if let Some(status) = error.status() {
            SourceErrorKind::Status(status.as_u16())
        } else if error.is_decode() {
            SourceErrorKind::Decode(error.to_string())
        } else {
            SourceErrorKind::Request(error.to_string())
        };
        SourceError::new(self.source, kind)
    }
}

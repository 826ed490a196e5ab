//! HTTP backend for natural-key resolution
//!
//! Blocking REST read against the destination instance, constrained to an
//! exact slug match and capped at one page per call. Any failure — client
//! construction, transport, non-2xx status, undecodable body — degrades to
//! an empty match list; the caller treats that the same as "no matches".

use std::time::Duration;

use tracing::warn;

use crate::error::{Error, Result};
use crate::types::DestinationInstance;

use super::{RemoteCollection, RemoteIndex, RemoteMatch, NATURAL_KEY_PAGE_SIZE};

/// Configuration for the blocking remote index client.
#[derive(Debug, Clone)]
pub struct RemoteIndexConfig {
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Maximum keys (and results) per query
    pub page_size: usize,
    /// Whether to validate TLS certificates
    pub validate_tls: bool,
}

impl Default for RemoteIndexConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            page_size: NATURAL_KEY_PAGE_SIZE,
            validate_tls: true,
        }
    }
}

/// Blocking HTTP implementation of [`RemoteIndex`].
pub struct HttpRemoteIndex {
    client: reqwest::blocking::Client,
    config: RemoteIndexConfig,
}

impl HttpRemoteIndex {
    pub fn new(config: RemoteIndexConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .danger_accept_invalid_certs(!config.validate_tls)
            .build()
            .map_err(|e| Error::HttpClient {
                message: format!("Failed to create HTTP client: {}", e),
                source: Some(Box::new(e)),
            })?;
        Ok(Self { client, config })
    }

    pub fn with_default_config() -> Result<Self> {
        Self::new(RemoteIndexConfig::default())
    }

    /// REST collection path for a natural-key query.
    ///
    /// The two built-in taxonomies expose renamed collection routes; custom
    /// taxonomies expose their registered name.
    fn collection_path(collection: &RemoteCollection) -> String {
        match collection {
            RemoteCollection::Users => "wp/v2/users".to_string(),
            RemoteCollection::Terms { taxonomy } => match taxonomy.as_str() {
                "category" => "wp/v2/categories".to_string(),
                "post_tag" => "wp/v2/tags".to_string(),
                other => format!("wp/v2/{}", other),
            },
        }
    }

    fn query(
        &self,
        destination: &DestinationInstance,
        collection: &RemoteCollection,
        keys: &[String],
    ) -> Result<Vec<RemoteMatch>> {
        let url = destination
            .base_url
            .join(&Self::collection_path(collection))
            .map_err(|e| Error::Configuration {
                message: format!("Invalid destination base URL: {}", e),
                source: Some(anyhow::anyhow!(e)),
            })?;

        let mut request = self.client.get(url).query(&[
            ("slug", keys.join(",")),
            ("per_page", self.config.page_size.to_string()),
        ]);
        if let Some(auth) = &destination.auth {
            request = request.basic_auth(&auth.username, Some(&auth.password));
        }

        let response = request.send().map_err(|e| Error::Remote {
            message: format!("Natural-key query failed: {}", e),
            status_code: None,
            source: Some(anyhow::anyhow!(e)),
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Remote {
                message: format!("Natural-key query returned {}", status),
                status_code: Some(status.as_u16()),
                source: None,
            });
        }

        response.json::<Vec<RemoteMatch>>().map_err(|e| Error::Remote {
            message: format!("Undecodable natural-key response: {}", e),
            status_code: Some(status.as_u16()),
            source: Some(anyhow::anyhow!(e)),
        })
    }
}

impl RemoteIndex for HttpRemoteIndex {
    fn find(
        &self,
        destination: &DestinationInstance,
        collection: &RemoteCollection,
        keys: &[String],
    ) -> Vec<RemoteMatch> {
        if keys.is_empty() {
            return Vec::new();
        }
        match self.query(destination, collection, keys) {
            Ok(matches) => matches,
            Err(e) => {
                warn!(error = %e, destination = %destination.base_url, "remote lookup folded to no matches");
                Vec::new()
            }
        }
    }
}

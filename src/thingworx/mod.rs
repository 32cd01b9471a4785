pub mod models;

use anyhow::{bail, Context, Result};
use reqwest::{header::ACCEPT, Client, Url};
use std::sync::Arc;
use tracing::debug;

use crate::{config::Config, error::FetchError};

use self::models::{parse_properties, ThingProperties};

/// Read-only client for the ThingWorx REST API.
#[derive(Debug, Clone)]
pub struct ThingWorxClient {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    http: Client,
    base_url: Url,
    app_key: Option<String>,
}

impl ThingWorxClient {
    /// Builds the client with a per-request timeout of `fetch_timeout_secs`,
    /// so one unresponsive thing cannot stall a refresh cycle.
    pub fn new(config: &Config) -> Result<Self> {
        let base_url = Url::parse(&config.thingworx_url)
            .with_context(|| format!("THINGWORX_URL is not a valid URL: {:?}", config.thingworx_url))?;
        if base_url.cannot_be_a_base() {
            bail!("THINGWORX_URL must be an http(s) base URL, got {:?}", config.thingworx_url);
        }

        let http = Client::builder()
            .timeout(config.fetch_timeout())
            .build()
            .context("Failed to build ThingWorx HTTP client")?;

        Ok(Self {
            inner: Arc::new(Inner {
                http,
                base_url,
                app_key: config.thingworx_app_key.clone(),
            }),
        })
    }

    /// `<base>/Things/{thing_name}/Properties/[?appKey=...]`
    fn properties_url(&self, thing_name: &str) -> Url {
        let mut url = self.inner.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["Things", thing_name, "Properties", ""]);
        }
        if let Some(app_key) = &self.inner.app_key {
            url.query_pairs_mut().append_pair("appKey", app_key);
        }
        url
    }

    /// Fetch the current temperature/humidity properties of a thing.
    ///
    /// One request, no retries.
    pub async fn fetch(&self, thing_name: &str) -> Result<ThingProperties, FetchError> {
        let url = self.properties_url(thing_name);
        debug!(thing = %thing_name, path = %url.path(), "Fetching thing properties");

        let response = self
            .inner
            .http
            .get(url)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(FetchError::Request)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        let bytes = response.bytes().await.map_err(FetchError::Request)?;
        parse_properties(&bytes)
    }
}

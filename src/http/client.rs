//! Outbound HTTP client registered by `web_client { }`.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};

use crate::config::schema::{CodecKind, WebClientConfig};

/// A configured `reqwest::Client` with an optional base URL.
#[derive(Debug, Clone)]
pub struct WebClient {
    client: reqwest::Client,
    base_url: Option<String>,
}

impl WebClient {
    pub fn new(config: &WebClientConfig) -> Result<Self, reqwest::Error> {
        let mut builder = reqwest::Client::builder().default_headers(accept_headers(&config.codecs));
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        Ok(Self {
            client: builder.build()?,
            base_url: config
                .base_url
                .as_ref()
                .map(|url| url.trim_end_matches('/').to_string()),
        })
    }

    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    /// `path` is appended to the base URL; absolute URLs are used as-is.
    pub fn url(&self, path: &str) -> String {
        match &self.base_url {
            Some(base) if !path.contains("://") => format!("{base}{path}"),
            _ => path.to_string(),
        }
    }

    pub fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.get(self.url(path))
    }

    pub fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.post(self.url(path))
    }

    pub fn put(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.put(self.url(path))
    }

    pub fn delete(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.delete(self.url(path))
    }

    /// The underlying client, for anything the shortcuts don't cover.
    pub fn inner(&self) -> &reqwest::Client {
        &self.client
    }
}

fn accept_headers(codecs: &[CodecKind]) -> HeaderMap {
    let accept: Vec<&str> = codecs
        .iter()
        .map(|codec| match codec {
            CodecKind::String => "text/plain",
            CodecKind::Json => "application/json",
        })
        .collect();

    let mut headers = HeaderMap::new();
    if !accept.is_empty() {
        if let Ok(value) = HeaderValue::from_str(&accept.join(", ")) {
            headers.insert(ACCEPT, value);
        }
    }
    headers
}

use std::time::Duration;

use anyhow::{bail, Context, Result};
use log::debug;
use reqwest::blocking::Client as HttpClient;
use reqwest::header::{ACCEPT, USER_AGENT};

use crate::model::{Listing, Post};

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("images endpoint returned status {0}")]
    Status(u16),
    #[error("request images endpoint: {0}")]
    Transport(String),
    #[error("decode images listing: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    pub endpoint: String,
    pub user_agent: String,
    pub timeout: Option<Duration>,
    pub http_client: Option<HttpClient>,
}

/// Client for the images listing endpoint. Every call returns the full list
/// of posts published so far.
pub struct Client {
    http: HttpClient,
    user_agent: String,
    endpoint: String,
}

impl Client {
    pub fn new(config: ClientConfig) -> Result<Self> {
        if config.user_agent.trim().is_empty() {
            bail!("images client user agent required");
        }
        if config.endpoint.trim().is_empty() {
            bail!("images endpoint required");
        }
        url::Url::parse(&config.endpoint)
            .with_context(|| format!("parse images endpoint {:?}", config.endpoint))?;

        let http = match config.http_client {
            Some(client) => client,
            None => HttpClient::builder()
                .timeout(config.timeout.unwrap_or(Duration::from_secs(20)))
                .build()
                .context("build images http client")?,
        };

        Ok(Client {
            http,
            user_agent: config.user_agent,
            endpoint: config.endpoint,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn images(&self) -> Result<Vec<Post>, LoadError> {
        let response = self
            .http
            .get(&self.endpoint)
            .header(USER_AGENT, &self.user_agent)
            .header(ACCEPT, "application/json")
            .send()
            .map_err(|err| LoadError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LoadError::Status(status.as_u16()));
        }

        let listing: Listing = response
            .json()
            .map_err(|err| LoadError::Decode(err.to_string()))?;
        let posts = listing.into_posts();
        debug!("client: {} returned {} posts", self.endpoint, posts.len());
        Ok(posts)
    }
}

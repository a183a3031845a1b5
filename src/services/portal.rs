// src/services/portal.rs

//! Client for the public distribution portal's directory web services.
//!
//! Every request is a single GET attempt. Transport faults, timeouts, non-2xx
//! statuses and undecodable bodies all come back as [`FetchError`].

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use url::Url;

use crate::error::{FetchError, Result};
use crate::models::{Config, ShopBatch, StateCode, TehsilDescriptor, TehsilListing};
use crate::utils::endpoint_url;

type FetchResult<T> = std::result::Result<T, FetchError>;

/// Source of the state → tehsil → shop hierarchy.
#[async_trait]
pub trait ShopDirectory: Send + Sync {
    /// List the tehsils of a state.
    async fn list_tehsils(&self, state: &StateCode) -> FetchResult<TehsilListing>;

    /// List the shops of one tehsil.
    async fn list_shops(&self, tehsil: &TehsilDescriptor) -> FetchResult<ShopBatch>;
}

/// HTTP implementation of [`ShopDirectory`].
#[derive(Clone)]
pub struct PortalClient {
    client: Client,
    base: Url,
    tehsils_path: String,
    shops_path: String,
}

impl PortalClient {
    /// Create a portal client using the given HTTP client and configuration.
    pub fn new(config: &Config, client: Client) -> Result<Self> {
        Ok(Self {
            client,
            base: config.portal.base()?,
            tehsils_path: config.portal.tehsils_path.clone(),
            shops_path: config.portal.shops_path.clone(),
        })
    }

    /// URL of the tehsil listing for a state.
    pub fn tehsils_url(&self, state: &StateCode) -> FetchResult<Url> {
        self.endpoint(&self.tehsils_path, &[("statecode", state.as_str())])
    }

    /// URL of the shop listing for a tehsil.
    ///
    /// The portal takes the tehsil *code* in its `tehsilname` parameter.
    pub fn shops_url(&self, tehsil: &TehsilDescriptor) -> FetchResult<Url> {
        self.endpoint(
            &self.shops_path,
            &[
                ("statecode", tehsil.state_code.as_str()),
                ("distcode", &tehsil.district_code),
                ("tehsilname", &tehsil.tehsil_code),
            ],
        )
    }

    fn endpoint(&self, path: &str, params: &[(&str, &str)]) -> FetchResult<Url> {
        endpoint_url(&self.base, path, params).map_err(|source| FetchError::InvalidUrl {
            url: format!("{}{}", self.base, path),
            source,
        })
    }

    /// Perform one GET and decode the body as JSON.
    pub async fn fetch(&self, url: Url) -> FetchResult<Value> {
        let url_str = url.to_string();
        log::debug!("GET {}", url_str);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::transport(&url_str, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url_str,
                status,
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| FetchError::transport(&url_str, e))?;

        serde_json::from_slice(&bytes).map_err(|source| FetchError::Decode {
            url: url_str,
            source,
        })
    }

    /// Fetch a URL whose body must be a JSON array.
    async fn fetch_array(&self, url: Url) -> FetchResult<Vec<Value>> {
        let url_str = url.to_string();
        match self.fetch(url).await? {
            Value::Array(items) => Ok(items),
            // Empty listings sometimes come back as a bare null.
            Value::Null => Ok(Vec::new()),
            other => Err(FetchError::Decode {
                url: url_str,
                source: serde::de::Error::custom(format!(
                    "expected a JSON array, found {}",
                    json_kind(&other)
                )),
            }),
        }
    }
}

#[async_trait]
impl ShopDirectory for PortalClient {
    async fn list_tehsils(&self, state: &StateCode) -> FetchResult<TehsilListing> {
        let url = self.tehsils_url(state)?;
        let items = self.fetch_array(url).await?;
        Ok(TehsilListing::from_values(state, items))
    }

    async fn list_shops(&self, tehsil: &TehsilDescriptor) -> FetchResult<ShopBatch> {
        let url = self.shops_url(tehsil)?;
        let items = self.fetch_array(url).await?;
        Ok(parse_shops(tehsil, items))
    }
}

/// Turn listing entries into records, counting the ones that cannot be used.
pub fn parse_shops(tehsil: &TehsilDescriptor, items: Vec<Value>) -> ShopBatch {
    let context = format!(
        "State {} tehsil {}/{}",
        tehsil.state_code, tehsil.district_code, tehsil.tehsil_code
    );
    ShopBatch::from_values(items, &context)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

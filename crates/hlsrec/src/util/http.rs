use bytes::Bytes;
use reqwest::{Client, ClientBuilder, IntoUrl};

use crate::error::{HlsrecError, HlsrecResult};

pub const DEFAULT_USER_AGENT: &str = concat!("hlsrec/", env!("CARGO_PKG_VERSION"));

/// Shared HTTP client for playlist, key and chunk requests.
///
/// Cheap to clone. Every request goes through the same cookie jar, so cookies
/// set while fetching the playlist are sent along with chunk requests.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new(builder: ClientBuilder) -> HlsrecResult<Self> {
        let client = builder.cookie_store(true).build()?;
        Ok(Self { client })
    }

    pub fn with_user_agent(user_agent: &str) -> HlsrecResult<Self> {
        Self::new(Client::builder().user_agent(user_agent))
    }

    /// GET `url` and return the whole body. Non-success statuses are errors.
    pub async fn get_bytes(&self, url: impl IntoUrl) -> HlsrecResult<Bytes> {
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            if let Ok(body) = response.text().await {
                log::debug!("Error body: {body}");
            }
            return Err(HlsrecError::HttpError(status));
        }

        Ok(response.bytes().await?)
    }
}


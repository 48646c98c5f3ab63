#![cfg(feature = "hkp")]

//! HKP key-server client.

use std::time::Duration;

use reqwest::StatusCode;
use tracing::debug;

use crate::gpg::{
    first_usable_key_id, parse_machine_readable_index, sanitize_public_key, short_key_id,
    GpgError, KeyListing,
};

#[derive(Clone)]
pub struct HkpClient {
    base_url: String,
    client: reqwest::Client,
}

impl HkpClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, GpgError> {
        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .timeout(timeout)
            .build()
            .map_err(|e| GpgError::Http(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn lookup_url(&self) -> String {
        format!("{}/pks/lookup", self.base_url)
    }

    async fn lookup(&self, query: &[(&str, &str)]) -> Result<Option<String>, GpgError> {
        let resp = self
            .client
            .get(self.lookup_url())
            .query(query)
            .send()
            .await
            .map_err(|e| GpgError::Http(e.to_string()))?;

        match resp.status() {
            status if status.is_success() => {
                let body = resp.text().await.map_err(|e| GpgError::Http(e.to_string()))?;
                Ok(Some(body))
            }
            // HKP servers answer 404 when nothing matches.
            StatusCode::NOT_FOUND => Ok(None),
            other => Err(GpgError::Status(other.as_u16())),
        }
    }

    /// Machine-readable index of the keys registered for `email`.
    pub async fn index(&self, email: &str) -> Result<Vec<KeyListing>, GpgError> {
        let body = self
            .lookup(&[("op", "index"), ("options", "mr"), ("search", email)])
            .await?;
        Ok(body
            .map(|body| parse_machine_readable_index(&body))
            .unwrap_or_default())
    }

    /// Full id of the first usable key registered for `email`.
    pub async fn first_usable_key_id(&self, email: &str) -> Result<String, GpgError> {
        let listings = self.index(email).await?;
        first_usable_key_id(&listings).map(str::to_string)
    }

    /// Armored key for a key id; only its last eight characters are sent.
    pub async fn get_key(&self, key_id: &str) -> Result<String, GpgError> {
        let search = format!("0x{}", short_key_id(key_id));
        let body = self
            .lookup(&[("op", "get"), ("search", &search)])
            .await?
            .ok_or(GpgError::NoValidKey)?;
        sanitize_public_key(&body)
    }

    /// Index lookup followed by retrieval of the first usable key.
    pub async fn fetch_public_key(&self, email: &str) -> Result<String, GpgError> {
        let key_id = self.first_usable_key_id(email).await?;
        debug!("Fetching key {} from {}", key_id, self.base_url);
        self.get_key(&key_id).await
    }
}

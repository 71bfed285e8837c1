use super::{KvStore, StoreError, StoreResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Store backend speaking to a shared `/api/store` endpoint:
/// `GET ?key=` returns `{"value": "..."} | null`, `POST {key, value,
/// ttlSeconds}` upserts, `DELETE ?key=` / `DELETE ?prefix=` removes one
/// key or a whole prefix. The server owns the actual scan-and-batch
/// behavior behind the prefix delete.
pub struct HttpStore {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct GetResponse {
    value: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SetRequest<'a> {
    key: &'a str,
    value: &'a str,
    ttl_seconds: u64,
}

impl HttpStore {
    /// `base_url` is the endpoint root, e.g. `https://game.example.com`.
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/api/store", self.base_url)
    }
}

#[async_trait]
impl KvStore for HttpStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let response = self
            .client
            .get(self.endpoint())
            .query(&[("key", key)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StoreError::Status(response.status().as_u16()));
        }

        // body is either null or {"value": "..."}
        let body: Option<GetResponse> = response
            .json()
            .await
            .map_err(|e| StoreError::Parse(e.to_string()))?;
        Ok(body.map(|r| r.value))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        let response = self
            .client
            .post(self.endpoint())
            .json(&SetRequest {
                key,
                value,
                ttl_seconds: ttl.as_secs(),
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StoreError::Status(response.status().as_u16()));
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        let response = self
            .client
            .delete(self.endpoint())
            .query(&[("key", key)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StoreError::Status(response.status().as_u16()));
        }
        Ok(())
    }

    async fn delete_by_prefix(&self, prefix: &str) -> StoreResult<()> {
        let response = self
            .client
            .delete(self.endpoint())
            .query(&[("prefix", prefix)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StoreError::Status(response.status().as_u16()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_is_normalized() {
        let store = HttpStore::new("https://game.example.com/");
        assert_eq!(store.endpoint(), "https://game.example.com/api/store");
    }

    #[test]
    fn set_request_uses_wire_names() {
        let body = serde_json::to_string(&SetRequest {
            key: "k",
            value: "v",
            ttl_seconds: 86_400,
        })
        .unwrap();
        assert!(body.contains("\"ttlSeconds\":86400"));
    }
}

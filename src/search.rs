//! GIF search collaborator. Failures degrade to an empty result list;
//! the game never blocks on search being available.

use serde::Deserialize;
use std::time::Duration;

/// Results per page; `offset` advances in these steps.
pub const PAGE_SIZE: usize = 12;

const SEARCH_URL: &str = "https://api.giphy.com/v1/gifs/search";

/// One search hit: the full-size GIF and a smaller preview.
#[derive(Debug, Clone, PartialEq)]
pub struct GifEntry {
    pub id: String,
    pub url: String,
    pub preview: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<GifRecord>,
}

#[derive(Debug, Deserialize)]
struct GifRecord {
    id: String,
    #[serde(default)]
    images: Images,
}

#[derive(Debug, Default, Deserialize)]
struct Images {
    fixed_height: Option<Rendition>,
    fixed_height_small: Option<Rendition>,
}

#[derive(Debug, Deserialize)]
struct Rendition {
    url: String,
}

pub struct GifSearcher {
    api_key: Option<String>,
    client: reqwest::Client,
}

impl GifSearcher {
    /// Load the API key from `GIPHY_API_KEY`. An unset key leaves search
    /// disabled rather than failing startup.
    pub fn from_env() -> Self {
        let api_key = std::env::var("GIPHY_API_KEY").ok().and_then(|key| {
            let trimmed = key.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        });
        if api_key.is_none() {
            tracing::warn!("GIPHY_API_KEY not set - GIF search disabled");
        }
        Self::new(api_key)
    }

    pub fn new(api_key: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self { api_key, client }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Free-text search with pagination. Blank queries, a missing key,
    /// HTTP failures and unparseable payloads all yield an empty list.
    pub async fn search(&self, query: &str, offset: usize) -> Vec<GifEntry> {
        let query = query.trim();
        let Some(api_key) = &self.api_key else {
            return Vec::new();
        };
        if query.is_empty() {
            return Vec::new();
        }

        let limit = PAGE_SIZE.to_string();
        let offset = offset.to_string();
        let request = self.client.get(SEARCH_URL).query(&[
            ("api_key", api_key.as_str()),
            ("q", query),
            ("limit", limit.as_str()),
            ("offset", offset.as_str()),
            ("rating", "pg-13"),
        ]);

        let response = match request.send().await {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                tracing::warn!("gif search returned status {}", r.status());
                return Vec::new();
            }
            Err(e) => {
                tracing::warn!("gif search failed: {e}");
                return Vec::new();
            }
        };

        let parsed: SearchResponse = match response.json().await {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!("gif search payload unreadable: {e}");
                return Vec::new();
            }
        };

        entries_from(parsed)
    }
}

fn entries_from(parsed: SearchResponse) -> Vec<GifEntry> {
    parsed
        .data
        .into_iter()
        .filter_map(|record| {
            let full = record.images.fixed_height.as_ref()?.url.clone();
            let preview = record
                .images
                .fixed_height_small
                .map(|r| r.url)
                .unwrap_or_else(|| full.clone());
            Some(GifEntry {
                id: record.id,
                url: full,
                preview,
            })
        })
        .collect()
}

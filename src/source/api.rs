//! Paginated store API source
//!
//! One request to a count endpoint, then one request per store index.
//! Detail requests run a few at a time but records come out in index order.

use super::types::{ApiConfig, RecordStream, SourceAdapter};
use crate::decode::JsonDecoder;
use crate::error::{Error, Result};
use crate::http::HttpClient;
use crate::template::{render, TemplateContext};
use crate::types::JsonValue;
use crate::validate::RawRecord;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde_json::json;
use tracing::{info, warn};

/// Reads every store from the store API
#[derive(Debug, Clone)]
pub struct StoreApiSource {
    config: ApiConfig,
    client: HttpClient,
}

impl StoreApiSource {
    /// Create a store API source
    pub fn new(config: ApiConfig) -> Result<Self> {
        url::Url::parse(&config.count_url)?;
        if !config.detail_url.contains(&config.index_var) {
            return Err(Error::invalid_value(
                "detail_url",
                format!("must contain the '{{{{ {} }}}}' placeholder", config.index_var),
            ));
        }
        let client = HttpClient::new(config.http.clone())?;
        Ok(Self { config, client })
    }

    /// Number of items reported by the count endpoint
    pub async fn count(&self) -> Result<u64> {
        let body = self
            .client
            .get_json(&self.config.count_url)
            .await
            .map_err(|e| {
                Error::source_unavailable(self.describe(), format!("count request failed: {e}"))
            })?;

        body.get(&self.config.count_field)
            .and_then(count_value)
            .ok_or_else(|| {
                Error::source_unavailable(
                    self.describe(),
                    format!("count response has no numeric '{}' field", self.config.count_field),
                )
            })
    }

    /// Detail URL of one index
    pub fn detail_url(&self, index: u64) -> Result<String> {
        render_detail_url(&self.config.detail_url, &self.config.index_var, index)
    }
}

fn render_detail_url(template: &str, var: &str, index: u64) -> Result<String> {
    let mut ctx = TemplateContext::new();
    ctx.set_locals(json!({ var: index }));
    render(template, &ctx)
}

fn count_value(value: &JsonValue) -> Option<u64> {
    match value {
        JsonValue::Number(n) => n.as_u64(),
        JsonValue::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[async_trait]
impl SourceAdapter for StoreApiSource {
    fn describe(&self) -> String {
        self.config.count_url.clone()
    }

    async fn open(&self) -> Result<RecordStream> {
        let count = self.count().await?;
        let first = self.config.first_index;
        if count > self.config.max_items {
            return Err(Error::source_unavailable(
                self.describe(),
                format!("count {count} exceeds max_items {}", self.config.max_items),
            ));
        }
        let end = first.checked_add(count).ok_or_else(|| {
            Error::source_unavailable(
                self.describe(),
                format!("indices {first}+{count} overflow"),
            )
        })?;
        info!("Store API reports {} items, reading indices {}..{}", count, first, end);

        let client = self.client.clone();
        let template = self.config.detail_url.clone();
        let var = self.config.index_var.clone();
        let pages = stream::iter(first..end)
            .map(move |index| {
                let client = client.clone();
                let url = render_detail_url(&template, &var, index);
                async move {
                    let body = match url {
                        Ok(url) => client.get_json(&url).await,
                        Err(e) => Err(e),
                    };
                    (index, body)
                }
            })
            .buffered(self.config.concurrency.max(1));

        let decoder = match &self.config.record_path {
            Some(path) => JsonDecoder::with_path(path.clone()),
            None => JsonDecoder::new(),
        };
        let skip_failed = self.config.skip_failed;
        let mut position = 0;

        let records = pages.flat_map(move |(index, body)| {
            let items: Vec<Result<RawRecord>> = match body {
                Ok(body) => decoder
                    .extract_records(body)
                    .into_iter()
                    .map(|value| {
                        let record = RawRecord::from_value(position, value);
                        position += 1;
                        Ok(record)
                    })
                    .collect(),
                Err(e) if skip_failed => {
                    warn!("Skipping store {}: {}", index, e);
                    Vec::new()
                }
                Err(e) => vec![Err(e)],
            };
            stream::iter(items)
        });

        Ok(records.boxed())
    }
}

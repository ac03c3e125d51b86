use crate::config::WidgetConfig;
use crate::error::Result;
use crate::error::SearchError;
use crate::filters::SearchParams;
use crate::proto::AUTOCOMPLETE_ENDPOINT;
use crate::proto::AutocompletePayload;
use crate::proto::FACETS_ENDPOINT;
use crate::proto::FacetConfiguration;
use crate::proto::POPULAR_ENDPOINT;
use crate::proto::Product;
use crate::proto::RECOMMENDATIONS_CONFIG_ENDPOINT;
use crate::proto::RECOMMENDED_ENDPOINT;
use crate::proto::RecommendationsConfig;
use crate::proto::SEARCH_ENDPOINT;
use crate::proto::SearchPage;
use crate::proto::decode_autocomplete;
use crate::proto::decode_facet_configuration;
use crate::proto::decode_popular;
use crate::proto::decode_recommendations_config;
use crate::proto::decode_search_page;
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

/// Read-only view of the storefront search backend.
///
/// Every method returns the decoded payload or a [`SearchError`]; callers
/// decide how to degrade.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn search(&self, params: &SearchParams) -> Result<SearchPage>;

    async fn autocomplete(&self, query: &str, store_url: &str) -> Result<AutocompletePayload>;

    async fn popular_searches(&self, store_url: &str) -> Result<Vec<String>>;

    /// Unfiltered catalog snapshot used to build the facet index.
    async fn catalog(&self, store_url: &str, limit: u32) -> Result<Vec<Product>>;

    async fn facet_configuration(&self, store_url: &str) -> Result<Vec<FacetConfiguration>>;

    async fn recommendations_config(&self, store_url: &str) -> Result<RecommendationsConfig>;

    async fn recommended_products(&self, store_url: &str) -> Result<Vec<Product>>;
}

#[derive(Clone, Debug)]
pub struct HttpBackend {
    http: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(config: &WidgetConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self::with_client(http, &config.backend_url))
    }

    pub fn with_client(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_json(&self, endpoint: &'static str, query: &[(&str, String)]) -> Result<Value> {
        let url = format!("{}{endpoint}", self.base_url);
        debug!(%url, "GET");
        let resp = self.http.get(url).query(query).send().await?;
        if !resp.status().is_success() {
            return Err(SearchError::Status {
                endpoint,
                status: resp.status().as_u16(),
            });
        }
        let body = resp.bytes().await?;
        serde_json::from_slice(&body).map_err(|err| SearchError::malformed(endpoint, err.to_string()))
    }
}

#[async_trait]
impl SearchBackend for HttpBackend {
    async fn search(&self, params: &SearchParams) -> Result<SearchPage> {
        let value = self
            .get_json(SEARCH_ENDPOINT, &params.to_query_pairs())
            .await?;
        decode_search_page(SEARCH_ENDPOINT, value)
    }

    async fn autocomplete(&self, query: &str, store_url: &str) -> Result<AutocompletePayload> {
        let value = self
            .get_json(
                AUTOCOMPLETE_ENDPOINT,
                &[("q", query.to_string()), ("storeUrl", store_url.to_string())],
            )
            .await?;
        decode_autocomplete(value)
    }

    async fn popular_searches(&self, store_url: &str) -> Result<Vec<String>> {
        let value = self
            .get_json(POPULAR_ENDPOINT, &[("storeUrl", store_url.to_string())])
            .await?;
        decode_popular(value)
    }

    async fn catalog(&self, store_url: &str, limit: u32) -> Result<Vec<Product>> {
        let value = self
            .get_json(
                SEARCH_ENDPOINT,
                &[
                    ("storeUrl", store_url.to_string()),
                    ("limit", limit.to_string()),
                ],
            )
            .await?;
        Ok(decode_search_page(SEARCH_ENDPOINT, value)?.products)
    }

    async fn facet_configuration(&self, store_url: &str) -> Result<Vec<FacetConfiguration>> {
        let value = self
            .get_json(FACETS_ENDPOINT, &[("storeUrl", store_url.to_string())])
            .await?;
        decode_facet_configuration(value)
    }

    async fn recommendations_config(&self, store_url: &str) -> Result<RecommendationsConfig> {
        let value = self
            .get_json(
                RECOMMENDATIONS_CONFIG_ENDPOINT,
                &[("storeUrl", store_url.to_string())],
            )
            .await?;
        decode_recommendations_config(value)
    }

    async fn recommended_products(&self, store_url: &str) -> Result<Vec<Product>> {
        let value = self
            .get_json(
                RECOMMENDED_ENDPOINT,
                &[
                    ("storeUrl", store_url.to_string()),
                    ("type", "vendor-configured".to_string()),
                ],
            )
            .await?;
        Ok(decode_search_page(RECOMMENDED_ENDPOINT, value)?.products)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_trimmed() {
        let backend =
            HttpBackend::with_client(reqwest::Client::new(), "https://search.example.com/api/");
        assert_eq!(backend.base_url(), "https://search.example.com/api");
    }
}

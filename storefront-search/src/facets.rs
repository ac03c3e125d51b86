//! One-shot facet index built from a catalog snapshot.
//!
//! Per-query searches never touch the index; it is derived once per store
//! and only replaced when the store identity changes.

use crate::client::SearchBackend;
use crate::error::Result;
use crate::proto::FacetConfiguration;
use crate::proto::Product;
use indexmap::IndexMap;
use serde::Serialize;
use std::time::Duration;
use tokio::time::sleep;
use tracing::info;
use tracing::warn;

/// Counts keep the order in which values were first seen in the catalog.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FacetIndex {
    pub categories: IndexMap<String, usize>,
    pub brands: IndexMap<String, usize>,
    pub colors: IndexMap<String, usize>,
    pub sizes: IndexMap<String, usize>,
    pub tags: IndexMap<String, usize>,
    pub stock_status: IndexMap<String, usize>,
    pub featured_count: usize,
    pub sale_count: usize,
    /// Highest parsable display price, `None` when no price could be read.
    pub max_price: Option<f64>,
}

impl FacetIndex {
    pub fn is_empty(&self) -> bool {
        self == &FacetIndex::default()
    }
}

fn bump(counts: &mut IndexMap<String, usize>, values: &[String]) {
    for value in values {
        *counts.entry(value.clone()).or_insert(0) += 1;
    }
}

pub fn build_facet_index(products: &[Product]) -> FacetIndex {
    let mut index = FacetIndex::default();
    for product in products {
        bump(&mut index.categories, &product.categories);
        bump(&mut index.brands, &product.brands);
        bump(&mut index.colors, &product.colors);
        bump(&mut index.sizes, &product.sizes);
        bump(&mut index.tags, &product.tags);
        if let Some(status) = product.stock_status.as_deref().filter(|s| !s.is_empty()) {
            *index.stock_status.entry(status.to_string()).or_insert(0) += 1;
        }
        if product.featured {
            index.featured_count += 1;
        }
        if product.is_on_sale() {
            index.sale_count += 1;
        }
        if let Some(price) = product.numeric_price() {
            index.max_price = Some(index.max_price.map_or(price, |max| max.max(price)));
        }
    }
    index
}

/// Facet groups a vendor may switch on. Hidden unless configured visible.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct OptionalFacets {
    pub brands: bool,
    pub colors: bool,
    pub tags: bool,
}

impl OptionalFacets {
    pub fn from_configuration(entries: &[FacetConfiguration]) -> Self {
        let visible = |field: &str| entries.iter().any(|e| e.field == field && e.visible);
        Self {
            brands: visible("brand"),
            colors: visible("color"),
            tags: visible("tags"),
        }
    }
}

/// Gate that lets the bootstrap run at most once per store identity.
#[derive(Debug, Default)]
pub struct FacetBootstrap {
    in_flight: Option<String>,
    completed: Option<String>,
}

impl FacetBootstrap {
    /// Returns true when the caller should start the bootstrap for `store_url`.
    pub fn claim(&mut self, store_url: &str) -> bool {
        if self.completed.as_deref() == Some(store_url) || self.in_flight.as_deref() == Some(store_url)
        {
            return false;
        }
        self.in_flight = Some(store_url.to_string());
        true
    }

    /// Mark the bootstrap finished, whether or not it produced an index.
    pub fn complete(&mut self, store_url: &str) {
        if self.in_flight.as_deref() == Some(store_url) {
            self.in_flight = None;
        }
        self.completed = Some(store_url.to_string());
    }

    pub fn is_complete(&self, store_url: &str) -> bool {
        self.completed.as_deref() == Some(store_url)
    }
}

/// Fetch the catalog snapshot, retrying transport failures up to `retries`
/// times with a fixed `delay`. Malformed responses are not retried.
pub async fn fetch_catalog_with_retry(
    backend: &dyn SearchBackend,
    store_url: &str,
    limit: u32,
    retries: u32,
    delay: Duration,
) -> Result<Vec<Product>> {
    let mut attempt = 0;
    loop {
        match backend.catalog(store_url, limit).await {
            Ok(products) => {
                if attempt > 0 {
                    info!(attempt, "facet catalog fetched after retry");
                }
                return Ok(products);
            }
            Err(err) if err.is_transport() && attempt < retries => {
                attempt += 1;
                warn!(%err, attempt, retries, "facet catalog fetch failed; retrying in {delay:?}");
                sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn product(id: &str) -> Product {
        Product {
            id: id.to_string(),
            title: format!("Product {id}"),
            ..Default::default()
        }
    }

    #[test]
    fn counts_every_facet_group() {
        let mut shirt = product("1");
        shirt.categories = vec!["Tops".to_string(), "Sale".to_string()];
        shirt.colors = vec!["red".to_string()];
        shirt.stock_status = Some("instock".to_string());
        shirt.featured = true;
        shirt.price = Some("19.90".to_string());
        shirt.regular_price = Some("25.00".to_string());
        shirt.sale_price = Some("19.90".to_string());

        let mut socks = product("2");
        socks.categories = vec!["Tops".to_string()];
        socks.colors = vec!["blue".to_string(), "red".to_string()];
        socks.sizes = vec!["M".to_string()];
        socks.stock_status = Some("outofstock".to_string());
        socks.price = Some("120".to_string());
        socks.regular_price = Some("120".to_string());
        socks.sale_price = Some("0".to_string());

        let mut unpriced = product("3");
        unpriced.brands = vec!["Acme".to_string()];
        unpriced.tags = vec!["new".to_string()];
        unpriced.price = Some("call us".to_string());

        let index = build_facet_index(&[shirt, socks, unpriced]);

        let categories: Vec<(&str, usize)> = index
            .categories
            .iter()
            .map(|(k, v)| (k.as_str(), *v))
            .collect();
        assert_eq!(categories, vec![("Tops", 2), ("Sale", 1)]);
        let colors: Vec<(&str, usize)> =
            index.colors.iter().map(|(k, v)| (k.as_str(), *v)).collect();
        assert_eq!(colors, vec![("red", 2), ("blue", 1)]);
        assert_eq!(index.sizes.get("M"), Some(&1));
        assert_eq!(index.brands.get("Acme"), Some(&1));
        assert_eq!(index.tags.get("new"), Some(&1));
        assert_eq!(index.stock_status.get("instock"), Some(&1));
        assert_eq!(index.stock_status.get("outofstock"), Some(&1));
        assert_eq!(index.featured_count, 1);
        assert_eq!(index.sale_count, 1);
        assert_eq!(index.max_price, Some(120.0));
    }

    #[test]
    fn empty_catalog_has_no_price_bound() {
        let index = build_facet_index(&[]);
        assert!(index.is_empty());
        assert_eq!(index.max_price, None);
    }

    #[test]
    fn optional_groups_follow_vendor_configuration() {
        let entries = vec![
            FacetConfiguration {
                field: "brand".to_string(),
                visible: true,
                enabled: None,
            },
            FacetConfiguration {
                field: "color".to_string(),
                visible: false,
                enabled: Some(true),
            },
            FacetConfiguration {
                field: "tag".to_string(),
                visible: true,
                enabled: None,
            },
        ];
        assert_eq!(
            OptionalFacets::from_configuration(&entries),
            OptionalFacets {
                brands: true,
                colors: false,
                tags: false,
            }
        );
        assert_eq!(OptionalFacets::from_configuration(&[]), OptionalFacets::default());
    }

    #[test]
    fn bootstrap_runs_once_per_store() {
        let mut gate = FacetBootstrap::default();
        assert!(gate.claim("a.example.com"));
        assert!(!gate.claim("a.example.com"));
        gate.complete("a.example.com");
        assert!(gate.is_complete("a.example.com"));
        assert!(!gate.claim("a.example.com"));

        assert!(gate.claim("b.example.com"));
        assert!(!gate.is_complete("b.example.com"));
    }
}

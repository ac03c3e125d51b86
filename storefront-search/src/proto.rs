//! Wire types for the storefront search backend.
//!
//! Responses are decoded from raw JSON into the untagged payload enums below.
//! Anything that matches none of the known shapes is reported as
//! [`SearchError::Malformed`] so callers can fall back to an empty result.

use crate::error::Result;
use crate::error::SearchError;
use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde_json::Value;

pub const SEARCH_ENDPOINT: &str = "/v1/search";
pub const AUTOCOMPLETE_ENDPOINT: &str = "/v1/autocomplete";
pub const POPULAR_ENDPOINT: &str = "/v1/search/popular";
pub const FACETS_ENDPOINT: &str = "/v1/facets";
pub const RECOMMENDATIONS_CONFIG_ENDPOINT: &str = "/v1/recommendations/config";
pub const RECOMMENDED_ENDPOINT: &str = "/v1/search/recommended";

const UNKNOWN_PRODUCT: &str = "Unknown Product";

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[serde(deserialize_with = "de_lenient_string")]
    pub id: String,
    /// Empty when the store sends no title or `null`.
    #[serde(default, deserialize_with = "de_nullable_string")]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Display price as sent by the store, e.g. `"19.90"`.
    #[serde(
        default,
        deserialize_with = "de_opt_lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub price: Option<String>,
    #[serde(
        default,
        deserialize_with = "de_opt_lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub regular_price: Option<String>,
    #[serde(
        default,
        deserialize_with = "de_opt_lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub sale_price: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub brands: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub colors: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sizes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stock_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_stock: Option<bool>,
    #[serde(default)]
    pub featured: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_url: Option<String>,
}

impl Product {
    /// Numeric value of the display price, if it starts with a number.
    pub fn numeric_price(&self) -> Option<f64> {
        self.price.as_deref().and_then(parse_leading_number)
    }

    /// A product is on sale when it carries a non-empty, non-zero sale price
    /// that differs from a non-empty regular price.
    pub fn is_on_sale(&self) -> bool {
        let Some(sale) = non_empty(self.sale_price.as_deref()) else {
            return false;
        };
        let Some(regular) = non_empty(self.regular_price.as_deref()) else {
            return false;
        };
        if parse_leading_number(sale) == Some(0.0) {
            return false;
        }
        sale != regular
    }

    pub fn link(&self) -> Option<&str> {
        non_empty(self.product_url.as_deref()).or_else(|| non_empty(self.url.as_deref()))
    }

    pub fn image_link(&self) -> Option<&str> {
        non_empty(self.image_url.as_deref()).or_else(|| non_empty(self.image.as_deref()))
    }

    pub fn discount_percentage(&self) -> Option<u32> {
        discount_percentage(self.regular_price.as_deref()?, self.sale_price.as_deref()?)
    }

    /// Text offered as an autocomplete candidate: the title, then the name,
    /// then a fixed placeholder. An empty name yields nothing.
    pub fn suggestion_text(&self) -> Option<String> {
        if !self.title.is_empty() {
            return Some(self.title.clone());
        }
        match self.name.as_deref() {
            Some("") => None,
            Some(name) => Some(name.to_string()),
            None => Some(UNKNOWN_PRODUCT.to_string()),
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Parse the numeric prefix of `raw` the way a lenient float parser would:
/// `"19.90 EUR"` yields `19.9`, `"EUR 19.90"` yields `None`.
pub fn parse_leading_number(raw: &str) -> Option<f64> {
    let trimmed = raw.trim_start();
    let bytes = trimmed.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end = 1;
    }
    let mut seen_digit = false;
    let mut seen_dot = false;
    while let Some(byte) = bytes.get(end) {
        match byte {
            b'0'..=b'9' => seen_digit = true,
            b'.' if !seen_dot => seen_dot = true,
            _ => break,
        }
        end += 1;
    }
    if !seen_digit {
        return None;
    }
    trimmed[..end].parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Rounded discount of `sale` against `regular`, ignoring currency symbols
/// and accepting a decimal comma. `None` unless `0 < sale < regular`.
pub fn discount_percentage(regular: &str, sale: &str) -> Option<u32> {
    let regular = parse_money(regular)?;
    let sale = parse_money(sale)?;
    if regular <= 0.0 || sale <= 0.0 || sale >= regular {
        return None;
    }
    let discount = ((regular - sale) / regular) * 100.0;
    Some(discount.round() as u32)
}

fn parse_money(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .collect();
    parse_leading_number(&cleaned.replacen(',', ".", 1))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LenientString {
    Text(String),
    Number(serde_json::Number),
}

impl From<LenientString> for String {
    fn from(value: LenientString) -> Self {
        match value {
            LenientString::Text(text) => text,
            LenientString::Number(number) => number.to_string(),
        }
    }
}

fn de_lenient_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    LenientString::deserialize(deserializer).map(String::from)
}

fn de_nullable_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn de_opt_lenient_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<LenientString>::deserialize(deserializer)?.map(String::from))
}

/// One page of search results, normalized from either response shape.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPage {
    pub products: Vec<Product>,
    pub total: usize,
    pub has_more: bool,
}

// Bare arrays are listed first: serde would otherwise accept `[]` as a
// struct variant in sequence form.
#[derive(Deserialize)]
#[serde(untagged)]
enum SearchPayload {
    Bare(Vec<Product>),
    Paged {
        products: Vec<Product>,
        #[serde(default)]
        total: Option<usize>,
        #[serde(default, rename = "hasMore")]
        has_more: Option<bool>,
    },
}

impl From<SearchPayload> for SearchPage {
    fn from(payload: SearchPayload) -> Self {
        match payload {
            SearchPayload::Bare(products) => SearchPage {
                total: products.len(),
                has_more: false,
                products,
            },
            SearchPayload::Paged {
                products,
                total,
                has_more,
            } => SearchPage {
                total: total.unwrap_or(products.len()),
                has_more: has_more.unwrap_or(false),
                products,
            },
        }
    }
}

pub fn decode_search_page(endpoint: &'static str, value: Value) -> Result<SearchPage> {
    serde_json::from_value::<SearchPayload>(value)
        .map(SearchPage::from)
        .map_err(|err| SearchError::malformed(endpoint, err.to_string()))
}

#[derive(Clone, Debug, PartialEq)]
pub enum AutocompletePayload {
    Structured {
        suggestions: Vec<String>,
        products: Vec<Product>,
    },
    Bare(Vec<Product>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AutocompleteWire {
    Bare(Vec<Product>),
    Structured {
        #[serde(default)]
        suggestions: Option<Vec<String>>,
        #[serde(default)]
        products: Option<Vec<Product>>,
    },
}

impl AutocompletePayload {
    /// Raw candidate strings: explicit suggestions win, otherwise product
    /// titles (or names) are used.
    pub fn candidates(&self) -> Vec<String> {
        let products = match self {
            AutocompletePayload::Structured { suggestions, .. } if !suggestions.is_empty() => {
                return suggestions.clone();
            }
            AutocompletePayload::Structured { products, .. } => products,
            AutocompletePayload::Bare(products) => products,
        };
        products.iter().filter_map(Product::suggestion_text).collect()
    }
}

pub fn decode_autocomplete(value: Value) -> Result<AutocompletePayload> {
    let wire = serde_json::from_value::<AutocompleteWire>(value)
        .map_err(|err| SearchError::malformed(AUTOCOMPLETE_ENDPOINT, err.to_string()))?;
    match wire {
        AutocompleteWire::Bare(products) => Ok(AutocompletePayload::Bare(products)),
        AutocompleteWire::Structured {
            suggestions: None,
            products: None,
        } => Err(SearchError::malformed(
            AUTOCOMPLETE_ENDPOINT,
            "expected `suggestions` or `products`",
        )),
        AutocompleteWire::Structured {
            suggestions,
            products,
        } => Ok(AutocompletePayload::Structured {
            suggestions: suggestions.unwrap_or_default(),
            products: products.unwrap_or_default(),
        }),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PopularPayload {
    List(Vec<String>),
    Wrapped { searches: Vec<String> },
}

pub fn decode_popular(value: Value) -> Result<Vec<String>> {
    match serde_json::from_value::<PopularPayload>(value) {
        Ok(PopularPayload::List(terms)) | Ok(PopularPayload::Wrapped { searches: terms }) => {
            Ok(terms)
        }
        Err(err) => Err(SearchError::malformed(POPULAR_ENDPOINT, err.to_string())),
    }
}

/// Vendor switch for an optional facet group.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct FacetConfiguration {
    pub field: String,
    pub visible: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

/// Entries that are not `{field: string, visible: bool}` are dropped
/// individually; a non-array body is malformed.
pub fn decode_facet_configuration(value: Value) -> Result<Vec<FacetConfiguration>> {
    let Value::Array(items) = value else {
        return Err(SearchError::malformed(FACETS_ENDPOINT, "expected an array"));
    };
    Ok(items
        .into_iter()
        .filter_map(|item| serde_json::from_value::<FacetConfiguration>(item).ok())
        .collect())
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecommendationsConfig {
    pub enabled: bool,
}

pub fn decode_recommendations_config(value: Value) -> Result<RecommendationsConfig> {
    serde_json::from_value(value)
        .map_err(|err| SearchError::malformed(RECOMMENDATIONS_CONFIG_ENDPOINT, err.to_string()))
}

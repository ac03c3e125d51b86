//! Filter state, client-side sort, and the request parameters derived from
//! them.

use crate::proto::Product;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Set-valued facets a user can toggle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FacetField {
    Category,
    Brand,
    Color,
    Size,
    Tag,
    StockStatus,
}

impl FacetField {
    pub const ALL: [FacetField; 6] = [
        FacetField::Category,
        FacetField::Brand,
        FacetField::Color,
        FacetField::Size,
        FacetField::Tag,
        FacetField::StockStatus,
    ];

    /// Query parameter carrying this facet's selection.
    pub fn param(self) -> &'static str {
        match self {
            FacetField::Category => "categories",
            FacetField::Brand => "brands",
            FacetField::Color => "colors",
            FacetField::Size => "sizes",
            FacetField::Tag => "tags",
            FacetField::StockStatus => "stockStatus",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct PriceRange {
    pub min: f64,
    pub max: f64,
}

impl PriceRange {
    pub fn up_to(max: f64) -> Self {
        Self { min: 0.0, max }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterState {
    pub categories: BTreeSet<String>,
    pub brands: BTreeSet<String>,
    pub colors: BTreeSet<String>,
    pub sizes: BTreeSet<String>,
    pub tags: BTreeSet<String>,
    pub stock_status: BTreeSet<String>,
    pub price_range: PriceRange,
    pub featured_only: bool,
    pub on_sale_only: bool,
}

impl FilterState {
    pub fn new(max_price: f64) -> Self {
        Self {
            categories: BTreeSet::new(),
            brands: BTreeSet::new(),
            colors: BTreeSet::new(),
            sizes: BTreeSet::new(),
            tags: BTreeSet::new(),
            stock_status: BTreeSet::new(),
            price_range: PriceRange::up_to(max_price),
            featured_only: false,
            on_sale_only: false,
        }
    }

    pub fn values(&self, field: FacetField) -> &BTreeSet<String> {
        match field {
            FacetField::Category => &self.categories,
            FacetField::Brand => &self.brands,
            FacetField::Color => &self.colors,
            FacetField::Size => &self.sizes,
            FacetField::Tag => &self.tags,
            FacetField::StockStatus => &self.stock_status,
        }
    }

    fn values_mut(&mut self, field: FacetField) -> &mut BTreeSet<String> {
        match field {
            FacetField::Category => &mut self.categories,
            FacetField::Brand => &mut self.brands,
            FacetField::Color => &mut self.colors,
            FacetField::Size => &mut self.sizes,
            FacetField::Tag => &mut self.tags,
            FacetField::StockStatus => &mut self.stock_status,
        }
    }

    /// Flip membership of `value`. Returns whether it is selected afterwards.
    pub fn toggle(&mut self, field: FacetField, value: &str) -> bool {
        let values = self.values_mut(field);
        if values.remove(value) {
            false
        } else {
            values.insert(value.to_string());
            true
        }
    }

    pub fn toggle_featured(&mut self) {
        self.featured_only = !self.featured_only;
    }

    pub fn toggle_on_sale(&mut self) {
        self.on_sale_only = !self.on_sale_only;
    }

    pub fn set_price_range(&mut self, min: f64, max: f64) {
        self.price_range = if min <= max {
            PriceRange { min, max }
        } else {
            PriceRange { min: max, max: min }
        };
    }

    pub fn clear_all(&mut self, max_price: f64) {
        *self = FilterState::new(max_price);
    }

    /// True when anything narrows the result set beyond the full catalog.
    pub fn is_any_active(&self, query: &str, max_price: f64) -> bool {
        !query.trim().is_empty()
            || FacetField::ALL
                .iter()
                .any(|field| !self.values(*field).is_empty())
            || self.price_range != PriceRange::up_to(max_price)
            || self.featured_only
            || self.on_sale_only
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortOption {
    #[default]
    Default,
    NameAsc,
    NameDesc,
    PriceAsc,
    PriceDesc,
}

impl fmt::Display for SortOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SortOption::Default => "default",
            SortOption::NameAsc => "name-asc",
            SortOption::NameDesc => "name-desc",
            SortOption::PriceAsc => "price-asc",
            SortOption::PriceDesc => "price-desc",
        };
        f.write_str(label)
    }
}

impl FromStr for SortOption {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "default" | "relevance" => Ok(SortOption::Default),
            "name-asc" | "a-z" => Ok(SortOption::NameAsc),
            "name-desc" | "z-a" => Ok(SortOption::NameDesc),
            "price-asc" | "price-low" => Ok(SortOption::PriceAsc),
            "price-desc" | "price-high" => Ok(SortOption::PriceDesc),
            other => Err(format!("unknown sort option `{other}`")),
        }
    }
}

/// Order `products` for display without touching the accumulated list.
/// Products whose price cannot be read sort last in both price orders.
pub fn sort_products(products: &[Product], sort: SortOption) -> Vec<&Product> {
    let mut view: Vec<&Product> = products.iter().collect();
    match sort {
        SortOption::Default => {}
        SortOption::NameAsc => view.sort_by_cached_key(|p| p.title.to_lowercase()),
        SortOption::NameDesc => {
            view.sort_by_cached_key(|p| std::cmp::Reverse(p.title.to_lowercase()));
        }
        SortOption::PriceAsc => {
            view.sort_by(|a, b| cmp_prices(a.numeric_price(), b.numeric_price(), false));
        }
        SortOption::PriceDesc => {
            view.sort_by(|a, b| cmp_prices(a.numeric_price(), b.numeric_price(), true));
        }
    }
    view
}

fn cmp_prices(a: Option<f64>, b: Option<f64>, descending: bool) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) if descending => b.total_cmp(&a),
        (Some(a), Some(b)) => a.total_cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Everything needed to issue one `/v1/search` request.
#[derive(Clone, Debug, PartialEq)]
pub struct SearchParams {
    pub query: String,
    pub store_url: String,
    pub filters: FilterState,
    pub popular_terms: Vec<String>,
    pub page: u32,
    pub limit: u32,
}

/// Derive request parameters from the current query and filters. Popular
/// terms contained in the query (case-insensitively) ride along as a ranking
/// hint for the backend.
pub fn compose(
    query: &str,
    store_url: &str,
    filters: &FilterState,
    popular_terms: &[String],
    page: u32,
    limit: u32,
) -> SearchParams {
    let query = query.trim();
    let folded = query.to_lowercase();
    let popular_terms = if folded.is_empty() {
        Vec::new()
    } else {
        popular_terms
            .iter()
            .filter(|term| {
                let term = term.trim().to_lowercase();
                !term.is_empty() && folded.contains(&term)
            })
            .cloned()
            .collect()
    };
    SearchParams {
        query: query.to_string(),
        store_url: store_url.to_string(),
        filters: filters.clone(),
        popular_terms,
        page,
        limit,
    }
}

impl SearchParams {
    pub fn with_page(&self, page: u32) -> Self {
        Self {
            page,
            ..self.clone()
        }
    }

    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if !self.query.is_empty() {
            pairs.push(("q", self.query.clone()));
        }
        pairs.push(("storeUrl", self.store_url.clone()));
        if !self.popular_terms.is_empty() {
            pairs.push(("popularTerms", self.popular_terms.join(",")));
        }
        for field in FacetField::ALL {
            let values = self.filters.values(field);
            if !values.is_empty() {
                let joined = values.iter().map(String::as_str).collect::<Vec<_>>();
                pairs.push((field.param(), joined.join(",")));
            }
        }
        if self.filters.featured_only {
            pairs.push(("featured", "true".to_string()));
        }
        if self.filters.on_sale_only {
            pairs.push(("onSale", "true".to_string()));
        }
        pairs.push(("minPrice", self.filters.price_range.min.to_string()));
        pairs.push(("maxPrice", self.filters.price_range.max.to_string()));
        pairs.push(("page", self.page.to_string()));
        pairs.push(("limit", self.limit.to_string()));
        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn pairs(params: &SearchParams) -> Vec<(String, String)> {
        params
            .to_query_pairs()
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }

    fn owned(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn empty_query_and_defaults_serialize_minimal_params() {
        let filters = FilterState::new(500.0);
        let params = compose("  ", "shop.example.com", &filters, &[], 1, 12);
        assert_eq!(
            pairs(&params),
            owned(&[
                ("storeUrl", "shop.example.com"),
                ("minPrice", "0"),
                ("maxPrice", "500"),
                ("page", "1"),
                ("limit", "12"),
            ])
        );
    }

    #[test]
    fn selected_facets_are_comma_joined() {
        let mut filters = FilterState::new(120.5);
        filters.toggle(FacetField::Color, "red");
        filters.toggle(FacetField::Color, "blue");
        filters.toggle(FacetField::StockStatus, "instock");
        filters.toggle_featured();
        filters.toggle_on_sale();
        filters.set_price_range(10.0, 99.5);

        let params = compose("Shirt", "shop", &filters, &[], 2, 12);
        assert_eq!(
            pairs(&params),
            owned(&[
                ("q", "Shirt"),
                ("storeUrl", "shop"),
                ("colors", "blue,red"),
                ("stockStatus", "instock"),
                ("featured", "true"),
                ("onSale", "true"),
                ("minPrice", "10"),
                ("maxPrice", "99.5"),
                ("page", "2"),
                ("limit", "12"),
            ])
        );
    }

    #[test]
    fn popular_terms_contained_in_query_become_hints() {
        let popular = vec![
            "shirt".to_string(),
            "Underwear".to_string(),
            "plan".to_string(),
            String::new(),
        ];
        let filters = FilterState::new(100.0);

        let params = compose("Blue SHIRT and underwear", "shop", &filters, &popular, 1, 12);
        assert_eq!(params.popular_terms, vec!["shirt", "Underwear"]);
        assert!(
            params
                .to_query_pairs()
                .contains(&("popularTerms", "shirt,Underwear".to_string()))
        );

        let params = compose("socks", "shop", &filters, &popular, 1, 12);
        assert!(params.popular_terms.is_empty());
    }

    #[test]
    fn toggle_and_clear_all() {
        let mut filters = FilterState::new(100.0);
        assert!(!filters.is_any_active("", 100.0));

        assert!(filters.toggle(FacetField::Brand, "acme"));
        assert!(filters.is_any_active("", 100.0));
        assert!(!filters.toggle(FacetField::Brand, "acme"));
        assert!(!filters.is_any_active("", 100.0));

        filters.set_price_range(80.0, 20.0);
        assert_eq!(filters.price_range, PriceRange { min: 20.0, max: 80.0 });
        assert!(filters.is_any_active("", 100.0));

        filters.toggle(FacetField::Tag, "new");
        filters.clear_all(250.0);
        assert_eq!(filters, FilterState::new(250.0));
        assert!(filters.is_any_active("shirt", 250.0));
    }

    fn priced(title: &str, price: Option<&str>) -> Product {
        Product {
            id: title.to_string(),
            title: title.to_string(),
            price: price.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn sorting_is_a_view() {
        let products = vec![
            priced("beta", Some("20")),
            priced("Alpha", None),
            priced("gamma", Some("5.5")),
        ];
        let titles = |view: Vec<&Product>| -> Vec<String> {
            view.into_iter().map(|p| p.title.clone()).collect()
        };

        assert_eq!(
            titles(sort_products(&products, SortOption::Default)),
            vec!["beta", "Alpha", "gamma"]
        );
        assert_eq!(
            titles(sort_products(&products, SortOption::NameAsc)),
            vec!["Alpha", "beta", "gamma"]
        );
        assert_eq!(
            titles(sort_products(&products, SortOption::NameDesc)),
            vec!["gamma", "beta", "Alpha"]
        );
        assert_eq!(
            titles(sort_products(&products, SortOption::PriceAsc)),
            vec!["gamma", "beta", "Alpha"]
        );
        assert_eq!(
            titles(sort_products(&products, SortOption::PriceDesc)),
            vec!["beta", "gamma", "Alpha"]
        );
    }

    #[test]
    fn sort_option_parses_aliases() {
        assert_eq!("price-high".parse::<SortOption>(), Ok(SortOption::PriceDesc));
        assert_eq!("Name-Asc".parse::<SortOption>(), Ok(SortOption::NameAsc));
        assert!("cheapest".parse::<SortOption>().is_err());
        assert_eq!(SortOption::PriceAsc.to_string(), "price-asc");
    }
}

/*!
# Storefront Search

Client-side orchestration for a storefront search widget: it turns keystrokes
and filter selections into ranked, paginated product results while keeping
facet counts and recent searches consistent across overlapping requests.

## Components

- **Filter composer** (`filters`): filter state plus query text to request
  parameters
- **Facet index** (`facets`): one-shot catalog scan for facet counts and the
  price bound, gated once per store
- **Autocomplete** (`autocomplete`): fuzzy scoring, debounce, staleness guard
- **Pagination** (`pagination`): page cursor, accumulated results, load-more
  guard
- **Session** (`session`): the query state machine that drives all of the
  above

## Flow

```text
input / filter change
  └─> transition(mode, event) ─> effects
        ├─> Debounce ──(quiet period)──> Autocomplete + Search commands
        └─> SearchNow ─────────────────> Search command
                                            └─> execute(backend) ─> Completion
                                                  └─> session.apply (generation checked)
```

## Example

```rust,no_run
use storefront_search::{HttpBackend, SearchSession, SessionEvent, WidgetConfig};

#[tokio::main]
async fn main() -> storefront_search::Result<()> {
    let config = WidgetConfig {
        store_url: "shop.example.com".to_string(),
        ..WidgetConfig::default()
    };
    let backend = HttpBackend::new(&config)?;
    let mut session = SearchSession::from_config(config);
    session.bootstrap(&backend).await;

    let commands = session.dispatch(SessionEvent::TermSelected("shirt".to_string()));
    session.drive(&backend, commands).await;
    for product in session.sorted_results() {
        println!("{} {}", product.title, product.price.as_deref().unwrap_or("-"));
    }
    Ok(())
}
```
*/

pub mod autocomplete;
pub mod client;
pub mod config;
pub mod error;
pub mod facets;
pub mod filters;
pub mod history;
pub mod pagination;
pub mod proto;
pub mod session;

pub use autocomplete::{
    Autocomplete, AutocompleteTicket, Suggestion, rank_suggestions, score_suggestion,
};
pub use client::{HttpBackend, SearchBackend};
pub use config::WidgetConfig;
pub use error::{Result, SearchError};
pub use facets::{FacetIndex, OptionalFacets, build_facet_index};
pub use filters::{FacetField, FilterState, PriceRange, SearchParams, SortOption, compose};
pub use history::{JsonFileStore, MemoryStore, RecentSearchStore, RecentSearches};
pub use pagination::{Layout, LoadMoreTicket, LoadMoreTrigger, PageState, SearchTicket};
pub use proto::{Product, SearchPage, discount_percentage};
pub use session::{
    Command, Completion, Effect, ModeState, SearchSession, SessionEvent, SessionMode, Transition,
    ViewFlags, execute, transition,
};

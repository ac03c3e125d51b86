//! Query state machine and the session that owns every piece of widget
//! state.
//!
//! [`transition`] is a pure function from the current [`ModeState`] and a
//! [`SessionEvent`] to the next state plus the side effects to run.
//! [`SearchSession`] applies those effects and hands out [`Command`]s; the
//! caller runs them with [`execute`] (no borrow of the session is held across
//! the network call) and feeds the resulting [`Completion`] back through
//! [`SearchSession::apply`], which drops anything issued for superseded
//! state.

use crate::autocomplete::Autocomplete;
use crate::autocomplete::AutocompleteTicket;
use crate::autocomplete::Debouncer;
use crate::autocomplete::Suggestion;
use crate::client::SearchBackend;
use crate::config::WidgetConfig;
use crate::error::Result;
use crate::facets::FacetBootstrap;
use crate::facets::FacetIndex;
use crate::facets::OptionalFacets;
use crate::facets::build_facet_index;
use crate::facets::fetch_catalog_with_retry;
use crate::filters::FacetField;
use crate::filters::FilterState;
use crate::filters::PriceRange;
use crate::filters::SortOption;
use crate::filters::compose;
use crate::filters::sort_products;
use crate::history::JsonFileStore;
use crate::history::MemoryStore;
use crate::history::RecentSearchStore;
use crate::history::RecentSearches;
use crate::pagination::Layout;
use crate::pagination::LoadMoreTicket;
use crate::pagination::LoadMoreTrigger;
use crate::pagination::PageState;
use crate::pagination::Paginator;
use crate::pagination::SearchTicket;
use crate::proto::AutocompletePayload;
use crate::proto::Product;
use crate::proto::SearchPage;
use serde::Serialize;
use tokio::time::Instant;
use tracing::debug;
use tracing::info;
use tracing::warn;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum SessionMode {
    /// Empty query, nothing searched yet.
    #[default]
    Initial,
    /// Empty query after at least one search.
    Cleared,
    Active,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ViewFlags {
    pub show_recommendations: bool,
    pub show_filters: bool,
    pub fetch_catalog: bool,
}

impl SessionMode {
    pub fn view(self) -> ViewFlags {
        match self {
            SessionMode::Initial => ViewFlags {
                show_recommendations: true,
                show_filters: false,
                fetch_catalog: false,
            },
            SessionMode::Cleared | SessionMode::Active => ViewFlags {
                show_recommendations: false,
                show_filters: true,
                fetch_catalog: true,
            },
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ModeState {
    /// Query text exactly as typed.
    pub query: String,
    pub mode: SessionMode,
    pub ever_searched: bool,
    /// Bumped on every explicit submit or term selection.
    pub force_counter: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    QueryEdited(String),
    /// Explicit submit, e.g. pressing enter.
    Submit,
    /// A suggestion, recent search or popular term was picked.
    TermSelected(String),
    FiltersChanged,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Effect {
    ClearSuggestions,
    RecordRecent(String),
    /// Restart the input quiet period for this trimmed query.
    Debounce(String),
    CancelDebounce,
    /// Start a new search generation for this trimmed query right away.
    SearchNow(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transition {
    pub state: ModeState,
    pub effects: Vec<Effect>,
}

fn empty_query_mode(ever_searched: bool) -> SessionMode {
    if ever_searched {
        SessionMode::Cleared
    } else {
        SessionMode::Initial
    }
}

pub fn transition(current: &ModeState, event: &SessionEvent) -> Transition {
    let mut state = current.clone();
    let mut effects = Vec::new();
    match event {
        SessionEvent::QueryEdited(text) => {
            state.query = text.clone();
            let trimmed = text.trim();
            if trimmed.is_empty() {
                state.mode = empty_query_mode(state.ever_searched);
                effects.push(Effect::CancelDebounce);
                effects.push(Effect::ClearSuggestions);
                if state.mode == SessionMode::Cleared && current.mode != SessionMode::Cleared {
                    effects.push(Effect::SearchNow(String::new()));
                }
            } else {
                state.mode = SessionMode::Active;
                state.ever_searched = true;
                effects.push(Effect::Debounce(trimmed.to_string()));
            }
        }
        SessionEvent::Submit => {
            let query = current.query.trim().to_string();
            state.force_counter += 1;
            state.ever_searched = true;
            state.mode = if query.is_empty() {
                SessionMode::Cleared
            } else {
                SessionMode::Active
            };
            effects.push(Effect::CancelDebounce);
            effects.push(Effect::ClearSuggestions);
            if !query.is_empty() {
                effects.push(Effect::RecordRecent(query.clone()));
            }
            effects.push(Effect::SearchNow(query));
        }
        SessionEvent::TermSelected(term) => {
            let term = term.trim();
            if !term.is_empty() {
                state.query = term.to_string();
                state.mode = SessionMode::Active;
                state.ever_searched = true;
                state.force_counter += 1;
                effects.push(Effect::CancelDebounce);
                effects.push(Effect::ClearSuggestions);
                effects.push(Effect::RecordRecent(term.to_string()));
                effects.push(Effect::SearchNow(term.to_string()));
            }
        }
        SessionEvent::FiltersChanged => {
            if state.mode != SessionMode::Initial {
                effects.push(Effect::SearchNow(state.query.trim().to_string()));
            }
        }
    }
    Transition { state, effects }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    Search(SearchTicket),
    LoadMore(LoadMoreTicket),
    Autocomplete(AutocompleteTicket),
}

#[derive(Debug)]
pub enum Completion {
    Search(SearchTicket, Result<SearchPage>),
    LoadMore(LoadMoreTicket, Result<SearchPage>),
    Autocomplete(AutocompleteTicket, Result<AutocompletePayload>),
}

/// Run one command against the backend.
pub async fn execute(backend: &dyn SearchBackend, command: Command) -> Completion {
    match command {
        Command::Search(ticket) => {
            let result = backend.search(&ticket.params).await;
            Completion::Search(ticket, result)
        }
        Command::LoadMore(ticket) => {
            let result = backend.search(&ticket.params).await;
            Completion::LoadMore(ticket, result)
        }
        Command::Autocomplete(ticket) => {
            let result = backend.autocomplete(&ticket.query, &ticket.store_url).await;
            Completion::Autocomplete(ticket, result)
        }
    }
}

/// `Ok(None)` when the vendor has not enabled recommendations.
async fn load_recommendations(
    backend: &dyn SearchBackend,
    store_url: &str,
) -> Result<Option<Vec<Product>>> {
    let config = backend.recommendations_config(store_url).await?;
    if !config.enabled {
        return Ok(None);
    }
    backend.recommended_products(store_url).await.map(Some)
}

#[derive(Debug)]
pub struct SearchSession {
    config: WidgetConfig,
    mode: ModeState,
    filters: FilterState,
    sort: SortOption,
    max_price: f64,
    facets: FacetIndex,
    facet_bootstrap: FacetBootstrap,
    optional_facets: OptionalFacets,
    autocomplete: Autocomplete,
    debouncer: Debouncer,
    paginator: Paginator,
    recent: RecentSearches,
    popular: Vec<String>,
    recommendations: Vec<Product>,
    recommendations_loaded: bool,
}

impl SearchSession {
    pub fn new(config: WidgetConfig, recent: RecentSearches) -> Self {
        let max_price = config.default_max_price;
        Self {
            mode: ModeState::default(),
            filters: FilterState::new(max_price),
            sort: SortOption::default(),
            max_price,
            facets: FacetIndex::default(),
            facet_bootstrap: FacetBootstrap::default(),
            optional_facets: OptionalFacets::default(),
            autocomplete: Autocomplete::new(config.max_suggestions),
            debouncer: Debouncer::new(config.debounce()),
            paginator: Paginator::default(),
            recent,
            popular: Vec::new(),
            recommendations: Vec::new(),
            recommendations_loaded: false,
            config,
        }
    }

    /// Build a session whose recent searches live in
    /// `config.recent_searches_path`, or in memory when unset.
    pub fn from_config(config: WidgetConfig) -> Self {
        let store: Box<dyn RecentSearchStore> = match &config.recent_searches_path {
            Some(path) => Box::new(JsonFileStore::new(path.clone())),
            None => Box::new(MemoryStore::default()),
        };
        let recent = RecentSearches::load(store, config.max_recent_searches);
        Self::new(config, recent)
    }

    pub fn config(&self) -> &WidgetConfig {
        &self.config
    }

    pub fn query(&self) -> &str {
        &self.mode.query
    }

    pub fn mode(&self) -> SessionMode {
        self.mode.mode
    }

    pub fn mode_state(&self) -> &ModeState {
        &self.mode
    }

    pub fn view(&self) -> ViewFlags {
        self.mode.mode.view()
    }

    pub fn filters(&self) -> &FilterState {
        &self.filters
    }

    pub fn sort(&self) -> SortOption {
        self.sort
    }

    pub fn max_price(&self) -> f64 {
        self.max_price
    }

    pub fn facets(&self) -> &FacetIndex {
        &self.facets
    }

    pub fn facets_loaded(&self) -> bool {
        self.facet_bootstrap.is_complete(&self.config.store_url)
    }

    pub fn optional_facets(&self) -> OptionalFacets {
        self.optional_facets
    }

    pub fn suggestions(&self) -> &[Suggestion] {
        self.autocomplete.suggestions()
    }

    pub fn autocomplete(&self) -> &Autocomplete {
        &self.autocomplete
    }

    pub fn results(&self) -> &PageState {
        self.paginator.state()
    }

    /// Accumulated results in the selected sort order.
    pub fn sorted_results(&self) -> Vec<&Product> {
        sort_products(&self.paginator.state().items, self.sort)
    }

    /// True while results are pending, including the debounce window of an
    /// active query.
    pub fn is_loading(&self) -> bool {
        self.paginator.state().loading
            || (self.mode.mode == SessionMode::Active && self.debouncer.is_pending())
    }

    pub fn has_active_filters(&self) -> bool {
        self.filters.is_any_active(&self.mode.query, self.max_price)
    }

    pub fn recent_searches(&self) -> &[String] {
        self.recent.terms()
    }

    pub fn popular_searches(&self) -> &[String] {
        &self.popular
    }

    pub fn recommendations(&self) -> &[Product] {
        &self.recommendations
    }

    pub fn debounce_deadline(&self) -> Option<Instant> {
        self.debouncer.deadline()
    }

    pub fn dispatch(&mut self, event: SessionEvent) -> Vec<Command> {
        self.dispatch_at(event, Instant::now())
    }

    pub fn dispatch_at(&mut self, event: SessionEvent, now: Instant) -> Vec<Command> {
        let event = match event {
            SessionEvent::Submit => match self.autocomplete.highlighted_text() {
                Some(text) => SessionEvent::TermSelected(text.to_string()),
                None => SessionEvent::Submit,
            },
            other => other,
        };
        match &event {
            SessionEvent::QueryEdited(text) => self.autocomplete.set_query(text),
            SessionEvent::TermSelected(term) if !term.trim().is_empty() => {
                self.autocomplete.set_query(term);
            }
            _ => {}
        }

        let Transition { state, effects } = transition(&self.mode, &event);
        self.mode = state;

        let mut commands = Vec::new();
        for effect in effects {
            match effect {
                Effect::ClearSuggestions => self.autocomplete.clear(),
                Effect::RecordRecent(term) => self.recent.record(&term),
                Effect::Debounce(query) => self.debouncer.schedule(query, now),
                Effect::CancelDebounce => self.debouncer.cancel(),
                Effect::SearchNow(query) => {
                    commands.push(Command::Search(self.begin_search(&query)));
                }
            }
        }
        commands
    }

    /// Fire the debounced autocomplete and search once the input has been
    /// quiet long enough.
    pub fn poll_debounce(&mut self, now: Instant) -> Vec<Command> {
        let Some(query) = self.debouncer.poll(now) else {
            return Vec::new();
        };
        if self.mode.mode != SessionMode::Active || query != self.mode.query.trim() {
            debug!(%query, "dropping debounced query that no longer matches input");
            return Vec::new();
        }
        let mut commands = Vec::new();
        if let Some(ticket) = self.autocomplete.begin(&query, &self.config.store_url) {
            commands.push(Command::Autocomplete(ticket));
        }
        commands.push(Command::Search(self.begin_search(&query)));
        commands
    }

    pub fn load_more(&mut self, trigger: LoadMoreTrigger, layout: Layout) -> Option<Command> {
        if !layout.accepts(trigger, self.config.load_more_visibility_threshold) {
            return None;
        }
        self.paginator.load_more().map(Command::LoadMore)
    }

    /// Apply a completed command. Returns false when it was superseded.
    pub fn apply(&mut self, completion: Completion) -> bool {
        match completion {
            Completion::Search(ticket, result) => self.paginator.resolve_search(&ticket, result),
            Completion::LoadMore(ticket, result) => {
                self.paginator.resolve_load_more(&ticket, result)
            }
            Completion::Autocomplete(ticket, result) => {
                self.autocomplete.resolve(&ticket, result)
            }
        }
    }

    pub fn toggle_filter(&mut self, field: FacetField, value: &str) -> Vec<Command> {
        self.filters.toggle(field, value);
        self.dispatch(SessionEvent::FiltersChanged)
    }

    pub fn toggle_featured(&mut self) -> Vec<Command> {
        self.filters.toggle_featured();
        self.dispatch(SessionEvent::FiltersChanged)
    }

    pub fn toggle_on_sale(&mut self) -> Vec<Command> {
        self.filters.toggle_on_sale();
        self.dispatch(SessionEvent::FiltersChanged)
    }

    pub fn set_price_range(&mut self, min: f64, max: f64) -> Vec<Command> {
        self.filters.set_price_range(min, max);
        self.dispatch(SessionEvent::FiltersChanged)
    }

    pub fn clear_filters(&mut self) -> Vec<Command> {
        self.filters.clear_all(self.max_price);
        self.dispatch(SessionEvent::FiltersChanged)
    }

    /// Sorting reorders what is already loaded; nothing is refetched.
    pub fn set_sort(&mut self, sort: SortOption) {
        self.sort = sort;
    }

    pub fn dismiss_suggestions(&mut self) {
        self.autocomplete.clear();
    }

    pub fn highlight_next(&mut self) {
        self.autocomplete.highlight_next();
    }

    pub fn highlight_previous(&mut self) {
        self.autocomplete.highlight_previous();
    }

    pub fn remove_recent(&mut self, term: &str) -> bool {
        self.recent.remove(term)
    }

    pub fn clear_recent(&mut self) {
        self.recent.clear();
    }

    fn begin_search(&mut self, query: &str) -> SearchTicket {
        let params = compose(
            query,
            &self.config.store_url,
            &self.filters,
            &self.popular,
            1,
            self.config.page_size,
        );
        self.paginator.begin_search(params)
    }

    /// Run the one-time loads for this store: facet catalog, popular
    /// searches, optional facet visibility and recommendations. They are
    /// independent and run concurrently.
    pub async fn bootstrap(&mut self, backend: &dyn SearchBackend) {
        let store_url = self.config.store_url.clone();
        if store_url.trim().is_empty() {
            warn!("store_url is empty; skipping bootstrap");
            return;
        }
        let run_facets = self.facet_bootstrap.claim(&store_url);
        let run_recommendations = !self.recommendations_loaded;
        let limit = self.config.facet_fetch_limit;
        let retries = self.config.facet_retries;
        let delay = self.config.facet_retry_delay();

        let catalog = async {
            if run_facets {
                Some(fetch_catalog_with_retry(backend, &store_url, limit, retries, delay).await)
            } else {
                None
            }
        };
        let recommendations = async {
            if run_recommendations {
                Some(load_recommendations(backend, &store_url).await)
            } else {
                None
            }
        };
        let (catalog, popular, facet_config, recommendations) = tokio::join!(
            catalog,
            backend.popular_searches(&store_url),
            backend.facet_configuration(&store_url),
            recommendations,
        );

        match catalog {
            Some(Ok(products)) => {
                self.apply_catalog(&products);
                self.facet_bootstrap.complete(&store_url);
            }
            Some(Err(err)) => {
                warn!(%err, "facet bootstrap failed; keeping default facets");
                self.facet_bootstrap.complete(&store_url);
            }
            None => debug!(%store_url, "facet index already built"),
        }

        self.popular = match popular {
            Ok(mut terms) if !terms.is_empty() => {
                terms.truncate(self.config.max_popular_searches);
                terms
            }
            Ok(_) => {
                debug!("no popular searches; using fallback");
                self.config.popular_fallback.clone()
            }
            Err(err) => {
                warn!(%err, "popular searches unavailable; using fallback");
                self.config.popular_fallback.clone()
            }
        };

        self.optional_facets = match facet_config {
            Ok(entries) => OptionalFacets::from_configuration(&entries),
            Err(err) => {
                warn!(%err, "facet configuration unavailable; hiding optional facets");
                OptionalFacets::default()
            }
        };

        match recommendations {
            Some(Ok(Some(mut products))) => {
                products.truncate(self.config.max_recommendations);
                self.recommendations = products;
                self.recommendations_loaded = true;
            }
            Some(Ok(None)) => {
                debug!("recommendations disabled for store");
                self.recommendations.clear();
            }
            Some(Err(err)) => {
                warn!(%err, "recommendations unavailable");
                self.recommendations.clear();
            }
            None => {}
        }
    }

    fn apply_catalog(&mut self, products: &[Product]) {
        if products.is_empty() {
            info!("catalog snapshot is empty; keeping default facets");
            return;
        }
        let index = build_facet_index(products);
        if let Some(max_price) = index.max_price {
            self.max_price = max_price;
            self.filters.price_range = PriceRange::up_to(max_price);
        }
        info!(products = products.len(), "facet index built");
        self.facets = index;
    }

    /// Execute `commands` one after another, applying each completion.
    pub async fn drive(&mut self, backend: &dyn SearchBackend, commands: Vec<Command>) {
        for command in commands {
            let completion = execute(backend, command).await;
            self.apply(completion);
        }
    }

    /// Wait out any pending debounce and run what it fires.
    pub async fn settle(&mut self, backend: &dyn SearchBackend) {
        while let Some(deadline) = self.debouncer.deadline() {
            tokio::time::sleep_until(deadline).await;
            let commands = self.poll_debounce(Instant::now());
            self.drive(backend, commands).await;
        }
    }
}

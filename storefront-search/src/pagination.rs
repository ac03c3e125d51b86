//! Page cursor, accumulated results, and the load-more guard.

use crate::error::Result;
use crate::filters::SearchParams;
use crate::proto::Product;
use crate::proto::SearchPage;
use tracing::debug;
use tracing::warn;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PageState {
    pub page: u32,
    pub items: Vec<Product>,
    pub total: usize,
    pub has_more: bool,
    pub loading: bool,
    pub loading_more: bool,
}

impl PageState {
    pub fn displayed_count(&self) -> usize {
        self.items.len()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SearchTicket {
    pub generation: u64,
    pub params: SearchParams,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LoadMoreTicket {
    pub generation: u64,
    pub params: SearchParams,
}

/// Every new search bumps the generation, which orphans in-flight searches
/// and load-more requests issued for older parameters.
#[derive(Debug, Default)]
pub struct Paginator {
    generation: u64,
    state: PageState,
    active: Option<SearchParams>,
}

impl Paginator {
    pub fn state(&self) -> &PageState {
        &self.state
    }

    /// Discard accumulated results and start over at page 1.
    pub fn begin_search(&mut self, params: SearchParams) -> SearchTicket {
        let params = params.with_page(1);
        self.generation += 1;
        self.state = PageState {
            loading: true,
            ..PageState::default()
        };
        self.active = Some(params.clone());
        SearchTicket {
            generation: self.generation,
            params,
        }
    }

    pub fn resolve_search(&mut self, ticket: &SearchTicket, result: Result<SearchPage>) -> bool {
        if ticket.generation != self.generation {
            debug!(query = %ticket.params.query, "discarding superseded search response");
            return false;
        }
        self.state.loading = false;
        match result {
            Ok(page) => {
                self.state.page = 1;
                self.state.total = page.total;
                self.state.has_more = page.has_more;
                self.state.items = page.products;
            }
            Err(err) => {
                warn!(%err, query = %ticket.params.query, "search failed");
                self.state.page = 1;
                self.state.total = 0;
                self.state.has_more = false;
                self.state.items.clear();
            }
        }
        true
    }

    /// Request the next page. `None` while another load-more is pending,
    /// while the first page is loading, or when there is nothing more.
    pub fn load_more(&mut self) -> Option<LoadMoreTicket> {
        if self.state.loading || self.state.loading_more || !self.state.has_more {
            return None;
        }
        let params = self.active.as_ref()?.with_page(self.state.page + 1);
        self.state.loading_more = true;
        Some(LoadMoreTicket {
            generation: self.generation,
            params,
        })
    }

    pub fn resolve_load_more(
        &mut self,
        ticket: &LoadMoreTicket,
        result: Result<SearchPage>,
    ) -> bool {
        if ticket.generation != self.generation {
            debug!(page = ticket.params.page, "discarding load-more for superseded search");
            return false;
        }
        self.state.loading_more = false;
        match result {
            Ok(page) if page.products.is_empty() => {
                self.state.has_more = false;
            }
            Ok(page) => {
                self.state.items.extend(page.products);
                self.state.page = ticket.params.page;
                self.state.has_more = page.has_more;
            }
            Err(err) => {
                warn!(%err, page = ticket.params.page, "load more failed");
                self.state.has_more = false;
            }
        }
        true
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Layout {
    /// Narrow viewports: infinite scroll via a sentinel element.
    Compact,
    /// Wide viewports: explicit load-more control only.
    Wide,
}

impl Layout {
    pub fn from_viewport_width(width_px: u32, compact_breakpoint_px: u32) -> Self {
        if width_px < compact_breakpoint_px {
            Layout::Compact
        } else {
            Layout::Wide
        }
    }

    pub fn accepts(self, trigger: LoadMoreTrigger, visibility_threshold: f32) -> bool {
        match (self, trigger) {
            (_, LoadMoreTrigger::Button) => true,
            (Layout::Compact, LoadMoreTrigger::SentinelVisible(ratio)) => {
                ratio >= visibility_threshold
            }
            (Layout::Wide, LoadMoreTrigger::SentinelVisible(_)) => false,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LoadMoreTrigger {
    /// Fraction of the sentinel element currently visible.
    SentinelVisible(f32),
    Button,
}

//! Filter state behind the platform listing: search text, selected category
//! and tag ids, and the current page.

use crate::api::PlatformQuery;
use crate::debug::{self, cat};
use crate::query_cache::CacheKey;
use crate::types::ListMeta;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FilterState {
    search: String,
    category_ids: Vec<i64>,
    tag_ids: Vec<i64>,
    page: u32,
}

impl Default for FilterState {
    fn default() -> Self {
        Self {
            search: String::new(),
            category_ids: Vec::new(),
            tag_ids: Vec::new(),
            page: 1,
        }
    }
}

impl FilterState {
    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn category_ids(&self) -> &[i64] {
        &self.category_ids
    }

    pub fn tag_ids(&self) -> &[i64] {
        &self.tag_ids
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    /// Deterministic key; toggle order does not matter.
    pub fn cache_key(&self) -> CacheKey {
        let join = |ids: &[i64]| {
            let mut ids = ids.to_vec();
            ids.sort_unstable();
            ids.iter().map(|i| i.to_string()).collect::<Vec<_>>().join(",")
        };
        CacheKey::new(format!(
            "platforms?search={}&categories={}&tags={}&page={}",
            urlencoding::encode(self.search.trim()),
            join(&self.category_ids),
            join(&self.tag_ids),
            self.page
        ))
    }

    pub fn to_query(&self, page_size: u32) -> PlatformQuery {
        let search = self.search.trim();
        let mut category_ids = self.category_ids.clone();
        category_ids.sort_unstable();
        let mut tag_ids = self.tag_ids.clone();
        tag_ids.sort_unstable();
        PlatformQuery {
            search: (!search.is_empty()).then(|| search.to_string()),
            category_ids,
            tag_ids,
            page: self.page,
            page_size,
        }
    }

    /// Number of active filters shown on the filter badge.
    pub fn active_filter_count(&self) -> usize {
        self.category_ids.len() + self.tag_ids.len() + usize::from(!self.search.is_empty())
    }
}

/// Page count reported by the latest listing meta, 0 when unknown.
pub fn total_pages(meta: Option<&ListMeta>) -> u32 {
    meta.map(|m| m.pagination.pages).unwrap_or(0)
}

/// Owns the [`FilterState`] and the page count learned from the last result.
/// Every operation is total; none of them fail.
#[derive(Clone, Debug, Default)]
pub struct FilterController {
    state: FilterState,
    total_pages: Option<u32>,
}

impl FilterController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &FilterState {
        &self.state
    }

    pub fn set_search(&mut self, text: &str) {
        self.state.search = text.trim().to_string();
        self.state.page = 1;
        debug::log(cat::FILTER, format!("search={:?}", self.state.search));
    }

    pub fn toggle_category(&mut self, id: i64) {
        toggle(&mut self.state.category_ids, id);
        self.state.page = 1;
        debug::log(cat::FILTER, format!("categories={:?}", self.state.category_ids));
    }

    pub fn toggle_tag(&mut self, id: i64) {
        toggle(&mut self.state.tag_ids, id);
        self.state.page = 1;
        debug::log(cat::FILTER, format!("tags={:?}", self.state.tag_ids));
    }

    pub fn clear_all(&mut self) {
        self.state.search.clear();
        self.state.category_ids.clear();
        self.state.tag_ids.clear();
        self.state.page = 1;
        debug::log(cat::FILTER, "cleared");
    }

    /// Clamp to `[1, total_pages]` once the page count is known.
    pub fn set_page(&mut self, n: u32) {
        let mut page = n.max(1);
        if let Some(total) = self.total_pages.filter(|t| *t > 0) {
            page = page.min(total);
        }
        self.state.page = page;
        debug::log(cat::FILTER, format!("page={page}"));
    }

    pub fn next_page(&mut self) {
        self.set_page(self.state.page.saturating_add(1));
    }

    pub fn prev_page(&mut self) {
        self.set_page(self.state.page.saturating_sub(1));
    }

    /// Record the page count of the latest result. Returns true when the
    /// current page had to be corrected (result set shrank, or came back empty
    /// while we sat past page 1).
    pub fn observe_total_pages(&mut self, pages: u32) -> bool {
        self.total_pages = Some(pages);
        let corrected = if pages > 0 && self.state.page > pages {
            pages
        } else if pages == 0 && self.state.page > 1 {
            1
        } else {
            return false;
        };
        debug::log(
            cat::FILTER,
            format!("page {} -> {} (pages={pages})", self.state.page, corrected),
        );
        self.state.page = corrected;
        true
    }
}

fn toggle(ids: &mut Vec<i64>, id: i64) {
    if let Some(pos) = ids.iter().position(|x| *x == id) {
        ids.remove(pos);
    } else {
        ids.push(id);
    }
}

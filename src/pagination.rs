//! Search, fixed-size pages and the windowed page-number control used by the console lists.

use serde::{Deserialize, Serialize, Serializer};

pub const PER_PAGE: usize = 10;
const WINDOW: usize = 10;

/// Optional query parameters accepted by list endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub search: Option<String>,
    pub page: Option<usize>,
    pub limit: Option<u64>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PageLink {
    Page(usize),
    Ellipsis,
}

impl Serialize for PageLink {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            PageLink::Page(n) => serializer.serialize_u64(*n as u64),
            PageLink::Ellipsis => serializer.serialize_str("..."),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct PageMeta {
    pub page: usize,
    pub per_page: usize,
    pub total_items: usize,
    pub total_pages: usize,
    pub window: Vec<PageLink>,
}

/// Case-insensitive substring filter on a display name.
pub fn filter_by_name<T>(items: Vec<T>, search: Option<&str>, name: impl Fn(&T) -> &str) -> Vec<T> {
    let needle = match search.map(str::trim) {
        Some(s) if !s.is_empty() => s.to_lowercase(),
        _ => return items,
    };
    items.into_iter().filter(|item| name(item).to_lowercase().contains(&needle)).collect()
}

/// Slices `items` to the requested 1-based page. Out-of-range pages clamp to the nearest valid one.
pub fn paginate<T>(items: Vec<T>, page: usize) -> (Vec<T>, PageMeta) {
    let total_items = items.len();
    let total_pages = total_items.div_ceil(PER_PAGE);
    let page = page.clamp(1, total_pages.max(1));

    let slice = items.into_iter().skip((page - 1) * PER_PAGE).take(PER_PAGE).collect();

    let meta = PageMeta {
        page,
        per_page: PER_PAGE,
        total_items,
        total_pages,
        window: page_window(page, total_pages),
    };
    (slice, meta)
}

/// First page, the block of up to ten pages containing `current`, last page, with gaps marked.
///
/// Pages 1..=10 share the block 2..=11; from page 11 on, blocks are 11..=20, 21..=30 and so on.
pub fn page_window(current: usize, total_pages: usize) -> Vec<PageLink> {
    if total_pages <= 1 {
        return vec![PageLink::Page(1)];
    }

    let mut out = vec![PageLink::Page(1)];
    if current > WINDOW {
        out.push(PageLink::Ellipsis);
    }

    let start = if current <= WINDOW { 2 } else { (current - 1) / WINDOW * WINDOW + 1 };
    out.extend(
        (start..start + WINDOW).filter(|p| *p > 1 && *p < total_pages).map(PageLink::Page),
    );

    if current + WINDOW <= total_pages {
        out.push(PageLink::Ellipsis);
    }
    out.push(PageLink::Page(total_pages));
    out
}

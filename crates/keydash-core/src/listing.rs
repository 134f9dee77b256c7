use serde::{Deserialize, Serialize};

use crate::api_key::ApiKey;

/// Default page size for key listings.
pub const DEFAULT_PER_PAGE: usize = 10;

/// Case-insensitive substring match on name or key. A blank query keeps everything.
pub fn filter_api_keys(keys: &[ApiKey], query: &str) -> Vec<ApiKey> {
    let query = query.trim();
    if query.is_empty() {
        return keys.to_vec();
    }
    let q = query.to_lowercase();
    keys.iter()
        .filter(|k| k.name.to_lowercase().contains(&q) || k.key.to_lowercase().contains(&q))
        .cloned()
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: usize,
    pub per_page: usize,
    pub total_pages: usize,
}

/// Slice out 1-based `page` of `per_page` items.
///
/// Pages past the end come back empty. `page` 0 is treated as 1 and
/// `per_page` 0 as [`DEFAULT_PER_PAGE`].
pub fn paginate<T: Clone>(items: &[T], page: usize, per_page: usize) -> Page<T> {
    let page = page.max(1);
    let per_page = if per_page == 0 { DEFAULT_PER_PAGE } else { per_page };
    let start = (page - 1).saturating_mul(per_page).min(items.len());
    let end = start.saturating_add(per_page).min(items.len());
    Page {
        items: items[start..end].to_vec(),
        total: items.len(),
        page,
        per_page,
        total_pages: items.len().div_ceil(per_page),
    }
}

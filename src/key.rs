//! Synthetic keys for list, sorted-list and search caches.
//!
//! Record caches are keyed by id or natural key directly. Caches that hold
//! whole result sets share one `String`-keyed manager and use these builders
//! so that every caller spells a given query the same way.

/// Key of the unfiltered "all records" entry.
pub const ALL_KEY: &str = "ALL";

/// Builder for list and search cache keys.
pub struct CacheKeyBuilder;

impl CacheKeyBuilder {
    /// `"ALL"`.
    pub fn all() -> String {
        ALL_KEY.to_string()
    }

    /// `"ALL_SORTED_<sort>"`.
    pub fn sorted(sort: &dyn std::fmt::Display) -> String {
        format!("{}_SORTED_{}", ALL_KEY, sort)
    }

    /// `"SEARCH_<term>"` with the term normalized.
    pub fn search(term: &str) -> String {
        format!("SEARCH_{}", Self::normalize(term))
    }

    /// `"SEARCH_CAT_<category|all>_<term|all>"`.
    pub fn search_in_category(category: Option<i64>, term: Option<&str>) -> String {
        let category = category.map_or_else(|| "all".to_string(), |c| c.to_string());
        let term = term
            .map(Self::normalize)
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| "all".to_string());
        format!("SEARCH_CAT_{}_{}", category, term)
    }

    /// Trim and lower-case a search term.
    pub fn normalize(term: &str) -> String {
        term.trim().to_lowercase()
    }
}

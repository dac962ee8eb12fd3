//! Search/ignore list filters (§6, §8 "Filter precedence"): decides whether
//! an archive key should be included in a run, given an optional search list
//! and an optional ignore list.
//!
//! Grounded on the original's `wr_azure_lib.py::isInList`, which supports
//! both exact-match and substring-match lists depending on a `*_type` flag
//! alongside each list.

/// How a [`FilterList`]'s entries are compared against a candidate key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// An entry matches only if it equals the candidate key exactly.
    Exact,
    /// An entry matches if it occurs anywhere within the candidate key.
    Substring,
}

/// A named list of strings plus the comparison mode used against it.
#[derive(Debug, Clone)]
pub struct FilterList {
    entries: Vec<String>,
    mode: MatchMode,
}

impl FilterList {
    #[must_use]
    pub fn new(entries: Vec<String>, mode: MatchMode) -> Self {
        Self { entries, mode }
    }

    fn matches(&self, archive_key: &str) -> bool {
        match self.mode {
            MatchMode::Exact => self.entries.iter().any(|e| e == archive_key),
            MatchMode::Substring => self.entries.iter().any(|e| archive_key.contains(e.as_str())),
        }
    }
}

/// Combines an optional search list and an optional ignore list (§6). The
/// ignore list takes precedence: a key present in both is excluded.
#[derive(Debug, Clone, Default)]
pub struct ArchiveFilter {
    search: Option<FilterList>,
    ignore: Option<FilterList>,
}

impl ArchiveFilter {
    #[must_use]
    pub fn new(search: Option<FilterList>, ignore: Option<FilterList>) -> Self {
        Self { search, ignore }
    }

    /// Whether `archive_key` should be kept in the run.
    #[must_use]
    pub fn keep(&self, archive_key: &str) -> bool {
        if let Some(ignore) = &self.ignore {
            if ignore.matches(archive_key) {
                return false;
            }
        }
        match &self.search {
            Some(search) => search.matches(archive_key),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_lists_keeps_everything() {
        let filter = ArchiveFilter::default();
        assert!(filter.keep("idx1/db_1_2_3/journal.gz"));
    }

    #[test]
    fn search_list_exact_mode_requires_equality() {
        let search = FilterList::new(vec!["idx1/db_1_2_3/journal.gz".to_string()], MatchMode::Exact);
        let filter = ArchiveFilter::new(Some(search), None);
        assert!(filter.keep("idx1/db_1_2_3/journal.gz"));
        assert!(!filter.keep("idx1/db_1_2_3/journal.gz.extra"));
    }

    #[test]
    fn search_list_substring_mode_matches_containment() {
        let search = FilterList::new(vec!["idx1".to_string()], MatchMode::Substring);
        let filter = ArchiveFilter::new(Some(search), None);
        assert!(filter.keep("state/idx1/db_1_2_3/journal.gz"));
        assert!(!filter.keep("state/idx2/db_1_2_3/journal.gz"));
    }

    #[test]
    fn ignore_list_takes_precedence_over_search_list() {
        let search = FilterList::new(vec!["idx1".to_string()], MatchMode::Substring);
        let ignore = FilterList::new(vec!["db_1_2_3".to_string()], MatchMode::Substring);
        let filter = ArchiveFilter::new(Some(search), Some(ignore));
        assert!(!filter.keep("state/idx1/db_1_2_3/journal.gz"));
        assert!(filter.keep("state/idx1/db_4_5_6/journal.gz"));
    }
}

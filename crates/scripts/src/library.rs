//! The searchable script library.

use nucleo_matcher::pattern::{CaseMatching, Normalization, Pattern};
use nucleo_matcher::{Config, Matcher, Utf32Str};

use crate::loader::LoadResult;
use crate::metadata::Script;

/// Immutable, canonically ordered set of loaded scripts.
///
/// The canonical order is computed once at construction: bias ascending,
/// then built-ins before user scripts, then name (case-insensitive). The
/// sort is stable, so `all()` is bit-identical across runs over the same
/// load result. Concurrent readers need no locking.
pub struct Library {
    sorted: Vec<Script>,
}

impl Library {
    pub fn new(result: LoadResult) -> Self {
        let mut scripts = result.scripts;
        scripts.sort_by(|a, b| {
            a.bias
                .total_cmp(&b.bias)
                .then(a.source.cmp(&b.source))
                .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
        });
        Self { sorted: scripts }
    }

    /// All scripts in canonical order. Returns a defensive copy.
    pub fn all(&self) -> Vec<Script> {
        self.sorted.clone()
    }

    pub fn len(&self) -> usize {
        self.sorted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sorted.is_empty()
    }

    /// Fuzzy-search script names.
    ///
    /// An empty query returns `all()`. Results are ranked by match score
    /// descending; ties keep the canonical order. No matches yields an
    /// empty vec, never a panic or a sentinel.
    pub fn search(&self, query: &str) -> Vec<Script> {
        if query.is_empty() {
            return self.all();
        }

        let pattern = Pattern::parse(query, CaseMatching::Ignore, Normalization::Smart);
        let mut matcher = Matcher::new(Config::DEFAULT);
        let mut buf = Vec::new();

        let mut matches: Vec<(u32, usize)> = self
            .sorted
            .iter()
            .enumerate()
            .filter_map(|(idx, script)| {
                let haystack = Utf32Str::new(&script.name, &mut buf);
                pattern.score(haystack, &mut matcher).map(|score| (score, idx))
            })
            .collect();

        matches.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
        matches
            .into_iter()
            .map(|(_, idx)| self.sorted[idx].clone())
            .collect()
    }
}

//! Full-text search over the blob tree (not required by the core pipeline,
//! but part of the log store interface's read side — §5 "readers (search)
//! may run concurrently with writers"). Grounded on ripgrep's own library
//! split: `ignore` walks the tree respecting no ignore files (blobs aren't a
//! git-tracked source tree), `grep-searcher` + `grep-regex` do the matching.

use std::path::Path;

use grep_regex::RegexMatcher;
use grep_searcher::{Searcher, sinks::UtfLossy};
use ignore::WalkBuilder;

use crate::StoreError;

#[derive(Debug, Clone, serde::Serialize)]
pub struct SearchHit {
    pub path: String,
    pub line_number: u64,
    pub line: String,
}

/// Greps every file under `blob_root` for `pattern`, returning matching
/// lines across all request/response/provider-* blobs.
pub fn search(blob_root: &Path, pattern: &str) -> Result<Vec<SearchHit>, StoreError> {
    let matcher = RegexMatcher::new(pattern).map_err(StoreError::Regex)?;
    let mut hits = Vec::new();

    for entry in WalkBuilder::new(blob_root).standard_filters(false).build() {
        let entry = entry.map_err(|err| StoreError::Io(std::io::Error::other(err)))?;
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }

        let path = entry.path().to_owned();
        let matcher = matcher.clone();
        let mut found = Vec::new();

        Searcher::new()
            .search_path(
                &matcher,
                &path,
                UtfLossy(|line_number, line| {
                    found.push((line_number, line.to_owned()));
                    Ok(true)
                }),
            )
            .map_err(StoreError::Io)?;

        hits.extend(found.into_iter().map(|(line_number, line)| SearchHit {
            path: path.to_string_lossy().into_owned(),
            line_number,
            line,
        }));
    }

    Ok(hits)
}

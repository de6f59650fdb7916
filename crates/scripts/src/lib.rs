//! Script library: metadata parsing, loading, and searchable indexing.
//!
//! A script is a single `.js` file whose first bytes are a `/**!` metadata
//! header. The loader merges the embedded built-in set with the user's
//! script directory, skipping anything it cannot parse; the library then
//! provides a stable canonical order plus fuzzy search over it.

pub mod library;
pub mod loader;
pub mod metadata;

pub use library::Library;
pub use loader::{LoadResult, Loader, MAX_USER_SCRIPT_BYTES};
pub use metadata::{parse_header, HeaderError, Script, ScriptSource};

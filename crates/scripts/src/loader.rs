//! Discovery and parsing of built-in and user scripts.

use std::path::Path;

use boopkit_assets::{ScriptAssets, LIB_DIR};
use boopkit_logging::{log, LogLevel};

use crate::metadata::{parse_header, Script, ScriptSource};

/// User script files larger than this are skipped without being read.
pub const MAX_USER_SCRIPT_BYTES: u64 = 5 * 1024 * 1024;

/// Combined outcome of loading built-in and user scripts.
#[derive(Debug, Default)]
pub struct LoadResult {
    /// Successfully loaded scripts from all sources.
    pub scripts: Vec<Script>,
    /// Paths/names of files that were discovered but could not be loaded.
    pub skipped_files: Vec<String>,
    pub builtin_count: usize,
    pub user_count: usize,
}

/// Discovers and parses scripts from an embedded asset tree and the user
/// scripts directory. Problems with individual files are logged and
/// skipped — a single bad script never aborts the load.
pub struct Loader<'a> {
    assets: &'a dyn ScriptAssets,
}

impl<'a> Loader<'a> {
    pub fn new(assets: &'a dyn ScriptAssets) -> Self {
        Self { assets }
    }

    /// Load all built-in scripts, then everything from `user_dir` (if any).
    /// A missing user directory is not an error.
    pub fn load(&self, user_dir: Option<&Path>) -> LoadResult {
        let mut result = LoadResult::default();
        self.load_builtins(&mut result);
        if let Some(dir) = user_dir {
            self.load_user_scripts(dir, &mut result);
        }
        result
    }

    fn load_builtins(&self, result: &mut LoadResult) {
        for file in self.assets.files() {
            // lib/ holds @boop/ module code, not scripts.
            if file.path.starts_with(&format!("{LIB_DIR}/")) {
                continue;
            }
            if !file.path.ends_with(".js") {
                continue;
            }

            match parse_header(file.contents) {
                Ok(mut script) => {
                    script.source = ScriptSource::Builtin;
                    script.file_path = format!("embedded:{}", file.path);
                    result.scripts.push(script);
                    result.builtin_count += 1;
                }
                Err(err) => {
                    log(LogLevel::Warn, file.path, &format!("skipping: {err}"));
                    result.skipped_files.push(file.path.to_string());
                }
            }
        }
    }

    fn load_user_scripts(&self, dir: &Path, result: &mut LoadResult) {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                log(
                    LogLevel::Info,
                    "",
                    &format!("user scripts dir does not exist: {}", dir.display()),
                );
                return;
            }
            Err(err) => {
                log(
                    LogLevel::Warn,
                    "",
                    &format!("cannot read user scripts dir: {err}"),
                );
                return;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().into_owned();

            // No recursion; only immediate .js files count.
            if path.is_dir() || path.extension().and_then(|e| e.to_str()) != Some("js") {
                continue;
            }

            match std::fs::metadata(&path) {
                Ok(meta) if meta.len() > MAX_USER_SCRIPT_BYTES => {
                    log(
                        LogLevel::Warn,
                        &name,
                        &format!("skipping: file exceeds {MAX_USER_SCRIPT_BYTES} byte limit"),
                    );
                    result.skipped_files.push(name);
                    continue;
                }
                Ok(_) => {}
                Err(err) => {
                    log(LogLevel::Warn, &name, &format!("cannot stat user script: {err}"));
                    result.skipped_files.push(name);
                    continue;
                }
            }

            let contents = match std::fs::read_to_string(&path) {
                Ok(contents) => contents,
                Err(err) => {
                    log(LogLevel::Warn, &name, &format!("cannot read user script: {err}"));
                    result.skipped_files.push(name);
                    continue;
                }
            };

            match parse_header(&contents) {
                Ok(mut script) => {
                    script.source = ScriptSource::UserProvided;
                    script.file_path = path.to_string_lossy().into_owned();
                    result.scripts.push(script);
                    result.user_count += 1;
                }
                Err(err) => {
                    log(LogLevel::Warn, &name, &format!("skipping: {err}"));
                    result.skipped_files.push(name);
                }
            }
        }
    }
}

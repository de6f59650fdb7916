//! Sandboxed JavaScript execution for Boop scripts.
//!
//! # Architecture
//!
//! Every [`Executor::execute`] call builds a fresh QuickJS runtime, installs
//! the sandbox (poisoned globals, curated `require`, `btoa`/`atob`,
//! `console.log`), binds the `state` object, runs the script's `main(state)`
//! under an interrupt handler that enforces the timeout and the cancel
//! token, and projects the recorded mutations into one [`ExecutionResult`].
//! Nothing survives the call: no runtime pooling, no cross-invocation state.
//!
//! Scripts never touch host state directly — they record mutation intents on
//! the `state` object, and the shell applies the single projected mutation
//! to its editor buffer.

mod executor;
mod modules;
mod state;

pub use executor::Executor;
pub use state::ScriptState;

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

/// Cancel token for script execution.
/// Set to true to signal the script should stop; reported as a timeout.
pub type CancelToken = Arc<AtomicBool>;

/// Hard execution timeout applied when the input does not specify one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Which mutation (if any) a script requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MutationKind {
    /// Script made no changes.
    #[default]
    None,
    /// `state.fullText` was written — replace the entire document.
    ReplaceDoc,
    /// `state.text` was written — replace the selection (or the whole
    /// document when nothing is selected).
    ReplaceSelect,
    /// `state.insert()` was called — insert at the cursor.
    InsertAtCursor,
}

/// Everything the engine needs to run a single script.
#[derive(Debug, Clone)]
pub struct ExecutionInput {
    /// Full JS source text of the script.
    pub script_source: String,
    /// Display name, used in error messages and log entries.
    pub script_name: String,
    /// Current full editor content.
    pub full_text: String,
    /// Selected text; equals `full_text` when nothing is selected.
    pub selection_text: String,
    /// 0-based character offset of the selection start.
    pub selection_start: usize,
    /// 0-based character offset of the selection end.
    pub selection_end: usize,
    /// Hard execution timeout. Zero means [`DEFAULT_TIMEOUT`].
    pub timeout: Duration,
}

/// Structured outcome of one execution. The mutation payload fields are
/// only populated for the variant named by `mutation`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionResult {
    pub success: bool,
    pub mutation: MutationKind,
    /// Valid when `mutation == ReplaceDoc`.
    pub new_full_text: String,
    /// Valid when `mutation == ReplaceSelect`.
    pub new_text: String,
    /// Valid when `mutation == InsertAtCursor`.
    pub insert_text: String,
    /// Human-readable; populated when `success == false`.
    pub error_message: String,
    /// Set when the script called `postInfo()`; shown in the status bar.
    pub info_message: String,
    pub script_name: String,
    pub timed_out: bool,
}

impl ExecutionResult {
    pub(crate) fn failure(script_name: &str, message: impl Into<String>) -> Self {
        Self {
            success: false,
            script_name: script_name.to_string(),
            error_message: message.into(),
            ..Self::default()
        }
    }

    pub(crate) fn timeout_failure(script_name: &str, timeout: Duration) -> Self {
        Self {
            success: false,
            timed_out: true,
            script_name: script_name.to_string(),
            error_message: format!("Script execution timed out after {timeout:?}"),
            ..Self::default()
        }
    }
}

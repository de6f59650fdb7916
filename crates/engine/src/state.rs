//! The `state` object backing store and its write-semantics projection.

use crate::{ExecutionInput, ExecutionResult, MutationKind};

/// Host-side backing store for the `state` object passed to every script.
///
/// The JS bindings read and write these fields through accessors that set
/// the corresponding mutation flags; after `main()` returns, [`Self::into_result`]
/// applies the priority table:
///
/// 1. `postError()` called   → discard all mutations, report the error
/// 2. `state.text` written   → replace selection
/// 3. `state.fullText` written → replace full document
/// 4. `state.insert()` called → insert at cursor
/// 5. nothing written        → no change
///
/// Priority is not temporal: the flags say *what* was touched, the table
/// says *which* touch wins.
#[derive(Debug, Default)]
pub struct ScriptState {
    pub full_text: String,
    pub text: String,
    pub selection_start: usize,
    pub selection_end: usize,

    full_text_written: bool,
    text_written: bool,
    insert_pending: bool,
    insert_text: String,
    error_posted: bool,
    error_message: String,
    info_posted: bool,
    info_message: String,
}

impl ScriptState {
    pub fn new(input: &ExecutionInput) -> Self {
        Self {
            full_text: input.full_text.clone(),
            text: input.selection_text.clone(),
            selection_start: input.selection_start,
            selection_end: input.selection_end,
            ..Self::default()
        }
    }

    /// `state.fullText = …`
    pub fn set_full_text(&mut self, value: String) {
        self.full_text = value;
        self.full_text_written = true;
    }

    /// `state.text = …`
    pub fn set_text(&mut self, value: String) {
        self.text = value;
        self.text_written = true;
    }

    /// `state.insert(text)` — records the intent; the last call wins.
    pub fn insert(&mut self, text: String) {
        self.insert_text = text;
        self.insert_pending = true;
    }

    /// `state.postError(msg)` — only the first call's message is retained.
    pub fn post_error(&mut self, message: String) {
        if !self.error_posted {
            self.error_posted = true;
            self.error_message = message;
        }
    }

    /// `state.postInfo(msg)` — only the first call's message is retained.
    pub fn post_info(&mut self, message: String) {
        if !self.info_posted {
            self.info_posted = true;
            self.info_message = message;
        }
    }

    /// The first `postError` message, if any was posted.
    pub fn posted_error(&self) -> Option<&str> {
        self.error_posted.then_some(self.error_message.as_str())
    }

    /// Apply the priority table and produce the result the shell will use
    /// to update the editor.
    pub fn into_result(self, script_name: &str) -> ExecutionResult {
        let mut result = ExecutionResult {
            script_name: script_name.to_string(),
            ..ExecutionResult::default()
        };

        match (
            self.error_posted,
            self.text_written,
            self.full_text_written,
            self.insert_pending,
        ) {
            (true, ..) => {
                result.success = false;
                result.error_message = self.error_message;
                result.mutation = MutationKind::None;
                return result;
            }
            (false, true, _, _) => {
                result.mutation = MutationKind::ReplaceSelect;
                result.new_text = self.text;
            }
            (false, false, true, _) => {
                result.mutation = MutationKind::ReplaceDoc;
                result.new_full_text = self.full_text;
            }
            (false, false, false, true) => {
                result.mutation = MutationKind::InsertAtCursor;
                result.insert_text = self.insert_text;
            }
            (false, false, false, false) => {
                result.mutation = MutationKind::None;
            }
        }

        result.success = true;
        if self.info_posted {
            result.info_message = self.info_message;
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn state() -> ScriptState {
        ScriptState::new(&ExecutionInput {
            script_source: String::new(),
            script_name: "test".into(),
            full_text: "full".into(),
            selection_text: "sel".into(),
            selection_start: 0,
            selection_end: 3,
            timeout: Duration::from_secs(5),
        })
    }

    #[test]
    fn test_initial_values_mirror_input() {
        let s = state();
        assert_eq!(s.full_text, "full");
        assert_eq!(s.text, "sel");
        assert_eq!(s.selection_start, 0);
        assert_eq!(s.selection_end, 3);
    }

    #[test]
    fn test_no_writes_projects_none() {
        let result = state().into_result("test");
        assert!(result.success);
        assert_eq!(result.mutation, MutationKind::None);
        assert_eq!(result.new_text, "");
        assert_eq!(result.new_full_text, "");
        assert_eq!(result.insert_text, "");
    }

    #[test]
    fn test_text_write_projects_replace_select() {
        let mut s = state();
        s.set_text("SEL".into());
        let result = s.into_result("test");
        assert!(result.success);
        assert_eq!(result.mutation, MutationKind::ReplaceSelect);
        assert_eq!(result.new_text, "SEL");
    }

    #[test]
    fn test_full_text_write_projects_replace_doc() {
        let mut s = state();
        s.set_full_text("FULL".into());
        let result = s.into_result("test");
        assert_eq!(result.mutation, MutationKind::ReplaceDoc);
        assert_eq!(result.new_full_text, "FULL");
    }

    #[test]
    fn test_insert_projects_insert_at_cursor() {
        let mut s = state();
        s.insert("INS".into());
        let result = s.into_result("test");
        assert_eq!(result.mutation, MutationKind::InsertAtCursor);
        assert_eq!(result.insert_text, "INS");
    }

    #[test]
    fn test_last_write_wins_within_category() {
        let mut s = state();
        s.set_text("first".into());
        s.set_text("second".into());
        let result = s.into_result("test");
        assert_eq!(result.new_text, "second");

        let mut s = state();
        s.insert("a".into());
        s.insert("b".into());
        assert_eq!(s.into_result("test").insert_text, "b");
    }

    #[test]
    fn test_post_error_first_call_wins() {
        let mut s = state();
        s.post_error("first".into());
        s.post_error("second".into());
        let result = s.into_result("test");
        assert!(!result.success);
        assert_eq!(result.error_message, "first");
    }

    #[test]
    fn test_post_info_first_call_wins() {
        let mut s = state();
        s.post_info("first".into());
        s.post_info("second".into());
        let result = s.into_result("test");
        assert!(result.success);
        assert_eq!(result.info_message, "first");
    }

    #[test]
    fn test_info_survives_mutation() {
        let mut s = state();
        s.set_text("x".into());
        s.post_info("note".into());
        let result = s.into_result("test");
        assert_eq!(result.mutation, MutationKind::ReplaceSelect);
        assert_eq!(result.info_message, "note");
    }

    #[test]
    fn test_info_discarded_on_error() {
        let mut s = state();
        s.post_info("note".into());
        s.post_error("bad".into());
        let result = s.into_result("test");
        assert!(!result.success);
        assert_eq!(result.info_message, "");
    }

    /// The full 2⁴ grid over {error, text, fullText, insert}: the projected
    /// mutation must follow the priority table exactly.
    #[test]
    fn test_priority_table_exhaustive() {
        for bits in 0u8..16 {
            let error = bits & 0b1000 != 0;
            let text = bits & 0b0100 != 0;
            let full = bits & 0b0010 != 0;
            let insert = bits & 0b0001 != 0;

            let mut s = state();
            if error {
                s.post_error("err".into());
            }
            if text {
                s.set_text("t".into());
            }
            if full {
                s.set_full_text("f".into());
            }
            if insert {
                s.insert("i".into());
            }

            let expected = if error {
                MutationKind::None
            } else if text {
                MutationKind::ReplaceSelect
            } else if full {
                MutationKind::ReplaceDoc
            } else if insert {
                MutationKind::InsertAtCursor
            } else {
                MutationKind::None
            };

            let result = s.into_result("grid");
            assert_eq!(
                result.mutation, expected,
                "flags error={error} text={text} full={full} insert={insert}"
            );
            assert_eq!(result.success, !error, "success for bits {bits:04b}");

            // Failure implies no mutation payload at all.
            if !result.success {
                assert_eq!(result.mutation, MutationKind::None);
                assert_eq!(result.new_text, "");
                assert_eq!(result.new_full_text, "");
                assert_eq!(result.insert_text, "");
            }

            // Only the winning category's payload is populated.
            match result.mutation {
                MutationKind::None => {
                    assert_eq!(result.new_text, "");
                    assert_eq!(result.new_full_text, "");
                    assert_eq!(result.insert_text, "");
                }
                MutationKind::ReplaceSelect => {
                    assert_eq!(result.new_full_text, "");
                    assert_eq!(result.insert_text, "");
                }
                MutationKind::ReplaceDoc => {
                    assert_eq!(result.new_text, "");
                    assert_eq!(result.insert_text, "");
                }
                MutationKind::InsertAtCursor => {
                    assert_eq!(result.new_text, "");
                    assert_eq!(result.new_full_text, "");
                }
            }
        }
    }
}

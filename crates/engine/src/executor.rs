//! Per-call construction and execution of the sandboxed runtime.

use std::cell::RefCell;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rquickjs::convert::Coerced;
use rquickjs::function::{Opt, Rest};
use rquickjs::object::{Accessor, Property};
use rquickjs::{
    CatchResultExt, CaughtError, Context, Ctx, Exception, FromJs, Function, Object, Runtime,
    Undefined, Value,
};

use boopkit_logging::{log, LogLevel};

use crate::modules;
use crate::state::ScriptState;
use crate::{CancelToken, ExecutionInput, ExecutionResult, DEFAULT_TIMEOUT};

/// Globals that are overwritten with `undefined` before any user code runs.
///
/// Network, OS, and timer APIs are removed so scripts cannot communicate
/// outside the sandbox or outlive the call. `eval` is removed because it
/// executes strings with access to local scope. The `Function` constructor
/// stays: it only creates closures in global scope (no local variable
/// access) and several Boop-compatible libraries rely on it.
const POISONED_GLOBALS: &[&str] = &[
    "fetch",
    "XMLHttpRequest",
    "WebSocket",
    "process",
    "global",
    "Buffer",
    "setTimeout",
    "setInterval",
    "clearTimeout",
    "clearInterval",
    "eval",
];

/// Runs a single Boop script per call. Stateless: safe to share and to call
/// from multiple threads simultaneously — each call builds an independent
/// runtime.
#[derive(Debug, Default)]
pub struct Executor;

impl Executor {
    pub fn new() -> Self {
        Self
    }

    /// Run `input` to completion. Never panics; every failure comes back as
    /// a structured result.
    pub fn execute(&self, input: &ExecutionInput) -> ExecutionResult {
        self.execute_cancellable(input, None)
    }

    /// Same as [`Self::execute`], but stoppable from another thread via the
    /// cancel token. Cancellation is reported exactly like a timeout.
    pub fn execute_cancellable(
        &self,
        input: &ExecutionInput,
        cancel: Option<CancelToken>,
    ) -> ExecutionResult {
        match catch_unwind(AssertUnwindSafe(|| run(input, cancel))) {
            Ok(result) => result,
            Err(panic) => ExecutionResult::failure(
                &input.script_name,
                format!("internal engine error: {}", panic_message(panic.as_ref())),
            ),
        }
    }
}

fn run(input: &ExecutionInput, cancel: Option<CancelToken>) -> ExecutionResult {
    let timeout = if input.timeout.is_zero() {
        DEFAULT_TIMEOUT
    } else {
        input.timeout
    };

    let runtime = match Runtime::new() {
        Ok(runtime) => runtime,
        Err(err) => {
            return ExecutionResult::failure(
                &input.script_name,
                format!("internal engine error: {err}"),
            )
        }
    };
    let context = match Context::full(&runtime) {
        Ok(context) => context,
        Err(err) => {
            return ExecutionResult::failure(
                &input.script_name,
                format!("internal engine error: {err}"),
            )
        }
    };

    // Timeout and external cancellation share one flag: the periodic
    // interrupt callback checks both and QuickJS aborts the current job.
    // The handler dies with the runtime at the end of this call.
    let timed_out = Arc::new(AtomicBool::new(false));
    let deadline = Instant::now() + timeout;
    runtime.set_interrupt_handler(Some(Box::new({
        let timed_out = timed_out.clone();
        let cancel = cancel.clone();
        move || {
            let interrupted = cancel.as_ref().is_some_and(|c| c.load(Ordering::Relaxed))
                || Instant::now() >= deadline;
            if interrupted {
                timed_out.store(true, Ordering::Relaxed);
            }
            interrupted
        }
    })));

    let state = Rc::new(RefCell::new(ScriptState::new(input)));

    context.with(|ctx| {
        if let Err(err) = install_sandbox(&ctx, input, &state) {
            return ExecutionResult::failure(
                &input.script_name,
                format!("internal engine error: {err}"),
            );
        }

        // Evaluate the program: compiles the source and runs top-level code,
        // which must define main(). Syntax errors surface here.
        if let Err(caught) = ctx.eval::<(), _>(input.script_source.clone()).catch(&ctx) {
            return run_error(&ctx, caught, &state, &timed_out, timeout, input);
        }

        let main: Value = match ctx.globals().get("main") {
            Ok(value) => value,
            Err(_) => Value::new_undefined(ctx.clone()),
        };
        let Some(main_fn) = main.as_function() else {
            return ExecutionResult::failure(
                &input.script_name,
                "script does not define a top-level function main(state)",
            );
        };

        let state_value: Value = match ctx.globals().get("state") {
            Ok(value) => value,
            Err(err) => {
                return ExecutionResult::failure(
                    &input.script_name,
                    format!("internal engine error: {err}"),
                )
            }
        };
        if let Err(caught) = main_fn.call::<_, Value>((state_value,)).catch(&ctx) {
            return run_error(&ctx, caught, &state, &timed_out, timeout, input);
        }

        std::mem::take(&mut *state.borrow_mut()).into_result(&input.script_name)
    })
}

/// Map a failed evaluation to a structured result. Timeout wins over the
/// thrown error (the interrupt manifests as an opaque exception), then a
/// posted error, then the script's own exception message.
fn run_error<'js>(
    ctx: &Ctx<'js>,
    caught: CaughtError<'js>,
    state: &Rc<RefCell<ScriptState>>,
    timed_out: &AtomicBool,
    timeout: Duration,
    input: &ExecutionInput,
) -> ExecutionResult {
    if timed_out.load(Ordering::Relaxed) {
        return ExecutionResult::timeout_failure(&input.script_name, timeout);
    }
    if let Some(posted) = state.borrow().posted_error() {
        return ExecutionResult::failure(&input.script_name, posted);
    }
    ExecutionResult::failure(&input.script_name, caught_message(ctx, caught))
}

fn caught_message<'js>(ctx: &Ctx<'js>, caught: CaughtError<'js>) -> String {
    match caught {
        CaughtError::Exception(exception) => {
            let name: Option<String> = exception.get("name").ok();
            match (name, exception.message()) {
                (Some(name), Some(message)) => format!("{name}: {message}"),
                (None, Some(message)) => format!("Error: {message}"),
                (Some(name), None) => name,
                (None, None) => "unknown script error".to_string(),
            }
        }
        CaughtError::Value(value) => Coerced::<String>::from_js(ctx, value)
            .map(|coerced| coerced.0)
            .unwrap_or_else(|_| "unknown script error".to_string()),
        CaughtError::Error(err) => err.to_string(),
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

/// Poison prohibited globals, install the module registry and helper
/// globals, and bind the `state` object.
fn install_sandbox(
    ctx: &Ctx<'_>,
    input: &ExecutionInput,
    state: &Rc<RefCell<ScriptState>>,
) -> rquickjs::Result<()> {
    let globals = ctx.globals();

    for name in POISONED_GLOBALS {
        globals.set(*name, Undefined)?;
    }

    modules::install(ctx)?;
    install_base64(ctx)?;
    install_console(ctx, &input.script_name)?;
    bind_state(ctx, state)?;
    Ok(())
}

/// `btoa` / `atob` matching the browser API.
///
/// `btoa` input must be Latin-1: every code point ≤ U+00FF. Anything else
/// throws an InvalidCharacterError naming the offending code point, so
/// callers learn to pre-encode with encodeURIComponent. `atob` maps each
/// decoded byte back to one code point.
fn install_base64(ctx: &Ctx<'_>) -> rquickjs::Result<()> {
    let globals = ctx.globals();

    globals.set(
        "btoa",
        Function::new(
            ctx.clone(),
            |ctx: Ctx<'_>, text: Opt<Coerced<String>>| -> rquickjs::Result<String> {
                let Some(text) = text.0 else {
                    return Ok(String::new());
                };
                let mut bytes = Vec::with_capacity(text.0.len());
                for ch in text.0.chars() {
                    let code_point = ch as u32;
                    if code_point > 0xFF {
                        return Err(Exception::throw_message(
                            &ctx,
                            &format!(
                                "InvalidCharacterError: btoa received a character (U+{code_point:04X}) \
                                 outside the Latin-1 range; encode to UTF-8 first with encodeURIComponent"
                            ),
                        ));
                    }
                    bytes.push(code_point as u8);
                }
                Ok(BASE64.encode(bytes))
            },
        )?,
    )?;

    globals.set(
        "atob",
        Function::new(
            ctx.clone(),
            |ctx: Ctx<'_>, text: Opt<Coerced<String>>| -> rquickjs::Result<String> {
                let Some(text) = text.0 else {
                    return Ok(String::new());
                };
                let decoded = BASE64
                    .decode(text.0.as_bytes())
                    .map_err(|e| Exception::throw_message(&ctx, &format!("atob: {e}")))?;
                Ok(decoded.into_iter().map(|b| b as char).collect())
            },
        )?,
    )?;

    Ok(())
}

/// `console.log` forwards a space-joined stringification of its arguments
/// to the log sink at INFO level, tagged with the script name.
fn install_console(ctx: &Ctx<'_>, script_name: &str) -> rquickjs::Result<()> {
    let console = Object::new(ctx.clone())?;
    let script_name = script_name.to_string();
    console.set(
        "log",
        Function::new(ctx.clone(), move |parts: Rest<Coerced<String>>| {
            let line = parts
                .0
                .iter()
                .map(|part| part.0.as_str())
                .collect::<Vec<_>>()
                .join(" ");
            log(LogLevel::Info, &script_name, &line);
        })?,
    )?;
    ctx.globals().set("console", console)?;
    Ok(())
}

/// Expose the `state` object with accessors that drive the mutation flags.
/// `selection` and its offsets are defined non-writable, so script
/// assignments to them are silently discarded.
fn bind_state(ctx: &Ctx<'_>, state: &Rc<RefCell<ScriptState>>) -> rquickjs::Result<()> {
    let state_obj = Object::new(ctx.clone())?;

    state_obj.prop(
        "fullText",
        Accessor::new(
            {
                let state = state.clone();
                move || state.borrow().full_text.clone()
            },
            {
                let state = state.clone();
                move |value: Coerced<String>| state.borrow_mut().set_full_text(value.0)
            },
        )
        .enumerable(),
    )?;

    state_obj.prop(
        "text",
        Accessor::new(
            {
                let state = state.clone();
                move || state.borrow().text.clone()
            },
            {
                let state = state.clone();
                move |value: Coerced<String>| state.borrow_mut().set_text(value.0)
            },
        )
        .enumerable(),
    )?;

    let selection = Object::new(ctx.clone())?;
    selection.prop(
        "start",
        Property::from(state.borrow().selection_start).enumerable(),
    )?;
    selection.prop(
        "end",
        Property::from(state.borrow().selection_end).enumerable(),
    )?;
    state_obj.prop("selection", Property::from(selection).enumerable())?;

    state_obj.set(
        "insert",
        Function::new(ctx.clone(), {
            let state = state.clone();
            move |text: Opt<Coerced<String>>| {
                if let Some(text) = text.0 {
                    state.borrow_mut().insert(text.0);
                }
            }
        })?,
    )?;

    state_obj.set(
        "postError",
        Function::new(ctx.clone(), {
            let state = state.clone();
            move |message: Opt<Coerced<String>>| {
                state
                    .borrow_mut()
                    .post_error(message.0.map(|m| m.0).unwrap_or_default());
            }
        })?,
    )?;

    state_obj.set(
        "postInfo",
        Function::new(ctx.clone(), {
            let state = state.clone();
            move |message: Opt<Coerced<String>>| {
                state
                    .borrow_mut()
                    .post_info(message.0.map(|m| m.0).unwrap_or_default());
            }
        })?,
    )?;

    ctx.globals().set("state", state_obj)?;
    Ok(())
}

//! Request Preparer, OAuth wiring, and the per-send Dispatcher (spec §4.3, §4.4).
//!
//! `preparer` turns a `RequestDescriptor` plus a resolved variable chain into
//! a wire-ready `PreparedCall`. `script` defines the scripting collaborator
//! seam. `dispatcher` is the state machine that actually drives a prepared
//! call through auth, the right transport, and post-processing.

pub mod dispatcher;
pub mod preparer;
pub mod script;

pub use dispatcher::{DispatchOutcome, Dispatcher, ExecutionContext};
pub use preparer::{build_from_line, expand_template, prepare, PreparedCall, PreparedRequest};
pub use script::{script_error_as_test, NullScriptRunner, ScriptResponseView, ScriptRunner};

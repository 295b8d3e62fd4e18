//! The structuring pass trait and the per-method state passes share.

use crate::{
    compiler::{DecompilerComment, DecompilerComments, EventBuilder, EventKind, EventLog},
    config::DecompilerConfig,
    ir::{StatementId, StatementList},
};

/// Per-method state handed to every pass.
///
/// Passes record transformation events through [`PassContext::record`] and attach comments
/// through [`PassContext::comment`]. Nothing here outlives the method.
pub struct PassContext<'a> {
    /// Name of the method being structured.
    pub method: &'a str,
    /// The active configuration.
    pub config: &'a DecompilerConfig,
    /// The method's event log.
    pub events: &'a EventLog,
    /// The method's comments.
    pub comments: &'a mut DecompilerComments,
}

impl<'a> PassContext<'a> {
    /// Creates a context for one method.
    pub fn new(
        method: &'a str,
        config: &'a DecompilerConfig,
        events: &'a EventLog,
        comments: &'a mut DecompilerComments,
    ) -> Self {
        Self {
            method,
            config,
            events,
            comments,
        }
    }

    /// Starts an event about statement `at` of `list`, tagged with the method and `pass`.
    pub fn record(
        &self,
        kind: EventKind,
        pass: &str,
        list: &StatementList,
        at: StatementId,
    ) -> EventBuilder<'a> {
        let location = usize::try_from(list[at].offset).unwrap_or(0);
        self.events
            .record(kind)
            .at(self.method, location)
            .pass(pass)
    }

    /// Attaches `comment` to the method. Returns `true` if it was not attached before.
    pub fn comment(&mut self, comment: DecompilerComment) -> bool {
        self.comments.add(comment)
    }
}

/// A structural rewrite over one method's statement list.
///
/// Passes are total: failing to recognise a pattern leaves the list unchanged and is never an
/// error. All passes must be thread-safe (Send + Sync) because one pipeline is shared by every
/// method of a batch.
///
/// # Pipeline Integration
///
/// Passes don't declare their own position. [`crate::compiler::Pipeline`] runs them in a fixed
/// order and renumbers the list after every pass that reports a change, so a pass may leave
/// tombstones and stale positional indices behind.
pub trait StructuringPass: Send + Sync {
    /// Unique name for logging and debugging.
    fn name(&self) -> &'static str;

    /// Should this pass run under `config`?
    ///
    /// Override for recognisers that can be switched off.
    fn should_run(&self, _config: &DecompilerConfig) -> bool {
        true
    }

    /// Runs the pass over `list`.
    ///
    /// Returns `true` if the list was changed.
    fn run(&self, list: &mut StatementList, ctx: &mut PassContext<'_>) -> bool;

    /// Get a description of what this pass does.
    fn description(&self) -> &'static str {
        "No description available"
    }
}

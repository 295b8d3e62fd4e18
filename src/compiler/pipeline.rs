//! The fixed-order structuring pipeline.
//!
//! Unlike a fixpoint scheduler, the pipeline runs every pass once, in the order below. Passes
//! that must run more than once (pointless jumps, breaks, condensing) appear more than once.
//!
//! ```text
//!  0  ReplaceRawSwitches
//!  1  Renumber
//!  2  RemovePointlessJumps
//!  3  SsaIdentifiers
//!  4  CondenseAssignments        condense, construction, condense
//!  5  CollapseAssignments
//!  6  CondenseConditionals
//!  7  SimplifyConditionals
//!  8  RewriteNegativeJumps       with the optional try back-edge heuristic
//!  9  IdentifyLoops
//! 10  RewriteBreaks
//! 11  RewriteForLoops
//! 12  IdentifyCatchBlocks, RemoveSynchronizedCatches
//! 13  IdentifyConditionals
//! 14  RemoveNops, RemovePointlessJumps, RewriteBreaks
//! 15  RecogniseIteration
//! 16  IdentifySynchronized
//! 17  RemoveNops
//! ```

use crate::{
    compiler::{
        pass::{PassContext, StructuringPass},
        passes::{
            CollapseAssignmentsPass, CondenseAssignmentsPass, CondenseConditionalsPass,
            IdentifyCatchBlocksPass, IdentifyConditionalsPass, IdentifyLoopsPass,
            IdentifySynchronizedPass, RecogniseIterationPass, RemoveNopsPass,
            RemovePointlessJumpsPass, RemoveSynchronizedCatchesPass, RenumberPass,
            ReplaceRawSwitchesPass, RewriteBreaksPass, RewriteForLoopsPass,
            RewriteNegativeJumpsPass, SimplifyConditionalsPass, SsaIdentifiersPass,
        },
        EventKind,
    },
    ir::StatementList,
};

/// An ordered list of structuring passes.
pub struct Pipeline {
    passes: Vec<Box<dyn StructuringPass>>,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::standard()
    }
}

impl Pipeline {
    /// Creates an empty pipeline.
    #[must_use]
    pub fn empty() -> Self {
        Self { passes: Vec::new() }
    }

    /// The standard pass order.
    #[must_use]
    pub fn standard() -> Self {
        let mut pipeline = Self::empty();
        pipeline
            .add(ReplaceRawSwitchesPass::new())
            .add(RenumberPass::new())
            .add(RemovePointlessJumpsPass::new())
            .add(SsaIdentifiersPass::new())
            .add(CondenseAssignmentsPass::new())
            .add(CollapseAssignmentsPass::new())
            .add(CondenseConditionalsPass::new())
            .add(SimplifyConditionalsPass::new())
            .add(RewriteNegativeJumpsPass::new())
            .add(IdentifyLoopsPass::new())
            .add(RewriteBreaksPass::new())
            .add(RewriteForLoopsPass::new())
            .add(IdentifyCatchBlocksPass::new())
            .add(RemoveSynchronizedCatchesPass::new())
            .add(IdentifyConditionalsPass::new())
            .add(RemoveNopsPass::new())
            .add(RemovePointlessJumpsPass::new())
            .add(RewriteBreaksPass::new())
            .add(RecogniseIterationPass::new())
            .add(IdentifySynchronizedPass::new())
            .add(RemoveNopsPass::new());
        pipeline
    }

    /// Appends a pass.
    pub fn add(&mut self, pass: impl StructuringPass + 'static) -> &mut Self {
        self.passes.push(Box::new(pass));
        self
    }

    /// Truncates the pipeline after the first pass named `name`.
    ///
    /// Useful for inspecting the statement list part way through structuring. An unknown name
    /// leaves the pipeline unchanged.
    #[must_use]
    pub fn until(mut self, name: &str) -> Self {
        if let Some(position) = self.passes.iter().position(|pass| pass.name() == name) {
            self.passes.truncate(position + 1);
        }
        self
    }

    /// Names of the passes, in order.
    pub fn pass_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.passes.iter().map(|pass| pass.name())
    }

    /// Number of passes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.passes.len()
    }

    /// Returns `true` if the pipeline has no passes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    /// Runs every enabled pass once, in order.
    ///
    /// Returns `true` if any pass changed the list.
    pub fn run(&self, list: &mut StatementList, ctx: &mut PassContext<'_>) -> bool {
        let mut any_changed = false;
        list.renumber();

        for pass in &self.passes {
            if !pass.should_run(ctx.config) {
                continue;
            }

            if ctx.config.trace_passes {
                ctx.events
                    .record(EventKind::PassStarted)
                    .method(ctx.method)
                    .pass(pass.name())
                    .message(format!("{} ({} statements)", pass.description(), list.len()));
            }

            let changed = pass.run(list, ctx);
            if changed {
                list.renumber();
                any_changed = true;
            }

            if ctx.config.trace_passes {
                ctx.events
                    .record(EventKind::PassCompleted)
                    .method(ctx.method)
                    .pass(pass.name())
                    .message(if changed { "changed" } else { "unchanged" });
            }
        }

        any_changed
    }
}

//! Decompiler configuration
//!
//! This module provides the options consulted by the structuring pipeline. Every optional
//! recogniser can be switched off individually; passes that are required for correctness
//! (renumbering, SSA identifiers, condensing, loop identification) always run.

/// Configuration for the structuring pipeline
///
/// Passes read it through [`crate::compiler::StructuringPass::should_run`]; a disabled
/// recogniser leaves the corresponding pattern unstructured, which is never an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct DecompilerConfig {
    /// Turn raw table and lookup switches into structured `switch` blocks
    pub recognise_switches: bool,

    /// Build if-blocks and if/else from forward conditional jumps
    /// Also gates merging of chained tests into short-circuit conditions
    pub recognise_conditionals: bool,

    /// Rewrite counted while loops as `for (init; cond; update)`
    pub recognise_for_loops: bool,

    /// Rewrite javac's array and iterator loops as for-each
    pub recognise_for_each: bool,

    /// Delete the catch-all handlers javac emits around `monitorexit`
    /// Records the "Enabled unnecessary exception pruning" comment when it fires
    pub prune_synchronized_catches: bool,

    /// Pair `monitorenter`/`monitorexit` into `synchronized` blocks
    pub recognise_synchronized: bool,

    /// Remove unconditional back jumps from a try body to its own catch header (default: true)
    /// May change behaviour; records a warning comment when it fires
    pub remove_try_back_edges: bool,

    /// Maximum number of condense/construction/condense rounds (default: 4)
    pub max_condense_rounds: usize,

    /// Record `PassStarted`/`PassCompleted` events for every pass
    pub trace_passes: bool,
}

impl Default for DecompilerConfig {
    fn default() -> Self {
        Self {
            recognise_switches: true,
            recognise_conditionals: true,
            recognise_for_loops: true,
            recognise_for_each: true,
            prune_synchronized_catches: true,
            recognise_synchronized: true,
            remove_try_back_edges: true,
            max_condense_rounds: 4,
            trace_passes: false,
        }
    }
}

impl DecompilerConfig {
    /// Creates a configuration that only runs the mandatory passes
    ///
    /// Loops are still identified and jumps still become breaks and continues; everything
    /// else is left as residual jumps. Useful for inspecting the raw statement list.
    #[must_use]
    pub fn minimal() -> Self {
        Self {
            recognise_switches: false,
            recognise_conditionals: false,
            recognise_for_loops: false,
            recognise_for_each: false,
            prune_synchronized_catches: false,
            recognise_synchronized: false,
            remove_try_back_edges: false,
            max_condense_rounds: 1,
            trace_passes: false,
        }
    }

    /// Creates a configuration with every recogniser and heuristic enabled and more condense
    /// rounds
    #[must_use]
    pub fn aggressive() -> Self {
        Self {
            remove_try_back_edges: true,
            max_condense_rounds: 8,
            ..Self::default()
        }
    }

    /// Returns this configuration with pass tracing switched on or off
    #[must_use]
    pub fn with_tracing(mut self, trace_passes: bool) -> Self {
        self.trace_passes = trace_passes;
        self
    }
}

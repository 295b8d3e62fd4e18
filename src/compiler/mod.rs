//! The structural rewrite pipeline.
//!
//! This module turns the flat, jump-linked statement list produced by
//! [`crate::analysis`] into one whose control flow is expressed through block headers:
//!
//! - [`crate::analysis`] - decoding, graph, stack simulation, lowering, SSA
//! - [`compiler`](self) - structuring passes over the statement list
//! - [`crate::structured`] - assembly of the final nested tree
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                      Structuring Pipeline                        │
//! ├──────────────────────────────────────────────────────────────────┤
//! │                                                                  │
//! │  Pipeline                    Fixed pass order, run once          │
//! │    └─ renumber after every pass that reports a change            │
//! │                                                                  │
//! │  StructuringPass trait       Interface for all passes            │
//! │    ├─ should_run()            Consults DecompilerConfig          │
//! │    └─ run()                   Total rewrite of one method        │
//! │                                                                  │
//! │  Passes                                                          │
//! │    ├─ Jumps: pointless jumps, negative jumps, breaks, no-ops     │
//! │    ├─ Values: SSA identifiers, condensing, collapsing            │
//! │    ├─ Conditions: condense, simplify, if/else blocks             │
//! │    └─ Blocks: switches, loops, fors, catches, for-each, monitors │
//! │                                                                  │
//! │  EventLog                    Per-method transformation trace     │
//! │  DecompilerComments          Per-method annotations              │
//! │                                                                  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```

mod comments;
mod events;
mod pass;
mod passes;
mod pipeline;

pub use comments::{DecompilerComment, DecompilerComments};
pub use events::{Event, EventBuilder, EventKind, EventLog};
pub use pass::{PassContext, StructuringPass};
pub use passes::{
    CollapseAssignmentsPass, CondenseAssignmentsPass, CondenseConditionalsPass,
    IdentifyCatchBlocksPass, IdentifyConditionalsPass, IdentifyLoopsPass,
    IdentifySynchronizedPass, RecogniseIterationPass, RemoveNopsPass, RemovePointlessJumpsPass,
    RemoveSynchronizedCatchesPass, RenumberPass, ReplaceRawSwitchesPass, RewriteBreaksPass,
    RewriteForLoopsPass, RewriteNegativeJumpsPass, SimplifyConditionalsPass, SsaIdentifiersPass,
};
pub use pipeline::Pipeline;

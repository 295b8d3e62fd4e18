//! Per-method analysis: from decoded instructions to versioned statements.
//!
//! The stages run in order, each consuming the previous stage's output:
//!
//! - [`graph`] - The instruction graph, one node per decoded instruction plus exception markers
//! - [`exceptions`] - Try/catch marker insertion from the exception table
//! - [`stack`] - Operand stack simulation and producer/consumer linking
//! - [`lowering`] - Lowering of graph nodes into the statement IR
//! - [`ssa`] - SSA versioning of locals and join placement
//!
//! [`blocks`] holds the block identifiers shared by all stages and by the structuring passes.
//!
//! # Usage
//!
//! ```rust
//! use jvmscope::analysis::{simulate_stack, InstructionGraph};
//! use jvmscope::assembly::{decode_code, InstructionAssembler};
//! use jvmscope::metadata::constants::ConstantPoolMap;
//!
//! let mut asm = InstructionAssembler::new();
//! asm.iload(0)?.iconst(1)?.iadd()?.ireturn()?;
//! let (code, _) = asm.finish()?;
//!
//! let mut graph = InstructionGraph::build(decode_code(&code, code.len())?)?;
//! let entries = simulate_stack(&mut graph, &ConstantPoolMap::new())?;
//! assert_eq!(entries.len(), 3);
//! # Ok::<(), jvmscope::Error>(())
//! ```

pub mod blocks;
pub mod exceptions;
pub mod graph;
pub mod lowering;
pub mod ssa;
pub mod stack;

pub use blocks::{BlockFactory, BlockIdentifier, BlockKind};
pub use exceptions::{insert_exception_regions, ExceptionHandler, ExceptionRegions, TryRegion};
pub use graph::{CatchType, GraphNode, InstructionGraph, NodeKind};
pub use lowering::{lower_graph, LoweredMethod};
pub use ssa::{assign_versions, ssa_graph};
pub use stack::{simulate_stack, NodeStack, StackDelta, StackEntries, StackEntryId};

//! Instruction-level control-flow graph.
//!
//! [`InstructionGraph`] is an index arena with one node per decoded instruction (the sentinel
//! included) plus the exception markers inserted later by
//! [`crate::analysis::insert_exception_regions`]. Instruction `i` of the decoded list is always
//! node `i`; markers are appended after the instructions and placed into the positional order
//! explicitly.
//!
//! # Edge ordering
//!
//! Successor lists are ordered, and lowering relies on the order:
//!
//! | Node                | Successors                    |
//! |---------------------|-------------------------------|
//! | sequential          | `[next]`                      |
//! | conditional branch  | `[fallthrough, taken]`        |
//! | switch              | `[default, case targets...]`  |
//! | return / athrow     | `[]`                          |
//! | try-start           | `[head, catch-starts...]`     |
//! | catch-start         | `[handler]`                   |
//!
//! Predecessor sets mirror the successor lists exactly, see [`edges_are_symmetric`].
//!
//! [`edges_are_symmetric`]: crate::utils::graph::edges_are_symmetric

use std::{collections::BTreeSet, fmt, ops::Index};

use crate::{
    analysis::{blocks::BlockIdentifier, stack::NodeStack},
    assembly::{DecodedCode, FlowType, Instruction, OffsetTable},
    utils::graph::{GraphBase, NodeId, Predecessors, RootedGraph, Successors},
    Error, Result,
};

/// The exception types a handler catches.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CatchType {
    /// A `finally`-style catch-all entry.
    Any,
    /// A specific class, as an internal name.
    Class(String),
}

impl CatchType {
    /// Internal name of the caught class; `java/lang/Throwable` for catch-all.
    #[must_use]
    pub fn internal_name(&self) -> &str {
        match self {
            CatchType::Any => "java/lang/Throwable",
            CatchType::Class(name) => name,
        }
    }
}

impl fmt::Display for CatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.internal_name().replace('/', "."))
    }
}

/// Payload of a graph node.
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// A decoded instruction.
    Instruction(Instruction),
    /// Opens the protected range of a try block.
    TryStart {
        /// The try block identifier; carried by every protected node.
        block: BlockIdentifier,
    },
    /// Entry of an exception handler.
    CatchStart {
        /// The try block this handler belongs to.
        try_block: BlockIdentifier,
        /// Identifier for the handler body.
        block: BlockIdentifier,
        /// Caught types, in exception-table order.
        catch_types: Vec<CatchType>,
    },
}

/// One node of the [`InstructionGraph`].
#[derive(Debug, Clone)]
pub struct GraphNode {
    /// Instruction or marker.
    pub kind: NodeKind,
    /// Ordered successor edges.
    pub successors: Vec<NodeId>,
    /// Predecessor edges.
    pub predecessors: BTreeSet<NodeId>,
    /// Try blocks whose protected range contains this node.
    pub blocks: BTreeSet<BlockIdentifier>,
    /// Index of the instruction this node is positioned at. Markers sit just before it.
    pub anchor: usize,
    /// Stack effect, filled in by [`crate::analysis::simulate_stack`]. `None` when unreachable.
    pub stack: Option<NodeStack>,
}

impl GraphNode {
    fn new(kind: NodeKind, anchor: usize) -> Self {
        GraphNode {
            kind,
            successors: Vec::new(),
            predecessors: BTreeSet::new(),
            blocks: BTreeSet::new(),
            anchor,
            stack: None,
        }
    }

    /// The wrapped instruction, if this is not a marker.
    #[must_use]
    pub fn instruction(&self) -> Option<&Instruction> {
        match &self.kind {
            NodeKind::Instruction(instruction) => Some(instruction),
            _ => None,
        }
    }

    /// Returns `true` for try-start and catch-start markers.
    #[must_use]
    pub fn is_marker(&self) -> bool {
        !matches!(self.kind, NodeKind::Instruction(_))
    }

    /// Bytecode offset of the node; markers report the offset of their anchor instruction.
    #[must_use]
    pub fn offset(&self, graph: &InstructionGraph) -> i32 {
        match &self.kind {
            NodeKind::Instruction(instruction) => instruction.offset,
            _ => graph.offsets().offset_of(self.anchor).unwrap_or(-1),
        }
    }
}

/// Control-flow graph over decoded instructions.
#[derive(Debug, Clone)]
pub struct InstructionGraph {
    nodes: Vec<GraphNode>,
    order: Vec<NodeId>,
    instruction_count: usize,
    offsets: OffsetTable,
    code_length: usize,
}

impl InstructionGraph {
    /// Builds the graph from decoded code.
    ///
    /// # Errors
    /// Returns [`Error::NotSupported`] for `jsr`/`ret`, and [`Error::MalformedBytecode`] for a
    /// branch target that is not an instruction boundary or for control falling off the end of
    /// the code.
    pub fn build(decoded: DecodedCode) -> Result<Self> {
        let DecodedCode {
            instructions,
            offsets,
            code_length,
        } = decoded;

        let instruction_count = instructions.len();
        let mut edges = Vec::with_capacity(instruction_count);

        for (index, instruction) in instructions.iter().enumerate() {
            if matches!(
                instruction.flow_type,
                FlowType::Subroutine | FlowType::SubroutineReturn
            ) {
                return Err(Error::NotSupported(format!(
                    "{} subroutine at offset {}",
                    instruction.mnemonic, instruction.offset
                )));
            }

            let mut successors = Vec::with_capacity(instruction.branch_targets.len() + 1);
            if instruction.falls_through() {
                if index + 1 >= instruction_count {
                    return Err(malformed_error!(
                        "Control falls off the end of the code after offset {}",
                        instruction.offset
                    ));
                }
                successors.push(NodeId::new(index + 1));
            }
            for target in &instruction.branch_targets {
                successors.push(NodeId::new(offsets.resolve(*target)?));
            }
            edges.push(successors);
        }

        let mut graph = InstructionGraph {
            nodes: instructions
                .into_iter()
                .enumerate()
                .map(|(index, instruction)| {
                    GraphNode::new(NodeKind::Instruction(instruction), index)
                })
                .collect(),
            order: (0..instruction_count).map(NodeId::new).collect(),
            instruction_count,
            offsets,
            code_length,
        };

        for (from, successors) in edges.into_iter().enumerate() {
            for to in successors {
                graph.add_edge(NodeId::new(from), to);
            }
        }

        Ok(graph)
    }

    /// Returns the node, or `None` if `id` is out of range.
    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&GraphNode> {
        self.nodes.get(id.index())
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut GraphNode {
        &mut self.nodes[id.index()]
    }

    /// Node of instruction `index`.
    #[must_use]
    pub fn instruction_node(&self, index: usize) -> NodeId {
        NodeId::new(index)
    }

    /// Number of decoded instructions, sentinel included.
    #[must_use]
    pub fn instruction_count(&self) -> usize {
        self.instruction_count
    }

    /// The decoder's offset table.
    #[must_use]
    pub fn offsets(&self) -> &OffsetTable {
        &self.offsets
    }

    /// The declared code length.
    #[must_use]
    pub fn code_length(&self) -> usize {
        self.code_length
    }

    /// Nodes in positional order.
    #[must_use]
    pub fn order(&self) -> &[NodeId] {
        &self.order
    }

    pub(crate) fn set_order(&mut self, order: Vec<NodeId>) {
        self.order = order;
    }

    /// Appends an unlinked marker node anchored before instruction `anchor`.
    pub(crate) fn add_marker(&mut self, kind: NodeKind, anchor: usize) -> NodeId {
        let id = NodeId::new(self.nodes.len());
        self.nodes.push(GraphNode::new(kind, anchor));
        id
    }

    /// Adds the edge `from -> to`, keeping both directions in sync.
    pub(crate) fn add_edge(&mut self, from: NodeId, to: NodeId) {
        self.nodes[from.index()].successors.push(to);
        self.nodes[to.index()].predecessors.insert(from);
    }

    /// Replaces every edge `from -> old` with `from -> new`.
    pub(crate) fn redirect_edge(&mut self, from: NodeId, old: NodeId, new: NodeId) {
        for successor in &mut self.nodes[from.index()].successors {
            if *successor == old {
                *successor = new;
            }
        }
        self.nodes[old.index()].predecessors.remove(&from);
        self.nodes[new.index()].predecessors.insert(from);
    }

    /// Iterates over all nodes with their ids, in arena order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &GraphNode)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(index, node)| (NodeId::new(index), node))
    }
}

impl Index<NodeId> for InstructionGraph {
    type Output = GraphNode;

    fn index(&self, id: NodeId) -> &GraphNode {
        &self.nodes[id.index()]
    }
}

impl GraphBase for InstructionGraph {
    fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn node_ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len()).map(NodeId::new)
    }
}

impl Successors for InstructionGraph {
    fn successors(&self, node: NodeId) -> impl Iterator<Item = NodeId> {
        self.nodes[node.index()].successors.iter().copied()
    }
}

impl Predecessors for InstructionGraph {
    fn predecessors(&self, node: NodeId) -> impl Iterator<Item = NodeId> {
        self.nodes[node.index()].predecessors.iter().copied()
    }
}

impl RootedGraph for InstructionGraph {
    fn entry(&self) -> NodeId {
        NodeId::new(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        assembly::{decode_code, opcodes, InstructionAssembler},
        utils::graph::edges_are_symmetric,
    };

    fn graph_of(asm: InstructionAssembler) -> Result<InstructionGraph> {
        let (code, _) = asm.finish()?;
        InstructionGraph::build(decode_code(&code, code.len())?)
    }

    #[test]
    fn test_conditional_successor_order() -> Result<()> {
        let mut asm = InstructionAssembler::new();
        asm.iload(1)?
            .ifeq("zero")?
            .iconst(1)?
            .ireturn()?
            .label("zero")?
            .iconst(0)?
            .ireturn()?;
        let graph = graph_of(asm)?;

        // sentinel, iload, ifeq, iconst_1, ireturn, iconst_0, ireturn
        assert_eq!(graph.node_count(), 7);
        assert_eq!(graph[NodeId::new(0)].successors, vec![NodeId::new(1)]);
        assert_eq!(
            graph[NodeId::new(2)].successors,
            vec![NodeId::new(3), NodeId::new(5)]
        );
        assert!(graph[NodeId::new(4)].successors.is_empty());
        assert!(edges_are_symmetric(&graph));
        Ok(())
    }

    #[test]
    fn test_switch_lists_default_first() -> Result<()> {
        let mut asm = InstructionAssembler::new();
        asm.iload(0)?
            .tableswitch(0, "default", &["a", "b"])?
            .label("a")?
            .iconst(1)?
            .ireturn()?
            .label("b")?
            .iconst(2)?
            .ireturn()?
            .label("default")?
            .iconst(0)?
            .ireturn()?;
        let graph = graph_of(asm)?;

        assert_eq!(
            graph[NodeId::new(2)].successors,
            vec![NodeId::new(7), NodeId::new(3), NodeId::new(5)]
        );
        assert!(edges_are_symmetric(&graph));
        Ok(())
    }

    #[test]
    fn test_misaligned_target_is_malformed() {
        // goto +1 lands inside its own operand bytes
        let code = vec![opcodes::GOTO, 0x00, 0x01, opcodes::RETURN];
        let result = decode_code(&code, code.len()).and_then(InstructionGraph::build);
        assert!(matches!(result, Err(Error::MalformedBytecode { .. })));
    }

    #[test]
    fn test_fallthrough_past_end_is_malformed() {
        let code = vec![opcodes::ICONST_0, opcodes::POP];
        let result = decode_code(&code, code.len()).and_then(InstructionGraph::build);
        assert!(matches!(result, Err(Error::MalformedBytecode { .. })));
    }

    #[test]
    fn test_jsr_is_not_supported() {
        let code = vec![opcodes::JSR, 0x00, 0x03, opcodes::RETURN];
        let result = decode_code(&code, code.len()).and_then(InstructionGraph::build);
        assert!(matches!(result, Err(Error::NotSupported(_))));
    }

    #[test]
    fn test_catch_type_display() {
        assert_eq!(CatchType::Any.to_string(), "java.lang.Throwable");
        assert_eq!(
            CatchType::Class("java/io/IOException".into()).to_string(),
            "java.io.IOException"
        );
    }
}

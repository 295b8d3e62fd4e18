//! Operand stack simulation.
//!
//! A forward abstract interpretation over the [`InstructionGraph`]. Every value pushed by an
//! instruction becomes a *stack entry*; entries that meet at a merge point are unified with a
//! union-find, so a value produced on two paths (the arms of a ternary, say) is one entry with
//! two producers. After simulation each reachable node carries a [`NodeStack`] naming the
//! entries it consumed and produced, which is all lowering needs to turn stack traffic into
//! explicit reads and assignments.
//!
//! Stack deltas come from [`stack_delta`], a pure function of the instruction's [`OpKind`], the
//! categories on the current stack (for the `dup2`/`pop2` family) and the constant pool (for
//! field, method and `ldc` operands).

use std::collections::{BTreeSet, VecDeque};

use crate::{
    analysis::graph::{InstructionGraph, NodeKind},
    assembly::{ConstValue, Instruction, InvokeKind, OpKind, Operand},
    metadata::{
        constants::{ConstantEntry, ConstantPool},
        descriptor::{JavaType, MethodDescriptor, StackType},
    },
    utils::graph::{GraphBase, NodeId, RootedGraph},
    Result,
};

/// Index of a stack entry in [`StackEntries`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StackEntryId(usize);

impl StackEntryId {
    /// Raw index.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

/// Union-find over all stack entries of a method.
#[derive(Debug, Clone, Default)]
pub struct StackEntries {
    parent: Vec<usize>,
    types: Vec<StackType>,
    producers: Vec<BTreeSet<NodeId>>,
    consumers: Vec<BTreeSet<NodeId>>,
}

impl StackEntries {
    /// Creates an empty set of entries.
    #[must_use]
    pub fn new() -> Self {
        StackEntries::default()
    }

    /// Number of entries ever created, unified ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.parent.len()
    }

    /// Returns `true` if no entry was created.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    /// Creates a new entry of type `ty` produced by `producer`.
    pub fn fresh(&mut self, ty: StackType, producer: NodeId) -> StackEntryId {
        let id = self.parent.len();
        self.parent.push(id);
        self.types.push(ty);
        self.producers.push(BTreeSet::from([producer]));
        self.consumers.push(BTreeSet::new());
        StackEntryId(id)
    }

    /// Representative of the entry's class.
    #[must_use]
    pub fn find(&self, entry: StackEntryId) -> StackEntryId {
        let mut current = entry.0;
        while self.parent[current] != current {
            current = self.parent[current];
        }
        StackEntryId(current)
    }

    /// Merges the classes of `a` and `b`. The smaller index becomes the representative.
    ///
    /// # Errors
    /// Returns [`crate::Error::MalformedBytecode`] if the entries have incompatible types.
    pub fn union(&mut self, a: StackEntryId, b: StackEntryId) -> Result<StackEntryId> {
        let a = self.find(a);
        let b = self.find(b);
        if a == b {
            return Ok(a);
        }
        if self.types[a.0] != self.types[b.0] {
            return Err(malformed_error!(
                "Stack type mismatch at merge: {} vs {}",
                self.types[a.0],
                self.types[b.0]
            ));
        }

        let (root, child) = if a.0 < b.0 { (a.0, b.0) } else { (b.0, a.0) };
        self.parent[child] = root;
        let producers = std::mem::take(&mut self.producers[child]);
        self.producers[root].extend(producers);
        let consumers = std::mem::take(&mut self.consumers[child]);
        self.consumers[root].extend(consumers);
        Ok(StackEntryId(root))
    }

    /// Type of the entry.
    #[must_use]
    pub fn stack_type(&self, entry: StackEntryId) -> StackType {
        self.types[self.find(entry).0]
    }

    /// Nodes producing the entry's class.
    #[must_use]
    pub fn producers(&self, entry: StackEntryId) -> &BTreeSet<NodeId> {
        &self.producers[self.find(entry).0]
    }

    /// Nodes consuming the entry's class.
    #[must_use]
    pub fn consumers(&self, entry: StackEntryId) -> &BTreeSet<NodeId> {
        &self.consumers[self.find(entry).0]
    }

    fn add_consumer(&mut self, entry: StackEntryId, consumer: NodeId) {
        let root = self.find(entry).0;
        self.consumers[root].insert(consumer);
    }
}

/// Stack effect of one reachable node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeStack {
    /// Stack depth (in values) on entry.
    pub depth: usize,
    /// Popped entries, bottom first.
    pub consumed: Vec<StackEntryId>,
    /// Pushed entries, bottom first.
    pub produced: Vec<StackEntryId>,
}

/// The stack behaviour of one instruction on a concrete stack shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StackDelta {
    /// Pops `pops` values, then pushes at most one.
    Effect {
        /// Number of values popped.
        pops: usize,
        /// Pushed type, if any.
        push: Option<StackType>,
    },
    /// Pops `pops` values and pushes copies of them. `outputs[k]` is the popped position
    /// (0 = deepest) that output `k` (bottom first) copies.
    Shuffle {
        /// Number of values popped.
        pops: usize,
        /// Source of every pushed value.
        outputs: &'static [usize],
    },
}

impl StackDelta {
    const NONE: StackDelta = StackDelta::Effect {
        pops: 0,
        push: None,
    };

    fn pop(pops: usize) -> Self {
        StackDelta::Effect { pops, push: None }
    }

    fn push(pops: usize, ty: StackType) -> Self {
        StackDelta::Effect {
            pops,
            push: Some(ty),
        }
    }

    /// Number of values popped.
    #[must_use]
    pub fn pops(&self) -> usize {
        match self {
            StackDelta::Effect { pops, .. } | StackDelta::Shuffle { pops, .. } => *pops,
        }
    }
}

fn category(stack: &[StackType], depth: usize) -> Result<u8> {
    stack
        .len()
        .checked_sub(depth + 1)
        .map(|index| stack[index].category())
        .ok_or_else(|| malformed_error!("Stack underflow"))
}

fn shuffle(pops: usize, outputs: &'static [usize]) -> StackDelta {
    StackDelta::Shuffle { pops, outputs }
}

fn dup_x2(stack: &[StackType]) -> Result<StackDelta> {
    Ok(if category(stack, 1)? == 2 {
        shuffle(2, &[1, 0, 1])
    } else {
        shuffle(3, &[2, 0, 1, 2])
    })
}

fn dup2(stack: &[StackType]) -> Result<StackDelta> {
    Ok(if category(stack, 0)? == 2 {
        shuffle(1, &[0, 0])
    } else {
        shuffle(2, &[0, 1, 0, 1])
    })
}

fn dup2_x1(stack: &[StackType]) -> Result<StackDelta> {
    Ok(if category(stack, 0)? == 2 {
        shuffle(2, &[1, 0, 1])
    } else {
        shuffle(3, &[1, 2, 0, 1, 2])
    })
}

fn dup2_x2(stack: &[StackType]) -> Result<StackDelta> {
    let top = category(stack, 0)?;
    let second = category(stack, 1)?;
    Ok(match (top, second) {
        (2, 2) => shuffle(2, &[1, 0, 1]),
        (2, _) => shuffle(3, &[2, 0, 1, 2]),
        _ if category(stack, 2)? == 2 => shuffle(3, &[1, 2, 0, 1, 2]),
        _ => shuffle(4, &[2, 3, 0, 1, 2, 3]),
    })
}

fn pop2(stack: &[StackType]) -> Result<StackDelta> {
    Ok(if category(stack, 0)? == 2 {
        StackDelta::pop(1)
    } else {
        StackDelta::pop(2)
    })
}

fn const_type(value: ConstValue) -> StackType {
    match value {
        ConstValue::Null => StackType::Reference,
        ConstValue::Int(_) => StackType::Int,
        ConstValue::Long(_) => StackType::Long,
        ConstValue::Float(_) => StackType::Float,
        ConstValue::Double(_) => StackType::Double,
    }
}

fn constant_index(instruction: &Instruction) -> Result<u16> {
    instruction.constant_index().ok_or_else(|| {
        malformed_error!(
            "{} at offset {} has no constant pool operand",
            instruction.mnemonic,
            instruction.offset
        )
    })
}

fn ldc_type(instruction: &Instruction, pool: &dyn ConstantPool) -> Result<StackType> {
    let index = constant_index(instruction)?;
    match pool.resolve(index)? {
        ConstantEntry::Integer(_) => Ok(StackType::Int),
        ConstantEntry::Float(_) => Ok(StackType::Float),
        ConstantEntry::Long(_) => Ok(StackType::Long),
        ConstantEntry::Double(_) => Ok(StackType::Double),
        ConstantEntry::String(_)
        | ConstantEntry::Class(_)
        | ConstantEntry::MethodType(_)
        | ConstantEntry::MethodHandle(_) => Ok(StackType::Reference),
        other => Err(malformed_error!(
            "ldc at offset {} references non-loadable constant {:?}",
            instruction.offset,
            other
        )),
    }
}

fn field_type(instruction: &Instruction, pool: &dyn ConstantPool) -> Result<StackType> {
    let member = pool.member(constant_index(instruction)?)?;
    Ok(JavaType::parse(&member.descriptor)?.stack_type())
}

/// Parses the callee descriptor of an invoke instruction.
///
/// # Errors
/// Returns [`crate::Error::MalformedBytecode`] for a missing or mismatched pool entry or a broken
/// descriptor.
pub fn invoke_descriptor(
    instruction: &Instruction,
    kind: InvokeKind,
    pool: &dyn ConstantPool,
) -> Result<MethodDescriptor> {
    let index = constant_index(instruction)?;
    let descriptor = match kind {
        InvokeKind::Dynamic => match pool.resolve(index)? {
            ConstantEntry::InvokeDynamic { descriptor, .. } => descriptor,
            other => {
                return Err(malformed_error!(
                    "invokedynamic at offset {} references {:?}",
                    instruction.offset,
                    other
                ))
            }
        },
        _ => &pool.member(index)?.descriptor,
    };
    MethodDescriptor::parse(descriptor)
}

/// Returns the stack behaviour of `instruction` on a stack whose types are `stack` (bottom
/// first).
///
/// # Errors
/// Returns [`crate::Error::MalformedBytecode`] when the stack is too shallow for a
/// category-dependent form, or when a constant-pool operand cannot be resolved.
pub fn stack_delta(
    instruction: &Instruction,
    stack: &[StackType],
    pool: &dyn ConstantPool,
) -> Result<StackDelta> {
    Ok(match instruction.kind {
        OpKind::Nop
        | OpKind::Goto
        | OpKind::Iinc
        | OpKind::Wide
        | OpKind::Jsr
        | OpKind::Ret
        | OpKind::Return(None) => StackDelta::NONE,
        OpKind::Const(value) => StackDelta::push(0, const_type(value)),
        OpKind::Push => StackDelta::push(0, StackType::Int),
        OpKind::Ldc => StackDelta::push(0, ldc_type(instruction, pool)?),
        OpKind::Load(ty) => StackDelta::push(0, ty),
        OpKind::Store(_)
        | OpKind::Pop
        | OpKind::IfZero(_)
        | OpKind::IfNull(_)
        | OpKind::TableSwitch
        | OpKind::LookupSwitch
        | OpKind::Return(Some(_))
        | OpKind::Throw
        | OpKind::MonitorEnter
        | OpKind::MonitorExit => StackDelta::pop(1),
        OpKind::ArrayLoad(ty) => StackDelta::push(2, ty),
        OpKind::ArrayStore(_) => StackDelta::pop(3),
        OpKind::Pop2 => pop2(stack)?,
        OpKind::Dup => shuffle(1, &[0, 0]),
        OpKind::DupX1 => shuffle(2, &[1, 0, 1]),
        OpKind::DupX2 => dup_x2(stack)?,
        OpKind::Dup2 => dup2(stack)?,
        OpKind::Dup2X1 => dup2_x1(stack)?,
        OpKind::Dup2X2 => dup2_x2(stack)?,
        OpKind::Swap => shuffle(2, &[1, 0]),
        OpKind::Binary(_, ty) => StackDelta::push(2, ty),
        OpKind::Negate(ty) => StackDelta::push(1, ty),
        OpKind::Convert(_, to) => StackDelta::push(1, to.stack_type()),
        OpKind::Cmp(_) => StackDelta::push(2, StackType::Int),
        OpKind::IfCompare(..) => StackDelta::pop(2),
        OpKind::GetStatic => StackDelta::push(0, field_type(instruction, pool)?),
        OpKind::PutStatic => StackDelta::pop(1),
        OpKind::GetField => StackDelta::push(1, field_type(instruction, pool)?),
        OpKind::PutField => StackDelta::pop(2),
        OpKind::Invoke(kind) => {
            let descriptor = invoke_descriptor(instruction, kind, pool)?;
            let receiver = usize::from(!matches!(kind, InvokeKind::Static | InvokeKind::Dynamic));
            let pops = descriptor.parameters.len() + receiver;
            match descriptor.return_type {
                Some(ty) => StackDelta::push(pops, ty.stack_type()),
                None => StackDelta::pop(pops),
            }
        }
        OpKind::New => StackDelta::push(0, StackType::Reference),
        OpKind::NewArray | OpKind::ANewArray | OpKind::CheckCast => {
            StackDelta::push(1, StackType::Reference)
        }
        OpKind::MultiANewArray => match instruction.operand {
            Operand::MultiArray { dimensions, .. } if dimensions > 0 => {
                StackDelta::push(usize::from(dimensions), StackType::Reference)
            }
            _ => {
                return Err(malformed_error!(
                    "multianewarray at offset {} has no dimensions",
                    instruction.offset
                ))
            }
        },
        OpKind::ArrayLength | OpKind::InstanceOf => StackDelta::push(1, StackType::Int),
    })
}

/// Simulates the operand stack of every reachable node and records a [`NodeStack`] on it.
///
/// Catch-start markers begin with a stack holding only the caught exception; try-start markers
/// pass their incoming stack through unchanged. Unreachable nodes keep `stack == None`.
///
/// # Errors
/// Returns [`crate::Error::MalformedBytecode`] on underflow, on a depth or type mismatch at a
/// merge point, and on unresolvable constant-pool operands.
pub fn simulate_stack(
    graph: &mut InstructionGraph,
    pool: &dyn ConstantPool,
) -> Result<StackEntries> {
    let mut entries = StackEntries::new();
    let mut incoming: Vec<Option<Vec<StackEntryId>>> = vec![None; graph.node_count()];
    let mut worklist = VecDeque::new();

    let entry = graph.entry();
    incoming[entry.index()] = Some(Vec::new());
    worklist.push_back(entry);

    while let Some(node) = worklist.pop_front() {
        let Some(state) = incoming[node.index()].clone() else {
            continue;
        };

        let (consumed, produced, output) = match &graph[node].kind {
            NodeKind::TryStart { .. } => (Vec::new(), Vec::new(), state.clone()),
            NodeKind::CatchStart { .. } => {
                let exception = entries.fresh(StackType::Reference, node);
                (Vec::new(), vec![exception], vec![exception])
            }
            NodeKind::Instruction(instruction) => {
                let types: Vec<StackType> =
                    state.iter().map(|e| entries.stack_type(*e)).collect();
                let delta = stack_delta(instruction, &types, pool)?;
                let pops = delta.pops();
                let Some(base) = state.len().checked_sub(pops) else {
                    return Err(malformed_error!(
                        "Stack underflow at offset {}: {} needs {} values, {} available",
                        instruction.offset,
                        instruction.mnemonic,
                        pops,
                        state.len()
                    ));
                };
                let consumed = state[base..].to_vec();
                let produced: Vec<StackEntryId> = match delta {
                    StackDelta::Effect { push, .. } => push
                        .map(|ty| entries.fresh(ty, node))
                        .into_iter()
                        .collect(),
                    StackDelta::Shuffle { outputs, .. } => outputs
                        .iter()
                        .map(|&source| {
                            let ty = entries.stack_type(consumed[source]);
                            entries.fresh(ty, node)
                        })
                        .collect(),
                };
                let mut output = state[..base].to_vec();
                output.extend(produced.iter().copied());
                (consumed, produced, output)
            }
        };

        for entry in &consumed {
            entries.add_consumer(*entry, node);
        }
        graph.node_mut(node).stack = Some(NodeStack {
            depth: state.len(),
            consumed,
            produced,
        });

        let successors = graph[node].successors.clone();
        for successor in successors {
            if matches!(graph[successor].kind, NodeKind::CatchStart { .. }) {
                if incoming[successor.index()].is_none() {
                    incoming[successor.index()] = Some(Vec::new());
                    worklist.push_back(successor);
                }
                continue;
            }

            match &incoming[successor.index()] {
                None => {
                    incoming[successor.index()] = Some(output.clone());
                    worklist.push_back(successor);
                }
                Some(existing) => {
                    if existing.len() != output.len() {
                        return Err(malformed_error!(
                            "Stack depth mismatch at merge into offset {}: {} vs {}",
                            graph[successor].offset(graph),
                            existing.len(),
                            output.len()
                        ));
                    }
                    for (a, b) in existing.iter().zip(&output) {
                        entries.union(*a, *b)?;
                    }
                }
            }
        }
    }

    Ok(entries)
}

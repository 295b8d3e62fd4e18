//! Lowering of graph nodes into the statement IR.
//!
//! Each node becomes a short compound of statements: the node's effect on the operand stack is
//! made explicit by assigning every produced stack entry to a [`StackValue`] and reading every
//! consumed entry from one. Compounds are flattened into the [`StatementList`] in the graph's
//! positional order and linked: sequentially within a compound, and from a compound's last
//! statement to the first statement of every successor node.
//!
//! Locals are emitted with version 0 here; [`crate::analysis::ssa`] assigns real versions.

use std::collections::HashMap;

use crate::{
    analysis::{
        blocks::BlockFactory,
        graph::{InstructionGraph, NodeKind},
        stack::{invoke_descriptor, stack_delta, NodeStack, StackDelta, StackEntries},
    },
    assembly::{BinaryOp, ConstValue, Instruction, InvokeKind, OpKind, Operand},
    ir::{
        expression::{Expression, LValue, Literal, StackValue, Variable},
        list::{StatementId, StatementList},
        statement::{Assignment, JumpKind, Statement},
        variables::{VariableFactory, VariableNamer},
    },
    metadata::{
        constants::{ConstantEntry, ConstantPool},
        descriptor::{JavaType, PrimitiveType, StackType},
    },
    utils::graph::NodeId,
    Error, Result,
};

/// Result of lowering one method.
#[derive(Debug)]
pub struct LoweredMethod {
    /// The flattened statements.
    pub list: StatementList,
    /// Stack type stored by every statement that defines a local.
    pub local_types: HashMap<StatementId, StackType>,
    /// First statement of every graph node.
    pub node_statements: HashMap<NodeId, StatementId>,
}

struct Lowerer<'a> {
    graph: &'a InstructionGraph,
    entries: &'a StackEntries,
    pool: &'a dyn ConstantPool,
}

struct Compound {
    statements: Vec<Statement>,
    local_type: Option<StackType>,
}

impl Compound {
    fn single(statement: Statement) -> Self {
        Compound {
            statements: vec![statement],
            local_type: None,
        }
    }

    fn store(statement: Statement, ty: StackType) -> Self {
        Compound {
            statements: vec![statement],
            local_type: Some(ty),
        }
    }
}

fn local(slot: u16) -> Variable {
    Variable::new(slot, 0)
}

fn assign(target: LValue, value: Expression) -> Statement {
    Statement::Assignment(Assignment::new(target, value))
}

impl Lowerer<'_> {
    fn value(&self, entry: crate::analysis::stack::StackEntryId) -> StackValue {
        StackValue(self.entries.find(entry).index())
    }

    fn inputs(&self, stack: &NodeStack) -> Vec<Expression> {
        stack
            .consumed
            .iter()
            .map(|e| Expression::Stack(self.value(*e)))
            .collect()
    }

    fn output(&self, stack: &NodeStack) -> Result<LValue> {
        stack
            .produced
            .first()
            .map(|e| LValue::Stack(self.value(*e)))
            .ok_or_else(|| Error::GraphError("Node produced no stack value".to_string()))
    }

    fn ldc(&self, instruction: &Instruction) -> Result<Literal> {
        let index = instruction
            .constant_index()
            .ok_or_else(|| malformed_error!("ldc at offset {} has no operand", instruction.offset))?;
        Ok(match self.pool.resolve(index)? {
            ConstantEntry::Integer(v) => Literal::Int(*v),
            ConstantEntry::Float(v) => Literal::Float(*v),
            ConstantEntry::Long(v) => Literal::Long(*v),
            ConstantEntry::Double(v) => Literal::Double(*v),
            ConstantEntry::String(v) => Literal::String(v.clone()),
            ConstantEntry::Class(name) => Literal::Class(JavaType::from_class_name(name)?),
            ConstantEntry::MethodType(descriptor) => Literal::MethodType(descriptor.clone()),
            ConstantEntry::MethodHandle(member) => {
                Literal::MethodHandle(format!("{}.{}", member.class.replace('/', "."), member.name))
            }
            other => {
                return Err(malformed_error!(
                    "ldc at offset {} references {:?}",
                    instruction.offset,
                    other
                ))
            }
        })
    }

    fn class_operand(&self, instruction: &Instruction) -> Result<JavaType> {
        let index = instruction.constant_index().ok_or_else(|| {
            malformed_error!(
                "{} at offset {} has no class operand",
                instruction.mnemonic,
                instruction.offset
            )
        })?;
        JavaType::from_class_name(self.pool.class_name(index)?)
    }

    fn field(&self, instruction: &Instruction, owner: Option<Expression>) -> Result<(Option<Box<Expression>>, String, String)> {
        let index = instruction.constant_index().ok_or_else(|| {
            malformed_error!("{} at offset {} has no field operand", instruction.mnemonic, instruction.offset)
        })?;
        let member = self.pool.member(index)?;
        Ok((owner.map(Box::new), member.class.clone(), member.name.clone()))
    }

    fn shuffle(&self, stack: &NodeStack, outputs: &[usize]) -> Vec<Statement> {
        let inputs = self.inputs(stack);
        let mut copied: Vec<Option<StackValue>> = vec![None; inputs.len()];
        let mut statements = Vec::with_capacity(outputs.len());
        for (position, source) in outputs.iter().enumerate() {
            let target = self.value(stack.produced[position]);
            let value = match copied[*source] {
                Some(previous) => Expression::Stack(previous),
                None => inputs[*source].clone(),
            };
            copied[*source] = Some(target);
            statements.push(assign(LValue::Stack(target), value));
        }
        statements
    }

    fn lower_instruction(&self, instruction: &Instruction, stack: &NodeStack) -> Result<Compound> {
        let mut ins = self.inputs(stack).into_iter();
        let mut next = || {
            ins.next()
                .ok_or_else(|| malformed_error!("Stack underflow at offset {}", instruction.offset))
        };

        let statement = match instruction.kind {
            OpKind::Nop => Statement::Nop,
            OpKind::Const(value) => {
                let literal = match value {
                    ConstValue::Null => Literal::Null,
                    ConstValue::Int(v) => Literal::Int(v),
                    ConstValue::Long(v) => Literal::Long(v),
                    ConstValue::Float(v) => Literal::Float(v),
                    ConstValue::Double(v) => Literal::Double(v),
                };
                assign(self.output(stack)?, Expression::Literal(literal))
            }
            OpKind::Push => match instruction.operand {
                Operand::Immediate(v) => assign(self.output(stack)?, Expression::int(v)),
                _ => return Err(malformed_error!("Push without immediate at {}", instruction.offset)),
            },
            OpKind::Ldc => assign(
                self.output(stack)?,
                Expression::Literal(self.ldc(instruction)?),
            ),
            OpKind::Load(_) => {
                let slot = slot_of(instruction)?;
                assign(self.output(stack)?, Expression::Local(local(slot)))
            }
            OpKind::Store(ty) => {
                let slot = slot_of(instruction)?;
                return Ok(Compound::store(
                    assign(LValue::Local(local(slot)), next()?),
                    ty,
                ));
            }
            OpKind::ArrayLoad(_) => {
                let array = next()?;
                let index = next()?;
                assign(
                    self.output(stack)?,
                    Expression::ArrayIndex {
                        array: Box::new(array),
                        index: Box::new(index),
                    },
                )
            }
            OpKind::ArrayStore(_) => {
                let array = next()?;
                let index = next()?;
                let value = next()?;
                assign(
                    LValue::ArrayElement {
                        array: Box::new(array),
                        index: Box::new(index),
                    },
                    value,
                )
            }
            OpKind::Pop | OpKind::Pop2 => {
                let discarded: Vec<Statement> = self
                    .inputs(stack)
                    .into_iter()
                    .map(Statement::Expression)
                    .collect();
                return Ok(Compound {
                    statements: discarded,
                    local_type: None,
                });
            }
            OpKind::Dup
            | OpKind::DupX1
            | OpKind::DupX2
            | OpKind::Dup2
            | OpKind::Dup2X1
            | OpKind::Dup2X2
            | OpKind::Swap => {
                let types: Vec<StackType> = stack
                    .consumed
                    .iter()
                    .map(|e| self.entries.stack_type(*e))
                    .collect();
                let StackDelta::Shuffle { outputs, .. } =
                    stack_delta(instruction, &types, self.pool)?
                else {
                    return Err(Error::GraphError(format!(
                        "{} did not resolve to a shuffle",
                        instruction.mnemonic
                    )));
                };
                return Ok(Compound {
                    statements: self.shuffle(stack, outputs),
                    local_type: None,
                });
            }
            OpKind::Binary(op, _) => {
                let lhs = next()?;
                let rhs = next()?;
                assign(
                    self.output(stack)?,
                    Expression::Arithmetic {
                        op,
                        lhs: Box::new(lhs),
                        rhs: Box::new(rhs),
                    },
                )
            }
            OpKind::Negate(_) => assign(self.output(stack)?, Expression::Negate(Box::new(next()?))),
            OpKind::Iinc => {
                let Operand::Iinc { local: slot, delta } = instruction.operand else {
                    return Err(malformed_error!("iinc without operands at {}", instruction.offset));
                };
                let (op, amount) = if delta < 0 {
                    (BinaryOp::Sub, -i32::from(delta))
                } else {
                    (BinaryOp::Add, i32::from(delta))
                };
                return Ok(Compound::store(
                    assign(
                        LValue::Local(local(slot)),
                        Expression::Arithmetic {
                            op,
                            lhs: Box::new(Expression::Local(local(slot))),
                            rhs: Box::new(Expression::int(amount)),
                        },
                    ),
                    StackType::Int,
                ));
            }
            OpKind::Convert(_, to) => assign(
                self.output(stack)?,
                Expression::Cast {
                    ty: JavaType::Primitive(to),
                    value: Box::new(next()?),
                },
            ),
            OpKind::Cmp(ty) => {
                let lhs = next()?;
                let rhs = next()?;
                assign(
                    self.output(stack)?,
                    Expression::Cmp {
                        ty,
                        lhs: Box::new(lhs),
                        rhs: Box::new(rhs),
                    },
                )
            }
            OpKind::IfZero(op) => branch(op, next()?, Expression::int(0)),
            OpKind::IfNull(op) => branch(op, next()?, Expression::Literal(Literal::Null)),
            OpKind::IfCompare(op, _) => {
                let lhs = next()?;
                let rhs = next()?;
                branch(op, lhs, rhs)
            }
            OpKind::Goto => Statement::Goto(JumpKind::Goto),
            OpKind::TableSwitch | OpKind::LookupSwitch => {
                let keys = match &instruction.operand {
                    Operand::TableSwitch { low, offsets, .. } => (0..offsets.len())
                        .map(|i| i32::try_from(i).map(|i| low.wrapping_add(i)))
                        .collect::<std::result::Result<Vec<_>, _>>()
                        .map_err(|_| malformed_error!("tableswitch too large"))?,
                    Operand::LookupSwitch { pairs, .. } => pairs.iter().map(|(k, _)| *k).collect(),
                    _ => return Err(malformed_error!("Switch without table at {}", instruction.offset)),
                };
                Statement::RawSwitch {
                    value: next()?,
                    keys,
                }
            }
            OpKind::Return(Some(_)) => Statement::Return(Some(next()?)),
            OpKind::Return(None) => Statement::Return(None),
            OpKind::GetStatic => {
                let (owner, class, name) = self.field(instruction, None)?;
                assign(self.output(stack)?, Expression::Field { owner, class, name })
            }
            OpKind::PutStatic => {
                let (owner, class, name) = self.field(instruction, None)?;
                assign(LValue::Field { owner, class, name }, next()?)
            }
            OpKind::GetField => {
                let (owner, class, name) = self.field(instruction, Some(next()?))?;
                assign(self.output(stack)?, Expression::Field { owner, class, name })
            }
            OpKind::PutField => {
                let receiver = next()?;
                let value = next()?;
                let (owner, class, name) = self.field(instruction, Some(receiver))?;
                assign(LValue::Field { owner, class, name }, value)
            }
            OpKind::Invoke(kind) => {
                let descriptor = invoke_descriptor(instruction, kind, self.pool)?;
                let (class, name, signature) = match kind {
                    InvokeKind::Dynamic => match instruction
                        .constant_index()
                        .map(|i| self.pool.resolve(i))
                        .transpose()?
                    {
                        Some(ConstantEntry::InvokeDynamic {
                            name, descriptor, ..
                        }) => (String::new(), name.clone(), descriptor.clone()),
                        _ => return Err(malformed_error!("Bad invokedynamic at {}", instruction.offset)),
                    },
                    _ => {
                        let index = instruction.constant_index().ok_or_else(|| {
                            malformed_error!("Invoke without operand at {}", instruction.offset)
                        })?;
                        let member = self.pool.member(index)?;
                        (member.class.clone(), member.name.clone(), member.descriptor.clone())
                    }
                };
                let receiver = if matches!(kind, InvokeKind::Static | InvokeKind::Dynamic) {
                    None
                } else {
                    Some(Box::new(next()?))
                };
                let args: Vec<Expression> = (0..descriptor.parameters.len())
                    .map(|_| next())
                    .collect::<Result<_>>()?;
                let call = Expression::Invoke {
                    kind,
                    receiver,
                    class,
                    name,
                    descriptor: signature,
                    args,
                };
                if descriptor.return_type.is_some() {
                    assign(self.output(stack)?, call)
                } else {
                    Statement::Expression(call)
                }
            }
            OpKind::New => assign(
                self.output(stack)?,
                Expression::New(self.class_operand(instruction)?),
            ),
            OpKind::NewArray => {
                let Operand::ArrayType(code) = instruction.operand else {
                    return Err(malformed_error!("newarray without type at {}", instruction.offset));
                };
                let element = PrimitiveType::from_array_type(code).ok_or_else(|| {
                    malformed_error!("Invalid newarray type {} at {}", code, instruction.offset)
                })?;
                assign(
                    self.output(stack)?,
                    Expression::NewArray {
                        ty: JavaType::Array(Box::new(JavaType::Primitive(element))),
                        dimensions: vec![next()?],
                    },
                )
            }
            OpKind::ANewArray => {
                let component = self.class_operand(instruction)?;
                assign(
                    self.output(stack)?,
                    Expression::NewArray {
                        ty: JavaType::Array(Box::new(component)),
                        dimensions: vec![next()?],
                    },
                )
            }
            OpKind::MultiANewArray => {
                let ty = self.class_operand(instruction)?;
                let dimensions = self.inputs(stack);
                assign(self.output(stack)?, Expression::NewArray { ty, dimensions })
            }
            OpKind::ArrayLength => assign(
                self.output(stack)?,
                Expression::ArrayLength(Box::new(next()?)),
            ),
            OpKind::Throw => Statement::Throw(next()?),
            OpKind::CheckCast => {
                let ty = self.class_operand(instruction)?;
                assign(
                    self.output(stack)?,
                    Expression::Cast {
                        ty,
                        value: Box::new(next()?),
                    },
                )
            }
            OpKind::InstanceOf => {
                let ty = self.class_operand(instruction)?;
                assign(
                    self.output(stack)?,
                    Expression::InstanceOf {
                        value: Box::new(next()?),
                        ty,
                    },
                )
            }
            OpKind::MonitorEnter => Statement::MonitorEnter(next()?),
            OpKind::MonitorExit => Statement::MonitorExit(next()?),
            OpKind::Jsr | OpKind::Ret | OpKind::Wide => {
                return Err(Error::NotSupported(format!(
                    "{} at offset {}",
                    instruction.mnemonic, instruction.offset
                )))
            }
        };
        Ok(Compound::single(statement))
    }

    fn lower_node(&self, node: NodeId) -> Result<Compound> {
        let graph_node = &self.graph[node];
        let Some(stack) = &graph_node.stack else {
            return Ok(Compound::single(Statement::Nop));
        };
        match &graph_node.kind {
            NodeKind::Instruction(instruction) => self.lower_instruction(instruction, stack),
            NodeKind::TryStart { block } => Ok(Compound::single(Statement::Try { block: *block })),
            NodeKind::CatchStart {
                try_block,
                block,
                catch_types,
            } => Ok(Compound::single(Statement::Catch {
                try_block: *try_block,
                block: *block,
                catch_types: catch_types.clone(),
                target: self.output(stack)?,
            })),
        }
    }
}

fn slot_of(instruction: &Instruction) -> Result<u16> {
    instruction.local().ok_or_else(|| {
        malformed_error!(
            "{} at offset {} has no local operand",
            instruction.mnemonic,
            instruction.offset
        )
    })
}

fn branch(op: crate::assembly::CompareOp, lhs: Expression, rhs: Expression) -> Statement {
    Statement::If {
        condition: Expression::Compare {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        },
        jump: JumpKind::Goto,
    }
}

/// Lowers every node of `graph` into a linked [`StatementList`].
///
/// Unreachable nodes lower to unlinked no-ops. The list continues minting block identifiers
/// from `blocks`.
///
/// # Errors
/// Returns [`Error::MalformedBytecode`] for unresolvable constant-pool operands and
/// [`Error::NotSupported`] for subroutine instructions.
pub fn lower_graph(
    graph: &InstructionGraph,
    entries: &StackEntries,
    pool: &dyn ConstantPool,
    blocks: BlockFactory,
    namer: VariableNamer,
) -> Result<LoweredMethod> {
    let lowerer = Lowerer {
        graph,
        entries,
        pool,
    };
    let variables = VariableFactory::new(&namer);
    let mut list = StatementList::new(blocks, variables, namer);
    let mut local_types = HashMap::new();
    let mut first: HashMap<NodeId, StatementId> = HashMap::new();
    let mut last: Vec<(NodeId, StatementId)> = Vec::with_capacity(graph.order().len());

    for &node in graph.order() {
        let compound = lowerer.lower_node(node)?;
        let offset = graph[node].offset(graph);
        let blocks = graph[node].blocks.clone();

        let mut previous: Option<StatementId> = None;
        let mut statements = compound.statements;
        if statements.is_empty() {
            statements.push(Statement::Nop);
        }
        for statement in statements {
            let id = list.push(statement, blocks.clone(), offset);
            if let Some(ty) = compound.local_type {
                local_types.insert(id, ty);
            }
            match previous {
                Some(previous) => list.add_edge(previous, id),
                None => {
                    first.insert(node, id);
                }
            }
            previous = Some(id);
        }
        if let Some(previous) = previous {
            last.push((node, previous));
        }
    }

    for (node, tail) in last {
        if graph[node].stack.is_none() {
            continue;
        }
        for successor in &graph[node].successors {
            if let Some(head) = first.get(successor) {
                list.add_edge(tail, *head);
            }
        }
    }

    Ok(LoweredMethod {
        list,
        local_types,
        node_statements: first,
    })
}

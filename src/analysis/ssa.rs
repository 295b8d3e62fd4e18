//! SSA versioning of local variables.
//!
//! Lowering leaves every local as version 0. This stage places [`JoinMarker`]s and renames
//! every read and definition, following Cytron et al.:
//!
//! 1. Build the SSA view of the statement list: its edges plus an exceptional edge from every
//!    statement inside a try block to each of that try's catch headers.
//! 2. Place join markers at the iterated dominance frontier of each slot's definition sites,
//!    pruned to statements where the slot is live.
//! 3. Rename along the dominator tree with per-slot version stacks.
//! 4. Reassign final versions in positional definition order, so versions of a slot increase
//!    strictly through the list.
//!
//! Type information is only stack categories: a join merging differently typed definitions
//! raises [`DecompilerComment::TypeClashes`], and storing into a parameter slot with another
//! type raises [`DecompilerComment::ParameterCorruption`].

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::{
    compiler::{DecompilerComment, DecompilerComments, EventLog},
    ir::{
        expression::{Expression, LValue, Variable},
        list::{StatementId, StatementList},
        statement::{JoinMarker, Statement},
    },
    metadata::descriptor::StackType,
    utils::graph::{
        algorithms::{
            compute_dominance_frontiers, compute_dominators, iterated_dominance_frontier,
            postorder, DominatorTree,
        },
        AdjacencyGraph, GraphBase, NodeId, RootedGraph, Successors,
    },
};

/// Builds the graph SSA construction runs on: the list's edges plus exceptional edges into
/// catch headers.
#[must_use]
pub fn ssa_graph(list: &StatementList) -> AdjacencyGraph {
    let mut graph = AdjacencyGraph::from_graph(list);

    let mut catches: BTreeMap<_, Vec<StatementId>> = BTreeMap::new();
    for id in list.live() {
        if let Statement::Catch { try_block, .. } = list[id].statement {
            catches.entry(try_block).or_default().push(id);
        }
    }
    if catches.is_empty() {
        return graph;
    }

    for id in list.live() {
        for block in &list[id].blocks {
            if let Some(handlers) = catches.get(block) {
                for handler in handlers {
                    graph.add_edge(id, *handler);
                }
            }
        }
    }
    graph
}

fn rename_reads(statement: &mut Statement, current: &impl Fn(u16) -> u32) {
    statement.for_each_expression_mut(&mut |expression| {
        expression.walk_mut(&mut |e| {
            if let Expression::Local(variable) = e {
                *variable = Variable::new(variable.slot, current(variable.slot));
            }
        });
    });
}

fn live_slots(list: &StatementList, graph: &AdjacencyGraph) -> Vec<BTreeSet<u16>> {
    let count = graph.node_count();
    let mut uses: Vec<BTreeSet<u16>> = vec![BTreeSet::new(); count];
    let mut defs: Vec<Option<u16>> = vec![None; count];
    for id in list.live() {
        let statement = &list[id].statement;
        uses[id.index()] = statement.local_reads().iter().map(|v| v.slot).collect();
        defs[id.index()] = statement.defined_local().map(|v| v.slot);
    }

    let order = postorder(graph, graph.entry());
    let mut live_in: Vec<BTreeSet<u16>> = vec![BTreeSet::new(); count];
    let mut changed = true;
    while changed {
        changed = false;
        for node in &order {
            let mut live: BTreeSet<u16> = BTreeSet::new();
            for successor in graph.successors(*node) {
                live.extend(live_in[successor.index()].iter().copied());
            }
            if let Some(slot) = defs[node.index()] {
                live.remove(&slot);
            }
            live.extend(uses[node.index()].iter().copied());
            if live != live_in[node.index()] {
                live_in[node.index()] = live;
                changed = true;
            }
        }
    }
    live_in
}

enum Walk {
    Enter(NodeId),
    Exit(Vec<u16>),
}

struct Renamer {
    stacks: BTreeMap<u16, Vec<u32>>,
    next_temp: u32,
    temp_types: HashMap<u32, Option<StackType>>,
    visited: Vec<bool>,
}

impl Renamer {
    fn current(&self, slot: u16) -> u32 {
        self.stacks
            .get(&slot)
            .and_then(|stack| stack.last())
            .copied()
            .unwrap_or(0)
    }

    fn fresh(&mut self, slot: u16, ty: Option<StackType>) -> u32 {
        let temp = self.next_temp;
        self.next_temp += 1;
        self.temp_types.insert(temp, ty);
        self.stacks.entry(slot).or_default().push(temp);
        temp
    }

    fn pop(&mut self, slot: u16) {
        if let Some(stack) = self.stacks.get_mut(&slot) {
            stack.pop();
        }
    }

    fn enter(
        &mut self,
        list: &mut StatementList,
        graph: &AdjacencyGraph,
        node: NodeId,
        local_types: &HashMap<StatementId, StackType>,
    ) -> Vec<u16> {
        self.visited[node.index()] = true;
        let mut pushed = Vec::new();

        let joins = std::mem::take(&mut list[node].joins);
        let mut renamed = Vec::with_capacity(joins.len());
        for mut join in joins {
            let temp = self.fresh(join.slot, None);
            join.result = Variable::new(join.slot, temp);
            pushed.push(join.slot);
            renamed.push(join);
        }
        list[node].joins = renamed;

        rename_reads(&mut list[node].statement, &|slot| self.current(slot));

        if let Some(variable) = list[node].statement.defined_local() {
            let temp = self.fresh(variable.slot, local_types.get(&node).copied());
            if let Some(LValue::Local(target)) = list[node].statement.lvalue_mut() {
                *target = Variable::new(variable.slot, temp);
            }
            pushed.push(variable.slot);
        }

        for successor in graph.successors(node) {
            let incoming: Vec<(usize, u16)> = list[successor]
                .joins
                .iter()
                .enumerate()
                .map(|(position, join)| (position, join.slot))
                .collect();
            for (position, slot) in incoming {
                let version = self.current(slot);
                list[successor].joins[position]
                    .incoming
                    .push(Variable::new(slot, version));
            }
        }

        pushed
    }
}

fn place_joins(
    list: &mut StatementList,
    graph: &AdjacencyGraph,
    dominators: &DominatorTree,
    live_in: &[BTreeSet<u16>],
) {
    let frontiers = compute_dominance_frontiers(graph, dominators);

    let mut sites: BTreeMap<u16, Vec<NodeId>> = BTreeMap::new();
    for id in list.live() {
        if let Some(variable) = list[id].statement.defined_local() {
            sites.entry(variable.slot).or_default().push(id);
        }
    }

    for (slot, defs) in sites {
        for join in iterated_dominance_frontier(&frontiers, defs) {
            if dominators.is_reachable(join)
                && !list[join].removed
                && live_in[join.index()].contains(&slot)
            {
                list[join].joins.push(JoinMarker {
                    slot,
                    result: Variable::new(slot, 0),
                    incoming: Vec::new(),
                });
            }
        }
    }
}

/// Resolves the stack type of every join result from its incoming versions.
///
/// Returns `true` if some join merged definitions of different types.
fn resolve_join_types(list: &StatementList, types: &mut HashMap<u32, Option<StackType>>) -> bool {
    let mut clash = false;
    let mut changed = true;
    while changed {
        changed = false;
        for id in list.live() {
            for join in &list[id].joins {
                let mut resolved: Option<StackType> = None;
                for incoming in &join.incoming {
                    let ty = if incoming.version == 0 {
                        list.variables().stack_type(*incoming)
                    } else {
                        types.get(&incoming.version).copied().flatten()
                    };
                    match (resolved, ty) {
                        (None, Some(ty)) => resolved = Some(ty),
                        (Some(current), Some(ty)) if current != ty => clash = true,
                        _ => {}
                    }
                }
                let entry = types.entry(join.result.version).or_insert(None);
                if resolved.is_some() && *entry != resolved {
                    *entry = resolved;
                    changed = true;
                }
            }
        }
    }
    clash
}

fn parameter_corrupted(list: &StatementList, slot: u16, ty: Option<StackType>) -> bool {
    match list.variables().parameter_slot(slot) {
        Some(Some(declared)) => ty.is_some_and(|ty| ty != declared),
        Some(None) => true,
        None => false,
    }
}

/// Versions every local of `list` and places join markers.
///
/// `local_types` gives the stack type stored by each defining statement, as recorded by
/// lowering.
pub fn assign_versions(
    list: &mut StatementList,
    local_types: &HashMap<StatementId, StackType>,
    comments: &mut DecompilerComments,
    events: &EventLog,
) {
    if list.is_empty() {
        return;
    }

    let graph = ssa_graph(list);
    let dominators = compute_dominators(&graph);
    let live_in = live_slots(list, &graph);
    place_joins(list, &graph, &dominators, &live_in);

    let mut renamer = Renamer {
        stacks: BTreeMap::new(),
        next_temp: 1,
        temp_types: HashMap::new(),
        visited: vec![false; graph.node_count()],
    };
    let mut walk = vec![Walk::Enter(graph.entry())];
    while let Some(step) = walk.pop() {
        match step {
            Walk::Enter(node) => {
                let pushed = renamer.enter(list, &graph, node, local_types);
                walk.push(Walk::Exit(pushed));
                for child in dominators.children(node).iter().rev() {
                    walk.push(Walk::Enter(*child));
                }
            }
            Walk::Exit(pushed) => {
                for slot in pushed.iter().rev() {
                    renamer.pop(*slot);
                }
            }
        }
    }

    let Renamer {
        mut temp_types,
        visited,
        ..
    } = renamer;

    if resolve_join_types(list, &mut temp_types) {
        comments.add(DecompilerComment::TypeClashes);
        events.warn("Join merges values of different stack types");
    }

    // Final versions in positional order.
    let mut finals: HashMap<u32, Variable> = HashMap::new();
    let order: Vec<StatementId> = list.live().collect();
    for id in &order {
        let joins: Vec<(u16, u32)> = list[*id]
            .joins
            .iter()
            .map(|join| (join.slot, join.result.version))
            .collect();
        for (slot, temp) in joins {
            let ty = temp_types
                .get(&temp)
                .copied()
                .flatten()
                .unwrap_or(StackType::Reference);
            let variable = list.variables_mut().define(slot, ty);
            finals.insert(temp, variable);
        }

        if let Some(defined) = list[*id].statement.defined_local() {
            let ty = local_types.get(id).copied();
            if parameter_corrupted(list, defined.slot, ty)
                && comments.add(DecompilerComment::ParameterCorruption)
            {
                events.warn(format!(
                    "Parameter slot {} overwritten at offset {}",
                    defined.slot, list[*id].offset
                ));
            }
            let variable = list
                .variables_mut()
                .define(defined.slot, ty.unwrap_or(StackType::Reference));
            if visited[id.index()] {
                finals.insert(defined.version, variable);
            } else if let Some(LValue::Local(target)) = list[*id].statement.lvalue_mut() {
                *target = variable;
            }
        }
    }

    let map = |variable: &mut Variable| {
        if variable.version != 0 {
            if let Some(resolved) = finals.get(&variable.version) {
                *variable = *resolved;
            }
        }
    };
    for id in &order {
        if !visited[id.index()] {
            continue;
        }
        let statement = &mut list[*id];
        statement.statement.for_each_expression_mut(&mut |expression| {
            expression.walk_mut(&mut |e| {
                if let Expression::Local(variable) = e {
                    map(variable);
                }
            });
        });
        if let Some(LValue::Local(target)) = statement.statement.lvalue_mut() {
            map(target);
        }
        for join in &mut statement.joins {
            map(&mut join.result);
            for incoming in &mut join.incoming {
                map(incoming);
            }
            join.incoming.sort();
            join.incoming.dedup();
        }
    }
}

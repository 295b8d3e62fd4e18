//! Exception region insertion.
//!
//! Turns the method's exception table into explicit try-start and catch-start marker nodes in
//! the [`InstructionGraph`]. After insertion every protected node carries its try block's
//! [`BlockIdentifier`], so the end of a try is simply the first positional node that no longer
//! carries it.
//!
//! # Normalisation
//!
//! Raw tables produced by javac are not directly nestable:
//!
//! 1. Entries with an empty range are dropped.
//! 2. Entries whose handler lies inside their own range are dropped (monitor-exit guards).
//! 3. Entries sharing a handler are merged into a covering range.
//! 4. Entries sharing a range become one region with several handlers; entries sharing range
//!    and handler become a single multi-type catch.
//! 5. Overlapping but not nested ranges are resolved by extending the earlier range, with a
//!    warning event.
//!
//! # Marker placement
//!
//! For a position `p`, the positional order is: catch-starts of handlers at `p`, then
//! try-starts of regions beginning at `p` from outermost to innermost, then instruction `p`.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::{
    analysis::{
        blocks::{BlockFactory, BlockIdentifier, BlockKind},
        graph::{CatchType, InstructionGraph, NodeKind},
    },
    compiler::EventLog,
    metadata::{constants::ConstantPool, method::ExceptionTableEntry},
    utils::graph::NodeId,
    Result,
};

/// One handler of a [`TryRegion`].
#[derive(Debug, Clone)]
pub struct ExceptionHandler {
    /// Instruction index of the handler entry.
    pub handler: usize,
    /// Caught types.
    pub catch_types: Vec<CatchType>,
    /// Identifier of the catch body.
    pub block: BlockIdentifier,
    /// The catch-start marker node.
    pub marker: NodeId,
}

/// A protected instruction range with its handlers.
#[derive(Debug, Clone)]
pub struct TryRegion {
    /// Identifier carried by every protected node.
    pub block: BlockIdentifier,
    /// First protected instruction index.
    pub start: usize,
    /// One past the last protected instruction index.
    pub end: usize,
    /// Handlers in table order.
    pub handlers: Vec<ExceptionHandler>,
    /// The try-start marker node.
    pub marker: NodeId,
}

/// All try regions of a method, outermost first.
#[derive(Debug, Clone, Default)]
pub struct ExceptionRegions {
    regions: Vec<TryRegion>,
}

impl ExceptionRegions {
    /// The regions, outer before inner.
    #[must_use]
    pub fn regions(&self) -> &[TryRegion] {
        &self.regions
    }

    /// Returns `true` if the method has no try regions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Exceptional successors per node: every protected node may transfer control to each
    /// catch-start of the regions protecting it.
    #[must_use]
    pub fn exceptional_successors(&self, graph: &InstructionGraph) -> Vec<Vec<NodeId>> {
        let by_block: HashMap<BlockIdentifier, Vec<NodeId>> = self
            .regions
            .iter()
            .map(|region| {
                (
                    region.block,
                    region.handlers.iter().map(|h| h.marker).collect(),
                )
            })
            .collect();

        graph
            .iter()
            .map(|(_, node)| {
                node.blocks
                    .iter()
                    .filter_map(|block| by_block.get(block))
                    .flatten()
                    .copied()
                    .collect()
            })
            .collect()
    }
}

/// A normalised region before markers are created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PendingRegion {
    pub(crate) start: usize,
    pub(crate) end: usize,
    pub(crate) handlers: Vec<(usize, Vec<CatchType>)>,
}

impl PendingRegion {
    fn contains(&self, index: usize) -> bool {
        self.start <= index && index < self.end
    }
}

/// Resolves and normalises an exception table into properly nested regions.
///
/// The result is sorted outermost first: by start ascending, then by end descending.
///
/// # Errors
/// Returns [`crate::Error::MalformedBytecode`] if an offset is not an instruction boundary or a
/// catch type is not a class constant.
pub(crate) fn normalize_exception_table(
    graph: &InstructionGraph,
    table: &[ExceptionTableEntry],
    pool: &dyn ConstantPool,
    events: &EventLog,
) -> Result<Vec<PendingRegion>> {
    let offsets = graph.offsets();
    let end_index = graph.instruction_count();

    // handler index -> (start, end, types), in first-seen order
    let mut by_handler: Vec<(usize, usize, usize, Vec<CatchType>)> = Vec::new();

    for entry in table {
        let start = offsets.resolve(i32::from(entry.start_pc))?;
        let end = if usize::from(entry.end_pc) == graph.code_length() {
            end_index
        } else {
            offsets.resolve(i32::from(entry.end_pc))?
        };
        let handler = offsets.resolve(i32::from(entry.handler_pc))?;
        let catch_type = match entry.catch_type {
            Some(index) => CatchType::Class(pool.class_name(index)?.to_string()),
            None => CatchType::Any,
        };

        if start >= end {
            events.info(format!(
                "Dropped empty exception range {}..{}",
                entry.start_pc, entry.end_pc
            ));
            continue;
        }
        if start <= handler && handler < end {
            events.info(format!(
                "Dropped self-protecting handler at {} for range {}..{}",
                entry.handler_pc, entry.start_pc, entry.end_pc
            ));
            continue;
        }

        match by_handler.iter_mut().find(|(h, ..)| *h == handler) {
            Some((_, s, e, types)) => {
                *s = (*s).min(start);
                *e = (*e).max(end);
                if !types.contains(&catch_type) {
                    types.push(catch_type);
                }
            }
            None => by_handler.push((handler, start, end, vec![catch_type])),
        }
    }

    let mut regions: Vec<PendingRegion> = Vec::new();
    for (handler, start, end, types) in by_handler {
        if start <= handler && handler < end {
            events.warn(format!(
                "Dropped handler {handler} covered by its own merged range {start}..{end}"
            ));
            continue;
        }
        push_grouped(&mut regions, start, end, vec![(handler, types)]);
    }

    loop {
        regions.sort_by(|a, b| a.start.cmp(&b.start).then(b.end.cmp(&a.end)));

        let mut changed = false;
        for i in 0..regions.len() {
            for j in (i + 1)..regions.len() {
                if regions[j].start >= regions[i].end {
                    break;
                }
                if regions[j].end > regions[i].end {
                    events.warn(format!(
                        "Exception range {}..{} overlaps {}..{}; extended to contain it",
                        regions[i].start, regions[i].end, regions[j].start, regions[j].end
                    ));
                    regions[i].end = regions[j].end;
                    changed = true;
                }
            }
        }

        if !changed {
            break;
        }

        let previous = std::mem::take(&mut regions);
        for region in previous {
            let handlers: Vec<_> = region
                .handlers
                .into_iter()
                .filter(|(handler, _)| !(region.start <= *handler && *handler < region.end))
                .collect();
            if handlers.is_empty() {
                events.warn(format!(
                    "Dropped exception range {}..{} after extension",
                    region.start, region.end
                ));
                continue;
            }
            push_grouped(&mut regions, region.start, region.end, handlers);
        }
    }

    Ok(regions)
}

fn push_grouped(
    regions: &mut Vec<PendingRegion>,
    start: usize,
    end: usize,
    handlers: Vec<(usize, Vec<CatchType>)>,
) {
    match regions
        .iter_mut()
        .find(|region| region.start == start && region.end == end)
    {
        Some(region) => region.handlers.extend(handlers),
        None => regions.push(PendingRegion {
            start,
            end,
            handlers,
        }),
    }
}

/// Inserts try-start and catch-start markers for the method's exception table.
///
/// Original instruction nodes are neither removed nor reordered; only marker nodes are added and
/// edges rerouted through them.
///
/// # Errors
/// Returns [`crate::Error::MalformedBytecode`] for bad table offsets or catch types.
pub fn insert_exception_regions(
    graph: &mut InstructionGraph,
    table: &[ExceptionTableEntry],
    pool: &dyn ConstantPool,
    blocks: &mut BlockFactory,
    events: &EventLog,
) -> Result<ExceptionRegions> {
    let pending = normalize_exception_table(graph, table, pool, events)?;
    if pending.is_empty() {
        return Ok(ExceptionRegions::default());
    }

    let identifiers: Vec<BlockIdentifier> = pending
        .iter()
        .map(|_| blocks.mint(BlockKind::TryBlock))
        .collect();

    for (region, block) in pending.iter().zip(&identifiers) {
        for index in region.start..region.end {
            graph.node_mut(NodeId::new(index)).blocks.insert(*block);
        }
    }

    // Innermost first, so an outer try-start ends up in front of the inner one.
    let mut entry_at: HashMap<usize, NodeId> = HashMap::new();
    let mut try_markers = vec![NodeId::new(0); pending.len()];
    for position in (0..pending.len()).rev() {
        let region = &pending[position];
        let block = identifiers[position];
        let head = entry_at
            .get(&region.start)
            .copied()
            .unwrap_or_else(|| graph.instruction_node(region.start));

        let marker = graph.add_marker(NodeKind::TryStart { block }, region.start);
        graph.node_mut(marker).blocks = pending
            .iter()
            .zip(&identifiers)
            .take(position)
            .filter(|(outer, _)| outer.start <= region.start && region.end <= outer.end)
            .map(|(_, id)| *id)
            .collect();

        let outside: Vec<NodeId> = graph[head]
            .predecessors
            .iter()
            .copied()
            .filter(|pred| !graph[*pred].blocks.contains(&block))
            .collect();
        for pred in outside {
            graph.redirect_edge(pred, head, marker);
        }
        graph.add_edge(marker, head);

        entry_at.insert(region.start, marker);
        try_markers[position] = marker;
    }

    let mut catch_markers: BTreeMap<usize, Vec<NodeId>> = BTreeMap::new();
    let mut regions = Vec::with_capacity(pending.len());
    for (position, region) in pending.iter().enumerate() {
        let try_block = identifiers[position];
        let mut handlers = Vec::with_capacity(region.handlers.len());

        for (handler, catch_types) in &region.handlers {
            let handler = *handler;
            let block = blocks.mint(BlockKind::Catch);
            let marker = graph.add_marker(
                NodeKind::CatchStart {
                    try_block,
                    block,
                    catch_types: catch_types.clone(),
                },
                handler,
            );
            graph.node_mut(marker).blocks = pending
                .iter()
                .zip(&identifiers)
                .filter(|(outer, _)| outer.contains(handler) && outer.start != handler)
                .map(|(_, id)| *id)
                .collect();

            let target = entry_at
                .get(&handler)
                .copied()
                .unwrap_or_else(|| graph.instruction_node(handler));
            let forward: Vec<NodeId> = graph[target]
                .predecessors
                .iter()
                .copied()
                .filter(|pred| graph[*pred].anchor < handler)
                .collect();
            for pred in forward {
                graph.redirect_edge(pred, target, marker);
            }
            graph.add_edge(try_markers[position], marker);
            graph.add_edge(marker, target);

            catch_markers.entry(handler).or_default().push(marker);
            handlers.push(ExceptionHandler {
                handler,
                catch_types: catch_types.clone(),
                block,
                marker,
            });
        }

        regions.push(TryRegion {
            block: try_block,
            start: region.start,
            end: region.end,
            handlers,
            marker: try_markers[position],
        });
    }

    let mut try_at: BTreeMap<usize, Vec<NodeId>> = BTreeMap::new();
    for region in &regions {
        try_at.entry(region.start).or_default().push(region.marker);
    }

    let mut order = Vec::with_capacity(graph.order().len() + regions.len() * 2);
    for index in 0..graph.instruction_count() {
        if let Some(markers) = catch_markers.get(&index) {
            order.extend(markers);
        }
        if let Some(markers) = try_at.get(&index) {
            order.extend(markers);
        }
        order.push(graph.instruction_node(index));
    }
    graph.set_order(order);

    let protected: BTreeSet<NodeId> = graph
        .iter()
        .filter(|(_, node)| !node.blocks.is_empty())
        .map(|(id, _)| id)
        .collect();
    events.info(format!(
        "Inserted {} try regions protecting {} nodes",
        regions.len(),
        protected.len()
    ));

    Ok(ExceptionRegions { regions })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        assembly::{decode_code, InstructionAssembler},
        metadata::constants::ConstantPoolMap,
        utils::graph::{algorithms::reachable, edges_are_symmetric, GraphBase, RootedGraph},
    };

    fn build(
        asm: InstructionAssembler,
        pool: &ConstantPoolMap,
    ) -> Result<(InstructionGraph, ExceptionRegions, EventLog)> {
        let (code, table) = asm.finish()?;
        let mut graph = InstructionGraph::build(decode_code(&code, code.len())?)?;
        let events = EventLog::new();
        let mut blocks = BlockFactory::new();
        let regions = insert_exception_regions(&mut graph, &table, pool, &mut blocks, &events)?;
        Ok((graph, regions, events))
    }

    /// try { call(); } catch (IOException e) { } return;
    fn simple_try(pool: &mut ConstantPoolMap) -> Result<InstructionAssembler> {
        let io = pool.add_class("java/io/IOException");
        let call = pool.add_method("A", "call", "()V");
        let mut asm = InstructionAssembler::new();
        asm.label("start")?
            .invokestatic(call)?
            .label("end")?
            .goto("done")?
            .label("handler")?
            .astore(0)?
            .label("done")?
            .vreturn()?
            .exception_handler("start", "end", "handler", Some(io))?;
        Ok(asm)
    }

    #[test]
    fn test_markers_and_edges() -> Result<()> {
        let mut pool = ConstantPoolMap::new();
        let asm = simple_try(&mut pool)?;
        let (graph, regions, _) = build(asm, &pool)?;

        assert_eq!(regions.regions().len(), 1);
        let region = &regions.regions()[0];
        assert_eq!((region.start, region.end), (1, 2));

        let try_start = region.marker;
        let catch_start = region.handlers[0].marker;
        // sentinel -> try-start -> invokestatic
        assert_eq!(graph[NodeId::new(0)].successors, vec![try_start]);
        assert_eq!(
            graph[try_start].successors,
            vec![NodeId::new(1), catch_start]
        );
        assert_eq!(graph[catch_start].successors, vec![NodeId::new(3)]);
        assert!(graph[NodeId::new(1)].blocks.contains(&region.block));
        assert!(!graph[NodeId::new(2)].blocks.contains(&region.block));
        assert!(edges_are_symmetric(&graph));

        // positional order: sentinel, try, invoke, goto, catch, astore, return
        let order = graph.order();
        assert_eq!(order.len(), 7);
        assert_eq!(order[1], try_start);
        assert_eq!(order[4], catch_start);
        Ok(())
    }

    #[test]
    fn test_reachability_preserved() -> Result<()> {
        let mut pool = ConstantPoolMap::new();
        let asm = simple_try(&mut pool)?;
        let (code, table) = asm.finish()?;

        let mut graph = InstructionGraph::build(decode_code(&code, code.len())?)?;
        let before = reachable(&graph, graph.entry());
        let mut blocks = BlockFactory::new();
        insert_exception_regions(&mut graph, &table, &pool, &mut blocks, &EventLog::new())?;
        let after = reachable(&graph, graph.entry());

        for (index, was_reachable) in before.iter().enumerate() {
            if *was_reachable {
                assert!(after[index]);
            }
        }
        // the handler becomes reachable through its marker
        assert!(!before[3]);
        assert!(after[3]);
        assert_eq!(graph.node_count(), 7);
        Ok(())
    }

    #[test]
    fn test_nested_regions_order() -> Result<()> {
        let mut pool = ConstantPoolMap::new();
        let call = pool.add_method("A", "call", "()V");
        let mut asm = InstructionAssembler::new();
        asm.label("outer")?
            .label("inner")?
            .invokestatic(call)?
            .label("inner_end")?
            .invokestatic(call)?
            .label("outer_end")?
            .goto("done")?
            .label("h_inner")?
            .astore(0)?
            .goto("done")?
            .label("h_outer")?
            .astore(0)?
            .label("done")?
            .vreturn()?
            .exception_handler("inner", "inner_end", "h_inner", None)?
            .exception_handler("outer", "outer_end", "h_outer", None)?;
        let (graph, regions, _) = build(asm, &pool)?;

        let [outer, inner] = regions.regions() else {
            panic!("expected two regions");
        };
        assert!(outer.block < inner.block);
        assert_eq!((outer.start, outer.end), (1, 3));
        assert_eq!((inner.start, inner.end), (1, 2));
        // outer try-start precedes the inner one and leads into it
        assert_eq!(graph[outer.marker].successors[0], inner.marker);
        assert!(graph[inner.marker].blocks.contains(&outer.block));
        assert!(!graph[outer.marker].blocks.contains(&inner.block));
        let order = graph.order();
        assert_eq!(order[1], outer.marker);
        assert_eq!(order[2], inner.marker);
        assert!(edges_are_symmetric(&graph));
        Ok(())
    }

    #[test]
    fn test_normalisation_merges_and_drops() -> Result<()> {
        let mut pool = ConstantPoolMap::new();
        let call = pool.add_method("A", "call", "()V");
        let a = pool.add_class("A");
        let b = pool.add_class("B");
        let mut asm = InstructionAssembler::new();
        asm.label("s0")?
            .invokestatic(call)?
            .label("s1")?
            .invokestatic(call)?
            .label("s2")?
            .goto("done")?
            .label("h")?
            .astore(0)?
            .label("h_end")?
            .goto("done")?
            .label("done")?
            .vreturn()?
            // split ranges sharing one handler
            .exception_handler("s0", "s1", "h", Some(a))?
            .exception_handler("s1", "s2", "h", Some(b))?
            // self-protecting
            .exception_handler("h", "h_end", "h", None)?
            // empty
            .exception_handler("s1", "s1", "h", None)?;
        let (code, table) = asm.finish()?;
        let graph = InstructionGraph::build(decode_code(&code, code.len())?)?;
        let events = EventLog::new();

        let regions = normalize_exception_table(&graph, &table, &pool, &events)?;
        assert_eq!(regions.len(), 1);
        assert_eq!((regions[0].start, regions[0].end), (1, 3));
        assert_eq!(
            regions[0].handlers,
            vec![(
                4,
                vec![CatchType::Class("A".into()), CatchType::Class("B".into())]
            )]
        );
        Ok(())
    }

    #[test]
    fn test_overlap_is_extended_with_warning() -> Result<()> {
        let mut pool = ConstantPoolMap::new();
        let call = pool.add_method("A", "call", "()V");
        let mut asm = InstructionAssembler::new();
        asm.label("a")?
            .invokestatic(call)?
            .label("b")?
            .invokestatic(call)?
            .label("c")?
            .invokestatic(call)?
            .label("d")?
            .goto("done")?
            .label("h1")?
            .astore(0)?
            .goto("done")?
            .label("h2")?
            .astore(0)?
            .label("done")?
            .vreturn()?
            .exception_handler("a", "c", "h1", None)?
            .exception_handler("b", "d", "h2", None)?;
        let (code, table) = asm.finish()?;
        let graph = InstructionGraph::build(decode_code(&code, code.len())?)?;
        let events = EventLog::new();

        let regions = normalize_exception_table(&graph, &table, &pool, &events)?;
        assert_eq!(regions.len(), 2);
        assert_eq!((regions[0].start, regions[0].end), (1, 4));
        assert_eq!((regions[1].start, regions[1].end), (2, 4));
        assert_eq!(events.warnings().count(), 1);
        Ok(())
    }
}

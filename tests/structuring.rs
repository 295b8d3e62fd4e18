//! End-to-end structuring tests.
//!
//! These tests drive whole methods through the public API:
//! 1. Build JVM bytecode using `InstructionAssembler`
//! 2. Decompile with `MethodDecompiler`
//! 3. Inspect the `StructuredStatement` tree, the comments and the event log
//!
//! The lower-level properties (offset tables, edge symmetry, SSA versions) are checked against
//! the stage functions in `jvmscope::analysis`.

use std::collections::BTreeMap;

use jvmscope::{
    analysis::{
        assign_versions, insert_exception_regions, lower_graph, simulate_stack, BlockFactory,
        InstructionGraph, LoweredMethod,
    },
    assembly::{decode_code, InstructionAssembler},
    compiler::{
        DecompilerComment, DecompilerComments, EventKind, EventLog, PassContext, Pipeline,
        RemovePointlessJumpsPass,
    },
    ir::{RawNames, Statement, StatementList, VariableNamer},
    metadata::descriptor::MethodDescriptor,
    structured::StructuredStatement,
    utils::graph::{algorithms::reachable, edges_are_symmetric, GraphBase, RootedGraph},
    ConstantPoolMap, DecompilerConfig, Error, MethodBody, MethodDecompiler, MethodFlags, Result,
};

struct Fixture {
    pool: ConstantPoolMap,
    out: u16,
    println: u16,
    exception: u16,
}

impl Fixture {
    fn new() -> Self {
        let mut pool = ConstantPoolMap::new();
        let out = pool.add_field("java/lang/System", "out", "Ljava/io/PrintStream;");
        let println = pool.add_method("java/io/PrintStream", "println", "(I)V");
        let exception = pool.add_class("java/lang/Exception");
        Fixture {
            pool,
            out,
            println,
            exception,
        }
    }

    /// `System.out.println(i)` for local `slot`.
    fn print_local(&self, asm: &mut InstructionAssembler, slot: u16) -> Result<()> {
        asm.getstatic(self.out)?
            .iload(slot)?
            .invokevirtual(self.println)?;
        Ok(())
    }

    /// `System.out.println(value)`.
    fn print_value(&self, asm: &mut InstructionAssembler, value: i32) -> Result<()> {
        asm.getstatic(self.out)?
            .iconst(value)?
            .invokevirtual(self.println)?;
        Ok(())
    }

    /// `for (int i = 0; i < n; i++) System.out.println(i);` with `n` in slot 0.
    fn counting_loop(&self, asm: &mut InstructionAssembler) -> Result<()> {
        asm.iconst(0)?.istore(1)?.label("test")?.iload(1)?.iload(0)?.if_icmpge("done")?;
        self.print_local(asm, 1)?;
        asm.iinc(1, 1)?.goto("test")?.label("done")?;
        Ok(())
    }
}

fn static_method(name: &str, descriptor: &str, asm: InstructionAssembler) -> Result<MethodBody> {
    let (code, table) = asm.finish()?;
    Ok(MethodBody::new(name, descriptor, code)
        .with_flags(MethodFlags::PUBLIC | MethodFlags::STATIC)
        .with_exception_table(table))
}

fn lower(body: &MethodBody, pool: &ConstantPoolMap) -> Result<LoweredMethod> {
    let code = body.declared_code()?;
    let mut graph = InstructionGraph::build(decode_code(code, code.len())?)?;
    let mut blocks = BlockFactory::new();
    insert_exception_regions(&mut graph, &body.exception_table, pool, &mut blocks, &EventLog::new())?;
    let entries = simulate_stack(&mut graph, pool)?;
    let namer = VariableNamer::new(body.is_static(), &body.parsed_descriptor()?);
    lower_graph(&graph, &entries, pool, blocks, namer)
}

fn versioned(body: &MethodBody, pool: &ConstantPoolMap) -> Result<StatementList> {
    let mut lowered = lower(body, pool)?;
    assign_versions(
        &mut lowered.list,
        &lowered.local_types,
        &mut DecompilerComments::new(),
        &EventLog::new(),
    );
    Ok(lowered.list)
}

#[test]
fn test_scenario_counting_loop_becomes_for() -> Result<()> {
    let fixture = Fixture::new();
    let mut asm = InstructionAssembler::new();
    fixture.counting_loop(&mut asm)?;
    asm.vreturn()?;
    let body = static_method("count", "(I)V", asm)?;

    let result = MethodDecompiler::new(&fixture.pool).decompile(&body)?;
    assert_eq!(result.root.count(StructuredStatement::is_loop), 1);

    let StructuredStatement::For {
        init, body: inner, ..
    } = &result.root.statements()[0]
    else {
        panic!("expected a for loop:\n{}", result.dump());
    };
    assert!(init.is_some());
    assert_eq!(
        inner.count(|node| matches!(
            node,
            StructuredStatement::Jump { .. }
                | StructuredStatement::Label(_)
                | StructuredStatement::If { .. }
        )),
        0
    );
    assert_eq!(
        result.dump(),
        "for (var1 = 0; var1 < param1; var1 = var1 + 1) {\n    \
         java.lang.System.out.println(var1);\n\
         }\n\
         return;\n"
    );
    assert!(result.comments.is_empty());
    assert!(result.events.has(EventKind::ForLoopCreated));
    Ok(())
}

#[test]
fn test_scenario_try_around_loop() -> Result<()> {
    let fixture = Fixture::new();
    let mut asm = InstructionAssembler::new();
    asm.label("start")?;
    fixture.counting_loop(&mut asm)?;
    asm.label("end")?
        .goto("after")?
        .label("handler")?
        .astore(2)?
        .vreturn()?
        .label("after")?
        .vreturn()?
        .exception_handler("start", "end", "handler", Some(fixture.exception))?;
    let body = static_method("guarded", "(I)V", asm)?;

    let result = MethodDecompiler::new(&fixture.pool).decompile(&body)?;
    let StructuredStatement::TryCatch {
        block: try_block,
        body: protected,
        catches,
    } = &result.root.statements()[0]
    else {
        panic!("expected a try statement:\n{}", result.dump());
    };
    assert_eq!(catches.len(), 1);
    assert_eq!(protected.statements().len(), 1);
    let loop_block = match &protected.statements()[0] {
        StructuredStatement::For { block, .. } | StructuredStatement::While { block, .. } => *block,
        other => panic!("expected a loop inside the try, got {other:?}"),
    };
    // outer regions are minted first
    assert!(*try_block < loop_block);
    assert!(!result.is_partial());
    Ok(())
}

#[test]
fn test_while_loop_ending_a_try() -> Result<()> {
    let fixture = Fixture::new();
    let mut asm = InstructionAssembler::new();
    asm.label("start")?.label("top")?.iload(0)?.ifeq("done")?;
    fixture.print_local(&mut asm, 0)?;
    asm.iinc(0, -1)?
        .goto("top")?
        .label("done")?
        .label("end")?
        .goto("after")?
        .label("handler")?
        .astore(1)?
        .vreturn()?
        .label("after")?
        .vreturn()?
        .exception_handler("start", "end", "handler", Some(fixture.exception))?;
    let body = static_method("drain", "(I)V", asm)?;

    let result = MethodDecompiler::new(&fixture.pool).decompile(&body)?;
    let StructuredStatement::TryCatch {
        body: protected,
        catches,
        ..
    } = &result.root.statements()[0]
    else {
        panic!("expected a try statement:\n{}", result.dump());
    };
    assert_eq!(catches.len(), 1);
    assert!(matches!(
        protected.statements(),
        [StructuredStatement::While {
            condition: Some(_),
            ..
        }]
    ));
    assert!(result.dump().contains("while (param1 != 0) {\n"));
    assert_eq!(
        result
            .root
            .count(|node| matches!(node, StructuredStatement::Jump { .. })),
        0
    );
    assert!(!result.is_partial());
    Ok(())
}

#[test]
fn test_handler_after_unprotected_return() -> Result<()> {
    let fixture = Fixture::new();
    let mut asm = InstructionAssembler::new();
    asm.label("start")?;
    fixture.print_local(&mut asm, 0)?;
    asm.label("end")?
        .vreturn()?
        .label("handler")?
        .astore(1)?
        .vreturn()?
        .exception_handler("start", "end", "handler", Some(fixture.exception))?;
    let body = static_method("report", "(I)V", asm)?;

    let result = MethodDecompiler::new(&fixture.pool).decompile(&body)?;
    let children = result.root.statements();
    assert_eq!(children.len(), 2, "{}", result.dump());
    let StructuredStatement::TryCatch { catches, .. } = &children[0] else {
        panic!("expected a try statement:\n{}", result.dump());
    };
    assert_eq!(catches.len(), 1);
    assert!(matches!(
        catches[0].body,
        StructuredStatement::Statement(Statement::Return(None))
    ));
    assert!(matches!(
        children[1],
        StructuredStatement::Statement(Statement::Return(None))
    ));
    assert_eq!(
        result.dump(),
        "try {\n    \
         java.lang.System.out.println(param1);\n\
         } catch (java.lang.Exception var1) {\n    \
         return;\n\
         }\n\
         return;\n"
    );
    assert!(!result.is_partial());
    Ok(())
}

#[test]
fn test_overlapping_ranges_keep_their_handlers() -> Result<()> {
    let fixture = Fixture::new();
    let mut asm = InstructionAssembler::new();
    asm.label("a")?;
    fixture.print_value(&mut asm, 1)?;
    asm.label("b")?;
    fixture.print_value(&mut asm, 2)?;
    asm.label("c")?;
    fixture.print_value(&mut asm, 3)?;
    asm.label("d")?.goto("done")?.label("h1")?.astore(0)?;
    fixture.print_value(&mut asm, 4)?;
    asm.goto("done")?.label("h2")?.astore(0)?;
    fixture.print_value(&mut asm, 5)?;
    asm.label("done")?
        .vreturn()?
        .exception_handler("a", "c", "h1", Some(fixture.exception))?
        .exception_handler("b", "d", "h2", Some(fixture.exception))?;
    let body = static_method("overlap", "()V", asm)?;

    let result = MethodDecompiler::new(&fixture.pool).decompile(&body)?;
    assert!(result.events.warnings().count() >= 1);

    let mut tries = Vec::new();
    result.root.walk(&mut |node| {
        if let StructuredStatement::TryCatch { body, catches, .. } = node {
            let handler = catches.first().map_or(0, |clause| clause.body.statements().len());
            tries.push((body.statements().len(), catches.len(), handler));
        }
    });
    assert_eq!(tries.len(), 2, "{}", result.dump());
    for (body, catches, handler) in &tries {
        assert!(*body > 0);
        assert_eq!(*catches, 1);
        assert!(*handler > 0);
    }

    // the inner try sits inside the outer one, with its own handler
    let StructuredStatement::TryCatch { body: outer, .. } = &result.root.statements()[0] else {
        panic!("expected a try statement:\n{}", result.dump());
    };
    assert_eq!(
        outer.count(|node| matches!(node, StructuredStatement::TryCatch { .. })),
        1
    );
    assert!(!result.is_partial(), "{}", result.dump());
    Ok(())
}

#[test]
fn test_scenario_dup_lowers_to_copy() -> Result<()> {
    let pool = ConstantPoolMap::new();
    let mut asm = InstructionAssembler::new();
    asm.iload(0)?.dup()?.iadd()?.ireturn()?;
    let body = static_method("twice", "(I)I", asm)?;

    let lowered = lower(&body, &pool)?;
    let lines: Vec<String> = lowered
        .list
        .live()
        .filter(|id| !lowered.list[*id].statement.is_nop())
        .map(|id| lowered.list[id].statement.display(&RawNames).to_string())
        .collect();
    assert_eq!(lines, ["s0 = v0_0", "s1 = s0", "s2 = s1", "s3 = s1 + s2", "return s3"]);
    assert!(edges_are_symmetric(&lowered.list));
    Ok(())
}

#[test]
fn test_scenario_misaligned_jump_fails_alone() -> Result<()> {
    let fixture = Fixture::new();
    // goto +1 lands inside its own operand
    let broken = MethodBody::new("broken", "()V", vec![0xA7, 0x00, 0x01, 0xB1])
        .with_flags(MethodFlags::STATIC);
    let mut asm = InstructionAssembler::new();
    fixture.counting_loop(&mut asm)?;
    asm.vreturn()?;
    let good = static_method("count", "(I)V", asm)?;

    let results = MethodDecompiler::new(&fixture.pool).decompile_all(&[broken, good]);
    assert!(matches!(results[0], Err(Error::MalformedBytecode { .. })));
    let good = results[1].as_ref().map_err(|e| Error::GraphError(e.to_string()))?;
    assert_eq!(good.name, "count");
    assert_eq!(good.root.count(StructuredStatement::is_loop), 1);
    Ok(())
}

#[test]
fn test_offset_lookups_are_inverse() -> Result<()> {
    let fixture = Fixture::new();
    let mut asm = InstructionAssembler::new();
    fixture.counting_loop(&mut asm)?;
    asm.vreturn()?;
    let (code, _) = asm.finish()?;

    let decoded = decode_code(&code, code.len())?;
    assert_eq!(decoded.offsets.len(), decoded.instructions.len());
    for (index, offset) in decoded.offsets.iter() {
        assert_eq!(decoded.offsets.index_of(offset), Some(index));
        assert_eq!(decoded.offsets.offset_of(index), Some(offset));
    }
    // an operand byte is not an instruction start
    let wide = decoded
        .offsets
        .iter()
        .find(|(index, offset)| {
            decoded
                .offsets
                .offset_of(index + 1)
                .is_some_and(|next| next > offset + 1)
        })
        .map(|(_, offset)| offset + 1);
    if let Some(inside) = wide {
        assert_eq!(decoded.offsets.index_of(inside), None);
    }
    Ok(())
}

/// Offsets of the instructions reachable from the entry.
fn reachable_offsets(graph: &InstructionGraph) -> Vec<i32> {
    let seen = reachable(graph, graph.entry());
    graph
        .iter()
        .filter(|(id, node)| seen[id.index()] && !node.is_marker())
        .map(|(_, node)| node.offset(graph))
        .collect()
}

#[test]
fn test_exception_insertion_keeps_instructions_and_reachability() -> Result<()> {
    let fixture = Fixture::new();
    let mut asm = InstructionAssembler::new();
    asm.label("start")?;
    fixture.print_local(&mut asm, 0)?;
    asm.label("end")?
        .goto("after")?
        .label("handler")?
        .astore(1)?
        .label("after")?
        .vreturn()?
        .exception_handler("start", "end", "handler", Some(fixture.exception))?;
    let (code, table) = asm.finish()?;

    let mut graph = InstructionGraph::build(decode_code(&code, code.len())?)?;
    assert!(edges_are_symmetric(&graph));
    let before = reachable_offsets(&graph);
    let count = graph.instruction_count();

    insert_exception_regions(&mut graph, &table, &fixture.pool, &mut BlockFactory::new(), &EventLog::new())?;
    assert!(edges_are_symmetric(&graph));
    assert_eq!(graph.instruction_count(), count);
    let instructions = graph
        .iter()
        .filter(|(_, node)| node.instruction().is_some())
        .count();
    assert_eq!(instructions, count);

    let after = reachable_offsets(&graph);
    for offset in before {
        assert!(after.contains(&offset), "offset {offset} became unreachable");
    }
    assert!(graph.node_count() > count);
    Ok(())
}

#[test]
fn test_ssa_versions_are_unique_and_increasing() -> Result<()> {
    let fixture = Fixture::new();
    let mut asm = InstructionAssembler::new();
    fixture.counting_loop(&mut asm)?;
    asm.iconst(5)?.istore(1)?;
    fixture.print_local(&mut asm, 1)?;
    asm.vreturn()?;
    let body = static_method("versions", "(I)V", asm)?;
    let list = versioned(&body, &fixture.pool)?;

    let mut last: BTreeMap<u16, u32> = BTreeMap::new();
    let mut definitions = 0;
    for id in list.live() {
        let Statement::Assignment(assignment) = &list[id].statement else {
            continue;
        };
        let Some(variable) = assignment.target.local() else {
            continue;
        };
        definitions += 1;
        if let Some(previous) = last.insert(variable.slot, variable.version) {
            assert!(
                variable.version > previous,
                "slot {} went from version {previous} to {}",
                variable.slot,
                variable.version
            );
        }
    }
    assert_eq!(definitions, 3);
    assert!(edges_are_symmetric(&list));
    Ok(())
}

#[test]
fn test_edges_stay_symmetric_through_pipeline() -> Result<()> {
    let fixture = Fixture::new();
    let mut asm = InstructionAssembler::new();
    asm.label("start")?;
    fixture.counting_loop(&mut asm)?;
    asm.label("end")?
        .goto("after")?
        .label("handler")?
        .astore(2)?
        .label("after")?
        .vreturn()?
        .exception_handler("start", "end", "handler", None)?;
    let body = static_method("symmetric", "(I)V", asm)?;
    let mut list = versioned(&body, &fixture.pool)?;

    let config = DecompilerConfig::default();
    let events = EventLog::new();
    let mut comments = DecompilerComments::new();
    let mut ctx = PassContext::new("symmetric", &config, &events, &mut comments);
    let names: Vec<&str> = Pipeline::standard().pass_names().collect();
    for name in &names {
        let mut partial = list.clone();
        Pipeline::standard().until(name).run(&mut partial, &mut ctx);
        assert!(edges_are_symmetric(&partial), "edges broken after {name}");
    }
    Pipeline::standard().run(&mut list, &mut ctx);
    assert!(edges_are_symmetric(&list));
    Ok(())
}

#[test]
fn test_pointless_jump_removal_is_idempotent() -> Result<()> {
    let fixture = Fixture::new();
    let mut asm = InstructionAssembler::new();
    asm.iload(0)?
        .ifeq("skip")?
        .goto("skip")?
        .label("skip")?
        .goto("next")?
        .label("next")?;
    fixture.print_local(&mut asm, 0)?;
    asm.vreturn()?;
    let body = static_method("jumps", "(I)V", asm)?;
    let mut list = versioned(&body, &fixture.pool)?;

    let config = DecompilerConfig::default();
    let events = EventLog::new();
    let mut comments = DecompilerComments::new();
    let mut ctx = PassContext::new("jumps", &config, &events, &mut comments);
    let mut pipeline = Pipeline::empty();
    pipeline.add(RemovePointlessJumpsPass::new());

    assert!(pipeline.run(&mut list, &mut ctx));
    let once = list.listing();
    assert!(!pipeline.run(&mut list, &mut ctx));
    assert_eq!(list.listing(), once);
    Ok(())
}

#[test]
fn test_monitor_pruning_comment() -> Result<()> {
    let fixture = Fixture::new();
    let mut asm = InstructionAssembler::new();
    asm.aload(0)?.dup()?.astore(1)?.monitorenter()?.label("start")?;
    asm.getstatic(fixture.out)?.iconst(1)?.invokevirtual(fixture.println)?;
    asm.aload(1)?
        .monitorexit()?
        .label("end")?
        .goto("after")?
        .label("handler")?
        .astore(2)?
        .aload(1)?
        .monitorexit()?
        .aload(2)?
        .athrow()?
        .label("after")?
        .vreturn()?
        .exception_handler("start", "end", "handler", None)?;
    let body = static_method("locked", "(Ljava/lang/Object;)V", asm)?;

    let result = MethodDecompiler::new(&fixture.pool).decompile(&body)?;
    assert_eq!(
        result.dump(),
        "synchronized (param1) {\n    java.lang.System.out.println(1);\n}\nreturn;\n"
    );
    assert!(result.comments.contains(DecompilerComment::PrunedExceptions));
    assert!(!result.is_partial());

    let result = MethodDecompiler::with_config(&fixture.pool, DecompilerConfig::minimal())
        .decompile(&body)?;
    assert!(result.dump().contains("// monitorenter("));
    assert!(result.comments.contains(DecompilerComment::CommentedMonitors));
    Ok(())
}

#[test]
fn test_descriptor_errors_are_malformed() {
    let pool = ConstantPoolMap::new();
    let body = MethodBody::new("bad", "(Q)V", vec![0xB1]);
    let result = MethodDecompiler::new(&pool).decompile(&body);
    assert!(matches!(result, Err(ref e) if e.is_malformed()));
    assert!(MethodDescriptor::parse("(Q)V").is_err());
}

//! Shared fixtures for unit tests.
//!
//! Methods are written with [`InstructionAssembler`] against the constant pool returned by
//! [`pool`], whose indices are fixed so tests can name them directly.

use crate::{
    analysis::{assign_versions, LoweredMethod},
    assembly::InstructionAssembler,
    compiler::{DecompilerComments, EventLog, PassContext, Pipeline},
    config::DecompilerConfig,
    decompiler::lower_method,
    ir::{RawNames, StatementList},
    metadata::{
        constants::ConstantPoolMap,
        method::{MethodBody, MethodFlags},
    },
    Result,
};

/// `java/lang/Object`
pub const OBJECT: u16 = 1;
/// `java/lang/Object.<init>()V`
pub const OBJECT_INIT: u16 = 2;
/// `java/lang/Exception`
pub const EXCEPTION: u16 = 3;
/// `java/lang/System.out`
pub const SYSTEM_OUT: u16 = 4;
/// `java/io/PrintStream.println(I)V`
pub const PRINTLN_INT: u16 = 5;
/// `java/util/List.iterator()`
pub const LIST_ITERATOR: u16 = 6;
/// `java/util/Iterator.hasNext()Z`
pub const HAS_NEXT: u16 = 7;
/// `java/util/Iterator.next()`
pub const NEXT: u16 = 8;
/// `java/lang/String`
pub const STRING: u16 = 9;
/// `java/io/BufferedReader.readLine()`
pub const READ_LINE: u16 = 10;
/// `java/io/PrintStream.println(Ljava/lang/String;)V`
pub const PRINTLN_STRING: u16 = 11;
/// `"hello"`
pub const HELLO: u16 = 12;

/// The fixture constant pool.
pub fn pool() -> ConstantPoolMap {
    let mut pool = ConstantPoolMap::new();
    pool.add_class("java/lang/Object");
    pool.add_method("java/lang/Object", "<init>", "()V");
    pool.add_class("java/lang/Exception");
    pool.add_field("java/lang/System", "out", "Ljava/io/PrintStream;");
    pool.add_method("java/io/PrintStream", "println", "(I)V");
    pool.add_interface_method("java/util/List", "iterator", "()Ljava/util/Iterator;");
    pool.add_interface_method("java/util/Iterator", "hasNext", "()Z");
    pool.add_interface_method("java/util/Iterator", "next", "()Ljava/lang/Object;");
    pool.add_class("java/lang/String");
    pool.add_method("java/io/BufferedReader", "readLine", "()Ljava/lang/String;");
    pool.add_method("java/io/PrintStream", "println", "(Ljava/lang/String;)V");
    pool.add_string("hello");
    pool
}

/// Finishes `asm` into a method body named `test`.
pub fn method_body(asm: InstructionAssembler, descriptor: &str, is_static: bool) -> Result<MethodBody> {
    let (code, table) = asm.finish()?;
    let body = MethodBody::new("test", descriptor, code).with_exception_table(table);
    Ok(if is_static {
        body.with_flags(MethodFlags::PUBLIC | MethodFlags::STATIC)
    } else {
        body
    })
}

/// Lowers an assembled method against the fixture pool.
pub fn lower_assembled(
    asm: InstructionAssembler,
    descriptor: &str,
    is_static: bool,
) -> Result<LoweredMethod> {
    let body = method_body(asm, descriptor, is_static)?;
    lower_method(&body, &pool(), &EventLog::new())
}

/// Lowers and versions an assembled method.
pub fn versioned_statements(
    asm: InstructionAssembler,
    descriptor: &str,
    is_static: bool,
) -> Result<StatementList> {
    let mut lowered = lower_assembled(asm, descriptor, is_static)?;
    assign_versions(
        &mut lowered.list,
        &lowered.local_types,
        &mut DecompilerComments::new(),
        &EventLog::new(),
    );
    Ok(lowered.list)
}

/// Outcome of running part of the pipeline.
pub struct Structured {
    pub list: StatementList,
    pub events: EventLog,
    pub comments: DecompilerComments,
}

/// Versions an assembled method and runs the standard pipeline up to and including the first
/// pass named `last`.
pub fn structured_until(
    asm: InstructionAssembler,
    descriptor: &str,
    is_static: bool,
    last: &str,
    config: &DecompilerConfig,
) -> Result<Structured> {
    run_pipeline(asm, descriptor, is_static, Pipeline::standard().until(last), config)
}

/// Versions an assembled method and runs the whole standard pipeline.
pub fn fully_structured(
    asm: InstructionAssembler,
    descriptor: &str,
    is_static: bool,
    config: &DecompilerConfig,
) -> Result<Structured> {
    run_pipeline(asm, descriptor, is_static, Pipeline::standard(), config)
}

fn run_pipeline(
    asm: InstructionAssembler,
    descriptor: &str,
    is_static: bool,
    pipeline: Pipeline,
    config: &DecompilerConfig,
) -> Result<Structured> {
    let mut list = versioned_statements(asm, descriptor, is_static)?;
    let events = EventLog::new();
    let mut comments = DecompilerComments::new();
    {
        let mut ctx = PassContext::new("test", config, &events, &mut comments);
        pipeline.run(&mut list, &mut ctx);
    }
    Ok(Structured {
        list,
        events,
        comments,
    })
}

/// Live statements other than no-ops, rendered with raw names.
pub fn rendered(list: &StatementList) -> Vec<String> {
    list.live()
        .filter(|id| !list[*id].statement.is_nop())
        .map(|id| list[id].statement.display(&RawNames).to_string())
        .collect()
}

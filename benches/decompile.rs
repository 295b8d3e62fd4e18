//! Benchmarks for per-method decompilation.
//!
//! Tests end-to-end performance for representative method shapes:
//! - Decoding alone
//! - A counted loop (for-loop recognition)
//! - A try around a loop (exception regions and catch bodies)
//! - A synchronized block (monitor pairing and handler pruning)
//! - A batch of methods decompiled in parallel

extern crate jvmscope;

use criterion::{criterion_group, criterion_main, Criterion};
use jvmscope::{
    assembly::{decode_code, InstructionAssembler},
    ConstantPoolMap, MethodBody, MethodDecompiler, MethodFlags, Result,
};
use std::hint::black_box;

struct Pool {
    pool: ConstantPoolMap,
    out: u16,
    println: u16,
    exception: u16,
}

fn pool() -> Pool {
    let mut pool = ConstantPoolMap::new();
    let out = pool.add_field("java/lang/System", "out", "Ljava/io/PrintStream;");
    let println = pool.add_method("java/io/PrintStream", "println", "(I)V");
    let exception = pool.add_class("java/lang/Exception");
    Pool {
        pool,
        out,
        println,
        exception,
    }
}

fn method(name: &str, descriptor: &str, asm: InstructionAssembler) -> Result<MethodBody> {
    let (code, table) = asm.finish()?;
    Ok(MethodBody::new(name, descriptor, code)
        .with_flags(MethodFlags::STATIC)
        .with_exception_table(table))
}

/// static void count(int n) { for (int i = 0; i < n; i++) System.out.println(i); }
fn counting_loop(pool: &Pool) -> Result<MethodBody> {
    let mut asm = InstructionAssembler::new();
    asm.iconst(0)?
        .istore(1)?
        .label("test")?
        .iload(1)?
        .iload(0)?
        .if_icmpge("done")?
        .getstatic(pool.out)?
        .iload(1)?
        .invokevirtual(pool.println)?
        .iinc(1, 1)?
        .goto("test")?
        .label("done")?
        .vreturn()?;
    method("count", "(I)V", asm)
}

/// A counted loop inside a try with one catch.
fn guarded_loop(pool: &Pool) -> Result<MethodBody> {
    let mut asm = InstructionAssembler::new();
    asm.label("start")?
        .iconst(0)?
        .istore(1)?
        .label("test")?
        .iload(1)?
        .iload(0)?
        .if_icmpge("end")?
        .getstatic(pool.out)?
        .iload(1)?
        .invokevirtual(pool.println)?
        .iinc(1, 1)?
        .goto("test")?
        .label("end")?
        .goto("after")?
        .label("handler")?
        .astore(2)?
        .getstatic(pool.out)?
        .iconst(-1)?
        .invokevirtual(pool.println)?
        .label("after")?
        .vreturn()?
        .exception_handler("start", "end", "handler", Some(pool.exception))?;
    method("guarded", "(I)V", asm)
}

/// static void locked(Object o) { synchronized (o) { System.out.println(1); } }
fn synchronized_block(pool: &Pool) -> Result<MethodBody> {
    let mut asm = InstructionAssembler::new();
    asm.aload(0)?
        .dup()?
        .astore(1)?
        .monitorenter()?
        .label("start")?
        .getstatic(pool.out)?
        .iconst(1)?
        .invokevirtual(pool.println)?
        .aload(1)?
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
    method("locked", "(Ljava/lang/Object;)V", asm)
}

/// Benchmark decoding the bytes of a counted loop.
fn bench_decode_loop(c: &mut Criterion) {
    let pool = pool();
    let body = counting_loop(&pool).unwrap();

    c.bench_function("decode_loop", |b| {
        b.iter(|| {
            let decoded = decode_code(black_box(&body.code), body.code_length).unwrap();
            black_box(decoded)
        });
    });
}

/// Benchmark decompiling a counted loop into a for statement.
fn bench_decompile_for_loop(c: &mut Criterion) {
    let pool = pool();
    let body = counting_loop(&pool).unwrap();
    let decompiler = MethodDecompiler::new(&pool.pool);

    c.bench_function("decompile_for_loop", |b| {
        b.iter(|| {
            let result = decompiler.decompile(black_box(&body)).unwrap();
            black_box(result)
        });
    });
}

/// Benchmark decompiling a try/catch wrapped around a loop.
fn bench_decompile_try_loop(c: &mut Criterion) {
    let pool = pool();
    let body = guarded_loop(&pool).unwrap();
    let decompiler = MethodDecompiler::new(&pool.pool);

    c.bench_function("decompile_try_loop", |b| {
        b.iter(|| {
            let result = decompiler.decompile(black_box(&body)).unwrap();
            black_box(result)
        });
    });
}

/// Benchmark decompiling a synchronized block with its javac release handler.
fn bench_decompile_synchronized(c: &mut Criterion) {
    let pool = pool();
    let body = synchronized_block(&pool).unwrap();
    let decompiler = MethodDecompiler::new(&pool.pool);

    c.bench_function("decompile_synchronized", |b| {
        b.iter(|| {
            let result = decompiler.decompile(black_box(&body)).unwrap();
            black_box(result)
        });
    });
}

/// Benchmark decompiling a batch of 64 methods in parallel.
fn bench_decompile_batch(c: &mut Criterion) {
    let pool = pool();
    let mut methods = Vec::new();
    for _ in 0..16 {
        methods.push(counting_loop(&pool).unwrap());
        methods.push(guarded_loop(&pool).unwrap());
        methods.push(synchronized_block(&pool).unwrap());
        methods.push(MethodBody::new("broken", "()V", vec![0xA7, 0x00, 0x01, 0xB1]));
    }
    let decompiler = MethodDecompiler::new(&pool.pool);

    c.bench_function("decompile_batch_64", |b| {
        b.iter(|| {
            let results = decompiler.decompile_all(black_box(&methods));
            black_box(results)
        });
    });
}

criterion_group!(
    benches,
    bench_decode_loop,
    bench_decompile_for_loop,
    bench_decompile_try_loop,
    bench_decompile_synchronized,
    bench_decompile_batch,
);
criterion_main!(benches);

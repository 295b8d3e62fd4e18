#![no_main]

use jvmscope::{decompile_method, ConstantPoolMap, MethodBody, MethodFlags};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut pool = ConstantPoolMap::new();
    pool.add_class("java/lang/Object");
    pool.add_field("java/lang/System", "out", "Ljava/io/PrintStream;");
    pool.add_method("java/io/PrintStream", "println", "(I)V");
    pool.add_string("fuzz");

    // first byte picks the shape of the method, the rest is code
    let (descriptor, flags) = match data.first().map(|b| b % 3) {
        Some(0) => ("()V", MethodFlags::STATIC),
        Some(1) => ("(I)I", MethodFlags::STATIC),
        _ => ("(Ljava/lang/Object;J)V", MethodFlags::PUBLIC),
    };
    let code = data.get(1..).unwrap_or_default().to_vec();
    let body = MethodBody::new("fuzz", descriptor, code).with_flags(flags);
    if let Ok(result) = decompile_method(&body, &pool) {
        let _ = result.dump();
    }
});

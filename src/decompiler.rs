//! Per-method decompilation entry points.
//!
//! [`MethodDecompiler`] drives one method through every stage:
//!
//! 1. **Decoding**: bytes to instructions with an offset table
//! 2. **Graph**: successor and predecessor edges, then exception region markers
//! 3. **Stack simulation**: operand stack shapes and stack values
//! 4. **Lowering**: flat statements over locals and stack values
//! 5. **Versioning**: SSA versions and join markers for every local slot
//! 6. **Structuring**: the fixed [`Pipeline`] of rewrite passes
//! 7. **Assembly**: the nested [`StructuredStatement`] tree
//!
//! Stages 1 to 4 fail with [`crate::Error`] on malformed input. Every later stage is total and
//! reports what it could not do through [`DecompilerComment`](crate::compiler::DecompilerComment)s.
//!
//! # Example
//!
//! ```rust
//! use jvmscope::{ConstantPoolMap, MethodBody, MethodDecompiler, MethodFlags};
//!
//! let pool = ConstantPoolMap::new();
//! // static int id(int x) { return x; }
//! let method = MethodBody::new("id", "(I)I", vec![0x1A, 0xAC]).with_flags(MethodFlags::STATIC);
//! let result = MethodDecompiler::new(&pool).decompile(&method)?;
//! assert_eq!(result.dump(), "return param1;\n");
//! # Ok::<(), jvmscope::Error>(())
//! ```

use rayon::prelude::*;

use crate::{
    analysis::{
        assign_versions, insert_exception_regions, lower_graph, simulate_stack, BlockFactory,
        InstructionGraph, LoweredMethod,
    },
    assembly::decode_code,
    compiler::{DecompilerComments, EventKind, EventLog, PassContext, Pipeline},
    config::DecompilerConfig,
    ir::VariableNamer,
    metadata::{constants::ConstantPool, method::MethodBody},
    structured::{assemble, Dumper, StructuredStatement},
    Result,
};

/// Decodes and lowers `body` into a flat statement list.
///
/// Exception regions are inserted before stack simulation so handler entries see the caught
/// exception on the stack.
pub(crate) fn lower_method(
    body: &MethodBody,
    pool: &dyn ConstantPool,
    events: &EventLog,
) -> Result<LoweredMethod> {
    let code = body.declared_code()?;
    let descriptor = body.parsed_descriptor()?;
    let mut graph = InstructionGraph::build(decode_code(code, code.len())?)?;
    let mut blocks = BlockFactory::new();
    insert_exception_regions(&mut graph, &body.exception_table, pool, &mut blocks, events)?;
    let entries = simulate_stack(&mut graph, pool)?;
    let namer = VariableNamer::new(body.is_static(), &descriptor);
    lower_graph(&graph, &entries, pool, blocks, namer)
}

/// The result of decompiling one method.
#[derive(Debug)]
pub struct DecompiledMethod {
    /// Method name.
    pub name: String,
    /// Method descriptor.
    pub descriptor: String,
    /// Root of the structured tree.
    pub root: StructuredStatement,
    /// Annotations attached to the method, de-duplicated.
    pub comments: DecompilerComments,
    /// Everything the pipeline did to this method.
    pub events: EventLog,
    /// Names used when rendering variables.
    pub names: VariableNamer,
}

impl DecompiledMethod {
    /// Renders the tree with [`Dumper`].
    #[must_use]
    pub fn dump(&self) -> String {
        Dumper::new(&self.names).dump(&self.root)
    }

    /// Returns `true` if some construct of the method could not be structured.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        self.comments
            .contains(crate::compiler::DecompilerComment::UnableToStructure)
    }
}

/// Decompiles methods against a shared constant pool.
///
/// The decompiler holds no per-method state: every call builds its own event log, block
/// factory and variable factory, so [`MethodDecompiler::decompile_all`] can run methods in
/// parallel.
pub struct MethodDecompiler<'a> {
    pool: &'a dyn ConstantPool,
    config: DecompilerConfig,
    pipeline: Pipeline,
}

impl<'a> MethodDecompiler<'a> {
    /// Creates a decompiler with the default configuration.
    #[must_use]
    pub fn new(pool: &'a dyn ConstantPool) -> Self {
        Self::with_config(pool, DecompilerConfig::default())
    }

    /// Creates a decompiler with `config`.
    #[must_use]
    pub fn with_config(pool: &'a dyn ConstantPool, config: DecompilerConfig) -> Self {
        MethodDecompiler {
            pool,
            config,
            pipeline: Pipeline::standard(),
        }
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &DecompilerConfig {
        &self.config
    }

    /// Decompiles one method.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::MalformedBytecode`] if the code, descriptor, exception table or a
    /// referenced constant is broken, and [`crate::Error::NotSupported`] for `jsr`/`ret`.
    pub fn decompile(&self, body: &MethodBody) -> Result<DecompiledMethod> {
        let events = EventLog::new();
        events
            .record(EventKind::MethodProcessingStarted)
            .method(&body.name)
            .message(format!("{}{}", body.name, body.descriptor));

        let LoweredMethod {
            mut list,
            local_types,
            ..
        } = lower_method(body, self.pool, &events)?;

        let mut comments = DecompilerComments::new();
        assign_versions(&mut list, &local_types, &mut comments, &events);
        {
            let mut ctx = PassContext::new(&body.name, &self.config, &events, &mut comments);
            self.pipeline.run(&mut list, &mut ctx);
        }
        let root = assemble(&list, &mut comments);

        events
            .record(EventKind::MethodProcessingCompleted)
            .method(&body.name)
            .message(format!(
                "{} statements, {} comments",
                list.len(),
                comments.len()
            ));

        Ok(DecompiledMethod {
            name: body.name.clone(),
            descriptor: body.descriptor.clone(),
            root,
            comments,
            events,
            names: list.namer().clone(),
        })
    }

    /// Decompiles `methods` in parallel.
    ///
    /// Results are in input order. A malformed method fails in its own slot only.
    pub fn decompile_all(&self, methods: &[MethodBody]) -> Vec<Result<DecompiledMethod>> {
        methods.par_iter().map(|body| self.decompile(body)).collect()
    }
}

/// Decompiles `body` with the default configuration.
///
/// # Errors
///
/// See [`MethodDecompiler::decompile`].
pub fn decompile_method(body: &MethodBody, pool: &dyn ConstantPool) -> Result<DecompiledMethod> {
    MethodDecompiler::new(pool).decompile(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        assembly::InstructionAssembler,
        compiler::DecompilerComment,
        metadata::method::MethodFlags,
        test::{method_body, pool, HELLO, PRINTLN_INT, SYSTEM_OUT},
        Error,
    };

    #[test]
    fn test_identity_method() -> Result<()> {
        let pool = pool();
        let body = MethodBody::new("id", "(I)I", vec![0x1A, 0xAC]).with_flags(MethodFlags::STATIC);
        let result = decompile_method(&body, &pool)?;
        assert_eq!(result.dump(), "return param1;\n");
        assert!(result.comments.is_empty());
        assert!(result.events.has(EventKind::MethodProcessingStarted));
        assert!(result.events.has(EventKind::MethodProcessingCompleted));
        Ok(())
    }

    #[test]
    fn test_instance_method_names_this() -> Result<()> {
        let pool = pool();
        // Object self() { return this; }
        let body = MethodBody::new("self", "()Ljava/lang/Object;", vec![0x2A, 0xB0]);
        let result = decompile_method(&body, &pool)?;
        assert_eq!(result.dump(), "return this;\n");
        Ok(())
    }

    #[test]
    fn test_string_constant_is_quoted() -> Result<()> {
        let pool = pool();
        let mut asm = InstructionAssembler::new();
        asm.ldc(HELLO)?.areturn()?;
        let body = method_body(asm, "()Ljava/lang/String;", true)?;
        let result = decompile_method(&body, &pool)?;
        assert_eq!(result.dump(), "return \"hello\";\n");
        Ok(())
    }

    #[test]
    fn test_malformed_method_is_an_error() {
        let pool = pool();
        let body = MethodBody::new("broken", "()V", vec![0xFF]);
        assert!(matches!(
            decompile_method(&body, &pool),
            Err(Error::MalformedBytecode { .. })
        ));
    }

    #[test]
    fn test_decompile_all_isolates_failures() -> Result<()> {
        let pool = pool();
        let mut asm = InstructionAssembler::new();
        asm.getstatic(SYSTEM_OUT)?
            .iconst(7)?
            .invokevirtual(PRINTLN_INT)?
            .vreturn()?;
        let methods = vec![
            method_body(asm, "()V", true)?,
            MethodBody::new("broken", "()V", vec![0xFF]),
            MethodBody::new("id", "(I)I", vec![0x1A, 0xAC]).with_flags(MethodFlags::STATIC),
        ];

        let results = MethodDecompiler::new(&pool).decompile_all(&methods);
        assert_eq!(results.len(), 3);
        let first = results[0].as_ref().map_err(|e| Error::GraphError(e.to_string()))?;
        assert_eq!(first.dump(), "java.lang.System.out.println(7);\nreturn;\n");
        assert!(results[1].is_err());
        assert!(results[2].is_ok());
        Ok(())
    }

    #[test]
    fn test_minimal_config_flags_partial_structure() -> Result<()> {
        let pool = pool();
        let mut asm = InstructionAssembler::new();
        asm.iload(0)?
            .ifeq("skip")?
            .getstatic(SYSTEM_OUT)?
            .iconst(1)?
            .invokevirtual(PRINTLN_INT)?
            .label("skip")?
            .vreturn()?;
        let body = method_body(asm, "(I)V", true)?;
        let result =
            MethodDecompiler::with_config(&pool, DecompilerConfig::minimal()).decompile(&body)?;
        assert!(result.is_partial());
        assert!(result.comments.contains(DecompilerComment::UnableToStructure));

        let result = decompile_method(&body, &pool)?;
        assert!(!result.is_partial());
        assert!(result.dump().starts_with("if (param1 != 0) {\n"));
        Ok(())
    }
}

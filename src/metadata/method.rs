//! Method bodies handed to the decompiler.
//!
//! A [`MethodBody`] is everything the per-method pipeline needs from a class file: the method's
//! name and descriptor, its access flags, the raw code array with its declared length and the
//! exception table. Catch types are constant-pool class indices, resolved through the
//! [`crate::metadata::constants::ConstantPool`] passed to the decompiler.

use bitflags::bitflags;

use crate::{metadata::descriptor::MethodDescriptor, Result};

bitflags! {
    /// Method access flags (JVMS §4.6).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct MethodFlags: u16 {
        /// Declared public
        const PUBLIC = 0x0001;
        /// Declared private
        const PRIVATE = 0x0002;
        /// Declared protected
        const PROTECTED = 0x0004;
        /// Declared static; there is no `this` in slot 0
        const STATIC = 0x0008;
        /// Declared final
        const FINAL = 0x0010;
        /// Declared synchronized
        const SYNCHRONIZED = 0x0020;
        /// A compiler-generated bridge method
        const BRIDGE = 0x0040;
        /// Declared with a variable number of arguments
        const VARARGS = 0x0080;
        /// Declared native
        const NATIVE = 0x0100;
        /// Declared abstract
        const ABSTRACT = 0x0400;
        /// Declared strictfp
        const STRICT = 0x0800;
        /// Not present in the source code
        const SYNTHETIC = 0x1000;
    }
}

/// One row of a method's exception table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionTableEntry {
    /// First protected byte offset (inclusive)
    pub start_pc: u16,
    /// End of the protected range (exclusive)
    pub end_pc: u16,
    /// Byte offset of the handler's first instruction
    pub handler_pc: u16,
    /// Constant-pool class index of the caught type; `None` catches everything
    pub catch_type: Option<u16>,
}

impl ExceptionTableEntry {
    /// Creates a new exception table entry.
    #[must_use]
    pub const fn new(start_pc: u16, end_pc: u16, handler_pc: u16, catch_type: Option<u16>) -> Self {
        ExceptionTableEntry {
            start_pc,
            end_pc,
            handler_pc,
            catch_type,
        }
    }
}

/// The code attribute of one method, plus the identity needed to interpret it.
#[derive(Debug, Clone)]
pub struct MethodBody {
    /// Method name, used in events and comments
    pub name: String,
    /// Method descriptor, e.g. `(I)V`
    pub descriptor: String,
    /// Access flags
    pub flags: MethodFlags,
    /// Declared number of local variable slots
    pub max_locals: u16,
    /// The code array
    pub code: Vec<u8>,
    /// Declared code length; must not exceed `code.len()`
    pub code_length: usize,
    /// Exception table in class-file order
    pub exception_table: Vec<ExceptionTableEntry>,
}

impl MethodBody {
    /// Creates an instance method body with no exception table.
    ///
    /// The declared code length is the length of `code`, and `max_locals` is derived from the
    /// descriptor when it parses.
    #[must_use]
    pub fn new(name: &str, descriptor: &str, code: Vec<u8>) -> Self {
        let max_locals = MethodDescriptor::parse(descriptor)
            .map(|d| d.parameter_slots() + 1)
            .unwrap_or(1);
        MethodBody {
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            flags: MethodFlags::PUBLIC,
            max_locals,
            code_length: code.len(),
            code,
            exception_table: Vec::new(),
        }
    }

    /// Replaces the access flags.
    #[must_use]
    pub fn with_flags(mut self, flags: MethodFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Replaces the exception table.
    #[must_use]
    pub fn with_exception_table(mut self, table: Vec<ExceptionTableEntry>) -> Self {
        self.exception_table = table;
        self
    }

    /// Replaces the declared number of local slots.
    #[must_use]
    pub fn with_max_locals(mut self, max_locals: u16) -> Self {
        self.max_locals = max_locals;
        self
    }

    /// Returns `true` if the method has no `this` parameter.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.flags.contains(MethodFlags::STATIC)
    }

    /// Parses the method descriptor.
    ///
    /// # Errors
    /// Returns [`crate::Error::MalformedBytecode`] if the descriptor is not well formed.
    pub fn parsed_descriptor(&self) -> Result<MethodDescriptor> {
        MethodDescriptor::parse(&self.descriptor)
    }

    /// Returns the declared code, checking the declared length against the buffer.
    ///
    /// # Errors
    /// Returns [`crate::Error::MalformedBytecode`] if `code_length` exceeds the buffer.
    pub fn declared_code(&self) -> Result<&[u8]> {
        self.code.get(..self.code_length).ok_or_else(|| {
            malformed_error!(
                "Declared code length {} exceeds buffer of {} bytes",
                self.code_length,
                self.code.len()
            )
        })
    }
}

//! Constant-pool lookup service.
//!
//! Class-file parsing is not part of this crate. Instructions that reference the constant pool
//! (`ldc`, field access, invocations, `new`, `checkcast`, ...) are resolved through the
//! [`ConstantPool`] trait, which the embedding application implements over its own class-file
//! model. [`ConstantPoolMap`] is a ready-made in-memory implementation, used by tests,
//! benchmarks and callers that already hold resolved entries.
//!
//! The pool is shared read-only across parallel method analyses, hence the `Send + Sync`
//! bound.
//!
//! # Examples
//!
//! ```rust
//! use jvmscope::metadata::constants::{ConstantPool, ConstantPoolMap};
//!
//! let mut pool = ConstantPoolMap::new();
//! let println = pool.add_method("java/io/PrintStream", "println", "(I)V");
//! let member = pool.member(println)?;
//! assert_eq!(member.name, "println");
//! # Ok::<(), jvmscope::Error>(())
//! ```

use std::collections::HashMap;

use crate::Result;

/// A field or method reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberRef {
    /// Owning class in internal form
    pub class: String,
    /// Member name
    pub name: String,
    /// Field or method descriptor
    pub descriptor: String,
}

/// A resolved constant-pool entry.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstantEntry {
    /// `CONSTANT_Integer`
    Integer(i32),
    /// `CONSTANT_Float`
    Float(f32),
    /// `CONSTANT_Long`, occupies two indices
    Long(i64),
    /// `CONSTANT_Double`, occupies two indices
    Double(f64),
    /// `CONSTANT_String`, already resolved to its text
    String(String),
    /// `CONSTANT_Class`, internal name or array descriptor
    Class(String),
    /// `CONSTANT_MethodType`
    MethodType(String),
    /// `CONSTANT_MethodHandle`, reduced to the referenced member
    MethodHandle(MemberRef),
    /// `CONSTANT_Fieldref`
    Field(MemberRef),
    /// `CONSTANT_Methodref`
    Method(MemberRef),
    /// `CONSTANT_InterfaceMethodref`
    InterfaceMethod(MemberRef),
    /// `CONSTANT_InvokeDynamic`
    InvokeDynamic {
        /// Index into the bootstrap method table
        bootstrap: u16,
        /// Call-site name
        name: String,
        /// Call-site method descriptor
        descriptor: String,
    },
}

impl ConstantEntry {
    /// Returns `true` for the entries that take two pool indices.
    #[must_use]
    pub fn is_wide(&self) -> bool {
        matches!(self, ConstantEntry::Long(_) | ConstantEntry::Double(_))
    }
}

/// Read-only access to a class's constant pool.
///
/// Only [`ConstantPool::entry`] is required. The provided methods add the kind checks the
/// stack simulator needs and turn a missing or mismatched entry into
/// [`crate::Error::MalformedBytecode`].
pub trait ConstantPool: Send + Sync {
    /// Returns the entry at `index`, if any.
    fn entry(&self, index: u16) -> Option<&ConstantEntry>;

    /// Resolves an entry that must exist.
    ///
    /// # Errors
    /// Returns [`crate::Error::MalformedBytecode`] if the index is unused.
    fn resolve(&self, index: u16) -> Result<&ConstantEntry> {
        self.entry(index)
            .ok_or_else(|| malformed_error!("Missing constant pool entry #{}", index))
    }

    /// Resolves a field, method or interface-method reference.
    ///
    /// # Errors
    /// Returns [`crate::Error::MalformedBytecode`] if the entry is missing or of another kind.
    fn member(&self, index: u16) -> Result<&MemberRef> {
        match self.resolve(index)? {
            ConstantEntry::Field(member)
            | ConstantEntry::Method(member)
            | ConstantEntry::InterfaceMethod(member) => Ok(member),
            other => Err(malformed_error!(
                "Constant pool entry #{} is not a member reference: {:?}",
                index,
                other
            )),
        }
    }

    /// Resolves a class reference to its internal name.
    ///
    /// # Errors
    /// Returns [`crate::Error::MalformedBytecode`] if the entry is missing or not a class.
    fn class_name(&self, index: u16) -> Result<&str> {
        match self.resolve(index)? {
            ConstantEntry::Class(name) => Ok(name),
            other => Err(malformed_error!(
                "Constant pool entry #{} is not a class: {:?}",
                index,
                other
            )),
        }
    }
}

/// An in-memory [`ConstantPool`].
///
/// Indices are assigned from 1 upwards. Long and double constants consume two indices, as they
/// do in a class file.
#[derive(Debug, Clone, Default)]
pub struct ConstantPoolMap {
    entries: HashMap<u16, ConstantEntry>,
    next_index: u16,
}

impl ConstantPoolMap {
    /// Creates an empty pool.
    #[must_use]
    pub fn new() -> Self {
        ConstantPoolMap {
            entries: HashMap::new(),
            next_index: 1,
        }
    }

    /// Appends an entry and returns its index.
    pub fn add(&mut self, entry: ConstantEntry) -> u16 {
        let index = self.next_index.max(1);
        self.next_index = index + if entry.is_wide() { 2 } else { 1 };
        self.entries.insert(index, entry);
        index
    }

    /// Places an entry at a specific index, replacing any previous entry.
    pub fn insert(&mut self, index: u16, entry: ConstantEntry) {
        let end = index.saturating_add(if entry.is_wide() { 2 } else { 1 });
        self.next_index = self.next_index.max(end);
        self.entries.insert(index, entry);
    }

    /// Appends a class reference.
    pub fn add_class(&mut self, name: &str) -> u16 {
        self.add(ConstantEntry::Class(name.to_string()))
    }

    /// Appends a string constant.
    pub fn add_string(&mut self, value: &str) -> u16 {
        self.add(ConstantEntry::String(value.to_string()))
    }

    /// Appends a field reference.
    pub fn add_field(&mut self, class: &str, name: &str, descriptor: &str) -> u16 {
        self.add(ConstantEntry::Field(member(class, name, descriptor)))
    }

    /// Appends a method reference.
    pub fn add_method(&mut self, class: &str, name: &str, descriptor: &str) -> u16 {
        self.add(ConstantEntry::Method(member(class, name, descriptor)))
    }

    /// Appends an interface method reference.
    pub fn add_interface_method(&mut self, class: &str, name: &str, descriptor: &str) -> u16 {
        self.add(ConstantEntry::InterfaceMethod(member(class, name, descriptor)))
    }

    /// Returns the number of entries (wide entries count once).
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the pool holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ConstantPool for ConstantPoolMap {
    fn entry(&self, index: u16) -> Option<&ConstantEntry> {
        self.entries.get(&index)
    }
}

fn member(class: &str, name: &str, descriptor: &str) -> MemberRef {
    MemberRef {
        class: class.to_string(),
        name: name.to_string(),
        descriptor: descriptor.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wide_entries_take_two_indices() {
        let mut pool = ConstantPoolMap::new();
        let long = pool.add(ConstantEntry::Long(5));
        let next = pool.add_string("x");
        assert_eq!(long, 1);
        assert_eq!(next, 3);
        assert!(pool.entry(2).is_none());
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_kind_mismatch_is_malformed() {
        let mut pool = ConstantPoolMap::new();
        let class = pool.add_class("java/lang/Object");
        let err = pool.member(class).unwrap_err();
        assert!(err.is_malformed());
        assert!(pool.class_name(99).is_err());
        assert_eq!(pool.class_name(class).unwrap(), "java/lang/Object");
    }

    #[test]
    fn test_insert_moves_next_index() {
        let mut pool = ConstantPoolMap::new();
        pool.insert(10, ConstantEntry::Integer(1));
        assert_eq!(pool.add_class("A"), 11);
    }
}

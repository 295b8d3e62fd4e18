//! Field and method descriptor parsing.
//!
//! Descriptors are the JVM's compact type strings: `I` for `int`, `Ljava/lang/String;` for a
//! class, `[J` for `long[]` and `(ILjava/lang/Object;)V` for a method. The stack simulator only
//! needs their computational category, exposed as [`StackType`]; the full [`JavaType`] is kept
//! for rendering casts, array allocations and catch clauses.
//!
//! # Examples
//!
//! ```rust
//! use jvmscope::metadata::descriptor::{MethodDescriptor, StackType};
//!
//! let desc = MethodDescriptor::parse("(IJ[Ljava/lang/String;)Z")?;
//! assert_eq!(desc.parameters.len(), 3);
//! assert_eq!(desc.parameter_slots(), 4);
//! assert_eq!(desc.return_type.as_ref().map(|t| t.stack_type()), Some(StackType::Int));
//! # Ok::<(), jvmscope::Error>(())
//! ```

use std::fmt;

use strum::{Display, EnumIter};

use crate::Result;

/// Computational type of an operand stack entry.
///
/// `Long` and `Double` are category 2 and occupy two stack slots for the purposes of the
/// `dup2`/`pop2` family; everything else is category 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumIter)]
pub enum StackType {
    /// `int`, and the narrower integral types widened to it
    #[strum(to_string = "int")]
    Int,
    /// `float`
    #[strum(to_string = "float")]
    Float,
    /// `long`
    #[strum(to_string = "long")]
    Long,
    /// `double`
    #[strum(to_string = "double")]
    Double,
    /// Any object or array reference, including `null`
    #[strum(to_string = "ref")]
    Reference,
    /// The return address pushed by `jsr`
    #[strum(to_string = "retaddr")]
    ReturnAddress,
}

impl StackType {
    /// Returns the computational category (1 or 2).
    #[must_use]
    pub const fn category(self) -> u8 {
        match self {
            StackType::Long | StackType::Double => 2,
            _ => 1,
        }
    }
}

/// A JVM primitive type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum PrimitiveType {
    /// `Z`
    #[strum(to_string = "boolean")]
    Boolean,
    /// `B`
    #[strum(to_string = "byte")]
    Byte,
    /// `C`
    #[strum(to_string = "char")]
    Char,
    /// `S`
    #[strum(to_string = "short")]
    Short,
    /// `I`
    #[strum(to_string = "int")]
    Int,
    /// `J`
    #[strum(to_string = "long")]
    Long,
    /// `F`
    #[strum(to_string = "float")]
    Float,
    /// `D`
    #[strum(to_string = "double")]
    Double,
}

impl PrimitiveType {
    /// Returns the stack type values of this primitive widen to.
    #[must_use]
    pub const fn stack_type(self) -> StackType {
        match self {
            PrimitiveType::Boolean
            | PrimitiveType::Byte
            | PrimitiveType::Char
            | PrimitiveType::Short
            | PrimitiveType::Int => StackType::Int,
            PrimitiveType::Long => StackType::Long,
            PrimitiveType::Float => StackType::Float,
            PrimitiveType::Double => StackType::Double,
        }
    }

    /// Maps a `newarray` `atype` operand to its element type.
    #[must_use]
    pub const fn from_array_type(atype: u8) -> Option<Self> {
        match atype {
            4 => Some(PrimitiveType::Boolean),
            5 => Some(PrimitiveType::Char),
            6 => Some(PrimitiveType::Float),
            7 => Some(PrimitiveType::Double),
            8 => Some(PrimitiveType::Byte),
            9 => Some(PrimitiveType::Short),
            10 => Some(PrimitiveType::Int),
            11 => Some(PrimitiveType::Long),
            _ => None,
        }
    }

    const fn from_descriptor_char(c: u8) -> Option<Self> {
        match c {
            b'Z' => Some(PrimitiveType::Boolean),
            b'B' => Some(PrimitiveType::Byte),
            b'C' => Some(PrimitiveType::Char),
            b'S' => Some(PrimitiveType::Short),
            b'I' => Some(PrimitiveType::Int),
            b'J' => Some(PrimitiveType::Long),
            b'F' => Some(PrimitiveType::Float),
            b'D' => Some(PrimitiveType::Double),
            _ => None,
        }
    }
}

/// A field type as written in a descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum JavaType {
    /// A primitive type
    Primitive(PrimitiveType),
    /// A class or interface, stored in internal form (`java/lang/String`)
    Object(String),
    /// An array of the component type
    Array(Box<JavaType>),
}

impl JavaType {
    /// Parses a single field descriptor such as `I` or `[Ljava/lang/String;`.
    ///
    /// # Errors
    /// Returns [`crate::Error::MalformedBytecode`] if the descriptor is empty, truncated or has
    /// trailing characters.
    pub fn parse(descriptor: &str) -> Result<Self> {
        let bytes = descriptor.as_bytes();
        let mut position = 0;
        let parsed = parse_field_type(bytes, &mut position)?;
        if position != bytes.len() {
            return Err(malformed_error!(
                "Trailing characters in field descriptor '{}'",
                descriptor
            ));
        }
        Ok(parsed)
    }

    /// Creates an object type from an internal or binary class name.
    #[must_use]
    pub fn object(name: &str) -> Self {
        JavaType::Object(name.replace('.', "/"))
    }

    /// Parses the operand of `anewarray`/`checkcast`/`instanceof`, which is either a plain
    /// internal class name or an array descriptor.
    ///
    /// # Errors
    /// Returns [`crate::Error::MalformedBytecode`] for a broken array descriptor.
    pub fn from_class_name(name: &str) -> Result<Self> {
        if name.starts_with('[') {
            JavaType::parse(name)
        } else {
            Ok(JavaType::object(name))
        }
    }

    /// Returns the computational type of a value of this type.
    #[must_use]
    pub fn stack_type(&self) -> StackType {
        match self {
            JavaType::Primitive(primitive) => primitive.stack_type(),
            JavaType::Object(_) | JavaType::Array(_) => StackType::Reference,
        }
    }

    /// Returns the element type if this is an array.
    #[must_use]
    pub fn component(&self) -> Option<&JavaType> {
        match self {
            JavaType::Array(component) => Some(component),
            _ => None,
        }
    }
}

impl fmt::Display for JavaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JavaType::Primitive(primitive) => write!(f, "{primitive}"),
            JavaType::Object(name) => write!(f, "{}", name.replace('/', ".")),
            JavaType::Array(component) => write!(f, "{component}[]"),
        }
    }
}

/// A parsed method descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    /// Parameter types in declaration order
    pub parameters: Vec<JavaType>,
    /// Return type, `None` for `void`
    pub return_type: Option<JavaType>,
}

impl MethodDescriptor {
    /// Parses a method descriptor such as `(ILjava/lang/String;)V`.
    ///
    /// # Errors
    /// Returns [`crate::Error::MalformedBytecode`] if the descriptor is not well formed.
    pub fn parse(descriptor: &str) -> Result<Self> {
        let bytes = descriptor.as_bytes();
        if bytes.first() != Some(&b'(') {
            return Err(malformed_error!(
                "Method descriptor '{}' does not start with '('",
                descriptor
            ));
        }

        let mut position = 1;
        let mut parameters = Vec::new();
        loop {
            match bytes.get(position) {
                Some(b')') => {
                    position += 1;
                    break;
                }
                Some(_) => parameters.push(parse_field_type(bytes, &mut position)?),
                None => {
                    return Err(malformed_error!(
                        "Unterminated parameter list in '{}'",
                        descriptor
                    ))
                }
            }
        }

        let return_type = if bytes.get(position) == Some(&b'V') {
            position += 1;
            None
        } else {
            Some(parse_field_type(bytes, &mut position)?)
        };

        if position != bytes.len() {
            return Err(malformed_error!(
                "Trailing characters in method descriptor '{}'",
                descriptor
            ));
        }

        Ok(MethodDescriptor {
            parameters,
            return_type,
        })
    }

    /// Returns the number of local variable slots the parameters occupy, excluding `this`.
    #[must_use]
    pub fn parameter_slots(&self) -> u16 {
        self.parameters
            .iter()
            .map(|p| u16::from(p.stack_type().category()))
            .sum()
    }
}

fn parse_field_type(bytes: &[u8], position: &mut usize) -> Result<JavaType> {
    let Some(&first) = bytes.get(*position) else {
        return Err(malformed_error!("Descriptor ends where a type was expected"));
    };
    *position += 1;

    if let Some(primitive) = PrimitiveType::from_descriptor_char(first) {
        return Ok(JavaType::Primitive(primitive));
    }

    match first {
        b'L' => {
            let start = *position;
            let Some(length) = bytes[start..].iter().position(|&b| b == b';') else {
                return Err(malformed_error!("Unterminated class name in descriptor"));
            };
            if length == 0 {
                return Err(malformed_error!("Empty class name in descriptor"));
            }
            *position = start + length + 1;
            let name = String::from_utf8_lossy(&bytes[start..start + length]).into_owned();
            Ok(JavaType::Object(name))
        }
        b'[' => Ok(JavaType::Array(Box::new(parse_field_type(bytes, position)?))),
        other => Err(malformed_error!(
            "Unexpected character '{}' in descriptor",
            char::from(other)
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_parse_field_types() -> Result<()> {
        assert_eq!(
            JavaType::parse("I")?,
            JavaType::Primitive(PrimitiveType::Int)
        );
        assert_eq!(JavaType::parse("[[J")?.to_string(), "long[][]");
        assert_eq!(
            JavaType::parse("Ljava/util/List;")?.to_string(),
            "java.util.List"
        );
        Ok(())
    }

    #[test]
    fn test_parse_method_descriptor() -> Result<()> {
        let desc = MethodDescriptor::parse("(D[ILjava/lang/Object;)V")?;
        assert_eq!(desc.parameters.len(), 3);
        assert_eq!(desc.parameter_slots(), 4);
        assert!(desc.return_type.is_none());
        Ok(())
    }

    #[test]
    fn test_rejects_broken_descriptors() {
        assert!(MethodDescriptor::parse("I)V").is_err());
        assert!(MethodDescriptor::parse("(I").is_err());
        assert!(MethodDescriptor::parse("(Ljava/lang/String)V").is_err());
        assert!(MethodDescriptor::parse("()VV").is_err());
        assert!(JavaType::parse("Q").is_err());
        assert!(JavaType::parse("L;").is_err());
    }

    #[test]
    fn test_stack_categories() {
        let wide: Vec<StackType> = StackType::iter().filter(|t| t.category() == 2).collect();
        assert_eq!(wide, vec![StackType::Long, StackType::Double]);
    }

    #[test]
    fn test_class_name_operands() -> Result<()> {
        assert_eq!(
            JavaType::from_class_name("java/lang/String")?.to_string(),
            "java.lang.String"
        );
        assert_eq!(JavaType::from_class_name("[I")?.to_string(), "int[]");
        Ok(())
    }
}

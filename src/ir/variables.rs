//! Variable naming and version allocation.

use std::collections::BTreeMap;

use crate::{
    ir::expression::{StackValue, Variable},
    metadata::descriptor::{MethodDescriptor, StackType},
};

/// Turns variables into display names.
pub trait VariableNames {
    /// Name of a local variable.
    fn local_name(&self, variable: Variable) -> String;

    /// Name of a stack temporary.
    fn stack_name(&self, value: StackValue) -> String {
        value.to_string()
    }
}

/// Names every variable by its raw `(slot, version)` pair.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawNames;

impl VariableNames for RawNames {
    fn local_name(&self, variable: Variable) -> String {
        variable.to_string()
    }
}

/// The default naming service, seeded from the method signature.
///
/// Slot 0 of an instance method is `this`, parameters are `param1..paramN` in declaration order
/// and every other slot is `varN`. Versions are hidden unless [`VariableNamer::with_versions`]
/// is set.
#[derive(Debug, Clone)]
pub struct VariableNamer {
    is_static: bool,
    parameters: BTreeMap<u16, (usize, Option<StackType>)>,
    show_versions: bool,
}

impl VariableNamer {
    /// Seeds the namer from the parsed descriptor and the `static` flag.
    #[must_use]
    pub fn new(is_static: bool, descriptor: &MethodDescriptor) -> Self {
        let mut parameters = BTreeMap::new();
        let mut slot: u16 = 0;
        if !is_static {
            parameters.insert(0, (0, Some(StackType::Reference)));
            slot = 1;
        }
        for (ordinal, parameter) in descriptor.parameters.iter().enumerate() {
            let ty = parameter.stack_type();
            parameters.insert(slot, (ordinal + 1, Some(ty)));
            if ty.category() == 2 {
                // upper half of a long or double
                parameters.insert(slot + 1, (ordinal + 1, None));
            }
            slot += u16::from(ty.category());
        }
        VariableNamer {
            is_static,
            parameters,
            show_versions: false,
        }
    }

    /// Shows `_version` suffixes in names.
    #[must_use]
    pub fn with_versions(mut self, show_versions: bool) -> Self {
        self.show_versions = show_versions;
        self
    }

    /// Returns `true` if `slot` holds a parameter (or `this`) on entry.
    #[must_use]
    pub fn is_parameter(&self, slot: u16) -> bool {
        self.parameters.contains_key(&slot)
    }

    /// Stack type of the parameter starting at `slot`. `None` for the upper half of a
    /// category-2 parameter and for non-parameter slots.
    #[must_use]
    pub fn parameter_type(&self, slot: u16) -> Option<StackType> {
        self.parameters.get(&slot).and_then(|(_, ty)| *ty)
    }

    /// Parameter slots with their types, `this` included.
    pub fn parameter_slots(&self) -> impl Iterator<Item = (u16, StackType)> + '_ {
        self.parameters
            .iter()
            .filter_map(|(slot, (_, ty))| ty.map(|ty| (*slot, ty)))
    }

    /// Every slot occupied by a parameter, including upper halves.
    pub fn occupied_slots(&self) -> impl Iterator<Item = u16> + '_ {
        self.parameters.keys().copied()
    }

    /// Returns `true` for static methods.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.is_static
    }

    fn base_name(&self, slot: u16) -> String {
        match self.parameters.get(&slot) {
            Some((0, _)) if !self.is_static => "this".to_string(),
            Some((ordinal, _)) => format!("param{ordinal}"),
            None => format!("var{slot}"),
        }
    }
}

impl VariableNames for VariableNamer {
    fn local_name(&self, variable: Variable) -> String {
        let base = self.base_name(variable.slot);
        if self.show_versions {
            format!("{base}_{}", variable.version)
        } else {
            base
        }
    }
}

/// Allocates SSA versions for one method.
///
/// Versions are handed out per slot in call order, starting at 1; version 0 is reserved for
/// the entry value. Calling [`VariableFactory::define`] in positional definition order yields
/// strictly increasing versions.
#[derive(Debug, Clone, Default)]
pub struct VariableFactory {
    next: BTreeMap<u16, u32>,
    types: BTreeMap<Variable, StackType>,
    parameters: BTreeMap<u16, Option<StackType>>,
}

impl VariableFactory {
    /// Creates a factory whose entry values are the namer's parameters.
    #[must_use]
    pub fn new(namer: &VariableNamer) -> Self {
        let mut factory = VariableFactory::default();
        for slot in namer.occupied_slots() {
            let ty = namer.parameter_type(slot);
            factory.parameters.insert(slot, ty);
            if let Some(ty) = ty {
                factory.types.insert(Variable::new(slot, 0), ty);
            }
        }
        factory
    }

    /// Allocates the next version of `slot`.
    pub fn define(&mut self, slot: u16, ty: StackType) -> Variable {
        let next = self.next.entry(slot).or_insert(1);
        let variable = Variable::new(slot, *next);
        *next += 1;
        self.types.insert(variable, ty);
        variable
    }

    /// The entry value of `slot`.
    #[must_use]
    pub fn entry_value(&self, slot: u16) -> Variable {
        Variable::new(slot, 0)
    }

    /// Returns `true` if `variable` is a parameter's entry value.
    #[must_use]
    pub fn is_parameter(&self, variable: Variable) -> bool {
        variable.version == 0 && self.parameters.contains_key(&variable.slot)
    }

    /// Returns `true` if `variable` is the undefined entry value of a non-parameter slot.
    #[must_use]
    pub fn is_undefined(&self, variable: Variable) -> bool {
        variable.version == 0 && !self.parameters.contains_key(&variable.slot)
    }

    /// Declared type of a parameter slot. `Some(None)` marks the upper half of a category-2
    /// parameter.
    #[must_use]
    pub fn parameter_slot(&self, slot: u16) -> Option<Option<StackType>> {
        self.parameters.get(&slot).copied()
    }

    /// Type recorded for `variable`.
    #[must_use]
    pub fn stack_type(&self, variable: Variable) -> Option<StackType> {
        self.types.get(&variable).copied()
    }

    /// Records the type of `variable`.
    pub fn set_type(&mut self, variable: Variable, ty: StackType) {
        self.types.insert(variable, ty);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_method_names() -> crate::Result<()> {
        let descriptor = MethodDescriptor::parse("(JI)V")?;
        let namer = VariableNamer::new(false, &descriptor);

        assert_eq!(namer.local_name(Variable::new(0, 0)), "this");
        assert_eq!(namer.local_name(Variable::new(1, 0)), "param1");
        assert_eq!(namer.local_name(Variable::new(3, 0)), "param2");
        assert_eq!(namer.local_name(Variable::new(4, 2)), "var4");
        assert!(namer.is_parameter(2));
        assert_eq!(namer.parameter_type(2), None);
        assert_eq!(namer.parameter_type(1), Some(StackType::Long));
        assert_eq!(namer.parameter_slots().count(), 3);

        let versioned = namer.with_versions(true);
        assert_eq!(versioned.local_name(Variable::new(4, 2)), "var4_2");
        Ok(())
    }

    #[test]
    fn test_static_method_names() -> crate::Result<()> {
        let descriptor = MethodDescriptor::parse("(I)V")?;
        let namer = VariableNamer::new(true, &descriptor);
        assert_eq!(namer.local_name(Variable::new(0, 0)), "param1");
        assert_eq!(namer.local_name(Variable::new(1, 1)), "var1");
        Ok(())
    }

    #[test]
    fn test_factory_versions_increase() -> crate::Result<()> {
        let descriptor = MethodDescriptor::parse("(I)V")?;
        let namer = VariableNamer::new(true, &descriptor);
        let mut factory = VariableFactory::new(&namer);

        assert_eq!(factory.define(1, StackType::Int), Variable::new(1, 1));
        assert_eq!(factory.define(1, StackType::Reference), Variable::new(1, 2));
        assert_eq!(factory.define(0, StackType::Int), Variable::new(0, 1));
        assert!(factory.is_parameter(Variable::new(0, 0)));
        assert!(factory.is_undefined(Variable::new(1, 0)));
        assert_eq!(
            factory.stack_type(Variable::new(1, 2)),
            Some(StackType::Reference)
        );
        Ok(())
    }
}

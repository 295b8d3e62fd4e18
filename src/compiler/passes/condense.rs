//! Folding of stack temporaries into the expressions that consume them.

use std::collections::HashMap;

use crate::{
    assembly::InvokeKind,
    compiler::{pass::PassContext, passes::straight_successor, EventKind, StructuringPass},
    ir::{
        Assignment, Expression, LValue, SsaVersion, StackValue, Statement, StatementId,
        StatementList,
    },
};

/// Definition and use sites of every stack value.
#[derive(Default)]
struct StackUsage {
    defs: HashMap<StackValue, Vec<StatementId>>,
    /// One entry per read.
    uses: HashMap<StackValue, Vec<StatementId>>,
}

impl StackUsage {
    fn collect(list: &StatementList) -> Self {
        let mut usage = StackUsage::default();
        for id in list.live() {
            let statement = &list[id].statement;
            match statement {
                Statement::Assignment(Assignment {
                    target: LValue::Stack(value),
                    ..
                })
                | Statement::Catch {
                    target: LValue::Stack(value),
                    ..
                } => usage.defs.entry(*value).or_default().push(id),
                _ => {}
            }
            statement.for_each_expression(&mut |e| {
                for value in e.stack_reads() {
                    usage.uses.entry(value).or_default().push(id);
                }
            });
        }
        usage
    }

    fn single_def(&self, value: StackValue) -> Option<StatementId> {
        match self.defs.get(&value).map(Vec::as_slice) {
            Some([def]) => Some(*def),
            _ => None,
        }
    }

    fn uses(&self, value: StackValue) -> &[StatementId] {
        self.uses.get(&value).map_or(&[], Vec::as_slice)
    }

    /// Records that the reads `expression` made at `from` now happen at `to`.
    fn moved(&mut self, expression: &Expression, from: StatementId, to: StatementId) {
        for value in expression.stack_reads() {
            if let Some(sites) = self.uses.get_mut(&value) {
                if let Some(site) = sites.iter_mut().find(|site| **site == from) {
                    *site = to;
                }
            }
        }
    }
}

fn stack_definition(statement: &Statement) -> Option<(StackValue, &Expression)> {
    match statement {
        Statement::Assignment(Assignment {
            target: LValue::Stack(value),
            value: expression,
        }) => Some((*value, expression)),
        _ => None,
    }
}

/// Substitutes single-use stack temporaries and condenses constructor calls.
///
/// A temporary defined once and read once is folded into its reader when control passes
/// straight from the definition to the reader, or when its value is side-effect free and every
/// local it reads still holds the same version at the reader. `new C; dup; invokespecial <init>`
/// becomes a single `new C(args)` expression.
///
/// Each round runs condense, construction, condense; rounds repeat up to
/// [`crate::config::DecompilerConfig::max_condense_rounds`] times or until a round changes nothing.
pub struct CondenseAssignmentsPass;

impl Default for CondenseAssignmentsPass {
    fn default() -> Self {
        Self::new()
    }
}

impl CondenseAssignmentsPass {
    /// Creates a new condensing pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn movable_to(list: &StatementList, usage: &StackUsage, def: StatementId, user: StatementId) -> bool {
        if straight_successor(list, def) == Some(user) {
            return true;
        }
        let Some((_, value)) = stack_definition(&list[def].statement) else {
            return false;
        };
        list[user].index > list[def].index
            && value.is_pure()
            && value
                .stack_reads()
                .iter()
                .all(|read| usage.single_def(*read).is_some())
            && value.local_reads().iter().all(|read| {
                list[user].version_at_entry(read.slot) == SsaVersion::Known(read.version)
            })
    }

    fn condense(&self, list: &mut StatementList, ctx: &PassContext<'_>) -> bool {
        let mut usage = StackUsage::collect(list);
        let mut changed = false;

        let order: Vec<StatementId> = list.live().collect();
        for def in order.into_iter().rev() {
            if list[def].removed {
                continue;
            }
            let Some((value, _)) = stack_definition(&list[def].statement) else {
                continue;
            };
            if usage.single_def(value) != Some(def) {
                continue;
            }
            let user = match usage.uses(value) {
                [user] if *user != def => *user,
                _ => continue,
            };
            if !Self::movable_to(list, &usage, def, user) {
                continue;
            }

            let Statement::Assignment(assignment) = &list[def].statement else {
                continue;
            };
            let replacement = assignment.value.clone();
            list[user]
                .statement
                .for_each_expression_mut(&mut |e| {
                    e.replace_stack(value, &replacement);
                });
            usage.moved(&replacement, def, user);
            usage.uses.remove(&value);
            usage.defs.remove(&value);

            ctx.record(EventKind::AssignmentCondensed, self.name(), list, user)
                .message(format!("{value} folded into statement {}", list[user].index));
            list.remove(def);
            changed = true;
        }

        changed |= self.condense_catch_targets(list, &usage, ctx);
        changed
    }

    /// `catch (T s) { x = s; ...` becomes `catch (T x) { ...`.
    fn condense_catch_targets(
        &self,
        list: &mut StatementList,
        usage: &StackUsage,
        ctx: &PassContext<'_>,
    ) -> bool {
        let mut changed = false;
        let headers: Vec<StatementId> = list.live().collect();
        for header in headers {
            let Statement::Catch {
                target: LValue::Stack(value),
                ..
            } = list[header].statement
            else {
                continue;
            };
            let Some(store) = straight_successor(list, header) else {
                continue;
            };
            if usage.uses(value) != [store] {
                continue;
            }
            let local = match &list[store].statement {
                Statement::Assignment(Assignment {
                    target: LValue::Local(local),
                    value: Expression::Stack(read),
                }) if *read == value => *local,
                _ => continue,
            };

            if let Statement::Catch { target, .. } = &mut list[header].statement {
                *target = LValue::Local(local);
            }
            ctx.record(EventKind::AssignmentCondensed, self.name(), list, header)
                .message(format!("exception stored directly into {local}"));
            list.remove(store);
            changed = true;
        }
        changed
    }

    fn constructor_call(statement: &Statement, object: StackValue) -> Option<Vec<Expression>> {
        match statement {
            Statement::Expression(Expression::Invoke {
                kind: InvokeKind::Special,
                receiver: Some(receiver),
                name,
                args,
                ..
            }) if name == "<init>" && **receiver == Expression::Stack(object) => Some(args.clone()),
            _ => None,
        }
    }

    fn construction(&self, list: &mut StatementList, ctx: &PassContext<'_>) -> bool {
        let mut changed = false;
        let order: Vec<StatementId> = list.live().collect();
        for def in order {
            if list[def].removed {
                continue;
            }
            let (object, class) = match &list[def].statement {
                Statement::Assignment(Assignment {
                    target: LValue::Stack(object),
                    value: Expression::New(class),
                }) => (*object, class.clone()),
                _ => continue,
            };

            let mut current = straight_successor(list, def);
            let mut found = None;
            for _ in 0..list.len() {
                let Some(id) = current else {
                    break;
                };
                if let Some(args) = Self::constructor_call(&list[id].statement, object) {
                    found = Some((id, args));
                    break;
                }
                let mut reads = 0;
                list[id]
                    .statement
                    .for_each_expression(&mut |e| reads += e.count_stack(object));
                if reads > 0 {
                    break;
                }
                current = straight_successor(list, id);
            }
            let Some((call, args)) = found else {
                continue;
            };

            list[call].statement = Statement::Assignment(Assignment::new(
                LValue::Stack(object),
                Expression::Construct { class, args },
            ));
            ctx.record(EventKind::ConstructorCondensed, self.name(), list, call)
                .message(format!("constructor of {object} condensed"));
            list.remove(def);
            changed = true;
        }
        changed
    }
}

impl StructuringPass for CondenseAssignmentsPass {
    fn name(&self) -> &'static str {
        "condense-assignments"
    }

    fn description(&self) -> &'static str {
        "Folds single-use stack temporaries and condenses constructor calls"
    }

    fn run(&self, list: &mut StatementList, ctx: &mut PassContext<'_>) -> bool {
        let mut any = false;
        for _ in 0..ctx.config.max_condense_rounds.max(1) {
            let mut changed = self.condense(list, ctx);
            changed |= self.construction(list, ctx);
            changed |= self.condense(list, ctx);
            if !changed {
                break;
            }
            any = true;
        }
        any
    }
}

/// Collapses javac's `dup; store` chains into embedded assignments inside conditions.
///
/// ```text
/// s = r.readLine()
/// line = s
/// if (s == null) goto exit
/// ```
///
/// becomes `if ((line = r.readLine()) == null) goto exit`. The condition must read the
/// temporary exactly once and be side-effect free apart from that read.
pub struct CollapseAssignmentsPass;

impl Default for CollapseAssignmentsPass {
    fn default() -> Self {
        Self::new()
    }
}

impl CollapseAssignmentsPass {
    /// Creates a new assignment collapsing pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn collapse(&self, list: &mut StatementList, def: StatementId, ctx: &PassContext<'_>) -> bool {
        let usage = StackUsage::collect(list);
        let Some((value, _)) = stack_definition(&list[def].statement) else {
            return false;
        };
        if usage.single_def(value) != Some(def) {
            return false;
        }
        let Some(store) = straight_successor(list, def) else {
            return false;
        };
        let local = match &list[store].statement {
            Statement::Assignment(Assignment {
                target: LValue::Local(local),
                value: Expression::Stack(read),
            }) if *read == value => *local,
            _ => return false,
        };
        let Some(test) = straight_successor(list, store) else {
            return false;
        };
        let Statement::If { condition, jump } = &list[test].statement else {
            return false;
        };
        if !jump.is_raw() || condition.count_stack(value) != 1 {
            return false;
        }
        let mut uses = usage.uses(value).to_vec();
        uses.sort();
        let mut expected = vec![store, test];
        expected.sort();
        if uses != expected {
            return false;
        }
        let mut rest = condition.clone();
        rest.replace_stack(value, &Expression::int(0));
        if !rest.is_pure() {
            return false;
        }

        let Statement::Assignment(assignment) = &list[def].statement else {
            return false;
        };
        let embedded = Expression::Assignment {
            target: Box::new(LValue::Local(local)),
            value: Box::new(assignment.value.clone()),
        };
        if let Statement::If { condition, .. } = &mut list[test].statement {
            condition.replace_stack(value, &embedded);
        }
        ctx.record(EventKind::AssignmentCollapsed, self.name(), list, test)
            .message(format!("assignment to {local} moved into condition"));
        list.remove(store);
        list.remove(def);
        true
    }
}

impl StructuringPass for CollapseAssignmentsPass {
    fn name(&self) -> &'static str {
        "collapse-assignments"
    }

    fn description(&self) -> &'static str {
        "Moves dup-store chains into the condition that tests them"
    }

    fn run(&self, list: &mut StatementList, ctx: &mut PassContext<'_>) -> bool {
        let mut changed = false;
        let order: Vec<StatementId> = list.live().collect();
        for def in order {
            if !list[def].removed && self.collapse(list, def, ctx) {
                changed = true;
            }
        }
        changed
    }
}

//! Folding a structured statement list into a tree.
//!
//! Every header statement opens a block whose members follow it contiguously; the assembler
//! walks the live order and, at each header, gathers the run of statements carrying the header's
//! block into the header's body. Block-end markers disappear, and jumps that no pass could
//! structure stay as labelled gotos with an [`DecompilerComment::UnableToStructure`] comment.
//!
//! Catch handlers need not follow their try body. Each handler is attached to its try wherever
//! it sits, and whatever lies between the try body and the handler follows the try statement.

use std::collections::{BTreeMap, BTreeSet};

use crate::{
    analysis::{BlockIdentifier, BlockKind},
    compiler::{DecompilerComment, DecompilerComments},
    ir::{JumpKind, Statement, StatementId, StatementList},
    structured::{CatchClause, StructuredStatement, SwitchCase},
};

/// Builds the structured tree of `list`, adding a comment to `comments` for every construct that
/// could not be structured.
pub fn assemble(list: &StatementList, comments: &mut DecompilerComments) -> StructuredStatement {
    let mut assembler = Assembler::new(list, comments);
    let order: Vec<StatementId> = list.live().collect();
    let children = assembler.sequence(&order, None);
    StructuredStatement::sequence(children)
}

struct Assembler<'a, 'c> {
    list: &'a StatementList,
    comments: &'c mut DecompilerComments,
    /// Blocks targeted by a jump that needs an explicit label.
    labelled: BTreeSet<BlockIdentifier>,
    /// Targets of unstructured jumps.
    jump_labels: BTreeMap<StatementId, String>,
    /// Catch headers of each try block, positionally.
    handlers: BTreeMap<BlockIdentifier, Vec<StatementId>>,
    /// Catch headers and bodies assembled with their try rather than where they sit, mapped to
    /// the innermost handler claiming them.
    attached: BTreeMap<StatementId, BlockIdentifier>,
}

impl<'a, 'c> Assembler<'a, 'c> {
    fn new(list: &'a StatementList, comments: &'c mut DecompilerComments) -> Self {
        let mut assembler = Assembler {
            list,
            comments,
            labelled: BTreeSet::new(),
            jump_labels: BTreeMap::new(),
            handlers: BTreeMap::new(),
            attached: BTreeMap::new(),
        };
        assembler.scan();
        assembler.attach_handlers();
        assembler
    }

    /// Claims every catch whose try header is live, together with its body.
    fn attach_handlers(&mut self) {
        let list = self.list;
        for id in list.live() {
            let Statement::Catch {
                try_block, block, ..
            } = list[id].statement
            else {
                continue;
            };
            if list.header_of(try_block).is_none() {
                continue;
            }
            self.handlers.entry(try_block).or_default().push(id);
            self.attached.insert(id, block);
            for member in list.members(block) {
                self.attached.insert(member, block);
            }
        }
    }

    /// The innermost block of `id` satisfying `accept`, judged by header position.
    fn innermost(
        &self,
        id: StatementId,
        accept: impl Fn(BlockKind) -> bool,
    ) -> Option<BlockIdentifier> {
        self.list[id]
            .blocks
            .iter()
            .copied()
            .filter(|block| accept(block.kind()))
            .max_by_key(|block| {
                self.list
                    .header_of(*block)
                    .map_or(0, |header| self.list[header].index)
            })
    }

    fn scan(&mut self) {
        let list = self.list;
        for id in list.live() {
            let jump = match &list[id].statement {
                Statement::Goto(jump) | Statement::If { jump, .. } => jump,
                _ => continue,
            };
            match jump {
                JumpKind::Goto => {
                    if let Some(target) = list[id].jump_target() {
                        self.jump_labels
                            .insert(target, format!("lbl{}", target.index()));
                    }
                }
                JumpKind::Break(block) => {
                    if self.innermost(id, |kind| kind.is_breakable()) != Some(*block) {
                        self.labelled.insert(*block);
                    }
                }
                JumpKind::Continue(block) => {
                    if self.innermost(id, |kind| kind.is_loop()) != Some(*block) {
                        self.labelled.insert(*block);
                    }
                }
                JumpKind::EndBlock(_) => {}
            }
        }
    }

    fn label(&self, block: BlockIdentifier) -> Option<String> {
        self.labelled.contains(&block).then(|| block.label())
    }

    /// Length of the run at the start of `ids` whose statements are members of `block`.
    fn run_length(&self, ids: &[StatementId], block: BlockIdentifier) -> usize {
        ids.iter()
            .take_while(|id| self.list[**id].blocks.contains(&block))
            .count()
    }

    /// Assembles `ids` in order. `in_loop` names the loop whose body this is.
    fn sequence(&mut self, ids: &[StatementId], in_loop: Option<BlockIdentifier>) -> Vec<StructuredStatement> {
        let mut out = Vec::new();
        let mut position = 0;
        while position < ids.len() {
            let id = ids[position];
            position += 1;
            if self.attached.contains_key(&id) {
                continue;
            }
            if let Some(label) = self.jump_labels.get(&id) {
                out.push(StructuredStatement::Label(label.clone()));
            }
            let rest = &ids[position..];
            let (node, consumed) = self.statement(id, rest);
            position += consumed;
            if let Some(node) = node {
                out.push(node);
            }
        }
        if in_loop.is_some() && matches!(out.last(), Some(StructuredStatement::Continue(None))) {
            out.pop();
        }
        out
    }

    fn body(&mut self, ids: &[StatementId], in_loop: Option<BlockIdentifier>) -> Box<StructuredStatement> {
        Box::new(StructuredStatement::sequence(self.sequence(ids, in_loop)))
    }

    /// Assembles `id`; headers consume a prefix of `rest`. Returns the node and the number of
    /// statements consumed from `rest`.
    fn statement(&mut self, id: StatementId, rest: &[StatementId]) -> (Option<StructuredStatement>, usize) {
        let list = self.list;
        match &list[id].statement {
            Statement::Nop | Statement::LoopEnd { .. } => (None, 0),
            Statement::Goto(jump) => (self.jump(id, None, *jump), 0),
            Statement::If { condition, jump } => (self.jump(id, Some(condition.clone()), *jump), 0),
            Statement::RawSwitch { .. } => {
                self.comments.add(DecompilerComment::UnableToStructure);
                (Some(StructuredStatement::Statement(list[id].statement.clone())), 0)
            }
            Statement::MonitorEnter(_) | Statement::MonitorExit(_) => {
                self.comments.add(DecompilerComment::CommentedMonitors);
                (Some(StructuredStatement::Statement(list[id].statement.clone())), 0)
            }
            Statement::While { condition, block } => {
                let length = self.run_length(rest, *block);
                let node = StructuredStatement::While {
                    condition: condition.clone(),
                    block: *block,
                    label: self.label(*block),
                    body: self.body(&rest[..length], Some(*block)),
                };
                (Some(node), length)
            }
            Statement::Do { block } => {
                let length = self.run_length(rest, *block);
                let members = &rest[..length];
                let condition = members.last().and_then(|last| match &list[*last].statement {
                    Statement::LoopEnd { condition, .. } => condition.clone(),
                    _ => None,
                });
                let node = StructuredStatement::DoWhile {
                    condition,
                    block: *block,
                    label: self.label(*block),
                    body: self.body(members, Some(*block)),
                };
                (Some(node), length)
            }
            Statement::For {
                init,
                condition,
                update,
                block,
            } => {
                let length = self.run_length(rest, *block);
                let node = StructuredStatement::For {
                    init: init.clone(),
                    condition: condition.clone(),
                    update: update.clone(),
                    block: *block,
                    label: self.label(*block),
                    body: self.body(&rest[..length], Some(*block)),
                };
                (Some(node), length)
            }
            Statement::ForEach {
                variable,
                iterable,
                block,
            } => {
                let length = self.run_length(rest, *block);
                let node = StructuredStatement::ForEach {
                    variable: variable.clone(),
                    iterable: iterable.clone(),
                    block: *block,
                    label: self.label(*block),
                    body: self.body(&rest[..length], Some(*block)),
                };
                (Some(node), length)
            }
            Statement::IfBlock {
                condition,
                block,
                else_block,
            } => {
                let length = self.run_length(rest, *block);
                let then = self.body(&rest[..length], None);
                let mut consumed = length;
                let otherwise = else_block.map(|else_block| {
                    let else_length = self.run_length(&rest[consumed..], else_block);
                    let body = self.body(&rest[consumed..consumed + else_length], None);
                    consumed += else_length;
                    body
                });
                let node = StructuredStatement::If {
                    condition: condition.clone(),
                    then,
                    otherwise,
                };
                (Some(node), consumed)
            }
            Statement::Synchronized { monitor, block } => {
                let length = self.run_length(rest, *block);
                let node = StructuredStatement::Synchronized {
                    monitor: monitor.clone(),
                    body: self.body(&rest[..length], None),
                };
                (Some(node), length)
            }
            Statement::Switch { value, block } => {
                let length = self.run_length(rest, *block);
                let (prefix, cases) = self.cases(&rest[..length], *block);
                let node = StructuredStatement::Switch {
                    value: value.clone(),
                    block: *block,
                    label: self.label(*block),
                    cases,
                };
                let node = if prefix.is_empty() {
                    node
                } else {
                    self.comments.add(DecompilerComment::UnableToStructure);
                    let mut sequence = prefix;
                    sequence.push(node);
                    StructuredStatement::Block(sequence)
                };
                (Some(node), length)
            }
            Statement::Case { block, .. } => {
                // A case outside its switch.
                self.comments.add(DecompilerComment::UnableToStructure);
                let length = self.run_length(rest, *block);
                let mut sequence = vec![StructuredStatement::Statement(list[id].statement.clone())];
                sequence.extend(self.sequence(&rest[..length], None));
                (Some(StructuredStatement::Block(sequence)), length)
            }
            Statement::Try { block } => {
                let length = self.run_length(rest, *block);
                let body = self.body(&rest[..length], None);
                let node = StructuredStatement::TryCatch {
                    block: *block,
                    body,
                    catches: self.catches(*block),
                };
                (Some(node), length)
            }
            Statement::Catch { block, .. } => {
                // A handler whose try header is gone.
                self.comments.add(DecompilerComment::UnableToStructure);
                let length = self.run_length(rest, *block);
                let mut sequence = vec![StructuredStatement::Statement(list[id].statement.clone())];
                sequence.extend(self.sequence(&rest[..length], None));
                (Some(StructuredStatement::Block(sequence)), length)
            }
            _ => (Some(StructuredStatement::Statement(list[id].statement.clone())), 0),
        }
    }

    fn jump(
        &mut self,
        id: StatementId,
        condition: Option<crate::ir::Expression>,
        jump: JumpKind,
    ) -> Option<StructuredStatement> {
        let node = match jump {
            JumpKind::Break(block) => StructuredStatement::Break(self.label(block)),
            JumpKind::Continue(block) => StructuredStatement::Continue(self.label(block)),
            JumpKind::EndBlock(block) => match condition {
                None => return None,
                Some(condition) => {
                    self.comments.add(DecompilerComment::UnableToStructure);
                    return Some(StructuredStatement::Jump {
                        condition: Some(condition),
                        target: block.label(),
                    });
                }
            },
            JumpKind::Goto => {
                self.comments.add(DecompilerComment::UnableToStructure);
                let target = self.list[id]
                    .jump_target()
                    .and_then(|target| self.jump_labels.get(&target).cloned())
                    .unwrap_or_default();
                return Some(StructuredStatement::Jump { condition, target });
            }
        };
        Some(match condition {
            Some(condition) => StructuredStatement::If {
                condition,
                then: Box::new(node),
                otherwise: None,
            },
            None => node,
        })
    }

    /// Splits the members of a switch into its case groups. Members before the first case are
    /// returned separately.
    fn cases(
        &mut self,
        members: &[StatementId],
        switch: BlockIdentifier,
    ) -> (Vec<StructuredStatement>, Vec<SwitchCase>) {
        let list = self.list;
        let first_case = members
            .iter()
            .position(|id| {
                matches!(list[*id].statement, Statement::Case { switch: owner, .. } if owner == switch)
            })
            .unwrap_or(members.len());
        let prefix = self.sequence(&members[..first_case], None);

        let mut cases = Vec::new();
        let mut position = first_case;
        while position < members.len() {
            let header = members[position];
            position += 1;
            let Statement::Case {
                values,
                is_default,
                block,
                ..
            } = &list[header].statement
            else {
                continue;
            };
            let length = self.run_length(&members[position..], *block);
            let body = StructuredStatement::sequence(
                self.sequence(&members[position..position + length], None),
            );
            position += length;
            cases.push(SwitchCase {
                values: values.clone(),
                is_default: *is_default,
                body,
            });
        }
        (prefix, cases)
    }

    /// Assembles the handlers of `try_block`, wherever they sit.
    fn catches(&mut self, try_block: BlockIdentifier) -> Vec<CatchClause> {
        let list = self.list;
        let headers = self.handlers.get(&try_block).cloned().unwrap_or_default();
        let mut catches = Vec::new();
        for header in headers {
            let Statement::Catch {
                block,
                catch_types,
                target,
                ..
            } = &list[header].statement
            else {
                continue;
            };
            let members = list.members(*block);
            let body = StructuredStatement::sequence(self.handler_body(*block, &members));
            catches.push(CatchClause {
                catch_types: catch_types.clone(),
                variable: target.clone(),
                body,
            });
        }
        catches
    }

    /// Assembles the members of the handler `block`, which were set aside for it.
    fn handler_body(
        &mut self,
        block: BlockIdentifier,
        members: &[StatementId],
    ) -> Vec<StructuredStatement> {
        let claimed: Vec<StatementId> = members
            .iter()
            .copied()
            .filter(|id| self.attached.get(id) == Some(&block))
            .collect();
        for id in &claimed {
            self.attached.remove(id);
        }
        let out = self.sequence(members, None);
        for id in claimed {
            self.attached.insert(id, block);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        assembly::InstructionAssembler,
        config::DecompilerConfig,
        ir::RawNames,
        structured::Dumper,
        test::{fully_structured, EXCEPTION, PRINTLN_INT, SYSTEM_OUT},
    };

    fn assembled(
        asm: InstructionAssembler,
        descriptor: &str,
        config: &DecompilerConfig,
    ) -> crate::Result<(StructuredStatement, DecompilerComments, String)> {
        let mut result = fully_structured(asm, descriptor, true, config)?;
        let root = assemble(&result.list, &mut result.comments);
        let text = Dumper::new(&RawNames).dump(&root);
        Ok((root, result.comments, text))
    }

    #[test]
    fn test_if_else_tree() -> crate::Result<()> {
        let mut asm = InstructionAssembler::new();
        asm.iload(0)?
            .ifeq("else")?
            .getstatic(SYSTEM_OUT)?
            .iconst(1)?
            .invokevirtual(PRINTLN_INT)?
            .goto("end")?
            .label("else")?
            .getstatic(SYSTEM_OUT)?
            .iconst(2)?
            .invokevirtual(PRINTLN_INT)?
            .label("end")?
            .vreturn()?;
        let (root, comments, text) = assembled(asm, "(I)V", &DecompilerConfig::default())?;
        assert_eq!(
            text,
            "if (v0_0 != 0) {\n    \
             java.lang.System.out.println(1);\n\
             } else {\n    \
             java.lang.System.out.println(2);\n\
             }\n\
             return;\n"
        );
        assert!(comments.is_empty());
        assert_eq!(root.statements().len(), 2);
        Ok(())
    }

    #[test]
    fn test_loop_with_nested_break() -> crate::Result<()> {
        let mut asm = InstructionAssembler::new();
        asm.label("top")?
            .iload(0)?
            .ifeq("out")?
            .getstatic(SYSTEM_OUT)?
            .iload(0)?
            .invokevirtual(PRINTLN_INT)?
            .iinc(0, -1)?
            .goto("top")?
            .label("out")?
            .vreturn()?;
        let (root, comments, text) = assembled(asm, "(I)V", &DecompilerConfig::default())?;
        assert_eq!(root.count(StructuredStatement::is_loop), 1);
        assert!(text.starts_with("while (true) {\n") || text.starts_with("while ("));
        assert!(!text.contains("goto"));
        assert!(!text.contains("continue"));
        assert!(comments.is_empty());
        Ok(())
    }

    #[test]
    fn test_try_catch_tree() -> crate::Result<()> {
        let mut asm = InstructionAssembler::new();
        asm.label("start")?
            .getstatic(SYSTEM_OUT)?
            .iconst(1)?
            .invokevirtual(PRINTLN_INT)?
            .label("end")?
            .goto("after")?
            .label("handler")?
            .astore(0)?
            .getstatic(SYSTEM_OUT)?
            .iconst(2)?
            .invokevirtual(PRINTLN_INT)?
            .label("after")?
            .vreturn()?
            .exception_handler("start", "end", "handler", Some(EXCEPTION))?;
        let (root, _, text) = assembled(asm, "()V", &DecompilerConfig::default())?;
        let StructuredStatement::TryCatch { catches, .. } = &root.statements()[0] else {
            panic!("expected try, got {text}");
        };
        assert_eq!(catches.len(), 1);
        assert_eq!(
            catches[0].catch_types,
            vec![crate::analysis::CatchType::Class("java/lang/Exception".to_string())]
        );
        assert!(text.starts_with("try {\n    java.lang.System.out.println(1);\n} catch (java.lang.Exception v0_"));
        assert!(text.ends_with("}\nreturn;\n"));
        Ok(())
    }

    #[test]
    fn test_catch_without_try_header_is_flagged() -> crate::Result<()> {
        let mut asm = InstructionAssembler::new();
        asm.label("start")?
            .getstatic(SYSTEM_OUT)?
            .iconst(1)?
            .invokevirtual(PRINTLN_INT)?
            .label("end")?
            .goto("after")?
            .label("handler")?
            .astore(0)?
            .getstatic(SYSTEM_OUT)?
            .iconst(2)?
            .invokevirtual(PRINTLN_INT)?
            .label("after")?
            .vreturn()?
            .exception_handler("start", "end", "handler", Some(EXCEPTION))?;
        let mut result = fully_structured(asm, "()V", true, &DecompilerConfig::default())?;
        let header = result
            .list
            .live()
            .find(|id| matches!(result.list[*id].statement, Statement::Try { .. }))
            .unwrap();
        result.list[header].statement = Statement::Nop;

        let root = assemble(&result.list, &mut result.comments);
        assert_eq!(root.count(|node| matches!(node, StructuredStatement::TryCatch { .. })), 0);
        let handler = root.statements().iter().find(|node| {
            matches!(node, StructuredStatement::Block(body)
                if matches!(body.first(), Some(StructuredStatement::Statement(Statement::Catch { .. }))))
        });
        let Some(StructuredStatement::Block(body)) = handler else {
            panic!("expected the handler as a block");
        };
        assert!(body.len() > 1);
        assert!(result.comments.contains(DecompilerComment::UnableToStructure));
        Ok(())
    }

    #[test]
    fn test_unpaired_monitor_is_commented() -> crate::Result<()> {
        let mut asm = InstructionAssembler::new();
        asm.aload(0)?.monitorenter()?.vreturn()?;
        let (_, comments, text) = assembled(asm, "(Ljava/lang/Object;)V", &DecompilerConfig::default())?;
        assert!(text.contains("// monitorenter(v0_0)"));
        assert!(comments.contains(DecompilerComment::CommentedMonitors));
        Ok(())
    }

    #[test]
    fn test_minimal_config_keeps_raw_jumps() -> crate::Result<()> {
        let mut asm = InstructionAssembler::new();
        asm.iload(0)?
            .ifeq("skip")?
            .getstatic(SYSTEM_OUT)?
            .iconst(1)?
            .invokevirtual(PRINTLN_INT)?
            .label("skip")?
            .vreturn()?;
        let (root, comments, text) = assembled(asm, "(I)V", &DecompilerConfig::minimal())?;
        let jumps = root.count(|node| matches!(node, StructuredStatement::Jump { .. }));
        let labels = root.count(|node| matches!(node, StructuredStatement::Label(_)));
        assert_eq!(jumps, 1);
        assert_eq!(labels, 1);
        assert!(text.contains(" goto lbl"));
        assert!(comments.contains(DecompilerComment::UnableToStructure));
        Ok(())
    }
}

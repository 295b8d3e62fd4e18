//! Structured switches.

use std::collections::BTreeMap;

use crate::{
    analysis::{BlockIdentifier, BlockKind},
    compiler::{
        pass::PassContext,
        passes::{raw_jump_target, same_landing},
        EventKind, StructuringPass,
    },
    config::DecompilerConfig,
    ir::{JumpKind, Statement, StatementId, StatementList},
};

/// Turns raw table and lookup switches into a `Switch` header followed by `Case` headers.
///
/// The default target counts as a case unless it lies after every case and is reached by a
/// jump out of the switch body, in which case it is where the switch ends. Otherwise the end is
/// the nearest raw jump target beyond the last case, or the first later statement entered from
/// outside. Jumps in the body to the end become breaks.
///
/// A switch whose body is not single-entry, or would straddle an existing block, stays raw.
pub struct ReplaceRawSwitchesPass;

impl Default for ReplaceRawSwitchesPass {
    fn default() -> Self {
        Self::new()
    }
}

/// Where a raw switch ends.
struct SwitchExtent {
    /// Position of the first statement after the body; the list length if none.
    end: usize,
    default_is_case: bool,
}

impl ReplaceRawSwitchesPass {
    /// Creates a new switch replacement pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn extent(list: &StatementList, header: StatementId) -> Option<SwitchExtent> {
        let start = list[header].index;
        let targets = &list[header].targets;
        let (&default, cases) = targets.split_first()?;
        if cases.is_empty() || targets.iter().any(|t| list[*t].index <= start) {
            return None;
        }

        let last_case = cases.iter().map(|t| list[*t].index).max()?;
        let default_index = list[default].index;
        if default_index > last_case
            && list
                .between(start, default_index)
                .any(|id| raw_jump_target(list, id) == Some(default))
        {
            return Some(SwitchExtent {
                end: default_index,
                default_is_case: false,
            });
        }

        let last = last_case.max(default_index);
        let beyond = list
            .between(start, last)
            .filter_map(|id| raw_jump_target(list, id))
            .map(|target| list[target].index)
            .filter(|index| *index > last)
            .min();
        let end = beyond.unwrap_or_else(|| {
            list.live()
                .filter(|id| list[*id].index > last)
                .find(|id| {
                    let position = list[*id].index;
                    list[*id].sources.iter().any(|source| {
                        let index = list[*source].index;
                        index < start || index >= position
                    })
                })
                .map_or(list.order().len(), |id| list[id].index)
        });
        Some(SwitchExtent {
            end,
            default_is_case: true,
        })
    }

    fn replace(&self, list: &mut StatementList, header: StatementId, ctx: &PassContext<'_>) -> bool {
        let Some(extent) = Self::extent(list, header) else {
            return false;
        };
        let start = list[header].index;
        if extent.end <= start + 1
            || !list.is_single_entry(start, extent.end - 1)
            || !list.range_respects_nesting(start, extent.end - 1)
        {
            return false;
        }
        let Statement::RawSwitch { value, keys } = list[header].statement.clone() else {
            return false;
        };
        let targets = list[header].targets.clone();
        let end_statement = list.at(extent.end);

        // Case groups keyed by target, in positional order.
        let mut groups: BTreeMap<usize, (StatementId, Vec<i32>, bool)> = BTreeMap::new();
        for (key, target) in keys.iter().zip(&targets[1..]) {
            groups
                .entry(list[*target].index)
                .or_insert_with(|| (*target, Vec::new(), false))
                .1
                .push(*key);
        }
        if extent.default_is_case {
            groups
                .entry(list[targets[0]].index)
                .or_insert_with(|| (targets[0], Vec::new(), false))
                .2 = true;
        }

        let switch = list.blocks_mut().mint(BlockKind::Switch);
        list[header].statement = Statement::Switch { value, block: switch };

        let mut case_headers = Vec::with_capacity(groups.len());
        for (_, (target, values, is_default)) in groups {
            let block = list.blocks_mut().mint(BlockKind::Case);
            let blocks = list[target].blocks.clone();
            let case = list.insert_before(
                target,
                Statement::Case {
                    values,
                    is_default,
                    switch,
                    block,
                },
                blocks,
            );
            list.redirect_sources(target, case, |_, _| true);
            list.add_edge(case, target);
            case_headers.push(case);
        }

        let mut header_targets = case_headers;
        if !extent.default_is_case {
            if let Some(end) = end_statement {
                header_targets.push(end);
            }
        }
        list.set_targets(header, header_targets);

        let end = end_statement.map_or(list.order().len(), |id| list[id].index);
        let start = list[header].index;
        Self::assign_members(list, switch, start, end);
        if let Some(exit) = end_statement {
            Self::rewrite_exits(list, switch, exit);
        }

        ctx.record(EventKind::SwitchReplaced, self.name(), list, header)
            .message(format!("switch {} structured", switch.label()));
        true
    }

    fn assign_members(list: &mut StatementList, switch: BlockIdentifier, header: usize, end: usize) {
        let body: Vec<StatementId> = list.between(header, end).collect();
        let mut case = None;
        for id in body {
            let opened = match list[id].statement {
                Statement::Case {
                    switch: owner,
                    block,
                    ..
                } if owner == switch => Some(block),
                _ => None,
            };
            list[id].blocks.insert(switch);
            match opened {
                Some(block) => case = Some(block),
                None => {
                    if let Some(block) = case {
                        list[id].blocks.insert(block);
                    }
                }
            }
        }
    }

    fn rewrite_exits(list: &mut StatementList, switch: BlockIdentifier, exit: StatementId) {
        let members = list.members(switch);
        for id in members {
            let Some(target) = raw_jump_target(list, id) else {
                continue;
            };
            if same_landing(list, target, exit) {
                if let Some(jump) = list[id].statement.jump_kind_mut() {
                    *jump = JumpKind::Break(switch);
                }
            }
        }
    }
}

impl StructuringPass for ReplaceRawSwitchesPass {
    fn name(&self) -> &'static str {
        "replace-raw-switches"
    }

    fn description(&self) -> &'static str {
        "Replaces table and lookup switches with switch and case blocks"
    }

    fn should_run(&self, config: &DecompilerConfig) -> bool {
        config.recognise_switches
    }

    fn run(&self, list: &mut StatementList, ctx: &mut PassContext<'_>) -> bool {
        let headers: Vec<StatementId> = list
            .live()
            .filter(|id| matches!(list[*id].statement, Statement::RawSwitch { .. }))
            .collect();
        let mut changed = false;
        for header in headers.into_iter().rev() {
            changed |= self.replace(list, header, ctx);
        }
        changed
    }
}

// This module implements the per-node compilation walk, the core of the crate. For
// each rule node it: scans the direct children to decide whether the shared global
// offset register must be kept current; builds and folds the address plan (direct
// offsets become base+literal expressions, indirect offsets become a pointer-read
// plan whose final offset expression combines the pointer register, the optional
// adjustment operand, and the global register); decides read reuse against the
// previous sibling by structural offset equality (the first child's previous
// sibling is its parent, roots have none); lowers the rule's kind into a test plan
// with the endianness swap applied and use-targets resolved through the symbol
// table; selects the global-offset advance; allocates the default-marker slot for
// a child list containing default rules; and recurses over the children. Rules are
// visited in preorder, which coincides with source order, so the emitted node
// vector is indexed by rule id.

use hashbrown::HashMap;

use super::error::{CompileError, CompileResult};
use super::expr::{BinOp, Expr, Reg};
use super::tree::RuleTree;
use super::{entry_symbol, CompileSession};
use crate::book::{Kind, Offset, PointerAdjust, Rule};
use crate::program::{
    AddrPlan, Advance, IndirectPlan, IntegerPlan, MatchNode, PageProgram, TestPlan,
};

/// Compile one page's rule tree into a program for one byte order.
pub(crate) fn build<'arena>(
    session: &CompileSession<'arena>,
    symbols: &HashMap<String, usize>,
    page: &str,
    rules: &[Rule],
    tree: &RuleTree<'arena>,
    swapped: bool,
) -> CompileResult<PageProgram> {
    let mut builder = ProgramBuilder {
        session,
        symbols,
        page,
        rules,
        tree,
        swap: swapped,
        nodes: Vec::with_capacity(rules.len()),
        marker_slots: 0,
    };

    for &root in &tree.roots {
        builder.compile_node(root, None, None)?;
    }

    Ok(PageProgram {
        symbol: entry_symbol(page, swapped),
        page: page.to_string(),
        swapped,
        trace: session.opts().trace_rules,
        marker_slots: builder.marker_slots,
        roots: tree.roots.iter().copied().collect(),
        nodes: builder.nodes,
    })
}

struct ProgramBuilder<'c, 'arena> {
    session: &'c CompileSession<'arena>,
    symbols: &'c HashMap<String, usize>,
    page: &'c str,
    rules: &'c [Rule],
    tree: &'c RuleTree<'arena>,
    swap: bool,
    nodes: Vec<MatchNode>,
    marker_slots: usize,
}

impl<'c, 'arena> ProgramBuilder<'c, 'arena> {
    /// Compile one node and its subtree.
    ///
    /// `marker` is the default-marker slot of the group this node belongs to,
    /// if any; `prev` is the sibling compiled immediately before it, used for
    /// read-reuse detection.
    fn compile_node(
        &mut self,
        id: u32,
        marker: Option<usize>,
        prev: Option<u32>,
    ) -> CompileResult<()> {
        let rules = self.rules;
        let tree = self.tree;
        let rule = &rules[id as usize];
        self.session.note_node();

        // The global offset register is only maintained when a direct child
        // actually inherits it.
        let emit_global = tree
            .node(id)
            .children
            .iter()
            .any(|&child| rules[child as usize].offset.references_global());

        let prev_rule = prev.map(|p| &rules[p as usize]);
        let reuse = prev_rule.is_some_and(|p| p.offset == rule.offset);

        let addr = self.compile_offset(rule, reuse);
        let (test, advance) = self.compile_kind(rule, marker, prev_rule, reuse, emit_global)?;

        let opts = self.session.opts();
        let line = (opts.trace_rules || opts.keep_rule_text).then(|| rule.line.clone());
        let label = (!rule.description.is_empty()).then(|| rule.description.clone());

        let children: Vec<u32> = tree.node(id).children.iter().copied().collect();
        let child_marker = children
            .iter()
            .any(|&c| matches!(rules[c as usize].kind, Kind::Default))
            .then_some(rule.level as usize);
        if let Some(slot) = child_marker {
            self.marker_slots = self.marker_slots.max(slot + 1);
        }

        // A clear rule leaves the marker it just reset unset; it does not
        // count as a matched alternative of its group.
        let set_marker = match rule.kind {
            Kind::Clear => None,
            _ => marker,
        };

        debug_assert_eq!(self.nodes.len(), id as usize);
        self.nodes.push(MatchNode {
            id,
            line,
            label,
            addr,
            test,
            advance,
            marker: set_marker,
            child_marker,
            children: children.clone(),
        });

        // The first child may reuse its parent's read.
        let mut prev_child = Some(id);
        for &child in &children {
            self.compile_node(child, child_marker, prev_child)?;
            prev_child = Some(child);
        }

        Ok(())
    }

    fn compile_offset(&self, rule: &Rule, reuse: bool) -> AddrPlan {
        match &rule.offset {
            Offset::Direct { offset, relative } => {
                let mut expr = Expr::bin(BinOp::Add, Expr::Var(Reg::Base), Expr::Lit(*offset));
                if *relative {
                    expr = Expr::bin(BinOp::Add, expr, Expr::Var(Reg::Global));
                }
                AddrPlan::Direct(self.fold(expr))
            }
            Offset::Indirect(ind) => {
                if reuse {
                    self.session.note_pointer_reuse();
                }

                let addr = if ind.addr_relative {
                    Expr::bin(BinOp::Add, Expr::Var(Reg::Global), Expr::Lit(ind.addr))
                } else {
                    Expr::Lit(ind.addr)
                };

                let (adjust_read_at, operand) = match &ind.adjust {
                    PointerAdjust::None => (None, None),
                    PointerAdjust::Const { op, value } => (None, Some((*op, Expr::Lit(*value)))),
                    PointerAdjust::FromRead { op, at } => {
                        (Some(*at), Some((*op, Expr::Var(Reg::Adjust))))
                    }
                };

                let mut offset = Expr::Var(Reg::Pointer);
                if let Some((op, rhs)) = operand {
                    offset = Expr::bin(op.into(), offset, rhs);
                }
                if ind.relative {
                    offset = Expr::bin(BinOp::Add, offset, Expr::Var(Reg::Global));
                }

                AddrPlan::Indirect(IndirectPlan {
                    reuse,
                    width: ind.width,
                    endian: ind.endian.maybe_swapped(self.swap),
                    addr: self.fold(addr),
                    adjust_read_at,
                    offset: self.fold(offset),
                })
            }
        }
    }

    fn compile_kind(
        &self,
        rule: &Rule,
        marker: Option<usize>,
        prev_rule: Option<&Rule>,
        reuse: bool,
        emit_global: bool,
    ) -> CompileResult<(TestPlan, Advance)> {
        match &rule.kind {
            Kind::Integer(ik) => {
                let advance = if emit_global {
                    Advance::PastValue(ik.width)
                } else {
                    Advance::None
                };
                if ik.match_any {
                    return Ok((TestPlan::AnyValue, advance));
                }
                // The value read is shared only when the sibling tested the
                // same offset at the same width.
                let reuse_val = reuse
                    && prev_rule.is_some_and(
                        |p| matches!(&p.kind, Kind::Integer(pik) if pik.width == ik.width),
                    );
                if reuse_val {
                    self.session.note_value_reuse();
                }
                Ok((
                    TestPlan::Integer(IntegerPlan {
                        reuse: reuse_val,
                        width: ik.width,
                        endian: ik.endian.maybe_swapped(self.swap),
                        mask: ik.mask,
                        adjust: ik.adjust,
                        test: ik.test,
                        value: ik.value,
                    }),
                    advance,
                ))
            }
            Kind::String(sk) => Ok((
                TestPlan::String {
                    pattern: sk.pattern.clone(),
                    flags: sk.flags,
                    negate: sk.negate,
                },
                if emit_global {
                    Advance::PastMatch
                } else {
                    Advance::None
                },
            )),
            Kind::Search(sk) => Ok((
                TestPlan::Search {
                    pattern: sk.pattern.clone(),
                    max_len: sk.max_len,
                },
                if emit_global {
                    Advance::PastSearch(sk.pattern.len())
                } else {
                    Advance::None
                },
            )),
            Kind::Use(uk) => {
                let symbol = entry_symbol(&uk.page, uk.swap_endian);
                let target = self.symbols.get(&symbol).copied().ok_or_else(|| {
                    CompileError::UnknownUseTarget {
                        page: self.page.to_string(),
                        target: uk.page.clone(),
                        line: rule.line.clone(),
                    }
                })?;
                Ok((TestPlan::Use { target, symbol }, Advance::None))
            }
            Kind::Name => Ok((TestPlan::Name, Advance::None)),
            Kind::Clear => {
                let slot = self.marker_scope(rule, marker)?;
                Ok((TestPlan::Clear { slot }, Advance::None))
            }
            Kind::Default => {
                let slot = self.marker_scope(rule, marker)?;
                Ok((
                    TestPlan::Default { slot },
                    if emit_global {
                        Advance::AtAddress
                    } else {
                        Advance::None
                    },
                ))
            }
        }
    }

    fn marker_scope(&self, rule: &Rule, marker: Option<usize>) -> CompileResult<usize> {
        marker.ok_or_else(|| CompileError::NoDefaultScope {
            family: rule.kind.family(),
            page: self.page.to_string(),
            line: rule.line.clone(),
        })
    }

    fn fold(&self, expr: Expr) -> Expr {
        let folded = expr.clone().fold();
        if folded != expr {
            self.session.note_fold();
        }
        folded
    }
}

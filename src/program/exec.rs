// This module executes compiled page programs. Each invocation owns an evaluation
// frame holding the registers the compiler's plans reference: the base offset, the
// global offset inherited by relative children, the scratch results of the last
// pointer/adjustment/value reads together with their success flags, the last
// string/search match position, and the default-marker slots. Node evaluation is
// structured control flow: a failing step returns Outcome::Fail, which unwinds
// only that node's subtree; the parent keeps walking its remaining children, so a
// non-match never aborts siblings or the page. The read-reuse flags planned at
// compile time are honored here by consulting the still-valid scratch registers
// instead of re-reading the buffer.

use log::trace;

use super::{AddrPlan, Advance, CompiledBook, MatchNode, PageProgram, TestPlan};
use crate::book::IntegerTest;
use crate::compiler::expr::Regs;
use crate::runtime::{read_uint, search_test, string_test};

/// Result of one node's own test chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
enum Outcome {
    Pass,
    Fail,
}

/// Per-invocation matcher state. Never shared across invocations.
struct EvalFrame<'buf> {
    buf: &'buf [u8],
    base: i64,
    global: i64,
    ptr: u64,
    ptr_ok: bool,
    adj: u64,
    adj_ok: bool,
    val: u64,
    val_ok: bool,
    pos: i64,
    markers: Vec<bool>,
}

impl<'buf> EvalFrame<'buf> {
    fn new(buf: &'buf [u8], base: i64, marker_slots: usize) -> Self {
        Self {
            buf,
            base,
            global: 0,
            ptr: 0,
            ptr_ok: false,
            adj: 0,
            adj_ok: false,
            val: 0,
            val_ok: false,
            pos: 0,
            markers: vec![false; marker_slots],
        }
    }

    fn regs(&self) -> Regs {
        Regs {
            base: self.base,
            global: self.global,
            pointer: self.ptr as i64,
            adjust: self.adj as i64,
        }
    }
}

impl PageProgram {
    /// Run this program against a buffer, appending matched labels to `out`.
    pub(crate) fn run(&self, book: &CompiledBook, buf: &[u8], base: i64, out: &mut Vec<String>) {
        let mut frame = EvalFrame::new(buf, base, self.marker_slots);
        for &root in &self.roots {
            self.exec_node(book, root, &mut frame, out);
        }
    }

    /// A failed node skips only its own subtree; the caller always continues.
    fn exec_node(&self, book: &CompiledBook, id: u32, frame: &mut EvalFrame<'_>, out: &mut Vec<String>) {
        let _ = self.try_node(book, id, frame, out);
    }

    fn try_node(
        &self,
        book: &CompiledBook,
        id: u32,
        frame: &mut EvalFrame<'_>,
        out: &mut Vec<String>,
    ) -> Outcome {
        let node = &self.nodes[id as usize];

        let addr = match self.resolve_addr(node, frame) {
            Some(addr) => addr,
            None => return Outcome::Fail,
        };

        match &node.test {
            TestPlan::Integer(plan) => {
                if !plan.reuse {
                    match read_uint(frame.buf, addr, plan.width, plan.endian) {
                        Some(v) => {
                            frame.val = v;
                            frame.val_ok = true;
                        }
                        None => frame.val_ok = false,
                    }
                }
                if !frame.val_ok {
                    return Outcome::Fail;
                }
                let mut v = frame.val;
                if let Some(mask) = plan.mask {
                    v &= mask;
                }
                if let Some(adjust) = plan.adjust {
                    v = match adjust.op.apply_unsigned(v, adjust.value as u64) {
                        Some(v) => v,
                        None => return Outcome::Fail,
                    };
                }
                let ok = match plan.test {
                    IntegerTest::Equal => v == (plan.value as u64) & plan.width.mask(),
                    IntegerTest::NotEqual => v != (plan.value as u64) & plan.width.mask(),
                    IntegerTest::LessThan => plan.width.sign_extend(v) < plan.value,
                    IntegerTest::GreaterThan => plan.width.sign_extend(v) > plan.value,
                };
                if !ok {
                    return Outcome::Fail;
                }
            }
            TestPlan::AnyValue => {}
            TestPlan::String {
                pattern,
                flags,
                negate,
            } => {
                frame.pos = string_test(frame.buf, addr, pattern, *flags);
                let matched = frame.pos >= 0;
                if matched == *negate {
                    return Outcome::Fail;
                }
            }
            TestPlan::Search { pattern, max_len } => {
                frame.pos = search_test(frame.buf, addr, *max_len, pattern);
                if frame.pos < 0 {
                    return Outcome::Fail;
                }
            }
            TestPlan::Use { target, .. } => {
                // Delegation cannot fail; a target that matches nothing just
                // contributes no labels.
                book.programs[*target].run(book, frame.buf, addr, out);
            }
            TestPlan::Name => {}
            TestPlan::Clear { slot } => frame.markers[*slot] = false,
            TestPlan::Default { slot } => {
                if frame.markers[*slot] {
                    return Outcome::Fail;
                }
            }
        }

        match node.advance {
            Advance::None => {}
            Advance::PastValue(width) => {
                frame.global = addr.wrapping_add(width.bytes() as i64);
            }
            Advance::PastMatch => frame.global = addr.wrapping_add(frame.pos),
            Advance::PastSearch(len) => {
                frame.global = addr.wrapping_add(frame.pos).wrapping_add(len as i64);
            }
            Advance::AtAddress => frame.global = addr,
        }

        if self.trace {
            if let Some(line) = &node.line {
                trace!("{line}");
            }
        }
        if let Some(label) = &node.label {
            out.push(label.clone());
        }

        if let Some(slot) = node.child_marker {
            frame.markers[slot] = false;
        }
        for &child in &node.children {
            self.exec_node(book, child, frame, out);
        }

        if let Some(slot) = node.marker {
            frame.markers[slot] = true;
        }

        Outcome::Pass
    }

    /// Resolve a node's effective address, issuing (or reusing) the indirect
    /// reads its plan calls for. `None` is a match failure.
    fn resolve_addr(&self, node: &MatchNode, frame: &mut EvalFrame<'_>) -> Option<i64> {
        match &node.addr {
            AddrPlan::Direct(expr) => expr.eval(&frame.regs()),
            AddrPlan::Indirect(plan) => {
                if !plan.reuse {
                    let at = plan.addr.eval(&frame.regs())?;
                    match read_uint(frame.buf, at, plan.width, plan.endian) {
                        Some(v) => {
                            frame.ptr = v;
                            frame.ptr_ok = true;
                        }
                        None => frame.ptr_ok = false,
                    }
                }
                if !frame.ptr_ok {
                    return None;
                }
                if let Some(delta) = plan.adjust_read_at {
                    let at = plan.addr.eval(&frame.regs())?.wrapping_add(delta);
                    match read_uint(frame.buf, at, plan.width, plan.endian) {
                        Some(v) => {
                            frame.adj = v;
                            frame.adj_ok = true;
                        }
                        None => frame.adj_ok = false,
                    }
                    if !frame.adj_ok {
                        return None;
                    }
                }
                plan.offset.eval(&frame.regs())
            }
        }
    }
}

// This module renders a compiled page program as a human-readable listing: one
// line per node in preorder, indented by tree depth, showing the node id, the
// resolved address plan, the test, and the success effects (global-offset
// advance, marker initialization and set). When rule text was retained at
// compile time each node is preceded by a comment line carrying the original
// rule source, mirroring the comment mode of generated-source compilers.

use std::fmt;

use super::{AddrPlan, Advance, MatchNode, PageProgram, TestPlan};

impl fmt::Display for PageProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "program {} (page {:?}, {}, {} nodes)",
            self.symbol,
            self.page,
            if self.swapped { "swapped" } else { "native" },
            self.nodes.len()
        )?;
        for &root in &self.roots {
            self.fmt_node(f, root, 1)?;
        }
        Ok(())
    }
}

impl PageProgram {
    fn fmt_node(&self, f: &mut fmt::Formatter<'_>, id: u32, depth: usize) -> fmt::Result {
        let node = &self.nodes[id as usize];
        let pad = "  ".repeat(depth);

        if let Some(line) = &node.line {
            writeln!(f, "{pad}; {line}")?;
        }

        write!(f, "{pad}[{}] ", node.id)?;
        self.fmt_addr(f, node)?;
        write!(f, ": ")?;
        self.fmt_test(f, node)?;
        self.fmt_effects(f, node)?;
        writeln!(f)?;

        for &child in &node.children {
            self.fmt_node(f, child, depth + 1)?;
        }
        Ok(())
    }

    fn fmt_addr(&self, f: &mut fmt::Formatter<'_>, node: &MatchNode) -> fmt::Result {
        match &node.addr {
            AddrPlan::Direct(expr) => write!(f, "at {expr}"),
            AddrPlan::Indirect(plan) => {
                write!(
                    f,
                    "at *[{}]:u{}{}",
                    plan.addr,
                    plan.width.bytes() * 8,
                    plan.endian
                )?;
                if let Some(delta) = plan.adjust_read_at {
                    write!(f, " adj@{delta:+}")?;
                }
                if plan.reuse {
                    write!(f, " (reuse)")?;
                }
                write!(f, " -> {}", plan.offset)
            }
        }
    }

    fn fmt_test(&self, f: &mut fmt::Formatter<'_>, node: &MatchNode) -> fmt::Result {
        match &node.test {
            TestPlan::Integer(plan) => {
                write!(f, "u{}{}", plan.width.bytes() * 8, plan.endian)?;
                if let Some(mask) = plan.mask {
                    write!(f, " & {mask:#x}")?;
                }
                if let Some(adjust) = plan.adjust {
                    write!(f, " {} {}", adjust.op, adjust.value)?;
                }
                write!(f, " {} {:#x}", plan.test, plan.value)?;
                if plan.reuse {
                    write!(f, " (reuse)")?;
                }
                Ok(())
            }
            TestPlan::AnyValue => write!(f, "any"),
            TestPlan::String {
                pattern, negate, ..
            } => {
                if *negate {
                    write!(f, "!")?;
                }
                write!(f, "string {:?}", String::from_utf8_lossy(pattern))
            }
            TestPlan::Search { pattern, max_len } => {
                write!(f, "search/{max_len} {:?}", String::from_utf8_lossy(pattern))
            }
            TestPlan::Use { symbol, .. } => write!(f, "use {symbol}"),
            TestPlan::Name => write!(f, "name"),
            TestPlan::Clear { slot } => write!(f, "clear d{slot}"),
            TestPlan::Default { slot } => write!(f, "default d{slot}"),
        }
    }

    fn fmt_effects(&self, f: &mut fmt::Formatter<'_>, node: &MatchNode) -> fmt::Result {
        match node.advance {
            Advance::None => {}
            Advance::PastValue(width) => write!(f, " {{global = addr + {}}}", width.bytes())?,
            Advance::PastMatch => write!(f, " {{global = addr + pos}}")?,
            Advance::PastSearch(len) => write!(f, " {{global = addr + pos + {len}}}")?,
            Advance::AtAddress => write!(f, " {{global = addr}}")?,
        }
        if let Some(slot) = node.child_marker {
            write!(f, " {{init d{slot}}}")?;
        }
        if let Some(slot) = node.marker {
            write!(f, " {{set d{slot}}}")?;
        }
        if let Some(label) = &node.label {
            write!(f, " => {label:?}")?;
        }
        Ok(())
    }
}

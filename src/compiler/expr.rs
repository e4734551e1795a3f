// This module implements the small arithmetic expression tree used to compute
// effective addresses in compiled programs: integer literals, references to the
// named scratch registers of an evaluation frame (base offset, global offset, the
// two indirect-read results), and binary operations over sub-expressions. The
// constant-folding transform collapses operations over two literals at compile
// time and leaves everything else structurally intact, so it can never change
// what an expression evaluates to. Division is the one operator that can fail at
// evaluation time (zero divisor, i64::MIN / -1); folding skips exactly those
// cases and evaluation reports them as an absent value, which the executor
// treats as a match failure.

use crate::book::AdjustOp;

/// A scratch register an address expression may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reg {
    /// The base offset the entry point was invoked with.
    Base,
    /// The global offset established by a parent rule.
    Global,
    /// The pointer value read by the current indirect offset.
    Pointer,
    /// The adjustment operand read by the current indirect offset.
    Adjust,
}

impl std::fmt::Display for Reg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Reg::Base => write!(f, "base"),
            Reg::Global => write!(f, "global"),
            Reg::Pointer => write!(f, "ptr"),
            Reg::Adjust => write!(f, "adj"),
        }
    }
}

/// Binary operator of an address expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinOp {
    /// Evaluate over concrete operands. Add/sub/mul wrap; division yields
    /// `None` for a zero divisor or `i64::MIN / -1`.
    pub fn apply(self, lhs: i64, rhs: i64) -> Option<i64> {
        match self {
            BinOp::Add => Some(lhs.wrapping_add(rhs)),
            BinOp::Sub => Some(lhs.wrapping_sub(rhs)),
            BinOp::Mul => Some(lhs.wrapping_mul(rhs)),
            BinOp::Div => lhs.checked_div(rhs),
        }
    }
}

impl From<AdjustOp> for BinOp {
    fn from(op: AdjustOp) -> Self {
        match op {
            AdjustOp::Add => BinOp::Add,
            AdjustOp::Sub => BinOp::Sub,
            AdjustOp::Mul => BinOp::Mul,
            AdjustOp::Div => BinOp::Div,
        }
    }
}

impl std::fmt::Display for BinOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BinOp::Add => write!(f, "+"),
            BinOp::Sub => write!(f, "-"),
            BinOp::Mul => write!(f, "*"),
            BinOp::Div => write!(f, "/"),
        }
    }
}

/// Concrete values for the scratch registers, supplied by the executor.
#[derive(Debug, Clone, Copy, Default)]
pub struct Regs {
    pub base: i64,
    pub global: i64,
    pub pointer: i64,
    pub adjust: i64,
}

impl Regs {
    fn get(&self, reg: Reg) -> i64 {
        match reg {
            Reg::Base => self.base,
            Reg::Global => self.global,
            Reg::Pointer => self.pointer,
            Reg::Adjust => self.adjust,
        }
    }
}

/// Address arithmetic over literals and scratch registers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Lit(i64),
    Var(Reg),
    Bin {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
}

impl Expr {
    pub fn bin(op: BinOp, lhs: Expr, rhs: Expr) -> Expr {
        Expr::Bin {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    /// Collapse constant sub-expressions.
    ///
    /// Both operands of an operation are folded first; an operation over two
    /// literals becomes a single literal unless the operator cannot evaluate
    /// it (failing division stays unfolded and fails at match time instead).
    pub fn fold(self) -> Expr {
        match self {
            Expr::Bin { op, lhs, rhs } => {
                let lhs = lhs.fold();
                let rhs = rhs.fold();
                if let (Expr::Lit(a), Expr::Lit(b)) = (&lhs, &rhs) {
                    if let Some(v) = op.apply(*a, *b) {
                        return Expr::Lit(v);
                    }
                }
                Expr::Bin {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                }
            }
            other => other,
        }
    }

    /// Evaluate against concrete register values. `None` means a division
    /// failed and the referencing node must fail its match.
    pub fn eval(&self, regs: &Regs) -> Option<i64> {
        match self {
            Expr::Lit(v) => Some(*v),
            Expr::Var(reg) => Some(regs.get(*reg)),
            Expr::Bin { op, lhs, rhs } => op.apply(lhs.eval(regs)?, rhs.eval(regs)?),
        }
    }
}

impl std::fmt::Display for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expr::Lit(v) => write!(f, "{v}"),
            Expr::Var(reg) => write!(f, "{reg}"),
            Expr::Bin { op, lhs, rhs } => write!(f, "({lhs} {op} {rhs})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lit(v: i64) -> Expr {
        Expr::Lit(v)
    }

    #[test]
    fn folds_literal_operations() {
        let e = Expr::bin(BinOp::Add, lit(4), Expr::bin(BinOp::Mul, lit(2), lit(8)));
        assert_eq!(e.fold(), lit(20));
    }

    #[test]
    fn variables_block_folding_but_operands_still_fold() {
        let e = Expr::bin(
            BinOp::Add,
            Expr::Var(Reg::Base),
            Expr::bin(BinOp::Sub, lit(10), lit(4)),
        );
        let folded = e.fold();
        assert_eq!(folded, Expr::bin(BinOp::Add, Expr::Var(Reg::Base), lit(6)));
    }

    #[test]
    fn folding_is_idempotent() {
        let exprs = [
            lit(7),
            Expr::Var(Reg::Global),
            Expr::bin(BinOp::Add, Expr::Var(Reg::Base), lit(3)),
            Expr::bin(BinOp::Div, lit(9), lit(0)),
        ];
        for e in exprs {
            let once = e.fold();
            assert_eq!(once.clone().fold(), once);
        }
    }

    #[test]
    fn folding_preserves_evaluation() {
        let regs = Regs {
            base: 100,
            global: 7,
            pointer: -3,
            adjust: 2,
        };
        let exprs = [
            Expr::bin(
                BinOp::Add,
                Expr::bin(BinOp::Mul, Expr::Var(Reg::Pointer), lit(4)),
                Expr::Var(Reg::Global),
            ),
            Expr::bin(BinOp::Sub, lit(i64::MAX), lit(-1)),
            Expr::bin(BinOp::Div, Expr::Var(Reg::Base), Expr::Var(Reg::Adjust)),
        ];
        for e in exprs {
            assert_eq!(e.eval(&regs), e.clone().fold().eval(&regs));
        }
    }

    #[test]
    fn failing_division_stays_unfolded_and_fails_eval() {
        let e = Expr::bin(BinOp::Div, lit(1), lit(0));
        let folded = e.clone().fold();
        assert_eq!(folded, e);
        assert_eq!(folded.eval(&Regs::default()), None);

        let overflow = Expr::bin(BinOp::Div, lit(i64::MIN), lit(-1));
        assert_eq!(overflow.clone().fold(), overflow);
        assert_eq!(overflow.eval(&Regs::default()), None);
    }

    #[test]
    fn display_is_parenthesized_infix() {
        let e = Expr::bin(
            BinOp::Add,
            Expr::Var(Reg::Base),
            Expr::bin(BinOp::Mul, Expr::Var(Reg::Pointer), lit(4)),
        );
        assert_eq!(e.to_string(), "(base + (ptr * 4))");
    }
}

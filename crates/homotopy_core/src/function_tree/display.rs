use std::fmt;

use super::{Node, NodeKind, UnaryOp};

fn write_base(f: &mut fmt::Formatter<'_>, base: &Node) -> fmt::Result {
    if base.is_variable() {
        write!(f, "{}", base)
    } else {
        write!(f, "({})", base)
    }
}

/// Renders the expression in the syntax accepted by
/// [`parse_expression`](crate::parser::parse_expression). Differentials
/// print as `d(x)`, which has no parsed form.
impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.kind() {
            NodeKind::Variable(v) => write!(f, "{}", v.name),
            NodeKind::Number(n) => {
                if n.as_integer().is_some_and(|k| k < 0) {
                    write!(f, "({})", n)
                } else {
                    write!(f, "{}", n)
                }
            }
            NodeKind::Differential(v) => write!(f, "d({})", v),
            NodeKind::Unary(UnaryOp::Negate, x) => write!(f, "-({})", x),
            NodeKind::Unary(op, x) => write!(f, "{}({})", op.name(), x),
            NodeKind::Sum(terms) => {
                write!(f, "(")?;
                for (k, term) in terms.iter().enumerate() {
                    match (k, term.positive) {
                        (0, true) => {}
                        (_, true) => write!(f, "+")?,
                        (_, false) => write!(f, "-")?,
                    }
                    write!(f, "{}", term.node)?;
                }
                write!(f, ")")
            }
            NodeKind::Product(factors) => {
                write!(f, "(")?;
                for (k, factor) in factors.iter().enumerate() {
                    match (k, factor.divide) {
                        (0, true) => write!(f, "1/")?,
                        (0, false) => {}
                        (_, true) => write!(f, "/")?,
                        (_, false) => write!(f, "*")?,
                    }
                    write!(f, "{}", factor.node)?;
                }
                write!(f, ")")
            }
            NodeKind::IntegerPower(base, exponent) => {
                write_base(f, base)?;
                if *exponent < 0 {
                    write!(f, "^({})", exponent)
                } else {
                    write!(f, "^{}", exponent)
                }
            }
            NodeKind::Power(base, exponent) => {
                write_base(f, base)?;
                write!(f, "^({})", exponent)
            }
            NodeKind::LinearProduct(lp) => write!(f, "{}", lp.expanded()),
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node({})", self)
    }
}

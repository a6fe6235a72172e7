//! Operator overloads and free functions for building expressions.
//!
//! Chained sums and products are flattened when the left operand is not
//! shared, so `a + b + c` yields one sum with three terms.

use std::ops::{Add, Div, Mul, Neg, Sub};
use std::rc::Rc;

use super::{Factor, Node, NodeKind, Number, Term, UnaryOp};

fn into_terms(node: Node) -> Vec<Term> {
    if !matches!(&*node.kind(), NodeKind::Sum(_)) {
        return vec![Term::plus(node)];
    }
    match Rc::try_unwrap(node.0) {
        Ok(cell) => match cell.kind.into_inner() {
            NodeKind::Sum(terms) => terms,
            other => vec![Term::plus(Node::new(other))],
        },
        Err(shared) => vec![Term::plus(Node(shared))],
    }
}

fn into_factors(node: Node) -> Vec<Factor> {
    if !matches!(&*node.kind(), NodeKind::Product(_)) {
        return vec![Factor::times(node)];
    }
    match Rc::try_unwrap(node.0) {
        Ok(cell) => match cell.kind.into_inner() {
            NodeKind::Product(factors) => factors,
            other => vec![Factor::times(Node::new(other))],
        },
        Err(shared) => vec![Factor::times(Node(shared))],
    }
}

fn add(lhs: Node, rhs: Node) -> Node {
    let mut terms = into_terms(lhs);
    terms.push(Term::plus(rhs));
    Node::sum(terms)
}

fn sub(lhs: Node, rhs: Node) -> Node {
    let mut terms = into_terms(lhs);
    terms.push(Term::minus(rhs));
    Node::sum(terms)
}

fn mul(lhs: Node, rhs: Node) -> Node {
    let mut factors = into_factors(lhs);
    factors.push(Factor::times(rhs));
    Node::product(factors)
}

fn div(lhs: Node, rhs: Node) -> Node {
    let mut factors = into_factors(lhs);
    factors.push(Factor::over(rhs));
    Node::product(factors)
}

macro_rules! node_binary_op {
    ($op:ident, $method:ident, $combine:ident) => {
        impl $op<Node> for Node {
            type Output = Node;
            fn $method(self, rhs: Node) -> Node {
                $combine(self, rhs)
            }
        }

        impl $op<&Node> for Node {
            type Output = Node;
            fn $method(self, rhs: &Node) -> Node {
                $combine(self, rhs.clone())
            }
        }

        impl $op<Node> for &Node {
            type Output = Node;
            fn $method(self, rhs: Node) -> Node {
                $combine(self.clone(), rhs)
            }
        }

        impl $op<&Node> for &Node {
            type Output = Node;
            fn $method(self, rhs: &Node) -> Node {
                $combine(self.clone(), rhs.clone())
            }
        }

        impl $op<i64> for Node {
            type Output = Node;
            fn $method(self, rhs: i64) -> Node {
                $combine(self, Node::integer(rhs))
            }
        }

        impl $op<i64> for &Node {
            type Output = Node;
            fn $method(self, rhs: i64) -> Node {
                $combine(self.clone(), Node::integer(rhs))
            }
        }

        impl $op<Node> for i64 {
            type Output = Node;
            fn $method(self, rhs: Node) -> Node {
                $combine(Node::integer(self), rhs)
            }
        }

        impl $op<&Node> for i64 {
            type Output = Node;
            fn $method(self, rhs: &Node) -> Node {
                $combine(Node::integer(self), rhs.clone())
            }
        }
    };
}

node_binary_op!(Add, add, add);
node_binary_op!(Sub, sub, sub);
node_binary_op!(Mul, mul, mul);
node_binary_op!(Div, div, div);

impl Neg for Node {
    type Output = Node;
    fn neg(self) -> Node {
        Node::unary(UnaryOp::Negate, self)
    }
}

impl Neg for &Node {
    type Output = Node;
    fn neg(self) -> Node {
        Node::unary(UnaryOp::Negate, self.clone())
    }
}

/// `base^exponent` for an integer exponent.
pub fn pow(base: &Node, exponent: i32) -> Node {
    Node::integer_power(base.clone(), exponent)
}

pub fn sqrt(x: &Node) -> Node {
    Node::unary(UnaryOp::Sqrt, x.clone())
}

pub fn sin(x: &Node) -> Node {
    Node::unary(UnaryOp::Sin, x.clone())
}

pub fn cos(x: &Node) -> Node {
    Node::unary(UnaryOp::Cos, x.clone())
}

pub fn tan(x: &Node) -> Node {
    Node::unary(UnaryOp::Tan, x.clone())
}

pub fn exp(x: &Node) -> Node {
    Node::unary(UnaryOp::Exp, x.clone())
}

/// Natural logarithm.
pub fn log(x: &Node) -> Node {
    Node::unary(UnaryOp::Log, x.clone())
}

pub fn asin(x: &Node) -> Node {
    Node::unary(UnaryOp::ArcSin, x.clone())
}

pub fn acos(x: &Node) -> Node {
    Node::unary(UnaryOp::ArcCos, x.clone())
}

pub fn atan(x: &Node) -> Node {
    Node::unary(UnaryOp::ArcTan, x.clone())
}

pub fn pi() -> Node {
    Node::number(Number::Pi)
}

pub fn e() -> Node {
    Node::number(Number::E)
}

/// The imaginary unit.
pub fn i() -> Node {
    Node::number(Number::ImaginaryUnit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_complex::Complex64;

    #[test]
    fn chained_sums_flatten() {
        let x = Node::variable("x");
        let y = Node::variable("y");
        let f = &x + &y - 3 + &x;
        match &*f.kind() {
            NodeKind::Sum(terms) => {
                assert_eq!(terms.len(), 4);
                assert!(!terms[2].positive);
            }
            _ => panic!("expected a sum"),
        };
    }

    #[test]
    fn shared_operands_are_not_flattened() {
        let x = Node::variable("x");
        let s = &x + 1;
        let f = &s + 2;
        match &*f.kind() {
            NodeKind::Sum(terms) => assert_eq!(terms.len(), 2),
            _ => panic!("expected a sum"),
        }
        match &*s.kind() {
            NodeKind::Sum(terms) => assert_eq!(terms.len(), 2),
            _ => panic!("expected a sum"),
        };
    }

    #[test]
    fn division_and_negation_evaluate() {
        let x = Node::variable("x");
        let f = -(&x * 6 / (&x + 1)) + 1 - pow(&x, -1);
        x.set_value(Complex64::new(2.0, 0.0));
        assert!((f.eval::<Complex64>(None) - Complex64::new(-3.5, 0.0)).norm() < 1e-15);
    }

    #[test]
    fn imaginary_unit_squares_to_minus_one() {
        let f = i() * i();
        assert!((f.eval::<Complex64>(None) + Complex64::new(1.0, 0.0)).norm() < 1e-15);
    }
}

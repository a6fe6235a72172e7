use super::ops::{cos, log, pow, sin, sqrt};
use super::{Factor, Node, NodeKind, Term, UnaryOp};

impl Node {
    /// Symbolic total differential of the subtree.
    ///
    /// The result contains [`NodeKind::Differential`] leaves; evaluating it
    /// with `diff_variable = Some(v)` gives the partial derivative in `v`.
    /// Subexpressions of `self` are shared, not copied.
    pub fn differentiate(&self) -> Node {
        match &*self.kind() {
            NodeKind::Variable(_) => Node::new(NodeKind::Differential(self.clone())),
            NodeKind::Number(_) | NodeKind::Differential(_) => Node::integer(0),
            NodeKind::Unary(op, x) => differentiate_unary(self, *op, x),
            NodeKind::Sum(terms) => {
                let derivatives: Vec<Term> = terms
                    .iter()
                    .filter_map(|t| {
                        let d = t.node.differentiate();
                        (!d.is_zero_constant()).then_some(Term { node: d, positive: t.positive })
                    })
                    .collect();
                if derivatives.is_empty() {
                    Node::integer(0)
                } else {
                    Node::sum(derivatives)
                }
            }
            NodeKind::Product(factors) => differentiate_product(factors),
            NodeKind::IntegerPower(base, exponent) => {
                let db = base.differentiate();
                if *exponent == 0 || db.is_zero_constant() {
                    return Node::integer(0);
                }
                let n = *exponent;
                let mut factors = vec![Factor::times(Node::integer(n as i64))];
                match n - 1 {
                    0 => {}
                    1 => factors.push(Factor::times(base.clone())),
                    k => factors.push(Factor::times(pow(base, k))),
                }
                factors.push(Factor::times(db));
                Node::product(factors)
            }
            NodeKind::Power(base, exponent) => {
                let db = base.differentiate();
                let de = exponent.differentiate();
                let mut terms = Vec::new();
                if !db.is_zero_constant() {
                    // e * b^(e-1) * db
                    let lowered = Node::power(base.clone(), exponent - 1);
                    terms.push(Term::plus(Node::product(vec![
                        Factor::times(exponent.clone()),
                        Factor::times(lowered),
                        Factor::times(db),
                    ])));
                }
                if !de.is_zero_constant() {
                    // b^e * log(b) * de
                    terms.push(Term::plus(Node::product(vec![
                        Factor::times(self.clone()),
                        Factor::times(log(base)),
                        Factor::times(de),
                    ])));
                }
                match terms.len() {
                    0 => Node::integer(0),
                    1 => terms.remove(0).node,
                    _ => Node::sum(terms),
                }
            }
            NodeKind::LinearProduct(lp) => lp.expanded().differentiate(),
        }
    }
}

fn differentiate_unary(node: &Node, op: UnaryOp, x: &Node) -> Node {
    let dx = x.differentiate();
    if dx.is_zero_constant() {
        return Node::integer(0);
    }
    match op {
        UnaryOp::Negate => -dx,
        UnaryOp::Sqrt => Node::product(vec![
            Factor::times(dx),
            Factor::over(Node::integer(2)),
            Factor::over(node.clone()),
        ]),
        UnaryOp::Sin => cos(x) * dx,
        UnaryOp::Cos => -(sin(x) * dx),
        UnaryOp::Tan => Node::product(vec![Factor::times(dx), Factor::over(pow(&cos(x), 2))]),
        UnaryOp::Exp => node * dx,
        UnaryOp::Log => Node::product(vec![Factor::times(dx), Factor::over(x.clone())]),
        UnaryOp::ArcSin => Node::product(vec![
            Factor::times(dx),
            Factor::over(sqrt(&(1 - pow(x, 2)))),
        ]),
        UnaryOp::ArcCos => -Node::product(vec![
            Factor::times(dx),
            Factor::over(sqrt(&(1 - pow(x, 2)))),
        ]),
        UnaryOp::ArcTan => Node::product(vec![Factor::times(dx), Factor::over(1 + pow(x, 2))]),
    }
}

/// Product rule; a divided factor `f` contributes `-df / f^2` times the rest.
fn differentiate_product(factors: &[Factor]) -> Node {
    let mut terms = Vec::new();
    for (i, factor) in factors.iter().enumerate() {
        let d = factor.node.differentiate();
        if d.is_zero_constant() {
            continue;
        }
        let mut parts = vec![Factor::times(d)];
        parts.extend(
            factors
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .map(|(_, f)| f.clone()),
        );
        if factor.divide {
            parts.push(Factor::over(pow(&factor.node, 2)));
            terms.push(Term::minus(Node::product(parts)));
        } else {
            terms.push(Term::plus(Node::product(parts)));
        }
    }
    if terms.is_empty() {
        Node::integer(0)
    } else {
        Node::sum(terms)
    }
}

#[cfg(test)]
mod tests {
    use super::super::*;
    use num_complex::Complex64;

    fn close(a: Complex64, b: Complex64) -> bool {
        (a - b).norm() < 1e-12 * (1.0 + b.norm())
    }

    #[test]
    fn polynomial_partials() {
        let x = Node::variable("x");
        let y = Node::variable("y");
        let f = pow(&x, 3) * &y - &x * 4 + &y / 2;
        let df = f.differentiate();
        let (xv, yv) = (Complex64::new(1.5, -0.5), Complex64::new(0.25, 2.0));
        x.set_value(xv);
        y.set_value(yv);
        let dfdx: Complex64 = df.eval(Some(&x));
        let dfdy: Complex64 = df.eval(Some(&y));
        assert!(close(dfdx, 3.0 * xv * xv * yv - 4.0));
        assert!(close(dfdy, xv * xv * xv + 0.5));
    }

    #[test]
    fn quotient_and_chain_rules() {
        let x = Node::variable("x");
        let f = sin(&x) / (&x + 1) + exp(&(&x * 2)) - sqrt(&x) + atan(&x);
        let df = f.differentiate();
        let xv = Complex64::new(0.7, 0.2);
        x.set_value(xv);
        let expected = (xv.cos() * (xv + 1.0) - xv.sin()) / ((xv + 1.0) * (xv + 1.0))
            + 2.0 * (2.0 * xv).exp()
            - 0.5 / xv.sqrt()
            + 1.0 / (1.0 + xv * xv);
        assert!(close(df.eval::<Complex64>(Some(&x)), expected));
    }

    #[test]
    fn general_power_rule() {
        let x = Node::variable("x");
        let y = Node::variable("y");
        let f = Node::power(x.clone(), y.clone());
        let df = f.differentiate();
        let (xv, yv) = (Complex64::new(1.2, 0.3), Complex64::new(0.5, -0.4));
        x.set_value(xv);
        y.set_value(yv);
        let value = xv.powc(yv);
        assert!(close(df.eval::<Complex64>(Some(&x)), yv * xv.powc(yv - 1.0)));
        assert!(close(df.eval::<Complex64>(Some(&y)), value * xv.ln()));
    }

    #[test]
    fn constants_differentiate_to_zero() {
        let f = pi() * 3 + 2;
        assert!(f.differentiate().is_zero_constant());
    }
}

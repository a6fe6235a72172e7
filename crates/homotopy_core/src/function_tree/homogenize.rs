use super::degree::{degree, Selection};
use super::{Factor, Node, NodeKind, UnaryOp};
use crate::error::{Error, Result};

impl Node {
    /// Rewrites the subtree in place so that it is homogeneous in
    /// `group ∪ {hom}`, multiplying low-degree terms of every sum by powers
    /// of `hom`.
    ///
    /// Fails if the subtree is not polynomial in `group`, or if a linear
    /// product depends on only part of `group`.
    pub fn homogenize(&self, group: &[Node], hom: &Node) -> Result<()> {
        hom.expect_variable()?;
        for v in group {
            v.expect_variable()?;
        }
        if group.iter().any(|v| v.ptr_eq(hom)) {
            return Err(Error::InvalidHomogenization(format!(
                "homogenizing variable `{}` belongs to the group",
                hom
            )));
        }
        let mut with_hom = group.to_vec();
        with_hom.push(hom.clone());
        homogenize_node(self, group, hom, &with_hom)
    }
}

fn non_polynomial(node: &Node) -> Error {
    Error::NonPolynomial(node.to_string())
}

fn homogenize_node(node: &Node, group: &[Node], hom: &Node, with_hom: &[Node]) -> Result<()> {
    let in_group = Selection::Group(group);
    let children: Vec<Node> = match &*node.kind() {
        NodeKind::Variable(_) | NodeKind::Number(_) | NodeKind::Differential(_) => Vec::new(),
        NodeKind::Unary(UnaryOp::Negate, operand) => vec![operand.clone()],
        NodeKind::Unary(_, operand) => {
            if degree(operand, in_group) != 0 {
                return Err(non_polynomial(node));
            }
            Vec::new()
        }
        NodeKind::Sum(terms) => terms.iter().map(|t| t.node.clone()).collect(),
        NodeKind::Product(factors) => {
            let mut multiplied = Vec::new();
            for factor in factors {
                if !factor.divide {
                    multiplied.push(factor.node.clone());
                } else if degree(&factor.node, in_group) != 0 {
                    return Err(non_polynomial(node));
                }
            }
            multiplied
        }
        NodeKind::IntegerPower(base, exponent) => {
            if *exponent > 0 {
                vec![base.clone()]
            } else if degree(base, in_group) != 0 {
                return Err(non_polynomial(node));
            } else {
                Vec::new()
            }
        }
        NodeKind::Power(base, exponent) => {
            let integer_exponent = match &*exponent.kind() {
                NodeKind::Number(n) => n.as_integer().filter(|k| *k >= 0),
                _ => None,
            };
            if integer_exponent.is_some() {
                vec![base.clone()]
            } else if degree(node, in_group) != 0 {
                return Err(non_polynomial(node));
            } else {
                Vec::new()
            }
        }
        NodeKind::LinearProduct(_) => Vec::new(),
    };

    for child in &children {
        homogenize_node(child, group, hom, with_hom)?;
    }

    let precision = node.precision();
    let mut changed = false;
    match &mut *node.kind_mut() {
        NodeKind::Sum(terms) => {
            let degrees: Vec<i32> = terms
                .iter()
                .map(|t| degree(&t.node, Selection::Group(with_hom)))
                .collect();
            if degrees.iter().any(|d| *d < 0) {
                return Err(Error::NonPolynomial(
                    "sum with a non-polynomial term".to_string(),
                ));
            }
            let max = degrees.iter().copied().max().unwrap_or(0);
            for (term, d) in terms.iter_mut().zip(degrees) {
                if d == max {
                    continue;
                }
                let padding = if max - d == 1 {
                    hom.clone()
                } else {
                    let power = Node::integer_power(hom.clone(), max - d);
                    power.0.precision.set(precision);
                    power
                };
                let padded = Node::product(vec![Factor::times(term.node.clone()), Factor::times(padding)]);
                padded.0.precision.set(precision);
                term.node = padded;
                changed = true;
            }
        }
        NodeKind::LinearProduct(lp) => {
            lp.homogenize(group, hom)?;
            changed = true;
        }
        _ => {}
    }
    if changed {
        node.invalidate();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::error::Error;

    #[test]
    fn linear_polynomial_gains_one_power() {
        let x = Node::variable("x");
        let h = Node::variable("h");
        let f = &x - 1;
        f.homogenize(std::slice::from_ref(&x), &h).expect("polynomial");
        assert_eq!(f.degree_wrt(&h), 1);
        assert!(f.is_homogeneous());
    }

    #[test]
    fn nested_sums_become_homogeneous() {
        let x = Node::variable("x");
        let y = Node::variable("y");
        let h = Node::variable("h");
        let f = (pow(&x, 2) + &y) * (&x - 4) + pow(&y, 3) + 2;
        f.homogenize(&[x.clone(), y.clone()], &h).expect("polynomial");
        assert!(f.is_homogeneous_in(&[x.clone(), y.clone(), h.clone()]));
        assert_eq!(f.degree(), 3);
        assert_eq!(f.degree_wrt(&h), 3);
    }

    #[test]
    fn other_variables_are_treated_as_constants() {
        let x = Node::variable("x");
        let y = Node::variable("y");
        let h = Node::variable("h");
        let f = &x * &y + &y + 1;
        f.homogenize(std::slice::from_ref(&x), &h).expect("polynomial in x");
        assert!(f.is_homogeneous_in(&[x.clone(), h.clone()]));
        assert!(!f.is_homogeneous());
    }

    #[test]
    fn transcendental_in_group_is_rejected() {
        let x = Node::variable("x");
        let y = Node::variable("y");
        let h = Node::variable("h");
        let f = sin(&x) + &y;
        assert!(matches!(
            f.homogenize(std::slice::from_ref(&x), &h),
            Err(Error::NonPolynomial(_))
        ));
        let g = sin(&y) + &x;
        g.homogenize(std::slice::from_ref(&x), &h).expect("sin(y) is constant in x");
        assert!(g.is_homogeneous_in(&[x.clone(), h.clone()]));
    }

    #[test]
    fn homogenizing_variable_must_be_outside_group() {
        let x = Node::variable("x");
        let f = &x + 1;
        assert!(matches!(
            f.homogenize(std::slice::from_ref(&x), &x),
            Err(Error::InvalidHomogenization(_))
        ));
    }

    #[test]
    fn homogenizing_twice_changes_nothing() {
        let x = Node::variable("x");
        let h = Node::variable("h");
        let f = pow(&x, 2) + &x + 1;
        f.homogenize(std::slice::from_ref(&x), &h).expect("polynomial");
        let once = f.to_string();
        f.homogenize(std::slice::from_ref(&x), &h).expect("polynomial");
        assert_eq!(f.to_string(), once);
    }
}

//! Degree and homogeneity queries. A degree of `-1` marks an expression that
//! is not polynomial in the selected variables.

use super::{Node, NodeKind, UnaryOp};

/// The variables a degree query counts.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Selection<'a> {
    All,
    Group(&'a [Node]),
}

impl Selection<'_> {
    pub(crate) fn contains(&self, variable: &Node) -> bool {
        match self {
            Selection::All => true,
            Selection::Group(group) => group.iter().any(|v| v.ptr_eq(variable)),
        }
    }
}

pub(crate) fn degree(node: &Node, selection: Selection<'_>) -> i32 {
    match &*node.kind() {
        NodeKind::Variable(_) => i32::from(selection.contains(node)),
        NodeKind::Number(_) | NodeKind::Differential(_) => 0,
        NodeKind::Unary(UnaryOp::Negate, operand) => degree(operand, selection),
        NodeKind::Unary(_, operand) => {
            if degree(operand, selection) == 0 {
                0
            } else {
                -1
            }
        }
        NodeKind::Sum(terms) => {
            let mut max = 0;
            for term in terms {
                let d = degree(&term.node, selection);
                if d < 0 {
                    return -1;
                }
                max = max.max(d);
            }
            max
        }
        NodeKind::Product(factors) => {
            let mut total: i32 = 0;
            for factor in factors {
                let d = degree(&factor.node, selection);
                if d < 0 || (factor.divide && d != 0) {
                    return -1;
                }
                if !factor.divide {
                    total = match total.checked_add(d) {
                        Some(t) => t,
                        None => return -1,
                    };
                }
            }
            total
        }
        NodeKind::IntegerPower(base, exponent) => {
            let d = degree(base, selection);
            match (d, *exponent) {
                (d, _) if d < 0 => -1,
                (d, n) if n >= 0 => d.checked_mul(n).unwrap_or(-1),
                (0, _) => 0,
                _ => -1,
            }
        }
        NodeKind::Power(base, exponent) => {
            let base_degree = degree(base, selection);
            let exponent_degree = degree(exponent, selection);
            if base_degree == 0 && exponent_degree == 0 {
                return 0;
            }
            let integer = match &*exponent.kind() {
                NodeKind::Number(n) => n.as_integer(),
                _ => None,
            };
            match integer {
                Some(k) if base_degree >= 0 && (0..=i32::MAX as i64).contains(&k) => {
                    base_degree.checked_mul(k as i32).unwrap_or(-1)
                }
                _ => -1,
            }
        }
        NodeKind::LinearProduct(lp) => lp.degree(selection),
    }
}

pub(crate) fn is_homogeneous(node: &Node, selection: Selection<'_>) -> bool {
    match &*node.kind() {
        NodeKind::Variable(_) | NodeKind::Number(_) | NodeKind::Differential(_) => true,
        NodeKind::Unary(UnaryOp::Negate, operand) => is_homogeneous(operand, selection),
        NodeKind::Unary(_, operand) => degree(operand, selection) == 0,
        NodeKind::Sum(terms) => {
            let mut common = None;
            for term in terms {
                if !is_homogeneous(&term.node, selection) {
                    return false;
                }
                let d = degree(&term.node, selection);
                if d < 0 {
                    return false;
                }
                match common {
                    None => common = Some(d),
                    Some(c) if c != d => return false,
                    Some(_) => {}
                }
            }
            true
        }
        NodeKind::Product(factors) => factors.iter().all(|f| {
            is_homogeneous(&f.node, selection) && (!f.divide || degree(&f.node, selection) == 0)
        }),
        NodeKind::IntegerPower(base, exponent) => {
            if *exponent >= 0 {
                is_homogeneous(base, selection)
            } else {
                degree(base, selection) == 0
            }
        }
        NodeKind::Power(base, _) => degree(node, selection) >= 0 && is_homogeneous(base, selection),
        NodeKind::LinearProduct(lp) => lp.is_homogeneous(selection),
    }
}

impl Node {
    /// Total degree in all variables, or `-1` if not polynomial.
    pub fn degree(&self) -> i32 {
        degree(self, Selection::All)
    }

    pub fn degree_wrt(&self, variable: &Node) -> i32 {
        degree(self, Selection::Group(std::slice::from_ref(variable)))
    }

    /// Total degree in the variables of `group`.
    pub fn degree_in(&self, group: &[Node]) -> i32 {
        degree(self, Selection::Group(group))
    }

    /// Degree in each variable of `variables` separately.
    pub fn multidegree(&self, variables: &[Node]) -> Vec<i32> {
        variables.iter().map(|v| self.degree_wrt(v)).collect()
    }

    pub fn is_polynomial(&self) -> bool {
        self.degree() >= 0
    }

    pub fn is_polynomial_in(&self, group: &[Node]) -> bool {
        self.degree_in(group) >= 0
    }

    /// Homogeneity in all variables together.
    pub fn is_homogeneous(&self) -> bool {
        is_homogeneous(self, Selection::All)
    }

    pub fn is_homogeneous_wrt(&self, variable: &Node) -> bool {
        is_homogeneous(self, Selection::Group(std::slice::from_ref(variable)))
    }

    pub fn is_homogeneous_in(&self, group: &[Node]) -> bool {
        is_homogeneous(self, Selection::Group(group))
    }
}

#[cfg(test)]
mod tests {
    use super::super::*;

    #[test]
    fn degrees_of_monomials_and_sums() {
        let x = Node::variable("x");
        let y = Node::variable("y");
        let f = pow(&x, 2) * &y + &x * 3 - 7;
        assert_eq!(f.degree(), 3);
        assert_eq!(f.degree_wrt(&x), 2);
        assert_eq!(f.degree_wrt(&y), 1);
        assert_eq!(f.multidegree(&[x.clone(), y.clone()]), vec![2, 1]);
        assert!(!f.is_homogeneous());
    }

    #[test]
    fn transcendental_of_variable_is_not_polynomial() {
        let x = Node::variable("x");
        let y = Node::variable("y");
        let f = sin(&x) * &y;
        assert_eq!(f.degree(), -1);
        assert!(!f.is_polynomial());
        assert_eq!(f.degree_wrt(&y), 1);
        assert!(f.is_polynomial_in(std::slice::from_ref(&y)));
        assert_eq!((sin(&pi()) + &x).degree(), 1);
    }

    #[test]
    fn division_by_variable_is_not_polynomial() {
        let x = Node::variable("x");
        assert_eq!((Node::integer(1) / &x).degree(), -1);
        assert_eq!((&x / 2).degree(), 1);
        assert_eq!(pow(&x, -2).degree(), -1);
        assert_eq!(pow(&pi(), -2).degree(), 0);
    }

    #[test]
    fn power_with_integer_constant_exponent() {
        let x = Node::variable("x");
        assert_eq!(Node::power(x.clone(), Node::integer(3)).degree(), 3);
        assert_eq!(Node::power(x.clone(), Node::float("0.5", "").expect("literal")).degree(), -1);
        assert_eq!(Node::power(x.clone(), x.clone()).degree(), -1);
    }

    #[test]
    fn degrees_too_large_for_i32_are_not_polynomial() {
        let x = Node::variable("x");
        assert_eq!(pow(&pow(&x, 100_000), 100_000).degree(), -1);
        assert_eq!(Node::power(pow(&x, 2), Node::integer(i32::MAX as i64)).degree(), -1);
        assert_eq!((pow(&x, i32::MAX) * &x).degree(), -1);
        assert_eq!(pow(&x, i32::MAX).degree(), i32::MAX);
    }

    #[test]
    fn homogeneous_sums_need_equal_degrees() {
        let x = Node::variable("x");
        let y = Node::variable("y");
        assert!((&x * &y + pow(&x, 2)).is_homogeneous());
        assert!(!(&x * &y + &x).is_homogeneous());
        assert!((&x * &y + &x).is_homogeneous_wrt(&x));
    }
}

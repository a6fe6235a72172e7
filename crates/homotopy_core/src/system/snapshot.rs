//! Serializable form of a [`System`].
//!
//! Nodes are flattened into an arena in which every record refers to its
//! children by index, so shared subexpressions and variables stay shared
//! after a round trip. A snapshot owns no reference-counted data and can be
//! sent to another thread to rebuild an independent system there.

use std::collections::HashMap;

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use super::{Group, GroupKind, Patch, System};
use crate::error::{Error, Result};
use crate::function_tree::{Factor, LinearProduct, Node, NodeKind, Number, Term, UnaryOp};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeRecord {
    Variable(String),
    Number(Number),
    Differential(usize),
    Unary(UnaryOp, usize),
    /// `(child, positive)` pairs.
    Sum(Vec<(usize, bool)>),
    /// `(child, divide)` pairs.
    Product(Vec<(usize, bool)>),
    IntegerPower(usize, i32),
    Power(usize, usize),
    LinearProduct {
        variables: Vec<usize>,
        hom_variable: Option<usize>,
        rows: usize,
        coefficients: Vec<Number>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupRecord {
    pub kind: GroupKind,
    pub variables: Vec<usize>,
    pub hom_variable: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemSnapshot {
    /// Children always precede their parents.
    pub nodes: Vec<NodeRecord>,
    pub functions: Vec<usize>,
    pub groups: Vec<GroupRecord>,
    pub ungrouped: Vec<usize>,
    pub path_variable: Option<usize>,
    pub patch: Option<Patch>,
    pub precision: u32,
}

#[derive(Default)]
struct Flattener {
    nodes: Vec<NodeRecord>,
    index: HashMap<usize, usize>,
}

impl Flattener {
    fn visit(&mut self, node: &Node) -> usize {
        if let Some(&i) = self.index.get(&node.id()) {
            return i;
        }
        let record = match &*node.kind() {
            NodeKind::Variable(v) => NodeRecord::Variable(v.name().to_string()),
            NodeKind::Number(n) => NodeRecord::Number(n.clone()),
            NodeKind::Differential(v) => NodeRecord::Differential(self.visit(v)),
            NodeKind::Unary(op, x) => NodeRecord::Unary(*op, self.visit(x)),
            NodeKind::Sum(terms) => {
                NodeRecord::Sum(terms.iter().map(|t| (self.visit(&t.node), t.positive)).collect())
            }
            NodeKind::Product(factors) => {
                NodeRecord::Product(factors.iter().map(|f| (self.visit(&f.node), f.divide)).collect())
            }
            NodeKind::IntegerPower(base, n) => NodeRecord::IntegerPower(self.visit(base), *n),
            NodeKind::Power(base, exponent) => {
                let b = self.visit(base);
                NodeRecord::Power(b, self.visit(exponent))
            }
            NodeKind::LinearProduct(lp) => NodeRecord::LinearProduct {
                variables: lp.variables().iter().map(|v| self.visit(v)).collect(),
                hom_variable: lp.hom_variable().map(|h| self.visit(h)),
                rows: lp.num_factors(),
                coefficients: lp.coefficients().transpose().iter().cloned().collect(),
            },
        };
        self.nodes.push(record);
        let i = self.nodes.len() - 1;
        self.index.insert(node.id(), i);
        i
    }
}

impl System {
    pub fn snapshot(&self) -> SystemSnapshot {
        let mut flat = Flattener::default();
        let functions = self.functions.iter().map(|f| flat.visit(f)).collect();
        let groups = self
            .groups
            .iter()
            .map(|g| GroupRecord {
                kind: g.kind,
                variables: g.variables.iter().map(|v| flat.visit(v)).collect(),
                hom_variable: g.hom_variable.as_ref().map(|h| flat.visit(h)),
            })
            .collect();
        let ungrouped = self.ungrouped.iter().map(|v| flat.visit(v)).collect();
        let path_variable = self.path_variable.as_ref().map(|t| flat.visit(t));
        SystemSnapshot {
            nodes: flat.nodes,
            functions,
            groups,
            ungrouped,
            path_variable,
            patch: self.patch.clone(),
            precision: self.precision,
        }
    }
}

impl SystemSnapshot {
    /// Rebuilds the system with fresh nodes.
    pub fn restore(&self) -> Result<System> {
        let mut nodes: Vec<Node> = Vec::with_capacity(self.nodes.len());
        for (i, record) in self.nodes.iter().enumerate() {
            let get = |j: usize| -> Result<Node> {
                if j < i {
                    Ok(nodes[j].clone())
                } else {
                    Err(Error::IndexOutOfRange { index: j, count: i })
                }
            };
            let node = match record {
                NodeRecord::Variable(name) => Node::variable(name.clone()),
                NodeRecord::Number(n) => Node::number(n.clone()),
                NodeRecord::Differential(v) => Node::differential(&get(*v)?)?,
                NodeRecord::Unary(op, x) => Node::unary(*op, get(*x)?),
                NodeRecord::Sum(terms) => Node::sum(
                    terms
                        .iter()
                        .map(|&(j, positive)| Ok(Term { node: get(j)?, positive }))
                        .collect::<Result<Vec<_>>>()?,
                ),
                NodeRecord::Product(factors) => Node::product(
                    factors
                        .iter()
                        .map(|&(j, divide)| Ok(Factor { node: get(j)?, divide }))
                        .collect::<Result<Vec<_>>>()?,
                ),
                NodeRecord::IntegerPower(base, n) => Node::integer_power(get(*base)?, *n),
                NodeRecord::Power(base, exponent) => Node::power(get(*base)?, get(*exponent)?),
                NodeRecord::LinearProduct {
                    variables,
                    hom_variable,
                    rows,
                    coefficients,
                } => {
                    let variables = variables.iter().map(|&j| get(j)).collect::<Result<Vec<_>>>()?;
                    let cols = variables.len() + 1;
                    if *rows * cols != coefficients.len() {
                        return Err(Error::CoefficientDimensionMismatch {
                            expected: *rows * cols,
                            found: coefficients.len(),
                        });
                    }
                    let matrix = DMatrix::from_row_slice(*rows, cols, coefficients);
                    let hom = hom_variable.map(get).transpose()?;
                    Node::linear_product(LinearProduct::from_parts(variables, hom, matrix)?)
                }
            };
            nodes.push(node);
        }

        let get = |j: usize| -> Result<Node> {
            nodes.get(j).cloned().ok_or(Error::IndexOutOfRange {
                index: j,
                count: nodes.len(),
            })
        };
        let mut system = System::new();
        for group in &self.groups {
            let variables = group.variables.iter().map(|&j| get(j)).collect::<Result<Vec<_>>>()?;
            for v in &variables {
                v.expect_variable()?;
            }
            system.groups.push(Group {
                kind: group.kind,
                variables,
                hom_variable: group.hom_variable.map(get).transpose()?,
            });
        }
        for &j in &self.ungrouped {
            system.add_ungrouped_variable(&get(j)?)?;
        }
        if let Some(j) = self.path_variable {
            system.add_path_variable(&get(j)?)?;
        }
        for &j in &self.functions {
            system.functions.push(get(j)?);
        }
        system.patch = self.patch.clone();
        system.set_precision(self.precision);
        Ok(system)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse_expression, SymbolTable};
    use num_complex::Complex64;
    use nalgebra::DVector;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn sample() -> System {
        let mut symbols = SymbolTable::new();
        let x = symbols.variable("x");
        let y = symbols.variable("y");
        let mut sys = System::new();
        sys.add_variable_group(&[x.clone(), y.clone()]).expect("variables");
        sys.add_function(parse_expression("x^2*y + 3*y - 0.25", &symbols).expect("Failed to parse"));
        sys.add_function(parse_expression("x*y - pi", &symbols).expect("Failed to parse"));
        let mut rng = StdRng::seed_from_u64(4);
        let lp = LinearProduct::random(&[x, y], 2, &mut rng).expect("variables");
        sys.add_function(Node::linear_product(lp) - 1);
        sys
    }

    #[test]
    fn snapshot_round_trip_through_json() {
        let mut sys = sample();
        sys.homogenize().expect("polynomial");
        sys.auto_patch(&mut StdRng::seed_from_u64(6)).expect("projective");
        let snapshot = sys.snapshot();
        let text = serde_json::to_string(&snapshot).expect("serialize");
        let back: SystemSnapshot = serde_json::from_str(&text).expect("deserialize");
        assert_eq!(back, snapshot);

        let copy = back.restore().expect("restore");
        assert_eq!(copy.num_variables(), sys.num_variables());
        assert_eq!(copy.num_total_functions(), sys.num_total_functions());
        assert!(copy.is_patched());
        assert!(copy.is_homogeneous());

        let point = DVector::from_vec(vec![
            Complex64::new(0.9, 0.1),
            Complex64::new(0.4, -0.3),
            Complex64::new(-1.2, 0.8),
        ]);
        let a = sys.eval(&point, None).expect("eval");
        let b = copy.eval(&point, None).expect("eval");
        assert!((a - b).norm() < 1e-14);
    }

    #[test]
    fn shared_variables_stay_shared() {
        let sys = sample();
        let copy = sys.clone_deep().expect("restore");
        let ordering = copy.variable_ordering();
        assert!(!ordering[0].ptr_eq(&sys.variable_ordering()[0]));
        let uses_x = |f: &Node| f.children().iter().any(|c| c.ptr_eq(&ordering[0]));
        let mut found = false;
        copy.functions()[1].for_each_distinct(|n| found |= uses_x(n));
        assert!(found);
    }
}

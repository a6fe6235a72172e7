//! Products of linear forms, used to build linear-product start systems
//! without expanding the product into monomials.

use nalgebra::DMatrix;
use rand::Rng;

use super::degree::Selection;
use super::{Factor, Node, Number, Term};
use crate::error::{Error, Result};
use crate::numeric::{random_rational, Scalar};

/// `∏ᵢ (cᵢ₀ x₀ + … + cᵢₙ₋₁ xₙ₋₁ + cᵢₙ h)`, where `h` is the homogenizing
/// variable once the product has been homogenized and `1` before.
///
/// Coefficients are stored one row per factor with the constant column last.
#[derive(Debug, Clone)]
pub struct LinearProduct {
    variables: Vec<Node>,
    hom_variable: Option<Node>,
    coefficients: DMatrix<Number>,
}

impl LinearProduct {
    /// A product of `num_factors` linear forms with random exact coefficients.
    pub fn random<R: Rng + ?Sized>(variables: &[Node], num_factors: usize, rng: &mut R) -> Result<Self> {
        let cols = variables.len() + 1;
        let coefficients = DMatrix::from_fn(num_factors, cols, |_, _| Number::Rational {
            re: random_rational(rng),
            im: random_rational(rng),
        });
        Self::with_coefficients(variables, coefficients)
    }

    pub fn with_coefficients(variables: &[Node], coefficients: DMatrix<Number>) -> Result<Self> {
        for v in variables {
            v.expect_variable()?;
        }
        if coefficients.ncols() != variables.len() + 1 {
            return Err(Error::CoefficientDimensionMismatch {
                expected: variables.len() + 1,
                found: coefficients.ncols(),
            });
        }
        Ok(Self {
            variables: variables.to_vec(),
            hom_variable: None,
            coefficients,
        })
    }

    pub(crate) fn from_parts(
        variables: Vec<Node>,
        hom_variable: Option<Node>,
        coefficients: DMatrix<Number>,
    ) -> Result<Self> {
        let mut product = Self::with_coefficients(&variables, coefficients)?;
        if let Some(h) = &hom_variable {
            h.expect_variable()?;
        }
        product.hom_variable = hom_variable;
        Ok(product)
    }

    pub fn num_factors(&self) -> usize {
        self.coefficients.nrows()
    }

    pub fn variables(&self) -> &[Node] {
        &self.variables
    }

    pub fn hom_variable(&self) -> Option<&Node> {
        self.hom_variable.as_ref()
    }

    pub fn coefficients(&self) -> &DMatrix<Number> {
        &self.coefficients
    }

    pub(crate) fn referenced_variables(&self) -> Vec<Node> {
        let mut vars = self.variables.clone();
        vars.extend(self.hom_variable.iter().cloned());
        vars
    }

    pub(crate) fn eval<T: Scalar>(&self, digits: u32) -> T {
        let values: Vec<T> = self.variables.iter().map(|v| v.eval::<T>(None)).collect();
        let constant_multiplier = match &self.hom_variable {
            Some(h) => h.eval::<T>(None),
            None => T::one(digits),
        };
        let n = self.variables.len();
        let mut product = T::one(digits);
        for row in self.coefficients.row_iter() {
            let mut factor = row[n].eval::<T>(digits) * constant_multiplier.clone();
            for (c, x) in row.iter().take(n).zip(&values) {
                factor += c.eval::<T>(digits) * x.clone();
            }
            product *= factor;
        }
        product
    }

    /// Group membership of the product's own variables: none, some or all.
    fn overlap(&self, group: &[Node]) -> Overlap {
        let group: Vec<&Node> = group
            .iter()
            .filter(|g| !self.hom_variable.as_ref().is_some_and(|h| h.ptr_eq(g)))
            .collect();
        let shared = self
            .variables
            .iter()
            .filter(|v| group.iter().any(|g| g.ptr_eq(v)))
            .count();
        if shared == 0 {
            Overlap::Disjoint
        } else if shared == self.variables.len() && group.len() == shared {
            Overlap::Same
        } else {
            Overlap::Partial
        }
    }

    pub(crate) fn degree(&self, selection: Selection<'_>) -> i32 {
        let touches = self.referenced_variables().iter().any(|v| selection.contains(v));
        if touches {
            self.num_factors() as i32
        } else {
            0
        }
    }

    pub(crate) fn is_homogeneous(&self, selection: Selection<'_>) -> bool {
        match selection {
            Selection::All => self.hom_variable.is_some(),
            Selection::Group(group) => match self.overlap(group) {
                Overlap::Partial => false,
                Overlap::Disjoint => true,
                Overlap::Same => self.hom_variable.is_some(),
            },
        }
    }

    pub(crate) fn homogenize(&mut self, group: &[Node], hom: &Node) -> Result<()> {
        match self.overlap(group) {
            Overlap::Disjoint => Ok(()),
            Overlap::Partial => Err(Error::PartialGroupOverlap),
            Overlap::Same => {
                self.hom_variable = Some(hom.clone());
                Ok(())
            }
        }
    }

    /// The same product as an ordinary expression tree.
    pub fn expanded(&self) -> Node {
        let n = self.variables.len();
        let factors = self
            .coefficients
            .row_iter()
            .map(|row| {
                let mut terms: Vec<Term> = self
                    .variables
                    .iter()
                    .zip(row.iter())
                    .map(|(x, c)| Term::plus(Node::number(c.clone()) * x))
                    .collect();
                let constant = Node::number(row[n].clone());
                terms.push(Term::plus(match &self.hom_variable {
                    Some(h) => constant * h,
                    None => constant,
                }));
                Factor::times(Node::sum(terms))
            })
            .collect();
        Node::product(factors)
    }
}

enum Overlap {
    Disjoint,
    Partial,
    Same,
}

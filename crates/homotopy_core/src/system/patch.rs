use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::function_tree::Number;
use crate::numeric::{random_rational, Scalar};

/// Affine-linear normalizations, one per projective variable group:
/// `Σ cⱼ xⱼ - 1 = 0` over the group's variables, homogenizing variable first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patch {
    equations: Vec<Vec<Number>>,
}

impl Patch {
    /// Random exact coefficients for groups of the given sizes.
    pub fn random<R: Rng + ?Sized>(group_sizes: &[usize], rng: &mut R) -> Self {
        let equations = group_sizes
            .iter()
            .map(|&size| {
                (0..size)
                    .map(|_| Number::Rational {
                        re: random_rational(rng),
                        im: random_rational(rng),
                    })
                    .collect()
            })
            .collect();
        Self { equations }
    }

    pub fn from_coefficients(equations: Vec<Vec<Number>>) -> Self {
        Self { equations }
    }

    pub fn num_equations(&self) -> usize {
        self.equations.len()
    }

    pub fn group_sizes(&self) -> Vec<usize> {
        self.equations.iter().map(Vec::len).collect()
    }

    fn equation(&self, equation: usize) -> Result<&[Number]> {
        self.equations
            .get(equation)
            .map(Vec::as_slice)
            .ok_or(Error::IndexOutOfRange {
                index: equation,
                count: self.equations.len(),
            })
    }

    /// Checks that the patch has one equation per group, sized to match.
    pub fn check_group_sizes(&self, group_sizes: &[usize]) -> Result<()> {
        if self.equations.len() != group_sizes.len() {
            return Err(Error::SizeMismatch {
                expected: group_sizes.len(),
                found: self.equations.len(),
            });
        }
        for (equation, &size) in self.equations.iter().zip(group_sizes) {
            if equation.len() != size {
                return Err(Error::SizeMismatch {
                    expected: size,
                    found: equation.len(),
                });
            }
        }
        Ok(())
    }

    pub fn coefficient<T: Scalar>(&self, equation: usize, variable: usize, digits: u32) -> Result<T> {
        let coefficients = self.equation(equation)?;
        let c = coefficients.get(variable).ok_or(Error::IndexOutOfRange {
            index: variable,
            count: coefficients.len(),
        })?;
        Ok(c.eval::<T>(digits))
    }

    /// Value of one patch equation at the group's entries `values`.
    pub fn eval<T: Scalar>(&self, equation: usize, values: &[T], digits: u32) -> Result<T> {
        let coefficients = self.equation(equation)?;
        if coefficients.len() != values.len() {
            return Err(Error::SizeMismatch {
                expected: coefficients.len(),
                found: values.len(),
            });
        }
        let mut total = -T::one(digits);
        for (c, x) in coefficients.iter().zip(values) {
            total += c.eval::<T>(digits) * x.clone();
        }
        Ok(total)
    }

    /// Scales the group's entries so they satisfy the equation.
    pub fn rescale<T: Scalar>(&self, equation: usize, values: &mut [T], digits: u32) -> Result<()> {
        let coefficients = self.equation(equation)?;
        if coefficients.len() != values.len() {
            return Err(Error::SizeMismatch {
                expected: coefficients.len(),
                found: values.len(),
            });
        }
        let mut scale = T::zero(digits);
        for (c, x) in coefficients.iter().zip(values.iter()) {
            scale += c.eval::<T>(digits) * x.clone();
        }
        for x in values.iter_mut() {
            *x /= scale.clone();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_complex::Complex64;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn rescaled_values_satisfy_patch() {
        let mut rng = StdRng::seed_from_u64(3);
        let patch = Patch::random(&[3, 2], &mut rng);
        assert_eq!(patch.group_sizes(), vec![3, 2]);

        let mut values = vec![
            Complex64::new(1.0, 2.0),
            Complex64::new(-0.5, 0.1),
            Complex64::new(3.0, 0.0),
        ];
        patch.rescale(0, &mut values, 16).expect("rescale");
        assert!(patch.eval(0, &values, 16).expect("eval").norm() < 1e-14);
        assert!(patch.eval::<Complex64>(1, &values[..2], 16).expect("eval").norm() > 1e-6);
    }

    #[test]
    fn out_of_range_equations_and_sizes_are_errors() {
        let mut rng = StdRng::seed_from_u64(3);
        let patch = Patch::random(&[2], &mut rng);
        let values = vec![Complex64::new(1.0, 0.0); 2];
        assert_eq!(
            patch.eval(1, &values, 16),
            Err(Error::IndexOutOfRange { index: 1, count: 1 })
        );
        assert!(patch.eval(0, &values[..1], 16).is_err());
        assert!(patch.coefficient::<Complex64>(0, 2, 16).is_err());
        assert!(patch.check_group_sizes(&[2]).is_ok());
        assert!(patch.check_group_sizes(&[2, 3]).is_err());
        assert!(patch.check_group_sizes(&[3]).is_err());
    }
}

//! Dense linear algebra over either numeric type: LU decomposition with
//! partial pivoting, the pivot health check, and norms computed in `log10`
//! so that multiple precision magnitudes outside `f64` range survive.

use nalgebra::{DMatrix, DVector};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::numeric::{random_units, Scalar};

/// Outcome of inspecting the pivots of an LU decomposition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatrixSuccessCode {
    Success,
    /// A pivot is indistinguishable from zero at the working precision.
    SmallValue,
    /// Two successive pivots differ by more than the working precision can carry.
    LargeChange,
}

/// `PA = LU` with unit lower triangular `L`, stored in one matrix.
#[derive(Debug, Clone)]
pub struct Lu<T: Scalar> {
    lu: DMatrix<T>,
    permutation: Vec<usize>,
}

impl<T: Scalar> Lu<T> {
    pub fn decompose(matrix: DMatrix<T>) -> Result<Self> {
        let n = matrix.nrows();
        if matrix.ncols() != n {
            return Err(Error::NotSquare {
                functions: n,
                variables: matrix.ncols(),
            });
        }
        let mut lu = matrix;
        let mut permutation: Vec<usize> = (0..n).collect();

        for k in 0..n {
            let mut pivot_row = k;
            let mut pivot_size = lu[(k, k)].log10_abs();
            for r in k + 1..n {
                let size = lu[(r, k)].log10_abs();
                if size > pivot_size {
                    pivot_row = r;
                    pivot_size = size;
                }
            }
            if pivot_row != k {
                lu.swap_rows(k, pivot_row);
                permutation.swap(k, pivot_row);
            }
            let pivot = lu[(k, k)].clone();
            if pivot.is_exact_zero() {
                continue;
            }
            for r in k + 1..n {
                let factor = lu[(r, k)].clone() / pivot.clone();
                for c in k + 1..n {
                    let update = factor.clone() * lu[(k, c)].clone();
                    lu[(r, c)] -= update;
                }
                lu[(r, k)] = factor;
            }
        }
        Ok(Self { lu, permutation })
    }

    pub fn dimension(&self) -> usize {
        self.lu.nrows()
    }

    /// Inspects the pivots from last to first: a pivot below `100·ε` is a
    /// small value; successive pivots whose ratio exceeds the inverse of the
    /// dummy precision are a large change.
    pub fn check(&self) -> MatrixSuccessCode {
        let n = self.dimension();
        if n == 0 {
            return MatrixSuccessCode::Success;
        }
        let small = |p: &T| p.log10_abs() <= 2.0 + T::epsilon_log10(p.precision());
        for i in (1..n).rev() {
            let current = &self.lu[(i, i)];
            if small(current) {
                return MatrixSuccessCode::SmallValue;
            }
            let previous = &self.lu[(i - 1, i - 1)];
            let ratio_log10 = previous.log10_abs() - current.log10_abs();
            if ratio_log10 >= -T::dummy_precision_log10(current.precision()) {
                return MatrixSuccessCode::LargeChange;
            }
        }
        if small(&self.lu[(0, 0)]) {
            return MatrixSuccessCode::SmallValue;
        }
        MatrixSuccessCode::Success
    }

    /// Solves `A x = b`.
    pub fn solve(&self, rhs: &DVector<T>) -> Result<DVector<T>> {
        let n = self.dimension();
        if rhs.len() != n {
            return Err(Error::SizeMismatch {
                expected: n,
                found: rhs.len(),
            });
        }
        let mut x: Vec<T> = self.permutation.iter().map(|&p| rhs[p].clone()).collect();
        for i in 0..n {
            for j in 0..i {
                let update = self.lu[(i, j)].clone() * x[j].clone();
                x[i] -= update;
            }
        }
        for i in (0..n).rev() {
            for j in i + 1..n {
                let update = self.lu[(i, j)].clone() * x[j].clone();
                x[i] -= update;
            }
            let pivot = self.lu[(i, i)].clone();
            x[i] /= pivot;
        }
        Ok(DVector::from_vec(x))
    }

    /// Estimate of `log10 ‖A⁻¹‖` from one solve against a random vector of unit entries.
    pub fn inverse_norm_estimate_log10<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<f64> {
        let digits = self.lu.iter().next().map_or(16, Scalar::precision);
        let direction: DVector<T> = random_units(rng, self.dimension(), digits);
        Ok(norm_log10(&self.solve(&direction)?))
    }
}

fn log10_root_sum_squares(logs: impl Iterator<Item = f64>) -> f64 {
    let logs: Vec<f64> = logs.filter(|l| l.is_finite()).collect();
    let max = logs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    let sum: f64 = logs.iter().map(|l| 10f64.powf(2.0 * (l - max))).sum();
    max + 0.5 * sum.log10()
}

/// `log10` of the Euclidean norm.
pub fn norm_log10<T: Scalar>(v: &DVector<T>) -> f64 {
    log10_root_sum_squares(v.iter().map(Scalar::log10_abs))
}

/// `log10` of the Frobenius norm.
pub fn matrix_norm_log10<T: Scalar>(m: &DMatrix<T>) -> f64 {
    log10_root_sum_squares(m.iter().map(Scalar::log10_abs))
}

/// Euclidean norm rounded to `f64`.
pub fn norm<T: Scalar>(v: &DVector<T>) -> f64 {
    10f64.powf(norm_log10(v))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numeric::MpComplex;
    use num_complex::Complex64;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn c(re: f64, im: f64) -> Complex64 {
        Complex64::new(re, im)
    }

    #[test]
    fn solves_small_system_with_pivoting() {
        let a = DMatrix::from_row_slice(3, 3, &[
            c(0.0, 0.0), c(2.0, 1.0), c(1.0, 0.0),
            c(1.0, -1.0), c(0.5, 0.0), c(3.0, 0.0),
            c(4.0, 0.0), c(-1.0, 2.0), c(0.0, 1.0),
        ]);
        let x = DVector::from_vec(vec![c(1.0, 2.0), c(-0.5, 0.0), c(0.0, 3.0)]);
        let b = &a * &x;
        let lu = Lu::decompose(a).expect("square");
        assert_eq!(lu.check(), MatrixSuccessCode::Success);
        let solved = lu.solve(&b).expect("sizes");
        assert!((solved - x).norm() < 1e-14);
    }

    #[test]
    fn singular_matrix_is_small_value() {
        let a = DMatrix::from_row_slice(2, 2, &[c(1.0, 0.0), c(2.0, 0.0), c(2.0, 0.0), c(4.0, 0.0)]);
        let lu = Lu::decompose(a).expect("square");
        assert_eq!(lu.check(), MatrixSuccessCode::SmallValue);
    }

    #[test]
    fn badly_scaled_pivots_are_large_change() {
        let a = DMatrix::from_row_slice(2, 2, &[c(1.0, 0.0), c(0.0, 0.0), c(0.0, 0.0), c(1e-13, 0.0)]);
        let lu = Lu::decompose(a).expect("square");
        assert_eq!(lu.check(), MatrixSuccessCode::LargeChange);

        // The same matrix is fine at 30 digits.
        let m = DMatrix::from_row_slice(2, 2, &[
            MpComplex::from_f64(1.0, 0.0, 30),
            MpComplex::from_f64(0.0, 0.0, 30),
            MpComplex::from_f64(0.0, 0.0, 30),
            MpComplex::from_f64(1e-13, 0.0, 30),
        ]);
        let lu = Lu::decompose(m).expect("square");
        assert_eq!(lu.check(), MatrixSuccessCode::Success);
    }

    #[test]
    fn rejects_non_square_and_mismatched_sizes() {
        let a = DMatrix::from_element(2, 3, c(1.0, 0.0));
        assert!(matches!(Lu::decompose(a), Err(Error::NotSquare { .. })));
        let lu = Lu::decompose(DMatrix::<Complex64>::identity(2, 2)).expect("square");
        assert!(lu.solve(&DVector::from_element(3, c(1.0, 0.0))).is_err());
    }

    #[test]
    fn log_norms_handle_extreme_magnitudes() {
        let v = DVector::from_vec(vec![c(3.0, 0.0), c(0.0, 4.0)]);
        assert!((norm(&v) - 5.0).abs() < 1e-14);
        let bits = crate::numeric::digits_to_bits(40);
        let tiny = MpComplex::with_val(bits, (rug::Float::with_val(bits, rug::Float::parse("1e-500").expect("parse")), 0));
        let w = DVector::from_vec(vec![tiny.clone(), tiny]);
        assert!((norm_log10(&w) - (-500.0 + 0.5 * 2f64.log10())).abs() < 1e-9);
        assert_eq!(norm_log10(&DVector::from_element(2, c(0.0, 0.0))), f64::NEG_INFINITY);
    }

    #[test]
    fn inverse_norm_estimate_is_of_right_order() {
        let a = DMatrix::from_diagonal(&DVector::from_vec(vec![c(1e-3, 0.0), c(1.0, 0.0)]));
        let lu = Lu::decompose(a).expect("square");
        let mut rng = StdRng::seed_from_u64(1);
        let estimate = lu.inverse_norm_estimate_log10(&mut rng).expect("sizes");
        assert!((estimate - 3.0).abs() < 0.01);
    }
}

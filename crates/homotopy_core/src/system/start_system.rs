//! Total-degree start systems `xᵢ^dᵢ - rᵢ = 0`, whose `∏ dᵢ` roots are
//! known in closed form.

use nalgebra::{DMatrix, DVector};
use rand::Rng;
use rug::Rational;

use super::{GroupKind, System};
use crate::error::{Error, Result};
use crate::function_tree::{pow, Node, Number};
use crate::numeric::{random_rational, Scalar};

/// Converts a linear index into mixed-radix digits, first digit varying fastest.
pub fn index_to_subscript(index: usize, dimensions: &[usize]) -> Result<Vec<usize>> {
    let count = dimensions.iter().product::<usize>();
    if index >= count {
        return Err(Error::IndexOutOfRange { index, count });
    }
    let mut remainder = index;
    Ok(dimensions
        .iter()
        .map(|&d| {
            let digit = remainder % d;
            remainder /= d;
            digit
        })
        .collect())
}

/// The total-degree start system of a square polynomial target.
///
/// It shares the target's variables, homogenizing variable and patch, so
/// its points live in the same space as the target's.
#[derive(Debug, Clone)]
pub struct TotalDegree {
    system: System,
    degrees: Vec<usize>,
    random_values: Vec<Number>,
}

impl TotalDegree {
    pub fn new<R: Rng + ?Sized>(target: &System, rng: &mut R) -> Result<Self> {
        if target.groups.len() != 1
            || target.groups[0].kind != GroupKind::Affine
            || !target.ungrouped.is_empty()
        {
            return Err(Error::IncompatibleSystems(
                "total degree start systems need exactly one affine variable group".to_string(),
            ));
        }
        let variables = target.groups[0].variables.clone();
        if variables.len() != target.num_functions() {
            return Err(Error::NotSquare {
                functions: target.num_functions(),
                variables: variables.len(),
            });
        }
        if !target.is_polynomial() {
            return Err(Error::NonPolynomial(
                "total degree start systems need a polynomial target".to_string(),
            ));
        }

        let mut degrees = Vec::with_capacity(variables.len());
        for (i, d) in target.degrees().into_iter().enumerate() {
            if d < 1 {
                return Err(Error::IncompatibleSystems(format!(
                    "function {} has degree {}",
                    i, d
                )));
            }
            degrees.push(d as usize);
        }

        let random_values: Vec<Number> = (0..variables.len())
            .map(|_| Number::Rational {
                re: random_rational(rng),
                im: random_rational(rng),
            })
            .collect();

        let mut system = target.copy_structure();
        for ((x, d), r) in variables.iter().zip(&degrees).zip(&random_values) {
            system.add_function(pow(x, *d as i32) - Node::number(r.clone()));
        }
        if system.num_hom_variables() > 0 {
            system.homogenize()?;
        }
        Ok(Self {
            system,
            degrees,
            random_values,
        })
    }

    pub fn system(&self) -> &System {
        &self.system
    }

    pub fn into_system(self) -> System {
        self.system
    }

    pub fn degrees(&self) -> &[usize] {
        &self.degrees
    }

    pub fn num_start_points(&self) -> usize {
        self.degrees.iter().product()
    }

    /// The constant `rᵢ` of function `index`.
    pub fn random_value<T: Scalar>(&self, index: usize) -> Result<T> {
        self.random_values
            .get(index)
            .map(|r| r.eval::<T>(self.system.precision()))
            .ok_or(Error::IndexOutOfRange {
                index,
                count: self.random_values.len(),
            })
    }

    pub fn random_values<T: Scalar>(&self) -> Vec<T> {
        let digits = self.system.precision();
        self.random_values.iter().map(|r| r.eval::<T>(digits)).collect()
    }

    /// Start point number `index`: `xᵢ = rᵢ^(1/dᵢ)·exp(2πi kᵢ/dᵢ)` with `k`
    /// the mixed-radix digits of `index`. When the system is homogenized the
    /// homogenizing coordinate is one before the point is scaled onto the patch.
    pub fn start_point<T: Scalar>(&self, index: usize) -> Result<DVector<T>> {
        let subscript = index_to_subscript(index, &self.degrees)?;
        let digits = self.system.precision();
        let homogenized = self.system.num_hom_variables() > 0;
        let offset = usize::from(homogenized);

        let mut point = DVector::from_element(self.system.num_variables(), T::zero(digits));
        if homogenized {
            point[0] = T::one(digits);
        }
        let zero = Rational::new();
        for (i, (&d, &k)) in self.degrees.iter().zip(&subscript).enumerate() {
            let r = self.random_values[i].eval::<T>(digits);
            let root = r.pow(&T::from_rational(&Rational::from((1, d as i64)), &zero, digits));
            let angle = T::from_rational(&zero, &Rational::from((2 * k as i64, d as i64)), digits) * T::pi(digits);
            point[offset + i] = root * angle.exp();
        }

        if self.system.is_patched() {
            point = self.system.rescale_point_to_fit_patch(&point)?;
        }
        Ok(point)
    }

    pub fn eval<T: Scalar>(&self, point: &DVector<T>) -> Result<DVector<T>> {
        self.system.eval(point, None)
    }

    pub fn jacobian<T: Scalar>(&self, point: &DVector<T>) -> Result<DMatrix<T>> {
        self.system.jacobian(point, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numeric::MpComplex;
    use crate::parser::{parse_expression, SymbolTable};
    use num_complex::Complex64;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn target(texts: &[&str], names: &[&str]) -> (System, Vec<Node>) {
        let mut symbols = SymbolTable::new();
        let vars: Vec<Node> = names.iter().map(|n| symbols.variable(n)).collect();
        let mut sys = System::new();
        sys.add_variable_group(&vars).expect("variables");
        for text in texts {
            sys.add_function(parse_expression(text, &symbols).expect("Failed to parse"));
        }
        (sys, vars)
    }

    #[test]
    fn subscripts_are_mixed_radix() {
        assert_eq!(index_to_subscript(1, &[2, 2]).expect("in range"), vec![1, 0]);
        assert_eq!(index_to_subscript(2, &[2, 2]).expect("in range"), vec![0, 1]);
        assert_eq!(index_to_subscript(20, &[2, 3, 4, 5]).expect("in range"), vec![0, 1, 3, 0]);
        assert_eq!(index_to_subscript(119, &[2, 3, 4, 5]).expect("in range"), vec![1, 2, 3, 4]);
        assert!(matches!(
            index_to_subscript(120, &[2, 3, 4, 5]),
            Err(Error::IndexOutOfRange { index: 120, count: 120 })
        ));
    }

    #[test]
    fn start_points_solve_start_system() {
        let (sys, _) = target(&["x^2 + y", "x*y*z - 1", "z^4 + x - y"], &["x", "y", "z"]);
        let mut rng = StdRng::seed_from_u64(5);
        let td = TotalDegree::new(&sys, &mut rng).expect("square polynomial");
        assert_eq!(td.degrees(), &[2, 3, 4]);
        assert_eq!(td.num_start_points(), 24);
        for index in 0..td.num_start_points() {
            let point: DVector<Complex64> = td.start_point(index).expect("in range");
            let residual = td.eval(&point).expect("eval");
            assert!(residual.norm() < 1e-12, "start point {} residual {}", index, residual.norm());
        }
        assert!(td.start_point::<Complex64>(24).is_err());
    }

    #[test]
    fn start_points_are_distinct() {
        let (sys, _) = target(&["x^3 - 1", "y^2 - x"], &["x", "y"]);
        let mut rng = StdRng::seed_from_u64(9);
        let td = TotalDegree::new(&sys, &mut rng).expect("square polynomial");
        let points: Vec<DVector<Complex64>> =
            (0..td.num_start_points()).map(|i| td.start_point(i).expect("in range")).collect();
        for a in 0..points.len() {
            for b in a + 1..points.len() {
                assert!((&points[a] - &points[b]).norm() > 1e-6);
            }
        }
    }

    #[test]
    fn eval_and_jacobian_at_ones_and_zeros() {
        let (sys, _) = target(&["x^2 + y", "x*y*z - 1", "z^4 + x - y"], &["x", "y", "z"]);
        let mut rng = StdRng::seed_from_u64(5);
        let td = TotalDegree::new(&sys, &mut rng).expect("square polynomial");
        let r: Vec<Complex64> = td.random_values();
        let ones = DVector::from_element(3, Complex64::new(1.0, 0.0));
        let zeros = DVector::from_element(3, Complex64::new(0.0, 0.0));
        let at_ones = td.eval(&ones).expect("eval");
        let at_zeros = td.eval(&zeros).expect("eval");
        for i in 0..3 {
            assert!((at_ones[i] - (1.0 - r[i])).norm() < 1e-15);
            assert!((at_zeros[i] + r[i]).norm() < 1e-15);
        }
        let j = td.jacobian(&ones).expect("jacobian");
        for (i, d) in [2.0, 3.0, 4.0].into_iter().enumerate() {
            for k in 0..3 {
                let expected = if i == k { d } else { 0.0 };
                assert!((j[(i, k)] - Complex64::new(expected, 0.0)).norm() < 1e-15);
            }
        }
        assert!(td.random_value::<Complex64>(3).is_err());
    }

    #[test]
    fn non_polynomial_and_non_square_targets_are_rejected() {
        let (sys, _) = target(&["sin(x) + y", "y - 1"], &["x", "y"]);
        let mut rng = StdRng::seed_from_u64(5);
        assert!(matches!(TotalDegree::new(&sys, &mut rng), Err(Error::NonPolynomial(_))));
        let (sys, _) = target(&["x + y"], &["x", "y"]);
        assert!(matches!(TotalDegree::new(&sys, &mut rng), Err(Error::NotSquare { .. })));
    }

    #[test]
    fn homogenized_target_gives_patched_start_system() {
        let (mut sys, _) = target(&["(x-1)^3", "(y-1)^2"], &["x", "y"]);
        let mut rng = StdRng::seed_from_u64(21);
        sys.homogenize().expect("polynomial");
        sys.auto_patch(&mut rng).expect("projective group");
        let td = TotalDegree::new(&sys, &mut rng).expect("square polynomial");
        assert!(td.system().is_homogeneous());
        assert!(td.system().is_patched());
        assert_eq!(td.system().num_variables(), 3);
        for index in 0..td.num_start_points() {
            let point: DVector<Complex64> = td.start_point(index).expect("in range");
            assert!(td.eval(&point).expect("eval").norm() < 1e-12);
        }
    }

    #[test]
    fn multiple_precision_start_points_carry_system_precision() {
        let (mut sys, _) = target(&["x^2 - 3", "x*y - 2"], &["x", "y"]);
        let mut rng = StdRng::seed_from_u64(2);
        sys.set_precision(50);
        let mut td = TotalDegree::new(&sys, &mut rng).expect("square polynomial");
        td.system.set_precision(50);
        let point: DVector<MpComplex> = td.start_point(3).expect("in range");
        assert!(point.iter().all(|x| Scalar::precision(x) == 50));
        let residual = td.eval(&point).expect("eval");
        assert!(residual.iter().all(|v| Scalar::abs(v) < 1e-45));
    }

    #[test]
    fn homotopy_with_total_degree_has_expected_shape() {
        let mut symbols = SymbolTable::new();
        let x = symbols.variable("x");
        let y = symbols.variable("y");
        let z = symbols.variable("z");
        let mut sys = System::new();
        sys.add_variable_group(&[x, y, z]).expect("variables");
        for text in ["y+x*y+0.5", "x^3+x*y+e", "x^2*y^2+x*y*z*z-1"] {
            sys.add_function(parse_expression(text, &symbols).expect("Failed to parse"));
        }
        let mut rng = StdRng::seed_from_u64(8);
        let td = TotalDegree::new(&sys, &mut rng).expect("square polynomial");
        assert_eq!(td.num_start_points(), 2 * 3 * 4);

        let t = Node::variable("t");
        let gamma = Node::integer(1);
        let mut homotopy = System::straight_line_homotopy(&sys, td.system(), &gamma, &t).expect("compatible");
        homotopy.homogenize().expect("polynomial");
        homotopy.auto_patch(&mut rng).expect("projective group");
        assert_eq!(homotopy.num_variables(), 4);
        assert_eq!(homotopy.num_natural_variables(), 3);
        assert_eq!(homotopy.num_natural_functions(), 3);
        assert_eq!(homotopy.num_total_functions(), 4);
        assert!(homotopy.is_homogeneous());
        assert!(homotopy.is_polynomial());
        assert!(homotopy.is_patched());
    }
}

//! Polynomial systems: functions, variable structure, patches, and their
//! evaluation together with Jacobians and time derivatives.

mod patch;
mod snapshot;
mod start_system;

pub use patch::Patch;
pub use snapshot::{NodeRecord, SystemSnapshot};
pub use start_system::{index_to_subscript, TotalDegree};

use std::cell::OnceCell;

use nalgebra::{DMatrix, DVector};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::function_tree::{Node, Number, VariableGroup};
use crate::numeric::{default_precision, random_rational, random_units, Scalar};

/// Whether a variable group lives in affine or projective space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupKind {
    /// Affine variables; homogenizing adds a new variable to the group.
    Affine,
    /// Variables declared projective by the caller.
    Homogeneous,
}

#[derive(Debug, Clone)]
struct Group {
    kind: GroupKind,
    variables: VariableGroup,
    hom_variable: Option<Node>,
}

impl Group {
    fn is_projective(&self) -> bool {
        self.kind == GroupKind::Homogeneous || self.hom_variable.is_some()
    }

    /// Variables in ordering position, homogenizing variable first.
    fn ordered(&self) -> Vec<Node> {
        self.hom_variable
            .iter()
            .cloned()
            .chain(self.variables.iter().cloned())
            .collect()
    }

    fn len(&self) -> usize {
        self.variables.len() + usize::from(self.hom_variable.is_some())
    }
}

/// A system of functions together with its variable structure.
///
/// Cloning is shallow: the clone shares expression nodes, including
/// variables, with the original. Use [`System::clone_deep`] to obtain an
/// independent copy, for instance one per worker thread.
#[derive(Debug, Clone)]
pub struct System {
    functions: Vec<Node>,
    groups: Vec<Group>,
    ungrouped: Vec<Node>,
    path_variable: Option<Node>,
    patch: Option<Patch>,
    precision: u32,
    derivatives: OnceCell<Vec<Node>>,
}

impl Default for System {
    fn default() -> Self {
        Self::new()
    }
}

impl System {
    pub fn new() -> Self {
        Self {
            functions: Vec::new(),
            groups: Vec::new(),
            ungrouped: Vec::new(),
            path_variable: None,
            patch: None,
            precision: default_precision(),
            derivatives: OnceCell::new(),
        }
    }

    /// A system with the same variables, homogenizing variables, path
    /// variable and patch as `self`, but no functions.
    fn copy_structure(&self) -> System {
        System {
            functions: Vec::new(),
            groups: self.groups.clone(),
            ungrouped: self.ungrouped.clone(),
            path_variable: self.path_variable.clone(),
            patch: self.patch.clone(),
            precision: self.precision,
            derivatives: OnceCell::new(),
        }
    }

    pub fn add_function(&mut self, function: Node) {
        function.set_precision(self.precision);
        self.functions.push(function);
        self.derivatives = OnceCell::new();
    }

    fn add_group(&mut self, kind: GroupKind, variables: &[Node]) -> Result<()> {
        for v in variables {
            v.expect_variable()?;
        }
        self.groups.push(Group {
            kind,
            variables: variables.to_vec(),
            hom_variable: None,
        });
        Ok(())
    }

    /// Adds an affine variable group, to be homogenized by [`System::homogenize`].
    pub fn add_variable_group(&mut self, variables: &[Node]) -> Result<()> {
        self.add_group(GroupKind::Affine, variables)
    }

    /// Adds a group the functions are already homogeneous in.
    pub fn add_hom_variable_group(&mut self, variables: &[Node]) -> Result<()> {
        self.add_group(GroupKind::Homogeneous, variables)
    }

    pub fn add_ungrouped_variable(&mut self, variable: &Node) -> Result<()> {
        variable.expect_variable()?;
        self.ungrouped.push(variable.clone());
        Ok(())
    }

    pub fn add_path_variable(&mut self, variable: &Node) -> Result<()> {
        variable.expect_variable()?;
        if self.path_variable.is_some() {
            return Err(Error::InvalidConfiguration(
                "system already has a path variable".to_string(),
            ));
        }
        variable.set_precision(self.precision);
        self.path_variable = Some(variable.clone());
        self.derivatives = OnceCell::new();
        Ok(())
    }

    pub fn has_path_variable(&self) -> bool {
        self.path_variable.is_some()
    }

    pub fn path_variable(&self) -> Option<&Node> {
        self.path_variable.as_ref()
    }

    /// Drops every variable, the path variable and the patch; functions stay.
    pub fn clear_variables(&mut self) {
        self.groups.clear();
        self.ungrouped.clear();
        self.path_variable = None;
        self.patch = None;
        self.derivatives = OnceCell::new();
    }

    pub fn functions(&self) -> &[Node] {
        &self.functions
    }

    /// Variables in the order points are laid out: each group in declaration
    /// order, homogenizing variable first, then ungrouped variables.
    pub fn variable_ordering(&self) -> Vec<Node> {
        self.groups
            .iter()
            .flat_map(Group::ordered)
            .chain(self.ungrouped.iter().cloned())
            .collect()
    }

    /// Variables excluding the homogenizing ones.
    pub fn natural_variables(&self) -> Vec<Node> {
        self.groups
            .iter()
            .flat_map(|g| g.variables.iter().cloned())
            .chain(self.ungrouped.iter().cloned())
            .collect()
    }

    pub fn num_functions(&self) -> usize {
        self.functions.len()
    }

    pub fn num_natural_functions(&self) -> usize {
        self.functions.len()
    }

    pub fn num_total_functions(&self) -> usize {
        self.functions.len() + self.patch.as_ref().map_or(0, Patch::num_equations)
    }

    pub fn num_natural_variables(&self) -> usize {
        self.groups.iter().map(|g| g.variables.len()).sum::<usize>() + self.ungrouped.len()
    }

    pub fn num_hom_variables(&self) -> usize {
        self.groups.iter().filter(|g| g.hom_variable.is_some()).count()
    }

    /// Natural plus homogenizing variables; the length of a point.
    pub fn num_variables(&self) -> usize {
        self.num_natural_variables() + self.num_hom_variables()
    }

    pub fn num_total_variables(&self) -> usize {
        self.num_variables()
    }

    pub fn num_variable_groups(&self) -> usize {
        self.groups.len()
    }

    pub fn num_ungrouped_variables(&self) -> usize {
        self.ungrouped.len()
    }

    /// `(offset, length)` of every projective group within a point.
    fn projective_ranges(&self) -> Vec<(usize, usize)> {
        let mut ranges = Vec::new();
        let mut offset = 0;
        for group in &self.groups {
            if group.is_projective() {
                ranges.push((offset, group.len()));
            }
            offset += group.len();
        }
        ranges
    }

    /// The patch with the group ranges it applies to, or an error when it was
    /// built for a different set of projective groups.
    fn checked_patch(&self) -> Result<Option<(&Patch, Vec<(usize, usize)>)>> {
        let Some(patch) = &self.patch else {
            return Ok(None);
        };
        let ranges = self.projective_ranges();
        let sizes: Vec<usize> = ranges.iter().map(|r| r.1).collect();
        patch.check_group_sizes(&sizes)?;
        Ok(Some((patch, ranges)))
    }

    /// Introduces one homogenizing variable per affine group, reusing an
    /// existing one, and homogenizes every function in every group.
    pub fn homogenize(&mut self) -> Result<()> {
        let mut next_index = self.num_hom_variables();
        for group in &mut self.groups {
            if group.kind != GroupKind::Affine {
                continue;
            }
            let hom = match &group.hom_variable {
                Some(h) => h.clone(),
                None => {
                    let h = Node::variable(format!("HOM_VAR_{}", next_index));
                    h.set_precision(self.precision);
                    next_index += 1;
                    group.hom_variable = Some(h.clone());
                    h
                }
            };
            for function in &self.functions {
                function.homogenize(&group.variables, &hom)?;
            }
        }
        self.derivatives = OnceCell::new();
        tracing::debug!(
            hom_variables = self.num_hom_variables(),
            "Homogenized system"
        );
        Ok(())
    }

    /// True when every function is homogeneous in every group, counting a
    /// group's homogenizing variable with it.
    pub fn is_homogeneous(&self) -> bool {
        if self.groups.is_empty() {
            return false;
        }
        self.groups.iter().all(|group| {
            let selection = group.ordered();
            self.functions.iter().all(|f| f.is_homogeneous_in(&selection))
        })
    }

    pub fn is_polynomial(&self) -> bool {
        let variables = self.variable_ordering();
        self.functions.iter().all(|f| f.is_polynomial_in(&variables))
    }

    /// Appends one random patch equation per projective group.
    pub fn auto_patch<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<()> {
        let sizes: Vec<usize> = self.projective_ranges().iter().map(|r| r.1).collect();
        if sizes.is_empty() {
            return Err(Error::NoProjectiveGroups);
        }
        self.patch = Some(Patch::random(&sizes, rng));
        Ok(())
    }

    pub fn is_patched(&self) -> bool {
        match &self.patch {
            Some(patch) => {
                let sizes: Vec<usize> = self.projective_ranges().iter().map(|r| r.1).collect();
                !sizes.is_empty() && patch.group_sizes() == sizes
            }
            None => false,
        }
    }

    pub fn patch(&self) -> Option<&Patch> {
        self.patch.as_ref()
    }

    /// Working precision of multiple precision evaluation, in digits.
    pub fn precision(&self) -> u32 {
        self.precision
    }

    pub fn set_precision(&mut self, digits: u32) {
        self.precision = digits;
        for f in &self.functions {
            f.set_precision(digits);
        }
        if let Some(derivatives) = self.derivatives.get() {
            for d in derivatives {
                d.set_precision(digits);
            }
        }
        for v in self.variable_ordering() {
            v.set_precision(digits);
        }
        if let Some(t) = &self.path_variable {
            t.set_precision(digits);
        }
    }

    /// Total degree of every function in the system's variables; `-1` marks
    /// a non-polynomial function.
    pub fn degrees(&self) -> Vec<i32> {
        let variables = self.variable_ordering();
        self.functions.iter().map(|f| f.degree_in(&variables)).collect()
    }

    pub fn degree_bound(&self) -> i32 {
        self.degrees().into_iter().max().unwrap_or(0)
    }

    /// Largest Jacobian entry seen over `num_samples` random points, at least one.
    pub fn coefficient_bound<R: Rng + ?Sized>(&self, num_samples: usize, rng: &mut R) -> Result<f64> {
        use num_complex::Complex64;
        let mut bound = 1.0_f64;
        for _ in 0..num_samples {
            let point: DVector<Complex64> = random_units(rng, self.num_variables(), 16);
            let time = random_units::<Complex64, R>(rng, 1, 16)[0];
            let time = self.path_variable.as_ref().map(|_| time);
            let jacobian = self.jacobian(&point, time.as_ref())?;
            for entry in jacobian.iter() {
                bound = bound.max(entry.norm());
            }
        }
        Ok(bound)
    }

    fn set_variables<T: Scalar>(&self, point: &DVector<T>, time: Option<&T>) -> Result<()> {
        let variables = self.variable_ordering();
        if point.len() != variables.len() {
            return Err(Error::SizeMismatch {
                expected: variables.len(),
                found: point.len(),
            });
        }
        for (v, x) in variables.iter().zip(point.iter()) {
            v.set_value(x.clone());
        }
        if let Some(t) = time {
            match &self.path_variable {
                Some(path) => path.set_value(t.clone()),
                None => return Err(Error::MissingPathVariable),
            }
        }
        for f in &self.functions {
            f.reset();
        }
        if let Some(derivatives) = self.derivatives.get() {
            for d in derivatives {
                d.reset();
            }
        }
        Ok(())
    }

    /// Symbolic derivative of every function, built on first use.
    fn derivatives(&self) -> &[Node] {
        self.derivatives.get_or_init(|| {
            self.functions
                .iter()
                .map(|f| {
                    let d = f.differentiate();
                    d.set_precision(self.precision);
                    d
                })
                .collect()
        })
    }

    pub fn eval<T: Scalar>(&self, point: &DVector<T>, time: Option<&T>) -> Result<DVector<T>> {
        let mut values = DVector::from_element(self.num_total_functions(), T::zero(self.precision));
        self.eval_in_place(&mut values, point, time)?;
        Ok(values)
    }

    /// Evaluates functions then patch equations into the front of `values`.
    pub fn eval_in_place<T: Scalar>(
        &self,
        values: &mut DVector<T>,
        point: &DVector<T>,
        time: Option<&T>,
    ) -> Result<()> {
        let patch = self.checked_patch()?;
        let total = self.num_total_functions();
        if values.len() < total {
            return Err(Error::SizeMismatch {
                expected: total,
                found: values.len(),
            });
        }
        self.set_variables(point, time)?;
        for (i, f) in self.functions.iter().enumerate() {
            values[i] = f.eval::<T>(None);
        }
        if let Some((patch, ranges)) = patch {
            let offset = self.functions.len();
            for (k, (start, len)) in ranges.into_iter().enumerate() {
                values[offset + k] = patch.eval(k, &point.as_slice()[start..start + len], self.precision)?;
            }
        }
        Ok(())
    }

    /// `∂fᵢ/∂xⱼ` over all variables, patch rows included.
    pub fn jacobian<T: Scalar>(&self, point: &DVector<T>, time: Option<&T>) -> Result<DMatrix<T>> {
        let patch = self.checked_patch()?;
        self.set_variables(point, time)?;
        let variables = self.variable_ordering();
        let mut jacobian = DMatrix::from_element(
            self.num_total_functions(),
            variables.len(),
            T::zero(self.precision),
        );
        for (i, d) in self.derivatives().iter().enumerate() {
            for (j, v) in variables.iter().enumerate() {
                jacobian[(i, j)] = d.eval::<T>(Some(v));
            }
        }
        if let Some((patch, ranges)) = patch {
            let offset = self.functions.len();
            for (k, (start, len)) in ranges.into_iter().enumerate() {
                for m in 0..len {
                    jacobian[(offset + k, start + m)] = patch.coefficient(k, m, self.precision)?;
                }
            }
        }
        Ok(jacobian)
    }

    /// `∂fᵢ/∂t` for the path variable `t`; patch rows are zero.
    pub fn time_derivative<T: Scalar>(&self, point: &DVector<T>, time: &T) -> Result<DVector<T>> {
        let path = self.path_variable.clone().ok_or(Error::MissingPathVariable)?;
        self.set_variables(point, Some(time))?;
        let mut values = DVector::from_element(self.num_total_functions(), T::zero(self.precision));
        for (i, d) in self.derivatives().iter().enumerate() {
            values[i] = d.eval::<T>(Some(&path));
        }
        Ok(values)
    }

    /// Maps a point back to natural coordinates, dividing each homogenized
    /// group by its homogenizing coordinate.
    pub fn dehomogenize_point<T: Scalar>(&self, point: &DVector<T>) -> Result<DVector<T>> {
        if point.len() != self.num_variables() {
            return Err(Error::SizeMismatch {
                expected: self.num_variables(),
                found: point.len(),
            });
        }
        let mut natural = Vec::with_capacity(self.num_natural_variables());
        let mut offset = 0;
        for group in &self.groups {
            match (&group.hom_variable, group.kind) {
                (Some(_), GroupKind::Affine) => {
                    let h = point[offset].clone();
                    for k in 0..group.variables.len() {
                        natural.push(point[offset + 1 + k].clone() / h.clone());
                    }
                }
                _ => {
                    for k in 0..group.len() {
                        natural.push(point[offset + k].clone());
                    }
                }
            }
            offset += group.len();
        }
        natural.extend(point.iter().skip(offset).cloned());
        Ok(DVector::from_vec(natural))
    }

    /// Rescales each projective group of `point` onto its patch.
    pub fn rescale_point_to_fit_patch<T: Scalar>(&self, point: &DVector<T>) -> Result<DVector<T>> {
        let (patch, ranges) = self.checked_patch()?.ok_or(Error::NoProjectiveGroups)?;
        if point.len() != self.num_variables() {
            return Err(Error::SizeMismatch {
                expected: self.num_variables(),
                found: point.len(),
            });
        }
        let mut rescaled = point.clone();
        for (k, (start, len)) in ranges.into_iter().enumerate() {
            patch.rescale(k, &mut rescaled.as_mut_slice()[start..start + len], self.precision)?;
        }
        Ok(rescaled)
    }

    /// Every function multiplied by `factor`.
    pub fn scaled(&self, factor: &Node) -> System {
        let mut result = self.copy_structure();
        for f in &self.functions {
            result.add_function(f * factor);
        }
        result
    }

    /// Sum of two systems over the same variables, function by function.
    pub fn try_add(&self, other: &System) -> Result<System> {
        if self.num_functions() != other.num_functions() {
            return Err(Error::IncompatibleSystems(format!(
                "{} functions against {}",
                self.num_functions(),
                other.num_functions()
            )));
        }
        let (mine, theirs) = (self.variable_ordering(), other.variable_ordering());
        if mine.len() != theirs.len() || mine.iter().zip(&theirs).any(|(a, b)| !a.ptr_eq(b)) {
            return Err(Error::IncompatibleSystems(
                "variable orderings differ".to_string(),
            ));
        }
        let mut result = self.copy_structure();
        for (f, g) in self.functions.iter().zip(&other.functions) {
            result.add_function(f + g);
        }
        Ok(result)
    }

    /// `(1 - t)·target + γ·t·start` with path variable `t`, so that `t = 1`
    /// is the start system and `t = 0` the target.
    pub fn straight_line_homotopy(target: &System, start: &System, gamma: &Node, t: &Node) -> Result<System> {
        let mut homotopy = target
            .scaled(&(1 - t))
            .try_add(&start.scaled(&(gamma * t)))?;
        homotopy.add_path_variable(t)?;
        Ok(homotopy)
    }

    /// A copy sharing no nodes with `self`.
    pub fn clone_deep(&self) -> Result<System> {
        self.snapshot().restore()
    }
}

/// Random complex constant with exact rational parts, for the gamma trick.
pub fn random_gamma<R: Rng + ?Sized>(rng: &mut R) -> Node {
    Node::number(Number::Rational {
        re: random_rational(rng),
        im: random_rational(rng),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function_tree::pow;
    use crate::numeric::MpComplex;
    use crate::parser::{parse_expression, SymbolTable};
    use num_complex::Complex64;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn circle_line() -> (System, Node, Node, Node) {
        let mut symbols = SymbolTable::new();
        let x = symbols.variable("x");
        let y = symbols.variable("y");
        let t = symbols.variable("t");
        let mut sys = System::new();
        sys.add_variable_group(&[x.clone(), y.clone()]).expect("variables");
        sys.add_path_variable(&t).expect("path variable");
        for text in [
            "t*(x^2-1) + (1-t)*(x^2+y^2-4)",
            "t*(y-1) + (1-t)*(2*x+5*y)",
        ] {
            sys.add_function(parse_expression(text, &symbols).expect("Failed to parse"));
        }
        (sys, x, y, t)
    }

    #[test]
    fn counts_and_ordering() {
        let (sys, x, y, _) = circle_line();
        assert_eq!(sys.num_functions(), 2);
        assert_eq!(sys.num_variables(), 2);
        let ordering = sys.variable_ordering();
        assert!(ordering[0].ptr_eq(&x) && ordering[1].ptr_eq(&y));
        assert!(sys.is_polynomial());
        assert!(!sys.is_homogeneous());
        assert_eq!(sys.degrees(), vec![2, 1]);
    }

    #[test]
    fn eval_checks_sizes() {
        let (sys, _, _, _) = circle_line();
        let point = DVector::from_vec(vec![Complex64::new(1.0, 0.0)]);
        assert!(matches!(
            sys.eval(&point, Some(&Complex64::new(0.5, 0.0))),
            Err(Error::SizeMismatch { expected: 2, found: 1 })
        ));
        let point = DVector::from_vec(vec![Complex64::new(1.0, 0.0), Complex64::new(2.0, 0.0)]);
        let mut short = DVector::from_element(1, Complex64::new(0.0, 0.0));
        assert!(sys.eval_in_place(&mut short, &point, None).is_err());
    }

    #[test]
    fn jacobian_and_time_derivative_match_hand_computation() {
        let (sys, _, _, _) = circle_line();
        let (x, y, t) = (Complex64::new(2.3, 0.2), Complex64::new(1.1, 1.87), Complex64::new(0.9, 0.0));
        let point = DVector::from_vec(vec![x, y]);
        let f = sys.eval(&point, Some(&t)).expect("eval");
        let expected_f0 = t * (x * x - 1.0) + (1.0 - t) * (x * x + y * y - 4.0);
        assert!((f[0] - expected_f0).norm() < 1e-13);

        let j = sys.jacobian(&point, Some(&t)).expect("jacobian");
        assert!((j[(0, 0)] - 2.0 * x).norm() < 1e-13);
        assert!((j[(0, 1)] - (1.0 - t) * 2.0 * y).norm() < 1e-13);
        assert!((j[(1, 0)] - (1.0 - t) * 2.0).norm() < 1e-13);
        assert!((j[(1, 1)] - (t + (1.0 - t) * 5.0)).norm() < 1e-13);

        let dt = sys.time_derivative(&point, &t).expect("time derivative");
        assert!((dt[0] - (3.0 - y * y)).norm() < 1e-13);
        assert!((dt[1] - (y - 1.0 - 2.0 * x - 5.0 * y)).norm() < 1e-13);
    }

    #[test]
    fn double_and_multiple_evaluations_agree() {
        let (mut sys, _, _, _) = circle_line();
        sys.set_precision(40);
        let point = DVector::from_vec(vec![Complex64::new(0.4, -1.3), Complex64::new(-2.1, 0.6)]);
        let t = Complex64::new(0.35, 0.0);
        let f_double = sys.eval(&point, Some(&t)).expect("eval");
        let j_double = sys.jacobian(&point, Some(&t)).expect("jacobian");

        let mp_point: DVector<MpComplex> = crate::numeric::convert_vector(&point, 40);
        let mp_t = MpComplex::from_f64(0.35, 0.0, 40);
        let f_mp = sys.eval(&mp_point, Some(&mp_t)).expect("eval");
        let j_mp = sys.jacobian(&mp_point, Some(&mp_t)).expect("jacobian");
        for (a, b) in f_double.iter().zip(f_mp.iter()) {
            assert!((a - b.to_complex64()).norm() < 1e-13);
        }
        for (a, b) in j_double.iter().zip(j_mp.iter()) {
            assert!((a - b.to_complex64()).norm() < 1e-13);
        }
        assert_eq!(Scalar::precision(&f_mp[0]), 40);
    }

    #[test]
    fn homogenize_and_patch() {
        let mut symbols = SymbolTable::new();
        let x = symbols.variable("x");
        let y = symbols.variable("y");
        let mut sys = System::new();
        sys.add_variable_group(&[x.clone(), y.clone()]).expect("variables");
        sys.add_function(parse_expression("x^2 + y - 3", &symbols).expect("Failed to parse"));
        sys.add_function(parse_expression("x*y - 1", &symbols).expect("Failed to parse"));

        let mut rng = StdRng::seed_from_u64(1);
        assert!(matches!(sys.auto_patch(&mut rng), Err(Error::NoProjectiveGroups)));
        sys.homogenize().expect("polynomial");
        assert!(sys.is_homogeneous());
        assert_eq!(sys.num_variables(), 3);
        assert_eq!(sys.num_natural_variables(), 2);
        sys.auto_patch(&mut rng).expect("one projective group");
        assert!(sys.is_patched());
        assert_eq!(sys.num_total_functions(), 3);

        let point = DVector::from_vec(vec![
            Complex64::new(1.0, 0.5),
            Complex64::new(2.0, 0.0),
            Complex64::new(-1.0, 1.0),
        ]);
        let on_patch = sys.rescale_point_to_fit_patch(&point).expect("patched");
        let values = sys.eval(&on_patch, None).expect("eval");
        assert!(values[2].norm() < 1e-14);
        let natural = sys.dehomogenize_point(&on_patch).expect("sizes");
        assert_eq!(natural.len(), 2);
        assert!((natural[0] - Complex64::new(2.0, 0.0) / Complex64::new(1.0, 0.5)).norm() < 1e-13);

        // Homogenizing again reuses the existing variable.
        sys.homogenize().expect("polynomial");
        assert_eq!(sys.num_variables(), 3);
    }

    #[test]
    fn patch_built_for_other_groups_is_an_error() {
        let mut symbols = SymbolTable::new();
        let x = symbols.variable("x");
        let z = symbols.variable("z");
        let w = symbols.variable("w");
        let mut sys = System::new();
        sys.add_variable_group(std::slice::from_ref(&x)).expect("variables");
        sys.add_function(parse_expression("x^2 - 1", &symbols).expect("Failed to parse"));
        sys.add_function(parse_expression("z - w", &symbols).expect("Failed to parse"));
        sys.homogenize().expect("polynomial");
        let mut rng = StdRng::seed_from_u64(5);
        sys.auto_patch(&mut rng).expect("one projective group");
        sys.add_hom_variable_group(&[z, w]).expect("variables");
        assert!(!sys.is_patched());

        let point = DVector::from_element(sys.num_variables(), Complex64::new(0.5, 0.25));
        assert!(matches!(
            sys.eval(&point, None),
            Err(Error::SizeMismatch { expected: 2, found: 1 })
        ));
        assert!(sys.jacobian(&point, None).is_err());
        assert!(sys.rescale_point_to_fit_patch(&point).is_err());

        sys.auto_patch(&mut rng).expect("two projective groups");
        assert!(sys.is_patched());
        assert_eq!(sys.eval(&point, None).expect("eval").len(), 4);
    }

    #[test]
    fn straight_line_homotopy_interpolates() {
        let mut symbols = SymbolTable::new();
        let x = symbols.variable("x");
        let t = Node::variable("t");
        let mut target = System::new();
        target.add_variable_group(std::slice::from_ref(&x)).expect("variables");
        target.add_function(pow(&x, 2) - 2);
        let mut start = System::new();
        start.add_variable_group(std::slice::from_ref(&x)).expect("variables");
        start.add_function(pow(&x, 2) - 1);

        let gamma = Node::number(Number::Integer(3));
        let homotopy = System::straight_line_homotopy(&target, &start, &gamma, &t).expect("compatible");
        let point = DVector::from_vec(vec![Complex64::new(1.5, 0.0)]);
        let at_zero = homotopy.eval(&point, Some(&Complex64::new(0.0, 0.0))).expect("eval");
        let at_one = homotopy.eval(&point, Some(&Complex64::new(1.0, 0.0))).expect("eval");
        assert!((at_zero[0] - Complex64::new(0.25, 0.0)).norm() < 1e-14);
        assert!((at_one[0] - Complex64::new(3.75, 0.0)).norm() < 1e-14);

        let mut other = System::new();
        other.add_variable_group(&[Node::variable("x")]).expect("variables");
        other.add_function(Node::integer(1));
        assert!(matches!(target.try_add(&other), Err(Error::IncompatibleSystems(_))));
    }
}

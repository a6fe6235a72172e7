use super::{Node, NodeKind, UnaryOp};
use crate::numeric::{CachedValue, Scalar, DOUBLE_PRECISION};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct EvalKey {
    fixed: bool,
    digits: u32,
    diff: Option<usize>,
}

#[derive(Debug, Clone)]
pub(crate) struct CacheEntry {
    generation: u64,
    key: EvalKey,
    value: CachedValue,
}

impl UnaryOp {
    pub fn apply<T: Scalar>(&self, x: T) -> T {
        match self {
            UnaryOp::Negate => -x,
            UnaryOp::Sqrt => x.sqrt(),
            UnaryOp::Sin => x.sin(),
            UnaryOp::Cos => x.cos(),
            UnaryOp::Tan => x.tan(),
            UnaryOp::Exp => x.exp(),
            UnaryOp::Log => x.ln(),
            UnaryOp::ArcSin => x.asin(),
            UnaryOp::ArcCos => x.acos(),
            UnaryOp::ArcTan => x.atan(),
        }
    }
}

impl Node {
    /// Value of the node in numeric type `T` at the current variable values.
    ///
    /// With `diff_variable` set, differential leaves evaluate to one for that
    /// variable and zero otherwise, so evaluating the output of
    /// [`Node::differentiate`] yields the partial derivative.
    ///
    /// Results are memoized per node until the next [`Node::reset`]; callers
    /// that change variable values reset the tree first.
    pub fn eval<T: Scalar>(&self, diff_variable: Option<&Node>) -> T {
        if let NodeKind::Variable(v) = &*self.kind() {
            return v.value.borrow().get::<T>();
        }

        let key = EvalKey {
            fixed: T::IS_FIXED,
            digits: if T::IS_FIXED { DOUBLE_PRECISION } else { self.precision() },
            diff: if self.has_differential() {
                diff_variable.map(Node::id)
            } else {
                None
            },
        };
        let generation = self.0.generation.get();

        let hit = self
            .0
            .cache
            .borrow()
            .iter()
            .find(|e| e.generation == generation && e.key == key)
            .and_then(|e| T::from_cached(&e.value));
        if let Some(value) = hit {
            return value;
        }

        let value = self.fresh_eval::<T>(diff_variable);
        let mut cache = self.0.cache.borrow_mut();
        cache.retain(|e| e.generation == generation);
        cache.push(CacheEntry {
            generation,
            key,
            value: value.clone().into_cached(),
        });
        value
    }

    /// Evaluates without consulting or filling this node's cache.
    pub fn fresh_eval<T: Scalar>(&self, diff_variable: Option<&Node>) -> T {
        let digits = self.precision();
        match &*self.kind() {
            NodeKind::Variable(v) => v.value.borrow().get::<T>(),
            NodeKind::Number(n) => n.eval::<T>(digits),
            NodeKind::Differential(v) => match diff_variable {
                Some(d) if d.ptr_eq(v) => T::one(digits),
                _ => T::zero(digits),
            },
            NodeKind::Unary(op, operand) => op.apply(operand.eval::<T>(diff_variable)),
            NodeKind::Sum(terms) => {
                let mut total = T::zero(digits);
                for term in terms {
                    let value = term.node.eval::<T>(diff_variable);
                    if term.positive {
                        total += value;
                    } else {
                        total -= value;
                    }
                }
                total
            }
            NodeKind::Product(factors) => {
                let mut total = T::one(digits);
                for factor in factors {
                    let value = factor.node.eval::<T>(diff_variable);
                    if factor.divide {
                        total /= value;
                    } else {
                        total *= value;
                    }
                }
                total
            }
            NodeKind::IntegerPower(base, exponent) => base.eval::<T>(diff_variable).powi(*exponent),
            NodeKind::Power(base, exponent) => {
                let b = base.eval::<T>(diff_variable);
                let e = exponent.eval::<T>(diff_variable);
                b.pow(&e)
            }
            NodeKind::LinearProduct(lp) => lp.eval::<T>(digits),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::numeric::{MpComplex, Scalar};
    use num_complex::Complex64;

    #[test]
    fn cached_value_is_reused_until_reset() {
        let x = Node::variable("x");
        let f = &x * &x;
        x.set_value(Complex64::new(2.0, 0.0));
        assert_eq!(f.eval::<Complex64>(None), Complex64::new(4.0, 0.0));
        x.set_value(Complex64::new(3.0, 0.0));
        assert_eq!(f.eval::<Complex64>(None), Complex64::new(4.0, 0.0));
        f.reset();
        assert_eq!(f.eval::<Complex64>(None), Complex64::new(9.0, 0.0));
    }

    #[test]
    fn double_and_multiple_evaluations_agree() {
        let x = Node::variable("x");
        let y = Node::variable("y");
        let f = exp(&x) * sin(&y) - pow(&x, 3) / (&y + 2) + sqrt(&(&x * &y));
        x.set_value(Complex64::new(0.3, 0.1));
        y.set_value(Complex64::new(-0.2, 0.7));
        x.set_value(MpComplex::from_f64(0.3, 0.1, 40));
        y.set_value(MpComplex::from_f64(-0.2, 0.7, 40));
        f.set_precision(40);

        let d: Complex64 = f.eval(None);
        let m: MpComplex = f.eval(None);
        assert_eq!(Scalar::precision(&m), 40);
        assert!((d - m.to_complex64()).norm() < 1e-13);
    }

    #[test]
    fn differential_selects_variable() {
        let x = Node::variable("x");
        let y = Node::variable("y");
        let dx = Node::differential(&x).expect("variable");
        assert_eq!(dx.eval::<Complex64>(Some(&x)), Complex64::new(1.0, 0.0));
        assert_eq!(dx.eval::<Complex64>(Some(&y)), Complex64::new(0.0, 0.0));
        assert_eq!(dx.eval::<Complex64>(None), Complex64::new(0.0, 0.0));
    }
}

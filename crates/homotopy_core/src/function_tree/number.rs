use std::fmt;

use rug::Rational;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::numeric::{parse_rational, Scalar};

/// Numeric constants. Every non-special constant is stored exactly, so it
/// can be rendered at any working precision without accumulated rounding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Number {
    Integer(i64),
    Rational { re: Rational, im: Rational },
    /// A decimal literal, held as the exact rational it denotes.
    Float { re: Rational, im: Rational, literal: String },
    Pi,
    E,
    ImaginaryUnit,
}

impl Number {
    pub fn float(re: &str, im: &str) -> Result<Self> {
        let literal = if im.trim().is_empty() || parse_rational(im)? == 0 {
            re.trim().to_string()
        } else {
            format!("({}+{}*I)", re.trim(), im.trim())
        };
        let im = if im.trim().is_empty() {
            Rational::new()
        } else {
            parse_rational(im)?
        };
        Ok(Number::Float {
            re: parse_rational(re)?,
            im,
            literal,
        })
    }

    pub fn eval<T: Scalar>(&self, digits: u32) -> T {
        match self {
            Number::Integer(n) => T::from_i64(*n, digits),
            Number::Rational { re, im } | Number::Float { re, im, .. } => {
                T::from_rational(re, im, digits)
            }
            Number::Pi => T::pi(digits),
            Number::E => T::euler(digits),
            Number::ImaginaryUnit => T::from_f64(0.0, 1.0, digits),
        }
    }

    pub fn is_zero(&self) -> bool {
        match self {
            Number::Integer(n) => *n == 0,
            Number::Rational { re, im } | Number::Float { re, im, .. } => {
                *re == 0 && *im == 0
            }
            _ => false,
        }
    }

    pub fn is_one(&self) -> bool {
        match self {
            Number::Integer(n) => *n == 1,
            Number::Rational { re, im } | Number::Float { re, im, .. } => {
                *re == 1 && *im == 0
            }
            _ => false,
        }
    }

    /// The value as a machine integer, if it is one.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Number::Integer(n) => Some(*n),
            Number::Rational { re, im } | Number::Float { re, im, .. } => {
                if *im == 0 && *re.denom() == 1 {
                    re.numer().to_i64()
                } else {
                    None
                }
            }
            _ => None,
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Integer(n) => write!(f, "{}", n),
            Number::Rational { re, im } => {
                if *im == 0 {
                    write!(f, "({})", re)
                } else {
                    write!(f, "(({})+({})*I)", re, im)
                }
            }
            Number::Float { literal, .. } => write!(f, "{}", literal),
            Number::Pi => write!(f, "pi"),
            Number::E => write!(f, "e"),
            Number::ImaginaryUnit => write!(f, "I"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numeric::MpComplex;
    use num_complex::Complex64;

    #[test]
    fn float_literal_is_exact_at_any_precision() {
        let n = Number::float("0.1", "").expect("literal");
        let low: MpComplex = n.eval(30);
        let high: MpComplex = n.eval(300);
        let tenth = MpComplex::with_val(crate::numeric::digits_to_bits(300), (Rational::from((1, 10)), 0));
        assert_eq!(high, tenth);
        assert!((low.to_complex64() - Complex64::new(0.1, 0.0)).norm() < 1e-17);
    }

    #[test]
    fn integer_queries() {
        assert!(Number::Integer(0).is_zero());
        assert!(Number::Integer(1).is_one());
        assert_eq!(Number::Rational { re: Rational::from(4), im: Rational::new() }.as_integer(), Some(4));
        assert_eq!(Number::Pi.as_integer(), None);
    }

    #[test]
    fn special_numbers_evaluate() {
        let i: Complex64 = Number::ImaginaryUnit.eval(16);
        assert_eq!(i, Complex64::new(0.0, 1.0));
        let pi: Complex64 = Number::Pi.eval(16);
        assert!((pi.re - std::f64::consts::PI).abs() < 1e-15);
    }
}

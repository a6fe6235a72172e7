//! Numeric type layer.
//!
//! Two complex types share the [`Scalar`] interface: the hardware
//! `Complex64`, whose precision is fixed at [`DOUBLE_PRECISION`] digits, and
//! [`MpComplex`] (MPC via `rug`), whose working precision is settable.
//! Precision is always counted in decimal digits; the bit count handed to
//! MPFR is derived with [`digits_to_bits`].

use std::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Sub, SubAssign};
use std::sync::atomic::{AtomicU32, Ordering};

use nalgebra::DVector;
use num_complex::Complex64;
use num_traits::{Float as _, One, Zero};
use rand::Rng;
use rug::float::Constant;
use rug::ops::Pow;
use rug::{Float, Integer, Rational};

use crate::error::{Error, Result};

/// Arbitrary precision complex number.
pub type MpComplex = rug::Complex;

/// Digits carried by the hardware type.
pub const DOUBLE_PRECISION: u32 = 16;
/// Smallest precision used once the tracker leaves hardware arithmetic.
pub const LOWEST_MULTIPLE_PRECISION: u32 = 30;
/// Quantum by which adaptive precision is raised.
pub const PRECISION_INCREMENT: u32 = 10;
/// Hard ceiling on any working precision.
pub const MAX_PRECISION_ALLOWED: u32 = 1000;

static DEFAULT_PRECISION: AtomicU32 = AtomicU32::new(LOWEST_MULTIPLE_PRECISION);

/// Precision given to multiple precision values created without an explicit one.
pub fn default_precision() -> u32 {
    DEFAULT_PRECISION.load(Ordering::Relaxed)
}

pub fn set_default_precision(digits: u32) {
    DEFAULT_PRECISION.store(digits.max(1), Ordering::Relaxed);
}

/// Number of mantissa bits needed to carry `digits` decimal digits.
pub fn digits_to_bits(digits: u32) -> u32 {
    ((digits.max(1) as f64) * std::f64::consts::LOG2_10).ceil() as u32
}

/// Decimal digits represented by `bits` mantissa bits.
pub fn bits_to_digits(bits: u32) -> u32 {
    ((bits as f64) * std::f64::consts::LOG10_2).floor() as u32
}

/// Common arithmetic interface of the fixed and multiple precision complex types.
///
/// Every constructor takes the digit count the new value should carry;
/// `Complex64` ignores it.
pub trait Scalar:
    nalgebra::Scalar
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
    + AddAssign
    + SubAssign
    + MulAssign
    + DivAssign
{
    /// True for the hardware type.
    const IS_FIXED: bool;

    fn zero(digits: u32) -> Self;
    fn one(digits: u32) -> Self;
    fn from_f64(re: f64, im: f64, digits: u32) -> Self;
    fn from_i64(value: i64, digits: u32) -> Self;
    fn from_rational(re: &Rational, im: &Rational, digits: u32) -> Self;
    fn pi(digits: u32) -> Self;
    fn euler(digits: u32) -> Self;
    fn from_multiple(value: &MpComplex, digits: u32) -> Self;

    fn to_complex64(&self) -> Complex64;
    fn to_multiple(&self, digits: u32) -> MpComplex;

    /// Working precision of this value in decimal digits.
    fn precision(&self) -> u32;
    fn set_precision(&mut self, digits: u32);

    /// Modulus, rounded to `f64`.
    fn abs(&self) -> f64;
    /// `log10(|self|)`, computed at full precision so tiny moduli do not underflow.
    fn log10_abs(&self) -> f64;
    fn is_exact_zero(&self) -> bool;

    fn sqrt(&self) -> Self;
    fn sin(&self) -> Self;
    fn cos(&self) -> Self;
    fn tan(&self) -> Self;
    fn exp(&self) -> Self;
    fn ln(&self) -> Self;
    fn asin(&self) -> Self;
    fn acos(&self) -> Self;
    fn atan(&self) -> Self;
    fn powi(&self, exponent: i32) -> Self;
    fn pow(&self, exponent: &Self) -> Self;

    /// `log10` of the machine epsilon at `digits`.
    fn epsilon_log10(digits: u32) -> f64;
    /// `log10` of the threshold under which two magnitudes are treated as
    /// indistinguishable when comparing LU pivots.
    fn dummy_precision_log10(digits: u32) -> f64;

    fn read(slot: &ValueSlot) -> Self;
    fn write(self, slot: &mut ValueSlot);
    fn into_cached(self) -> CachedValue;
    fn from_cached(value: &CachedValue) -> Option<Self>;
}

/// One stored value for each numeric type, as held by a variable.
#[derive(Debug, Clone)]
pub struct ValueSlot {
    double: Complex64,
    multiple: MpComplex,
}

impl ValueSlot {
    pub fn new(digits: u32) -> Self {
        Self {
            double: Complex64::new(0.0, 0.0),
            multiple: MpComplex::new(digits_to_bits(digits)),
        }
    }

    pub fn get<T: Scalar>(&self) -> T {
        T::read(self)
    }

    pub fn set<T: Scalar>(&mut self, value: T) {
        value.write(self)
    }

    pub fn set_precision(&mut self, digits: u32) {
        self.multiple.set_prec(digits_to_bits(digits));
    }
}

impl Default for ValueSlot {
    fn default() -> Self {
        Self::new(default_precision())
    }
}

/// A memoized evaluation result of either numeric type.
#[derive(Debug, Clone, PartialEq)]
pub enum CachedValue {
    Double(Complex64),
    Multiple(MpComplex),
}

impl Scalar for Complex64 {
    const IS_FIXED: bool = true;

    fn zero(_digits: u32) -> Self {
        <Complex64 as Zero>::zero()
    }

    fn one(_digits: u32) -> Self {
        <Complex64 as One>::one()
    }

    fn from_f64(re: f64, im: f64, _digits: u32) -> Self {
        Complex64::new(re, im)
    }

    fn from_i64(value: i64, _digits: u32) -> Self {
        Complex64::new(value as f64, 0.0)
    }

    fn from_rational(re: &Rational, im: &Rational, _digits: u32) -> Self {
        Complex64::new(re.to_f64(), im.to_f64())
    }

    fn pi(_digits: u32) -> Self {
        Complex64::new(std::f64::consts::PI, 0.0)
    }

    fn euler(_digits: u32) -> Self {
        Complex64::new(std::f64::consts::E, 0.0)
    }

    fn from_multiple(value: &MpComplex, _digits: u32) -> Self {
        Complex64::new(value.real().to_f64(), value.imag().to_f64())
    }

    fn to_complex64(&self) -> Complex64 {
        *self
    }

    fn to_multiple(&self, digits: u32) -> MpComplex {
        MpComplex::with_val(digits_to_bits(digits), (self.re, self.im))
    }

    fn precision(&self) -> u32 {
        DOUBLE_PRECISION
    }

    fn set_precision(&mut self, _digits: u32) {}

    fn abs(&self) -> f64 {
        self.norm()
    }

    fn log10_abs(&self) -> f64 {
        self.norm().log10()
    }

    fn is_exact_zero(&self) -> bool {
        Zero::is_zero(self)
    }

    fn sqrt(&self) -> Self {
        Complex64::sqrt(*self)
    }

    fn sin(&self) -> Self {
        Complex64::sin(*self)
    }

    fn cos(&self) -> Self {
        Complex64::cos(*self)
    }

    fn tan(&self) -> Self {
        Complex64::tan(*self)
    }

    fn exp(&self) -> Self {
        Complex64::exp(*self)
    }

    fn ln(&self) -> Self {
        Complex64::ln(*self)
    }

    fn asin(&self) -> Self {
        Complex64::asin(*self)
    }

    fn acos(&self) -> Self {
        Complex64::acos(*self)
    }

    fn atan(&self) -> Self {
        Complex64::atan(*self)
    }

    fn powi(&self, exponent: i32) -> Self {
        Complex64::powi(self, exponent)
    }

    fn pow(&self, exponent: &Self) -> Self {
        Complex64::powc(*self, *exponent)
    }

    fn epsilon_log10(_digits: u32) -> f64 {
        f64::epsilon().log10()
    }

    fn dummy_precision_log10(_digits: u32) -> f64 {
        -12.0
    }

    fn read(slot: &ValueSlot) -> Self {
        slot.double
    }

    fn write(self, slot: &mut ValueSlot) {
        slot.double = self;
    }

    fn into_cached(self) -> CachedValue {
        CachedValue::Double(self)
    }

    fn from_cached(value: &CachedValue) -> Option<Self> {
        match value {
            CachedValue::Double(v) => Some(*v),
            CachedValue::Multiple(_) => None,
        }
    }
}

impl Scalar for MpComplex {
    const IS_FIXED: bool = false;

    fn zero(digits: u32) -> Self {
        MpComplex::new(digits_to_bits(digits))
    }

    fn one(digits: u32) -> Self {
        MpComplex::with_val(digits_to_bits(digits), 1)
    }

    fn from_f64(re: f64, im: f64, digits: u32) -> Self {
        MpComplex::with_val(digits_to_bits(digits), (re, im))
    }

    fn from_i64(value: i64, digits: u32) -> Self {
        MpComplex::with_val(digits_to_bits(digits), value)
    }

    fn from_rational(re: &Rational, im: &Rational, digits: u32) -> Self {
        MpComplex::with_val(digits_to_bits(digits), (re, im))
    }

    fn pi(digits: u32) -> Self {
        let bits = digits_to_bits(digits);
        MpComplex::with_val(bits, (Float::with_val(bits, Constant::Pi), 0))
    }

    fn euler(digits: u32) -> Self {
        let bits = digits_to_bits(digits);
        MpComplex::with_val(bits, (Float::with_val(bits, 1).exp(), 0))
    }

    fn from_multiple(value: &MpComplex, digits: u32) -> Self {
        MpComplex::with_val(digits_to_bits(digits), value)
    }

    fn to_complex64(&self) -> Complex64 {
        Complex64::new(self.real().to_f64(), self.imag().to_f64())
    }

    fn to_multiple(&self, digits: u32) -> MpComplex {
        MpComplex::with_val(digits_to_bits(digits), self)
    }

    fn precision(&self) -> u32 {
        bits_to_digits(self.prec().0)
    }

    fn set_precision(&mut self, digits: u32) {
        self.set_prec(digits_to_bits(digits));
    }

    fn abs(&self) -> f64 {
        Float::with_val(self.prec().0, self.abs_ref()).to_f64()
    }

    fn log10_abs(&self) -> f64 {
        Float::with_val(self.prec().0, self.abs_ref()).log10().to_f64()
    }

    fn is_exact_zero(&self) -> bool {
        self.real().is_zero() && self.imag().is_zero()
    }

    fn sqrt(&self) -> Self {
        MpComplex::sqrt(self.clone())
    }

    fn sin(&self) -> Self {
        MpComplex::sin(self.clone())
    }

    fn cos(&self) -> Self {
        MpComplex::cos(self.clone())
    }

    fn tan(&self) -> Self {
        MpComplex::tan(self.clone())
    }

    fn exp(&self) -> Self {
        MpComplex::exp(self.clone())
    }

    fn ln(&self) -> Self {
        MpComplex::ln(self.clone())
    }

    fn asin(&self) -> Self {
        MpComplex::asin(self.clone())
    }

    fn acos(&self) -> Self {
        MpComplex::acos(self.clone())
    }

    fn atan(&self) -> Self {
        MpComplex::atan(self.clone())
    }

    fn powi(&self, exponent: i32) -> Self {
        Pow::pow(self.clone(), exponent)
    }

    fn pow(&self, exponent: &Self) -> Self {
        Pow::pow(self.clone(), exponent)
    }

    fn epsilon_log10(digits: u32) -> f64 {
        (1.0 - digits_to_bits(digits) as f64) * std::f64::consts::LOG10_2
    }

    fn dummy_precision_log10(digits: u32) -> f64 {
        Self::epsilon_log10(digits) + 3.0
    }

    fn read(slot: &ValueSlot) -> Self {
        slot.multiple.clone()
    }

    fn write(self, slot: &mut ValueSlot) {
        slot.multiple = self;
    }

    fn into_cached(self) -> CachedValue {
        CachedValue::Multiple(self)
    }

    fn from_cached(value: &CachedValue) -> Option<Self> {
        match value {
            CachedValue::Multiple(v) => Some(v.clone()),
            CachedValue::Double(_) => None,
        }
    }
}

/// Converts a value between numeric types, landing at `digits`.
pub fn convert<T: Scalar, U: Scalar>(value: &T, digits: u32) -> U {
    if T::IS_FIXED || U::IS_FIXED {
        let z = value.to_complex64();
        return U::from_f64(z.re, z.im, digits);
    }
    U::from_multiple(&value.to_multiple(digits), digits)
}

/// Converts every entry of a vector between numeric types.
pub fn convert_vector<T: Scalar, U: Scalar>(values: &DVector<T>, digits: u32) -> DVector<U> {
    DVector::from_iterator(values.len(), values.iter().map(|v| convert::<T, U>(v, digits)))
}

/// Changes the precision of every entry in place.
pub fn set_vector_precision<T: Scalar>(values: &mut DVector<T>, digits: u32) {
    for v in values.iter_mut() {
        v.set_precision(digits);
    }
}

/// Parses a decimal literal such as `-12.5e-3` into an exact rational.
pub fn parse_rational(text: &str) -> Result<Rational> {
    let invalid = || Error::InvalidLiteral(text.to_string());
    let trimmed = text.trim();
    let (negative, body) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let (mantissa, exponent) = match body.find(|c| c == 'e' || c == 'E') {
        Some(pos) => {
            let exp: i64 = body[pos + 1..].parse().map_err(|_| invalid())?;
            (&body[..pos], exp)
        }
        None => (body, 0),
    };
    let (int_part, frac_part) = match mantissa.find('.') {
        Some(pos) => (&mantissa[..pos], &mantissa[pos + 1..]),
        None => (mantissa, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return Err(invalid());
    }
    if !int_part.chars().chain(frac_part.chars()).all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }

    let digits = format!("{}{}", int_part, frac_part);
    let mut numerator = Integer::from_str_radix(&digits, 10).map_err(|_| invalid())?;
    if negative {
        numerator = -numerator;
    }
    let scale = exponent.checked_sub(frac_part.len() as i64).ok_or_else(invalid)?;
    let magnitude = u32::try_from(scale.unsigned_abs()).map_err(|_| invalid())?;
    let power = Integer::from(Integer::u_pow_u(10, magnitude));
    Ok(if scale >= 0 {
        Rational::from(numerator * power)
    } else {
        Rational::from((numerator, power))
    })
}

/// Builds a multiple precision complex from decimal text without passing through `f64`.
pub fn mp_from_str(re: &str, im: &str, digits: u32) -> Result<MpComplex> {
    let re = parse_rational(re)?;
    let im = parse_rational(im)?;
    Ok(MpComplex::from_rational(&re, &im, digits))
}

/// Random complex number of modulus one.
pub fn random_unit<T: Scalar, R: Rng + ?Sized>(rng: &mut R, digits: u32) -> T {
    let angle = rng.gen::<f64>() * std::f64::consts::TAU;
    T::from_f64(angle.cos(), angle.sin(), digits)
}

/// Vector of random unit complex numbers.
pub fn random_units<T: Scalar, R: Rng + ?Sized>(rng: &mut R, len: usize, digits: u32) -> DVector<T> {
    DVector::from_iterator(len, (0..len).map(|_| random_unit::<T, R>(rng, digits)))
}

/// Exact random rational in `[-1, 1]` with a power-of-two denominator.
pub fn random_rational<R: Rng + ?Sized>(rng: &mut R) -> Rational {
    const DENOMINATOR: i64 = 1 << 52;
    let numerator = rng.gen_range(-DENOMINATOR..=DENOMINATOR);
    Rational::from((numerator, DENOMINATOR))
}

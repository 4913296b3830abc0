//! Exact decimal running sum.
//!
//! Counter statistics are summed over millions of additions. Summing `f64`
//! values directly drifts, so each value is converted to its shortest decimal
//! representation and accumulated as an arbitrary precision integer mantissa
//! with a decimal scale.

use std::cmp::Ordering;
use std::fmt;
use std::ops::AddAssign;

use num_bigint::{BigInt, Sign};
use serde::{Serialize, Serializer};

use super::StatisticsError;

/// `mantissa * 10^-scale`, exact.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PreciseSum {
    mantissa: BigInt,
    scale: u32,
}

impl PreciseSum {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a finite value. The value is taken at its shortest round-trip
    /// decimal form, so `0.1` adds exactly one tenth.
    pub fn add(&mut self, value: f64) -> Result<(), StatisticsError> {
        if !value.is_finite() {
            return Err(StatisticsError::NonFinite(value));
        }
        let (mantissa, scale) = decimal_parts(value);
        self.add_scaled(mantissa, scale);
        Ok(())
    }

    /// Add an integer amount.
    pub fn add_count(&mut self, amount: u64) {
        self.add_scaled(BigInt::from(amount), 0);
    }

    fn add_scaled(&mut self, mut mantissa: BigInt, scale: u32) {
        match scale.cmp(&self.scale) {
            Ordering::Greater => {
                self.mantissa *= pow10(scale - self.scale);
                self.scale = scale;
            }
            Ordering::Less => mantissa *= pow10(self.scale - scale),
            Ordering::Equal => {}
        }
        self.mantissa += mantissa;
    }

    pub fn is_zero(&self) -> bool {
        self.mantissa.sign() == Sign::NoSign
    }

    /// Nearest `f64` to the exact sum.
    pub fn to_f64(&self) -> f64 {
        // The decimal string is exact, parsing it rounds once.
        self.to_string().parse().unwrap_or(f64::NAN)
    }
}

impl AddAssign<&PreciseSum> for PreciseSum {
    fn add_assign(&mut self, other: &PreciseSum) {
        self.add_scaled(other.mantissa.clone(), other.scale);
    }
}

impl fmt::Display for PreciseSum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.mantissa.magnitude().to_string();
        let sign = if self.mantissa.sign() == Sign::Minus { "-" } else { "" };
        let scale = self.scale as usize;
        if scale == 0 {
            return write!(f, "{}{}", sign, digits);
        }
        let padded = format!("{:0>width$}", digits, width = scale + 1);
        let (integer, fraction) = padded.split_at(padded.len() - scale);
        write!(f, "{}{}.{}", sign, integer, fraction)
    }
}

impl Serialize for PreciseSum {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.to_f64())
    }
}

fn pow10(exponent: u32) -> BigInt {
    BigInt::from(10u32).pow(exponent)
}

/// Split a finite value into a decimal integer mantissa and scale.
fn decimal_parts(value: f64) -> (BigInt, u32) {
    // `Display` for f64 prints the shortest round-trip form without exponent.
    let text = value.to_string();
    let (negative, unsigned) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.as_str()),
    };
    let (integer, fraction) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    let fraction = fraction.trim_end_matches('0');

    let digits = format!("{}{}", integer, fraction);
    let magnitude = digits
        .bytes()
        .fold(BigInt::default(), |acc, digit| acc * 10u32 + u32::from(digit - b'0'));
    let mantissa = if negative { -magnitude } else { magnitude };
    (mantissa, fraction.len() as u32)
}

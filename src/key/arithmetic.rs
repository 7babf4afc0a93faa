use std::cmp::Ordering;
use std::iter;
use crate::core::config::Config;
use crate::core::error::{Error, ErrorKind, Result};
use crate::key::sort_key::SortKey;

/// Fixed-radix arithmetic over `SortKey` digit strings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeySpace {
    radix: u32,
    initial_key_length: usize,
    growth_step: usize,
}

impl KeySpace {
    pub fn new(radix: u32, initial_key_length: usize, growth_step: usize) -> Result<Self> {
        if !(2..=1 << 16).contains(&radix) {
            return Err(Error::new(
                ErrorKind::InvalidArgument,
                format!("radix {} outside 2..=65536", radix),
            ));
        }
        if initial_key_length == 0 || growth_step == 0 {
            return Err(Error::new(
                ErrorKind::InvalidArgument,
                "key length and growth step must be positive",
            ));
        }
        Ok(KeySpace { radix, initial_key_length, growth_step })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.radix, config.initial_key_length, config.saturation_growth_step)
    }

    pub fn radix(&self) -> u32 {
        self.radix
    }

    pub fn initial_key_length(&self) -> usize {
        self.initial_key_length
    }

    pub fn growth_step(&self) -> usize {
        self.growth_step
    }

    pub fn max_digit(&self) -> u16 {
        (self.radix - 1) as u16
    }

    pub fn min_key(&self, len: usize) -> SortKey {
        SortKey::zero(len)
    }

    pub fn max_key(&self, len: usize) -> SortKey {
        SortKey::from_digits(vec![self.max_digit(); len])
    }

    /// Rejects keys carrying digits this radix cannot represent
    pub fn check(&self, key: &SortKey) -> Result<()> {
        match key.digits().iter().find(|&&d| u32::from(d) >= self.radix) {
            Some(digit) => Err(Error::new(
                ErrorKind::InvalidArgument,
                format!("digit {} of key {} exceeds radix {}", digit, key, self.radix),
            )),
            None => Ok(()),
        }
    }

    /// Key strictly between `pred` and `succ`, growing precision on saturation.
    ///
    /// An absent bound stands for the minimum or maximum key of the other bound's
    /// length. Equal bounds return `pred` unchanged so equal values share a key.
    pub fn average(&self, pred: Option<&SortKey>, succ: Option<&SortKey>) -> Result<SortKey> {
        let max = self.max_digit();
        let (mut low, mut high, open_above) = match (pred, succ) {
            (None, None) => (
                vec![0; self.initial_key_length],
                vec![max; self.initial_key_length],
                true,
            ),
            (Some(p), None) => {
                self.check(p)?;
                (p.digits().to_vec(), vec![max; p.len()], true)
            }
            (None, Some(s)) => {
                self.check(s)?;
                (vec![0; s.len()], s.digits().to_vec(), false)
            }
            (Some(p), Some(s)) => {
                self.check(p)?;
                self.check(s)?;
                let len = p.len().max(s.len());
                (padded(p.digits(), len, 0), padded(s.digits(), len, 0), false)
            }
        };

        match low.cmp(&high) {
            Ordering::Greater => {
                return Err(Error::new(
                    ErrorKind::InvalidArgument,
                    format!(
                        "predecessor {} sorts after successor {}",
                        SortKey::from_digits(low),
                        SortKey::from_digits(high)
                    ),
                ));
            }
            Ordering::Equal if !open_above => {
                return Ok(pred.cloned().unwrap_or_else(|| SortKey::from_digits(low)));
            }
            _ => {}
        }

        loop {
            let mean = self.mean(&low, &high);
            if mean != low {
                return Ok(SortKey::from_digits(mean));
            }
            // Saturated: no key fits between the bounds at this precision
            low.extend(iter::repeat(0).take(self.growth_step));
            let fill = if open_above { max } else { 0 };
            high.extend(iter::repeat(fill).take(self.growth_step));
        }
    }

    /// Floor of `key / 2`; a non-zero key never halves to zero
    pub fn half(&self, key: &SortKey) -> Result<SortKey> {
        self.check(key)?;
        let mut digits = key.digits().to_vec();
        loop {
            let halved = self.halve(&digits);
            if key.is_zero() || halved.iter().any(|&d| d != 0) {
                return Ok(SortKey::from_digits(halved));
            }
            digits.extend(iter::repeat(0).take(self.growth_step));
        }
    }

    pub fn add(&self, a: &SortKey, b: &SortKey) -> Result<SortKey> {
        self.check(a)?;
        self.check(b)?;
        let len = a.len().max(b.len());
        let (sum, carry) = self.sum(&padded(a.digits(), len, 0), &padded(b.digits(), len, 0));
        if carry != 0 {
            return Err(Error::new(
                ErrorKind::InvalidState,
                format!("sort key overflow adding {} and {}", a, b),
            ));
        }
        Ok(SortKey::from_digits(sum))
    }

    fn sum(&self, a: &[u16], b: &[u16]) -> (Vec<u16>, u64) {
        let radix = u64::from(self.radix);
        let mut out = vec![0u16; a.len()];
        let mut carry = 0u64;
        for i in (0..a.len()).rev() {
            let s = u64::from(a[i]) + u64::from(b[i]) + carry;
            out[i] = (s % radix) as u16;
            carry = s / radix;
        }
        (out, carry)
    }

    fn mean(&self, a: &[u16], b: &[u16]) -> Vec<u16> {
        let (sum, carry) = self.sum(a, b);
        self.halve_with_carry(&sum, carry)
    }

    fn halve(&self, digits: &[u16]) -> Vec<u16> {
        self.halve_with_carry(digits, 0)
    }

    // Long division by two; `carry` is the overflow digit above the most significant one
    fn halve_with_carry(&self, digits: &[u16], carry: u64) -> Vec<u16> {
        let radix = u64::from(self.radix);
        let mut rem = carry;
        digits
            .iter()
            .map(|&d| {
                let cur = rem * radix + u64::from(d);
                rem = cur % 2;
                (cur / 2) as u16
            })
            .collect()
    }
}

fn padded(digits: &[u16], len: usize, fill: u16) -> Vec<u16> {
    let mut out = digits.to_vec();
    out.resize(len, fill);
    out
}

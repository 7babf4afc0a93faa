use std::fmt;
use serde::{Deserialize, Serialize};
use crate::core::error::{Error, ErrorKind, Result};

/// Order-preserving digit string, most significant digit first.
///
/// A key reads as the fraction `0.d1 d2 d3 ...` in the radix of the `KeySpace`
/// that produced it. Derived `Ord` is digit-wise lexicographic, which matches the
/// numeric order of the fractions for every key the arithmetic hands out.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SortKey {
    digits: Vec<u16>,
}

impl SortKey {
    pub fn from_digits(digits: Vec<u16>) -> Self {
        SortKey { digits }
    }

    pub fn zero(len: usize) -> Self {
        SortKey { digits: vec![0; len] }
    }

    pub fn digits(&self) -> &[u16] {
        &self.digits
    }

    pub fn len(&self) -> usize {
        self.digits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.digits.is_empty()
    }

    pub fn is_zero(&self) -> bool {
        self.digits.iter().all(|&d| d == 0)
    }

    /// Two big-endian bytes per digit; byte order equals key order
    pub fn to_bytes(&self) -> Vec<u8> {
        self.digits.iter().flat_map(|d| d.to_be_bytes()).collect()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() % 2 != 0 {
            return Err(Error::new(
                ErrorKind::Parse,
                format!("sort key encoding has odd length {}", bytes.len()),
            ));
        }
        let digits = bytes
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        Ok(SortKey { digits })
    }

    pub fn to_hex(&self) -> String {
        self.digits.iter().map(|d| format!("{:04x}", d)).collect()
    }

    pub fn from_hex(hex: &str) -> Result<Self> {
        if hex.len() % 4 != 0 || !hex.is_ascii() {
            return Err(Error::new(ErrorKind::Parse, format!("malformed hex sort key '{}'", hex)));
        }
        let mut digits = Vec::with_capacity(hex.len() / 4);
        for start in (0..hex.len()).step_by(4) {
            let digit = u16::from_str_radix(&hex[start..start + 4], 16).map_err(|e| {
                Error::new(ErrorKind::Parse, format!("malformed hex sort key '{}': {}", hex, e))
            })?;
            digits.push(digit);
        }
        Ok(SortKey { digits })
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl From<Vec<u16>> for SortKey {
    fn from(digits: Vec<u16>) -> Self {
        SortKey { digits }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_order_matches_key_order() {
        let a = SortKey::from_digits(vec![1, 0xff00]);
        let b = SortKey::from_digits(vec![2, 0x0001]);
        assert!(a < b);
        assert!(a.to_bytes() < b.to_bytes());
        assert_eq!(SortKey::from_bytes(&b.to_bytes()).unwrap(), b);
    }

    #[test]
    fn hex_form_parses_back() {
        let key = SortKey::from_digits(vec![0, 0xabcd, 7]);
        assert_eq!(key.to_hex(), "0000abcd0007");
        assert_eq!(SortKey::from_hex("0000abcd0007").unwrap(), key);
        assert!(SortKey::from_hex("abc").is_err());
    }

    #[test]
    fn longer_key_sorts_after_its_prefix() {
        let short = SortKey::from_digits(vec![5]);
        let long = SortKey::from_digits(vec![5, 1]);
        assert!(short < long);
    }
}

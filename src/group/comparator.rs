use std::cmp::Ordering;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::FieldValue;

/// Turns a stored source value into comparable plaintext.
///
/// Implementations own decryption; the crate never sees key material.
pub trait Comparator: Send + Sync {
    fn decrypt(&self, raw: &FieldValue) -> Result<String>;

    fn compare(&self, a: &str, b: &str) -> Ordering {
        a.cmp(b)
    }
}

impl<F> Comparator for F
where
    F: Fn(&FieldValue) -> Result<String> + Send + Sync,
{
    fn decrypt(&self, raw: &FieldValue) -> Result<String> {
        self(raw)
    }
}

/// Source values stored unencrypted
pub struct PlainText;

impl Comparator for PlainText {
    fn decrypt(&self, raw: &FieldValue) -> Result<String> {
        match raw {
            FieldValue::Null => Ok(String::new()),
            FieldValue::Text(text) => Ok(text.clone()),
            FieldValue::Number(n) => Ok(n.to_string()),
            FieldValue::Bytes(bytes) => String::from_utf8(bytes.clone()).map_err(|e| {
                Error::new(ErrorKind::Decrypt, format!("source bytes are not UTF-8: {}", e))
            }),
            FieldValue::Key(_) => Err(Error::new(
                ErrorKind::Decrypt,
                "source field holds a sort key",
            )),
        }
    }
}

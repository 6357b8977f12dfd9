//! Quoting helpers shared by the dialect codecs.

use std::fmt::Write;

/// Wraps `identifier` in `quote`, doubling any embedded quote character.
#[must_use]
pub fn quote_identifier(identifier: &str, quote: char) -> String {
    let mut escaped = String::with_capacity(identifier.len() + 2);
    escaped.push(quote);
    for ch in identifier.chars() {
        if ch == quote {
            escaped.push(quote);
        }
        escaped.push(ch);
    }
    escaped.push(quote);
    escaped
}

/// Wraps `text` in single quotes, doubling embedded single quotes.
#[must_use]
pub fn quote_string(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

/// Uppercase hex encoding of `bytes`.
#[must_use]
pub fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .fold(String::with_capacity(bytes.len() * 2), |mut out, b| {
            let _ = write!(out, "{b:02X}");
            out
        })
}

/// Renders a finite float so that it reads back as the same value.
///
/// Returns `None` for NaN and infinities.
#[must_use]
pub fn float_literal(value: f64) -> Option<String> {
    value.is_finite().then(|| format!("{value:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_identifier_doubles_quotes() {
        assert_eq!(quote_identifier("users", '"'), "\"users\"");
        assert_eq!(quote_identifier("we\"ird", '"'), "\"we\"\"ird\"");
        assert_eq!(quote_identifier("a`b", '`'), "`a``b`");
        assert_eq!(quote_identifier("", '`'), "``");
    }

    #[test]
    fn test_quote_string() {
        assert_eq!(quote_string("O'Brien"), "'O''Brien'");
        assert_eq!(quote_string(""), "''");
    }

    #[test]
    fn test_hex() {
        assert_eq!(hex(&[0xde, 0xad, 0x01]), "DEAD01");
        assert_eq!(hex(&[]), "");
    }

    #[test]
    fn test_float_literal() {
        assert_eq!(float_literal(1.0).as_deref(), Some("1.0"));
        assert_eq!(float_literal(0.1).as_deref(), Some("0.1"));
        assert_eq!(float_literal(f64::NAN), None);
        assert_eq!(float_literal(f64::NEG_INFINITY), None);
    }
}

//! Integer literal decoding.
//!
//! Two families are accepted:
//!
//! * Verilog style: `[width]'[s][radix]digits`, where width is a decimal
//!   number, `XLEN` or `MXLEN`, `s` marks a signed literal and radix is one of
//!   `b o d h` (decimal when absent).
//! * C style: `0x..`, `0b..`, leading-zero octal and plain decimal, each with
//!   an optional trailing `s`.
//!
//! Underscores are digit separators in both families.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LiteralWidth {
    /// Width written in the literal (`8'hff`).
    Explicit(u32),
    /// `XLEN'...` / `MXLEN'...`, resolved against the configuration.
    Xlen,
    /// No width given: the smallest width that holds the value.
    Minimal(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Literal {
    /// Unsigned digits as written; sign interpretation happens once the
    /// width is known.
    pub magnitude: u128,
    pub width: LiteralWidth,
    pub signed: bool,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LiteralError {
    #[error("literal width must be a positive integer, found '{0}'")]
    BadWidth(String),

    #[error("'{digits}' is not a valid base-{radix} number")]
    BadDigits { digits: String, radix: u32 },

    #[error("literal does not fit in 128 bits")]
    Overflow,
}

/// Number of bits needed to hold `value` (1 for zero).
pub fn bit_length(value: u128) -> u32 {
    (128 - value.leading_zeros()).max(1)
}

pub fn parse_int_literal(text: &str) -> Result<Literal, LiteralError> {
    let text: String = text.chars().filter(|&c| c != '_').collect();

    match text.split_once('\'') {
        Some((width, body)) => parse_verilog(width, body),
        None => parse_c_style(&text),
    }
}

fn parse_verilog(width: &str, body: &str) -> Result<Literal, LiteralError> {
    let (signed, body) = match body.strip_prefix('s') {
        Some(rest) => (true, rest),
        None => (false, body),
    };

    let (radix, digits) = match body.chars().next() {
        Some('b' | 'B') => (2, &body[1..]),
        Some('o' | 'O') => (8, &body[1..]),
        Some('d' | 'D') => (10, &body[1..]),
        Some('h' | 'H') => (16, &body[1..]),
        _ => (10, body),
    };

    let magnitude = parse_digits(digits, radix)?;

    let width = match width {
        "" => LiteralWidth::Minimal(minimal_width(magnitude, signed)),
        "XLEN" | "MXLEN" => LiteralWidth::Xlen,
        digits => match digits.parse::<u32>() {
            Ok(w) if w > 0 => LiteralWidth::Explicit(w),
            _ => return Err(LiteralError::BadWidth(digits.to_string())),
        },
    };

    Ok(Literal {
        magnitude,
        width,
        signed,
    })
}

fn parse_c_style(text: &str) -> Result<Literal, LiteralError> {
    let (signed, text) = match text.strip_suffix('s') {
        Some(rest) => (true, rest),
        None => (false, text),
    };

    let (radix, digits) = if let Some(rest) = text.strip_prefix("0x").or(text.strip_prefix("0X")) {
        (16, rest)
    } else if let Some(rest) = text.strip_prefix("0b").or(text.strip_prefix("0B")) {
        (2, rest)
    } else if text.len() > 1 && text.starts_with('0') {
        (8, &text[1..])
    } else {
        (10, text)
    };

    let magnitude = parse_digits(digits, radix)?;

    Ok(Literal {
        magnitude,
        width: LiteralWidth::Minimal(minimal_width(magnitude, signed)),
        signed,
    })
}

fn parse_digits(digits: &str, radix: u32) -> Result<u128, LiteralError> {
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return Err(LiteralError::BadDigits {
            digits: digits.to_string(),
            radix,
        });
    }
    u128::from_str_radix(digits, radix).map_err(|_| LiteralError::Overflow)
}

// A signed literal without an explicit width keeps its value positive.
fn minimal_width(magnitude: u128, signed: bool) -> u32 {
    bit_length(magnitude) + u32::from(signed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lit(text: &str) -> Literal {
        parse_int_literal(text).expect("literal")
    }

    #[test]
    fn verilog_without_width_uses_minimal_width() {
        let l = lit("'d63");
        assert_eq!(l.magnitude, 63);
        assert_eq!(l.width, LiteralWidth::Minimal(6));
        assert!(!l.signed);
    }

    #[test]
    fn verilog_with_width_and_radix() {
        let l = lit("4'hf");
        assert_eq!(l.magnitude, 15);
        assert_eq!(l.width, LiteralWidth::Explicit(4));
        assert!(!l.signed);

        let l = lit("8'b1010_0101");
        assert_eq!(l.magnitude, 0xa5);
        assert_eq!(l.width, LiteralWidth::Explicit(8));
    }

    #[test]
    fn verilog_signed_and_xlen() {
        let l = lit("4'sd13");
        assert_eq!(l.magnitude, 13);
        assert!(l.signed);

        assert_eq!(lit("XLEN'1").width, LiteralWidth::Xlen);
        assert_eq!(lit("MXLEN'hff").width, LiteralWidth::Xlen);
    }

    #[test]
    fn verilog_default_radix_is_decimal() {
        assert_eq!(lit("'15").magnitude, 15);
        assert_eq!(lit("'o17").magnitude, 15);
    }

    #[test]
    fn c_style_radixes() {
        assert_eq!(lit("0x1F").magnitude, 31);
        assert_eq!(lit("0x1F").width, LiteralWidth::Minimal(5));
        assert_eq!(lit("0b101").magnitude, 5);
        assert_eq!(lit("017").magnitude, 15);
        assert_eq!(lit("1_000").magnitude, 1000);
    }

    #[test]
    fn zero_has_width_one() {
        assert_eq!(lit("0").width, LiteralWidth::Minimal(1));
        assert_eq!(lit("'d0").width, LiteralWidth::Minimal(1));
    }

    #[test]
    fn signed_c_literal_gains_a_sign_bit() {
        let l = lit("5s");
        assert!(l.signed);
        assert_eq!(l.width, LiteralWidth::Minimal(4));
    }

    #[test]
    fn malformed_literals_are_rejected() {
        assert!(matches!(
            parse_int_literal("09"),
            Err(LiteralError::BadDigits { radix: 8, .. })
        ));
        assert!(matches!(
            parse_int_literal("0'd1"),
            Err(LiteralError::BadWidth(_))
        ));
    }
}

//! Compile-time values and the bit-accurate helpers the evaluator uses.
//!
//! Integers are kept as their mathematical value in an `i128`; the owning
//! type's width and signedness decide how a result is wrapped. Widths above
//! [`MAX_EVAL_WIDTH`] are legal in types but never evaluated.

use std::fmt;

/// Widest bit vector the evaluator folds. Wider values are reported as not
/// known at compile time.
pub const MAX_EVAL_WIDTH: u32 = 127;

#[derive(Clone, PartialEq, Eq, Hash)]
pub enum Value {
    Int(i128),
    Bool(bool),
    String(String),
    Array(Vec<Value>),
    Tuple(Vec<Value>),
    /// Result of `return;` in a function without return types.
    Void,
}

impl Value {
    pub fn as_int(&self) -> Option<i128> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{i} : Bits"),
            Value::Bool(b) => write!(f, "{b} : Boolean"),
            Value::String(s) => write!(f, "{s:?} : String"),
            Value::Array(items) => write!(f, "{items:?} : Array"),
            Value::Tuple(items) => write!(f, "{items:?} : Tuple"),
            Value::Void => write!(f, "void"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{i}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::String(s) => write!(f, "\"{s}\""),
            Value::Array(items) | Value::Tuple(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Void => write!(f, "void"),
        }
    }
}

/// All-ones pattern of `width` bits.
pub fn mask(width: u32) -> u128 {
    if width >= 128 {
        u128::MAX
    } else {
        (1u128 << width) - 1
    }
}

/// Two's-complement bit pattern of `value` in `width` bits.
pub fn to_bits(value: i128, width: u32) -> u128 {
    (value as u128) & mask(width)
}

/// Reads a `width`-bit pattern back as a number.
pub fn from_bits(bits: u128, width: u32, signed: bool) -> i128 {
    let bits = bits & mask(width);
    if signed && width > 0 && (bits >> (width - 1)) & 1 == 1 {
        (bits as i128).wrapping_sub(1i128.wrapping_shl(width))
    } else {
        bits as i128
    }
}

/// Wraps `value` into the range of a `width`-bit (un)signed integer.
pub fn truncate(value: i128, width: u32, signed: bool) -> i128 {
    from_bits(to_bits(value, width), width, signed)
}

/// Arithmetic right shift of a `width`-bit pattern: vacated high bits are
/// filled with the pattern's most significant bit.
pub fn shift_right_arithmetic(bits: u128, width: u32, amount: u32) -> u128 {
    let bits = bits & mask(width);
    let negative = width > 0 && (bits >> (width - 1)) & 1 == 1;
    if amount >= width {
        return if negative { mask(width) } else { 0 };
    }
    let shifted = bits >> amount;
    if negative {
        shifted | (mask(width) & !(mask(width) >> amount))
    } else {
        shifted
    }
}

/// Extracts bits `msb..=lsb` of a pattern.
pub fn extract(bits: u128, msb: u32, lsb: u32) -> u128 {
    if lsb >= 128 {
        return 0;
    }
    (bits >> lsb) & mask(msb - lsb + 1)
}

/// Replaces bits `msb..=lsb` of `bits` with the low bits of `field`.
pub fn insert(bits: u128, msb: u32, lsb: u32, field: u128) -> u128 {
    let field_mask = mask(msb - lsb + 1) << lsb;
    (bits & !field_mask) | ((field << lsb) & field_mask)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_wraps_unsigned_and_signed() {
        assert_eq!(truncate(17, 4, false), 1);
        assert_eq!(truncate(13, 4, true), -3);
        assert_eq!(truncate(-1, 8, false), 255);
        assert_eq!(truncate(-1, 8, true), -1);
        assert_eq!(truncate(128, 8, true), -128);
    }

    #[test]
    fn negation_pattern_matches_twos_complement() {
        assert_eq!(to_bits(-3, 4), 0b1101);
        assert_eq!(to_bits(-(5i128), 8), 0xfb);
    }

    #[test]
    fn arithmetic_shift_propagates_sign() {
        assert_eq!(shift_right_arithmetic(0b1000_0000, 8, 3), 0b1111_0000);
        assert_eq!(shift_right_arithmetic(0b0100_0000, 8, 3), 0b0000_1000);
        assert_eq!(shift_right_arithmetic(0b1000_0000, 8, 12), 0xff);
        assert_eq!(shift_right_arithmetic(0b0100_0000, 8, 12), 0);
    }

    #[test]
    fn extract_and_insert_fields() {
        assert_eq!(extract(0xabcd, 11, 8), 0xb);
        assert_eq!(insert(0xabcd, 11, 8, 0x3), 0xa3cd);
        assert_eq!(insert(0, 0, 0, 0xff), 1);
    }
}

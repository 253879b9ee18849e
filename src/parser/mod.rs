pub mod error;
pub mod lower;
pub mod normalize;
pub mod parser;
pub mod raw;

// Re-export main types and functions
pub use self::error::ParserError;
pub use self::normalize::{is_normalized, normalize};
pub use self::parser::{parse_expression, parse_fragment, parse_isa, parse_raw, IdlParser, Rule};
pub use self::raw::{RawKind, RawNode};

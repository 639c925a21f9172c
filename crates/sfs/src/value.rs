//! SFS stack values.

use alloy_primitives::U256;
use std::fmt;

index_vec::define_index_type! {
    /// A unique identifier for a value in an SFS.
    pub struct ValueId = u32;
    DISPLAY_FORMAT = "v{}";
}

/// A value that can live on the stack.
///
/// Variables are either members of the source stack or the output of exactly one operation.
/// Literals are interned by numeric value, so two occurrences of the same constant share one
/// [`ValueId`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Value {
    /// A symbolic variable, e.g. `s(3)`.
    Var(String),
    /// An integer literal.
    Lit(U256),
}

impl Value {
    /// Returns true if this is a literal.
    #[must_use]
    pub const fn is_lit(&self) -> bool {
        matches!(self, Self::Lit(_))
    }

    /// Returns the literal value, if this is one.
    #[must_use]
    pub const fn as_lit(&self) -> Option<&U256> {
        match self {
            Self::Lit(v) => Some(v),
            Self::Var(_) => None,
        }
    }

    /// Parses a stack token: decimal or `0x`-prefixed numbers are literals, anything else is a
    /// variable name.
    pub(crate) fn from_token(token: &str) -> Self {
        let numeric = token.starts_with("0x") || token.bytes().all(|b| b.is_ascii_digit());
        match token.parse::<U256>() {
            Ok(v) if numeric && !token.is_empty() => Self::Lit(v),
            _ => Self::Var(token.to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Var(name) => f.write_str(name),
            Self::Lit(v) => write!(f, "{v}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_token() {
        assert_eq!(Value::from_token("s(0)"), Value::Var("s(0)".into()));
        assert_eq!(Value::from_token("42"), Value::Lit(U256::from(42)));
        assert_eq!(Value::from_token("0x1f"), Value::Lit(U256::from(31)));
        assert_eq!(Value::from_token(""), Value::Var(String::new()));
        assert_eq!(Value::from_token("0xzz"), Value::Var("0xzz".into()));
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Var("s(2)".into()).to_string(), "s(2)");
        assert_eq!(Value::Lit(U256::from(255)).to_string(), "255");
    }
}

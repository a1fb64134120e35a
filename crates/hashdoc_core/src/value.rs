//! Scalar boundary values.
//!
//! The store only ever holds strings; richer typing belongs to the
//! casting layer outside this crate. `Scalar` is that layer's boundary:
//! a tagged variant with an explicit [`CastKind`] descriptor per
//! attribute, resolved by the caller. Index-value normalization also
//! lives here because it is the one place the core cares about a value's
//! scalar shape.

/// Declared cast for an attribute, resolved at the casting boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastKind {
    /// Plain text, stored verbatim.
    Text,
    /// Signed integer.
    Integer,
    /// Floating point number.
    Float,
    /// Boolean, stored as `"1"` / `"0"`.
    Bool,
}

/// A typed attribute value at the casting boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    /// Plain text.
    Text(String),
    /// Signed integer.
    Integer(i64),
    /// Floating point number.
    Float(f64),
    /// Boolean.
    Bool(bool),
}

impl Scalar {
    /// Parses a stored string into a scalar under a declared cast.
    ///
    /// Returns `None` when the raw value does not parse as the declared
    /// kind. Booleans accept `"1"`/`"0"` and `"true"`/`"false"`.
    #[must_use]
    pub fn parse(raw: &str, cast: CastKind) -> Option<Self> {
        match cast {
            CastKind::Text => Some(Self::Text(raw.to_string())),
            CastKind::Integer => raw.parse().ok().map(Self::Integer),
            CastKind::Float => raw.parse().ok().map(Self::Float),
            CastKind::Bool => match raw {
                "1" | "true" => Some(Self::Bool(true)),
                "0" | "false" => Some(Self::Bool(false)),
                _ => None,
            },
        }
    }

    /// Renders the scalar into its stored string form.
    #[must_use]
    pub fn render(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Integer(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::Bool(true) => "1".to_string(),
            Self::Bool(false) => "0".to_string(),
        }
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<i64> for Scalar {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<bool> for Scalar {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

/// Normalizes a stored field value for index membership.
///
/// Empty strings are not indexable. Boolean spellings collapse to
/// `"1"`/`"0"` so values written through the casting boundary and values
/// written raw land in the same index set. Write-time indexing and
/// query-time index selection must both go through this function.
#[must_use]
pub fn index_value(raw: &str) -> Option<String> {
    match raw {
        "" => None,
        "true" => Some("1".to_string()),
        "false" => Some("0".to_string()),
        _ => Some(raw.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_render_round_trip() {
        let cases = [
            ("hello", CastKind::Text, "hello"),
            ("42", CastKind::Integer, "42"),
            ("-7", CastKind::Integer, "-7"),
            ("2.5", CastKind::Float, "2.5"),
            ("1", CastKind::Bool, "1"),
            ("0", CastKind::Bool, "0"),
        ];
        for (raw, cast, rendered) in cases {
            let scalar = Scalar::parse(raw, cast).unwrap();
            assert_eq!(scalar.render(), rendered, "raw {raw:?}");
        }
    }

    #[test]
    fn bool_accepts_both_spellings() {
        assert_eq!(Scalar::parse("true", CastKind::Bool), Some(Scalar::Bool(true)));
        assert_eq!(Scalar::parse("false", CastKind::Bool), Some(Scalar::Bool(false)));
        assert_eq!(Scalar::parse("yes", CastKind::Bool), None);
    }

    #[test]
    fn parse_rejects_wrong_kind() {
        assert_eq!(Scalar::parse("abc", CastKind::Integer), None);
        assert_eq!(Scalar::parse("1.2.3", CastKind::Float), None);
    }

    #[test]
    fn index_normalization() {
        assert_eq!(index_value(""), None);
        assert_eq!(index_value("true"), Some("1".to_string()));
        assert_eq!(index_value("false"), Some("0".to_string()));
        assert_eq!(index_value("1"), Some("1".to_string()));
        assert_eq!(index_value("pending"), Some("pending".to_string()));
    }
}

//! Literal grammar for setting values.
//!
//! A proposed value is first classified by its shape (`vec3(`, `vec2(`, or a
//! bare number) and then checked against the strict grammar for that kind.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Scalar,
    Vector2,
    Vector3,
}

impl ValueKind {
    /// Kind of a `uniform` declaration from its type token.
    pub fn from_uniform_type(ty: &str) -> Self {
        match ty {
            "vec2" => ValueKind::Vector2,
            "vec3" => ValueKind::Vector3,
            _ => ValueKind::Scalar,
        }
    }

    /// GLSL type token for vector kinds.
    pub fn glsl_type(self) -> Option<&'static str> {
        match self {
            ValueKind::Scalar => None,
            ValueKind::Vector2 => Some("vec2"),
            ValueKind::Vector3 => Some("vec3"),
        }
    }
}

static SCALAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?\d+$|^-?\d+\.\d+$").expect("scalar grammar"));

static VECTOR2: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^vec2\(\s*-?\d+\.\d+\s*,\s*-?\d+\.\d+\s*\)$").expect("vec2 grammar")
});

static VECTOR3: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^vec3\(\s*-?\d+\.\d+\s*,\s*-?\d+\.\d+\s*,\s*-?\d+\.\d+\s*\)$")
        .expect("vec3 grammar")
});

/// Kind suggested by the literal's shape, before validation.
pub fn classify(value: &str) -> ValueKind {
    if value.starts_with("vec3(") {
        ValueKind::Vector3
    } else if value.starts_with("vec2(") {
        ValueKind::Vector2
    } else {
        ValueKind::Scalar
    }
}

/// Classify and validate a proposed value.
///
/// Returns the trimmed value and its kind, or `None` when the literal does not
/// match the grammar of the kind its shape suggests.
pub fn validate(value: &str) -> Option<(&str, ValueKind)> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    let kind = classify(value);
    let grammar = match kind {
        ValueKind::Scalar => &*SCALAR,
        ValueKind::Vector2 => &*VECTOR2,
        ValueKind::Vector3 => &*VECTOR3,
    };
    grammar.is_match(value).then_some((value, kind))
}

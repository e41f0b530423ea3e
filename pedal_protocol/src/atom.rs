use serde::{Deserialize, Serialize};

/// Typed patch-property payload. The engine tags every value with `otype_`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "otype_")]
pub enum TypedValue {
    Path { value: String },
    String { value: String },
    Float { value: f64 },
    Int { value: i64 },
    Bool { value: bool },
    Blob { value: Vec<u8> },
}

impl TypedValue {
    pub fn path(value: impl Into<String>) -> Self {
        TypedValue::Path {
            value: value.into(),
        }
    }

    pub fn otype(&self) -> &'static str {
        match self {
            TypedValue::Path { .. } => "Path",
            TypedValue::String { .. } => "String",
            TypedValue::Float { .. } => "Float",
            TypedValue::Int { .. } => "Int",
            TypedValue::Bool { .. } => "Bool",
            TypedValue::Blob { .. } => "Blob",
        }
    }

    pub fn as_path(&self) -> Option<&str> {
        match self {
            TypedValue::Path { value } => Some(value),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_uses_otype_tag() {
        let json = serde_json::to_string(&TypedValue::path("/a/b.wav")).unwrap();
        assert_eq!(json, r#"{"otype_":"Path","value":"/a/b.wav"}"#);

        let parsed: TypedValue = serde_json::from_str(r#"{"otype_":"Float","value":0.5}"#).unwrap();
        assert_eq!(parsed, TypedValue::Float { value: 0.5 });
        assert_eq!(parsed.as_path(), None);
    }
}

//! Typed value data stored under a key.

use serde::{Deserialize, Serialize};

/// Display name conventionally used for a key's unnamed default value.
pub const DEFAULT_VALUE_LABEL: &str = "(Default)";

/// Data held by a single named value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ValueData {
    None,
    String(String),
    ExpandString(String),
    MultiString(Vec<String>),
    Binary(Vec<u8>),
    #[serde(rename = "dword")]
    DWord(u32),
    #[serde(rename = "qword")]
    QWord(u64),
}

impl ValueData {
    pub fn is_string(&self) -> bool {
        matches!(self, ValueData::String(_) | ValueData::ExpandString(_))
    }

    pub fn is_binary(&self) -> bool {
        matches!(self, ValueData::Binary(_))
    }

    /// Text view of the value; non-string data yields `None`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ValueData::String(s) | ValueData::ExpandString(s) => Some(s),
            _ => None,
        }
    }

    /// Lossy text rendering, empty for data with no textual form.
    pub fn as_string(&self) -> String {
        match self {
            ValueData::String(s) | ValueData::ExpandString(s) => s.clone(),
            ValueData::MultiString(items) => items.first().cloned().unwrap_or_default(),
            ValueData::DWord(n) => n.to_string(),
            ValueData::QWord(n) => n.to_string(),
            ValueData::None | ValueData::Binary(_) => String::new(),
        }
    }

    pub fn as_dword(&self) -> Option<u32> {
        match self {
            ValueData::DWord(n) => Some(*n),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            ValueData::None => "REG_NONE",
            ValueData::String(_) => "REG_SZ",
            ValueData::ExpandString(_) => "REG_EXPAND_SZ",
            ValueData::MultiString(_) => "REG_MULTI_SZ",
            ValueData::Binary(_) => "REG_BINARY",
            ValueData::DWord(_) => "REG_DWORD",
            ValueData::QWord(_) => "REG_QWORD",
        }
    }
}

/// A named value as returned by enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Value {
    /// Empty for the default value.
    pub name: String,
    #[serde(flatten)]
    pub data: ValueData,
}

impl Value {
    pub fn new(name: impl Into<String>, data: ValueData) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }
}

/// Map the display label of the default value back to the store's empty name.
pub fn store_value_name(name: &str) -> &str {
    if name == DEFAULT_VALUE_LABEL || name == "@" {
        ""
    } else {
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_views() {
        let v = ValueData::ExpandString("%WINDIR%\\x.exe".into());
        assert!(v.is_string());
        assert_eq!(v.as_str(), Some("%WINDIR%\\x.exe"));
        assert_eq!(ValueData::DWord(7).as_str(), None);
        assert_eq!(ValueData::DWord(7).as_string(), "7");
    }

    #[test]
    fn dword_view() {
        assert_eq!(ValueData::DWord(0).as_dword(), Some(0));
        assert_eq!(ValueData::String("0".into()).as_dword(), None);
    }

    #[test]
    fn default_label_maps_to_empty_name() {
        assert_eq!(store_value_name("(Default)"), "");
        assert_eq!(store_value_name("@"), "");
        assert_eq!(store_value_name("Debugger"), "Debugger");
    }

    #[test]
    fn value_serializes_with_tagged_data() {
        let value = Value::new("Count", ValueData::DWord(3));
        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(json, r#"{"name":"Count","type":"dword","data":3}"#);
    }
}

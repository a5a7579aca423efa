//! Local-control properties exposed over `esp_local_ctrl/control`.

use serde_json::Value;

use crate::protocol::messages::PropertyInfo;

/// Property may be read but not written.
pub const PROP_FLAG_READONLY: u32 = 1 << 0;

/// Name of the property holding the node configuration JSON.
pub const CONFIG_PROPERTY: &str = "config";
/// Name of the property holding the node parameters JSON.
pub const PARAMS_PROPERTY: &str = "params";

/// One property as reported by the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    pub index: u32,
    pub name: String,
    pub prop_type: u32,
    pub flags: u32,
    pub value: Vec<u8>,
}

impl Property {
    pub fn from_info(index: u32, info: &PropertyInfo) -> Self {
        Self {
            index,
            name: info.name.clone(),
            prop_type: info.r#type,
            flags: info.flags,
            value: info.value.clone(),
        }
    }

    pub fn is_readonly(&self) -> bool {
        self.flags & PROP_FLAG_READONLY != 0
    }

    /// Parses the value as JSON, falling back to a string.
    pub fn value_json(&self) -> Value {
        serde_json::from_slice(&self.value)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&self.value).into_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prop(flags: u32, value: &[u8]) -> Property {
        Property {
            index: 0,
            name: PARAMS_PROPERTY.into(),
            prop_type: 2,
            flags,
            value: value.to_vec(),
        }
    }

    #[test]
    fn test_readonly_flag_is_bit_zero() {
        assert!(prop(PROP_FLAG_READONLY, b"").is_readonly());
        assert!(!prop(0b10, b"").is_readonly());
    }

    #[test]
    fn test_value_json_parses_objects_and_falls_back_to_text() {
        assert_eq!(prop(0, br#"{"a":1}"#).value_json()["a"], 1);
        assert_eq!(prop(0, b"plain").value_json(), Value::String("plain".into()));
    }
}

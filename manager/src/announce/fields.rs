//! Case-insensitive access to loosely typed device payloads.

use serde_json::{Map, Value};
use std::collections::HashMap;

/// Key lookup built once per object; every key is lower-cased.
pub struct FieldLookup<'a> {
    fields: HashMap<String, &'a Value>,
}

impl<'a> FieldLookup<'a> {
    pub fn new(object: &'a Map<String, Value>) -> Self {
        let fields = object
            .iter()
            .map(|(key, value)| (key.to_ascii_lowercase(), value))
            .collect();
        Self { fields }
    }

    /// First key among `names` that is present, null included.
    pub fn present(&self, names: &[&str]) -> Option<&'a Value> {
        names
            .iter()
            .find_map(|name| self.fields.get(&name.to_ascii_lowercase()).copied())
    }

    /// Non-empty trimmed string; numbers are rendered.
    pub fn string(&self, names: &[&str]) -> Option<String> {
        names.iter().find_map(|name| {
            match self.fields.get(&name.to_ascii_lowercase()).copied() {
                Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
                Some(Value::Number(n)) => Some(n.to_string()),
                _ => None,
            }
        })
    }

    pub fn integer(&self, names: &[&str]) -> Option<i64> {
        names.iter().find_map(|name| {
            match self.fields.get(&name.to_ascii_lowercase()).copied() {
                Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
                Some(Value::String(s)) => s.trim().parse().ok(),
                _ => None,
            }
        })
    }

    pub fn boolean(&self, names: &[&str]) -> Option<bool> {
        names.iter().find_map(|name| {
            match self.fields.get(&name.to_ascii_lowercase()).copied() {
                Some(Value::Bool(b)) => Some(*b),
                Some(Value::Number(n)) => n.as_i64().map(|v| v != 0),
                Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
                    "true" | "yes" | "1" | "sa" => Some(true),
                    "false" | "no" | "0" | "nsa" => Some(false),
                    _ => None,
                },
                _ => None,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn lookup_ignores_case_and_honours_order() {
        let payload = json!({ "serialnumber": "", "SN": "GAM-1", "UPTIME": "42" });
        let object = payload.as_object().unwrap();
        let fields = FieldLookup::new(object);

        assert_eq!(fields.string(&["SerialNumber", "SN"]), Some("GAM-1".to_string()));
        assert_eq!(fields.integer(&["Uptime"]), Some(42));
        assert_eq!(fields.string(&["Missing"]), None);
    }

    #[test]
    fn present_keeps_explicit_null() {
        let payload = json!({ "Alarms": null, "ActiveAlarms": [] });
        let object = payload.as_object().unwrap();
        let fields = FieldLookup::new(object);

        assert_eq!(fields.present(&["alarms", "activeAlarms"]), Some(&Value::Null));
        assert_eq!(fields.present(&["activeAlarms", "alarms"]), Some(&json!([])));
        assert_eq!(fields.present(&["missing"]), None);
    }
}

//! Flat key/value bag handed to templates and the `<<token>>` merger.

use serde::Serialize;
use serde_json::{Map, Value};

/// Template variables for one dispatch.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RenderContext(Map<String, Value>);

impl RenderContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Copy every entry of `fields`, overwriting existing keys.
    pub fn extend(&mut self, fields: Map<String, Value>) {
        self.0.extend(fields);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }
}

impl From<Map<String, Value>> for RenderContext {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Text form of a context value. Null is empty, strings are unquoted,
/// everything else is compact JSON.
pub fn stringify(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn stringify_scalars() {
        assert_eq!(stringify(&Value::Null), "");
        assert_eq!(stringify(&json!("INV-1")), "INV-1");
        assert_eq!(stringify(&json!(250.5)), "250.5");
        assert_eq!(stringify(&json!(true)), "true");
        assert_eq!(stringify(&json!([1, 2])), "[1,2]");
    }

    #[test]
    fn extend_overwrites_existing_keys() {
        let mut ctx = RenderContext::new();
        ctx.insert("name", "Old");
        let mut fields = Map::new();
        fields.insert("name".to_string(), json!("New"));
        ctx.extend(fields);
        assert_eq!(ctx.get_str("name"), Some("New"));
        assert_eq!(serde_json::to_value(&ctx).unwrap(), json!({ "name": "New" }));
    }
}

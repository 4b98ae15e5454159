//! List expansion of reference tokens.
//!
//! When a configuration resource resolves to several entries under list
//! semantics, the resource is replaced by indexed clones and every property
//! value referencing the original name must become a list of values, one
//! per clone. The expander rewrites `${name/key}` (and `${name}`) tokens
//! accordingly and records which property keys it touched.

use serde_json::Value;

use crate::model::Properties;
use crate::resolve::reference::find_tokens;

pub struct PropertiesExpander {
    original: String,
    replacements: Vec<String>,
    expanded: Vec<String>,
}

impl PropertiesExpander {
    pub fn new(original: impl Into<String>, replacements: Vec<String>) -> Self {
        Self {
            original: original.into(),
            replacements,
            expanded: Vec::new(),
        }
    }

    /// Expand all values referencing the original name. Untouched values are
    /// returned as-is; an empty replacement list turns references into empty
    /// lists.
    pub fn expand(&mut self, properties: &Properties) -> Properties {
        properties
            .iter()
            .map(|(key, value)| {
                let (expanded, changed) = self.expand_value(value);
                if changed {
                    self.expanded.push(key.clone());
                }
                (key.clone(), expanded)
            })
            .collect()
    }

    /// Top-level property keys whose values were expanded.
    pub fn expanded_properties(&self) -> &[String] {
        &self.expanded
    }

    fn expand_value(&self, value: &Value) -> (Value, bool) {
        match value {
            Value::String(text) if self.references(text) => {
                let items = self
                    .replacements
                    .iter()
                    .map(|name| Value::String(self.rewrite(text, name)))
                    .collect();
                (Value::Array(items), true)
            }
            Value::Array(items) => {
                let mut changed = false;
                let expanded = items
                    .iter()
                    .map(|item| {
                        let (value, item_changed) = self.expand_value(item);
                        changed |= item_changed;
                        value
                    })
                    .collect();
                (Value::Array(expanded), changed)
            }
            Value::Object(map) => {
                let mut changed = false;
                let expanded = map
                    .iter()
                    .map(|(key, item)| {
                        let (value, item_changed) = self.expand_value(item);
                        changed |= item_changed;
                        (key.clone(), value)
                    })
                    .collect();
                (Value::Object(expanded), changed)
            }
            other => (other.clone(), false),
        }
    }

    fn references(&self, text: &str) -> bool {
        find_tokens(text)
            .iter()
            .any(|token| !token.escaped && token.dependency == self.original)
    }

    fn rewrite(&self, text: &str, replacement: &str) -> String {
        let mut output = String::new();
        let mut cursor = 0;
        for token in find_tokens(text) {
            if token.escaped || token.dependency != self.original {
                continue;
            }
            output.push_str(&text[cursor..token.start]);
            output.push_str("${");
            output.push_str(replacement);
            if !token.path.is_empty() {
                output.push('/');
                output.push_str(&token.key());
            }
            output.push('}');
            cursor = token.end;
        }
        output.push_str(&text[cursor..]);
        output
    }
}

//! Pass-through call arguments.
//!
//! Runs frequently need to forward caller-chosen knobs to every
//! transformation invocation without the engine interpreting them. `CallArgs`
//! is that envelope: a string-keyed map of JSON values handed by reference to
//! each `apply` call and to the clear hook.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Arbitrary arguments forwarded verbatim to every transform invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallArgs(BTreeMap<String, Value>);

impl CallArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, builder-style.
    pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.0.get(key).and_then(Value::as_i64)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.0.get(key).and_then(Value::as_bool)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_getters() {
        let args = CallArgs::new()
            .set("factor", 3)
            .set("dry_run", true)
            .set("label", "run-1");

        assert_eq!(args.get_i64("factor"), Some(3));
        assert_eq!(args.get_bool("dry_run"), Some(true));
        assert_eq!(args.get_str("label"), Some("run-1"));
        assert_eq!(args.get_i64("missing"), None);
        assert_eq!(args.len(), 3);
    }

    #[test]
    fn empty_by_default() {
        assert!(CallArgs::new().is_empty());
    }
}

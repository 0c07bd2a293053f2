//! Parsed arguments handed to a command action

use indexmap::IndexMap;
use serde_json::Value;

/// Positionals and options of one command invocation.
///
/// Positionals keep their declaration order. Option values are stored under
/// the option key (`--no-prerender` is stored as `prerender`), flags as
/// booleans, valued options as strings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandArgs {
    positionals: IndexMap<String, Vec<String>>,
    options: IndexMap<String, Value>,
}

impl CommandArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_arg(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.positionals
            .entry(name.into())
            .or_default()
            .push(value.into());
        self
    }

    pub fn with_flag(mut self, key: impl Into<String>, enabled: bool) -> Self {
        self.options.insert(key.into(), Value::Bool(enabled));
        self
    }

    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), Value::String(value.into()));
        self
    }

    pub fn with_values<I, S>(mut self, key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values = values
            .into_iter()
            .map(|v| Value::String(v.into()))
            .collect();
        self.options.insert(key.into(), Value::Array(values));
        self
    }

    /// First value of a positional
    pub fn arg(&self, name: &str) -> Option<&str> {
        self.positionals
            .get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// All values of a (variadic) positional
    pub fn args(&self, name: &str) -> &[String] {
        self.positionals
            .get(name)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Boolean option; absent options read as false
    pub fn flag(&self, key: &str) -> bool {
        match self.options.get(key) {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => s == "true",
            _ => false,
        }
    }

    pub fn value(&self, key: &str) -> Option<&str> {
        match self.options.get(key) {
            Some(Value::String(s)) => Some(s),
            Some(Value::Array(values)) => values.first().and_then(Value::as_str),
            _ => None,
        }
    }

    /// All values of a repeatable option
    pub fn values(&self, key: &str) -> Vec<String> {
        match self.options.get(key) {
            Some(Value::String(s)) => vec![s.clone()],
            Some(Value::Array(values)) => values
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn positionals(&self) -> &IndexMap<String, Vec<String>> {
        &self.positionals
    }

    pub fn options(&self) -> &IndexMap<String, Value> {
        &self.options
    }
}

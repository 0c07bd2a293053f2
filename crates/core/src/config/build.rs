//! The build configuration value threaded through chain callbacks
//!
//! [`BuildConfig`] is an opaque JSON object with a small builder-style
//! mutation API. The core never interprets it; the bundler does.

use std::path::Path;

use serde::Serialize;
use serde_json::{Map, Value, json};

use super::merge::deep_merge;
use crate::options::HookOptions;

/// Extensions resolved by default, in lookup order
pub const RESOLVE_EXTENSIONS: &[&str] = &[
    ".mjs", ".js", ".jsx", ".ts", ".tsx", ".json", ".less", ".pcss", ".scss", ".sass", ".styl",
    ".css", ".wasm",
];

/// Mutable build configuration
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct BuildConfig {
    value: Value,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            value: Value::Object(Map::new()),
        }
    }
}

impl From<Value> for BuildConfig {
    fn from(value: Value) -> Self {
        Self::from_value(value)
    }
}

impl BuildConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps a JSON value. Non-object values become an empty configuration.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(_) => Self { value },
            _ => Self::default(),
        }
    }

    /// Default client configuration for a build or watch run
    pub fn base(options: &HookOptions) -> Self {
        let src = path_string(&options.src);
        let dest = path_string(&options.dest);
        let production = options.production;

        let mut config = Self::from_value(json!({
            "mode": options.mode(),
            "context": src,
            "entry": {
                "bundle": [format!("{src}/index")],
            },
            "output": {
                "path": dest,
                "publicPath": "/",
                "filename": if production { "[name].[chunkhash:5].js" } else { "[name].js" },
                "chunkFilename": "[name].chunk.[chunkhash:5].js",
            },
            "resolve": {
                "extensions": RESOLVE_EXTENSIONS,
                "modules": [
                    path_string(&options.cwd().join("node_modules")),
                    "node_modules",
                ],
                "alias": {
                    "style": format!("{src}/style"),
                },
            },
            "devtool": if production { Value::Bool(false) } else { json!("cheap-module-eval-source-map") },
        }));

        config
            .rule("js")
            .enforce("pre")
            .test(r"\.m?[tj]sx?$")
            .loader("babel-loader")
            .options(json!({ "babelrc": false }));

        config
            .rule("files")
            .test(r"\.(svg|woff2?|ttf|eot|jpe?g|png|webp|gif|mp4|mov|ogg|webm)(\?.*)?$")
            .loader(if production { "file-loader" } else { "url-loader" });

        config.plugin(
            "define",
            json!({ "process.env.NODE_ENV": options.mode() }),
        );

        if options.watch {
            let port = options
                .extra("port")
                .cloned()
                .unwrap_or_else(|| json!(8080));
            config.set(
                "/devServer",
                json!({
                    "hot": true,
                    "port": port,
                    "historyApiFallback": true,
                    "static": dest,
                }),
            );
        }

        config
    }

    /// Deep-merges a partial structure into the configuration.
    pub fn merge(&mut self, partial: Value) -> &mut Self {
        deep_merge(&mut self.value, partial);
        self
    }

    /// Looks up a value by JSON pointer (`/output/path`).
    pub fn get(&self, pointer: &str) -> Option<&Value> {
        if pointer.is_empty() {
            return Some(&self.value);
        }
        self.value.pointer(pointer)
    }

    /// Sets a value by JSON pointer, creating intermediate objects.
    ///
    /// Intermediate non-object values on the path are replaced.
    pub fn set(&mut self, pointer: &str, value: Value) -> &mut Self {
        if pointer.is_empty() {
            *self = Self::from_value(value);
            return self;
        }

        let tokens: Vec<String> = pointer
            .trim_start_matches('/')
            .split('/')
            .map(unescape_token)
            .collect();

        let mut current = &mut self.value;
        for token in &tokens[..tokens.len() - 1] {
            if !current.is_object() {
                *current = Value::Object(Map::new());
            }
            current = match current {
                Value::Object(map) => map
                    .entry(token.clone())
                    .or_insert_with(|| Value::Object(Map::new())),
                other => other,
            };
        }

        if !current.is_object() {
            *current = Value::Object(Map::new());
        }
        if let (Value::Object(map), Some(last)) = (current, tokens.last()) {
            map.insert(last.clone(), value);
        }
        self
    }

    /// Removes a value by JSON pointer.
    pub fn remove(&mut self, pointer: &str) -> Option<Value> {
        let (parent, last) = pointer.rsplit_once('/')?;
        let key = unescape_token(last);
        let container = if parent.is_empty() {
            &mut self.value
        } else {
            self.value.pointer_mut(parent)?
        };
        container.as_object_mut()?.shift_remove(&key)
    }

    /// Builder for the module rule `name`, created on first access.
    pub fn rule(&mut self, name: &str) -> RuleBuilder<'_> {
        let pointer = format!("/module/rules/{}", escape_token(name));
        if self.get(&pointer).is_none() {
            self.set(&pointer, Value::Object(Map::new()));
        }
        RuleBuilder {
            config: self,
            pointer,
        }
    }

    pub fn has_rule(&self, name: &str) -> bool {
        self.get(&format!("/module/rules/{}", escape_token(name)))
            .is_some()
    }

    /// Registers or replaces a bundler plugin entry.
    pub fn plugin(&mut self, name: &str, options: Value) -> &mut Self {
        self.set(&format!("/plugins/{}", escape_token(name)), options)
    }

    pub fn as_value(&self) -> &Value {
        &self.value
    }

    /// Plain structure of the configuration
    pub fn to_value(&self) -> Value {
        self.value.clone()
    }

    pub fn into_value(self) -> Value {
        self.value
    }
}

/// Mutates one rule of a [`BuildConfig`] in place
pub struct RuleBuilder<'a> {
    config: &'a mut BuildConfig,
    pointer: String,
}

impl RuleBuilder<'_> {
    fn field(self, key: &str, value: Value) -> Self {
        let pointer = format!("{}/{}", self.pointer, key);
        self.config.set(&pointer, value);
        self
    }

    /// Regex source matched against module paths
    pub fn test(self, pattern: &str) -> Self {
        self.field("test", json!(pattern))
    }

    /// `pre` or `post`
    pub fn enforce(self, phase: &str) -> Self {
        self.field("enforce", json!(phase))
    }

    pub fn loader(self, loader: &str) -> Self {
        self.field("loader", json!(loader))
    }

    /// Merges loader options into the existing ones.
    pub fn options(self, options: Value) -> Self {
        let pointer = format!("{}/options", self.pointer);
        match self.config.value.pointer_mut(&pointer) {
            Some(existing) => deep_merge(existing, options),
            None => {
                self.config.set(&pointer, options);
            }
        }
        self
    }

    pub fn include(self, path: &str) -> Self {
        self.push("include", path)
    }

    pub fn exclude(self, path: &str) -> Self {
        self.push("exclude", path)
    }

    fn push(self, key: &str, path: &str) -> Self {
        let pointer = format!("{}/{}", self.pointer, key);
        match self.config.value.pointer_mut(&pointer) {
            Some(Value::Array(items)) => items.push(json!(path)),
            _ => {
                self.config.set(&pointer, json!([path]));
            }
        }
        self
    }

    pub fn value(&self) -> Option<&Value> {
        self.config.get(&self.pointer)
    }
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn escape_token(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

fn unescape_token(token: &str) -> String {
    token.replace("~1", "/").replace("~0", "~")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::CliOptions;

    #[test]
    fn test_get_and_set_by_pointer() {
        let mut config = BuildConfig::new();
        config.set("/output/path", json!("dist"));
        config.set("/output/publicPath", json!("/"));

        assert_eq!(config.get("/output/path"), Some(&json!("dist")));
        assert_eq!(config.get("/output/missing"), None);
        assert_eq!(
            config.to_value(),
            json!({"output": {"path": "dist", "publicPath": "/"}})
        );
    }

    #[test]
    fn test_set_replaces_scalar_on_path() {
        let mut config = BuildConfig::from_value(json!({"devtool": false}));
        config.set("/devtool/kind", json!("source-map"));
        assert_eq!(config.to_value(), json!({"devtool": {"kind": "source-map"}}));
    }

    #[test]
    fn test_non_object_becomes_empty() {
        assert_eq!(BuildConfig::from_value(json!([1, 2])), BuildConfig::new());
    }

    #[test]
    fn test_remove() {
        let mut config = BuildConfig::from_value(json!({"a": {"b": 1, "c": 2}, "d": 3}));
        assert_eq!(config.remove("/a/b"), Some(json!(1)));
        assert_eq!(config.remove("/d"), Some(json!(3)));
        assert_eq!(config.remove("/missing"), None);
        assert_eq!(config.to_value(), json!({"a": {"c": 2}}));
    }

    #[test]
    fn test_rule_builder() {
        let mut config = BuildConfig::new();
        config
            .rule("sass")
            .enforce("pre")
            .test(r"\.s[ac]ss$")
            .loader("sass-loader")
            .options(json!({"sourceMap": true}))
            .exclude("node_modules");
        config.rule("sass").options(json!({"indented": false}));

        assert!(config.has_rule("sass"));
        assert_eq!(
            config.get("/module/rules/sass"),
            Some(&json!({
                "enforce": "pre",
                "test": r"\.s[ac]ss$",
                "loader": "sass-loader",
                "options": {"sourceMap": true, "indented": false},
                "exclude": ["node_modules"]
            }))
        );
    }

    #[test]
    fn test_rule_name_with_slash() {
        let mut config = BuildConfig::new();
        config.rule("a/b").loader("x");
        assert_eq!(
            config.to_value(),
            json!({"module": {"rules": {"a/b": {"loader": "x"}}}})
        );
    }

    #[test]
    fn test_base_configuration_modes() {
        let cli = CliOptions::new("/app");
        let dev = BuildConfig::base(&HookOptions::from_cli(&cli).with_watch(true));
        assert_eq!(dev.get("/mode"), Some(&json!("development")));
        assert_eq!(dev.get("/output/path"), Some(&json!("/app/build")));
        assert_eq!(dev.get("/module/rules/files/loader"), Some(&json!("url-loader")));
        assert_eq!(dev.get("/devServer/port"), Some(&json!(8080)));

        let prod = BuildConfig::base(
            &HookOptions::from_cli(&cli)
                .with_production(true)
                .with_dest("/app/dist"),
        );
        assert_eq!(prod.get("/mode"), Some(&json!("production")));
        assert_eq!(prod.get("/output/path"), Some(&json!("/app/dist")));
        assert_eq!(prod.get("/devtool"), Some(&json!(false)));
        assert!(prod.get("/devServer").is_none());
        assert!(prod.has_rule("js"));
    }
}

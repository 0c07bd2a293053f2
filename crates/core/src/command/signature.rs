//! Parsing of command signatures and option flag strings
//!
//! Signatures look like `build [src] [dest]`: a command name followed by
//! `<required>`, `[optional]` and `[variadic...]` positionals. Option flags
//! look like `-d, --dest <dir>`, `--hook [name]` or `--no-prerender`.

use std::collections::HashSet;

/// A positional argument of a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgSpec {
    pub name: String,
    pub required: bool,
    pub variadic: bool,
}

/// Parsed `name <arg> [arg]` signature
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSignature {
    pub name: String,
    pub args: Vec<ArgSpec>,
}

impl CommandSignature {
    /// Returns `None` when the signature has no command name or its
    /// positionals cannot be parsed unambiguously: a variadic that is not
    /// last, a required arg after an optional one, or a repeated name.
    pub fn parse(signature: &str) -> Option<Self> {
        let mut tokens = signature.split_whitespace();
        let name = tokens.next()?;
        if name.starts_with('<') || name.starts_with('[') {
            return None;
        }

        let args: Vec<ArgSpec> = tokens.filter_map(parse_arg).collect();
        if !positionals_are_ordered(&args) {
            return None;
        }

        Some(Self {
            name: name.to_string(),
            args,
        })
    }
}

fn positionals_are_ordered(args: &[ArgSpec]) -> bool {
    let mut names = HashSet::new();
    let mut seen_optional = false;
    for (index, arg) in args.iter().enumerate() {
        if !names.insert(arg.name.as_str()) {
            return false;
        }
        if arg.variadic && index + 1 != args.len() {
            return false;
        }
        if arg.required && seen_optional {
            return false;
        }
        seen_optional |= !arg.required;
    }
    true
}

fn parse_arg(token: &str) -> Option<ArgSpec> {
    let (inner, required) = if let Some(inner) = token
        .strip_prefix('<')
        .and_then(|t| t.strip_suffix('>'))
    {
        (inner, true)
    } else if let Some(inner) = token
        .strip_prefix('[')
        .and_then(|t| t.strip_suffix(']'))
    {
        (inner, false)
    } else {
        return None;
    };

    let (name, variadic) = match inner.strip_suffix("...") {
        Some(name) => (name, true),
        None => (inner, false),
    };

    if name.is_empty() {
        return None;
    }

    Some(ArgSpec {
        name: name.to_string(),
        required,
        variadic,
    })
}

/// Whether an option takes a value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
    /// Boolean switch
    Flag,
    /// `--name <value>`
    Required(String),
    /// `--name [value]`
    Optional(String),
}

/// Parsed option flags of a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionSpec {
    /// Long flag as typed, without dashes (`no-prerender`)
    pub long: Option<String>,
    pub short: Option<char>,
    /// Key under which the parsed value is stored (`prerender`)
    pub key: String,
    pub value: OptionValue,
    /// `--no-*` switches default to true and store false when given
    pub negated: bool,
    pub description: String,
    pub default: Option<String>,
}

impl OptionSpec {
    pub fn parse(flags: &str, description: &str) -> Option<Self> {
        let mut long = None;
        let mut short = None;
        let mut value = OptionValue::Flag;

        for token in flags
            .split(|c: char| c == ',' || c == '|' || c.is_whitespace())
            .filter(|t| !t.is_empty())
        {
            if let Some(name) = token.strip_prefix("--") {
                long = Some(name.to_string());
            } else if let Some(name) = token.strip_prefix('-') {
                short = name.chars().next();
            } else if let Some(inner) = token.strip_prefix('<').and_then(|t| t.strip_suffix('>')) {
                value = OptionValue::Required(inner.to_string());
            } else if let Some(inner) = token.strip_prefix('[').and_then(|t| t.strip_suffix(']')) {
                value = OptionValue::Optional(inner.to_string());
            }
        }

        let (key, negated) = match long.as_deref() {
            Some(name) => match name.strip_prefix("no-") {
                Some(rest) if value == OptionValue::Flag => (rest.to_string(), true),
                _ => (name.to_string(), false),
            },
            None => (short?.to_string(), false),
        };

        Some(Self {
            long,
            short,
            key,
            value,
            negated,
            description: description.to_string(),
            default: None,
        })
    }

    pub fn takes_value(&self) -> bool {
        !matches!(self.value, OptionValue::Flag)
    }
}

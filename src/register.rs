//! # Register
//!
//! The `Register` holds every tunable parameter of an evolution, keyed by name.
//! Operators declare their parameters in `initialize`, each with a default
//! value and a free-text description. The first declaration of a name wins:
//! declaring a name that is already present keeps the existing entry, which
//! lets several operator instances share one parameter (two crossover
//! operators both reading `ga.cx2p.prob`, for example).
//!
//! Overrides coming from the command line or a configuration file may be
//! bound before the matching declaration. They are kept aside and replace the
//! default as soon as the parameter is declared.
//!
//! ## Example
//!
//! ```rust
//! use beagle::register::{ParameterValue, Register};
//!
//! let mut register = Register::new();
//! register.apply_arguments(["-OBec.pop.size=20"]).unwrap();
//!
//! register.declare("ec.pop.size", ParameterValue::Int(100), "Population size");
//! register.declare("ec.pop.size", ParameterValue::Int(500), "Ignored, already declared");
//!
//! assert_eq!(register.uint("ec.pop.size").unwrap(), 20);
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{BeagleError, Result};

/// Value of a registered parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl ParameterValue {
    /// Parses a textual override: booleans, then integers, then floats, then text.
    pub fn parse(text: &str) -> Self {
        let trimmed = text.trim();
        match trimmed {
            "true" => return ParameterValue::Bool(true),
            "false" => return ParameterValue::Bool(false),
            _ => {}
        }
        if let Ok(value) = trimmed.parse::<i64>() {
            return ParameterValue::Int(value);
        }
        if let Ok(value) = trimmed.parse::<f64>() {
            return ParameterValue::Float(value);
        }
        ParameterValue::Text(trimmed.to_string())
    }

    fn kind(&self) -> &'static str {
        match self {
            ParameterValue::Bool(_) => "bool",
            ParameterValue::Int(_) => "int",
            ParameterValue::Float(_) => "float",
            ParameterValue::Text(_) => "text",
        }
    }
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterValue::Bool(value) => write!(f, "{}", value),
            ParameterValue::Int(value) => write!(f, "{}", value),
            ParameterValue::Float(value) => write!(f, "{}", value),
            ParameterValue::Text(value) => write!(f, "{}", value),
        }
    }
}

/// A declared parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub value: ParameterValue,
    pub default: ParameterValue,
    pub description: String,
}

/// Named parameter store with first-registrant-wins semantics.
#[derive(Debug, Clone, Default)]
pub struct Register {
    entries: BTreeMap<String, Entry>,
    pending: BTreeMap<String, ParameterValue>,
}

impl Register {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a parameter.
    ///
    /// Returns `true` when the name was not yet present. A pending override
    /// for the name replaces `default` as the current value.
    pub fn declare(
        &mut self,
        name: &str,
        default: ParameterValue,
        description: &str,
    ) -> bool {
        if self.entries.contains_key(name) {
            return false;
        }
        let value = self.pending.remove(name).unwrap_or_else(|| default.clone());
        self.entries.insert(
            name.to_string(),
            Entry {
                value,
                default,
                description: description.to_string(),
            },
        );
        true
    }

    /// Sets the value of a parameter.
    ///
    /// Undeclared names are kept as pending overrides until declared.
    pub fn set(&mut self, name: &str, value: ParameterValue) {
        match self.entries.get_mut(name) {
            Some(entry) => entry.value = value,
            None => {
                self.pending.insert(name.to_string(), value);
            }
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&ParameterValue> {
        self.entries.get(name).map(|entry| &entry.value)
    }

    pub fn entry(&self, name: &str) -> Option<&Entry> {
        self.entries.get(name)
    }

    /// Iterates over declared parameters in name order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &Entry)> {
        self.entries.iter().map(|(name, entry)| (name.as_str(), entry))
    }

    /// Overrides given but never declared by any operator.
    pub fn unused_overrides(&self) -> impl Iterator<Item = &str> {
        self.pending.keys().map(String::as_str)
    }

    fn lookup(&self, name: &str) -> Result<&ParameterValue> {
        self.get(name)
            .ok_or_else(|| BeagleError::Parameter(format!("parameter `{}` is not declared", name)))
    }

    fn mismatch(name: &str, expected: &str, found: &ParameterValue) -> BeagleError {
        BeagleError::Parameter(format!(
            "parameter `{}` should be {}, found {} `{}`",
            name,
            expected,
            found.kind(),
            found
        ))
    }

    pub fn bool(&self, name: &str) -> Result<bool> {
        match self.lookup(name)? {
            ParameterValue::Bool(value) => Ok(*value),
            ParameterValue::Int(value) => Ok(*value != 0),
            other => Err(Self::mismatch(name, "a bool", other)),
        }
    }

    pub fn int(&self, name: &str) -> Result<i64> {
        match self.lookup(name)? {
            ParameterValue::Int(value) => Ok(*value),
            other => Err(Self::mismatch(name, "an int", other)),
        }
    }

    /// Reads a non-negative integer parameter.
    pub fn uint(&self, name: &str) -> Result<usize> {
        let value = self.int(name)?;
        usize::try_from(value).map_err(|_| {
            BeagleError::Parameter(format!(
                "parameter `{}` must be non-negative, found {}",
                name, value
            ))
        })
    }

    /// Reads a float parameter; integers are widened.
    pub fn float(&self, name: &str) -> Result<f64> {
        match self.lookup(name)? {
            ParameterValue::Float(value) => Ok(*value),
            ParameterValue::Int(value) => Ok(*value as f64),
            other => Err(Self::mismatch(name, "a float", other)),
        }
    }

    /// Reads a probability, rejecting values outside `[0, 1]`.
    pub fn probability(&self, name: &str) -> Result<f64> {
        let value = self.float(name)?;
        if !(0.0..=1.0).contains(&value) {
            return Err(BeagleError::Parameter(format!(
                "parameter `{}` must be a probability in [0, 1], found {}",
                name, value
            )));
        }
        Ok(value)
    }

    pub fn text(&self, name: &str) -> Result<String> {
        match self.lookup(name)? {
            ParameterValue::Text(value) => Ok(value.clone()),
            other => Ok(other.to_string()),
        }
    }

    /// Applies `name=value` pairs separated by commas or newlines.
    ///
    /// Blank items and lines starting with `#` are skipped.
    pub fn parse_overrides(&mut self, text: &str) -> Result<usize> {
        let mut applied = 0;
        for item in text.split([',', '\n']) {
            let item = item.trim();
            if item.is_empty() || item.starts_with('#') {
                continue;
            }
            let (name, value) = item.split_once('=').ok_or_else(|| {
                BeagleError::Parameter(format!("override `{}` is not of the form name=value", item))
            })?;
            let name = name.trim();
            if name.is_empty() {
                return Err(BeagleError::Parameter(format!(
                    "override `{}` has an empty name",
                    item
                )));
            }
            self.set(name, ParameterValue::parse(value));
            applied += 1;
        }
        Ok(applied)
    }

    /// Applies command-line overrides of the form `-OBname=value,name=value`.
    ///
    /// Arguments without the `-OB` prefix are ignored.
    pub fn apply_arguments<I, S>(&mut self, arguments: I) -> Result<usize>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut applied = 0;
        for argument in arguments {
            if let Some(list) = argument.as_ref().strip_prefix("-OB") {
                applied += self.parse_overrides(list)?;
            }
        }
        Ok(applied)
    }

    /// Applies overrides from a JSON object mapping names to values.
    pub fn load_json(&mut self, path: &Path) -> Result<usize> {
        let content = std::fs::read_to_string(path)?;
        let overrides: BTreeMap<String, ParameterValue> = serde_json::from_str(&content)?;
        let applied = overrides.len();
        for (name, value) in overrides {
            self.set(&name, value);
        }
        Ok(applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_registrant_wins() {
        let mut register = Register::new();
        assert!(register.declare("gp.cx.indpb", ParameterValue::Float(0.9), "first"));
        assert!(!register.declare("gp.cx.indpb", ParameterValue::Float(0.1), "second"));
        assert_eq!(register.float("gp.cx.indpb").unwrap(), 0.9);
        assert_eq!(register.entry("gp.cx.indpb").unwrap().description, "first");
    }

    #[test]
    fn test_pending_override_applies_on_declare() {
        let mut register = Register::new();
        register.set("ec.pop.size", ParameterValue::Int(42));
        assert_eq!(register.unused_overrides().count(), 1);
        register.declare("ec.pop.size", ParameterValue::Int(100), "size");
        assert_eq!(register.uint("ec.pop.size").unwrap(), 42);
        assert_eq!(
            register.entry("ec.pop.size").unwrap().default,
            ParameterValue::Int(100)
        );
        assert_eq!(register.unused_overrides().count(), 0);
    }

    #[test]
    fn test_typed_access() {
        let mut register = Register::new();
        register.declare("a", ParameterValue::Int(3), "");
        register.declare("b", ParameterValue::Text("E".to_string()), "");
        register.declare("c", ParameterValue::Int(-1), "");
        register.declare("d", ParameterValue::Float(1.5), "");

        assert_eq!(register.float("a").unwrap(), 3.0);
        assert_eq!(register.text("b").unwrap(), "E");
        assert!(register.uint("c").is_err());
        assert!(register.int("d").is_err());
        assert!(register.probability("d").is_err());
        assert!(matches!(
            register.float("missing"),
            Err(BeagleError::Parameter(_))
        ));
    }

    #[test]
    fn test_parse_overrides() {
        let mut register = Register::new();
        let applied = register
            .parse_overrides("gp.init.maxdepth=4, gp.cx.indpb=0.5\n# comment\nms.write.prefix=run")
            .unwrap();
        assert_eq!(applied, 3);
        register.declare("gp.init.maxdepth", ParameterValue::Int(5), "");
        register.declare("gp.cx.indpb", ParameterValue::Float(0.9), "");
        register.declare("ms.write.prefix", ParameterValue::Text(String::new()), "");
        assert_eq!(register.uint("gp.init.maxdepth").unwrap(), 4);
        assert_eq!(register.float("gp.cx.indpb").unwrap(), 0.5);
        assert_eq!(register.text("ms.write.prefix").unwrap(), "run");

        assert!(register.parse_overrides("novalue").is_err());
        assert!(register.parse_overrides("=3").is_err());
    }

    #[test]
    fn test_apply_arguments_ignores_other_flags() {
        let mut register = Register::new();
        let applied = register
            .apply_arguments(["--verbose", "-OBec.term.maxgen=10,ec.pop.size=8"])
            .unwrap();
        assert_eq!(applied, 2);
        register.declare("ec.term.maxgen", ParameterValue::Int(50), "");
        assert_eq!(register.uint("ec.term.maxgen").unwrap(), 10);
    }

    #[test]
    fn test_load_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("overrides.json");
        std::fs::write(&path, r#"{"ec.pop.size": 12, "gp.cx.indpb": 0.25, "flag": true}"#).unwrap();

        let mut register = Register::new();
        assert_eq!(register.load_json(&path).unwrap(), 3);
        register.declare("ec.pop.size", ParameterValue::Int(100), "");
        register.declare("gp.cx.indpb", ParameterValue::Float(0.9), "");
        register.declare("flag", ParameterValue::Bool(false), "");
        assert_eq!(register.uint("ec.pop.size").unwrap(), 12);
        assert_eq!(register.float("gp.cx.indpb").unwrap(), 0.25);
        assert!(register.bool("flag").unwrap());
    }
}

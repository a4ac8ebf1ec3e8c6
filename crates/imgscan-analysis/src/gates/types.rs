//! Inputs shared by every trigger: parameter schema, parsed parameters and
//! the read-only fact view.

use std::borrow::Cow;

use imgscan_core::constants::CATEGORY_ANALYZER_META;
use imgscan_core::errors::GateError;
use imgscan_core::types::{Distro, FactMap, FactSet, ImageId};

/// One entry in a trigger's parameter schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: Cow<'static, str>,
    pub description: Cow<'static, str>,
    pub required: bool,
}

impl ParamSpec {
    pub const fn required(name: &'static str, description: &'static str) -> Self {
        Self {
            name: Cow::Borrowed(name),
            description: Cow::Borrowed(description),
            required: true,
        }
    }

    pub const fn optional(name: &'static str, description: &'static str) -> Self {
        Self {
            name: Cow::Borrowed(name),
            description: Cow::Borrowed(description),
            required: false,
        }
    }

    /// Schema entry read from a gate script header. Names are uppercased.
    pub fn declared(name: &str, description: &str, required: bool) -> Self {
        Self {
            name: Cow::Owned(name.to_ascii_uppercase()),
            description: Cow::Owned(description.to_string()),
            required,
        }
    }
}

/// Gate parameters in `KEY=value KEY2=v1,v2` form. Keys are matched
/// case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TriggerParams {
    values: std::collections::BTreeMap<String, String>,
}

impl TriggerParams {
    pub fn parse(gate: &str, text: &str) -> Result<Self, GateError> {
        let mut values = std::collections::BTreeMap::new();
        for token in text.split_whitespace() {
            let (key, value) = token
                .split_once('=')
                .filter(|(k, _)| !k.is_empty())
                .ok_or_else(|| GateError::InvalidParameter {
                    gate: gate.to_string(),
                    trigger: String::new(),
                    message: format!("expected KEY=value, got {token:?}"),
                })?;
            values.insert(key.to_ascii_uppercase(), value.to_string());
        }
        Ok(Self { values })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(&key.to_ascii_uppercase()).map(String::as_str)
    }

    /// Comma-separated values of `key`, empty items dropped.
    pub fn list(&self, key: &str) -> Vec<&str> {
        self.get(key)
            .map(|v| v.split(',').filter(|s| !s.is_empty()).collect())
            .unwrap_or_default()
    }

    /// `(KEY, value)` pairs with keys uppercased.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Facts of one image, loaded once per evaluation.
#[derive(Debug, Clone, Copy)]
pub struct FactView<'a> {
    image_id: &'a ImageId,
    facts: &'a FactMap,
}

impl<'a> FactView<'a> {
    pub fn new(image_id: &'a ImageId, facts: &'a FactMap) -> Self {
        Self { image_id, facts }
    }

    pub fn image_id(&self) -> &ImageId {
        self.image_id
    }

    pub fn category(&self, name: &str) -> Option<&'a FactSet> {
        self.facts.get(name)
    }

    /// Every category with its records, sorted by category name.
    pub fn categories(&self) -> impl Iterator<Item = (&'a str, &'a FactSet)> {
        self.facts.iter().map(|(name, set)| (name.as_str(), set))
    }

    pub fn has(&self, name: &str) -> bool {
        self.facts.contains_key(name)
    }

    pub fn get(&self, category: &str, key: &str) -> Option<&'a str> {
        self.facts.get(category)?.get(key).map(String::as_str)
    }

    /// `Unknown` when the metadata stage never ran.
    pub fn distro(&self) -> Distro {
        self.category(CATEGORY_ANALYZER_META)
            .map(Distro::from_meta)
            .unwrap_or_else(Distro::unknown)
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }
}

//! Purpose: Build the companion rule that maps a physical key to "hyper".
//! Exports: `HyperKeyRule`, `HYPER_KEYS`, `MODIFIER_KEYS`.
//! Role: Second document builder next to the sublayer codec; one manipulator,
//! no conditions, optional variable/modifier/alone effects.
//! Invariants: The hyper key itself is never emitted as a modifier.
//! Invariants: An "any" family modifier and its left/right variants are
//! mutually exclusive in the selection.

use crate::core::error::{Error, ErrorKind};
use crate::core::rules::{Document, Effect, Manipulator, RULE_TYPE, Trigger, set_variable};

/// Keys the editor offers as hyper-key candidates.
pub const HYPER_KEYS: &[&str] = &[
    "caps_lock",
    "tab",
    "escape",
    "left_command",
    "left_control",
    "left_option",
    "left_shift",
    "right_command",
    "right_control",
    "right_option",
    "right_shift",
    "fn",
    "command",
    "control",
    "option",
    "shift",
];

/// Modifier keys that may be emitted while the hyper key is held.
pub const MODIFIER_KEYS: &[&str] = &[
    "left_shift",
    "right_shift",
    "shift",
    "left_command",
    "right_command",
    "command",
    "fn",
    "left_control",
    "right_control",
    "control",
    "left_option",
    "right_option",
    "option",
];

const MODIFIER_FAMILIES: &[(&str, [&str; 2])] = &[
    ("shift", ["left_shift", "right_shift"]),
    ("command", ["left_command", "right_command"]),
    ("control", ["left_control", "right_control"]),
    ("option", ["left_option", "right_option"]),
];

pub const MAX_DESCRIPTION_LEN: usize = 256;
pub const MAX_VARIABLE_LEN: usize = 128;

const DEFAULT_VARIABLE: &str = "hyper";

#[derive(Clone, Debug)]
pub struct HyperKeyRule {
    description: String,
    hyper_key: String,
    variable: String,
    modifiers: Vec<String>,
    alone_key: Option<String>,
}

impl HyperKeyRule {
    pub fn new() -> Self {
        Self {
            description: String::new(),
            hyper_key: String::new(),
            variable: DEFAULT_VARIABLE.to_string(),
            modifiers: Vec::new(),
            alone_key: None,
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.chars().take(MAX_DESCRIPTION_LEN).collect();
        self
    }

    /// Pick the hyper key. Anything it shadows is dropped from the current
    /// modifier selection: the key itself, and its left/right variants when a
    /// family key like `shift` is chosen.
    pub fn with_hyper_key(mut self, key: &str) -> Self {
        self.hyper_key = key.to_string();
        self.modifiers
            .retain(|modifier| !shadowed_by(modifier, &self.hyper_key));
        self
    }

    /// Variable set to 1 while the key is held. Quotes are stripped; an empty
    /// name disables the variable effects entirely.
    pub fn with_variable(mut self, variable: &str) -> Self {
        self.variable = strip_quotes(variable).chars().take(MAX_VARIABLE_LEN).collect();
        self
    }

    pub fn with_alone_key(mut self, key: &str) -> Self {
        let key = strip_quotes(key);
        self.alone_key = if key.is_empty() { None } else { Some(key) };
        self
    }

    /// Add a modifier to the selection, keeping the family/variant exclusion
    /// rules: a family key replaces its variants and vice versa, and nothing
    /// shadowed by the hyper key is accepted.
    pub fn add_modifier(&mut self, key: &str) {
        if shadowed_by(key, &self.hyper_key) {
            return;
        }
        if self.modifiers.iter().any(|existing| existing == key) {
            return;
        }
        if let Some(variants) = family_variants(key) {
            self.modifiers
                .retain(|existing| !variants.contains(&existing.as_str()));
        }
        if let Some(family) = family_of(key) {
            self.modifiers.retain(|existing| existing != family);
        }
        self.modifiers.push(key.to_string());
    }

    pub fn modifiers(&self) -> &[String] {
        &self.modifiers
    }

    pub fn generate(&self) -> Result<Document, Error> {
        if self.description.is_empty() || self.hyper_key.is_empty() {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("hyper key rules need a description and a hyper key")
                .with_hint("Provide --description and --key."));
        }

        let mut to = Vec::new();
        if !self.variable.is_empty() {
            to.push(set_variable(self.variable.clone(), 1));
        }
        if let Some((first, rest)) = self.modifiers.split_first() {
            to.push(Effect::Key {
                key_code: first.clone(),
                modifiers: if rest.is_empty() {
                    None
                } else {
                    Some(rest.to_vec())
                },
            });
        }

        let manipulator = Manipulator {
            conditions: None,
            description: format!("mapping {} to hyper", self.hyper_key),
            from: Trigger {
                key_code: self.hyper_key.clone(),
                modifiers: None,
            },
            to: if to.is_empty() { None } else { Some(to) },
            to_after_key_up: (!self.variable.is_empty())
                .then(|| vec![set_variable(self.variable.clone(), 0)]),
            to_if_alone: self.alone_key.as_ref().map(|key| {
                vec![Effect::Key {
                    key_code: key.clone(),
                    modifiers: None,
                }]
            }),
            rule_type: RULE_TYPE,
        };

        Ok(Document {
            description: self.description.clone(),
            manipulators: vec![manipulator],
        })
    }
}

impl Default for HyperKeyRule {
    fn default() -> Self {
        Self::new()
    }
}

fn strip_quotes(input: &str) -> String {
    input.chars().filter(|c| *c != '\'' && *c != '"').collect()
}

// "shift" for "left_shift"/"right_shift", and so on.
fn family_of(key: &str) -> Option<&'static str> {
    MODIFIER_FAMILIES
        .iter()
        .find(|(_, variants)| variants.contains(&key))
        .map(|(family, _)| *family)
}

fn family_variants(key: &str) -> Option<&'static [&'static str; 2]> {
    MODIFIER_FAMILIES
        .iter()
        .find(|(family, _)| *family == key)
        .map(|(_, variants)| variants)
}

fn shadowed_by(modifier: &str, hyper_key: &str) -> bool {
    if modifier == hyper_key {
        return true;
    }
    family_variants(hyper_key)
        .is_some_and(|variants| variants.contains(&modifier))
}

//! Purpose: Generate and parse Karabiner sublayer rule documents.
//! Exports: document types, `generate`, `parse`, `render`, `variable_name`, `format_size`.
//! Role: Pure codec between the editable model and the external JSON format.
//! Invariants: Generation is strict and fixed-shape; parsing is lenient and
//! best-effort (missing nested fields degrade to empty defaults, not errors).
//! Invariants: Rendered output uses two-space indentation, UTF-8.

use serde::Serialize;
use serde_json::Value;

use crate::core::config::{Action, CommandType, Configuration};
use crate::core::error::{Error, ErrorKind};

pub const RULE_TYPE: &str = "basic";
pub const HYPER_VARIABLE: &str = "hyper";
const VARIABLE_IF: &str = "variable_if";

#[derive(Clone, Debug, Serialize)]
pub struct Document {
    pub description: String,
    pub manipulators: Vec<Manipulator>,
}

#[derive(Clone, Debug, Serialize)]
pub struct Manipulator {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conditions: Option<Vec<Condition>>,
    pub description: String,
    pub from: Trigger,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<Vec<Effect>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_after_key_up: Option<Vec<Effect>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_if_alone: Option<Vec<Effect>>,
    #[serde(rename = "type")]
    pub rule_type: &'static str,
}

#[derive(Clone, Debug, Serialize)]
pub struct Condition {
    pub name: String,
    #[serde(rename = "type")]
    pub condition_type: &'static str,
    pub value: i64,
}

#[derive(Clone, Debug, Serialize)]
pub struct Trigger {
    pub key_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modifiers: Option<TriggerModifiers>,
}

#[derive(Clone, Debug, Serialize)]
pub struct TriggerModifiers {
    pub optional: Vec<&'static str>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(untagged)]
pub enum Effect {
    SetVariable {
        set_variable: SetVariable,
    },
    ShellCommand {
        shell_command: String,
    },
    Key {
        key_code: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        modifiers: Option<Vec<String>>,
    },
}

#[derive(Clone, Debug, Serialize)]
pub struct SetVariable {
    pub name: String,
    pub value: i64,
}

pub fn variable_name(sublayer_char: &str) -> String {
    format!("hyper_sublayer_{sublayer_char}")
}

pub(crate) fn variable_if(name: impl Into<String>, value: i64) -> Condition {
    Condition {
        name: name.into(),
        condition_type: VARIABLE_IF,
        value,
    }
}

pub(crate) fn set_variable(name: impl Into<String>, value: i64) -> Effect {
    Effect::SetVariable {
        set_variable: SetVariable {
            name: name.into(),
            value,
        },
    }
}

// Fires regardless of incidental modifier state.
fn optional_any() -> Option<TriggerModifiers> {
    Some(TriggerModifiers {
        optional: vec!["any"],
    })
}

/// Render the configuration as a rule document: the sublayer toggle first,
/// then one action manipulator per action, in list order.
///
/// Pure and total. Field contents are copied verbatim (no escaping or
/// sanitization of commands); malformed fields such as an empty sublayer
/// character simply propagate into malformed output.
pub fn generate(config: &Configuration) -> Document {
    let variable = variable_name(&config.sublayer_char);

    // Toggle: pressing the sublayer key while hyper is held raises the flag
    // for the duration of the key-hold, then clears it on release.
    let mut manipulators = Vec::with_capacity(1 + config.actions.len());
    manipulators.push(Manipulator {
        conditions: Some(vec![
            variable_if(variable.clone(), 0),
            variable_if(HYPER_VARIABLE, 1),
        ]),
        description: format!("Toggle Hyper sublayer {}", config.sublayer_char),
        from: Trigger {
            key_code: config.sublayer_char.clone(),
            modifiers: optional_any(),
        },
        to: Some(vec![set_variable(variable.clone(), 1)]),
        to_after_key_up: Some(vec![set_variable(variable.clone(), 0)]),
        to_if_alone: None,
        rule_type: RULE_TYPE,
    });

    for action in &config.actions {
        manipulators.push(Manipulator {
            conditions: Some(vec![variable_if(variable.clone(), 1)]),
            description: action.description.clone(),
            from: Trigger {
                key_code: action.key_code.clone(),
                modifiers: optional_any(),
            },
            to: Some(vec![Effect::ShellCommand {
                shell_command: action.command.clone(),
            }]),
            to_after_key_up: None,
            to_if_alone: None,
            rule_type: RULE_TYPE,
        });
    }

    Document {
        description: config.description.clone(),
        manipulators,
    }
}

/// Recover a configuration from rule-document text.
///
/// Only two failures exist: text that is not JSON, and a document without a
/// non-empty `manipulators` list. Past that, recovery is best-effort: the
/// first manipulator is taken as the toggle (its shape is otherwise ignored,
/// so hand-edited documents still import), the rest map positionally to
/// actions, and any missing or ill-typed nested field becomes an empty
/// string rather than an error.
pub fn parse(text: &str) -> Result<Configuration, Error> {
    let document: Value = serde_json::from_str(text).map_err(|err| {
        Error::new(ErrorKind::Invalid)
            .with_message("input is not valid JSON")
            .with_hint("Paste a complete Karabiner rule document.")
            .with_source(err)
    })?;

    let manipulators = document
        .get("manipulators")
        .and_then(Value::as_array)
        .filter(|list| !list.is_empty())
        .ok_or_else(|| {
            Error::new(ErrorKind::Invalid)
                .with_message("document has no manipulators")
                .with_hint("A sublayer document needs at least the toggle manipulator.")
        })?;

    let sublayer_char = str_at(&manipulators[0], &["from", "key_code"]);

    let actions = manipulators[1..]
        .iter()
        .enumerate()
        .map(|(index, manipulator)| Action {
            // Source identity is discarded; ids are re-synthesized.
            id: format!("action-{index}"),
            key_code: str_at(manipulator, &["from", "key_code"]),
            description: str_at(manipulator, &["description"]),
            command_type: CommandType::ShellCommand,
            command: manipulator
                .get("to")
                .and_then(Value::as_array)
                .and_then(|effects| effects.first())
                .and_then(|effect| effect.get("shell_command"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        })
        .collect();

    Ok(Configuration {
        sublayer_char,
        description: str_at(&document, &["description"]),
        actions,
    })
}

fn str_at(value: &Value, path: &[&str]) -> String {
    let mut current = value;
    for key in path {
        match current.get(key) {
            Some(next) => current = next,
            None => return String::new(),
        }
    }
    current.as_str().unwrap_or_default().to_string()
}

/// Pretty-print a document with two-space indentation.
pub fn render(document: &Document) -> Result<String, Error> {
    serde_json::to_string_pretty(document).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("failed to encode document")
            .with_source(err)
    })
}

/// Human-readable size for the rendered-output readout.
pub fn format_size(bytes: usize) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    }
}

#[cfg(test)]
mod tests {
    use super::{format_size, generate, parse, str_at, variable_name};
    use crate::core::config::Configuration;
    use crate::core::error::ErrorKind;
    use serde_json::json;

    fn sample_config() -> Configuration {
        let mut config = Configuration::new("o");
        let id = config.add_action();
        config.set_action_key(&id, "f").expect("key");
        config.set_action_description(&id, "Open Finder").expect("descr");
        config.set_action_command(&id, "open ~/").expect("command");
        config
    }

    #[test]
    fn zero_actions_generates_only_the_toggle() {
        let document = generate(&Configuration::new("o"));
        let value = serde_json::to_value(&document).expect("encode");

        assert_eq!(
            value,
            json!({
                "description": "Hyper Key sublayer \"o\"",
                "manipulators": [
                    {
                        "conditions": [
                            { "name": "hyper_sublayer_o", "type": "variable_if", "value": 0 },
                            { "name": "hyper", "type": "variable_if", "value": 1 }
                        ],
                        "description": "Toggle Hyper sublayer o",
                        "from": {
                            "key_code": "o",
                            "modifiers": { "optional": ["any"] }
                        },
                        "to": [
                            { "set_variable": { "name": "hyper_sublayer_o", "value": 1 } }
                        ],
                        "to_after_key_up": [
                            { "set_variable": { "name": "hyper_sublayer_o", "value": 0 } }
                        ],
                        "type": "basic"
                    }
                ]
            })
        );
    }

    #[test]
    fn action_manipulators_follow_the_toggle_in_order() {
        let document = generate(&sample_config());
        assert_eq!(document.manipulators.len(), 2);

        let value = serde_json::to_value(&document).expect("encode");
        let action = &value["manipulators"][1];
        assert_eq!(
            action["conditions"],
            json!([{ "name": "hyper_sublayer_o", "type": "variable_if", "value": 1 }])
        );
        assert_eq!(action["description"], "Open Finder");
        assert_eq!(action["from"]["key_code"], "f");
        assert_eq!(action["to"], json!([{ "shell_command": "open ~/" }]));
        assert!(action.get("to_after_key_up").is_none());
        assert_eq!(action["type"], "basic");
    }

    #[test]
    fn parse_rejects_non_json() {
        let err = parse("not json").expect_err("syntax failure");
        assert_eq!(err.kind(), ErrorKind::Invalid);
    }

    #[test]
    fn parse_rejects_missing_or_empty_manipulators() {
        let err = parse(r#"{"description":"d","manipulators":[]}"#).expect_err("empty list");
        assert_eq!(err.kind(), ErrorKind::Invalid);

        let err = parse(r#"{"description":"d"}"#).expect_err("missing list");
        assert_eq!(err.kind(), ErrorKind::Invalid);
    }

    #[test]
    fn parse_takes_the_toggle_on_faith() {
        // The first manipulator only contributes its trigger key; nothing
        // else about its shape is checked.
        let text = r#"{
            "description": "hand written",
            "manipulators": [
                { "from": { "key_code": "w" } }
            ]
        }"#;
        let config = parse(text).expect("parse");
        assert_eq!(config.sublayer_char, "w");
        assert_eq!(config.description, "hand written");
        assert!(config.actions.is_empty());
    }

    #[test]
    fn parse_degrades_missing_fields_to_empty_strings() {
        let text = r#"{
            "manipulators": [
                { "from": { "key_code": "o" } },
                { "description": 7, "to": [{}] },
                { "from": {}, "to": "nope" }
            ]
        }"#;
        let config = parse(text).expect("parse");
        assert_eq!(config.description, "");
        assert_eq!(config.actions.len(), 2);
        assert_eq!(config.actions[0].id, "action-0");
        assert_eq!(config.actions[0].description, "");
        assert_eq!(config.actions[0].command, "");
        assert_eq!(config.actions[1].key_code, "");
        assert_eq!(config.actions[1].command, "");
    }

    #[test]
    fn round_trip_preserves_fields_but_resynthesizes_ids() {
        let mut original = sample_config();
        // Push the id off the parser's numbering to prove ids are rebuilt.
        original.actions[0].id = "action-7".to_string();

        let rendered = super::render(&generate(&original)).expect("render");
        let recovered = parse(&rendered).expect("parse");

        assert_eq!(recovered.sublayer_char, original.sublayer_char);
        assert_eq!(recovered.description, original.description);
        assert_eq!(recovered.actions.len(), 1);
        assert_eq!(recovered.actions[0].key_code, "f");
        assert_eq!(recovered.actions[0].description, "Open Finder");
        assert_eq!(recovered.actions[0].command, "open ~/");
        assert_eq!(recovered.actions[0].id, "action-0");
        assert_ne!(recovered.actions[0].id, original.actions[0].id);
    }

    #[test]
    fn commands_are_copied_verbatim() {
        let mut config = sample_config();
        config.actions[0].command = "echo \"$HOME\" && say 'hi'".to_string();
        let value = serde_json::to_value(&generate(&config)).expect("encode");
        assert_eq!(
            value["manipulators"][1]["to"][0]["shell_command"],
            "echo \"$HOME\" && say 'hi'"
        );
    }

    #[test]
    fn variable_name_is_templated() {
        assert_eq!(variable_name("o"), "hyper_sublayer_o");
        assert_eq!(variable_name(""), "hyper_sublayer_");
    }

    #[test]
    fn str_at_tolerates_wrong_types() {
        let value = json!({"from": 3});
        assert_eq!(str_at(&value, &["from", "key_code"]), "");
        assert_eq!(str_at(&value, &["from"]), "");
        assert_eq!(str_at(&value, &["missing"]), "");
    }

    #[test]
    fn format_size_switches_units_at_one_kilobyte() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1024), "1.0 KB");
        assert_eq!(format_size(1536), "1.5 KB");
    }
}

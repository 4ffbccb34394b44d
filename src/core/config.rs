//! Purpose: Hold the editable sublayer model behind the CLI editing surface.
//! Exports: `CommandType`, `Action`, `Configuration`, `derived_description`, `last_char`.
//! Role: Plain-data form state; every edit replaces whole values.
//! Invariants: `sublayer_char` and action key codes hold at most one character.
//! Invariants: Action ids are unique within a configuration and never reused.

use serde::{Deserialize, Serialize};

use crate::core::error::{Error, ErrorKind};

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub enum CommandType {
    #[default]
    #[serde(rename = "shell_command")]
    ShellCommand,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    pub id: String,
    pub key_code: String,
    pub description: String,
    pub command_type: CommandType,
    pub command: String,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Configuration {
    pub sublayer_char: String,
    pub description: String,
    pub actions: Vec<Action>,
}

pub fn derived_description(sublayer_char: &str) -> String {
    format!("Hyper Key sublayer \"{sublayer_char}\"")
}

/// Keep only the final character of a key input. The form fields overwrite on
/// keystroke instead of appending, so longer input means the user retyped.
pub fn last_char(input: &str) -> String {
    input.chars().last().map(String::from).unwrap_or_default()
}

impl Configuration {
    pub fn new(sublayer_char: &str) -> Self {
        let sublayer_char = last_char(sublayer_char);
        let description = derived_description(&sublayer_char);
        Self {
            sublayer_char,
            description,
            actions: Vec::new(),
        }
    }

    /// Replace the sublayer character and re-derive the description. An empty
    /// input leaves the description alone so a half-cleared field does not
    /// wipe user edits.
    pub fn set_sublayer_char(&mut self, input: &str) {
        self.sublayer_char = last_char(input);
        if !self.sublayer_char.is_empty() {
            self.description = derived_description(&self.sublayer_char);
        }
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }

    /// Append an empty action and return its freshly assigned id.
    pub fn add_action(&mut self) -> String {
        let id = format!("action-{}", self.next_action_index());
        self.actions.push(Action {
            id: id.clone(),
            key_code: String::new(),
            description: String::new(),
            command_type: CommandType::ShellCommand,
            command: String::new(),
        });
        id
    }

    // Ids are never reused: the next index is one past the highest suffix
    // ever observed, not the current length.
    fn next_action_index(&self) -> usize {
        self.actions
            .iter()
            .filter_map(|action| action.id.strip_prefix("action-"))
            .filter_map(|suffix| suffix.parse::<usize>().ok())
            .max()
            .map_or(0, |highest| highest + 1)
    }

    pub fn action(&self, id: &str) -> Option<&Action> {
        self.actions.iter().find(|action| action.id == id)
    }

    fn action_mut(&mut self, id: &str) -> Result<&mut Action, Error> {
        self.actions
            .iter_mut()
            .find(|action| action.id == id)
            .ok_or_else(|| {
                Error::new(ErrorKind::NotFound)
                    .with_message(format!("no action with id {id}"))
                    .with_hint("List action ids with `hyperlayer action list`.")
            })
    }

    pub fn set_action_key(&mut self, id: &str, input: &str) -> Result<(), Error> {
        self.action_mut(id)?.key_code = last_char(input);
        Ok(())
    }

    pub fn set_action_description(
        &mut self,
        id: &str,
        description: impl Into<String>,
    ) -> Result<(), Error> {
        self.action_mut(id)?.description = description.into();
        Ok(())
    }

    pub fn set_action_command(&mut self, id: &str, command: impl Into<String>) -> Result<(), Error> {
        self.action_mut(id)?.command = command.into();
        Ok(())
    }

    pub fn set_action_command_type(&mut self, id: &str, kind: CommandType) -> Result<(), Error> {
        self.action_mut(id)?.command_type = kind;
        Ok(())
    }

    pub fn remove_action(&mut self, id: &str) -> Result<(), Error> {
        let before = self.actions.len();
        self.actions.retain(|action| action.id != id);
        if self.actions.len() == before {
            return Err(Error::new(ErrorKind::NotFound)
                .with_message(format!("no action with id {id}"))
                .with_hint("List action ids with `hyperlayer action list`."));
        }
        Ok(())
    }

    pub fn clear_actions(&mut self) {
        self.actions.clear();
    }

    /// Shape checks mirroring the editor's schema: a single sublayer
    /// character, and per action a single-character key, a description, and a
    /// command. Empty fields are fine while editing but not for export.
    pub fn validate_for_export(&self) -> Result<(), Error> {
        if self.sublayer_char.chars().count() != 1 {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("sublayer character must be exactly one character")
                .with_hint("Set it with `hyperlayer set --char <c>`."));
        }
        for action in &self.actions {
            if action.key_code.chars().count() != 1 {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message(format!("action {} has no trigger key", action.id))
                    .with_hint("Set it with `hyperlayer action update <id> --key <c>`."));
            }
            if action.description.is_empty() {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message(format!("action {} has no description", action.id))
                    .with_hint("Set it with `hyperlayer action update <id> --description <text>`."));
            }
            if action.command.is_empty() {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message(format!("action {} has no command", action.id))
                    .with_hint("Set it with `hyperlayer action update <id> --command <cmd>`."));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{Configuration, derived_description, last_char};
    use crate::core::error::ErrorKind;

    #[test]
    fn last_char_truncates_long_input() {
        assert_eq!(last_char("abc"), "c");
        assert_eq!(last_char("o"), "o");
        assert_eq!(last_char(""), "");
    }

    #[test]
    fn new_derives_description_from_char() {
        let config = Configuration::new("o");
        assert_eq!(config.sublayer_char, "o");
        assert_eq!(config.description, "Hyper Key sublayer \"o\"");
        assert!(config.actions.is_empty());
    }

    #[test]
    fn changing_char_rederives_description() {
        let mut config = Configuration::new("o");
        config.set_description("custom");
        config.set_sublayer_char("w");
        assert_eq!(config.description, derived_description("w"));
    }

    #[test]
    fn clearing_char_keeps_description() {
        let mut config = Configuration::new("o");
        config.set_description("custom");
        config.set_sublayer_char("");
        assert_eq!(config.sublayer_char, "");
        assert_eq!(config.description, "custom");
    }

    #[test]
    fn action_ids_are_never_reused() {
        let mut config = Configuration::new("o");
        let first = config.add_action();
        let second = config.add_action();
        assert_eq!(first, "action-0");
        assert_eq!(second, "action-1");

        config.remove_action(&second).expect("remove");
        let third = config.add_action();
        assert_eq!(third, "action-1");

        config.remove_action(&first).expect("remove");
        let fourth = config.add_action();
        assert_eq!(fourth, "action-2");
    }

    #[test]
    fn action_key_is_truncated_to_last_char() {
        let mut config = Configuration::new("o");
        let id = config.add_action();
        config.set_action_key(&id, "abc").expect("set key");
        assert_eq!(config.action(&id).expect("action").key_code, "c");
    }

    #[test]
    fn updating_missing_action_is_not_found() {
        let mut config = Configuration::new("o");
        let err = config.set_action_key("action-9", "f").expect_err("missing");
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn export_validation_requires_complete_fields() {
        let mut config = Configuration::new("o");
        assert!(config.validate_for_export().is_ok());

        let id = config.add_action();
        let err = config.validate_for_export().expect_err("empty action");
        assert_eq!(err.kind(), ErrorKind::Usage);

        config.set_action_key(&id, "f").expect("key");
        config.set_action_description(&id, "Open Finder").expect("descr");
        config.set_action_command(&id, "open ~/").expect("command");
        assert!(config.validate_for_export().is_ok());

        config.set_sublayer_char("");
        assert!(config.validate_for_export().is_err());
    }

    #[test]
    fn draft_serde_uses_editor_field_names() {
        let mut config = Configuration::new("o");
        let id = config.add_action();
        config.set_action_key(&id, "f").expect("key");

        let value = serde_json::to_value(&config).expect("serialize");
        assert_eq!(value["sublayerChar"], "o");
        assert_eq!(value["actions"][0]["keyCode"], "f");
        assert_eq!(value["actions"][0]["commandType"], "shell_command");

        let back: Configuration = serde_json::from_value(value).expect("deserialize");
        assert_eq!(back, config);
    }
}

//! Purpose: Locate, load, and save the draft configuration file.
//! Exports: `default_draft_path`, `load`, `save`.
//! Role: Keep the CLI's form state in one JSON file, replaced whole on save.
//! Invariants: The default draft lives at `~/.hyperlayer/draft.json`.
//! Invariants: Saves write the full serialized configuration, never a patch.

use std::fs;
use std::path::{Path, PathBuf};

use hyperlayer::core::config::Configuration;
use hyperlayer::core::error::{Error, ErrorKind};

pub(crate) fn default_draft_path() -> PathBuf {
    let home = std::env::var_os("HOME").unwrap_or_default();
    PathBuf::from(home).join(".hyperlayer").join("draft.json")
}

pub(crate) fn load(path: &Path) -> Result<Configuration, Error> {
    let text = fs::read_to_string(path).map_err(|err| {
        if err.kind() == std::io::ErrorKind::NotFound {
            Error::new(ErrorKind::NotFound)
                .with_message("no draft found")
                .with_path(path)
                .with_hint(
                    "Create one with `hyperlayer new <char>` or import an existing document.",
                )
        } else {
            Error::new(ErrorKind::Io)
                .with_message("failed to read draft")
                .with_path(path)
                .with_source(err)
        }
    })?;
    serde_json::from_str(&text).map_err(|err| {
        Error::new(ErrorKind::Invalid)
            .with_message("draft file is not a valid configuration")
            .with_path(path)
            .with_hint("Recreate it with `hyperlayer new <char> --force`.")
            .with_source(err)
    })
}

pub(crate) fn save(path: &Path, config: &Configuration) -> Result<(), Error> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|err| {
                Error::new(ErrorKind::Io)
                    .with_message("failed to create draft directory")
                    .with_path(parent)
                    .with_source(err)
            })?;
        }
    }
    let mut text = serde_json::to_string_pretty(config).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("failed to encode draft")
            .with_source(err)
    })?;
    text.push('\n');
    fs::write(path, text).map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to write draft")
            .with_path(path)
            .with_source(err)
    })
}

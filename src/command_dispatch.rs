//! Purpose: Hold top-level CLI command dispatch for `hyperlayer`.
//! Exports: `dispatch_command`.
//! Role: Keep `main.rs` focused on parse/bootstrap and delegate execution.
//! Invariants: A failed import leaves the draft file byte-identical.
//! Invariants: Output envelopes and exit-code semantics stay stable.

use super::*;

use hyperlayer::core::config::Configuration;
use hyperlayer::core::hyperkey::{self, HyperKeyRule};
use hyperlayer::core::rules;

pub(super) fn dispatch_command(
    command: Command,
    draft_path: PathBuf,
    color_mode: ColorMode,
) -> Result<RunOutcome, Error> {
    match command {
        Command::Completion { shell } => {
            let mut cmd = Cli::command();
            clap_complete::aot::generate(shell, &mut cmd, "hyperlayer", &mut io::stdout());
            Ok(RunOutcome::ok())
        }
        Command::New {
            sublayer_char,
            force,
        } => {
            if draft_path.exists() && !force {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message("draft already exists")
                    .with_path(&draft_path)
                    .with_hint(
                        "Re-run with --force to replace it, or pass --draft for a different file.",
                    ));
            }
            let config = Configuration::new(&sublayer_char);
            if config.sublayer_char.is_empty() {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message("sublayer character must not be empty")
                    .with_hint("Pass a single character, e.g. `hyperlayer new o`."));
            }
            draft_store::save(&draft_path, &config)?;
            emit_draft_summary(&config, &draft_path, color_mode);
            Ok(RunOutcome::ok())
        }
        Command::Set {
            sublayer_char,
            description,
        } => {
            if sublayer_char.is_none() && description.is_none() {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message("nothing to set")
                    .with_hint("Pass --char and/or --description."));
            }
            let mut config = draft_store::load(&draft_path)?;
            if let Some(sublayer_char) = sublayer_char {
                config.set_sublayer_char(&sublayer_char);
            }
            if let Some(description) = description {
                config.set_description(description);
            }
            draft_store::save(&draft_path, &config)?;
            emit_draft_summary(&config, &draft_path, color_mode);
            Ok(RunOutcome::ok())
        }
        Command::Action(action) => dispatch_action(action, &draft_path, color_mode),
        Command::Show => {
            let config = draft_store::load(&draft_path)?;
            let document = rules::generate(&config);
            let value = serde_json::to_value(&document).map_err(encode_error)?;
            emit_pretty_json(&value, color_mode);
            Ok(RunOutcome::ok())
        }
        Command::Info { json } => {
            let config = draft_store::load(&draft_path)?;
            let document = rules::generate(&config);
            let rendered = rules::render(&document)?;
            if json {
                emit_json(
                    json!({
                        "draft": {
                            "path": draft_path.display().to_string(),
                            "sublayerChar": config.sublayer_char,
                            "description": config.description,
                            "actions": config.actions.len(),
                            "renderedBytes": rendered.len(),
                            "renderedSize": rules::format_size(rendered.len()),
                        }
                    }),
                    color_mode,
                );
            } else {
                println!("Sublayer     {}", display_or_dash(&config.sublayer_char));
                println!("Description  {}", config.description);
                println!("Actions      {}", config.actions.len());
                println!("Rendered     {}", rules::format_size(rendered.len()));
                println!("Draft        {}", draft_path.display());
            }
            Ok(RunOutcome::ok())
        }
        Command::Import { file } => {
            let text = match &file {
                Some(path) => std::fs::read_to_string(path).map_err(|err| {
                    if err.kind() == std::io::ErrorKind::NotFound {
                        Error::new(ErrorKind::NotFound)
                            .with_message("document file not found")
                            .with_path(path)
                    } else {
                        Error::new(ErrorKind::Io)
                            .with_message("failed to read document")
                            .with_path(path)
                            .with_source(err)
                    }
                })?,
                None => read_stdin_text()?,
            };
            // Parse before touching the draft; a failure here must leave it
            // byte-identical.
            let config = rules::parse(&text)?;
            draft_store::save(&draft_path, &config)?;
            emit_draft_summary(&config, &draft_path, color_mode);
            Ok(RunOutcome::ok())
        }
        Command::Export { out, timestamp } => {
            let config = draft_store::load(&draft_path)?;
            config.validate_for_export()?;
            let document = rules::generate(&config);
            let rendered = rules::render(&document)?;

            let file_name = if timestamp {
                format!("karabiner-sublayer-{}.json", file_stamp()?)
            } else {
                format!("karabiner-sublayer-{}.json", config.sublayer_char)
            };
            let out_dir = out.unwrap_or_else(|| PathBuf::from("."));
            std::fs::create_dir_all(&out_dir).map_err(|err| {
                Error::new(ErrorKind::Io)
                    .with_message("failed to create output directory")
                    .with_path(&out_dir)
                    .with_source(err)
            })?;
            let out_path = out_dir.join(file_name);
            write_document(&out_path, &rendered)?;
            report_exported(&out_path, rendered.len(), color_mode);
            Ok(RunOutcome::ok())
        }
        Command::Copy => {
            let config = draft_store::load(&draft_path)?;
            let document = rules::generate(&config);
            let rendered = rules::render(&document)?;
            copy_to_clipboard(&rendered)?;
            report_copied(rendered.len(), color_mode);
            Ok(RunOutcome::ok())
        }
        Command::Hyperkey(args) => {
            if !hyperkey::HYPER_KEYS.contains(&args.key.as_str()) {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message(format!("{} is not a supported hyper key", args.key))
                    .with_hint(format!(
                        "Choose one of: {}.",
                        hyperkey::HYPER_KEYS.join(", ")
                    )));
            }
            let mut rule = HyperKeyRule::new()
                .with_description(&args.description)
                .with_hyper_key(&args.key)
                .with_variable(&args.variable);
            if let Some(alone) = &args.alone {
                rule = rule.with_alone_key(alone);
            }
            for modifier in &args.modifiers {
                if !hyperkey::MODIFIER_KEYS.contains(&modifier.as_str()) {
                    return Err(Error::new(ErrorKind::Usage)
                        .with_message(format!("{modifier} is not a supported modifier"))
                        .with_hint(format!(
                            "Choose from: {}.",
                            hyperkey::MODIFIER_KEYS.join(", ")
                        )));
                }
                rule.add_modifier(modifier);
            }

            let document = rule.generate()?;
            let rendered = rules::render(&document)?;
            if args.copy {
                copy_to_clipboard(&rendered)?;
                report_copied(rendered.len(), color_mode);
            } else if args.export {
                let file_name = format!("hyperkey-config-{}.json", file_stamp()?);
                let out_dir = args.out.unwrap_or_else(|| PathBuf::from("."));
                std::fs::create_dir_all(&out_dir).map_err(|err| {
                    Error::new(ErrorKind::Io)
                        .with_message("failed to create output directory")
                        .with_path(&out_dir)
                        .with_source(err)
                })?;
                let out_path = out_dir.join(file_name);
                write_document(&out_path, &rendered)?;
                report_exported(&out_path, rendered.len(), color_mode);
            } else {
                let value = serde_json::to_value(&document).map_err(encode_error)?;
                emit_pretty_json(&value, color_mode);
            }
            Ok(RunOutcome::ok())
        }
        Command::Serve {
            bind,
            dir,
            allow_non_loopback,
        } => {
            let bind: SocketAddr = bind.parse().map_err(|_| {
                Error::new(ErrorKind::Usage)
                    .with_message("invalid bind address")
                    .with_hint("Use a host:port value like 127.0.0.1:9717.")
            })?;
            let config = serve::ServeConfig {
                bind,
                root: dir,
                allow_non_loopback,
            };
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .map_err(|err| {
                    Error::new(ErrorKind::Internal)
                        .with_message("failed to start runtime")
                        .with_source(err)
                })?;
            runtime.block_on(serve::serve(config))?;
            Ok(RunOutcome::ok())
        }
    }
}

fn dispatch_action(
    command: ActionCommand,
    draft_path: &Path,
    color_mode: ColorMode,
) -> Result<RunOutcome, Error> {
    match command {
        ActionCommand::Add {
            key,
            description,
            command,
        } => {
            let mut config = draft_store::load(draft_path)?;
            let id = config.add_action();
            if let Some(key) = key {
                config.set_action_key(&id, &key)?;
            }
            if let Some(description) = description {
                config.set_action_description(&id, description)?;
            }
            if let Some(command) = command {
                config.set_action_command(&id, command)?;
            }
            draft_store::save(draft_path, &config)?;
            if io::stdout().is_terminal() {
                println!("Added {id}");
            } else if let Some(action) = config.action(&id) {
                let value = serde_json::to_value(action).map_err(encode_error)?;
                emit_json(json!({ "added": value }), color_mode);
            }
            Ok(RunOutcome::ok())
        }
        ActionCommand::Update {
            id,
            key,
            description,
            command,
        } => {
            if key.is_none() && description.is_none() && command.is_none() {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message("nothing to update")
                    .with_hint("Pass --key, --description, or --command."));
            }
            let mut config = draft_store::load(draft_path)?;
            if let Some(key) = key {
                config.set_action_key(&id, &key)?;
            }
            if let Some(description) = description {
                config.set_action_description(&id, description)?;
            }
            if let Some(command) = command {
                config.set_action_command(&id, command)?;
            }
            draft_store::save(draft_path, &config)?;
            if io::stdout().is_terminal() {
                println!("Updated {id}");
            } else if let Some(action) = config.action(&id) {
                let value = serde_json::to_value(action).map_err(encode_error)?;
                emit_json(json!({ "updated": value }), color_mode);
            }
            Ok(RunOutcome::ok())
        }
        ActionCommand::Delete { ids } => {
            let mut config = draft_store::load(draft_path)?;
            for id in &ids {
                config.remove_action(id)?;
            }
            draft_store::save(draft_path, &config)?;
            if io::stdout().is_terminal() {
                println!("Deleted {} actions", ids.len());
            } else {
                emit_json(json!({ "deleted": ids }), color_mode);
            }
            Ok(RunOutcome::ok())
        }
        ActionCommand::Clear => {
            let mut config = draft_store::load(draft_path)?;
            let cleared = config.actions.len();
            config.clear_actions();
            draft_store::save(draft_path, &config)?;
            if io::stdout().is_terminal() {
                println!("Cleared {cleared} actions");
            } else {
                emit_json(json!({ "cleared": cleared }), color_mode);
            }
            Ok(RunOutcome::ok())
        }
        ActionCommand::List { json } => {
            let config = draft_store::load(draft_path)?;
            if json {
                let actions = serde_json::to_value(&config.actions).map_err(encode_error)?;
                emit_json(json!({ "actions": actions }), color_mode);
            } else if config.actions.is_empty() {
                println!("No actions configured. Add one with `hyperlayer action add`.");
            } else {
                let rows: Vec<Vec<String>> = config
                    .actions
                    .iter()
                    .map(|action| {
                        vec![
                            action.id.clone(),
                            display_or_dash(&action.key_code),
                            action.description.clone(),
                            action.command.clone(),
                        ]
                    })
                    .collect();
                emit_table(&["ID", "KEY", "DESCRIPTION", "COMMAND"], &rows);
            }
            Ok(RunOutcome::ok())
        }
    }
}

fn emit_draft_summary(config: &Configuration, path: &Path, color_mode: ColorMode) {
    if io::stdout().is_terminal() {
        println!("Sublayer     {}", display_or_dash(&config.sublayer_char));
        println!("Description  {}", config.description);
        println!("Actions      {}", config.actions.len());
        println!("Draft        {}", path.display());
    } else {
        emit_json(
            json!({
                "draft": {
                    "path": path.display().to_string(),
                    "sublayerChar": config.sublayer_char,
                    "description": config.description,
                    "actions": config.actions.len(),
                }
            }),
            color_mode,
        );
    }
}

fn display_or_dash(value: &str) -> String {
    if value.is_empty() {
        "-".to_string()
    } else {
        value.to_string()
    }
}

fn encode_error(err: serde_json::Error) -> Error {
    Error::new(ErrorKind::Internal)
        .with_message("failed to encode document")
        .with_source(err)
}

fn write_document(path: &Path, rendered: &str) -> Result<(), Error> {
    std::fs::write(path, rendered).map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to write document")
            .with_path(path)
            .with_source(err)
    })
}

fn report_exported(path: &Path, bytes: usize, color_mode: ColorMode) {
    if io::stdout().is_terminal() {
        println!("Exported {} ({})", path.display(), rules::format_size(bytes));
    } else {
        emit_json(
            json!({
                "exported": {
                    "path": path.display().to_string(),
                    "bytes": bytes,
                }
            }),
            color_mode,
        );
    }
}

fn report_copied(bytes: usize, color_mode: ColorMode) {
    if io::stdout().is_terminal() {
        println!(
            "Copied rule document to clipboard ({})",
            rules::format_size(bytes)
        );
    } else {
        emit_json(json!({ "copied": { "bytes": bytes } }), color_mode);
    }
}

fn copy_to_clipboard(text: &str) -> Result<(), Error> {
    let mut clipboard = arboard::Clipboard::new().map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("clipboard is unavailable")
            .with_hint("Use `hyperlayer export` or `hyperlayer show` instead.")
            .with_source(err)
    })?;
    clipboard.set_text(text).map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to copy to clipboard")
            .with_source(err)
    })
}

fn file_stamp() -> Result<String, Error> {
    use time::format_description::well_known::Rfc3339;
    let now = time::OffsetDateTime::now_utc()
        .replace_nanosecond(0)
        .map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message("invalid timestamp")
                .with_source(err)
        })?;
    let stamp = now.format(&Rfc3339).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("timestamp format failed")
            .with_source(err)
    })?;
    Ok(stamp.chars().filter(|c| c.is_ascii_alphanumeric()).collect())
}

//! Purpose: `hyperlayer` CLI entry point and command-line definitions.
//! Role: Binary crate root; parses args, runs commands, emits JSON on stdout.
//! Invariants: Human output goes to a tty; non-interactive errors are JSON on stderr.
//! Invariants: Process exit code is derived from `core::error::to_exit_code`.
//! Invariants: All draft mutations replace the whole file via `draft_store`.
use std::fmt::Write as _;
use std::io::{self, IsTerminal, Read};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use clap::{
    Args, CommandFactory, Parser, Subcommand, ValueEnum, ValueHint,
    error::ErrorKind as ClapErrorKind,
};
use clap_complete::aot::Shell;
use serde_json::{Map, Value, json};

mod color_json;
mod command_dispatch;
mod draft_store;
mod serve;

use color_json::colorize_json;
use hyperlayer::core::error::{Error, ErrorKind, to_exit_code};

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }

    fn with_code(exit_code: i32) -> Self {
        Self { exit_code }
    }
}

fn main() {
    let exit_code = match run() {
        Ok(outcome) => outcome.exit_code,
        Err((err, color_mode)) => {
            emit_error(&err, color_mode);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<RunOutcome, (Error, ColorMode)> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    (
                        Error::new(ErrorKind::Io)
                            .with_message("failed to write help")
                            .with_source(io_err),
                        ColorMode::Auto,
                    )
                })?;
                let exit_code = if matches!(
                    err.kind(),
                    ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                ) {
                    2
                } else {
                    0
                };
                return Ok(RunOutcome::with_code(exit_code));
            }
            _ => {
                return Err((
                    Error::new(ErrorKind::Usage)
                        .with_message(clap_error_summary(&err))
                        .with_hint("Run `hyperlayer --help` for usage."),
                    ColorMode::Auto,
                ));
            }
        },
    };

    let draft_path = cli.draft.unwrap_or_else(draft_store::default_draft_path);
    let color_mode = cli.color;

    command_dispatch::dispatch_command(cli.command, draft_path, color_mode)
        .map_err(|err| (err, color_mode))
}

fn clap_error_summary(err: &clap::Error) -> String {
    let rendered = err.render().to_string();
    rendered
        .lines()
        .find(|line| !line.trim().is_empty())
        .unwrap_or("invalid arguments")
        .trim_start_matches("error: ")
        .to_string()
}

#[derive(Parser)]
#[command(
    name = "hyperlayer",
    version,
    about = "Build and import Karabiner-Elements Hyper Key sublayer rules",
    help_template = r#"{about-with-newline}
{before-help}USAGE
  {usage}

COMMANDS
{subcommands}

OPTIONS
{options}

{after-help}
"#,
    long_about = None,
    before_help = r#"Edits a draft sublayer configuration and renders it as a Karabiner
rule document.

Mental model:
  - `set` / `action` edit the draft (the form state)
  - `show` prints the generated rule document (live preview)
  - `import` replaces the draft from an existing document
"#,
    after_help = r#"EXAMPLES
  $ hyperlayer new o
  $ hyperlayer action add --key f --description "Open Finder" --command "open ~/"
  $ hyperlayer show
  $ hyperlayer export

LEARN MORE
  $ hyperlayer <command> --help"#,
    arg_required_else_help = true,
    disable_help_subcommand = false
)]
struct Cli {
    #[arg(
        long,
        help = "Draft file holding the editable configuration (default: ~/.hyperlayer/draft.json)",
        value_hint = ValueHint::FilePath
    )]
    draft: Option<PathBuf>,
    #[arg(
        long,
        default_value = "auto",
        value_enum,
        help = "Colorize stderr diagnostics and pretty JSON output: auto|always|never"
    )]
    color: ColorMode,

    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ColorMode {
    Auto,
    Always,
    Never,
}

impl ColorMode {
    fn use_color(self, is_tty: bool) -> bool {
        match self {
            ColorMode::Auto => is_tty,
            ColorMode::Always => true,
            ColorMode::Never => false,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    #[command(about = "Create a new draft for a sublayer character")]
    New {
        #[arg(value_name = "CHAR", help = "The key held after the hyper key")]
        sublayer_char: String,
        #[arg(long, help = "Replace an existing draft")]
        force: bool,
    },
    #[command(about = "Edit the draft's sublayer character or description")]
    Set {
        #[arg(
            long = "char",
            value_name = "CHAR",
            help = "New sublayer character (re-derives the description)"
        )]
        sublayer_char: Option<String>,
        #[arg(long, help = "New description")]
        description: Option<String>,
    },
    #[command(about = "Manage the draft's key-to-command actions", subcommand)]
    Action(ActionCommand),
    #[command(about = "Print the generated rule document (live preview)")]
    Show,
    #[command(about = "Summarize the draft and its rendered size")]
    Info {
        #[arg(long, help = "Emit a JSON summary")]
        json: bool,
    },
    #[command(about = "Replace the draft from an existing rule document")]
    Import {
        #[arg(
            value_name = "FILE",
            help = "Document file (reads stdin when omitted)",
            value_hint = ValueHint::FilePath
        )]
        file: Option<PathBuf>,
    },
    #[command(about = "Write the rule document to a JSON file")]
    Export {
        #[arg(
            long,
            help = "Output directory (default: current directory)",
            value_hint = ValueHint::DirPath
        )]
        out: Option<PathBuf>,
        #[arg(
            long,
            help = "Name the file with a UTC timestamp instead of the sublayer character"
        )]
        timestamp: bool,
    },
    #[command(about = "Copy the rule document to the system clipboard")]
    Copy,
    #[command(about = "Build a hyper key rule document")]
    Hyperkey(HyperkeyArgs),
    #[command(about = "Serve a directory of static editor assets over HTTP")]
    Serve {
        #[arg(long, default_value = "127.0.0.1:9717", help = "Bind address")]
        bind: String,
        #[arg(
            long,
            default_value = ".",
            help = "Directory of static files to serve",
            value_hint = ValueHint::DirPath
        )]
        dir: PathBuf,
        #[arg(long, help = "Allow binding to non-loopback addresses")]
        allow_non_loopback: bool,
    },
    #[command(about = "Generate shell completions")]
    Completion {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum ActionCommand {
    #[command(about = "Append an action to the draft")]
    Add {
        #[arg(
            long,
            value_name = "CHAR",
            help = "Trigger key (longer input keeps only the last character)"
        )]
        key: Option<String>,
        #[arg(long, help = "Action description")]
        description: Option<String>,
        #[arg(long, help = "Shell command to run")]
        command: Option<String>,
    },
    #[command(about = "Update one action's fields by id")]
    Update {
        #[arg(value_name = "ID")]
        id: String,
        #[arg(long, value_name = "CHAR")]
        key: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        command: Option<String>,
    },
    #[command(about = "Delete actions by id")]
    Delete {
        #[arg(value_name = "ID", required = true)]
        ids: Vec<String>,
    },
    #[command(about = "Remove every action from the draft")]
    Clear,
    #[command(about = "List the draft's actions")]
    List {
        #[arg(long, help = "Emit the actions as JSON")]
        json: bool,
    },
}

#[derive(Args)]
struct HyperkeyArgs {
    #[arg(long, help = "Rule description")]
    description: String,
    #[arg(long = "key", help = "Physical key mapped to hyper (e.g. caps_lock)")]
    key: String,
    #[arg(
        long,
        default_value = "hyper",
        help = "State variable raised while the key is held (empty disables it)"
    )]
    variable: String,
    #[arg(
        long = "modifier",
        value_name = "KEY",
        help = "Modifier emitted while the key is held (repeatable)"
    )]
    modifiers: Vec<String>,
    #[arg(long, value_name = "KEY", help = "Key to send when pressed alone")]
    alone: Option<String>,
    #[arg(long, help = "Write the document to a timestamped file instead of stdout")]
    export: bool,
    #[arg(
        long,
        help = "Output directory for --export (default: current directory)",
        value_hint = ValueHint::DirPath
    )]
    out: Option<PathBuf>,
    #[arg(long, help = "Copy the document to the clipboard instead of stdout")]
    copy: bool,
}

fn emit_json(value: Value, color_mode: ColorMode) {
    let is_tty = io::stdout().is_terminal();
    let use_color = color_mode.use_color(is_tty);
    let pretty = is_tty || use_color;
    let json = if pretty {
        if use_color {
            colorize_json(&value, true)
        } else {
            serde_json::to_string_pretty(&value)
                .unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string())
        }
    } else {
        serde_json::to_string(&value)
            .unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string())
    };
    println!("{json}");
}

// Documents are always pretty-printed; the preview contract is two-space
// indentation whether or not stdout is a terminal.
fn emit_pretty_json(value: &Value, color_mode: ColorMode) {
    let use_color = color_mode.use_color(io::stdout().is_terminal());
    if use_color {
        println!("{}", colorize_json(value, true));
    } else {
        println!(
            "{}",
            serde_json::to_string_pretty(value)
                .unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string())
        );
    }
}

fn emit_table(headers: &[&str], rows: &[Vec<String>]) {
    let mut widths: Vec<usize> = headers.iter().map(|header| header.len()).collect();
    for row in rows {
        for (index, cell) in row.iter().enumerate() {
            if index < widths.len() && cell.len() > widths[index] {
                widths[index] = cell.len();
            }
        }
    }

    let render_row = |cells: &[String]| {
        let mut line = String::new();
        for (index, cell) in cells.iter().enumerate() {
            if index > 0 {
                line.push_str("  ");
            }
            let _ = write!(line, "{cell:<width$}", width = widths[index]);
        }
        line.trim_end().to_string()
    };

    let header_cells: Vec<String> = headers.iter().map(|header| header.to_string()).collect();
    println!("{}", render_row(&header_cells));
    for row in rows {
        println!("{}", render_row(row));
    }
}

fn read_stdin_text() -> Result<String, Error> {
    let mut text = String::new();
    io::stdin().read_to_string(&mut text).map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to read stdin")
            .with_source(err)
    })?;
    Ok(text)
}

fn emit_error(err: &Error, color_mode: ColorMode) {
    let is_tty = io::stderr().is_terminal();
    if is_tty {
        eprintln!("{}", error_text(err, color_mode.use_color(is_tty)));
        return;
    }

    let value = error_json(err);
    let json = serde_json::to_string(&value).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn error_text(err: &Error, use_color: bool) -> String {
    let mut text = String::new();
    let label = if use_color {
        "\u{1b}[31merror\u{1b}[0m"
    } else {
        "error"
    };
    let _ = write!(text, "{label}: {}", error_message(err));
    if let Some(path) = err.path() {
        let _ = write!(text, "\n  path: {}", path.display());
    }
    for cause in error_causes(err) {
        let _ = write!(text, "\n  cause: {cause}");
    }
    if let Some(hint) = err.hint() {
        let _ = write!(text, "\n  hint: {hint}");
    }
    text
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    inner.insert("message".to_string(), json!(error_message(err)));
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    if let Some(path) = err.path() {
        inner.insert("path".to_string(), json!(path.display().to_string()));
    }
    let causes = error_causes(err);
    if !causes.is_empty() {
        inner.insert("causes".to_string(), json!(causes));
    }

    let mut outer = Map::new();
    outer.insert("error".to_string(), Value::Object(inner));
    Value::Object(outer)
}

fn error_message(err: &Error) -> String {
    err.message()
        .map(str::to_string)
        .unwrap_or_else(|| format!("{:?}", err.kind()))
}

fn error_causes(err: &Error) -> Vec<String> {
    let mut causes = Vec::new();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        causes.push(cause.to_string());
        source = std::error::Error::source(cause);
    }
    causes
}

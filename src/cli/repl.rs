//! Lightweight REPL (Read-Eval-Print-Loop) for memo-cli.
//!
//! Plain text is sent as a chat message to the selected target. Lines starting
//! with `/` are commands; `/help` lists them.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::Result;

use crate::preferences::Toggle;

use super::bootstrap::CliContext;
use super::runner::execute_once;

pub const HELP: &str = "\
Commands:
  /targets                 list targets
  /select <id>             select a target and load its schema
  /form                    show the form for the selected target
  /set <field>=<value>     set a form field (comma-separate multi-select values)
  /preview                 load the target content preview
  /image <path>            attach an image to the next message
  /image clear             drop the attached image
  /save                    save the form to the selected target
  /newpage <name>          create a page and select it
  /models                  list models
  /model <id|auto>         choose a model
  /prompt [text]           show or set the system prompt for the target
  /prompt reset            go back to the default prompt
  /toggle <name> <on|off>  model-info | reference
  /history                 show chat history
  /clear                   clear chat history
  /quit                    exit";

/// REPL command variants.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplCommand {
    Quit,
    Help,
    Targets,
    Select(String),
    Form,
    Set { field: String, value: String },
    Preview,
    Image(PathBuf),
    ClearImage,
    Save,
    NewPage(String),
    Models,
    /// `None` selects automatically
    Model(Option<String>),
    /// `None` shows the current prompt
    Prompt(Option<String>),
    PromptReset,
    Toggle(Toggle, bool),
    History,
    Clear,
    /// Unknown or malformed command (will show help)
    Unknown(String),
    /// Chat message for the selected target
    Message(String),
    /// Empty input (skip)
    Empty,
}

impl ReplCommand {
    /// Parse user input into a REPL command.
    pub fn parse(input: &str) -> Self {
        let trimmed = input.trim();

        if trimmed.is_empty() {
            return ReplCommand::Empty;
        }

        let Some(command) = trimmed.strip_prefix('/') else {
            return ReplCommand::Message(trimmed.to_string());
        };

        let (name, rest) = match command.split_once(char::is_whitespace) {
            Some((name, rest)) => (name.to_lowercase(), rest.trim()),
            None => (command.to_lowercase(), ""),
        };
        let unknown = || ReplCommand::Unknown(trimmed.to_string());

        match (name.as_str(), rest) {
            ("quit" | "exit" | "q", _) => ReplCommand::Quit,
            ("help" | "h", _) => ReplCommand::Help,
            ("targets", _) => ReplCommand::Targets,
            ("select", "") => unknown(),
            ("select", id) => ReplCommand::Select(id.to_string()),
            ("form", _) => ReplCommand::Form,
            ("set", assignment) => match assignment.split_once('=') {
                Some((field, value)) if !field.trim().is_empty() => ReplCommand::Set {
                    field: field.trim().to_string(),
                    value: value.trim().to_string(),
                },
                _ => unknown(),
            },
            ("preview", _) => ReplCommand::Preview,
            ("image", "") => unknown(),
            ("image", "clear") => ReplCommand::ClearImage,
            ("image", path) => ReplCommand::Image(PathBuf::from(path)),
            ("save", _) => ReplCommand::Save,
            ("newpage", "") => unknown(),
            ("newpage", name) => ReplCommand::NewPage(name.to_string()),
            ("models", _) => ReplCommand::Models,
            ("model", "" | "auto") => ReplCommand::Model(None),
            ("model", id) => ReplCommand::Model(Some(id.to_string())),
            ("prompt", "") => ReplCommand::Prompt(None),
            ("prompt", "reset") => ReplCommand::PromptReset,
            ("prompt", text) => ReplCommand::Prompt(Some(text.to_string())),
            ("toggle", args) => {
                let mut parts = args.split_whitespace();
                let toggle = parts.next().and_then(Toggle::parse);
                let value = match parts.next() {
                    Some("on" | "true" | "yes") => Some(true),
                    Some("off" | "false" | "no") => Some(false),
                    _ => None,
                };
                match (toggle, value) {
                    (Some(toggle), Some(value)) => ReplCommand::Toggle(toggle, value),
                    _ => unknown(),
                }
            }
            ("history", _) => ReplCommand::History,
            ("clear", _) => ReplCommand::Clear,
            _ => unknown(),
        }
    }
}

/// Run an interactive REPL session.
///
/// Returns when the user exits or on EOF (Ctrl+D).
pub async fn run_repl(ctx: &mut CliContext) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    eprintln!("memo-cli interactive mode");
    eprintln!("Type /help for commands, /quit to exit\n");

    loop {
        let prompt = match ctx.controller.state().selected_target() {
            Some(target) => format!("{}> ", target.title),
            None => "> ".to_string(),
        };
        print!("{}", prompt);
        stdout.flush()?;

        let mut input = String::new();
        if stdin.lock().read_line(&mut input)? == 0 {
            eprintln!("\nGoodbye!");
            break;
        }

        match ReplCommand::parse(&input) {
            ReplCommand::Empty => continue,
            ReplCommand::Quit => {
                eprintln!("Goodbye!");
                break;
            }
            command => {
                if let Err(e) = execute_once(ctx, command).await {
                    eprintln!("Error: {}", e);
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    mod parse_tests {
        use super::*;

        #[test]
        fn parses_quit_aliases_case_insensitive() {
            assert_eq!(ReplCommand::parse("/quit"), ReplCommand::Quit);
            assert_eq!(ReplCommand::parse("/EXIT"), ReplCommand::Quit);
            assert_eq!(ReplCommand::parse("  /q  "), ReplCommand::Quit);
        }

        #[test]
        fn parses_message() {
            assert_eq!(
                ReplCommand::parse("buy milk\n"),
                ReplCommand::Message("buy milk".to_string())
            );
            // Slash in the middle is not a command
            assert_eq!(
                ReplCommand::parse("read /tmp/notes.txt"),
                ReplCommand::Message("read /tmp/notes.txt".to_string())
            );
        }

        #[test]
        fn parses_empty_input() {
            assert_eq!(ReplCommand::parse(""), ReplCommand::Empty);
            assert_eq!(ReplCommand::parse("\t\n"), ReplCommand::Empty);
        }

        #[test]
        fn parses_select_and_missing_argument() {
            assert_eq!(
                ReplCommand::parse("/select db1"),
                ReplCommand::Select("db1".to_string())
            );
            assert_eq!(
                ReplCommand::parse("/select"),
                ReplCommand::Unknown("/select".to_string())
            );
        }

        #[test]
        fn parses_set_with_spaces_in_field() {
            assert_eq!(
                ReplCommand::parse("/set Due Date = 2024-05-01"),
                ReplCommand::Set {
                    field: "Due Date".to_string(),
                    value: "2024-05-01".to_string()
                }
            );
            assert!(matches!(
                ReplCommand::parse("/set nothing"),
                ReplCommand::Unknown(_)
            ));
        }

        #[test]
        fn parses_image_commands() {
            assert_eq!(
                ReplCommand::parse("/image ~/shot.png"),
                ReplCommand::Image(PathBuf::from("~/shot.png"))
            );
            assert_eq!(ReplCommand::parse("/image clear"), ReplCommand::ClearImage);
        }

        #[test]
        fn parses_model_and_prompt() {
            assert_eq!(ReplCommand::parse("/model auto"), ReplCommand::Model(None));
            assert_eq!(
                ReplCommand::parse("/model gemini-2.5-flash"),
                ReplCommand::Model(Some("gemini-2.5-flash".to_string()))
            );
            assert_eq!(ReplCommand::parse("/prompt"), ReplCommand::Prompt(None));
            assert_eq!(ReplCommand::parse("/prompt reset"), ReplCommand::PromptReset);
            assert_eq!(
                ReplCommand::parse("/prompt Be brief"),
                ReplCommand::Prompt(Some("Be brief".to_string()))
            );
        }

        #[test]
        fn parses_toggles() {
            assert_eq!(
                ReplCommand::parse("/toggle reference on"),
                ReplCommand::Toggle(Toggle::IncludeReference, true)
            );
            assert_eq!(
                ReplCommand::parse("/toggle model-info off"),
                ReplCommand::Toggle(Toggle::ShowModelInfo, false)
            );
            assert!(matches!(
                ReplCommand::parse("/toggle reference maybe"),
                ReplCommand::Unknown(_)
            ));
        }

        #[test]
        fn parses_unknown_command() {
            assert_eq!(
                ReplCommand::parse("/tools"),
                ReplCommand::Unknown("/tools".to_string())
            );
        }
    }
}

//! CLI execution runner.
//!
//! Dispatches parsed REPL commands to the controller and renders the results.

use std::path::Path;

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;

use crate::controller::AppController;
use crate::error::ClientError;

use super::bootstrap::CliContext;
use super::output;
use super::repl::{ReplCommand, HELP};

/// Run one command and print the events it produced.
///
/// Problems the controller already reported as notices are not returned as
/// errors a second time.
pub async fn execute_once(ctx: &mut CliContext, command: ReplCommand) -> Result<()> {
    let result = dispatch(&mut ctx.controller, command, ctx.args.quiet).await;
    output::drain_events(&mut ctx.event_rx, ctx.args.json, ctx.args.quiet)?;

    match result {
        Err(e) => match e.downcast_ref::<ClientError>() {
            Some(reported) => {
                tracing::debug!("Command failed: {}", reported);
                Ok(())
            }
            None => Err(e),
        },
        ok => ok,
    }
}

async fn dispatch(
    controller: &mut AppController,
    command: ReplCommand,
    quiet: bool,
) -> Result<()> {
    match command {
        ReplCommand::Empty | ReplCommand::Quit => {}
        ReplCommand::Help => println!("{}", HELP),
        ReplCommand::Unknown(cmd) => {
            eprintln!("Unknown command: {}", cmd);
            eprintln!("{}", HELP);
        }
        ReplCommand::Message(text) => {
            controller.set_draft(&text);
            controller.send_chat().await?;
            if let Some(entry) = controller.state().session.history().last() {
                output::print_reply(entry, controller.state().show_model_info && !quiet);
            }
        }
        ReplCommand::Targets => {
            controller.refresh_targets().await?;
            let state = controller.state();
            output::print_targets(
                &state.targets,
                state.selected_target().map(|t| t.id.as_str()),
            );
        }
        ReplCommand::Select(id) => {
            controller.select_target(&id).await?;
            let state = controller.state();
            output::print_form(&state.schema, &state.values);
        }
        ReplCommand::Form => {
            let state = controller.state();
            output::print_form(&state.schema, &state.values);
        }
        ReplCommand::Set { field, value } => controller.set_field(&field, &value)?,
        ReplCommand::Preview => {
            let preview = controller.load_reference_preview().await?;
            output::print_preview(&preview);
        }
        ReplCommand::Image(path) => {
            let (data, mime) = read_image(&path).await?;
            controller.attach_image(data, mime)?;
            if !quiet {
                eprintln!("[image] Attached {}", path.display());
            }
        }
        ReplCommand::ClearImage => controller.clear_image(),
        ReplCommand::Save => {
            controller.save_record().await?;
        }
        ReplCommand::NewPage(name) => {
            controller.create_page(&name).await?;
        }
        ReplCommand::Models => match &controller.state().catalog {
            Some(catalog) => output::print_models(catalog.all(), &controller.state().selection),
            None => eprintln!("Model list unavailable"),
        },
        ReplCommand::Model(id) => controller.select_model(id.as_deref())?,
        ReplCommand::Prompt(None) => match controller.current_prompt() {
            Some(prompt) => println!("{}", prompt),
            None => eprintln!("Select a target first"),
        },
        ReplCommand::Prompt(Some(text)) => controller.set_prompt(&text)?,
        ReplCommand::PromptReset => controller.reset_prompt()?,
        ReplCommand::Toggle(toggle, value) => controller.set_toggle(toggle, value),
        ReplCommand::History => {
            let state = controller.state();
            output::print_history(state.session.history(), state.show_model_info);
        }
        ReplCommand::Clear => controller.clear_session(),
    }

    Ok(())
}

/// Read an image file as base64 with its guessed MIME type.
async fn read_image(path: &Path) -> Result<(String, String)> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read image: {}", path.display()))?;

    let mime = mime_guess::from_path(path)
        .first_or_octet_stream()
        .to_string();

    Ok((BASE64_STANDARD.encode(bytes), mime))
}

/// Run lines from a file, one per line.
///
/// Lines starting with `#` are comments. `/quit` stops early.
pub async fn execute_batch(ctx: &mut CliContext, file_path: &Path) -> Result<()> {
    let content = tokio::fs::read_to_string(file_path)
        .await
        .with_context(|| format!("Failed to read command file: {}", file_path.display()))?;

    let lines: Vec<&str> = content
        .lines()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .collect();

    if lines.is_empty() {
        anyhow::bail!("No commands found in file: {}", file_path.display());
    }

    let total = lines.len();
    for (i, line) in lines.iter().enumerate() {
        if !ctx.args.quiet && !ctx.args.json {
            eprintln!("[batch] [{}/{}] {}", i + 1, total, line);
        }

        match ReplCommand::parse(line) {
            ReplCommand::Quit => break,
            command => execute_once(ctx, command).await?,
        }
    }

    Ok(())
}

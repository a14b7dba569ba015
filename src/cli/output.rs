//! CLI output handling.
//!
//! The controller reports progress through `ClientEvent`s. After each command
//! the pending events are drained and rendered as text or JSON lines.

use std::io::{self, Write};

use anyhow::Result;
use tokio::sync::mpsc;

use crate::api::{ContentPreview, ModelDescriptor, Target};
use crate::events::{ClientEvent, NoticeLevel};
use crate::models::ModelSelection;
use crate::session::{ChatEntry, ChatKind, ModelInfo};
use crate::target::{FormModel, FormValue, FormValues, SchemaState};

/// Print every event queued so far without waiting for more.
pub fn drain_events(
    event_rx: &mut mpsc::UnboundedReceiver<ClientEvent>,
    json_mode: bool,
    quiet_mode: bool,
) -> Result<()> {
    while let Ok(event) = event_rx.try_recv() {
        if json_mode {
            println!("{}", serde_json::to_string(&event)?);
        } else {
            print_event_terminal(&event, quiet_mode);
        }
    }
    io::stdout().flush()?;
    Ok(())
}

fn print_event_terminal(event: &ClientEvent, quiet_mode: bool) {
    match event {
        ClientEvent::Notice { level, message } => match level {
            NoticeLevel::Error => eprintln!("[error] {}", message),
            NoticeLevel::Warning => eprintln!("[warn] {}", message),
            _ if quiet_mode => {}
            NoticeLevel::Success => eprintln!("[ok] {}", message),
            NoticeLevel::Info => eprintln!("[info] {}", message),
        },
        _ if quiet_mode => {}
        ClientEvent::TargetsLoaded { count } => eprintln!("[targets] {} available", count),
        ClientEvent::SchemaLoading { target_id } => eprintln!("[schema] Loading {}...", target_id),
        ClientEvent::SchemaReady {
            target_id,
            field_count,
        } => eprintln!("[schema] {} ready ({} fields)", target_id, field_count),
        ClientEvent::SchemaFailed { inline_error, .. } => eprintln!("[schema] {}", inline_error),
        ClientEvent::ChatPending => eprintln!("[chat] Thinking..."),
        ClientEvent::PersistenceFailed { key, error, .. } => {
            eprintln!("[storage] Could not persist {}: {}", key, error)
        }
        ClientEvent::HistoryChanged { .. }
        | ClientEvent::FormChanged
        | ClientEvent::ChatSettled => {}
    }
}

/// Render an AI reply, with model details when enabled.
pub fn print_reply(entry: &ChatEntry, show_model_info: bool) {
    println!("{}", entry.content);
    if show_model_info {
        if let Some(info) = &entry.model_info {
            eprintln!("  {}", format_model_info(info));
        }
    }
}

pub fn format_model_info(info: &ModelInfo) -> String {
    let mut parts = vec![info.model_id.clone()];
    if let Some(usage) = &info.usage {
        parts.push(format!(
            "{} tokens ({} in / {} out)",
            usage.total_tokens, usage.prompt_tokens, usage.completion_tokens
        ));
    }
    if let Some(cost) = info.cost {
        parts.push(format!("${:.6}", cost));
    }
    parts.join(" · ")
}

pub fn print_history(history: &[ChatEntry], show_model_info: bool) {
    if history.is_empty() {
        println!("(no history)");
        return;
    }
    for entry in history {
        let label = match entry.kind {
            ChatKind::User => "you",
            ChatKind::Ai => "ai",
            ChatKind::System => "system",
        };
        println!(
            "[{}] {}: {}",
            entry.created_at.format("%H:%M"),
            label,
            truncate(&entry.content, 200)
        );
        if show_model_info {
            if let Some(info) = &entry.model_info {
                println!("        {}", format_model_info(info));
            }
        }
    }
}

pub fn print_targets(targets: &[Target], selected: Option<&str>) {
    if targets.is_empty() {
        println!("(no targets)");
        return;
    }
    for target in targets {
        let marker = if Some(target.id.as_str()) == selected {
            "*"
        } else {
            " "
        };
        println!(
            "{} {:<36} {:<8} {}",
            marker,
            target.id,
            target.target_type.as_str(),
            target.title
        );
    }
}

pub fn print_models(models: &[ModelDescriptor], selection: &ModelSelection) {
    for model in models {
        let marker = match selection {
            ModelSelection::Explicit(id) if *id == model.id => "*",
            _ => " ",
        };
        let vision = if model.supports_vision { " [vision]" } else { "" };
        println!(
            "{} {} ({}){}",
            marker,
            model.id,
            if model.name.is_empty() {
                &model.provider
            } else {
                &model.name
            },
            vision
        );
        if let Some(note) = &model.rate_limit_note {
            println!("      {}", note);
        }
    }
    if *selection == ModelSelection::Automatic {
        println!("(automatic selection)");
    }
}

pub fn print_form(schema: &SchemaState, values: &FormValues) {
    match schema {
        SchemaState::Idle => println!("(no target selected)"),
        SchemaState::Loading { target } => println!("Loading schema for {}...", target.title),
        SchemaState::Failed {
            target, message, ..
        } => println!("{}: {}", target.title, message),
        SchemaState::Ready { target, form, .. } => print_ready_form(&target.title, form, values),
    }
}

fn print_ready_form(title: &str, form: &FormModel, values: &FormValues) {
    println!("{}", title);
    if !form.attributes_visible {
        println!("  (page target: no attributes)");
        return;
    }
    for field in &form.fields {
        let value = values.get(&field.name).map(format_value).unwrap_or_default();
        println!("  {:<20} [{}] {}", field.name, field.property_type, value);
        if !field.options.is_empty() {
            let options: Vec<String> = field.options.iter().map(|o| o.label()).collect();
            println!("  {:<20} options: {}", "", options.join(", "));
        }
    }
}

fn format_value(value: &FormValue) -> String {
    match value {
        FormValue::Text(text) => text.clone(),
        FormValue::Select(choice) => choice.clone().unwrap_or_default(),
        FormValue::MultiSelect(choices) => choices.join(", "),
        FormValue::Checkbox(checked) => (if *checked { "yes" } else { "no" }).to_string(),
        FormValue::Number(n) => n.map(|n| n.to_string()).unwrap_or_default(),
    }
}

pub fn print_preview(preview: &ContentPreview) {
    match preview {
        ContentPreview::Page { blocks } => println!("Page preview: {} blocks", blocks.len()),
        ContentPreview::Database { columns, rows } => println!(
            "Database preview: {} rows, columns: {}",
            rows.len(),
            columns.join(", ")
        ),
    }
}

/// Truncate a string to a maximum number of characters.
fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

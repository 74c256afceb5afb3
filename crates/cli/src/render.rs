//! Event formatting for the terminal

use owo_colors::OwoColorize;
use surveil::WatchEvent;

/// Single-line description without colour
pub fn plain(event: &WatchEvent) -> String {
    let detail = detail(event);
    if detail.is_empty() {
        format!("{:<9} {}", event.kind(), subject(event))
    } else {
        format!("{:<9} {} {}", event.kind(), subject(event), detail)
    }
}

/// Single-line description coloured by event class
pub fn colored(event: &WatchEvent) -> String {
    let label = format!("{:<9}", event.kind());
    let label = match event {
        WatchEvent::Add { .. }
        | WatchEvent::AddDir { .. }
        | WatchEvent::Child { .. }
        | WatchEvent::ChildDir { .. } => label.green().to_string(),
        WatchEvent::Remove { .. } | WatchEvent::RemoveDir { .. } => label.red().to_string(),
        WatchEvent::Change { .. } => label.yellow().to_string(),
        WatchEvent::Ready { error: None } => label.cyan().bold().to_string(),
        WatchEvent::Ready { error: Some(_) } | WatchEvent::Error { .. } => {
            label.red().bold().to_string()
        }
        WatchEvent::List { .. } => label.dimmed().to_string(),
    };

    let detail = detail(event);
    if detail.is_empty() {
        format!("{} {}", label, subject(event))
    } else {
        format!("{} {} {}", label, subject(event), detail.dimmed())
    }
}

/// One JSON object per event
pub fn json(event: &WatchEvent) -> serde_json::Result<String> {
    serde_json::to_string(event)
}

fn subject(event: &WatchEvent) -> &str {
    event.name().unwrap_or(".")
}

fn detail(event: &WatchEvent) -> String {
    match event {
        WatchEvent::Add {
            stat: Some(stat), ..
        }
        | WatchEvent::Child { stat, .. } => format!("({} bytes)", stat.len),
        WatchEvent::List { names } => format!("[{}]", names.join(", ")),
        WatchEvent::Ready { error: Some(error) } | WatchEvent::Error { error } => error.to_string(),
        _ => String::new(),
    }
}

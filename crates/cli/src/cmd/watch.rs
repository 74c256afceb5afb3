//! Stream events for one path

use crate::args::WatchArgs;
use crate::render;
use anyhow::{Context, Result};
use std::io::Write;
use surveil::{WatchEvent, WatchSession};
use tracing::info;

pub async fn run(args: WatchArgs) -> Result<()> {
    let options = args.options()?;
    let mut session = WatchSession::open(&args.path, options)
        .with_context(|| format!("Failed to watch {}", args.path.display()))?;

    let closer = session.close_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted; closing watch");
            closer.close();
        }
    });

    let mut failure = None;
    let stdout = std::io::stdout();
    while let Some(event) = session.next_event().await {
        let line = if args.json {
            render::json(&event).context("Failed to encode event")?
        } else {
            render::colored(&event)
        };
        writeln!(stdout.lock(), "{}", line).context("Failed to write event")?;

        if let WatchEvent::Error { error } = event {
            failure = Some(error);
            session.close();
        }
    }

    match failure {
        Some(error) => {
            Err(anyhow::Error::new(error).context(format!("Watch on {} failed", args.path.display())))
        }
        None => Ok(()),
    }
}

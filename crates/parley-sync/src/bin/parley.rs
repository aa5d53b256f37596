//! # parley
//!
//! Command-line client for poking a live comments service with the same
//! session core the apps use.
//!
//! ```text
//! parley list <thread> [cursor]    one page, newest first
//! parley post <thread> <body>      submit a comment
//! parley settings                  moderation settings for this install
//! ```
//!
//! Configuration comes from `parley.toml` in the platform config directory
//! (or `PARLEY_CONFIG`), overridden by `PARLEY_*` environment variables.
//!
//! ## Log Levels
//! - `RUST_LOG=debug` - Show token cache and paging decisions
//! - Default: INFO level

use std::path::PathBuf;
use std::process::ExitCode;

use tracing::error;
use tracing_subscriber::EnvFilter;

use parley_core::{Cursor, Item};
use parley_sync::{CommentsSession, ParleyConfig, SyncError, SyncResult};

const USAGE: &str = "usage: parley list <thread> [cursor] | post <thread> <body> | settings";

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,parley_sync=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    match run(&args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "Command failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: &[String]) -> SyncResult<()> {
    let config_path = std::env::var_os("PARLEY_CONFIG").map(PathBuf::from);
    let config = ParleyConfig::load(config_path)?;
    let session = CommentsSession::from_config(&config)?;

    match args.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
        ["list", thread] => list(&session, &config, thread, None).await,
        ["list", thread, cursor] => {
            let cursor = Cursor::parse(cursor)
                .ok_or_else(|| SyncError::InvalidConfig(format!("unusable cursor: {cursor}")))?;
            list(&session, &config, thread, Some(&cursor)).await
        }
        ["post", thread, body @ ..] if !body.is_empty() => {
            let feed = session.feed(thread)?;
            let item = feed.post(&body.join(" ")).await?;
            print_item(&item);
            Ok(())
        }
        ["settings"] => {
            let settings = session.fetch_settings().await?;
            let json = serde_json::to_string_pretty(&settings)
                .map_err(|e| SyncError::Internal(e.to_string()))?;
            println!("{json}");
            Ok(())
        }
        _ => Err(SyncError::InvalidConfig(USAGE.to_string())),
    }
}

async fn list(
    session: &CommentsSession,
    config: &ParleyConfig,
    thread: &str,
    cursor: Option<&Cursor>,
) -> SyncResult<()> {
    let page_size = i64::from(config.feed.page_size);
    let page = session.list_page(thread, page_size, cursor).await?;

    for item in &page.items {
        print_item(item);
    }

    match (&page.next_cursor, page.has_more) {
        (Some(Cursor::Opaque(next)), true) => println!("-- more: parley list {thread} {next}"),
        (Some(Cursor::Before(at)), true) => {
            println!("-- more: parley list {thread} {}", at.to_rfc3339())
        }
        _ => println!("-- end of thread"),
    }
    Ok(())
}

fn print_item(item: &Item) {
    let author = item.author_name.as_deref().unwrap_or(&item.author_id);
    println!(
        "[{}] {} {} ({} reactions)\n    {}",
        item.id,
        item.created_at.format("%Y-%m-%d %H:%M"),
        author,
        item.reaction_total(),
        item.body
    );
}

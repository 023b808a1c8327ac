use crate::api::ApiClient;
use crate::config::Config;
use crate::events::ChatMode;
use crate::recents::RecentsStore;
use crate::stream::{GenerationRequest, StreamClient, StreamError, StreamEvent};
use anyhow::{Result, anyhow};
use std::io::{self, Write};

/// List conversations: the backend when reachable, the local cache otherwise
pub async fn list(config: &Config) -> Result<()> {
    let api = ApiClient::new(config);

    match api.list_conversations().await {
        Ok(conversations) => {
            if conversations.is_empty() {
                println!("No conversations yet. Run 'vaelis' to start one!");
                return Ok(());
            }

            println!("Your conversations:");
            println!("{}", "=".repeat(50));
            for conv in conversations {
                let pin = if conv.pinned { "📌 " } else { "" };
                let title = conv.title.unwrap_or_else(|| "(untitled)".to_string());
                println!("  #{:<6} {}{}", conv.id, pin, title);
                if let Some(tags) = conv.tags.filter(|t| !t.is_empty()) {
                    println!("          tags: {}", tags);
                }
            }
            println!();
            println!("Open one with: vaelis open <id>");
        }
        Err(error) => {
            tracing::warn!("backend unreachable, using local cache: {:#}", error);
            let recents = RecentsStore::new(config).load()?;
            if recents.is_empty() {
                println!("Backend unreachable and no local history yet.");
                return Ok(());
            }

            println!("Recent conversations (local cache — backend unreachable):");
            println!("{}", "=".repeat(50));
            for recent in recents {
                println!(
                    "  #{:<6} {}  ({}, {})",
                    recent.conv_id,
                    recent.title,
                    recent.mode.display_name().to_lowercase(),
                    recent.last_activity.format("%Y-%m-%d %H:%M"),
                );
            }
        }
    }

    Ok(())
}

/// One-shot generation streamed to stdout, with the same fallback policy the
/// composer applies: on stream failure, retry once without streaming.
pub async fn ask(
    config: &Config,
    prompt: String,
    mode: Option<String>,
    search: bool,
    conversation: Option<i64>,
) -> Result<()> {
    let mode = match mode {
        Some(name) => ChatMode::parse(&name)
            .ok_or_else(|| anyhow!("unknown mode '{}'; expected chat, think, study, code, or document", name))?,
        None => config.default_mode,
    };
    let use_search = search || config.use_search;

    let request = GenerationRequest::new(prompt.clone(), mode)
        .with_search(use_search)
        .with_conversation(conversation);

    let client = StreamClient::new(config);
    let (_handle, mut rx) = client.start_stream(request.clone());

    let mut conv_id = conversation;
    let mut failure: Option<StreamError> = None;
    let mut printed = false;

    while let Some(event) = rx.recv().await {
        match event {
            StreamEvent::ConversationId(id) => {
                conv_id = Some(id);
            }
            StreamEvent::Delta(delta) => {
                print!("{}", delta);
                io::stdout().flush()?;
                printed = true;
            }
            StreamEvent::Done => break,
            StreamEvent::Error(error) => {
                failure = Some(error);
                break;
            }
        }
    }

    if let Some(error) = failure {
        eprintln!("Stream failed ({}), retrying without streaming…", error);

        let api = ApiClient::new(config);
        let mut fallback_request = request;
        fallback_request.conv_id = conv_id;
        let result = api.generate(&fallback_request).await?;

        // The fallback returns the full output, superseding any partial text
        if printed {
            println!();
            println!("---");
        }
        println!("{}", result.output);
        conv_id = result.conv_id.or(conv_id);
    } else if printed {
        println!();
    }

    if let Some(id) = conv_id {
        if let Err(error) = RecentsStore::new(config).record(id, &prompt, mode) {
            tracing::warn!("failed to update recents cache: {:#}", error);
        }
        eprintln!("(conversation #{id} — continue with: vaelis open {id})");
    }

    Ok(())
}

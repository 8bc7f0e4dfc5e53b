//! Long-running bot binary.
//!
//! Starts the delivery scheduler in the background and long-polls the
//! Telegram Bot API for administrative commands in the foreground. Both
//! halves share the same state store, so a command takes effect on the
//! next scheduler tick. Ctrl-C shuts the scheduler down between ticks.

use std::path::PathBuf;
use std::sync::Arc;

use wird::config::BotConfig;
use wird::content::AlQuranCloud;
use wird::delivery::Deliverer;
use wird::scheduler::Scheduler;
use wird::store::StateStore;
use wird::telegram::{BotApi, Messenger};
use wird::{commands, WirdError};

const ADMIN_PROMPT_TEXT: &str =
    "⚠️ من فضلك اجعلني أدمن حتى أستطيع إرسال الصور والتذكيرات.";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = load_config()?;

    // A corrupt state file aborts startup; it is never silently replaced.
    let store = Arc::new(StateStore::load(config.state.path.clone()).map_err(|e| {
        tracing::error!("cannot load state from {}: {e}", config.state.path.display());
        anyhow::anyhow!("state load failed: {e}")
    })?);
    tracing::info!(
        "loaded {} destination(s) from {}",
        store.len(),
        config.state.path.display()
    );

    let api = Arc::new(BotApi::new(&config.telegram)?);
    let content = Arc::new(AlQuranCloud::new(&config.content)?);

    let deliverer = Deliverer::new(
        Arc::clone(&store),
        Arc::clone(&api) as Arc<dyn wird::telegram::Messenger>,
        Arc::clone(&content) as Arc<dyn wird::content::ContentInfoProvider>,
    );
    let handle = Scheduler::new(
        Arc::clone(&store),
        deliverer,
        config.trigger.marker_policy,
        config.scheduler.tick_interval_secs,
    )
    .spawn();

    tracing::info!("wird-bot started, polling for commands");
    tokio::select! {
        _ = poll_commands(&api, &store) => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown requested");
        }
    }

    handle.shutdown().await;
    tracing::info!("wird-bot shut down cleanly");
    Ok(())
}

fn load_config() -> anyhow::Result<BotConfig> {
    let path = std::env::var_os("WIRD_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(BotConfig::default_config_path);

    if path.exists() {
        tracing::info!("loading config from {}", path.display());
        Ok(BotConfig::from_file(&path)?)
    } else {
        tracing::info!("no config file at {}, using defaults", path.display());
        let mut config = BotConfig::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }
}

/// Command loop. Only quits on repeated fatal API errors; transient poll
/// failures back off and retry.
async fn poll_commands(api: &Arc<BotApi>, store: &Arc<StateStore>) {
    let mut offset: Option<i64> = None;

    loop {
        let updates = match api.get_updates(offset).await {
            Ok(updates) => updates,
            Err(e) => {
                tracing::warn!("getUpdates failed, retrying: {e}");
                tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                continue;
            }
        };

        for update in updates {
            offset = Some(offset.unwrap_or(0).max(update.update_id + 1));

            // Added to a chat without rights: ask for admin so media
            // deliveries can go out.
            if let Some(change) = update.my_chat_member {
                let chat_id = change.chat.id.to_string();
                if change.needs_admin_prompt() {
                    if let Err(e) = api.send_text(&chat_id, ADMIN_PROMPT_TEXT).await {
                        tracing::warn!("admin prompt to chat {chat_id} failed: {e}");
                    }
                }
                continue;
            }

            let Some(message) = update.message else { continue };
            let (Some(from), Some(text)) = (message.from, message.text) else {
                continue;
            };

            let chat_id = message.chat.id.to_string();
            let sender_id = from.id.to_string();
            if let Err(e) = commands::handle(store, api.as_ref(), &chat_id, &sender_id, &text).await
            {
                match e {
                    WirdError::Unreachable(reason) => {
                        tracing::warn!("chat {chat_id} unreachable, removing: {reason}");
                        if let Err(e) = store.remove(&chat_id) {
                            tracing::error!("failed to remove chat {chat_id}: {e}");
                        }
                    }
                    other => tracing::warn!("command in chat {chat_id} failed: {other}"),
                }
            }
        }
    }
}

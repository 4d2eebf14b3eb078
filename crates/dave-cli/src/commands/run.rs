use crate::console::{BOT_USER_ID, BOT_USERNAME, ConsoleTransport, SOURCE_CHANNEL};
use anyhow::Result;
use dave_application::{BotService, ConversationBinding};
use dave_core::config::DaveConfig;
use dave_core::conversation::BotIdentity;
use dave_execution::JobScheduler;
use dave_infrastructure::{FileBindingStore, FileHistorySink};
use dave_interaction::Predictor;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Chats over stdin/stdout until EOF or Ctrl-C.
///
/// Shutdown order: scheduler, then the final history drain, then the
/// predictor connection.
pub async fn run(config: &DaveConfig) -> Result<()> {
    let transport = Arc::new(ConsoleTransport::stdout(config.provenance.capacity));
    let predictor = Arc::new(Predictor::from_config(&config.backends));
    let store = Arc::new(FileBindingStore::new(&config.storage.data_dir));
    let binding = Arc::new(ConversationBinding::new(
        BotIdentity::new(BOT_USER_ID, BOT_USERNAME),
        store,
    ));
    let sink = Arc::new(FileHistorySink::new(&config.storage.history_dir));

    let service = Arc::new(BotService::new(
        predictor,
        transport.clone(),
        binding,
        sink,
        config,
        SOURCE_CHANNEL,
    ));

    match service.restore_binding().await {
        Ok(Some(_)) => {}
        Ok(None) => {
            let key = service.binding().binding_key().await;
            tracing::warn!(key = %key, "Not bound to a conversation; send /bind_group <key>");
        }
        Err(err) => tracing::warn!(error = %err, "Could not restore binding"),
    }

    let mut scheduler = JobScheduler::new();
    let updates = service.clone();
    scheduler.spawn_interval(
        "model-update",
        Duration::from_secs(config.schedule.update_interval_secs),
        move || {
            let service = updates.clone();
            async move { service.poll_model_updates().await.map(|_| ()) }
        },
    )?;
    let uploads = service.clone();
    scheduler.spawn_interval(
        "history-upload",
        Duration::from_secs(config.schedule.upload_interval_secs),
        move || {
            let service = uploads.clone();
            async move { service.drain_history().await.map(|_| ()) }
        },
    )?;

    tracing::info!("Crazy Dave is listening");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        let line = tokio::select! {
            _ = &mut ctrl_c => {
                tracing::info!("Interrupted");
                break;
            }
            line = lines.next_line() => line,
        };

        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(err) => {
                tracing::warn!(error = %err, "Failed to read input");
                break;
            }
        };

        let Some(message) = transport.incoming(&line).await? else {
            continue;
        };
        match service.handle_message(&message).await {
            Ok(outcome) => tracing::debug!(message_id = message.id, ?outcome, "Handled"),
            Err(err) => tracing::warn!(message_id = message.id, error = %err, "Message handling failed"),
        }
    }

    scheduler.shutdown().await;
    service.shutdown().await;
    Ok(())
}

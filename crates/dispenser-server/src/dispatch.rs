use dispenser_config::Chat;
use dispenser_contracts::{ChatMessage, IgnoreReason, MessageResponse};
use dispenser_kernel::{parse_command, Command, COMMAND_NAMES};

use crate::dispenser::Dispenser;
use crate::error::DispenserError;

/// Routes one chat message to a claim, a report, an ingestion, or nothing.
///
/// Bots are dropped first. A message in a claim channel is a claim by its
/// author whatever it says; everywhere else only prefixed commands count.
pub async fn dispatch_message(
    dispenser: &Dispenser,
    chat: &Chat,
    msg: &ChatMessage,
) -> Result<MessageResponse, DispenserError> {
    if msg.author_is_bot {
        return Ok(ignored(IgnoreReason::AuthorIsBot));
    }

    if chat.claim_channel_ids.iter().any(|c| c == &msg.channel_id) {
        let claim = dispenser.claim_for(&msg.author_id).await?;
        return Ok(MessageResponse::Claim(claim));
    }

    let Some(command) = parse_command(&chat.command_prefix, &msg.content) else {
        return Ok(ignored(IgnoreReason::NotACommand));
    };
    tracing::debug!(author_id = %msg.author_id, ?command, "chat command");

    match command {
        Command::Give => Ok(MessageResponse::Claim(
            dispenser.claim_for(&msg.author_id).await?,
        )),
        Command::Count => Ok(MessageResponse::Report(dispenser.report().await?)),
        Command::Add(_) if !msg.direct => Ok(ignored(IgnoreReason::AddRequiresDirectMessage)),
        Command::Add(None) => Ok(ignored(IgnoreReason::MissingArgument)),
        Command::Add(Some(input)) => Ok(MessageResponse::Ingest(dispenser.ingest(&input).await?)),
        Command::Help => Ok(MessageResponse::Help {
            commands: COMMAND_NAMES.iter().map(|c| c.to_string()).collect(),
        }),
    }
}

fn ignored(reason: IgnoreReason) -> MessageResponse {
    MessageResponse::Ignored { reason }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dispenser_config::Fetch;
    use dispenser_contracts::{ClaimOutcome, KeyRecord};

    use crate::audit::AuditLog;
    use crate::fetch::HttpFetcher;
    use crate::store::{KeyStore, MemoryStore};

    async fn dispenser_with(keys: &[&str]) -> (tempfile::TempDir, Dispenser) {
        let dir = tempfile::tempdir().unwrap();
        let audit_path = dir.path().join("audit.jsonl");
        let records = keys.iter().map(|k| KeyRecord::unclaimed(*k)).collect();
        let dispenser = Dispenser::new(
            KeyStore::Memory(MemoryStore::with_records(records)),
            HttpFetcher::new(&Fetch::default()).unwrap(),
            AuditLog::open(audit_path.to_str().unwrap(), None)
                .await
                .unwrap(),
            vec!["op-1".to_string()],
        );
        (dir, dispenser)
    }

    fn message(content: &str) -> ChatMessage {
        ChatMessage {
            author_id: "u1".to_string(),
            author_is_bot: false,
            channel_id: "general".to_string(),
            direct: false,
            content: content.to_string(),
        }
    }

    #[tokio::test]
    async fn bots_are_ignored_even_in_claim_channels() {
        let (_dir, dispenser) = dispenser_with(&["ABCD1-EFGH2-IJKL3"]).await;
        let chat = Chat {
            claim_channel_ids: vec!["giveaway".to_string()],
            ..Chat::default()
        };
        let mut msg = message("$key give");
        msg.author_is_bot = true;
        msg.channel_id = "giveaway".to_string();

        let response = dispatch_message(&dispenser, &chat, &msg).await.unwrap();
        assert_eq!(response, ignored(IgnoreReason::AuthorIsBot));
        assert_eq!(dispenser.report().await.unwrap().available, 1);
    }

    #[tokio::test]
    async fn claim_channel_takes_any_content() {
        let (_dir, dispenser) = dispenser_with(&["ABCD1-EFGH2-IJKL3"]).await;
        let chat = Chat {
            claim_channel_ids: vec!["giveaway".to_string()],
            ..Chat::default()
        };
        let mut msg = message("hello there");
        msg.channel_id = "giveaway".to_string();

        let MessageResponse::Claim(claim) = dispatch_message(&dispenser, &chat, &msg).await.unwrap()
        else {
            panic!("expected a claim");
        };
        assert_eq!(
            claim.outcome,
            ClaimOutcome::Issued {
                key: "ABCD1-EFGH2-IJKL3".to_string()
            }
        );
    }

    #[tokio::test]
    async fn prefix_is_case_insensitive() {
        let (_dir, dispenser) = dispenser_with(&["ABCD1-EFGH2-IJKL3"]).await;
        let response = dispatch_message(&dispenser, &Chat::default(), &message("$KEY Count"))
            .await
            .unwrap();
        assert!(matches!(response, MessageResponse::Report(r) if r.total == 1));
    }

    #[tokio::test]
    async fn add_is_direct_only() {
        let (_dir, dispenser) = dispenser_with(&[]).await;
        let chat = Chat::default();

        let response = dispatch_message(&dispenser, &chat, &message("$key add ABCD1-EFGH2-IJKL3"))
            .await
            .unwrap();
        assert_eq!(response, ignored(IgnoreReason::AddRequiresDirectMessage));

        let mut msg = message("$key add");
        msg.direct = true;
        let response = dispatch_message(&dispenser, &chat, &msg).await.unwrap();
        assert_eq!(response, ignored(IgnoreReason::MissingArgument));

        msg.content = "$key add ABCD1-EFGH2-IJKL3".to_string();
        let response = dispatch_message(&dispenser, &chat, &msg).await.unwrap();
        assert!(matches!(response, MessageResponse::Ingest(_)));
        assert_eq!(dispenser.report().await.unwrap().total, 1);
    }

    #[tokio::test]
    async fn unknown_text_is_not_a_command() {
        let (_dir, dispenser) = dispenser_with(&[]).await;
        for content in ["hello", "$key", "$key dance", "$keygive"] {
            let response = dispatch_message(&dispenser, &Chat::default(), &message(content))
                .await
                .unwrap();
            assert_eq!(response, ignored(IgnoreReason::NotACommand), "{content}");
        }
    }

    #[tokio::test]
    async fn help_lists_commands() {
        let (_dir, dispenser) = dispenser_with(&[]).await;
        let response = dispatch_message(&dispenser, &Chat::default(), &message("$key help"))
            .await
            .unwrap();
        assert_eq!(
            response,
            MessageResponse::Help {
                commands: vec![
                    "give".to_string(),
                    "count".to_string(),
                    "add".to_string(),
                    "help".to_string()
                ]
            }
        );
    }
}

//! Triage turns bound to stored chats

use super::{process_triage, TriageOutcome};
use crate::db::{Database, DbError};
use crate::llm::{LlmError, TextGenerator};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TriageServiceError {
    #[error("Generation failed: {0}")]
    Generation(#[source] LlmError),
    #[error(transparent)]
    Db(#[from] DbError),
}

#[derive(Clone)]
pub struct TriageService {
    db: Database,
    generator: Arc<dyn TextGenerator>,
}

impl TriageService {
    pub fn new(db: Database, generator: Arc<dyn TextGenerator>) -> Self {
        Self { db, generator }
    }

    /// Run one triage turn against a chat's stored meta.
    ///
    /// The merged meta is written back whenever it changed, complete or not,
    /// so a later failure never loses fields collected on earlier turns. If
    /// generation fails nothing is written.
    pub async fn handle_turn(
        &self,
        chat_id: &str,
        user_message: &str,
    ) -> Result<TriageOutcome, TriageServiceError> {
        let chat = self.db.get_chat(chat_id)?;

        let outcome = process_triage(self.generator.as_ref(), &chat.meta, user_message)
            .await
            .map_err(TriageServiceError::Generation)?;

        if outcome.meta() != &chat.meta {
            self.db.update_chat_meta(chat_id, outcome.meta())?;
        }

        tracing::info!(
            chat_id = %chat_id,
            done = outcome.is_done(),
            missing = outcome.meta().missing_fields().len(),
            "Triage turn processed"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::MockGenerator;
    use crate::triage::{TriageField, TriagePhase};

    fn setup() -> (Database, Arc<MockGenerator>, TriageService, String) {
        let db = Database::open_in_memory().unwrap();
        let chat_id = db.open_chat_for_user("user-a").unwrap().0.id;
        let generator = Arc::new(MockGenerator::new());
        let service = TriageService::new(db.clone(), generator.clone());
        (db, generator, service, chat_id)
    }

    #[tokio::test]
    async fn test_partial_progress_is_persisted() {
        let (db, generator, service, chat_id) = setup();
        generator.queue_reply(r#"{"name":"Asha","birth_date":"1992-03-04"}"#);

        let outcome = service.handle_turn(&chat_id, "I am Asha").await.unwrap();

        assert!(!outcome.is_done());
        let stored = db.get_chat(&chat_id).unwrap().meta;
        assert_eq!(stored.get(TriageField::Name), Some("Asha"));
        assert_eq!(stored.phase(), TriagePhase::Collecting);
    }

    #[tokio::test]
    async fn test_turns_accumulate_until_complete() {
        let (db, generator, service, chat_id) = setup();
        generator.queue_reply(r#"{"name":"Ravi","birth_date":"1990-05-01"}"#);
        generator.queue_reply("birth_time: 08:30\nplace: Mumbai, India");
        generator.queue_reply(r#"{"question":"What does my chart say?"}"#);

        let first = service.handle_turn(&chat_id, "Ravi, 1990-05-01").await.unwrap();
        assert!(first.follow_up_question().unwrap().contains("birth_time"));

        let second = service.handle_turn(&chat_id, "8:30 Mumbai").await.unwrap();
        assert!(second.follow_up_question().unwrap().contains("question"));

        let third = service.handle_turn(&chat_id, "chart?").await.unwrap();
        assert!(third.is_done());

        // each turn saw the meta persisted by the previous one
        let requests = generator.recorded_requests();
        assert!(requests[1].user.contains(r#""name":"Ravi""#));
        assert!(requests[2].user.contains(r#""place":"Mumbai, India""#));
        assert!(db.get_chat(&chat_id).unwrap().meta.is_complete());
    }

    #[tokio::test]
    async fn test_generator_failure_writes_nothing() {
        let (db, generator, service, chat_id) = setup();
        generator.queue_error(LlmError::network("timeout"));

        let err = service.handle_turn(&chat_id, "hi").await.unwrap_err();
        assert!(matches!(err, TriageServiceError::Generation(_)));
        assert_eq!(db.get_chat(&chat_id).unwrap().meta.iter().count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_chat() {
        let (_db, generator, service, _) = setup();
        generator.queue_reply("{}");

        let err = service.handle_turn("missing", "hi").await.unwrap_err();
        assert!(matches!(
            err,
            TriageServiceError::Db(DbError::ChatNotFound(_))
        ));
        assert!(generator.recorded_requests().is_empty());
    }
}

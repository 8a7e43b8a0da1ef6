use uuid::Uuid;

use crate::{
    api::error,
    modules::conversation::{
        model::NewConversation, repository::ConversationRepository, schema::ConversationEntity,
    },
};

#[derive(Clone)]
pub struct ConversationPgRepository {
    pool: sqlx::PgPool,
}

impl ConversationPgRepository {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ConversationRepository for ConversationPgRepository {
    async fn find_by_id(
        &self,
        conversation_id: &Uuid,
    ) -> Result<Option<ConversationEntity>, error::SystemError> {
        let conversation =
            sqlx::query_as::<_, ConversationEntity>("SELECT * FROM conversations WHERE id = $1")
                .bind(conversation_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(conversation)
    }

    async fn create_if_absent(
        &self,
        conversation: &NewConversation,
    ) -> Result<Option<ConversationEntity>, error::SystemError> {
        // When another transaction inserts the same id first, the INSERT waits
        // for it and does nothing, but the outer SELECT still reads the snapshot
        // taken before that commit. No row comes back in that case.
        let conversation = sqlx::query_as::<_, ConversationEntity>(
            r#"
            WITH inserted AS (
                INSERT INTO conversations (id, artist_id, customer_id, last_message)
                VALUES ($1, $2, $3, '')
                ON CONFLICT (id) DO NOTHING
                RETURNING *
            )
            SELECT * FROM inserted
            UNION ALL
            SELECT * FROM conversations WHERE id = $1
            LIMIT 1
            "#,
        )
        .bind(conversation.id)
        .bind(&conversation.artist_id)
        .bind(&conversation.customer_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(conversation)
    }

    async fn update_summary(
        &self,
        conversation_id: &Uuid,
        last_message: &str,
    ) -> Result<bool, error::SystemError> {
        let rows = sqlx::query(
            r#"
            UPDATE conversations
            SET last_message = $2,
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(conversation_id)
        .bind(last_message)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(rows > 0)
    }

    async fn find_by_artist(
        &self,
        artist_id: &str,
    ) -> Result<Vec<ConversationEntity>, error::SystemError> {
        // has index on (artist_id, updated_at DESC)
        let conversations = sqlx::query_as::<_, ConversationEntity>(
            "SELECT * FROM conversations WHERE artist_id = $1 ORDER BY updated_at DESC, id",
        )
        .bind(artist_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(conversations)
    }
}

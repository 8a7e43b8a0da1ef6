use crate::{
    api::error,
    modules::profile::{repository::ProfileRepository, schema::ProfileEntity},
};

#[derive(Clone)]
pub struct ProfileRepositoryPg {
    pool: sqlx::PgPool,
}

impl ProfileRepositoryPg {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ProfileRepository for ProfileRepositoryPg {
    async fn find_by_ids(&self, ids: &[String]) -> Result<Vec<ProfileEntity>, error::SystemError> {
        let profiles = sqlx::query_as::<_, ProfileEntity>("SELECT * FROM profiles WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;
        Ok(profiles)
    }
}

use crate::{api::error, modules::profile::schema::ProfileEntity};

#[async_trait::async_trait]
pub trait ProfileRepository {
    async fn find_by_ids(&self, ids: &[String]) -> Result<Vec<ProfileEntity>, error::SystemError>;
}

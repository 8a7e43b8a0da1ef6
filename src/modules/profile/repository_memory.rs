use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::{
    api::error,
    modules::profile::{repository::ProfileRepository, schema::ProfileEntity},
};

#[derive(Default)]
pub struct ProfileMemoryRepository {
    rows: Mutex<HashMap<String, ProfileEntity>>,
    unavailable: AtomicBool,
}

impl ProfileMemoryRepository {
    pub fn insert(&self, id: &str, display_name: Option<&str>, email: Option<&str>) {
        let now = chrono::Utc::now();
        self.rows.lock().unwrap().insert(
            id.to_string(),
            ProfileEntity {
                id: id.to_string(),
                role: None,
                email: email.map(str::to_string),
                display_name: display_name.map(str::to_string),
                avatar_url: None,
                created_at: now,
                updated_at: now,
            },
        );
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl ProfileRepository for ProfileMemoryRepository {
    async fn find_by_ids(&self, ids: &[String]) -> Result<Vec<ProfileEntity>, error::SystemError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(error::SystemError::store_unavailable("profile store offline"));
        }
        let rows = self.rows.lock().unwrap();
        Ok(ids.iter().filter_map(|id| rows.get(id).cloned()).collect())
    }
}

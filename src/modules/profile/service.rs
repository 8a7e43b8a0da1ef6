use std::collections::HashMap;
use std::sync::Arc;

use crate::configs::RedisCache;
use crate::modules::profile::repository::ProfileRepository;

/// Resolves participant ids to display names.
///
/// Names are presentation only, so lookups never fail: any store or cache
/// error is logged and the raw id is used instead.
pub struct ProfileService<P>
where
    P: ProfileRepository + Send + Sync + 'static,
{
    repo: Arc<P>,
    cache: Option<Arc<RedisCache>>,
    cache_ttl: u64,
}

impl<P> Clone for ProfileService<P>
where
    P: ProfileRepository + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self { repo: self.repo.clone(), cache: self.cache.clone(), cache_ttl: self.cache_ttl }
    }
}

impl<P> ProfileService<P>
where
    P: ProfileRepository + Send + Sync + 'static,
{
    pub fn with_dependencies(repo: Arc<P>, cache: Option<Arc<RedisCache>>, cache_ttl: u64) -> Self {
        log::info!("ProfileService initialized (name cache: {})", cache.is_some());
        ProfileService { repo, cache, cache_ttl }
    }

    fn cache_key(id: &str) -> String {
        format!("profile:name:{}", id)
    }

    pub async fn display_names(&self, ids: &[String]) -> HashMap<String, String> {
        let mut names = HashMap::with_capacity(ids.len());
        let mut missing: Vec<String> = Vec::new();

        for id in ids {
            if names.contains_key(id) || missing.contains(id) {
                continue;
            }
            match self.cached_name(id).await {
                Some(name) => {
                    names.insert(id.clone(), name);
                }
                None => missing.push(id.clone()),
            }
        }

        if missing.is_empty() {
            return names;
        }

        match self.repo.find_by_ids(&missing).await {
            Ok(profiles) => {
                for profile in profiles {
                    let name = profile.display_name_or_fallback();
                    self.store_name(&profile.id, &name).await;
                    names.insert(profile.id, name);
                }
            }
            Err(e) => log::warn!("Profile lookup failed for {} ids: {}", missing.len(), e),
        }

        for id in missing {
            names.entry(id.clone()).or_insert(id);
        }

        names
    }

    async fn cached_name(&self, id: &str) -> Option<String> {
        let cache = self.cache.as_ref()?;
        match cache.get::<String>(&Self::cache_key(id)).await {
            Ok(name) => name,
            Err(e) => {
                log::warn!("Display name cache read failed for {}: {}", id, e);
                None
            }
        }
    }

    async fn store_name(&self, id: &str, name: &str) {
        let Some(cache) = self.cache.as_ref() else {
            return;
        };
        if let Err(e) = cache.set(&Self::cache_key(id), &name, self.cache_ttl).await {
            log::warn!("Display name cache write failed for {}: {}", id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::profile::repository_memory::ProfileMemoryRepository;

    fn service(repo: Arc<ProfileMemoryRepository>) -> ProfileService<ProfileMemoryRepository> {
        ProfileService::with_dependencies(repo, None, 60)
    }

    #[tokio::test]
    async fn test_display_name_falls_back_to_email_then_id() {
        let repo = Arc::new(ProfileMemoryRepository::default());
        repo.insert("C1", Some("Mira"), Some("mira@example.com"));
        repo.insert("C2", Some("  "), Some("c2@example.com"));
        repo.insert("C3", None, None);

        let names = service(repo)
            .display_names(&["C1".into(), "C2".into(), "C3".into(), "C4".into()])
            .await;

        assert_eq!(names["C1"], "Mira");
        assert_eq!(names["C2"], "c2@example.com");
        assert_eq!(names["C3"], "C3");
        assert_eq!(names["C4"], "C4");
    }

    #[tokio::test]
    async fn test_store_failure_falls_back_to_ids() {
        let repo = Arc::new(ProfileMemoryRepository::default());
        repo.insert("C1", Some("Mira"), None);
        repo.set_unavailable(true);

        let names = service(repo).display_names(&["C1".into(), "C1".into()]).await;

        assert_eq!(names.len(), 1);
        assert_eq!(names["C1"], "C1");
    }
}

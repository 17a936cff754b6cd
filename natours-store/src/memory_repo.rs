use async_trait::async_trait;
use natours_core::entity::{self, Entity, UniqueKey};
use natours_core::{CoreError, CoreResult, ListQuery, Repository};
use serde_json::Value;
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Process-local repository. Unique keys are checked under the write lock,
/// so concurrent creates racing on the same key produce one record.
pub struct MemoryRepository<E> {
    records: RwLock<BTreeMap<Uuid, E>>,
}

impl<E: Entity> MemoryRepository<E> {
    pub fn new() -> Self {
        Self { records: RwLock::new(BTreeMap::new()) }
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

impl<E: Entity> Default for MemoryRepository<E> {
    fn default() -> Self {
        Self::new()
    }
}

fn check_unique<E: Entity>(records: &BTreeMap<Uuid, E>, candidate: &E) -> CoreResult<()> {
    let keys: Vec<UniqueKey> = candidate.unique_keys();
    if keys.is_empty() {
        return Ok(());
    }

    for (id, existing) in records {
        if *id == candidate.id() {
            continue;
        }
        if let Some(taken) = existing.unique_keys().into_iter().find(|k| keys.contains(k)) {
            return Err(CoreError::Conflict { entity: E::NAME, key: taken.name.to_string() });
        }
    }
    Ok(())
}

#[async_trait]
impl<E: Entity> Repository<E> for MemoryRepository<E> {
    async fn create(&self, record: E) -> CoreResult<E> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.id()) {
            return Err(CoreError::Conflict { entity: E::NAME, key: "id".to_string() });
        }
        check_unique(&records, &record)?;
        records.insert(record.id(), record.clone());
        Ok(record)
    }

    async fn find_by_id(&self, id: Uuid) -> CoreResult<Option<E>> {
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn find(&self, query: &ListQuery) -> CoreResult<Vec<E>> {
        let docs = {
            let records = self.records.read().await;
            records.values().map(entity::to_document).collect::<CoreResult<Vec<_>>>()?
        };

        query.apply(docs).into_iter().map(entity::from_document).collect()
    }

    async fn update_by_id(&self, id: Uuid, patch: Value) -> CoreResult<Option<E>> {
        let mut records = self.records.write().await;
        let Some(current) = records.get(&id) else {
            return Ok(None);
        };

        let updated = entity::merge_patch(current, patch)?;
        check_unique(&records, &updated)?;
        records.insert(id, updated.clone());
        Ok(Some(updated))
    }

    async fn delete_by_id(&self, id: Uuid) -> CoreResult<bool> {
        Ok(self.records.write().await.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use natours_core::models::{Booking, User};
    use serde_json::json;
    use std::sync::Arc;

    fn user(email: &str) -> User {
        entity::build(json!({ "name": "Leo Gillespie", "email": email })).unwrap()
    }

    fn booking(event_id: &str) -> Booking {
        entity::build(json!({
            "tour": Uuid::new_v4(),
            "user": Uuid::new_v4(),
            "price": 497,
            "providerEventId": event_id,
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_crud_cycle() {
        let repo = MemoryRepository::<User>::new();
        let created = repo.create(user("leo@example.com")).await.unwrap();

        let found = repo.find_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(found.email, "leo@example.com");

        let updated = repo.update_by_id(created.id, json!({ "name": "Leo G." })).await.unwrap().unwrap();
        assert_eq!(updated.name, "Leo G.");
        assert_eq!(updated.email, "leo@example.com");

        assert!(repo.delete_by_id(created.id).await.unwrap());
        assert!(!repo.delete_by_id(created.id).await.unwrap());
        assert!(repo.update_by_id(created.id, json!({})).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unique_email() {
        let repo = MemoryRepository::<User>::new();
        repo.create(user("leo@example.com")).await.unwrap();
        let err = repo.create(user("LEO@example.com")).await.unwrap_err();
        assert!(matches!(err, CoreError::Conflict { .. }));

        let other = repo.create(user("aarav@example.com")).await.unwrap();
        let err = repo.update_by_id(other.id, json!({ "email": "leo@example.com" })).await.unwrap_err();
        assert!(matches!(err, CoreError::Conflict { .. }));
    }

    #[tokio::test]
    async fn test_concurrent_duplicate_events_create_one_booking() {
        let repo = Arc::new(MemoryRepository::<Booking>::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let repo = repo.clone();
            handles.push(tokio::spawn(async move { repo.create(booking("evt_same")).await }));
        }

        let mut created = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                created += 1;
            }
        }
        assert_eq!(created, 1);
        assert_eq!(repo.len().await, 1);
    }

    #[tokio::test]
    async fn test_find_by_field() {
        let repo = MemoryRepository::<User>::new();
        repo.create(user("leo@example.com")).await.unwrap();
        repo.create(user("aarav@example.com")).await.unwrap();

        let found = repo.find_one(ListQuery::by_field("email", "aarav@example.com")).await.unwrap();
        assert_eq!(found.unwrap().email, "aarav@example.com");
        assert!(repo.find_one(ListQuery::by_field("email", "nobody@example.com")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_find_all_walks_every_page() {
        let repo = MemoryRepository::<User>::new();
        for n in 0..7 {
            repo.create(user(&format!("guest{}@example.com", n))).await.unwrap();
        }

        let page_of_three = ListQuery { limit: 3, ..ListQuery::default() };
        assert_eq!(repo.find(&page_of_three).await.unwrap().len(), 3);

        let all = repo.find_all(page_of_three).await.unwrap();
        assert_eq!(all.len(), 7);
        let mut ids: Vec<Uuid> = all.iter().map(|u| u.id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 7);

        let exact = ListQuery { limit: 7, ..ListQuery::default() };
        assert_eq!(repo.find_all(exact).await.unwrap().len(), 7);
    }
}

use async_trait::async_trait;
use natours_core::entity::{self, Entity};
use natours_core::query::{FilterValue, ListQuery};
use natours_core::{CoreError, CoreResult, Repository};
use serde_json::Value;
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::marker::PhantomData;
use uuid::Uuid;

/// Stores `E` as a JSONB document in the table named by `E::COLLECTION`.
///
/// Field names from list queries are always bound as parameters
/// (`doc ->> $1`), never spliced into the SQL text.
pub struct PgRepository<E> {
    pool: PgPool,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> PgRepository<E> {
    pub fn new(pool: PgPool) -> Self {
        Self { pool, _entity: PhantomData }
    }
}

fn map_sqlx<E: Entity>(err: sqlx::Error) -> CoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            return CoreError::Conflict {
                entity: E::NAME,
                key: db.constraint().unwrap_or("unique key").to_string(),
            };
        }
    }
    tracing::error!("{} storage failure: {}", E::NAME, err);
    CoreError::StorageError(err.to_string())
}

/// Appends `WHERE`, `ORDER BY` and paging clauses for a list query.
fn push_list_clauses(qb: &mut QueryBuilder<'_, Postgres>, query: &ListQuery) {
    qb.push(" WHERE TRUE");

    for filter in &query.filters {
        match &filter.value {
            FilterValue::Number(n) => {
                qb.push(" AND (CASE WHEN jsonb_typeof(doc -> ");
                qb.push_bind(filter.field.clone());
                qb.push(") = 'number' THEN (doc ->> ");
                qb.push_bind(filter.field.clone());
                qb.push(")::float8 END) ");
                qb.push(filter.op.as_sql());
                qb.push(" ");
                qb.push_bind(*n);
            }
            FilterValue::Text(text) => {
                qb.push(" AND (doc ->> ");
                qb.push_bind(filter.field.clone());
                qb.push(") COLLATE \"C\" ");
                qb.push(filter.op.as_sql());
                qb.push(" ");
                qb.push_bind(text.clone());
            }
        }
    }

    qb.push(" ORDER BY ");
    for key in &query.sort {
        qb.push("doc -> ");
        qb.push_bind(key.field.clone());
        qb.push(if key.descending { " DESC, " } else { " ASC, " });
    }
    qb.push("id ASC LIMIT ");
    qb.push_bind(i64::from(query.limit));
    qb.push(" OFFSET ");
    qb.push_bind(query.offset() as i64);
}

#[async_trait]
impl<E: Entity> Repository<E> for PgRepository<E> {
    async fn create(&self, record: E) -> CoreResult<E> {
        let doc = entity::to_document(&record)?;

        sqlx::query(&format!("INSERT INTO {} (id, doc) VALUES ($1, $2)", E::COLLECTION))
            .bind(record.id())
            .bind(&doc)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx::<E>)?;

        Ok(record)
    }

    async fn find_by_id(&self, id: Uuid) -> CoreResult<Option<E>> {
        let doc: Option<Value> = sqlx::query_scalar(&format!("SELECT doc FROM {} WHERE id = $1", E::COLLECTION))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx::<E>)?;

        doc.map(entity::from_document).transpose()
    }

    async fn find(&self, query: &ListQuery) -> CoreResult<Vec<E>> {
        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT doc FROM {}", E::COLLECTION));
        push_list_clauses(&mut qb, query);

        let docs: Vec<Value> = qb
            .build_query_scalar::<Value>()
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx::<E>)?;

        docs.into_iter().map(entity::from_document).collect()
    }

    async fn update_by_id(&self, id: Uuid, patch: Value) -> CoreResult<Option<E>> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx::<E>)?;

        let current: Option<Value> = sqlx::query_scalar(&format!(
            "SELECT doc FROM {} WHERE id = $1 FOR UPDATE",
            E::COLLECTION
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_sqlx::<E>)?;

        let Some(current) = current else {
            return Ok(None);
        };

        let current: E = entity::from_document(current)?;
        let updated = entity::merge_patch(&current, patch)?;
        let doc = entity::to_document(&updated)?;

        sqlx::query(&format!("UPDATE {} SET doc = $2 WHERE id = $1", E::COLLECTION))
            .bind(id)
            .bind(&doc)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx::<E>)?;

        tx.commit().await.map_err(map_sqlx::<E>)?;
        Ok(Some(updated))
    }

    async fn delete_by_id(&self, id: Uuid) -> CoreResult<bool> {
        let result = sqlx::query(&format!("DELETE FROM {} WHERE id = $1", E::COLLECTION))
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx::<E>)?;

        Ok(result.rows_affected() > 0)
    }
}

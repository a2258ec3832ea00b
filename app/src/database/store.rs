use async_trait::async_trait;
use parking_lot::RwLock;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ColumnTrait, ConnectionTrait, Database as SeaDatabase, DatabaseConnection, EntityTrait,
    QueryFilter, Schema, Set,
};
use serde_json::Value;
use std::collections::HashMap;

use super::entity::{self, Entity as DocumentRow};
use crate::error::{BotError, Result};
use crate::models::Document;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Guild,
    User,
}

impl Kind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::Guild => "guild",
            Kind::User => "user",
        }
    }
}

/// Read-by-id, write-by-category document service.
#[async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    async fn read(&self, kind: Kind, id: &str) -> Result<Option<Document>>;

    /// Fails with `DuplicateDocument` when the document already exists.
    async fn create(&self, kind: Kind, id: &str, doc: Document) -> Result<()>;

    async fn write(&self, kind: Kind, id: &str, category: &str, value: &Value) -> Result<()>;
}

pub struct SqlStore {
    conn: DatabaseConnection,
}

impl SqlStore {
    pub async fn connect(url: &str) -> Result<Self> {
        let conn = SeaDatabase::connect(url).await?;
        let backend = conn.get_database_backend();
        let schema = Schema::new(backend);
        let mut table = schema.create_table_from_entity(DocumentRow);
        table.if_not_exists();
        conn.execute(backend.build(&table)).await?;
        Ok(Self { conn })
    }

    async fn upsert(&self, kind: Kind, id: &str, category: &str, value: &Value) -> Result<()> {
        let row = entity::ActiveModel {
            kind: Set(kind.as_str().to_string()),
            id: Set(id.to_string()),
            category: Set(category.to_string()),
            body: Set(serde_json::to_string(value)?),
        };

        DocumentRow::insert(row)
            .on_conflict(
                OnConflict::columns([
                    entity::Column::Kind,
                    entity::Column::Id,
                    entity::Column::Category,
                ])
                .update_column(entity::Column::Body)
                .to_owned(),
            )
            .exec(&self.conn)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for SqlStore {
    async fn read(&self, kind: Kind, id: &str) -> Result<Option<Document>> {
        let rows = DocumentRow::find()
            .filter(entity::Column::Kind.eq(kind.as_str()))
            .filter(entity::Column::Id.eq(id))
            .all(&self.conn)
            .await?;

        if rows.is_empty() {
            return Ok(None);
        }

        let mut doc = Document::new();
        for row in rows {
            doc.insert(row.category, serde_json::from_str(&row.body)?);
        }
        Ok(Some(doc))
    }

    async fn create(&self, kind: Kind, id: &str, doc: Document) -> Result<()> {
        if self.read(kind, id).await?.is_some() {
            return Err(BotError::DuplicateDocument {
                kind: kind.as_str(),
                id: id.to_string(),
            });
        }
        for (category, value) in &doc {
            self.upsert(kind, id, category, value).await?;
        }
        Ok(())
    }

    async fn write(&self, kind: Kind, id: &str, category: &str, value: &Value) -> Result<()> {
        self.upsert(kind, id, category, value).await
    }
}

/// Process-local store, handy for tests and throwaway runs.
#[derive(Default)]
pub struct MemoryStore {
    docs: RwLock<HashMap<(Kind, String), Document>>,
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn read(&self, kind: Kind, id: &str) -> Result<Option<Document>> {
        Ok(self.docs.read().get(&(kind, id.to_string())).cloned())
    }

    async fn create(&self, kind: Kind, id: &str, doc: Document) -> Result<()> {
        let mut docs = self.docs.write();
        let key = (kind, id.to_string());
        if docs.contains_key(&key) {
            return Err(BotError::DuplicateDocument {
                kind: kind.as_str(),
                id: id.to_string(),
            });
        }
        docs.insert(key, doc);
        Ok(())
    }

    async fn write(&self, kind: Kind, id: &str, category: &str, value: &Value) -> Result<()> {
        self.docs
            .write()
            .entry((kind, id.to_string()))
            .or_default()
            .insert(category.to_string(), value.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn sql_store() -> SqlStore {
        SqlStore::connect("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn sql_store_reads_back_written_categories() {
        let store = sql_store().await;
        assert!(store.read(Kind::Guild, "1").await.unwrap().is_none());

        store
            .write(Kind::Guild, "1", "settings", &json!({ "roster_cap": "20" }))
            .await
            .unwrap();
        store
            .write(Kind::Guild, "1", "settings", &json!({ "roster_cap": "25" }))
            .await
            .unwrap();
        store.write(Kind::Guild, "1", "waitlist", &json!([])).await.unwrap();

        let doc = store.read(Kind::Guild, "1").await.unwrap().unwrap();
        assert_eq!(doc.len(), 2);
        assert_eq!(doc["settings"], json!({ "roster_cap": "25" }));
        assert!(store.read(Kind::User, "1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn sql_store_rejects_duplicate_documents() {
        let store = sql_store().await;
        let mut doc = Document::new();
        doc.insert("guilds".into(), json!({}));

        store.create(Kind::User, "9", doc.clone()).await.unwrap();
        let err = store.create(Kind::User, "9", doc).await.unwrap_err();
        assert!(matches!(err, BotError::DuplicateDocument { kind: "user", .. }));
    }

    #[tokio::test]
    async fn memory_store_writes_single_categories() {
        let store = MemoryStore::default();
        store.write(Kind::User, "2", "guilds", &json!({ "a": 1 })).await.unwrap();

        let doc = store.read(Kind::User, "2").await.unwrap().unwrap();
        assert_eq!(doc["guilds"], json!({ "a": 1 }));
    }
}

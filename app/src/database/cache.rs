use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;

use super::store::Kind;
use crate::models::Document;

/// Read-through cache of whole documents, keyed `"{kind}:{id}"`.
#[derive(Default)]
pub struct DocumentCache {
    entries: RwLock<HashMap<String, Document>>,
}

fn key(kind: Kind, id: &str) -> String {
    format!("{}:{}", kind.as_str(), id)
}

impl DocumentCache {
    pub fn get(&self, kind: Kind, id: &str) -> Option<Document> {
        self.entries.read().get(&key(kind, id)).cloned()
    }

    pub fn set(&self, kind: Kind, id: &str, doc: Document) {
        self.entries.write().insert(key(kind, id), doc);
    }

    /// Replaces one category of a cached document. Uncached documents are left
    /// alone so the next read goes to the store for the full document.
    pub fn update_category(&self, kind: Kind, id: &str, category: &str, value: Value) {
        if let Some(doc) = self.entries.write().get_mut(&key(kind, id)) {
            doc.insert(category.to_string(), value);
        }
    }

    pub fn flush(&self) -> usize {
        let mut entries = self.entries.write();
        let count = entries.len();
        entries.clear();
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn update_category_ignores_uncached_documents() {
        let cache = DocumentCache::default();
        cache.update_category(Kind::Guild, "1", "roles", json!({}));
        assert!(cache.get(Kind::Guild, "1").is_none());

        cache.set(Kind::Guild, "1", Document::new());
        cache.update_category(Kind::Guild, "1", "roles", json!({ "operator": "5" }));
        assert_eq!(cache.get(Kind::Guild, "1").unwrap()["roles"], json!({ "operator": "5" }));
        assert!(cache.get(Kind::User, "1").is_none());
    }

    #[test]
    fn flush_empties_everything() {
        let cache = DocumentCache::default();
        cache.set(Kind::Guild, "1", Document::new());
        cache.set(Kind::User, "1", Document::new());
        assert_eq!(cache.flush(), 2);
        assert!(cache.get(Kind::User, "1").is_none());
    }
}

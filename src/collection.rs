//! Collection schema handles visible to the segment subsystem.
//!
//! The segment manager only ever resolves a collection handle to hand its
//! schema to the field loader; loading and reference counting of
//! collections happen elsewhere.

use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Schema of one field of a collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSchema {
    pub field_id: i64,
    pub name: String,
    pub data_type: String,
}

/// Schema of a loaded collection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollectionSchema {
    pub name: String,
    pub fields: Vec<FieldSchema>,
}

/// Handle to a collection loaded on this node.
#[derive(Debug, Clone)]
pub struct Collection {
    pub collection_id: i64,
    pub schema: CollectionSchema,
}

impl Collection {
    pub fn new(collection_id: i64, schema: CollectionSchema) -> Self {
        Collection {
            collection_id,
            schema,
        }
    }
}

/// Lookup table of the collections loaded on this node.
#[derive(Debug, Default)]
pub struct CollectionRegistry {
    collections: RwLock<AHashMap<i64, Arc<Collection>>>,
}

impl CollectionRegistry {
    pub fn new() -> Self {
        CollectionRegistry::default()
    }

    /// Install a collection handle.
    pub fn register(&self, collection: Arc<Collection>) {
        self.collections
            .write()
            .insert(collection.collection_id, collection);
    }

    /// Resolve a collection handle.
    pub fn get(&self, collection_id: i64) -> Option<Arc<Collection>> {
        self.collections.read().get(&collection_id).cloned()
    }

    /// Drop a collection handle.
    pub fn remove(&self, collection_id: i64) -> Option<Arc<Collection>> {
        self.collections.write().remove(&collection_id)
    }
}

//! Typed collection client
//!
//! [`CollClient`] is bound to one collection name and one default projection.
//! The collection handle behind it is resolved lazily, once, from the owning
//! [`DbClient`](crate::DbClient)'s shared connection. Filters, updates and
//! sort specifications are passed to the driver verbatim.

use bson::{Bson, Document as BsonDocument};
use docbridge_common::{BridgeError, FailurePolicy, Hub, Result};
use futures::future::join_all;
use futures::TryStreamExt;
use mongodb::options::ReturnDocument;
use mongodb::{Collection, Database};
use serde::{de::DeserializeOwned, Serialize};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::projection::Fields;

/// Identifier the server assigned to an inserted document
pub type DocumentId = Bson;

/// One filter/update pair of a [`CollClient::bulk_update`] call
#[derive(Debug, Clone, PartialEq)]
pub struct BulkUpdate {
    pub filter: BsonDocument,
    pub update: BsonDocument,
}

impl BulkUpdate {
    pub fn new(filter: BsonDocument, update: BsonDocument) -> Self {
        Self { filter, update }
    }
}

/// Options for [`CollClient::find_and_modify`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindAndModifyOptions {
    /// Projection of the returned document (defaults to the client's)
    pub fields: Option<Fields>,
    /// Return the document after the update instead of before it
    pub return_new: bool,
    /// Insert a new document when nothing matches
    pub upsert: bool,
    /// Which document to modify when several match
    pub sort: Option<BsonDocument>,
}

/// Promise-style CRUD operations over one collection, decoding documents as `T`
///
/// When a projection leaves fields out, `T` has to tolerate their absence
/// (`Option` or `#[serde(default)]`).
pub struct CollClient<T> {
    name: String,
    fields: Fields,
    handle: Arc<Hub<Collection<BsonDocument>>>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for CollClient<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            fields: self.fields.clone(),
            handle: self.handle.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for CollClient<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollClient")
            .field("name", &self.name)
            .field("fields", &self.fields)
            .field("handle", &self.handle)
            .finish()
    }
}

impl<T> CollClient<T>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    pub(crate) fn new(
        database: Arc<Hub<Database>>,
        name: String,
        fields: Fields,
        policy: FailurePolicy,
    ) -> Self {
        let collection_name = name.clone();
        let handle = Hub::with_policy(
            move || {
                let database = database.clone();
                let collection_name = collection_name.clone();
                async move {
                    let db = database.get().await?;
                    debug!(collection = %collection_name, "Resolved collection handle");
                    Ok(db.collection::<BsonDocument>(&collection_name))
                }
            },
            policy,
        );

        Self {
            name,
            fields,
            handle: Arc::new(handle),
            _marker: PhantomData,
        }
    }

    /// Collection name this client is bound to
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Projection used when an operation is given none
    pub fn default_fields(&self) -> &Fields {
        &self.fields
    }

    /// Resolve the underlying collection handle, connecting if needed
    pub async fn handle(&self) -> Result<Collection<BsonDocument>> {
        self.handle.get().await
    }

    fn projection(&self, fields: Option<&Fields>) -> BsonDocument {
        fields.unwrap_or(&self.fields).to_document()
    }

    /// Find the first document matching `filter`
    #[instrument(skip_all, fields(collection = %self.name))]
    pub async fn get_one(&self, filter: BsonDocument, fields: Option<&Fields>) -> Result<Option<T>> {
        let collection = self.handle().await?;

        let found = collection
            .find_one(filter)
            .projection(self.projection(fields))
            .await?;

        found.map(decode).transpose()
    }

    /// Find every document matching `filter`, in server order
    #[instrument(skip_all, fields(collection = %self.name))]
    pub async fn get_all(&self, filter: BsonDocument, fields: Option<&Fields>) -> Result<Vec<T>> {
        let collection = self.handle().await?;

        let cursor = collection
            .find(filter)
            .projection(self.projection(fields))
            .await?;

        let docs: Vec<BsonDocument> = cursor.try_collect().await?;
        docs.into_iter().map(decode).collect()
    }

    /// Find one page of documents matching `filter`
    ///
    /// Documents are optionally sorted, then `skip` are passed over and at
    /// most `take` are returned. A `take` of zero yields an empty page.
    #[instrument(skip_all, fields(collection = %self.name, skip = skip, take = take))]
    pub async fn get_mul(
        &self,
        filter: BsonDocument,
        fields: Option<&Fields>,
        sort: Option<BsonDocument>,
        skip: u64,
        take: u64,
    ) -> Result<Vec<T>> {
        let collection = self.handle().await?;

        // The server reads a limit of 0 as "no limit"
        if take == 0 {
            return Ok(Vec::new());
        }

        let mut find = collection
            .find(filter)
            .projection(self.projection(fields))
            .skip(skip)
            .limit(page_limit(take))
            .batch_size(u32::try_from(take).unwrap_or(u32::MAX));
        if let Some(sort) = sort {
            find = find.sort(sort);
        }

        let docs: Vec<BsonDocument> = find.await?.try_collect().await?;
        docs.into_iter().map(decode).collect()
    }

    /// Count documents matching `filter`, or every document when `None`
    #[instrument(skip_all, fields(collection = %self.name))]
    pub async fn count(&self, filter: Option<BsonDocument>) -> Result<u64> {
        let collection = self.handle().await?;
        let count = collection.count_documents(filter.unwrap_or_default()).await?;
        Ok(count)
    }

    /// Apply `update` to every document matching `filter`
    ///
    /// Returns the number of documents modified.
    #[instrument(skip_all, fields(collection = %self.name, upsert = upsert))]
    pub async fn update_all(
        &self,
        filter: BsonDocument,
        update: BsonDocument,
        upsert: bool,
    ) -> Result<u64> {
        let collection = self.handle().await?;

        let result = collection
            .update_many(filter, update)
            .upsert(upsert)
            .await?;

        Ok(result.modified_count)
    }

    /// Apply every filter/update pair, in no particular order
    ///
    /// Every pair is attempted even when another one fails. Any failure fails
    /// the whole call with the first error; there is no per-item report.
    #[instrument(skip_all, fields(collection = %self.name, count = items.len(), upsert = upsert))]
    pub async fn bulk_update(&self, items: Vec<BulkUpdate>, upsert: bool) -> Result<()> {
        let collection = self.handle().await?;

        if items.is_empty() {
            return Ok(());
        }

        let collection = &collection;
        let writes = items.into_iter().map(|item| async move {
            collection
                .update_many(item.filter, item.update)
                .upsert(upsert)
                .await
        });

        let results = join_all(writes).await;
        let failed = results.iter().filter(|result| result.is_err()).count();
        match results.into_iter().find_map(|result| result.err()) {
            Some(err) => {
                debug!(failed, "Bulk update finished with failures");
                Err(err.into())
            }
            None => Ok(()),
        }
    }

    /// Insert one document, returning the identifier it was stored under
    #[instrument(skip_all, fields(collection = %self.name))]
    pub async fn create_one(&self, item: &T) -> Result<DocumentId> {
        let collection = self.handle().await?;
        let doc = bson::to_document(item)?;

        let result = collection.insert_one(doc).await?;
        Ok(result.inserted_id)
    }

    /// Insert many documents without ordering guarantees
    ///
    /// Identifiers are returned in the same order as `items`.
    #[instrument(skip_all, fields(collection = %self.name, count = items.len()))]
    pub async fn bulk_insert(&self, items: &[T]) -> Result<Vec<DocumentId>> {
        let collection = self.handle().await?;

        if items.is_empty() {
            return Ok(Vec::new());
        }

        let docs = items
            .iter()
            .map(bson::to_document)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let count = docs.len();

        let mut result = collection.insert_many(docs).ordered(false).await?;

        (0..count)
            .map(|index| {
                result.inserted_ids.remove(&index).ok_or_else(|| {
                    BridgeError::Internal(format!("No inserted id reported for document {}", index))
                })
            })
            .collect()
    }

    /// Atomically find one document matching `filter` and apply `update`
    ///
    /// Returns the document before the update, or after it when
    /// `options.return_new` is set. With `options.upsert` and no match, the
    /// inserted document is returned only when `return_new` is set.
    #[instrument(skip_all, fields(collection = %self.name, return_new = options.return_new, upsert = options.upsert))]
    pub async fn find_and_modify(
        &self,
        filter: BsonDocument,
        update: BsonDocument,
        options: FindAndModifyOptions,
    ) -> Result<Option<T>> {
        let collection = self.handle().await?;

        let return_document = if options.return_new {
            ReturnDocument::After
        } else {
            ReturnDocument::Before
        };

        let mut action = collection
            .find_one_and_update(filter, update)
            .projection(self.projection(options.fields.as_ref()))
            .return_document(return_document)
            .upsert(options.upsert);
        if let Some(sort) = options.sort {
            action = action.sort(sort);
        }

        let found = action.await?;
        found.map(decode).transpose()
    }
}

// Anything past i64::MAX is already "every document"
fn page_limit(take: u64) -> i64 {
    i64::try_from(take).unwrap_or(i64::MAX)
}

fn decode<T: DeserializeOwned>(doc: BsonDocument) -> Result<T> {
    Ok(bson::from_document(doc)?)
}

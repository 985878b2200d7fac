use std::{sync::Arc, time::Duration};

use futures::future::BoxFuture;
use reqwest::{Client, Method, StatusCode, Url};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Value, from_value};
use tracing::debug;

use crate::dao::{
    document_store::{CollectionName, DocumentStore, RawDocument, SnapshotStream},
    storage::{StorageError, StorageResult},
};

use super::{
    config::CouchConfig,
    error::{CouchDaoError, CouchResult},
    models::{
        AllDocsResponse, ChangesResponse, CouchDocument, DatabaseInfo, END_SUFFIX, RevisionOnly,
        collection_prefix, doc_id, seq_param,
    },
};

const ALL_DOCS: &str = "_all_docs";
const CHANGES: &str = "_changes";
/// Extra slack on top of the long-poll timeout before the HTTP request itself gives up.
const CHANGES_GRACE: Duration = Duration::from_secs(10);

/// Document store backed by a single CouchDB database; collections are id prefixes.
#[derive(Clone)]
pub struct CouchDocumentStore {
    client: Client,
    database_url: Arc<Url>,
    database: Arc<str>,
    auth: Option<(Arc<str>, Arc<str>)>,
    changes_timeout: Duration,
}

impl CouchDocumentStore {
    /// Establish a connection to CouchDB and ensure the database exists.
    pub async fn connect(config: CouchConfig) -> CouchResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| CouchDaoError::ClientBuilder { source })?;

        let invalid = || CouchDaoError::InvalidBaseUrl {
            url: config.base_url.clone(),
        };
        let mut database_url = Url::parse(config.base_url.trim_end_matches('/')).map_err(|_| invalid())?;
        database_url
            .path_segments_mut()
            .map_err(|_| invalid())?
            .pop_if_empty()
            .push(&config.database);

        let auth = config
            .credentials
            .map(|c| (Arc::<str>::from(c.username), Arc::<str>::from(c.password)));

        let store = Self {
            client,
            database_url: Arc::new(database_url),
            database: Arc::<str>::from(config.database),
            auth,
            changes_timeout: config.changes_timeout,
        };

        store.ensure_database().await?;
        Ok(store)
    }

    fn url(&self, segment: &str) -> Url {
        let mut url = (*self.database_url).clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.push(segment);
        }
        url
    }

    fn request(&self, method: Method, url: Url) -> reqwest::RequestBuilder {
        let builder = self.client.request(method, url);
        if let Some((ref user, ref pass)) = self.auth {
            builder.basic_auth(user.as_ref(), Some(pass.as_ref()))
        } else {
            builder
        }
    }

    async fn ensure_database(&self) -> CouchResult<()> {
        let database = self.database.to_string();
        let url = (*self.database_url).clone();

        let response = self
            .request(Method::GET, url.clone())
            .send()
            .await
            .map_err(|source| CouchDaoError::DatabaseQuery {
                database: database.clone(),
                source,
            })?;

        match response.status() {
            StatusCode::OK => Ok(()),
            StatusCode::NOT_FOUND => {
                let create = self
                    .request(Method::PUT, url)
                    .send()
                    .await
                    .map_err(|source| CouchDaoError::DatabaseCreate {
                        database: database.clone(),
                        source,
                    })?;
                if create.status().is_success() {
                    Ok(())
                } else {
                    Err(CouchDaoError::DatabaseStatus {
                        database,
                        status: create.status(),
                    })
                }
            }
            other => Err(CouchDaoError::DatabaseStatus {
                database,
                status: other,
            }),
        }
    }

    async fn get_json<T>(&self, path: &str, request: reqwest::RequestBuilder) -> CouchResult<Option<T>>
    where
        T: DeserializeOwned,
    {
        let response = request
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: path.to_string(),
                source,
            })?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                response.json::<T>().await.map(Some).map_err(|source| {
                    CouchDaoError::DecodeResponse {
                        path: path.to_string(),
                        source,
                    }
                })
            }
            other => Err(CouchDaoError::RequestStatus {
                path: path.to_string(),
                status: other,
            }),
        }
    }

    async fn current_revision(&self, doc_id: &str) -> CouchResult<Option<String>> {
        let request = self.request(Method::GET, self.url(doc_id));
        let revision = self.get_json::<RevisionOnly>(doc_id, request).await?;
        Ok(revision.map(|r| r.rev))
    }

    async fn put_document<T>(&self, doc_id: &str, document: &T) -> CouchResult<()>
    where
        T: ?Sized + Serialize,
    {
        let response = self
            .request(Method::PUT, self.url(doc_id))
            .json(document)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: doc_id.to_string(),
                source,
            })?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status: response.status(),
            })
        }
    }

    async fn save(&self, collection: CollectionName, document: RawDocument) -> CouchResult<()> {
        let id = doc_id(collection, &document.key);
        let rev = self.current_revision(&id).await?;
        let body = CouchDocument::from_raw(collection, document, rev);
        self.put_document(&id, &body).await
    }

    async fn remove(&self, collection: CollectionName, key: &str) -> CouchResult<bool> {
        let id = doc_id(collection, key);
        let Some(rev) = self.current_revision(&id).await? else {
            return Ok(false);
        };

        let response = self
            .request(Method::DELETE, self.url(&id))
            .query(&[("rev", rev)])
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: id.clone(),
                source,
            })?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            status => Err(CouchDaoError::RequestStatus { path: id, status }),
        }
    }

    async fn list_documents(&self, collection: CollectionName) -> CouchResult<Vec<RawDocument>> {
        let prefix = collection_prefix(collection);
        let encode_key = |key: String| Value::String(key).to_string();
        let query = [
            ("include_docs", "true".to_string()),
            ("startkey", encode_key(prefix.clone())),
            ("endkey", encode_key(format!("{prefix}{END_SUFFIX}"))),
        ];

        let request = self.request(Method::GET, self.url(ALL_DOCS)).query(&query);
        let payload = self
            .get_json::<AllDocsResponse>(ALL_DOCS, request)
            .await?
            .ok_or(CouchDaoError::RequestStatus {
                path: ALL_DOCS.to_string(),
                status: StatusCode::NOT_FOUND,
            })?;

        let mut documents = Vec::with_capacity(payload.rows.len());
        for doc in payload.rows.into_iter().filter_map(|row| row.doc) {
            let parsed: CouchDocument =
                from_value(doc).map_err(|source| CouchDaoError::DeserializeValue {
                    path: ALL_DOCS.to_string(),
                    source,
                })?;
            if let Some(document) = parsed.into_raw(collection) {
                documents.push(document);
            }
        }

        Ok(documents)
    }

    async fn update_seq(&self) -> CouchResult<Value> {
        let request = self.request(Method::GET, (*self.database_url).clone());
        let info = self
            .get_json::<DatabaseInfo>(&self.database, request)
            .await?
            .ok_or_else(|| CouchDaoError::DatabaseStatus {
                database: self.database.to_string(),
                status: StatusCode::NOT_FOUND,
            })?;
        Ok(info.update_seq)
    }

    /// Long-poll the changes feed until something changes after `since` or the poll times out.
    async fn poll_changes(&self, since: &Value) -> CouchResult<ChangesResponse> {
        let query = [
            ("feed", "longpoll".to_string()),
            ("since", seq_param(since)),
            ("timeout", self.changes_timeout.as_millis().to_string()),
        ];
        let request = self
            .request(Method::GET, self.url(CHANGES))
            .query(&query)
            .timeout(self.changes_timeout + CHANGES_GRACE);

        self.get_json::<ChangesResponse>(CHANGES, request)
            .await?
            .ok_or(CouchDaoError::RequestStatus {
                path: CHANGES.to_string(),
                status: StatusCode::NOT_FOUND,
            })
    }
}

impl DocumentStore for CouchDocumentStore {
    fn list(&self, collection: CollectionName) -> BoxFuture<'static, StorageResult<Vec<RawDocument>>> {
        let store = self.clone();
        Box::pin(async move { store.list_documents(collection).await.map_err(Into::into) })
    }

    fn put(
        &self,
        collection: CollectionName,
        document: RawDocument,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save(collection, document).await.map_err(Into::into) })
    }

    fn delete(&self, collection: CollectionName, key: String) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.remove(collection, &key).await.map_err(Into::into) })
    }

    fn watch(&self, collection: CollectionName) -> BoxFuture<'static, StorageResult<SnapshotStream>> {
        let store = self.clone();
        Box::pin(async move {
            // Read the sequence before the initial listing so later edits are never missed.
            let mut since = store.update_seq().await?;
            let initial = store.list_documents(collection).await?;
            let prefix = collection_prefix(collection);

            let stream = async_stream::stream! {
                yield Ok::<_, StorageError>(initial);
                loop {
                    let changes = match store.poll_changes(&since).await {
                        Ok(changes) => changes,
                        Err(err) => {
                            yield Err(err.into());
                            break;
                        }
                    };
                    since = changes.last_seq;

                    if !changes.results.iter().any(|row| row.id.starts_with(&prefix)) {
                        continue;
                    }
                    debug!(%collection, "CouchDB changes feed touched collection; relisting");
                    match store.list_documents(collection).await {
                        Ok(documents) => yield Ok(documents),
                        Err(err) => {
                            yield Err(err.into());
                            break;
                        }
                    }
                }
            };

            Ok(Box::pin(stream) as SnapshotStream)
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let url = (*store.database_url).clone();
            let path = url.to_string();
            let response = store
                .request(Method::GET, url)
                .send()
                .await
                .map_err(|source| CouchDaoError::RequestSend {
                    path: path.clone(),
                    source,
                })?;

            if response.status().is_success() {
                Ok(())
            } else {
                Err(CouchDaoError::RequestStatus {
                    path,
                    status: response.status(),
                }
                .into())
            }
        })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ensure_database().await.map_err(Into::into) })
    }
}

//! Connection bootstrap shared by the first connect and later reconnects.

use std::time::Duration;

use mongodb::{
    Client, Database,
    bson::doc,
    error::{Error as MongoError, ErrorKind},
};
use tokio::time::sleep;
use tracing::{debug, info};

use super::{
    config::MongoConfig,
    error::{MongoDaoError, MongoResult},
};
use crate::dao::document_store::CollectionName;

const PING_ATTEMPTS: u32 = 10;
const FIRST_PING_BACKOFF: Duration = Duration::from_millis(250);
const MAX_PING_BACKOFF: Duration = Duration::from_secs(5);

/// Server error code for "collection already exists".
const NAMESPACE_EXISTS: i32 = 48;

/// Build a client, wait for the server, and make sure every tournament collection exists.
pub(super) async fn open_database(config: &MongoConfig) -> MongoResult<(Client, Database)> {
    let client = Client::with_options(config.options.clone())
        .map_err(|source| MongoDaoError::ClientConstruction { source })?;
    let database = client.database(&config.database_name);

    wait_for_ping(&database).await?;
    ensure_collections(&database).await?;

    info!(database = %config.database_name, "MongoDB tournament database ready");
    Ok((client, database))
}

async fn wait_for_ping(database: &Database) -> MongoResult<()> {
    let mut attempt = 0;
    let mut backoff = FIRST_PING_BACKOFF;

    loop {
        attempt += 1;
        let Err(source) = database.run_command(doc! { "ping": 1 }).await else {
            return Ok(());
        };
        if attempt >= PING_ATTEMPTS {
            return Err(MongoDaoError::InitialPing {
                attempts: attempt,
                source,
            });
        }
        debug!(attempt, error = %source, "MongoDB not answering yet");
        sleep(backoff).await;
        backoff = (backoff * 2).min(MAX_PING_BACKOFF);
    }
}

/// Create any tournament collection the database lacks.
async fn ensure_collections(database: &Database) -> MongoResult<()> {
    let existing = database
        .list_collection_names()
        .await
        .map_err(|source| MongoDaoError::ListCollections { source })?;

    for collection in CollectionName::ALL {
        if existing.iter().any(|name| name == collection.as_str()) {
            continue;
        }
        match database.create_collection(collection.as_str()).await {
            Ok(()) => info!(%collection, "created MongoDB collection"),
            // Another instance created it after the listing.
            Err(err) if already_exists(&err) => {}
            Err(source) => return Err(MongoDaoError::CreateCollection { collection, source }),
        }
    }
    Ok(())
}

fn already_exists(err: &MongoError) -> bool {
    matches!(err.kind.as_ref(), ErrorKind::Command(command) if command.code == NAMESPACE_EXISTS)
}

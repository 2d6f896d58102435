use mongodb::bson::doc;
use mongodb::error::Error;
use mongodb::options::{ClientOptions, IndexOptions};
use mongodb::{Client, IndexModel};

use crate::state::AppState;

pub async fn init_db(uri: &str) -> Result<Client, Error> {
    let mut client_options = ClientOptions::parse(uri).await?;
    client_options.app_name = Some("user_api".to_string());
    Client::with_options(client_options)
}

/// Creates the indexes the collaborators rely on. Safe to run on every start.
pub async fn ensure_indexes(state: &AppState) -> Result<(), Error> {
    let unique = IndexOptions::builder().unique(true).build();

    state
        .users_collection
        .create_index(
            IndexModel::builder()
                .keys(doc! { "email": 1 })
                .options(unique.clone())
                .build(),
            None,
        )
        .await?;

    state
        .tokens_collection
        .create_index(
            IndexModel::builder()
                .keys(doc! { "token": 1 })
                .options(unique)
                .build(),
            None,
        )
        .await?;

    state
        .tokens_collection
        .create_index(IndexModel::builder().keys(doc! { "user_id": 1 }).build(), None)
        .await?;

    log::info!("database indexes ensured");
    Ok(())
}

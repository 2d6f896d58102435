#![allow(dead_code)]

use user_api::config::Config;
use user_api::router::Router;
use user_api::routes;
use user_api::state::AppState;

pub const PREFIX: &str = "/api/users";

/// State backed by a MongoDB address nothing listens on. Any stage that reaches
/// the database fails with a server selection error after a short timeout.
pub async fn test_state() -> AppState {
    let config = Config::for_tests();
    let client = mongodb::Client::with_uri_str(&config.mongo_uri).await.unwrap();
    AppState::new(&client.database(&config.mongo_db_name), &config, None)
}

pub fn test_router() -> Router<AppState> {
    routes::user_routes::build(true)
}

pub fn url(path: &str) -> String {
    format!("{}{}", PREFIX, path)
}

/// Initializes the full service with a fresh router, so rate limit windows start empty.
macro_rules! test_app {
    () => {
        actix_web::test::init_service(
            actix_web::App::new()
                .app_data(actix_web::web::Data::new(common::test_state().await))
                .app_data(actix_web::web::Data::new(common::test_router()))
                .configure(|cfg| user_api::routes::init(cfg, common::PREFIX)),
        )
        .await
    };
}

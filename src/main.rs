use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use dotenv::dotenv;

use user_api::services::mail_service::Mailer;
use user_api::{config, db, routes, state};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load environment variables from .env file (if exists)
    dotenv().ok();
    env_logger::init();

    let config = config::Config::from_env();

    let db_client = db::init_db(&config.mongo_uri)
        .await
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
    let database = db_client.database(&config.mongo_db_name);

    let mailer = match &config.smtp {
        Some(smtp) => match Mailer::from_config(smtp) {
            Ok(m) => Some(m),
            Err(e) => {
                log::error!("mail disabled, invalid SMTP settings: {}", e);
                None
            }
        },
        None => {
            log::warn!("SMTP_SERVER or EMAIL_FROM not set; outgoing mail is disabled");
            None
        }
    };

    let app_state = state::AppState::new(&database, &config, mailer);
    if let Err(e) = db::ensure_indexes(&app_state).await {
        log::warn!("could not ensure indexes: {}", e);
    }

    // Built once; shared read-only by every worker.
    let router = web::Data::new(routes::user_routes::build(config.enable_test_email));
    let app_data = web::Data::new(app_state);
    let prefix = config.api_prefix.clone();

    log::info!(
        "listening on {}:{} with user routes under {}",
        config.server_host,
        config.server_port,
        if prefix.is_empty() { "/" } else { prefix.as_str() }
    );

    HttpServer::new(move || {
        let prefix = prefix.clone();
        App::new()
            .wrap(middleware::Logger::default()) // Logging middleware
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allow_any_method()
                    .allow_any_header()
                    .max_age(3600),
            ) // CORS setup
            .app_data(app_data.clone())
            .app_data(router.clone())
            .configure(move |cfg| routes::init(cfg, &prefix))
    })
    .bind((config.server_host, config.server_port))?
    .run()
    .await
}

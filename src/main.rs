use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use catalog_service::api;
use catalog_service::config::Config;
use catalog_service::db::create_pool;
use catalog_service::services::accounts::ensure_superuser;
use catalog_service::services::mailer::{LogTransport, MailNotifier, Notifier};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = Config::from_env().expect("Failed to load configuration");

    log::info!(
        "Starting server on {}:{}",
        config.server.host,
        config.server.port
    );
    let pool = create_pool(&config)
        .await
        .expect("Failed to create database pool");

    log::info!("Database connection established");

    if let (Some(email), Some(password)) = (
        config.accounts.admin_email.clone(),
        config.accounts.admin_password.clone(),
    ) {
        if let Err(e) = ensure_superuser(&pool, &config, &email, &password).await {
            log::error!("Failed to ensure superuser {}: {}", email, e);
        }
    }

    let notifier: Arc<dyn Notifier> = Arc::new(MailNotifier::new(&config, Arc::new(LogTransport)));

    let openapi = api::ApiDoc::openapi();

    let server_host = config.server.host.clone();
    let server_port = config.server.port;
    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(Cors::permissive())
            .app_data(web::Data::new(config.clone()))
            .app_data(web::Data::new(pool.clone()))
            .app_data(web::Data::from(notifier.clone()))
            .route(
                "/api/docs",
                web::get().to(|| async {
                    actix_web::HttpResponse::PermanentRedirect()
                        .append_header(("Location", "/api/docs/"))
                        .finish()
                }),
            )
            .service(
                SwaggerUi::new("/api/docs/{_:.*}").url("/api-docs/openapi.json", openapi.clone()),
            )
            .configure(api::configure)
    })
    .bind(format!("{}:{}", server_host, server_port))?
    .run()
    .await
}

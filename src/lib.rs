use actix_cors::Cors;
use actix_web::middleware::Compress;
use actix_web::{web, App, HttpServer};
use actix_web_prometheus::PrometheusMetricsBuilder;
use anyhow::Context;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod api;
pub mod compose;
pub mod config;
pub mod dispatch;
pub mod document;
pub mod mailer;
pub mod merge;
pub mod upstream;

pub use crate::api::AppState;
pub use crate::config::AppConfig;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::api::handlers::home,
        crate::api::handlers::send_invoice,
        crate::api::handlers::send_prescription
    ),
    components(
        schemas(
            api::models::SendInvoiceRequest,
            api::models::SendPrescriptionRequest,
            api::models::DispatchSuccessResponse,
            api::models::DispatchFailureResponse,
            api::models::ResponseMetadata,
            api::models::ErrorDetail,
            api::models::FieldErrors,
            api::models::ValidationFailureResponse,
            dispatch::DispatchReport,
            dispatch::PhaseTimings,
            mailer::MailReceipt,
        )
    ),
    tags(
        (name = "Dispatch", description = "Invoice and prescription email dispatch."),
        (name = "Health", description = "Liveness.")
    )
)]
pub struct ApiDoc;

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok(); // Load .env file
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AppConfig::from_env().context("invalid configuration")?;
    let bind = (config.server.host.clone(), config.server.port);
    log::info!(
        "Upstream environments: {:?} (default `{}`)",
        config.upstream.environments.keys().collect::<Vec<_>>(),
        config.upstream.default_env
    );
    log::debug!("Mail settings: {:?}", config.mail);

    let dispatcher = dispatch::DispatchService::from_config(config)
        .context("failed to initialise dispatch service")?;
    let app_state = web::Data::new(AppState::new(dispatcher));

    let prometheus = PrometheusMetricsBuilder::new("clinic_mailer")
        .endpoint("/metrics")
        .build()
        .map_err(|e| anyhow::anyhow!("failed to create Prometheus metrics middleware: {e}"))?;

    log::info!("Starting server at http://{}:{}", bind.0, bind.1);

    HttpServer::new(move || {
        App::new()
            .wrap(Compress::default())
            .wrap(prometheus.clone())
            .wrap(Cors::permissive())
            .app_data(app_state.clone())
            .configure(api::config)
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
    })
    .keep_alive(actix_web::http::KeepAlive::Os)
    .bind(bind)?
    .run()
    .await?;

    Ok(())
}

use actix_cors::Cors;
use actix_web::{middleware::Compress, web, App, HttpResponse, HttpServer};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::Arc;
use tracing::{info, Level};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi; // bring trait into scope for ApiDoc::openapi()
use utoipa_swagger_ui::SwaggerUi;

use postfeed::config::ServerConfig;
use postfeed::openapi::ApiDoc;
use postfeed::repo::Repo;
use postfeed::AppState;

async fn render_metrics(handle: web::Data<PrometheusHandle>) -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(handle.render())
}

#[cfg(feature = "inmem-store")]
fn in_memory_repo(cfg: &ServerConfig) -> anyhow::Result<Arc<dyn Repo>> {
    use postfeed::repo::inmem::InMemRepo;
    let repo = match &cfg.data_dir {
        Some(dir) => InMemRepo::with_snapshot_dir(dir),
        None => InMemRepo::new(),
    };
    info!("Using in-memory repository backend");
    Ok(Arc::new(repo))
}

#[cfg(not(feature = "inmem-store"))]
fn in_memory_repo(_cfg: &ServerConfig) -> anyhow::Result<Arc<dyn Repo>> {
    anyhow::bail!("DATABASE_URL must be set when the inmem-store feature is disabled")
}

/// Postgres when DATABASE_URL is set, otherwise the in-memory store.
fn build_repo(cfg: &ServerConfig) -> anyhow::Result<Arc<dyn Repo>> {
    #[cfg(feature = "postgres-store")]
    {
        if let Some(url) = cfg.database_url.as_deref() {
            use sqlx::postgres::PgPoolOptions;
            let pool = PgPoolOptions::new()
                .max_connections(cfg.db_max_connections)
                .connect_lazy(url)?;
            info!("Using Postgres repository backend");
            return Ok(Arc::new(postfeed::repo::pg::PgRepo::new(pool)));
        }
    }
    in_memory_repo(cfg)
}

fn to_io(e: impl std::fmt::Display) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env automatically only in debug builds to reduce manual setup overhead.
    if cfg!(debug_assertions) {
        let _ = dotenv::dotenv();
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    info!("Bootstrapping postfeed server");
    let cfg = ServerConfig::from_env();
    info!("Notification dedup window: {}s", cfg.dedup_window_secs);

    let repo = build_repo(&cfg).map_err(to_io)?;
    let prometheus = PrometheusBuilder::new().install_recorder().map_err(to_io)?;
    let state = AppState::new(repo, cfg.notify_policy());
    let openapi = ApiDoc::openapi();
    let frontend_url = cfg.frontend_url.clone();

    let server = HttpServer::new(move || {
        let cors = {
            let mut c = Cors::default()
                // local dev frontends
                .allowed_origin("http://localhost:5173")
                .allowed_origin("http://127.0.0.1:5173")
                .allowed_origin("http://localhost:3000")
                .allowed_origin("http://127.0.0.1:3000")
                .allow_any_header()
                .allowed_methods(["GET", "PUT", "POST", "OPTIONS"])
                .max_age(3600);
            if let Some(front) = frontend_url.as_deref() {
                c = c.allowed_origin(front);
            }
            c
        };

        App::new()
            .wrap(TracingLogger::default())
            .wrap(Compress::default())
            .wrap(cors)
            .app_data(web::Data::new(state.clone()))
            .app_data(web::Data::new(prometheus.clone()))
            .configure(postfeed::config)
            .service(SwaggerUi::new("/docs/{_:.*}").url("/docs/openapi.json", openapi.clone()))
            .route("/metrics", web::get().to(render_metrics))
    })
    .bind(cfg.bind_addr.as_str())?;

    info!("Listening on http://{}", cfg.bind_addr);

    server.run().await
}

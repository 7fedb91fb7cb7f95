/*!
The `rollbook` server binary: logging, configuration, routes, serve.
*/
use std::sync::Arc;

use axum::{
    extract::Extension,
    middleware,
    Router,
    routing::{get, get_service, post},
};
use simplelog::{ColorChoice, TerminalMode, TermLogger};
use tower_http::services::fs::{ServeDir, ServeFile};

use rollbook::{api, config};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let log_cfg = simplelog::ConfigBuilder::new()
        .add_filter_allow_str("rollbook")
        .build();
    TermLogger::init(
        rollbook::log_level_from_env(),
        log_cfg,
        TerminalMode::Stdout,
        ColorChoice::Auto
    ).unwrap();
    log::info!("Logging started.");

    let config_path = std::env::var("ROLLBOOK_CONFIG")
        .unwrap_or_else(|_| "rollbook.toml".to_owned());
    let glob = match config::load_configuration(&config_path).await {
        Ok(glob) => Arc::new(glob),
        Err(e) => {
            log::error!("Unable to initialize: {}", &e);
            std::process::exit(1);
        },
    };

    let serve_root = get_service(
        ServeFile::new(glob.static_dir.join("login.html"))
    );

    let student_routes = Router::new()
        .route(
            "/",
            post(api::students::create).get(api::students::list)
        )
        .route(
            "/:id",
            get(api::students::get_one)
                .put(api::students::update)
                .delete(api::students::remove)
        )
        .route("/filter/search", get(api::students::filter))
        .route("/analysis/report", get(api::students::analysis_report))
        .layer(middleware::from_fn(api::key_authenticate));

    let app = Router::new()
        .route("/", serve_root)
        .nest_service("/static", ServeDir::new(&glob.static_dir))
        .route("/api/health", get(api::health))
        .route("/api/auth/register", post(api::auth::register))
        .route("/api/auth/login", post(api::auth::login))
        .route(
            "/api/auth/check-username/:uname",
            get(api::auth::check_username)
        )
        .nest("/api/students", student_routes)
        .layer(Extension(glob.clone()));

    log::info!("Listening on {}", &glob.addr);

    axum::Server::bind(&glob.addr)
        .serve(app.into_make_service())
        .await
        .unwrap();
}

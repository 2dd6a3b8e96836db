mod config;
mod db;
mod errors;
mod handlers;
mod models;
mod routes;

use actix_web::{middleware, web, App, HttpServer};
use dotenv::dotenv;
use log::{error, info};

use crate::config::Settings;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::init();

    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(err) => {
            error!("Invalid configuration: {}", err);
            std::process::exit(1);
        }
    };

    // Built once and shared by every worker; closed after the server stops.
    let store = match db::connect(&settings).await {
        Ok(store) => store,
        Err(err) => {
            error!("Failed to initialize data backend: {}", err);
            std::process::exit(1);
        }
    };

    info!("Starting server at {}", settings.bind_address);

    let data = web::Data::from(store.clone());
    let result = HttpServer::new(move || {
        App::new()
            .wrap(middleware::Logger::default())
            .wrap(middleware::NormalizePath::trim())
            .app_data(data.clone())
            .configure(routes::configure)
    })
    .bind(&settings.bind_address)?
    .run()
    .await;

    store.close().await;
    info!("Server stopped");
    result
}

mod config;
mod error;
mod handlers;
mod models;
mod services;
mod state;
mod tasks;

#[cfg(test)]
mod testing;

use std::sync::Arc;
use std::time::Duration;

use actix_web::{web, App, HttpServer, middleware::Logger};
use actix_cors::Cors;
use dotenv::dotenv;

use services::{
    clock::{Clock, SystemClock},
    database::DatabaseService,
    dispatcher::Dispatcher,
    mailer,
};
use state::AppState;
use tasks::recurrence::RecurrenceSweep;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::init();

    let config = config::Config::from_env().expect("Failed to load configuration");

    let database = Arc::new(
        DatabaseService::new(&config.database)
            .await
            .expect("Failed to initialize database"),
    );
    if let Err(e) = database.health_check().await {
        log::warn!("Database health check failed: {:#}", e);
    }

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let dispatcher = Dispatcher::new(database.clone(), mailer::from_config(&config.mailer), clock.clone());

    if config.sweep.enabled {
        RecurrenceSweep::new(database.clone(), database.clone(), clock.clone())
            .spawn(Duration::from_secs(config.sweep.interval_secs), dispatcher.clone());
    } else {
        log::warn!("Recurrence sweep disabled; subscriptions will not generate orders");
    }

    let state = web::Data::new(AppState::new(database, clock, dispatcher));
    let bind_address = format!("0.0.0.0:{}", config.port);

    log::info!("Starting marketplace API on {}", bind_address);

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allow_any_method()
                    .allow_any_header()
            )
            .app_data(state.clone())
            .configure(handlers::configure)
    })
    .bind(&bind_address)?
    .run()
    .await
}

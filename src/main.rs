use std::{sync::Arc, time::Duration};

use crate::{
    backend::BookingBackend, booking_manager::BookingManager, configuration::Configuration,
    configuration_handler::ConfigurationHandler, conflict::BusinessDays,
    database_interface::DatabaseInterface, http::create_app, local_bookings::LocalBookings,
    notifier::{LogNotifier, NotificationDispatcher},
};
use tokio::time::sleep;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod admission;
mod availability;
mod backend;
mod booking_manager;
mod configuration;
mod configuration_handler;
mod conflict;
mod database_interface;
mod error;
mod http;
mod local_bookings;
mod notifier;
mod schema;
mod slot;
mod status;
#[cfg(test)]
mod testutils;
mod types;

#[derive(Clone)]
pub struct AppState<T: BookingBackend, C: Configuration> {
    booking_manager: BookingManager<T>,
    configuration: C,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("################");
    println!("# Booking Desk #");
    println!("################");

    let configuration = ConfigurationHandler::parse_arguments();
    info!(business = configuration.business_name(), "Starting booking desk");

    let business_days = BusinessDays::closed_on(configuration.closed_weekdays());
    let dispatcher = NotificationDispatcher::new(Arc::new(LogNotifier));

    let address = format!("0.0.0.0:{}", configuration.port());
    println!("Accessable at:\n{}", address.clone());
    let listener = match tokio::net::TcpListener::bind(&address).await {
        Ok(listener) => listener,
        Err(err) => {
            error!(%err, "Failed to bind {address}");
            return;
        }
    };

    let app = if let Some(database_url) = configuration.database_url() {
        let backend = loop {
            match DatabaseInterface::new(&database_url) {
                Ok(backend) => {
                    info!("Successfully connected to database");
                    break backend;
                }
                Err(err) => {
                    error!(%err, "Failed to establish database connection. Retry in 1 sec. You may want to restart with the database disabled (bookings kept in memory).");
                    sleep(Duration::from_secs(1)).await;
                }
            }
        };
        create_app(
            BookingManager::new(backend, business_days, dispatcher),
            configuration,
        )
    } else {
        warn!("No database configured, bookings are kept in memory only");
        create_app(
            BookingManager::new(LocalBookings::default(), business_days, dispatcher),
            configuration,
        )
    };

    if let Err(err) = axum::serve(listener, app).await {
        error!(%err, "Server stopped");
    }
}

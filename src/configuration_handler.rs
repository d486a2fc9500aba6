use crate::configuration::Configuration;
use chrono::Weekday;
use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(version, about = "Appointment booking service")]
pub struct ConfigurationHandler {
    /// Name shown in logs and notifications
    #[arg(long, env = "BUSINESS_NAME", default_value = "Booking Desk")]
    business_name: String,

    /// Password expected in the `x-admin-password` header of admin requests
    #[arg(long, env = "ADMIN_PASSWORD", hide_env_values = true)]
    admin_password: String,

    #[arg(long, env = "PORT", default_value = "3000")]
    port: String,

    /// PostgreSQL connection URL. Bookings are kept in memory if omitted
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Weekdays without bookings, e.g. `sat,sun`
    #[arg(long, env = "CLOSED_WEEKDAYS", value_delimiter = ',', value_parser = parse_weekday)]
    closed_weekdays: Vec<Weekday>,
}

impl ConfigurationHandler {
    pub fn parse_arguments() -> Self {
        dotenvy::dotenv().ok();
        Self::parse()
    }
}

fn parse_weekday(value: &str) -> Result<Weekday, String> {
    value
        .trim()
        .parse::<Weekday>()
        .map_err(|_| format!("Invalid weekday: {value}"))
}

impl Configuration for ConfigurationHandler {
    fn business_name(&self) -> String {
        self.business_name.clone()
    }

    fn admin_password(&self) -> String {
        self.admin_password.clone()
    }

    fn port(&self) -> String {
        self.port.clone()
    }

    fn database_url(&self) -> Option<String> {
        self.database_url.clone()
    }

    fn closed_weekdays(&self) -> Vec<Weekday> {
        self.closed_weekdays.clone()
    }
}

use chrono::Weekday;

pub trait Configuration: Clone + Send + Sync + 'static {
    fn business_name(&self) -> String;
    fn admin_password(&self) -> String;
    fn port(&self) -> String;
    /// Without a database URL bookings are kept in memory only.
    fn database_url(&self) -> Option<String>;
    fn closed_weekdays(&self) -> Vec<Weekday>;
}

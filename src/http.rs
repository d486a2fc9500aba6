use crate::backend::BookingBackend;
use crate::booking_manager::BookingManager;
use crate::configuration::Configuration;
use crate::error::BookingError;
use crate::types::{
    BookingStatus, NewBlockedDateRange, NewBlockedTime, NewBooking, DEFAULT_TREATMENT,
};
use crate::AppState;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, Request};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use axum::{
    routing::{delete, get, post, put},
    Router,
};
use chrono::{NaiveDate, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, warn};
use uuid::Uuid;
use validator::{Validate, ValidationError};

pub const TREATMENTS: [&str; 3] = [
    DEFAULT_TREATMENT,
    "3 treatments (punch card)",
    "10 treatments (punch card)",
];

lazy_static! {
    static ref NAME_PATTERN: Regex =
        Regex::new(r"^[\p{L}\s-]+$").expect("name pattern is valid");
    static ref PHONE_PATTERN: Regex =
        Regex::new(r"^[\d\s+()-]+$").expect("phone pattern is valid");
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

fn known_treatment(value: &str) -> Result<(), ValidationError> {
    if !TREATMENTS.contains(&value) {
        return Err(ValidationError::new("unknown_treatment"));
    }
    Ok(())
}

fn consent_given(value: &bool) -> Result<(), ValidationError> {
    if !value {
        return Err(ValidationError::new("consent_required"));
    }
    Ok(())
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Reads an optional text field, treating a blank value as absent.
fn blank_as_none<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(trimmed(Option::<String>::deserialize(deserializer)?))
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
struct BookingRequest {
    #[validate(
        length(min = 2, max = 100),
        regex(path = *NAME_PATTERN),
        custom(function = not_blank)
    )]
    name: String,
    #[validate(email, length(max = 255))]
    email: String,
    #[validate(length(min = 8, max = 20), regex(path = *PHONE_PATTERN))]
    phone: String,
    desired_date: Option<NaiveDate>,
    #[validate(length(max = 20))]
    desired_time: Option<String>,
    #[validate(custom(function = known_treatment))]
    treatment: Option<String>,
    #[validate(length(max = 1000))]
    message: Option<String>,
    #[validate(custom(function = consent_given))]
    gdpr_consent: bool,
}

impl From<BookingRequest> for NewBooking {
    fn from(request: BookingRequest) -> Self {
        NewBooking {
            name: request.name.trim().to_string(),
            email: Some(request.email.trim().to_string()),
            phone: request.phone.trim().to_string(),
            desired_date: request.desired_date,
            desired_time: trimmed(request.desired_time),
            treatment: request.treatment.unwrap_or_else(|| DEFAULT_TREATMENT.into()),
            message: trimmed(request.message),
            status: BookingStatus::Pending,
            gdpr_consent: request.gdpr_consent,
            created_by_admin: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
struct AdminBookingRequest {
    #[validate(
        length(min = 2, max = 100),
        regex(path = *NAME_PATTERN),
        custom(function = not_blank)
    )]
    name: String,
    #[serde(default, deserialize_with = "blank_as_none")]
    #[validate(email, length(max = 255))]
    email: Option<String>,
    #[validate(length(min = 8, max = 20), regex(path = *PHONE_PATTERN))]
    phone: String,
    desired_date: NaiveDate,
    #[validate(length(min = 1, max = 20), custom(function = not_blank))]
    desired_time: String,
    #[validate(custom(function = known_treatment))]
    treatment: String,
    #[validate(length(max = 1000))]
    message: Option<String>,
    status: Option<String>,
}

impl AdminBookingRequest {
    fn into_new_booking(self) -> Result<NewBooking, BookingError> {
        let status = match self.status {
            Some(status) => status.parse().map_err(BookingError::Validation)?,
            None => BookingStatus::Confirmed,
        };
        Ok(NewBooking {
            name: self.name.trim().to_string(),
            email: self.email,
            phone: self.phone.trim().to_string(),
            desired_date: Some(self.desired_date),
            desired_time: Some(self.desired_time.trim().to_string()),
            treatment: self.treatment,
            message: trimmed(self.message),
            status,
            gdpr_consent: false,
            created_by_admin: true,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StatusRequest {
    status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct AvailabilityQuery {
    date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
struct BlockDatesRequest {
    start_date: NaiveDate,
    end_date: Option<NaiveDate>,
    #[validate(length(max = 1000))]
    reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
struct BlockTimeRequest {
    date: NaiveDate,
    #[validate(length(min = 1, max = 20), custom(function = not_blank))]
    time: String,
    #[validate(length(max = 1000))]
    reason: Option<String>,
}

/// Unwraps a JSON body, reporting a body that doesn't deserialize like any
/// other invalid field.
fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, BookingError> {
    payload
        .map(|Json(request)| request)
        .map_err(|rejection| BookingError::Validation(rejection.body_text()))
}

fn validate(request: &impl Validate) -> Result<(), BookingError> {
    request
        .validate()
        .map_err(|err| BookingError::Validation(err.to_string()))
}

impl IntoResponse for BookingError {
    fn into_response(self) -> Response {
        let status = match &self {
            BookingError::Rejected(_)
            | BookingError::Validation(_)
            | BookingError::MissingEmail(_) => StatusCode::BAD_REQUEST,
            BookingError::Conflict(_) => StatusCode::CONFLICT,
            BookingError::BookingNotFound(_) | BookingError::BlockNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            BookingError::Notification(_) | BookingError::Backend(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = match &self {
            BookingError::Rejected(rejection) => json!({
                "success": false,
                "error": self.to_string(),
                "reason": rejection,
            }),
            BookingError::Validation(_) => json!({
                "success": false,
                "error": self.to_string(),
                "reason": "VALIDATION_ERROR",
            }),
            BookingError::Notification(_) | BookingError::Backend(_) => {
                error!(err = %self, "Request failed");
                json!({
                    "success": false,
                    "error": "Internal server error. Please try again later",
                })
            }
            _ => json!({
                "success": false,
                "error": self.to_string(),
            }),
        };

        (status, Json(body)).into_response()
    }
}

pub fn create_app<T: BookingBackend, C: Configuration>(
    booking_manager: BookingManager<T>,
    configuration: C,
) -> Router {
    let state = AppState {
        booking_manager,
        configuration,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let public = Router::new()
        .route("/health", get(health))
        .route("/availability", get(get_availability::<T, C>))
        .route("/blocked-dates", get(get_public_blocked_dates::<T, C>))
        .route("/bookings", post(create_booking::<T, C>));

    let admin = Router::new()
        .route(
            "/bookings",
            get(get_bookings::<T, C>).post(create_admin_booking::<T, C>),
        )
        .route("/bookings/:id/status", put(set_booking_status::<T, C>))
        .route("/bookings/:id/send-final", post(send_final_confirmation::<T, C>))
        .route(
            "/blocked-dates",
            get(get_blocked_dates::<T, C>).post(block_dates::<T, C>),
        )
        .route("/blocked-dates/:id", delete(unblock_dates::<T, C>))
        .route(
            "/blocked-times",
            get(get_blocked_times::<T, C>).post(block_time::<T, C>),
        )
        .route("/blocked-times/:id", delete(unblock_time::<T, C>))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            admin_auth::<T, C>,
        ));

    Router::new()
        .merge(public)
        .nest("/admin", admin)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

async fn admin_auth<T: BookingBackend, C: Configuration>(
    State(state): State<AppState<T, C>>,
    request: Request,
    next: Next,
) -> Result<Response, (StatusCode, String)> {
    let Some(auth_header) = request.headers().get("x-admin-password") else {
        return Err((StatusCode::UNAUTHORIZED, "Missing credentials".to_string()));
    };
    if auth_header.to_str().unwrap_or("") != state.configuration.admin_password() {
        warn!(uri = %request.uri(), "Rejected admin request with wrong password");
        return Err((StatusCode::UNAUTHORIZED, "Unauthorized".to_string()));
    }
    Ok(next.run(request).await)
}

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "timestamp": Utc::now(),
    }))
}

async fn get_availability<T: BookingBackend, C: Configuration>(
    State(state): State<AppState<T, C>>,
    query: Result<Query<AvailabilityQuery>, QueryRejection>,
) -> Result<impl IntoResponse, BookingError> {
    let Query(query) = query.map_err(|rejection| BookingError::Validation(rejection.body_text()))?;
    Ok(Json(state.booking_manager.check_availability(query.date)?))
}

async fn get_public_blocked_dates<T: BookingBackend, C: Configuration>(
    State(state): State<AppState<T, C>>,
) -> Result<impl IntoResponse, BookingError> {
    let ranges: Vec<Value> = state
        .booking_manager
        .blocked_date_ranges()?
        .into_iter()
        .map(|range| json!({ "start_date": range.start_date, "end_date": range.end_date }))
        .collect();
    Ok(Json(ranges))
}

async fn create_booking<T: BookingBackend, C: Configuration>(
    State(state): State<AppState<T, C>>,
    payload: Result<Json<BookingRequest>, JsonRejection>,
) -> Result<impl IntoResponse, BookingError> {
    let request = json_body(payload)?;
    validate(&request)?;
    let booking = state.booking_manager.create_booking(request.into())?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Your booking request has been received. We will get back to you shortly",
            "booking_id": booking.id,
        })),
    ))
}

async fn get_bookings<T: BookingBackend, C: Configuration>(
    State(state): State<AppState<T, C>>,
) -> Result<impl IntoResponse, BookingError> {
    Ok(Json(state.booking_manager.bookings()?))
}

async fn create_admin_booking<T: BookingBackend, C: Configuration>(
    State(state): State<AppState<T, C>>,
    payload: Result<Json<AdminBookingRequest>, JsonRejection>,
) -> Result<impl IntoResponse, BookingError> {
    let request = json_body(payload)?;
    validate(&request)?;
    let booking = state
        .booking_manager
        .create_admin_booking(request.into_new_booking()?)?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Booking created",
            "booking": booking,
        })),
    ))
}

async fn set_booking_status<T: BookingBackend, C: Configuration>(
    State(state): State<AppState<T, C>>,
    Path(id): Path<Uuid>,
    payload: Result<Json<StatusRequest>, JsonRejection>,
) -> Result<impl IntoResponse, BookingError> {
    let request = json_body(payload)?;
    let status: BookingStatus = request.status.parse().map_err(BookingError::Validation)?;
    let booking = state.booking_manager.set_booking_status(id, status)?;
    Ok(Json(json!({
        "success": true,
        "message": format!("Booking {status}"),
        "booking": booking,
    })))
}

async fn send_final_confirmation<T: BookingBackend, C: Configuration>(
    State(state): State<AppState<T, C>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, BookingError> {
    state.booking_manager.resend_final_confirmation(id)?;
    Ok(Json(json!({
        "success": true,
        "message": "Final confirmation sent",
    })))
}

async fn get_blocked_dates<T: BookingBackend, C: Configuration>(
    State(state): State<AppState<T, C>>,
) -> Result<impl IntoResponse, BookingError> {
    Ok(Json(state.booking_manager.blocked_date_ranges()?))
}

async fn block_dates<T: BookingBackend, C: Configuration>(
    State(state): State<AppState<T, C>>,
    payload: Result<Json<BlockDatesRequest>, JsonRejection>,
) -> Result<impl IntoResponse, BookingError> {
    let request = json_body(payload)?;
    validate(&request)?;
    let blocked = state.booking_manager.block_dates(NewBlockedDateRange::new(
        request.start_date,
        request.end_date,
        trimmed(request.reason),
    ))?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Period blocked",
            "blocked_date": blocked,
        })),
    ))
}

async fn unblock_dates<T: BookingBackend, C: Configuration>(
    State(state): State<AppState<T, C>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, BookingError> {
    state.booking_manager.unblock_dates(id)?;
    Ok(Json(json!({
        "success": true,
        "message": "Blocked period removed",
    })))
}

async fn get_blocked_times<T: BookingBackend, C: Configuration>(
    State(state): State<AppState<T, C>>,
) -> Result<impl IntoResponse, BookingError> {
    Ok(Json(state.booking_manager.blocked_times()?))
}

async fn block_time<T: BookingBackend, C: Configuration>(
    State(state): State<AppState<T, C>>,
    payload: Result<Json<BlockTimeRequest>, JsonRejection>,
) -> Result<impl IntoResponse, BookingError> {
    let request = json_body(payload)?;
    validate(&request)?;
    let blocked = state.booking_manager.block_time(NewBlockedTime {
        date: request.date,
        time: request.time.trim().to_string(),
        reason: trimmed(request.reason),
    })?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Time slot blocked",
            "blocked_time": blocked,
        })),
    ))
}

async fn unblock_time<T: BookingBackend, C: Configuration>(
    State(state): State<AppState<T, C>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, BookingError> {
    state.booking_manager.unblock_time(id)?;
    Ok(Json(json!({
        "success": true,
        "message": "Blocked time slot removed",
    })))
}

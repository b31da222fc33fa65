//! HTTP surface for drivelog.
//!
//! A small axum application over one shared [`Storage`]. Form submissions
//! answer with a [`Flash`] and a status code; read endpoints answer with JSON.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::{
    extract::{rejection::FormRejection, Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Form, Json, Router,
};
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::config::{Config, DriversConfig};
use crate::drivers::{self, DriverEntry, DriverForm, CREATED_MESSAGE, DELETED_MESSAGE};
use crate::error::{Error, Result};
use crate::intake::{self, Flash, IntakeError, SessionForm};
use crate::options::FormOptions;
use crate::storage::Storage;
use crate::summary::Summary;
use crate::token::TokenCodec;

/// Message returned for unexpected failures. Details only go to the log.
pub const INTERNAL_ERROR_MESSAGE: &str = "Something went wrong. Please try again.";

type Reply = (StatusCode, Json<Flash>);

type Reject<T> = std::result::Result<T, Reply>;

/// Shared state of the HTTP handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    storage: Arc<Mutex<Storage>>,
    codec: Arc<TokenCodec>,
    drivers: Arc<DriversConfig>,
}

impl AppState {
    /// Bundle the store, codec and driver rules for the router.
    #[must_use]
    pub fn new(storage: Storage, codec: TokenCodec, drivers: DriversConfig) -> Self {
        Self {
            storage: Arc::new(Mutex::new(storage)),
            codec: Arc::new(codec),
            drivers: Arc::new(drivers),
        }
    }

    /// Build the state from configuration, opening the configured database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or its token secret
    /// cannot be read.
    pub fn from_config(config: &Config) -> Result<Self> {
        let storage = Storage::open(config.database_path())?;
        let codec = TokenCodec::resolve(config.token.secret.as_deref(), &storage)?;
        Ok(Self::new(storage, codec, config.drivers.clone()))
    }

    /// Run `f` against the store on the blocking pool.
    async fn with_storage<T, F>(&self, f: F) -> Reject<T>
    where
        F: FnOnce(&mut Storage, &TokenCodec) -> T + Send + 'static,
        T: Send + 'static,
    {
        let storage = Arc::clone(&self.storage);
        let codec = Arc::clone(&self.codec);
        tokio::task::spawn_blocking(move || {
            let mut storage = storage
                .lock()
                .map_err(|_| internal(&Error::internal("storage lock poisoned")))?;
            Ok(f(&mut *storage, &*codec))
        })
        .await
        .map_err(|e| internal(&Error::internal(format!("storage task failed: {e}"))))?
    }
}

/// The application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/options", get(options))
        .route("/sessions", post(submit_session))
        .route("/summary", get(summary))
        .route("/drivers", get(list_drivers).post(create_driver))
        .route("/drivers/:token", delete(delete_driver))
        .with_state(state)
}

/// Bind `addr` and serve until the process is stopped.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server fails.
pub async fn serve(state: AppState, addr: SocketAddr) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::server(format!("failed to bind {addr}: {e}")))?;
    run(listener, state).await
}

/// Serve on an already bound listener.
///
/// # Errors
///
/// Returns an error if the server fails.
pub async fn run(listener: tokio::net::TcpListener, state: AppState) -> Result<()> {
    let addr = listener.local_addr()?;
    info!("drivelog listening on http://{}", addr);
    axum::serve(listener, router(state))
        .await
        .map_err(|e| Error::server(e.to_string()))
}

async fn healthz() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn options(State(state): State<AppState>) -> Reject<Json<FormOptions>> {
    state
        .with_storage(|storage, codec| FormOptions::load(storage, codec))
        .await?
        .map(Json)
        .map_err(|e| internal(&e))
}

async fn submit_session(
    State(state): State<AppState>,
    form: std::result::Result<Form<SessionForm>, FormRejection>,
) -> Reply {
    let Form(form) = match form {
        Ok(form) => form,
        Err(rejection) => return malformed(&rejection),
    };
    let result = match state
        .with_storage(move |storage, codec| intake::submit(storage, codec, &form))
        .await
    {
        Ok(result) => result,
        Err(reply) => return reply,
    };
    let status = if result.is_ok() {
        StatusCode::CREATED
    } else {
        StatusCode::UNPROCESSABLE_ENTITY
    };
    (status, Json(Flash::from(&result)))
}

async fn summary(State(state): State<AppState>) -> Reject<Json<Summary>> {
    state
        .with_storage(|storage, _| Summary::load(storage))
        .await?
        .map(Json)
        .map_err(|e| internal(&e))
}

async fn list_drivers(State(state): State<AppState>) -> Reject<Json<Vec<DriverEntry>>> {
    state
        .with_storage(|storage, codec| drivers::list_drivers(storage, codec))
        .await?
        .map(Json)
        .map_err(|e| internal(&e))
}

async fn create_driver(
    State(state): State<AppState>,
    form: std::result::Result<Form<DriverForm>, FormRejection>,
) -> Reply {
    let Form(form) = match form {
        Ok(form) => form,
        Err(rejection) => return malformed(&rejection),
    };

    // Hash outside the storage lock.
    let config = Arc::clone(&state.drivers);
    let prepared = tokio::task::spawn_blocking(move || drivers::prepare_driver(&config, &form))
        .await
        .map_err(|e| internal(&Error::internal(format!("hashing task failed: {e}"))));
    let driver = match prepared {
        Ok(Ok(driver)) => driver,
        Ok(Err(e)) => return (StatusCode::UNPROCESSABLE_ENTITY, Json(Flash::error(e.to_string()))),
        Err(reply) => return reply,
    };

    match state
        .with_storage(move |storage, _| drivers::register_driver(storage, &driver))
        .await
    {
        Ok(Ok(_)) => (StatusCode::CREATED, Json(Flash::success(CREATED_MESSAGE))),
        Ok(Err(e)) => (StatusCode::UNPROCESSABLE_ENTITY, Json(Flash::error(e.to_string()))),
        Err(reply) => reply,
    }
}

async fn delete_driver(State(state): State<AppState>, Path(token): Path<String>) -> Reply {
    match state
        .with_storage(move |storage, codec| drivers::delete_driver(storage, codec, &token))
        .await
    {
        Ok(Ok(_)) => (StatusCode::OK, Json(Flash::success(DELETED_MESSAGE))),
        Ok(Err(e)) => (StatusCode::UNPROCESSABLE_ENTITY, Json(Flash::error(e.to_string()))),
        Err(reply) => reply,
    }
}

/// A body the form extractor could not read. The status is kept, the text is not.
fn malformed(rejection: &FormRejection) -> Reply {
    warn!("Form rejected: {}", rejection.body_text());
    (
        rejection.status(),
        Json(Flash::error(IntakeError::InvalidToken.to_string())),
    )
}

fn internal(err: &Error) -> Reply {
    error!("Request failed: {}", err);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(Flash::error(INTERNAL_ERROR_MESSAGE)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::Category;
    use crate::intake::{FlashLevel, SUCCESS_MESSAGE};

    fn test_state() -> AppState {
        AppState::new(
            Storage::open_in_memory().unwrap(),
            TokenCodec::new("server-test-secret"),
            DriversConfig {
                min_password_length: 6,
                bcrypt_cost: 4,
            },
        )
    }

    async fn spawn_app(state: AppState) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { run(listener, state).await });
        format!("http://{addr}")
    }

    async fn add_driver(client: &reqwest::Client, base: &str, name: &str) -> reqwest::Response {
        client
            .post(format!("{base}/drivers"))
            .form(&[
                ("driver_name", name),
                ("birthday", "1990-04-12"),
                ("password", "secret123"),
                ("confirm_password", "secret123"),
            ])
            .send()
            .await
            .unwrap()
    }

    fn session_form(options: &FormOptions, driver: &str) -> Vec<(&'static str, String)> {
        let token = |category: Category, description: &str| {
            options
                .find(category, description)
                .map(|entry| entry.token.clone())
                .unwrap()
        };
        vec![
            ("date", "2024-05-01".to_string()),
            ("start_time", "09:00".to_string()),
            ("end_time", "10:15".to_string()),
            ("mileage", "23.4".to_string()),
            ("driver_id", token(Category::Driver, driver)),
            ("weather_id", token(Category::Weather, "Rain")),
            ("traffic_id", token(Category::Traffic, "Heavy")),
            ("road_type_id", token(Category::RoadType, "Urban")),
            ("visibility_id", token(Category::Visibility, "Good")),
            ("maneuver_id", token(Category::Maneuver, "Parking")),
        ]
    }

    #[tokio::test]
    async fn test_healthz() {
        let base = spawn_app(test_state()).await;
        let body: Value = reqwest::get(format!("{base}/healthz"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_session_intake_end_to_end() {
        let base = spawn_app(test_state()).await;
        let client = reqwest::Client::new();

        let response = add_driver(&client, &base, "Ada").await;
        assert_eq!(response.status(), reqwest::StatusCode::CREATED);

        let options: FormOptions = client
            .get(format!("{base}/options"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(options.drivers.len(), 1);

        let response = client
            .post(format!("{base}/sessions"))
            .form(&session_form(&options, "Ada"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::CREATED);
        let flash: Flash = response.json().await.unwrap();
        assert_eq!(flash, Flash::success(SUCCESS_MESSAGE));

        let summary: Summary = client
            .get(format!("{base}/summary"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(summary.sessions.len(), 1);
        assert_eq!(summary.sessions[0].id, 101);
        assert_eq!(summary.weather.get("Rain"), Some(&1));
    }

    #[tokio::test]
    async fn test_session_rejections() {
        let base = spawn_app(test_state()).await;
        let client = reqwest::Client::new();
        add_driver(&client, &base, "Ada").await;
        let options: FormOptions = client
            .get(format!("{base}/options"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        let response = client
            .post(format!("{base}/sessions"))
            .form(&[("date", "2024-05-01")])
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::UNPROCESSABLE_ENTITY);
        let flash: Flash = response.json().await.unwrap();
        assert_eq!(flash.level, FlashLevel::Error);
        assert_eq!(flash.message, "All fields are required!");

        let mut form = session_form(&options, "Ada");
        form[5].1 = options.traffic[0].token.clone();
        let response = client
            .post(format!("{base}/sessions"))
            .form(&form)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::UNPROCESSABLE_ENTITY);
        let flash: Flash = response.json().await.unwrap();
        assert_eq!(flash.message, "Invalid form data detected. Please try again.");
    }

    #[tokio::test]
    async fn test_driver_lifecycle() {
        let state = test_state();
        let base = spawn_app(state.clone()).await;
        let client = reqwest::Client::new();

        add_driver(&client, &base, "Ada").await;
        let response = add_driver(&client, &base, "Ada").await;
        assert_eq!(response.status(), reqwest::StatusCode::UNPROCESSABLE_ENTITY);
        let flash: Flash = response.json().await.unwrap();
        assert_eq!(flash.message, "Driver name already exists!");

        let options: FormOptions = client
            .get(format!("{base}/options"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        client
            .post(format!("{base}/sessions"))
            .form(&session_form(&options, "Ada"))
            .send()
            .await
            .unwrap();

        let drivers: Vec<DriverEntry> = client
            .get(format!("{base}/drivers"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(drivers.len(), 1);

        let response = client
            .delete(format!("{base}/drivers/{}", drivers[0].token))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        let flash: Flash = response.json().await.unwrap();
        assert_eq!(flash, Flash::success(DELETED_MESSAGE));

        {
            let storage = state.storage.lock().unwrap();
            assert!(storage.drivers().unwrap().is_empty());
            assert_eq!(storage.session_count().unwrap(), 0);
        }

        let response = client
            .delete(format!("{base}/drivers/{}", drivers[0].token))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::UNPROCESSABLE_ENTITY);
        let flash: Flash = response.json().await.unwrap();
        assert_eq!(flash.message, "Invalid driver selected!");
    }

    #[tokio::test]
    async fn test_malformed_bodies_get_a_flash() {
        let base = spawn_app(test_state()).await;
        let client = reqwest::Client::new();

        let response = client
            .post(format!("{base}/sessions"))
            .json(&json!({ "date": "2024-05-01" }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::UNSUPPORTED_MEDIA_TYPE);
        let flash: Flash = response.json().await.unwrap();
        assert_eq!(flash.level, FlashLevel::Error);
        assert_eq!(flash.message, "Invalid form data detected. Please try again.");

        let response = client
            .post(format!("{base}/drivers"))
            .header("content-type", "text/plain")
            .body("driver_name=Ada")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::UNSUPPORTED_MEDIA_TYPE);
        let flash: Flash = response.json().await.unwrap();
        assert_eq!(flash.level, FlashLevel::Error);
    }

    #[tokio::test]
    async fn test_delete_with_forged_token() {
        let base = spawn_app(test_state()).await;
        let client = reqwest::Client::new();

        let response = client
            .delete(format!("{base}/drivers/1"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::UNPROCESSABLE_ENTITY);
        let flash: Flash = response.json().await.unwrap();
        assert_eq!(flash.message, "Invalid form data detected. Please try again.");
    }
}

//! In-memory doorbells API server.
//!
//! Serves every resource under `/api` with the same conventions as the real
//! service: success bodies are JSON entities or `{"status":200}`, failures
//! are `{"status": n, "msg": text}` with a matching HTTP status, and every
//! call except `/auth` requires a valid `auth_token` query parameter.

use std::{
    collections::HashMap,
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::{net::TcpListener, sync::RwLock};
use tracing::info;
use uuid::Uuid;

/// Credentials every fresh store accepts.
pub const DEFAULT_EMAIL: &str = "daniel@example.com";
pub const DEFAULT_PASSWORD: &str = "password";

/// User record embedded in messages and tags.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: i64,
    pub email: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub sender: UserRecord,
    pub contents: String,
    pub timestamp: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Tag {
    pub id: String,
    pub location: String,
    pub user: UserRecord,
}

struct Account {
    user: UserRecord,
    password: String,
}

struct Delivery {
    recipient: i64,
    message: Message,
}

/// Server-side state.
#[derive(Default)]
pub struct Store {
    accounts: Vec<Account>,
    tokens: HashMap<String, i64>,
    devices: HashMap<String, i64>,
    deliveries: Vec<Delivery>,
    tags: HashMap<String, Tag>,
    next_message_id: i64,
}

impl Store {
    /// A store holding only the default account.
    pub fn seeded() -> Self {
        let mut store = Self::default();
        store.add_user(DEFAULT_EMAIL, DEFAULT_PASSWORD);
        store
    }

    /// Register an account and return its user id.
    pub fn add_user(&mut self, email: &str, password: &str) -> i64 {
        let id = self.accounts.len() as i64 + 1;
        self.accounts.push(Account {
            user: UserRecord {
                id,
                email: email.to_string(),
            },
            password: password.to_string(),
        });
        id
    }

    fn user(&self, id: i64) -> Option<&UserRecord> {
        self.accounts.iter().map(|a| &a.user).find(|u| u.id == id)
    }
}

pub type Db = Arc<RwLock<Store>>;

pub fn app() -> Router {
    app_with(Store::seeded())
}

pub fn app_with(store: Store) -> Router {
    let db: Db = Arc::new(RwLock::new(store));
    let api = Router::new()
        .route("/auth", post(authorize))
        .route("/auth/destroy", post(invalidate))
        .route("/register", post(register_device))
        .route("/unregister", post(unregister_device))
        .route("/messages", get(list_messages))
        .route("/messages/delete", post(delete_message))
        .route("/messages/{id}", get(get_message))
        .route("/send", post(send_message))
        .route("/tags", get(list_tags))
        .route("/tags/create", post(create_tag))
        .route("/tags/update", post(update_tag))
        .route("/tags/delete", post(delete_tag))
        .route("/tags/{id}", get(get_tag))
        .with_state(db);
    Router::new().nest("/api", api)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

type Params = HashMap<String, String>;

/// A failure rendered as `{"status", "msg"}` with the same HTTP status.
#[derive(Debug)]
pub struct Failure(StatusCode, String);

impl Failure {
    fn bad_request(msg: impl Into<String>) -> Self {
        Self(StatusCode::BAD_REQUEST, msg.into())
    }

    fn unauthorized(msg: impl Into<String>) -> Self {
        Self(StatusCode::UNAUTHORIZED, msg.into())
    }

    fn not_found(msg: impl Into<String>) -> Self {
        Self(StatusCode::NOT_FOUND, msg.into())
    }
}

impl IntoResponse for Failure {
    fn into_response(self) -> Response {
        let body = json!({ "status": self.0.as_u16(), "msg": self.1 });
        (self.0, Json(body)).into_response()
    }
}

type Reply = Result<Response, Failure>;

fn ok_status() -> Response {
    Json(json!({ "status": 200 })).into_response()
}

fn required<'a>(params: &'a Params, name: &str) -> Result<&'a str, Failure> {
    params
        .get(name)
        .map(String::as_str)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| Failure::bad_request(format!("missing parameter: {name}")))
}

fn authenticate(store: &Store, query: &Params) -> Result<i64, Failure> {
    let token = query
        .get("auth_token")
        .ok_or_else(|| Failure::unauthorized("missing auth token"))?;
    store
        .tokens
        .get(token)
        .copied()
        .ok_or_else(|| Failure::unauthorized("invalid auth token"))
}

fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

async fn authorize(State(db): State<Db>, Form(form): Form<Params>) -> Reply {
    let email = required(&form, "email")?;
    let password = required(&form, "password")?;
    let mut store = db.write().await;
    let user_id = store
        .accounts
        .iter()
        .find(|a| a.user.email == email && a.password == password)
        .map(|a| a.user.id)
        .ok_or_else(|| Failure::unauthorized("invalid email or password"))?;
    let token = Uuid::new_v4().simple().to_string();
    store.tokens.insert(token.clone(), user_id);
    info!(user_id, "issued auth token");
    Ok(Json(json!({ "token": token })).into_response())
}

async fn invalidate(State(db): State<Db>, Query(query): Query<Params>) -> Reply {
    let mut store = db.write().await;
    let user_id = authenticate(&store, &query)?;
    store.tokens.remove(required(&query, "auth_token")?);
    info!(user_id, "revoked auth token");
    Ok(ok_status())
}

async fn register_device(State(db): State<Db>, Query(query): Query<Params>) -> Reply {
    let mut store = db.write().await;
    let user_id = authenticate(&store, &query)?;
    let id = required(&query, "id")?.to_string();
    info!(device_id = %id, user_id, "registered device");
    store.devices.insert(id, user_id);
    Ok(ok_status())
}

async fn unregister_device(State(db): State<Db>, Query(query): Query<Params>) -> Reply {
    let mut store = db.write().await;
    let user_id = authenticate(&store, &query)?;
    let id = required(&query, "id")?;
    if store.devices.get(id) != Some(&user_id) {
        return Err(Failure::not_found("device not found"));
    }
    store.devices.remove(id);
    info!(device_id = %id, user_id, "unregistered device");
    Ok(ok_status())
}

async fn list_messages(State(db): State<Db>, Query(query): Query<Params>) -> Reply {
    let store = db.read().await;
    let user_id = authenticate(&store, &query)?;
    let messages: Vec<&Message> = store
        .deliveries
        .iter()
        .filter(|d| d.recipient == user_id)
        .map(|d| &d.message)
        .collect();
    Ok(Json(json!({ "status": 200, "messages": messages })).into_response())
}

async fn get_message(
    State(db): State<Db>,
    Path(id): Path<i64>,
    Query(query): Query<Params>,
) -> Reply {
    let store = db.read().await;
    let user_id = authenticate(&store, &query)?;
    store
        .deliveries
        .iter()
        .find(|d| d.recipient == user_id && d.message.id == id)
        .map(|d| Json(d.message.clone()).into_response())
        .ok_or_else(|| Failure::not_found("message not found"))
}

async fn delete_message(State(db): State<Db>, Query(query): Query<Params>) -> Reply {
    let mut store = db.write().await;
    let user_id = authenticate(&store, &query)?;
    let id: i64 = required(&query, "id")?
        .parse()
        .map_err(|_| Failure::bad_request("id must be an integer"))?;
    let before = store.deliveries.len();
    store
        .deliveries
        .retain(|d| !(d.recipient == user_id && d.message.id == id));
    if store.deliveries.len() == before {
        return Err(Failure::not_found("message not found"));
    }
    info!(message_id = id, user_id, "deleted message");
    Ok(ok_status())
}

async fn send_message(
    State(db): State<Db>,
    Query(query): Query<Params>,
    Form(form): Form<Params>,
) -> Reply {
    let mut store = db.write().await;
    let user_id = authenticate(&store, &query)?;
    let tag_id = required(&query, "tag")?;
    let contents = required(&form, "contents")?.to_string();
    let recipient = store
        .tags
        .get(tag_id)
        .map(|t| t.user.id)
        .ok_or_else(|| Failure::not_found("tag not found"))?;
    let sender = store
        .user(user_id)
        .cloned()
        .ok_or_else(|| Failure::unauthorized("unknown user"))?;
    store.next_message_id += 1;
    let message = Message {
        id: store.next_message_id,
        sender,
        contents,
        timestamp: now(),
    };
    info!(message_id = message.id, recipient, "delivered message");
    store.deliveries.push(Delivery { recipient, message });
    Ok(ok_status())
}

async fn list_tags(State(db): State<Db>, Query(query): Query<Params>) -> Reply {
    let store = db.read().await;
    let user_id = authenticate(&store, &query)?;
    let mut tags: Vec<&Tag> = store.tags.values().filter(|t| t.user.id == user_id).collect();
    tags.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(Json(json!({ "status": 200, "tags": tags })).into_response())
}

async fn get_tag(
    State(db): State<Db>,
    Path(id): Path<String>,
    Query(query): Query<Params>,
) -> Reply {
    let store = db.read().await;
    authenticate(&store, &query)?;
    store
        .tags
        .get(&id)
        .map(|t| Json(t.clone()).into_response())
        .ok_or_else(|| Failure::not_found("tag not found"))
}

async fn create_tag(
    State(db): State<Db>,
    Query(query): Query<Params>,
    Form(form): Form<Params>,
) -> Reply {
    let mut store = db.write().await;
    let user_id = authenticate(&store, &query)?;
    let location = required(&form, "location")?.to_string();
    let user = store
        .user(user_id)
        .cloned()
        .ok_or_else(|| Failure::unauthorized("unknown user"))?;
    let tag = Tag {
        id: Uuid::new_v4().to_string(),
        location,
        user,
    };
    info!(tag_id = %tag.id, user_id, "created tag");
    store.tags.insert(tag.id.clone(), tag.clone());
    Ok(Json(tag).into_response())
}

async fn update_tag(
    State(db): State<Db>,
    Query(query): Query<Params>,
    Form(form): Form<Params>,
) -> Reply {
    let mut store = db.write().await;
    let user_id = authenticate(&store, &query)?;
    let id = required(&query, "id")?;
    let location = required(&form, "location")?.to_string();
    match store.tags.get_mut(id) {
        Some(tag) if tag.user.id == user_id => {
            tag.location = location;
            info!(tag_id = %id, user_id, "updated tag");
            Ok(ok_status())
        }
        _ => Err(Failure::not_found("tag not found")),
    }
}

async fn delete_tag(State(db): State<Db>, Query(query): Query<Params>) -> Reply {
    let mut store = db.write().await;
    let user_id = authenticate(&store, &query)?;
    let id = required(&query, "id")?;
    if store.tags.get(id).map(|t| t.user.id) != Some(user_id) {
        return Err(Failure::not_found("tag not found"));
    }
    store.tags.remove(id);
    info!(tag_id = %id, "deleted tag");
    Ok(ok_status())
}

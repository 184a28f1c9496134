//! Blocking client core for the doorbells API.
//!
//! # Overview
//! Wraps the doorbells HTTP/JSON protocol (auth, push registration, messages
//! and location tags) behind a typed `Session`. Every call is synchronous:
//! one request, one connection, no retries, no background work.
//!
//! # Design
//! - `params` and `endpoint` build form-encoded parameter strings and request
//!   targets.
//! - `dispatch` produces `HttpRequest` values as plain data and runs them
//!   through a `Transport`; `UreqTransport` is the default blocking one.
//! - `response` wraps status + raw body and decodes shapes on demand.
//! - `session` composes the above into domain operations and classifies
//!   failures into `ApiError`.

pub mod config;
pub mod dispatch;
pub mod endpoint;
pub mod error;
pub mod http;
pub mod params;
pub mod response;
pub mod session;
pub mod types;

pub use config::ClientConfig;
pub use dispatch::Dispatcher;
pub use endpoint::{concat_query, Endpoints};
pub use error::{ApiError, ApiResult, ErrorKind};
pub use http::{HttpMethod, HttpRequest, HttpResponse, Transport, UreqTransport};
pub use params::Params;
pub use response::{JsonResponse, StatusEnvelope};
pub use session::Session;
pub use types::{Message, Tag, UserRef};

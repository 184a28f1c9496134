//! Authenticated session and the doorbells domain operations.
//!
//! # Design
//! A `Session` holds one non-empty auth token, fixed at construction. Each
//! operation sends a single request, inspects the HTTP status, and either
//! decodes the expected payload, returns a domain outcome for the 404 cases
//! the protocol treats as normal (`false` / `None`), or hands the body to the
//! default error handler, which classifies by the status embedded in the
//! body. Nothing is retried.

use tracing::warn;

use crate::config::ClientConfig;
use crate::dispatch::Dispatcher;
use crate::error::ApiError;
use crate::http::{Transport, UreqTransport};
use crate::params::{encode_value, Params};
use crate::response::{AuthData, JsonResponse, MessageList, TagList};
use crate::types::{Message, Tag};

const OK: u16 = 200;
const NOT_FOUND: u16 = 404;

/// Client bound to one auth token.
///
/// Invalidating the token on the server does not consume the session; callers
/// should drop it once `invalidate` succeeds.
#[derive(Debug, Clone)]
pub struct Session<T = UreqTransport> {
    dispatcher: Dispatcher<T>,
    token: String,
}

impl Session<UreqTransport> {
    /// Log in against the API at `config.base_url` over the default transport.
    pub fn login(config: &ClientConfig, email: &str, password: &str) -> Result<Self, ApiError> {
        Self::authorize(Dispatcher::new(config)?, email, password)
    }

    /// Resume a session from a previously issued token over the default
    /// transport.
    pub fn resume(config: &ClientConfig, token: impl Into<String>) -> Result<Self, ApiError> {
        Self::initialize(Dispatcher::new(config)?, token)
    }
}

impl<T: Transport> Session<T> {
    /// Exchange credentials for a token.
    ///
    /// On a non-200 response the embedded status decides the failure: 400 and
    /// 401 are authorization failures, anything else is a generic API failure.
    pub fn authorize(dispatcher: Dispatcher<T>, email: &str, password: &str) -> Result<Self, ApiError> {
        let body = Params::start_with("email", email)
            .add_param("password", password)
            .finish();
        let response = dispatcher.post("/auth", None, Some(body))?;

        if response.status() == OK {
            let auth: AuthData = response.decode()?;
            return Self::initialize(dispatcher, auth.token);
        }

        let envelope = response.status_envelope()?;
        warn!(status = envelope.status, "authorization rejected");
        Err(match envelope.status {
            400 | 401 => ApiError::Unauthorized {
                message: envelope.message,
            },
            status => ApiError::Api {
                status: Some(status),
                message: envelope.message,
            },
        })
    }

    /// Wrap an existing token without contacting the server. A stale token is
    /// only discovered on the first authenticated call.
    pub fn initialize(dispatcher: Dispatcher<T>, token: impl Into<String>) -> Result<Self, ApiError> {
        let token = token.into();
        if token.is_empty() {
            return Err(ApiError::Unauthorized {
                message: Some("empty auth token".to_string()),
            });
        }
        Ok(Self { dispatcher, token })
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Ask the server to revoke the token. `true` iff the server answered 200.
    pub fn invalidate(&self) -> Result<bool, ApiError> {
        let response = self.post("/auth/destroy", None, None)?;
        Ok(response.status() == OK)
    }

    /// Register a push-notification device id for this user.
    pub fn register_device(&self, id: &str) -> Result<(), ApiError> {
        let response = self.post("/register", Some(Params::start_with("id", id)), None)?;
        match response.status() {
            OK => Ok(()),
            _ => default_error(&response),
        }
    }

    /// `false` when the server does not know the device.
    pub fn unregister_device(&self, id: &str) -> Result<bool, ApiError> {
        let response = self.post("/unregister", Some(Params::start_with("id", id)), None)?;
        found_flag(&response)
    }

    pub fn get_message(&self, id: i64) -> Result<Option<Message>, ApiError> {
        let response = self.get(&format!("/messages/{id}"))?;
        match response.status() {
            OK => response.decode().map(Some),
            NOT_FOUND => Ok(None),
            _ => default_error(&response),
        }
    }

    pub fn get_messages(&self) -> Result<Vec<Message>, ApiError> {
        let response = self.get("/messages")?;
        match response.status() {
            OK => Ok(response.decode::<MessageList>()?.messages),
            _ => default_error(&response),
        }
    }

    /// Send `contents` to the owner of tag `tag_id`. `false` when the tag does
    /// not exist.
    pub fn send_message(&self, tag_id: &str, contents: &str) -> Result<bool, ApiError> {
        let body = Params::start_with("contents", contents).finish();
        let response = self.post("/send", Some(Params::start_with("tag", tag_id)), Some(body))?;
        found_flag(&response)
    }

    pub fn delete_message(&self, id: i64) -> Result<bool, ApiError> {
        let response = self.post("/messages/delete", Some(Params::start_with("id", id)), None)?;
        found_flag(&response)
    }

    pub fn get_tag(&self, id: &str) -> Result<Option<Tag>, ApiError> {
        let response = self.get(&tag_resource(id))?;
        match response.status() {
            OK => response.decode().map(Some),
            NOT_FOUND => Ok(None),
            _ => default_error(&response),
        }
    }

    /// Look up a tag that is expected to exist.
    ///
    /// Fails with `ApiError::NotFound` when the server answers 404 and its
    /// status body also says 404.
    pub fn find_tag(&self, id: &str) -> Result<Tag, ApiError> {
        let response = self.get(&tag_resource(id))?;
        match response.status() {
            OK => response.decode(),
            NOT_FOUND => {
                let envelope = response.status_envelope()?;
                if envelope.status == i64::from(NOT_FOUND) {
                    Err(ApiError::NotFound {
                        message: envelope.message,
                    })
                } else {
                    Err(envelope.into_error())
                }
            }
            _ => default_error(&response),
        }
    }

    pub fn get_tags(&self) -> Result<Vec<Tag>, ApiError> {
        let response = self.get("/tags")?;
        match response.status() {
            OK => Ok(response.decode::<TagList>()?.tags),
            _ => default_error(&response),
        }
    }

    pub fn create_tag(&self, location: &str) -> Result<Tag, ApiError> {
        let body = Params::start_with("location", location).finish();
        let response = self.post("/tags/create", None, Some(body))?;
        match response.status() {
            OK => response.decode(),
            _ => default_error(&response),
        }
    }

    pub fn update_tag(&self, id: &str, location: &str) -> Result<bool, ApiError> {
        let body = Params::start_with("location", location).finish();
        let response = self.post("/tags/update", Some(Params::start_with("id", id)), Some(body))?;
        found_flag(&response)
    }

    pub fn destroy_tag(&self, id: &str) -> Result<bool, ApiError> {
        let response = self.post("/tags/delete", Some(Params::start_with("id", id)), None)?;
        found_flag(&response)
    }

    fn get(&self, resource: &str) -> Result<JsonResponse, ApiError> {
        self.dispatcher.get_authed(resource, &self.token, None)
    }

    fn post(
        &self,
        resource: &str,
        query: Option<Params>,
        body: Option<String>,
    ) -> Result<JsonResponse, ApiError> {
        self.dispatcher.post_authed(resource, &self.token, query, body)
    }
}

fn tag_resource(id: &str) -> String {
    format!("/tags/{}", encode_value(id))
}

/// 200 → `true`, 404 → `false`, anything else → default error handler.
fn found_flag(response: &JsonResponse) -> Result<bool, ApiError> {
    match response.status() {
        OK => Ok(true),
        NOT_FOUND => Ok(false),
        _ => default_error(response),
    }
}

/// Classify a failed response by the `status` embedded in its body.
fn default_error<V>(response: &JsonResponse) -> Result<V, ApiError> {
    let envelope = response.status_envelope()?;
    warn!(
        http_status = response.status(),
        api_status = envelope.status,
        "request failed"
    );
    Err(envelope.into_error())
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;
    use crate::endpoint::Endpoints;
    use crate::error::ErrorKind;
    use crate::http::{HttpMethod, HttpRequest, HttpResponse};

    /// Replays canned responses in order and records every request.
    #[derive(Debug, Default)]
    struct Script {
        replies: Mutex<VecDeque<(u16, String)>>,
        requests: Mutex<Vec<HttpRequest>>,
    }

    impl Script {
        fn reply(status: u16, body: &str) -> Self {
            let script = Self::default();
            script
                .replies
                .lock()
                .unwrap()
                .push_back((status, body.to_string()));
            script
        }

        fn last_request(&self) -> HttpRequest {
            self.requests.lock().unwrap().last().cloned().unwrap()
        }
    }

    impl Transport for Script {
        fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError> {
            self.requests.lock().unwrap().push(request.clone());
            let (status, body) = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .expect("no scripted reply left");
            Ok(HttpResponse { status, body })
        }
    }

    fn dispatcher(script: &Script) -> Dispatcher<&Script> {
        Dispatcher::with_transport(Endpoints::new("http://localhost:3000/api").unwrap(), script)
    }

    fn session(script: &Script) -> Session<&Script> {
        Session::initialize(dispatcher(script), "abc").unwrap()
    }

    fn query(request: &HttpRequest) -> &str {
        request.url.split_once('?').map(|(_, q)| q).unwrap_or("")
    }

    #[test]
    fn authorize_success_yields_token() {
        let script = Script::reply(200, r#"{"token":"abc"}"#);
        let session = Session::authorize(dispatcher(&script), "good@x.com", "pw").unwrap();
        assert_eq!(session.token(), "abc");

        let req = script.last_request();
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.url, "http://localhost:3000/api/auth");
        assert_eq!(req.body.as_deref(), Some("email=good%40x.com&password=pw"));
    }

    #[test]
    fn authorize_401_is_unauthorized_with_message() {
        let script = Script::reply(401, r#"{"status":401,"msg":"bad creds"}"#);
        let err = Session::authorize(dispatcher(&script), "bad@x.com", "pw").unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized { .. }));
        assert_eq!(err.message(), Some("bad creds"));
    }

    #[test]
    fn authorize_embedded_400_is_unauthorized() {
        let script = Script::reply(400, r#"{"status":400,"msg":"missing email"}"#);
        let err = Session::authorize(dispatcher(&script), "", "pw").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
    }

    #[test]
    fn authorize_classifies_by_embedded_status_not_http_status() {
        let script = Script::reply(503, r#"{"status":401,"msg":"expired"}"#);
        let err = Session::authorize(dispatcher(&script), "a@x.com", "pw").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
    }

    #[test]
    fn authorize_other_status_is_generic() {
        let script = Script::reply(500, r#"{"status":500,"msg":"boom"}"#);
        let err = Session::authorize(dispatcher(&script), "a@x.com", "pw").unwrap_err();
        assert!(matches!(err, ApiError::Api { status: Some(500), .. }));
        assert_eq!(err.message(), Some("boom"));
    }

    #[test]
    fn authorize_empty_token_is_rejected() {
        let script = Script::reply(200, r#"{"token":""}"#);
        let err = Session::authorize(dispatcher(&script), "a@x.com", "pw").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
    }

    #[test]
    fn initialize_does_not_touch_network() {
        let script = Script::default();
        let session = Session::initialize(dispatcher(&script), "tok").unwrap();
        assert_eq!(session.token(), "tok");
        assert!(script.requests.lock().unwrap().is_empty());
    }

    #[test]
    fn initialize_rejects_empty_token() {
        let script = Script::default();
        assert!(Session::initialize(dispatcher(&script), "").is_err());
    }

    #[test]
    fn invalidate_true_only_on_200() {
        let script = Script::reply(200, "{}");
        assert!(session(&script).invalidate().unwrap());
        let req = script.last_request();
        assert_eq!(req.url, "http://localhost:3000/api/auth/destroy?auth_token=abc");

        let script = Script::reply(401, r#"{"status":401,"msg":"nope"}"#);
        assert!(!session(&script).invalidate().unwrap());
    }

    #[test]
    fn register_device_sends_id_and_token() {
        let script = Script::reply(200, r#"{"status":200}"#);
        session(&script).register_device("reg-1").unwrap();
        let req = script.last_request();
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(query(&req), "id=reg-1&auth_token=abc");
    }

    #[test]
    fn register_device_failure_uses_default_handler() {
        let script = Script::reply(400, r#"{"status":400,"msg":"missing id"}"#);
        let err = session(&script).register_device("").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadRequest);
    }

    #[test]
    fn unregister_device_404_is_false() {
        let script = Script::reply(404, r#"{"status":404,"msg":"device not found"}"#);
        assert!(!session(&script).unregister_device("reg-1").unwrap());
    }

    #[test]
    fn get_message_decodes_entity() {
        let script = Script::reply(200, r#"{"id":3,"contents":"hi","timestamp":1000}"#);
        let message = session(&script).get_message(3).unwrap().unwrap();
        assert_eq!(message.contents, "hi");
        assert_eq!(message.date_received_millis(), 1_000_000);

        let req = script.last_request();
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(req.url, "http://localhost:3000/api/messages/3?auth_token=abc");
    }

    #[test]
    fn get_message_404_is_absent() {
        let script = Script::reply(404, "");
        assert!(session(&script).get_message(99).unwrap().is_none());
    }

    #[test]
    fn get_messages_unwraps_list() {
        let script = Script::reply(
            200,
            r#"{"status":200,"messages":[{"id":1,"contents":"a","timestamp":1},{"id":2,"contents":"b","timestamp":2}]}"#,
        );
        let messages = session(&script).get_messages().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].id, 2);
    }

    #[test]
    fn get_messages_404_is_an_error() {
        let script = Script::reply(404, r#"{"status":404,"msg":"no inbox"}"#);
        let err = session(&script).get_messages().unwrap_err();
        assert!(matches!(err, ApiError::Api { status: Some(404), .. }));
    }

    #[test]
    fn send_message_puts_tag_in_query_and_contents_in_body() {
        let script = Script::reply(200, r#"{"status":200}"#);
        assert!(session(&script).send_message("tag1", "hello world").unwrap());
        let req = script.last_request();
        assert_eq!(req.url, "http://localhost:3000/api/send?tag=tag1&auth_token=abc");
        assert_eq!(req.body.as_deref(), Some("contents=hello%20world"));
    }

    #[test]
    fn send_message_unknown_tag_is_false() {
        let script = Script::reply(404, r#"{"status":404,"msg":"no such tag"}"#);
        assert!(!session(&script).send_message("nope", "x").unwrap());
    }

    #[test]
    fn delete_message_has_no_body() {
        let script = Script::reply(200, "{}");
        assert!(session(&script).delete_message(7).unwrap());
        let req = script.last_request();
        assert_eq!(query(&req), "id=7&auth_token=abc");
        assert_eq!(req.body.as_deref(), Some(""));
    }

    #[test]
    fn get_tag_encodes_id_in_path() {
        let script = Script::reply(200, r#"{"id":"a b","location":"x","user":null}"#);
        let tag = session(&script).get_tag("a b").unwrap().unwrap();
        assert_eq!(tag.id, "a b");
        assert_eq!(
            script.last_request().url,
            "http://localhost:3000/api/tags/a%20b?auth_token=abc"
        );
    }

    #[test]
    fn get_tag_404_is_absent() {
        let script = Script::reply(404, r#"{"status":404,"msg":"no such tag"}"#);
        assert!(session(&script).get_tag("t1").unwrap().is_none());
    }

    #[test]
    fn find_tag_404_with_404_body_is_not_found() {
        let script = Script::reply(404, r#"{"status":404,"msg":"no such tag"}"#);
        let err = session(&script).find_tag("t1").unwrap_err();
        assert!(matches!(err, ApiError::NotFound { .. }));
        assert_eq!(err.message(), Some("no such tag"));
    }

    #[test]
    fn find_tag_404_with_other_body_is_classified() {
        let script = Script::reply(404, r#"{"status":401,"msg":"bad token"}"#);
        let err = session(&script).find_tag("t1").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
    }

    #[test]
    fn get_tags_unwraps_list() {
        let script = Script::reply(200, r#"{"status":200,"tags":[{"id":"t1","location":"door"}]}"#);
        let tags = session(&script).get_tags().unwrap();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].location, "door");
    }

    #[test]
    fn create_tag_sends_location_body() {
        let script = Script::reply(200, r#"{"id":"t9","location":"back door","user":{"id":1}}"#);
        let tag = session(&script).create_tag("back door").unwrap();
        assert_eq!(tag.id, "t9");
        let req = script.last_request();
        assert_eq!(req.url, "http://localhost:3000/api/tags/create?auth_token=abc");
        assert_eq!(req.body.as_deref(), Some("location=back%20door"));
    }

    #[test]
    fn update_tag_sends_id_query_and_location_body() {
        let script = Script::reply(404, r#"{"status":404,"msg":"no such tag"}"#);
        assert!(!session(&script).update_tag("t1", "garage").unwrap());
        let req = script.last_request();
        assert_eq!(query(&req), "id=t1&auth_token=abc");
        assert_eq!(req.body.as_deref(), Some("location=garage"));
    }

    #[test]
    fn destroy_tag_200_is_true() {
        let script = Script::reply(200, "{}");
        assert!(session(&script).destroy_tag("t1").unwrap());
        assert_eq!(query(&script.last_request()), "id=t1&auth_token=abc");
    }

    #[test]
    fn internal_server_error_is_classified_for_every_operation() {
        let boom = r#"{"status":500,"msg":"boom"}"#;
        let check = |err: ApiError| {
            assert!(matches!(err, ApiError::InternalServer { .. }));
            assert_eq!(err.message(), Some("boom"));
        };

        let script = Script::reply(500, boom);
        check(session(&script).get_message(1).unwrap_err());
        let script = Script::reply(500, boom);
        check(session(&script).get_messages().unwrap_err());
        let script = Script::reply(500, boom);
        check(session(&script).send_message("t", "x").unwrap_err());
        let script = Script::reply(500, boom);
        check(session(&script).get_tags().unwrap_err());
        let script = Script::reply(500, boom);
        check(session(&script).create_tag("x").unwrap_err());
        let script = Script::reply(500, boom);
        check(session(&script).destroy_tag("t").unwrap_err());
    }

    #[test]
    fn undecodable_failure_body_is_a_decode_error() {
        let script = Script::reply(502, "<html>bad gateway</html>");
        let err = session(&script).get_tags().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
    }

    #[test]
    fn unknown_embedded_status_is_generic() {
        let script = Script::reply(418, r#"{"status":418,"msg":"teapot"}"#);
        let err = session(&script).create_tag("x").unwrap_err();
        assert!(matches!(err, ApiError::Api { status: Some(418), .. }));
    }

    #[test]
    fn session_is_shareable_across_threads() {
        fn assert_send_sync<S: Send + Sync>() {}
        assert_send_sync::<Session>();
    }
}

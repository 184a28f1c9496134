//! C-ABI wrapper around `doorbells-core`.
//!
//! # Overview
//! Exposes the Session operations through `extern "C"` functions so the
//! mobile front end can call the client through its platform's C bridge.
//! Every call blocks the calling thread for one HTTP round-trip.
//!
//! # Design
//! - Every `extern "C"` function wraps its body in `catch_unwind` so panics
//!   never cross the FFI boundary.
//! - `doorbells_authorize` / `doorbells_initialize` hand out an opaque
//!   `FfiSession` through an out-pointer; all other operations take it back.
//! - A single `FfiResult` envelope with `FfiDataTag` + `void* data` conveys
//!   payloads and errors uniformly; boolean outcomes travel in `flag`.
//! - String arguments must be UTF-8. Anything else is reported as
//!   `FfiErrorCode::Encoding` rather than replaced.
//! - The C caller owns all returned pointers and must call the matching
//!   `doorbells_free_*` function to release them.

pub mod types;

use std::ffi::CStr;
use std::os::raw::c_char;
use std::panic::{catch_unwind, UnwindSafe};

use doorbells_core::params::utf8_value;
use doorbells_core::{ClientConfig, Session};
use tracing::error;

use types::*;

type Outcome = Result<*mut FfiResult, *mut FfiResult>;

/// Run `body` with panics converted into an `FfiErrorCode::Panic` result.
fn guarded(op: &str, body: impl FnOnce() -> Outcome + UnwindSafe) -> *mut FfiResult {
    match catch_unwind(body) {
        Ok(Ok(result)) | Ok(Err(result)) => result,
        Err(_) => {
            error!(op, "panic caught at FFI boundary");
            FfiResult::panic(&format!("panic in {op}"))
        }
    }
}

/// Borrow a C string argument as UTF-8 text.
fn read_str<'a>(ptr: *const c_char, field: &'static str) -> Result<&'a str, *mut FfiResult> {
    if ptr.is_null() {
        return Err(FfiResult::null_arg(field));
    }
    let bytes = unsafe { CStr::from_ptr(ptr) }.to_bytes();
    utf8_value(field, bytes).map_err(FfiResult::from_error)
}

/// `base_url` if given, otherwise `DOORBELLS_API_URL` or the built-in default.
fn config_from(base_url: *const c_char) -> Result<ClientConfig, *mut FfiResult> {
    if base_url.is_null() {
        return Ok(ClientConfig::from_env());
    }
    Ok(ClientConfig::new(read_str(base_url, "base_url")?))
}

fn session_ref<'a>(session: *const FfiSession) -> Result<&'a FfiSession, *mut FfiResult> {
    if session.is_null() {
        return Err(FfiResult::null_arg("session"));
    }
    Ok(unsafe { &*session })
}

/// Store `session` in `*out` and report success.
fn hand_out(session: Session, out: *mut *mut FfiSession) -> Outcome {
    let handle = Box::into_raw(Box::new(FfiSession { inner: session }));
    unsafe { *out = handle };
    Ok(FfiResult::ok_empty())
}

// ---------------------------------------------------------------------------
// Session lifecycle
// ---------------------------------------------------------------------------

/// Log in with `email` / `password` against the API at `base_url`. A null
/// `base_url` selects the configured default.
///
/// On success `*out_session` receives a handle the caller must free with
/// `doorbells_session_free`; on failure it is left untouched.
#[unsafe(no_mangle)]
pub extern "C" fn doorbells_authorize(
    base_url: *const c_char,
    email: *const c_char,
    password: *const c_char,
    out_session: *mut *mut FfiSession,
) -> *mut FfiResult {
    guarded("doorbells_authorize", || {
        if out_session.is_null() {
            return Err(FfiResult::null_arg("out_session"));
        }
        let config = config_from(base_url)?;
        let email = read_str(email, "email")?;
        let password = read_str(password, "password")?;
        let session = Session::login(&config, email, password).map_err(FfiResult::from_error)?;
        hand_out(session, out_session)
    })
}

/// Wrap a previously issued `token` without contacting the server. A null
/// `base_url` selects the configured default.
#[unsafe(no_mangle)]
pub extern "C" fn doorbells_initialize(
    base_url: *const c_char,
    token: *const c_char,
    out_session: *mut *mut FfiSession,
) -> *mut FfiResult {
    guarded("doorbells_initialize", || {
        if out_session.is_null() {
            return Err(FfiResult::null_arg("out_session"));
        }
        let config = config_from(base_url)?;
        let token = read_str(token, "token")?;
        let session = Session::resume(&config, token).map_err(FfiResult::from_error)?;
        hand_out(session, out_session)
    })
}

/// Copy of the session's auth token, for persisting between launches.
/// Returns null if `session` is null. Free with `doorbells_free_string`.
#[unsafe(no_mangle)]
pub extern "C" fn doorbells_session_token(session: *const FfiSession) -> *mut c_char {
    catch_unwind(|| match session_ref(session) {
        Ok(session) => c_string(session.inner.token().to_string()),
        Err(result) => {
            doorbells_free_result(result);
            std::ptr::null_mut()
        }
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Free a session handle. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn doorbells_session_free(session: *mut FfiSession) {
    if !session.is_null() {
        let _ = catch_unwind(|| {
            drop(unsafe { Box::from_raw(session) });
        });
    }
}

/// Revoke the token on the server. `flag` is true iff the server accepted.
/// The handle stays valid and must still be freed.
#[unsafe(no_mangle)]
pub extern "C" fn doorbells_invalidate(session: *const FfiSession) -> *mut FfiResult {
    guarded("doorbells_invalidate", || {
        let session = session_ref(session)?;
        let revoked = session.inner.invalidate().map_err(FfiResult::from_error)?;
        Ok(FfiResult::ok_flag(revoked))
    })
}

// ---------------------------------------------------------------------------
// Push registration
// ---------------------------------------------------------------------------

#[unsafe(no_mangle)]
pub extern "C" fn doorbells_register_device(
    session: *const FfiSession,
    device_id: *const c_char,
) -> *mut FfiResult {
    guarded("doorbells_register_device", || {
        let session = session_ref(session)?;
        let id = read_str(device_id, "id")?;
        session.inner.register_device(id).map_err(FfiResult::from_error)?;
        Ok(FfiResult::ok_empty())
    })
}

/// `flag` is false when the server did not know the device.
#[unsafe(no_mangle)]
pub extern "C" fn doorbells_unregister_device(
    session: *const FfiSession,
    device_id: *const c_char,
) -> *mut FfiResult {
    guarded("doorbells_unregister_device", || {
        let session = session_ref(session)?;
        let id = read_str(device_id, "id")?;
        let found = session.inner.unregister_device(id).map_err(FfiResult::from_error)?;
        Ok(FfiResult::ok_flag(found))
    })
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// `data_tag = Message` when found, `None` when the message does not exist.
#[unsafe(no_mangle)]
pub extern "C" fn doorbells_get_message(session: *const FfiSession, id: i64) -> *mut FfiResult {
    guarded("doorbells_get_message", || {
        let session = session_ref(session)?;
        let message = session.inner.get_message(id).map_err(FfiResult::from_error)?;
        Ok(FfiResult::ok_message(message))
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn doorbells_get_messages(session: *const FfiSession) -> *mut FfiResult {
    guarded("doorbells_get_messages", || {
        let session = session_ref(session)?;
        let messages = session.inner.get_messages().map_err(FfiResult::from_error)?;
        Ok(FfiResult::ok_message_list(messages))
    })
}

/// `flag` is false when the tag does not exist.
#[unsafe(no_mangle)]
pub extern "C" fn doorbells_send_message(
    session: *const FfiSession,
    tag_id: *const c_char,
    contents: *const c_char,
) -> *mut FfiResult {
    guarded("doorbells_send_message", || {
        let session = session_ref(session)?;
        let tag_id = read_str(tag_id, "tag")?;
        let contents = read_str(contents, "contents")?;
        let sent = session
            .inner
            .send_message(tag_id, contents)
            .map_err(FfiResult::from_error)?;
        Ok(FfiResult::ok_flag(sent))
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn doorbells_delete_message(session: *const FfiSession, id: i64) -> *mut FfiResult {
    guarded("doorbells_delete_message", || {
        let session = session_ref(session)?;
        let deleted = session.inner.delete_message(id).map_err(FfiResult::from_error)?;
        Ok(FfiResult::ok_flag(deleted))
    })
}

// ---------------------------------------------------------------------------
// Tags
// ---------------------------------------------------------------------------

/// `data_tag = Tag` when found, `None` when the tag does not exist.
#[unsafe(no_mangle)]
pub extern "C" fn doorbells_get_tag(
    session: *const FfiSession,
    tag_id: *const c_char,
) -> *mut FfiResult {
    guarded("doorbells_get_tag", || {
        let session = session_ref(session)?;
        let id = read_str(tag_id, "id")?;
        let tag = session.inner.get_tag(id).map_err(FfiResult::from_error)?;
        Ok(FfiResult::ok_tag(tag))
    })
}

/// Like `doorbells_get_tag`, but a missing tag is `FfiErrorCode::NotFound`.
#[unsafe(no_mangle)]
pub extern "C" fn doorbells_find_tag(
    session: *const FfiSession,
    tag_id: *const c_char,
) -> *mut FfiResult {
    guarded("doorbells_find_tag", || {
        let session = session_ref(session)?;
        let id = read_str(tag_id, "id")?;
        let tag = session.inner.find_tag(id).map_err(FfiResult::from_error)?;
        Ok(FfiResult::ok_tag(Some(tag)))
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn doorbells_get_tags(session: *const FfiSession) -> *mut FfiResult {
    guarded("doorbells_get_tags", || {
        let session = session_ref(session)?;
        let tags = session.inner.get_tags().map_err(FfiResult::from_error)?;
        Ok(FfiResult::ok_tag_list(tags))
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn doorbells_create_tag(
    session: *const FfiSession,
    location: *const c_char,
) -> *mut FfiResult {
    guarded("doorbells_create_tag", || {
        let session = session_ref(session)?;
        let location = read_str(location, "location")?;
        let tag = session.inner.create_tag(location).map_err(FfiResult::from_error)?;
        Ok(FfiResult::ok_tag(Some(tag)))
    })
}

/// `flag` is false when the tag does not exist.
#[unsafe(no_mangle)]
pub extern "C" fn doorbells_update_tag(
    session: *const FfiSession,
    tag_id: *const c_char,
    location: *const c_char,
) -> *mut FfiResult {
    guarded("doorbells_update_tag", || {
        let session = session_ref(session)?;
        let id = read_str(tag_id, "id")?;
        let location = read_str(location, "location")?;
        let updated = session
            .inner
            .update_tag(id, location)
            .map_err(FfiResult::from_error)?;
        Ok(FfiResult::ok_flag(updated))
    })
}

/// `flag` is false when the tag does not exist.
#[unsafe(no_mangle)]
pub extern "C" fn doorbells_destroy_tag(
    session: *const FfiSession,
    tag_id: *const c_char,
) -> *mut FfiResult {
    guarded("doorbells_destroy_tag", || {
        let session = session_ref(session)?;
        let id = read_str(tag_id, "id")?;
        let destroyed = session.inner.destroy_tag(id).map_err(FfiResult::from_error)?;
        Ok(FfiResult::ok_flag(destroyed))
    })
}

// ---------------------------------------------------------------------------
// Free functions
// ---------------------------------------------------------------------------

/// Free an `FfiResult` returned by any operation. Safe to call with null.
/// Uses `data_tag` to determine what `data` points to.
#[unsafe(no_mangle)]
pub extern "C" fn doorbells_free_result(result: *mut FfiResult) {
    if result.is_null() {
        return;
    }
    let _ = catch_unwind(|| {
        let result = unsafe { Box::from_raw(result) };
        free_c_string(result.error_message);
        if result.data.is_null() {
            return;
        }
        match result.data_tag {
            FfiDataTag::Message => {
                let message = unsafe { Box::from_raw(result.data as *mut FfiMessage) };
                message.free_fields();
            }
            FfiDataTag::MessageList => {
                let list = unsafe { Box::from_raw(result.data as *mut FfiMessageList) };
                for item in unsafe { reclaim(list.items, list.len) } {
                    item.free_fields();
                }
            }
            FfiDataTag::Tag => {
                let tag = unsafe { Box::from_raw(result.data as *mut FfiTag) };
                tag.free_fields();
            }
            FfiDataTag::TagList => {
                let list = unsafe { Box::from_raw(result.data as *mut FfiTagList) };
                for item in unsafe { reclaim(list.items, list.len) } {
                    item.free_fields();
                }
            }
            FfiDataTag::None | FfiDataTag::Flag => {}
        }
    });
}

/// Take back a list allocated by `types::into_raw_vec`.
unsafe fn reclaim<T>(items: *mut T, len: u32) -> Vec<T> {
    if items.is_null() || len == 0 {
        return Vec::new();
    }
    unsafe { Vec::from_raw_parts(items, len as usize, len as usize) }
}

/// Free a C string allocated by this library. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn doorbells_free_string(s: *mut c_char) {
    if !s.is_null() {
        let _ = catch_unwind(|| free_c_string(s));
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;

    fn start_server() -> CString {
        let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = std_listener.local_addr().unwrap();
        std_listener.set_nonblocking(true).unwrap();

        std::thread::spawn(move || {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            rt.block_on(async {
                let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
                mock_server::run(listener).await
            })
            .unwrap();
        });

        CString::new(format!("http://{addr}/api")).unwrap()
    }

    fn c_str_of(ptr: *const c_char) -> String {
        unsafe { CStr::from_ptr(ptr) }.to_str().unwrap().to_string()
    }

    fn initialized(base_url: &str, token: &str) -> *mut FfiSession {
        let url = CString::new(base_url).unwrap();
        let token = CString::new(token).unwrap();
        let mut session = std::ptr::null_mut();
        let result = doorbells_initialize(url.as_ptr(), token.as_ptr(), &mut session);
        assert_eq!(unsafe { &*result }.error_code, FfiErrorCode::Ok);
        doorbells_free_result(result);
        session
    }

    #[test]
    fn initialize_and_free() {
        let session = initialized("http://localhost:3000/api", "abc");
        assert!(!session.is_null());

        let token = doorbells_session_token(session);
        assert_eq!(c_str_of(token), "abc");
        doorbells_free_string(token);
        doorbells_session_free(session);
    }

    #[test]
    fn initialize_empty_token_is_unauthorized() {
        let url = CString::new("http://localhost:3000/api").unwrap();
        let token = CString::new("").unwrap();
        let mut session = std::ptr::null_mut();
        let result = doorbells_initialize(url.as_ptr(), token.as_ptr(), &mut session);
        let r = unsafe { &*result };
        assert_eq!(r.error_code, FfiErrorCode::Unauthorized);
        assert!(!r.error_message.is_null());
        assert!(session.is_null());
        doorbells_free_result(result);
    }

    #[test]
    fn initialize_malformed_url() {
        let url = CString::new("not a url").unwrap();
        let token = CString::new("abc").unwrap();
        let mut session = std::ptr::null_mut();
        let result = doorbells_initialize(url.as_ptr(), token.as_ptr(), &mut session);
        assert_eq!(unsafe { &*result }.error_code, FfiErrorCode::MalformedUrl);
        doorbells_free_result(result);
    }

    #[test]
    fn initialize_null_base_url_uses_configured_default() {
        let token = CString::new("abc").unwrap();
        let mut session = std::ptr::null_mut();
        let result = doorbells_initialize(std::ptr::null(), token.as_ptr(), &mut session);
        assert_eq!(unsafe { &*result }.error_code, FfiErrorCode::Ok);
        assert!(!session.is_null());
        doorbells_free_result(result);
        doorbells_session_free(session);
    }

    #[test]
    fn initialize_null_out_pointer() {
        let url = CString::new("http://localhost:3000/api").unwrap();
        let token = CString::new("abc").unwrap();
        let result = doorbells_initialize(url.as_ptr(), token.as_ptr(), std::ptr::null_mut());
        assert_eq!(unsafe { &*result }.error_code, FfiErrorCode::NullArg);
        doorbells_free_result(result);
    }

    #[test]
    fn null_session_is_null_arg() {
        let result = doorbells_get_tags(std::ptr::null());
        let r = unsafe { &*result };
        assert_eq!(r.error_code, FfiErrorCode::NullArg);
        assert_eq!(c_str_of(r.error_message), "null argument: session");
        doorbells_free_result(result);

        assert!(doorbells_session_token(std::ptr::null()).is_null());
    }

    #[test]
    fn non_utf8_argument_is_an_encoding_error() {
        let session = initialized("http://localhost:3000/api", "abc");
        let location = CString::new(vec![b'd', 0xFF, b'k']).unwrap();
        let result = doorbells_create_tag(session, location.as_ptr());
        let r = unsafe { &*result };
        assert_eq!(r.error_code, FfiErrorCode::Encoding);
        assert!(c_str_of(r.error_message).contains("location"));
        doorbells_free_result(result);
        doorbells_session_free(session);
    }

    #[test]
    fn null_string_argument_is_null_arg() {
        let session = initialized("http://localhost:3000/api", "abc");
        let result = doorbells_send_message(session, std::ptr::null(), std::ptr::null());
        assert_eq!(unsafe { &*result }.error_code, FfiErrorCode::NullArg);
        doorbells_free_result(result);
        doorbells_session_free(session);
    }

    #[test]
    fn live_round_trip() {
        let url = start_server();
        let email = CString::new(mock_server::DEFAULT_EMAIL).unwrap();
        let password = CString::new(mock_server::DEFAULT_PASSWORD).unwrap();
        let mut session = std::ptr::null_mut();
        let result = doorbells_authorize(url.as_ptr(), email.as_ptr(), password.as_ptr(), &mut session);
        assert_eq!(unsafe { &*result }.error_code, FfiErrorCode::Ok);
        doorbells_free_result(result);
        assert!(!session.is_null());

        // create a tag
        let location = CString::new("front door").unwrap();
        let result = doorbells_create_tag(session, location.as_ptr());
        let r = unsafe { &*result };
        assert_eq!(r.error_code, FfiErrorCode::Ok);
        assert_eq!(r.data_tag, FfiDataTag::Tag);
        let tag = unsafe { &*(r.data as *const FfiTag) };
        assert_eq!(c_str_of(tag.location), "front door");
        assert!(c_str_of(tag.owner_json).contains(mock_server::DEFAULT_EMAIL));
        let tag_id = CString::new(c_str_of(tag.id)).unwrap();
        doorbells_free_result(result);

        // send to it
        let contents = CString::new("hello world").unwrap();
        let result = doorbells_send_message(session, tag_id.as_ptr(), contents.as_ptr());
        let r = unsafe { &*result };
        assert_eq!(r.data_tag, FfiDataTag::Flag);
        assert!(r.flag);
        doorbells_free_result(result);

        // list messages
        let result = doorbells_get_messages(session);
        let r = unsafe { &*result };
        assert_eq!(r.data_tag, FfiDataTag::MessageList);
        let list = unsafe { &*(r.data as *const FfiMessageList) };
        assert_eq!(list.len, 1);
        let items = unsafe { std::slice::from_raw_parts(list.items, list.len as usize) };
        assert_eq!(c_str_of(items[0].contents), "hello world");
        assert_eq!(items[0].date_received_ms, items[0].timestamp * 1000);
        doorbells_free_result(result);

        // absent message
        let result = doorbells_get_message(session, 9_999);
        let r = unsafe { &*result };
        assert_eq!(r.error_code, FfiErrorCode::Ok);
        assert_eq!(r.data_tag, FfiDataTag::None);
        assert!(r.data.is_null());
        doorbells_free_result(result);

        // destroy, then find reports not-found
        let result = doorbells_destroy_tag(session, tag_id.as_ptr());
        assert!(unsafe { &*result }.flag);
        doorbells_free_result(result);

        let result = doorbells_find_tag(session, tag_id.as_ptr());
        let r = unsafe { &*result };
        assert_eq!(r.error_code, FfiErrorCode::NotFound);
        assert_eq!(r.api_status, 404);
        doorbells_free_result(result);

        // empty tag list
        let result = doorbells_get_tags(session);
        let r = unsafe { &*result };
        assert_eq!(r.data_tag, FfiDataTag::TagList);
        let list = unsafe { &*(r.data as *const FfiTagList) };
        assert_eq!(list.len, 0);
        assert!(list.items.is_null());
        doorbells_free_result(result);

        // revoke; further calls are unauthorized
        let result = doorbells_invalidate(session);
        assert!(unsafe { &*result }.flag);
        doorbells_free_result(result);

        let result = doorbells_get_tags(session);
        let r = unsafe { &*result };
        assert_eq!(r.error_code, FfiErrorCode::Unauthorized);
        assert_eq!(r.api_status, 401);
        doorbells_free_result(result);

        doorbells_session_free(session);
    }

    #[test]
    fn generated_header_declares_exports() {
        // Absent only when cbindgen could not parse the crate.
        let Some(path) = option_env!("DOORBELLS_HEADER") else {
            return;
        };
        assert!(path.starts_with(env!("OUT_DIR")));
        let header = std::fs::read_to_string(path).unwrap();
        assert!(header.contains("DOORBELLS_H"));
        for export in ["doorbells_authorize", "doorbells_find_tag", "doorbells_free_result"] {
            assert!(header.contains(export), "{export} missing from header");
        }
    }

    #[test]
    fn free_result_null_is_safe() {
        doorbells_free_result(std::ptr::null_mut());
    }

    #[test]
    fn free_string_null_is_safe() {
        doorbells_free_string(std::ptr::null_mut());
    }

    #[test]
    fn session_free_null_is_safe() {
        doorbells_session_free(std::ptr::null_mut());
    }
}

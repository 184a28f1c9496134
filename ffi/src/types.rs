//! `#[repr(C)]` types for the FFI boundary.
//!
//! # Design
//! Each type mirrors a core type with C-compatible representations:
//! `*mut c_char` instead of `String`, raw pointers instead of `Vec`, and
//! tagged enums with explicit discriminants. Opaque user records cross the
//! boundary as JSON text. Conversion functions live here to keep `lib.rs`
//! focused on the `extern "C"` surface.

use std::ffi::{c_void, CString};
use std::os::raw::c_char;

use doorbells_core::{ApiError, ErrorKind, Message, Tag, UreqTransport, UserRef};

/// Opaque handle to a `Session`. C callers receive a pointer to this and
/// pass it back into every operation.
pub struct FfiSession {
    pub(crate) inner: doorbells_core::Session<UreqTransport>,
}

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

/// A message exposed to C. `sender_json` is the sender record as JSON.
#[repr(C)]
pub struct FfiMessage {
    pub id: i64,
    pub sender_json: *mut c_char,
    pub contents: *mut c_char,
    pub timestamp: i64,
    pub date_received_ms: i64,
}

/// A list of messages exposed to C.
#[repr(C)]
pub struct FfiMessageList {
    pub items: *mut FfiMessage,
    pub len: u32,
}

/// A tag exposed to C. `owner_json` is the owning user record as JSON.
#[repr(C)]
pub struct FfiTag {
    pub id: *mut c_char,
    pub location: *mut c_char,
    pub owner_json: *mut c_char,
}

/// A list of tags exposed to C.
#[repr(C)]
pub struct FfiTagList {
    pub items: *mut FfiTag,
    pub len: u32,
}

impl FfiMessage {
    fn from_core(message: Message) -> Self {
        FfiMessage {
            id: message.id,
            sender_json: user_json(&message.sender),
            date_received_ms: message.date_received_millis(),
            contents: c_string(message.contents),
            timestamp: message.timestamp,
        }
    }

    /// Free the C-string fields (but not the struct itself).
    pub(crate) fn free_fields(&self) {
        free_c_string(self.sender_json);
        free_c_string(self.contents);
    }
}

impl FfiTag {
    fn from_core(tag: Tag) -> Self {
        FfiTag {
            owner_json: user_json(&tag.owner),
            id: c_string(tag.id),
            location: c_string(tag.location),
        }
    }

    pub(crate) fn free_fields(&self) {
        free_c_string(self.id);
        free_c_string(self.location);
        free_c_string(self.owner_json);
    }
}

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// Error codes returned in `FfiResult`. One per `ErrorKind`, plus the
/// boundary's own failures.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiErrorCode {
    Ok = 0,
    BadRequest = 1,
    Unauthorized = 2,
    NotFound = 3,
    InternalServer = 4,
    Api = 5,
    Transport = 6,
    Decode = 7,
    Encoding = 8,
    MalformedUrl = 9,
    NullArg = 10,
    Panic = 11,
}

impl From<ErrorKind> for FfiErrorCode {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::BadRequest => FfiErrorCode::BadRequest,
            ErrorKind::Unauthorized => FfiErrorCode::Unauthorized,
            ErrorKind::NotFound => FfiErrorCode::NotFound,
            ErrorKind::InternalServer => FfiErrorCode::InternalServer,
            ErrorKind::Api => FfiErrorCode::Api,
            ErrorKind::Transport => FfiErrorCode::Transport,
            ErrorKind::Decode => FfiErrorCode::Decode,
            ErrorKind::Encoding => FfiErrorCode::Encoding,
            ErrorKind::MalformedUrl => FfiErrorCode::MalformedUrl,
        }
    }
}

/// Tag that tells `doorbells_free_result` what `FfiResult::data` points to.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiDataTag {
    /// No payload. For lookups this means the entity was absent.
    None = 0,
    /// The answer is in `FfiResult::flag`.
    Flag = 1,
    Message = 2,
    MessageList = 3,
    Tag = 4,
    TagList = 5,
}

/// Result envelope for every operation.
///
/// On success `error_code` is `Ok`, `error_message` is null, and the payload
/// is described by `data_tag`. On failure `error_code` names the category,
/// `error_message` is a human-readable C string, `api_status` carries the
/// server-reported status when there was one (0 otherwise), and `data` is
/// null.
#[repr(C)]
pub struct FfiResult {
    pub error_code: FfiErrorCode,
    pub error_message: *mut c_char,
    pub api_status: i64,
    pub data_tag: FfiDataTag,
    pub flag: bool,
    pub data: *mut c_void,
}

impl FfiResult {
    fn boxed(data_tag: FfiDataTag, flag: bool, data: *mut c_void) -> *mut Self {
        Box::into_raw(Box::new(FfiResult {
            error_code: FfiErrorCode::Ok,
            error_message: std::ptr::null_mut(),
            api_status: 0,
            data_tag,
            flag,
            data,
        }))
    }

    /// Success with no payload.
    pub(crate) fn ok_empty() -> *mut Self {
        Self::boxed(FfiDataTag::None, false, std::ptr::null_mut())
    }

    pub(crate) fn ok_flag(flag: bool) -> *mut Self {
        Self::boxed(FfiDataTag::Flag, flag, std::ptr::null_mut())
    }

    pub(crate) fn ok_message(message: Option<Message>) -> *mut Self {
        match message {
            Some(message) => {
                let data = Box::into_raw(Box::new(FfiMessage::from_core(message)));
                Self::boxed(FfiDataTag::Message, false, data as *mut c_void)
            }
            None => Self::ok_empty(),
        }
    }

    pub(crate) fn ok_message_list(messages: Vec<Message>) -> *mut Self {
        let (items, len) = into_raw_vec(messages.into_iter().map(FfiMessage::from_core).collect());
        let data = Box::into_raw(Box::new(FfiMessageList { items, len }));
        Self::boxed(FfiDataTag::MessageList, false, data as *mut c_void)
    }

    pub(crate) fn ok_tag(tag: Option<Tag>) -> *mut Self {
        match tag {
            Some(tag) => {
                let data = Box::into_raw(Box::new(FfiTag::from_core(tag)));
                Self::boxed(FfiDataTag::Tag, false, data as *mut c_void)
            }
            None => Self::ok_empty(),
        }
    }

    pub(crate) fn ok_tag_list(tags: Vec<Tag>) -> *mut Self {
        let (items, len) = into_raw_vec(tags.into_iter().map(FfiTag::from_core).collect());
        let data = Box::into_raw(Box::new(FfiTagList { items, len }));
        Self::boxed(FfiDataTag::TagList, false, data as *mut c_void)
    }

    fn error(error_code: FfiErrorCode, api_status: i64, message: String) -> *mut Self {
        Box::into_raw(Box::new(FfiResult {
            error_code,
            error_message: c_string(message),
            api_status,
            data_tag: FfiDataTag::None,
            flag: false,
            data: std::ptr::null_mut(),
        }))
    }

    /// Build an error result from an `ApiError`.
    pub(crate) fn from_error(err: ApiError) -> *mut Self {
        let api_status = match &err {
            ApiError::BadRequest { .. } => 400,
            ApiError::Unauthorized { .. } => 401,
            ApiError::NotFound { .. } => 404,
            ApiError::InternalServer { .. } => 500,
            ApiError::Api { status, .. } => status.unwrap_or_default(),
            _ => 0,
        };
        Self::error(err.kind().into(), api_status, err.to_string())
    }

    pub(crate) fn null_arg(name: &str) -> *mut Self {
        Self::error(FfiErrorCode::NullArg, 0, format!("null argument: {name}"))
    }

    pub(crate) fn panic(msg: &str) -> *mut Self {
        Self::error(FfiErrorCode::Panic, 0, msg.to_string())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Hand ownership of `s` to C. Interior NULs cannot cross the boundary, so
/// the text is truncated at the first one.
pub(crate) fn c_string(s: String) -> *mut c_char {
    let s = match s.find('\0') {
        Some(end) => s[..end].to_string(),
        None => s,
    };
    CString::new(s).unwrap_or_default().into_raw()
}

pub(crate) fn free_c_string(s: *mut c_char) {
    if !s.is_null() {
        drop(unsafe { CString::from_raw(s) });
    }
}

fn user_json(user: &UserRef) -> *mut c_char {
    c_string(serde_json::to_string(user).unwrap_or_else(|_| "null".to_string()))
}

/// Leak `items` as a pointer/length pair; null for an empty list. The
/// vector is shrunk first so `Vec::from_raw_parts(ptr, len, len)` can
/// reclaim it.
fn into_raw_vec<T>(items: Vec<T>) -> (*mut T, u32) {
    if items.is_empty() {
        return (std::ptr::null_mut(), 0);
    }
    let mut items = items.into_boxed_slice();
    let len = items.len() as u32;
    let ptr = items.as_mut_ptr();
    std::mem::forget(items);
    (ptr, len)
}

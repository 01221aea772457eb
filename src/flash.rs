//! One-shot flash messages.
//!
//! Flash messages live in a session of their own, usually driven by a second
//! overseer with a dedicated cookie name. The session value is a JSON object
//! mapping keys to messages; reading a key removes it.

use std::collections::BTreeMap;

use http::Request;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::errors::SessionError;
use crate::net::ResponseWriter;
use crate::overseer::{get_obj, set_obj, Overseer};

type Flashes = BTreeMap<String, String>;

/// Loads the flash map. A request without a live flash session has no flashes.
fn load<O, B>(overseer: &O, w: &mut dyn ResponseWriter, req: &Request<B>) -> Result<Flashes, SessionError>
where
    O: Overseer + ?Sized,
{
    match get_obj(overseer, w, req) {
        Ok(flashes) => Ok(flashes),
        Err(e) if e.is_no_session() => Ok(Flashes::new()),
        Err(e) => Err(e),
    }
}

/// Stores `message` under `key`, replacing any earlier message for that key.
pub fn add_flash<O, B>(
    overseer: &O,
    w: &mut dyn ResponseWriter,
    req: &Request<B>,
    key: &str,
    message: &str,
) -> Result<(), SessionError>
where
    O: Overseer + ?Sized,
{
    let mut flashes = load(overseer, w, req)?;
    flashes.insert(key.to_string(), message.to_string());
    set_obj(overseer, w, req, &flashes)
}

/// Takes the message stored under `key`. Returns `Ok(None)` when there is none.
pub fn get_flash<O, B>(
    overseer: &O,
    w: &mut dyn ResponseWriter,
    req: &Request<B>,
    key: &str,
) -> Result<Option<String>, SessionError>
where
    O: Overseer + ?Sized,
{
    let mut flashes = load(overseer, w, req)?;
    let Some(message) = flashes.remove(key) else {
        return Ok(None);
    };

    set_obj(overseer, w, req, &flashes)?;
    Ok(Some(message))
}

/// Stores `obj`, encoded as JSON, under `key`.
pub fn add_flash_obj<O, T, B>(
    overseer: &O,
    w: &mut dyn ResponseWriter,
    req: &Request<B>,
    key: &str,
    obj: &T,
) -> Result<(), SessionError>
where
    O: Overseer + ?Sized,
    T: Serialize + ?Sized,
{
    let message = serde_json::to_string(obj)?;
    add_flash(overseer, w, req, key, &message)
}

/// Takes the object stored under `key` and decodes it from JSON.
pub fn get_flash_obj<O, T, B>(
    overseer: &O,
    w: &mut dyn ResponseWriter,
    req: &Request<B>,
    key: &str,
) -> Result<Option<T>, SessionError>
where
    O: Overseer + ?Sized,
    T: DeserializeOwned,
{
    match get_flash(overseer, w, req, key)? {
        Some(message) => Ok(Some(serde_json::from_str(&message)?)),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::{ResponseRecorder, SessionResponse};
    use crate::overseer::tests::{overseer_with, request};
    use crate::storage::{MemoryStorer, Storer};
    use serde::Deserialize;
    use std::sync::Arc;
    use std::time::Duration;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Notice {
        level: String,
        text: String,
    }

    #[test]
    fn flash_is_read_once() {
        let storer = Arc::new(MemoryStorer::new(Duration::from_secs(60)));
        let overseer = overseer_with(0, storer.clone());
        let req = request(None);
        let mut w = SessionResponse::new(ResponseRecorder::new());

        add_flash(&overseer, &mut w, &req, "info", "saved").unwrap();
        add_flash(&overseer, &mut w, &req, "error", "nope").unwrap();

        assert_eq!(get_flash(&overseer, &mut w, &req, "info").unwrap().as_deref(), Some("saved"));
        assert_eq!(get_flash(&overseer, &mut w, &req, "info").unwrap(), None);

        let id = overseer.session_id(&mut w, &req).unwrap();
        assert_eq!(storer.get(&id).unwrap(), r#"{"error":"nope"}"#);
    }

    #[test]
    fn missing_flash_session_reads_as_empty() {
        let storer = Arc::new(MemoryStorer::new(Duration::from_secs(60)));
        let overseer = overseer_with(0, storer.clone());
        let mut w = SessionResponse::new(ResponseRecorder::new());

        assert_eq!(get_flash(&overseer, &mut w, &request(None), "info").unwrap(), None);
        assert_eq!(get_flash(&overseer, &mut w, &request(Some("sess=gone")), "info").unwrap(), None);
        // Reading nothing writes nothing.
        assert!(w.buffer().is_empty());
        assert!(storer.is_empty());
    }

    #[test]
    fn flash_objects_round_trip() {
        let overseer = overseer_with(0, Arc::new(MemoryStorer::default()));
        let req = request(None);
        let mut w = SessionResponse::new(ResponseRecorder::new());
        let notice = Notice { level: "warn".into(), text: "disk almost full".into() };

        add_flash_obj(&overseer, &mut w, &req, "notice", &notice).unwrap();
        let back: Option<Notice> = get_flash_obj(&overseer, &mut w, &req, "notice").unwrap();
        assert_eq!(back, Some(notice));

        let again: Option<Notice> = get_flash_obj(&overseer, &mut w, &req, "notice").unwrap();
        assert_eq!(again, None);
    }

    #[test]
    fn corrupt_flash_session_is_an_error() {
        let storer = Arc::new(MemoryStorer::new(Duration::from_secs(60)));
        storer.set("abc", "[1, 2]").unwrap();
        let overseer = overseer_with(0, storer);
        let mut w = SessionResponse::new(ResponseRecorder::new());

        let err = get_flash(&overseer, &mut w, &request(Some("sess=abc")), "info").unwrap_err();
        assert!(matches!(err, SessionError::Serialization(_)));
    }
}

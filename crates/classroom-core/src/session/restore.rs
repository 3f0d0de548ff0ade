//! Rebuilding a Session from its persisted form.
//!
//! The persisted JSON may come from an older client that lacked fields, or
//! carry values of the wrong type. Every field is therefore optional on
//! read: the default Session is the base and each persisted field that
//! decodes cleanly overrides it. `adminState` and `teacherState` are merged
//! key by key over their own defaults.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use super::state::{AdminState, Session, TeacherState, User};

/// Why a persisted session could not be used at all.
#[derive(Debug)]
pub(crate) enum RestoreError {
    /// Not valid JSON.
    Json(serde_json::Error),
    /// Valid JSON but not an object.
    NotAnObject,
}

impl std::fmt::Display for RestoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RestoreError::Json(e) => write!(f, "JSON error: {e}"),
            RestoreError::NotAnObject => write!(f, "persisted session is not a JSON object"),
        }
    }
}

/// Parse `raw` and merge it over `defaults`.
pub(crate) fn restore_session(raw: &str, defaults: &Session) -> Result<Session, RestoreError> {
    let value: Value = serde_json::from_str(raw).map_err(RestoreError::Json)?;
    let Value::Object(persisted) = value else {
        return Err(RestoreError::NotAnObject);
    };

    let mut session = defaults.clone();

    let user = field::<Option<User>>(&persisted, "user").flatten();
    let token = field::<Option<String>>(&persisted, "token").flatten();
    // A user without a token (or the reverse) is half a login; keep neither.
    if let (Some(user), Some(token)) = (user, token) {
        session.user = Some(user);
        session.token = Some(token);
    }

    session.admin_state = merge_state::<AdminState>(&persisted, "adminState", &defaults.admin_state);
    session.teacher_state =
        merge_state::<TeacherState>(&persisted, "teacherState", &defaults.teacher_state);

    if let Some(size) = persisted.get("fontSize") {
        match size.as_f64() {
            Some(size) if size.is_finite() => session.font_size = size,
            _ => log::debug!("Ignoring non-numeric persisted fontSize: {size}"),
        }
    }

    Ok(session)
}

/// Decode one top-level field, or `None` if absent or malformed.
fn field<T: DeserializeOwned>(persisted: &Map<String, Value>, key: &str) -> Option<T> {
    let value = persisted.get(key)?;
    match serde_json::from_value(value.clone()) {
        Ok(decoded) => Some(decoded),
        Err(e) => {
            log::debug!("Ignoring malformed persisted {key}: {e}");
            None
        }
    }
}

/// Overlay the persisted sub-object on the defaults, key by key.
///
/// Keys whose persisted value has the wrong type keep their default.
fn merge_state<T>(persisted: &Map<String, Value>, key: &str, defaults: &T) -> T
where
    T: Serialize + DeserializeOwned + Clone,
{
    let Some(Value::Object(overrides)) = persisted.get(key) else {
        return defaults.clone();
    };
    let Ok(Value::Object(mut merged)) = serde_json::to_value(defaults) else {
        return defaults.clone();
    };

    for (name, value) in overrides {
        let Some(default_value) = merged.get(name).cloned() else {
            continue;
        };
        merged.insert(name.clone(), value.clone());
        if serde_json::from_value::<T>(Value::Object(merged.clone())).is_err() {
            log::debug!("Ignoring malformed persisted {key}.{name}");
            merged.insert(name.clone(), default_value);
        }
    }

    serde_json::from_value(Value::Object(merged)).unwrap_or_else(|_| defaults.clone())
}

// ============================================================================
// TESTS
// ============================================================================

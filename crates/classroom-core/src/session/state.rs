//! Session state.
//!
//! The Session is serialized with camelCase keys so the persisted shape is
//! the one web clients already keep in local storage:
//!
//! ```json
//! {
//!   "user": { "id": "u1", "name": "Ada", "role": "teacher" },
//!   "token": "eyJ...",
//!   "adminState": { "classId": null, ..., "scrollPosition": 0, "activePage": null },
//!   "teacherState": { "classId": "c1", ..., "scrollPosition": 340 },
//!   "fontSize": 12
//! }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::content::Role;

/// Font size used when nothing valid has been persisted.
pub const DEFAULT_FONT_SIZE: f64 = 12.0;

/// The logged-in user as the client knows it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(alias = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    /// Profile fields this client does not interpret, kept for round trips.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl User {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            email: None,
            role: None,
            extra: Map::new(),
        }
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

/// Where an admin is in the content hierarchy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminState {
    pub class_id: Option<String>,
    pub subject_id: Option<String>,
    pub unit_id: Option<String>,
    pub sub_unit_id: Option<String>,
    pub lesson_id: Option<String>,
    pub selected_resource_type: Option<String>,
    pub scroll_position: f64,
    pub active_page: Option<String>,
}

/// Where a teacher is in the content hierarchy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherState {
    pub class_id: Option<String>,
    pub subject_id: Option<String>,
    pub unit_id: Option<String>,
    pub sub_unit_id: Option<String>,
    pub lesson_id: Option<String>,
    pub selected_resource_type: Option<String>,
    pub scroll_position: f64,
}

/// The complete client session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user: Option<User>,
    pub token: Option<String>,
    pub admin_state: AdminState,
    pub teacher_state: TeacherState,
    pub font_size: f64,
}

impl Session {
    /// A logged-out session with the given font size.
    pub fn with_font_size(font_size: f64) -> Self {
        Self {
            user: None,
            token: None,
            admin_state: AdminState::default(),
            teacher_state: TeacherState::default(),
            font_size,
        }
    }

    pub fn is_logged_in(&self) -> bool {
        self.user.is_some()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::with_font_size(DEFAULT_FONT_SIZE)
    }
}

// ============================================================================
// Partial Updates
// ============================================================================

/// Generates chainable setters for a patch struct.
///
/// `field(value)` sets the field, `clear_field()` sets it to null.
macro_rules! patch_setters {
    ($($field:ident, $clear:ident;)*) => {
        $(
            pub fn $field(mut self, value: impl Into<String>) -> Self {
                self.$field = Some(Some(value.into()));
                self
            }

            pub fn $clear(mut self) -> Self {
                self.$field = Some(None);
                self
            }
        )*
    };
}

/// A partial update to [`AdminState`].
///
/// `None` leaves a field untouched; `Some(None)` sets it to null.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdminStatePatch {
    pub class_id: Option<Option<String>>,
    pub subject_id: Option<Option<String>>,
    pub unit_id: Option<Option<String>>,
    pub sub_unit_id: Option<Option<String>>,
    pub lesson_id: Option<Option<String>>,
    pub selected_resource_type: Option<Option<String>>,
    pub scroll_position: Option<f64>,
    pub active_page: Option<Option<String>>,
}

impl AdminStatePatch {
    pub fn new() -> Self {
        Self::default()
    }

    patch_setters! {
        class_id, clear_class_id;
        subject_id, clear_subject_id;
        unit_id, clear_unit_id;
        sub_unit_id, clear_sub_unit_id;
        lesson_id, clear_lesson_id;
        selected_resource_type, clear_selected_resource_type;
        active_page, clear_active_page;
    }

    pub fn scroll_position(mut self, offset: f64) -> Self {
        self.scroll_position = Some(offset);
        self
    }

    /// Overwrite exactly the fields present in this patch.
    pub fn apply_to(&self, state: &mut AdminState) {
        merge(&mut state.class_id, &self.class_id);
        merge(&mut state.subject_id, &self.subject_id);
        merge(&mut state.unit_id, &self.unit_id);
        merge(&mut state.sub_unit_id, &self.sub_unit_id);
        merge(&mut state.lesson_id, &self.lesson_id);
        merge(&mut state.selected_resource_type, &self.selected_resource_type);
        merge(&mut state.scroll_position, &self.scroll_position);
        merge(&mut state.active_page, &self.active_page);
    }
}

/// A partial update to [`TeacherState`].
///
/// `None` leaves a field untouched; `Some(None)` sets it to null.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TeacherStatePatch {
    pub class_id: Option<Option<String>>,
    pub subject_id: Option<Option<String>>,
    pub unit_id: Option<Option<String>>,
    pub sub_unit_id: Option<Option<String>>,
    pub lesson_id: Option<Option<String>>,
    pub selected_resource_type: Option<Option<String>>,
    pub scroll_position: Option<f64>,
}

impl TeacherStatePatch {
    pub fn new() -> Self {
        Self::default()
    }

    patch_setters! {
        class_id, clear_class_id;
        subject_id, clear_subject_id;
        unit_id, clear_unit_id;
        sub_unit_id, clear_sub_unit_id;
        lesson_id, clear_lesson_id;
        selected_resource_type, clear_selected_resource_type;
    }

    pub fn scroll_position(mut self, offset: f64) -> Self {
        self.scroll_position = Some(offset);
        self
    }

    /// Overwrite exactly the fields present in this patch.
    pub fn apply_to(&self, state: &mut TeacherState) {
        merge(&mut state.class_id, &self.class_id);
        merge(&mut state.subject_id, &self.subject_id);
        merge(&mut state.unit_id, &self.unit_id);
        merge(&mut state.sub_unit_id, &self.sub_unit_id);
        merge(&mut state.lesson_id, &self.lesson_id);
        merge(&mut state.selected_resource_type, &self.selected_resource_type);
        merge(&mut state.scroll_position, &self.scroll_position);
    }
}

fn merge<T: Clone>(target: &mut T, value: &Option<T>) {
    if let Some(value) = value {
        *target = value.clone();
    }
}

// ============================================================================
// TESTS
// ============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub mod logging;

// ============================================================================
// Identity & Session
// ============================================================================

/// An authenticated CRM user, as returned by `POST /login` and `GET /me`.
///
/// The backend serializes these with flat lowercase field names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(rename = "userid")]
    pub user_id: i64,
    pub name: String,
    pub email: String,
    #[serde(rename = "roleid")]
    pub role_id: i64,
    /// Account status flag. Absent means active.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl UserProfile {
    /// An account is active unless the backend flags it otherwise.
    pub fn is_active(&self) -> bool {
        match self.status.as_deref() {
            Some(status) if !status.is_empty() => status.eq_ignore_ascii_case("active"),
            _ => true,
        }
    }
}

/// A complete authenticated session.
///
/// A token is never held without its user; "no session" is
/// `Option::<Session>::None`, so a partial session cannot be
/// constructed. The persisted form is a single JSON document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub user: UserProfile,
    #[serde(rename = "token")]
    pub access_token: String,
    #[serde(rename = "refreshToken", default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

// ============================================================================
// Roles & Access
// ============================================================================

/// Fixed role table shared with the backend.
///
/// Role ids outside the table resolve to no key, and every access
/// lookup for such a role denies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoleKey {
    Superadmin,
    Admin,
    Manager,
    Lead,
    Agent,
}

impl RoleKey {
    pub fn from_id(id: i64) -> Option<RoleKey> {
        match id {
            1 => Some(RoleKey::Superadmin),
            2 => Some(RoleKey::Admin),
            3 => Some(RoleKey::Manager),
            4 => Some(RoleKey::Lead),
            5 => Some(RoleKey::Agent),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RoleKey::Superadmin => "superadmin",
            RoleKey::Admin => "admin",
            RoleKey::Manager => "manager",
            RoleKey::Lead => "lead",
            RoleKey::Agent => "agent",
        }
    }

    pub fn id(&self) -> i64 {
        match self {
            RoleKey::Superadmin => 1,
            RoleKey::Admin => 2,
            RoleKey::Manager => 3,
            RoleKey::Lead => 4,
            RoleKey::Agent => 5,
        }
    }
}

/// Server-sourced permission matrix: component id to role key to allowed.
pub type PermissionMatrix = HashMap<String, HashMap<String, bool>>;

/// Flattens a permission matrix into the per-user access map.
///
/// Every component in the matrix gets an entry; missing role entries
/// and unknown role ids resolve to `false`.
pub fn resolve_access(matrix: &PermissionMatrix, role_id: i64) -> HashMap<String, bool> {
    let role_key = RoleKey::from_id(role_id);
    matrix
        .iter()
        .map(|(component, roles)| {
            let allowed = role_key
                .map(|key| roles.get(key.as_str()).copied().unwrap_or(false))
                .unwrap_or(false);
            (component.clone(), allowed)
        })
        .collect()
}

/// Role descriptor from `GET /roles`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleInfo {
    pub id: i64,
    pub name: String,
}

// ============================================================================
// Leads
// ============================================================================

/// A CRM lead record. Timestamps are RFC 3339.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub id: i64,
    #[serde(rename = "firstname")]
    pub first_name: String,
    #[serde(rename = "lastname")]
    pub last_name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub company: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub status: String,
    #[serde(rename = "assignedto", default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<i64>,
    #[serde(rename = "visastatusid", default, skip_serializing_if = "Option::is_none")]
    pub visa_status_id: Option<i64>,
    #[serde(rename = "createdat", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(rename = "updatedat", default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(rename = "createdby", default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<i64>,
}

impl Lead {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn visa_status_label(&self) -> Option<&'static str> {
        self.visa_status_id.and_then(visa_status_label)
    }

    /// Creation date as shown in listings (`M/D/YYYY`).
    pub fn created_label(&self) -> Option<String> {
        self.created_at.map(|t| t.format("%-m/%-d/%Y").to_string())
    }

    /// Case-insensitive match over the fields and derived labels shown
    /// in lead listings. Derived labels (visa status, formatted dates)
    /// are exactly what server-side `q` filtering cannot see.
    pub fn matches_term(&self, term: &str) -> bool {
        let term = term.to_lowercase();
        if term.is_empty() {
            return true;
        }
        self.full_name().to_lowercase().contains(&term)
            || self.email.to_lowercase().contains(&term)
            || self.company.to_lowercase().contains(&term)
            || self
                .visa_status_label()
                .is_some_and(|label| label.to_lowercase().contains(&term))
            || self.created_label().is_some_and(|date| date.contains(&term))
    }
}

/// Payload for creating or updating a lead.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeadDraft {
    #[serde(rename = "firstname")]
    pub first_name: String,
    #[serde(rename = "lastname")]
    pub last_name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub company: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub status: String,
    #[serde(rename = "assignedto", skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<i64>,
    #[serde(rename = "visastatusid", skip_serializing_if = "Option::is_none")]
    pub visa_status_id: Option<i64>,
}

/// Display labels for visa status ids.
pub fn visa_status_label(id: i64) -> Option<&'static str> {
    match id {
        1 => Some("H1B"),
        2 => Some("F1"),
        3 => Some("OPT"),
        4 => Some("STEM"),
        5 => Some("Green Card"),
        6 => Some("USC"),
        7 => Some("H4"),
        _ => None,
    }
}

/// Collapses a phone number to its digits for duplicate comparison,
/// so formatting differences never mask a match.
pub fn normalize_phone(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

// ============================================================================
// Users
// ============================================================================

/// Payload for `POST /users`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(rename = "roleid")]
    pub role_id: i64,
    #[serde(rename = "managerid", skip_serializing_if = "Option::is_none")]
    pub manager_id: Option<i64>,
    #[serde(rename = "departmentid", skip_serializing_if = "Option::is_none")]
    pub department_id: Option<i64>,
}

// ============================================================================
// Pagination
// ============================================================================

/// One page of a cursor-paginated listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    #[serde(rename = "nextCursor", default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

impl<T> Page<T> {
    pub fn empty() -> Self {
        Page {
            items: Vec::new(),
            next_cursor: None,
        }
    }
}

/// Wire form of a listing response. Endpoints answer either a page
/// envelope or a bare array; the bare form means no further pages.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PageBody<T> {
    Envelope(Page<T>),
    Bare(Vec<T>),
}

impl<T> PageBody<T> {
    pub fn into_page(self) -> Page<T> {
        match self {
            PageBody::Envelope(page) => page,
            PageBody::Bare(items) => Page {
                items,
                next_cursor: None,
            },
        }
    }
}

/// Identity used to de-duplicate records across overlapping pages.
pub trait PagedRecord {
    fn record_id(&self) -> i64;
}

impl PagedRecord for Lead {
    fn record_id(&self) -> i64 {
        self.id
    }
}

impl PagedRecord for UserProfile {
    fn record_id(&self) -> i64 {
        self.user_id
    }
}

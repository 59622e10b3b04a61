//! Error types and user-facing error normalization.

use serde::{Deserialize, Serialize};

/// Error returned by an [`EntityApi`](crate::EntityApi) call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ApiError {
    /// Backend or transport message (may be empty).
    pub message: String,
    /// HTTP status, absent when the request never reached the server.
    pub status: Option<u16>,
}

impl ApiError {
    /// Failure before reaching the server (connection refused, DNS, ...).
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
        }
    }

    /// Failure reported by the server with an HTTP status.
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: Some(status),
        }
    }

    /// 404 for the given resource.
    pub fn not_found(resource: &str, id: &str) -> Self {
        Self::http(404, format!("{resource} {id} not found"))
    }

    pub fn kind(&self) -> ErrorKind {
        match self.status {
            None => ErrorKind::Transport,
            Some(404) => ErrorKind::NotFound,
            Some(401) | Some(403) => ErrorKind::Forbidden,
            Some(400) | Some(409) | Some(422) => ErrorKind::Conflict,
            Some(_) => ErrorKind::Server,
        }
    }
}

/// Coarse classification of a gateway failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The call failed before reaching the server.
    Transport,
    /// 400/409-class validation conflict.
    Conflict,
    /// 404.
    NotFound,
    /// 401/403.
    Forbidden,
    /// Any other server response.
    Server,
}

/// Maps a recognizable backend conflict message to fixed guidance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictRule {
    /// Case-insensitive substring searched in the backend message.
    pub needle: String,
    /// Message shown to the user instead.
    pub message: String,
}

impl ConflictRule {
    pub fn new(needle: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            needle: needle.into(),
            message: message.into(),
        }
    }
}

/// Turns gateway errors into the message carried by `*DidError` actions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorPolicy {
    pub conflict_rules: Vec<ConflictRule>,
    pub not_found_message: String,
    pub forbidden_message: String,
    pub fallback_message: String,
}

impl Default for ErrorPolicy {
    fn default() -> Self {
        Self {
            conflict_rules: vec![
                ConflictRule::new("email", "This email address is already in use"),
                ConflictRule::new("matricule", "This matricule is already assigned"),
                ConflictRule::new(
                    "active pregnancy",
                    "This patient already has an active pregnancy",
                ),
            ],
            not_found_message: "Resource not found".to_string(),
            forbidden_message: "Insufficient rights".to_string(),
            fallback_message: "Operation failed".to_string(),
        }
    }
}

impl ErrorPolicy {
    /// Add a conflict rule, checked after the existing ones.
    pub fn with_conflict(mut self, needle: impl Into<String>, message: impl Into<String>) -> Self {
        self.conflict_rules.push(ConflictRule::new(needle, message));
        self
    }

    /// Produce the user-facing message for `error`.
    pub fn normalize(&self, error: &ApiError) -> String {
        match error.kind() {
            ErrorKind::NotFound => return self.not_found_message.clone(),
            ErrorKind::Forbidden => return self.forbidden_message.clone(),
            ErrorKind::Conflict => {
                let haystack = error.message.to_lowercase();
                if let Some(rule) = self
                    .conflict_rules
                    .iter()
                    .find(|rule| haystack.contains(&rule.needle.to_lowercase()))
                {
                    return rule.message.clone();
                }
            }
            ErrorKind::Transport | ErrorKind::Server => {}
        }

        let raw = error.message.trim();
        if raw.is_empty() {
            self.fallback_message.clone()
        } else {
            raw.to_string()
        }
    }
}

/// Misuse of the [`StoreRoot`](crate::StoreRoot) registry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("no store registered for entity `{0}`")]
    NotRegistered(&'static str),

    #[error("a store is already registered for entity `{0}`")]
    AlreadyRegistered(&'static str),

    #[error("message `{name}` does not belong to entity `{entity}`")]
    PayloadMismatch {
        entity: &'static str,
        name: &'static str,
    },
}

/// Failure loading a [`RuntimeConfig`](crate::RuntimeConfig).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        assert_eq!(ApiError::transport("refused").kind(), ErrorKind::Transport);
        assert_eq!(ApiError::http(404, "").kind(), ErrorKind::NotFound);
        assert_eq!(ApiError::http(403, "").kind(), ErrorKind::Forbidden);
        assert_eq!(ApiError::http(401, "").kind(), ErrorKind::Forbidden);
        assert_eq!(ApiError::http(409, "").kind(), ErrorKind::Conflict);
        assert_eq!(ApiError::http(400, "").kind(), ErrorKind::Conflict);
        assert_eq!(ApiError::http(500, "").kind(), ErrorKind::Server);
    }

    #[test]
    fn test_normalize_conflicts() {
        let policy = ErrorPolicy::default();
        assert_eq!(
            policy.normalize(&ApiError::http(409, "Email already exists: a@b.c")),
            "This email address is already in use"
        );
        assert_eq!(
            policy.normalize(&ApiError::http(400, "duplicate MATRICULE")),
            "This matricule is already assigned"
        );
        assert_eq!(
            policy.normalize(&ApiError::http(409, "Patient has an active pregnancy")),
            "This patient already has an active pregnancy"
        );
    }

    #[test]
    fn test_normalize_unrecognized_conflict_keeps_backend_message() {
        let policy = ErrorPolicy::default();
        assert_eq!(
            policy.normalize(&ApiError::http(409, "version mismatch")),
            "version mismatch"
        );
    }

    #[test]
    fn test_normalize_fixed_messages() {
        let policy = ErrorPolicy::default();
        assert_eq!(
            policy.normalize(&ApiError::not_found("patient", "p1")),
            "Resource not found"
        );
        assert_eq!(
            policy.normalize(&ApiError::http(403, "denied by role")),
            "Insufficient rights"
        );
    }

    #[test]
    fn test_normalize_fallbacks() {
        let policy = ErrorPolicy::default();
        assert_eq!(
            policy.normalize(&ApiError::transport("connection refused")),
            "connection refused"
        );
        assert_eq!(policy.normalize(&ApiError::http(500, "  ")), "Operation failed");
        assert_eq!(policy.normalize(&ApiError::transport("")), "Operation failed");
    }

    #[test]
    fn test_custom_conflict_rule() {
        let policy = ErrorPolicy::default().with_conflict("code", "Centre code taken");
        assert_eq!(
            policy.normalize(&ApiError::http(409, "Code CTR-1 exists")),
            "Centre code taken"
        );
    }

    #[test]
    fn test_policy_deserializes_partial() {
        let policy: ErrorPolicy =
            serde_json::from_str(r#"{"fallback_message":"Échec"}"#).unwrap();
        assert_eq!(policy.fallback_message, "Échec");
        assert_eq!(policy.conflict_rules.len(), 3);
    }
}

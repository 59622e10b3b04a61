//! Runtime configuration for a [`StoreRoot`](crate::StoreRoot)
//!
//! Everything has a default, so an empty JSON object is a valid config:
//!
//! ```json
//! {
//!   "default_page_size": 25,
//!   "refresh_after_mutation": true,
//!   "notify_on": "CREATE | REMOVE | FAILURE",
//!   "action_log": { "capacity": 200, "filter": { "exclude": ["Select"] } },
//!   "entities": {
//!     "pregnancy": { "label": "Pregnancy", "detail_route": "/grossesses" }
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::effects::NotifyOn;
use crate::entity::DEFAULT_PAGE_SIZE;
use crate::error::{ConfigError, ErrorPolicy};
use crate::log::ActionLogConfig;

/// Success notification templates. `{entity}` is replaced by the label.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub created: String,
    pub updated: String,
    pub removed: String,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            created: "{entity} created".to_string(),
            updated: "{entity} updated".to_string(),
            removed: "{entity} removed".to_string(),
        }
    }
}

impl NotificationConfig {
    pub fn render(template: &str, label: &str) -> String {
        template.replace("{entity}", label)
    }
}

/// Per-entity overrides. Unset fields fall back to [`RuntimeConfig`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EntityConfig {
    pub page_size: Option<usize>,
    /// Display name used in notifications
    pub label: Option<String>,
    /// Route prefix of the detail view, `/{name}s` when unset
    pub detail_route: Option<String>,
    pub refresh_after_mutation: Option<bool>,
    pub navigate_after_save: Option<bool>,
    pub notify_on: Option<NotifyOn>,
    pub notifications: Option<NotificationConfig>,
}

impl EntityConfig {
    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = Some(page_size);
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn detail_route(mut self, route: impl Into<String>) -> Self {
        self.detail_route = Some(route.into());
        self
    }

    pub fn refresh_after_mutation(mut self, refresh: bool) -> Self {
        self.refresh_after_mutation = Some(refresh);
        self
    }

    pub fn navigate_after_save(mut self, navigate: bool) -> Self {
        self.navigate_after_save = Some(navigate);
        self
    }

    pub fn notify_on(mut self, flags: NotifyOn) -> Self {
        self.notify_on = Some(flags);
        self
    }
}

/// Root-wide settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub default_page_size: usize,
    /// Reload the current page after a create or remove instead of
    /// patching the cached one.
    pub refresh_after_mutation: bool,
    /// Navigate to the detail route after a create or update.
    pub navigate_after_save: bool,
    pub notify_on: NotifyOn,
    pub notifications: NotificationConfig,
    pub error_policy: ErrorPolicy,
    /// Keep an in-memory log of dispatched messages
    pub action_log: Option<ActionLogConfig>,
    /// Overrides keyed by entity name
    pub entities: BTreeMap<String, EntityConfig>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            default_page_size: DEFAULT_PAGE_SIZE,
            refresh_after_mutation: false,
            navigate_after_save: true,
            notify_on: NotifyOn::all(),
            notifications: NotificationConfig::default(),
            error_policy: ErrorPolicy::default(),
            action_log: None,
            entities: BTreeMap::new(),
        }
    }
}

impl RuntimeConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.default_page_size = page_size;
        self
    }

    pub fn with_refresh_after_mutation(mut self, refresh: bool) -> Self {
        self.refresh_after_mutation = refresh;
        self
    }

    pub fn with_action_log(mut self, config: ActionLogConfig) -> Self {
        self.action_log = Some(config);
        self
    }

    pub fn with_error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.error_policy = policy;
        self
    }

    pub fn with_entity(mut self, name: impl Into<String>, config: EntityConfig) -> Self {
        self.entities.insert(name.into(), config);
        self
    }

    /// Overrides configured for `name`, empty if none.
    pub fn entity(&self, name: &str) -> EntityConfig {
        self.entities.get(name).cloned().unwrap_or_default()
    }

    /// Merge `overrides` for entity `name` onto the root defaults.
    pub fn resolve(&self, name: &str, overrides: &EntityConfig) -> EntitySettings {
        let page_size = match overrides.page_size {
            Some(0) | None => self.default_page_size,
            Some(size) => size,
        };
        EntitySettings {
            page_size,
            label: overrides.label.clone().unwrap_or_else(|| name.to_string()),
            detail_route: overrides
                .detail_route
                .clone()
                .unwrap_or_else(|| format!("/{name}s")),
            refresh_after_mutation: overrides
                .refresh_after_mutation
                .unwrap_or(self.refresh_after_mutation),
            navigate_after_save: overrides
                .navigate_after_save
                .unwrap_or(self.navigate_after_save),
            notify_on: overrides.notify_on.unwrap_or(self.notify_on),
            notifications: overrides
                .notifications
                .clone()
                .unwrap_or_else(|| self.notifications.clone()),
        }
    }
}

/// Fully resolved settings of one entity store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitySettings {
    pub page_size: usize,
    pub label: String,
    pub detail_route: String,
    pub refresh_after_mutation: bool,
    pub navigate_after_save: bool,
    pub notify_on: NotifyOn,
    pub notifications: NotificationConfig,
}

impl EntitySettings {
    /// Settings of entity `name` under the default [`RuntimeConfig`].
    pub fn for_entity(name: &str) -> Self {
        RuntimeConfig::default().resolve(name, &EntityConfig::default())
    }

    pub fn detail_path(&self, id: &str) -> String {
        format!("{}/{}", self.detail_route.trim_end_matches('/'), id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_json_is_default() {
        assert_eq!(RuntimeConfig::from_json_str("{}").unwrap(), RuntimeConfig::default());
    }

    #[test]
    fn test_from_json_str() {
        let config = RuntimeConfig::from_json_str(
            r#"{
                "default_page_size": 25,
                "refresh_after_mutation": true,
                "notify_on": "CREATE | FAILURE",
                "notifications": { "created": "New {entity} saved" },
                "action_log": { "capacity": 10 },
                "entities": {
                    "pregnancy": { "label": "Pregnancy", "detail_route": "/grossesses/", "page_size": 5 }
                }
            }"#,
        )
        .unwrap();

        assert_eq!(config.default_page_size, 25);
        assert_eq!(config.notify_on, NotifyOn::CREATE | NotifyOn::FAILURE);
        assert_eq!(config.notifications.created, "New {entity} saved");
        assert_eq!(config.notifications.removed, "{entity} removed");
        assert_eq!(config.action_log.as_ref().map(|log| log.capacity), Some(10));
        // Policy untouched by the file keeps its defaults
        assert_eq!(config.error_policy, ErrorPolicy::default());

        let pregnancy = config.resolve("pregnancy", &config.entity("pregnancy"));
        assert_eq!(pregnancy.page_size, 5);
        assert_eq!(pregnancy.label, "Pregnancy");
        assert!(pregnancy.refresh_after_mutation);
        assert_eq!(pregnancy.detail_path("g1"), "/grossesses/g1");

        let centre = config.resolve("centre", &config.entity("centre"));
        assert_eq!(centre.page_size, 25);
        assert_eq!(centre.detail_route, "/centres");
    }

    #[test]
    fn test_invalid_json_is_parse_error() {
        let err = RuntimeConfig::from_json_str(r#"{"default_page_size": "ten"}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = RuntimeConfig::from_json_file("/nonexistent/entity-dispatch.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn test_builder_overrides() {
        let config = RuntimeConfig::default().with_page_size(50).with_entity(
            "user",
            EntityConfig::default()
                .label("User")
                .navigate_after_save(false)
                .notify_on(NotifyOn::FAILURE),
        );
        let user = config.resolve("user", &config.entity("user"));
        assert_eq!(user.page_size, 50);
        assert!(!user.navigate_after_save);
        assert_eq!(user.notify_on, NotifyOn::FAILURE);
        assert_eq!(
            NotificationConfig::render(&user.notifications.updated, &user.label),
            "User updated"
        );
    }
}

//! Action logging with pattern-based filtering and in-memory storage
//!
//! Patterns are matched against the bare action name (`ListDidError`) and
//! against the name qualified by its store (`patient/ListDidError`), so
//! both `*DidError` and `patient/*` work.
//!
//! # Example
//!
//! ```ignore
//! use entity_dispatch::log::{ActionLogConfig, ActionLoggerConfig, ActionLoggerMiddleware};
//!
//! // Tracing only, every failure of every store
//! let middleware = ActionLoggerMiddleware::new(ActionLoggerConfig::new(Some("*DidError"), None));
//!
//! // Also keep the last 50 patient actions in memory
//! let config = ActionLogConfig::new(50, ActionLoggerConfig::new(Some("patient/*"), None));
//! let middleware = ActionLoggerMiddleware::with_log(config);
//!
//! if let Some(log) = middleware.log() {
//!     for entry in log.recent(10) {
//!         println!("{} {}", entry.elapsed_display(), entry.summary);
//!     }
//! }
//! ```

use std::collections::VecDeque;
use std::time::Instant;

use serde::Deserialize;

use crate::action::ActionSummary;
use crate::middleware::Middleware;

/// Include/exclude glob filter for action names.
///
/// - `*` matches any sequence of characters
/// - `?` matches any single character
/// - literal text matches exactly
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ActionLoggerConfig {
    /// If non-empty, only log actions matching these patterns
    #[serde(rename = "include")]
    pub include_patterns: Vec<String>,
    /// Applied after include
    #[serde(rename = "exclude")]
    pub exclude_patterns: Vec<String>,
}

impl ActionLoggerConfig {
    /// Build a filter from comma-separated pattern lists.
    ///
    /// ```
    /// use entity_dispatch_core::log::ActionLoggerConfig;
    ///
    /// let config = ActionLoggerConfig::new(Some("*DidError, patient/*"), Some("Select"));
    /// assert!(config.should_log(Some("centre"), "ListDidError"));
    /// assert!(config.should_log(Some("patient"), "Fetch"));
    /// assert!(!config.should_log(Some("patient"), "Select"));
    /// assert!(!config.should_log(Some("centre"), "Fetch"));
    /// ```
    pub fn new(include: Option<&str>, exclude: Option<&str>) -> Self {
        Self {
            include_patterns: include.map(split_patterns).unwrap_or_default(),
            exclude_patterns: exclude.map(split_patterns).unwrap_or_default(),
        }
    }

    pub fn with_patterns(include: Vec<String>, exclude: Vec<String>) -> Self {
        Self {
            include_patterns: include,
            exclude_patterns: exclude,
        }
    }

    /// Whether an action of `scope` named `name` passes the filter.
    pub fn should_log(&self, scope: Option<&str>, name: &str) -> bool {
        let qualified = scope.map(|scope| format!("{scope}/{name}"));
        let matches = |pattern: &String| {
            glob_match(pattern, name)
                || qualified
                    .as_deref()
                    .is_some_and(|qualified| glob_match(pattern, qualified))
        };

        if !self.include_patterns.is_empty() && !self.include_patterns.iter().any(matches) {
            return false;
        }
        !self.exclude_patterns.iter().any(matches)
    }
}

fn split_patterns(patterns: &str) -> Vec<String> {
    patterns
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(String::from)
        .collect()
}

// ============================================================================
// In-Memory Action Log
// ============================================================================

#[derive(Debug, Clone)]
pub struct ActionLogEntry {
    /// Store the action was addressed to
    pub entity: Option<&'static str>,
    pub name: &'static str,
    pub summary: String,
    pub timestamp: Instant,
    /// Position in the log, counting filtered-in entries only
    pub sequence: u64,
    /// Filled in once the reducer has run
    pub state_changed: Option<bool>,
}

impl ActionLogEntry {
    pub fn new(
        entity: Option<&'static str>,
        name: &'static str,
        summary: String,
        sequence: u64,
    ) -> Self {
        Self {
            entity,
            name,
            summary,
            timestamp: Instant::now(),
            sequence,
            state_changed: None,
        }
    }

    pub fn elapsed(&self) -> std::time::Duration {
        self.timestamp.elapsed()
    }

    /// Elapsed time formatted as "2.3s" or "150ms"
    pub fn elapsed_display(&self) -> String {
        let elapsed = self.elapsed();
        if elapsed.as_secs() >= 1 {
            format!("{:.1}s", elapsed.as_secs_f64())
        } else {
            format!("{}ms", elapsed.as_millis())
        }
    }
}

/// Configuration for the action log ring buffer
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ActionLogConfig {
    /// Maximum number of entries to keep
    pub capacity: usize,
    pub filter: ActionLoggerConfig,
}

impl Default for ActionLogConfig {
    fn default() -> Self {
        Self {
            capacity: 100,
            filter: ActionLoggerConfig::default(),
        }
    }
}

impl ActionLogConfig {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            ..Default::default()
        }
    }

    pub fn new(capacity: usize, filter: ActionLoggerConfig) -> Self {
        Self { capacity, filter }
    }
}

/// Append-only ring buffer of recent actions.
///
/// Older entries are discarded once capacity is reached.
#[derive(Debug, Clone)]
pub struct ActionLog {
    entries: VecDeque<ActionLogEntry>,
    config: ActionLogConfig,
    next_sequence: u64,
}

impl Default for ActionLog {
    fn default() -> Self {
        Self::new(ActionLogConfig::default())
    }
}

impl ActionLog {
    pub fn new(config: ActionLogConfig) -> Self {
        Self {
            entries: VecDeque::with_capacity(config.capacity),
            config,
            next_sequence: 0,
        }
    }

    /// Append `action` if it passes the filter.
    pub fn log<A: ActionSummary>(&mut self, action: &A) -> Option<&ActionLogEntry> {
        let name = action.name();
        let entity = action.scope();
        if self.config.capacity == 0 || !self.config.filter.should_log(entity, name) {
            return None;
        }

        let entry = ActionLogEntry::new(entity, name, action.summary(), self.next_sequence);
        self.next_sequence += 1;

        if self.entries.len() >= self.config.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
        self.entries.back()
    }

    /// Record the reducer result on the newest entry.
    pub fn update_last_state_changed(&mut self, changed: bool) {
        if let Some(entry) = self.entries.back_mut() {
            entry.state_changed = Some(changed);
        }
    }

    /// Oldest first
    pub fn entries(&self) -> impl Iterator<Item = &ActionLogEntry> {
        self.entries.iter()
    }

    /// Newest first
    pub fn recent(&self, count: usize) -> impl Iterator<Item = &ActionLogEntry> {
        self.entries.iter().rev().take(count)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn config(&self) -> &ActionLogConfig {
        &self.config
    }
}

// ============================================================================
// Middleware
// ============================================================================

/// Middleware that logs actions with configurable pattern filtering.
///
/// Logs through `tracing::debug!` and optionally keeps an [`ActionLog`].
#[derive(Debug, Clone)]
pub struct ActionLoggerMiddleware {
    config: ActionLoggerConfig,
    log: Option<ActionLog>,
    /// Whether the action seen in `before` made it into the log
    last_action_logged: bool,
    active: bool,
}

impl ActionLoggerMiddleware {
    /// Tracing only, no in-memory storage
    pub fn new(config: ActionLoggerConfig) -> Self {
        Self {
            config,
            log: None,
            last_action_logged: false,
            active: true,
        }
    }

    pub fn with_log(config: ActionLogConfig) -> Self {
        Self {
            config: config.filter.clone(),
            log: Some(ActionLog::new(config)),
            last_action_logged: false,
            active: true,
        }
    }

    pub fn log_all() -> Self {
        Self::new(ActionLoggerConfig::default())
    }

    /// Turn the middleware into a no-op, e.g. unless `--debug` was passed.
    pub fn active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn log(&self) -> Option<&ActionLog> {
        self.log.as_ref()
    }

    pub fn config(&self) -> &ActionLoggerConfig {
        &self.config
    }
}

impl<A: ActionSummary> Middleware<A> for ActionLoggerMiddleware {
    fn before(&mut self, action: &A) {
        if !self.active {
            return;
        }

        let name = action.name();
        let entity = action.scope();
        if self.config.should_log(entity, name) {
            tracing::debug!(entity = entity.unwrap_or("-"), action = %name, "action");
        }

        self.last_action_logged = false;
        if let Some(log) = self.log.as_mut() {
            self.last_action_logged = log.log(action).is_some();
        }
    }

    fn after(&mut self, _action: &A, state_changed: bool) {
        if !self.active || !self.last_action_logged {
            return;
        }
        if let Some(log) = self.log.as_mut() {
            log.update_last_state_changed(state_changed);
        }
    }
}

/// Glob matching supporting `*` (zero or more chars) and `?` (one char).
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();

    let mut pi = 0;
    let mut ti = 0;
    let mut star_pi = None;
    let mut star_ti = 0;

    while ti < text.len() {
        if pi < pattern.len() && (pattern[pi] == '?' || pattern[pi] == text[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < pattern.len() && pattern[pi] == '*' {
            star_pi = Some(pi);
            star_ti = ti;
            pi += 1;
        } else if let Some(spi) = star_pi {
            // Backtrack: let the last star swallow one more char
            pi = spi + 1;
            star_ti += 1;
            ti = star_ti;
        } else {
            return false;
        }
    }

    while pi < pattern.len() && pattern[pi] == '*' {
        pi += 1;
    }

    pi == pattern.len()
}

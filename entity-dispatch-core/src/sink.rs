//! Fire-and-forget side-effect targets: user notifications and navigation

/// Transient user notifications (toasts, snackbars, status lines).
pub trait Notifier: Send + Sync {
    fn success(&self, message: &str);
    fn error(&self, message: &str);
    fn warning(&self, message: &str);
}

/// Route changes triggered by successful mutations.
pub trait Navigator: Send + Sync {
    fn go_to(&self, path: &str, params: &[(String, String)]);
}

/// Notifier that writes to `tracing`, for headless use.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn success(&self, message: &str) {
        tracing::info!(%message, "notify success");
    }

    fn error(&self, message: &str) {
        tracing::error!(%message, "notify error");
    }

    fn warning(&self, message: &str) {
        tracing::warn!(%message, "notify warning");
    }
}

/// Navigator that only logs the requested route.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNavigator;

impl Navigator for TracingNavigator {
    fn go_to(&self, path: &str, params: &[(String, String)]) {
        tracing::info!(%path, ?params, "navigate");
    }
}

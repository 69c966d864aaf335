use authz_core_types::EngineError;
use tracing::warn;

/// Side channel for engine failures (the host application's error toast).
pub trait ErrorNotifier: Send + Sync {
    fn notify(&self, operation: &'static str, error: &EngineError);
}

/// Reports failures as `warn` events.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingNotifier;

impl ErrorNotifier for TracingNotifier {
    fn notify(&self, operation: &'static str, error: &EngineError) {
        warn!(
            target: "policy-facade",
            operation,
            error = %error,
            "policy engine call failed"
        );
    }
}

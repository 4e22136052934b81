//! Log capture for pipeline tests.
//!
//! The pipeline reports stage transitions at `debug` and degraded
//! collaborators at `warn`. The subscriber installed here routes those events
//! to the test writer so they show up next to a failing assertion. Only the
//! first installation in a process takes effect.

use ctxroute_config::LoggingConfig;
use tracing_subscriber::EnvFilter;

/// Crates whose events follow the configured level. Everything else logs at `warn`.
const PIPELINE_CRATES: [&str; 2] = ["ctxroute_core", "ctxroute_config"];

/// Filter directive giving the pipeline crates `level` and the rest `warn`.
pub fn pipeline_filter(level: &str) -> String {
    let mut directive = String::from("warn");
    for krate in PIPELINE_CRATES {
        directive.push_str(&format!(",{krate}={level}"));
    }
    directive
}

/// Capture pipeline events at `info`, unless `RUST_LOG` says otherwise.
///
/// ```ignore
/// #[tokio::test]
/// async fn degrades_on_timeout() {
///     ctxroute_test_utils::tracing_setup::init_test_tracing();
///     // RUST_LOG=ctxroute_core=debug shows each stage
/// }
/// ```
pub fn init_test_tracing() {
    install(&pipeline_filter("info"));
}

/// Capture pipeline events at the level a loaded config asks for.
///
/// `RUST_LOG` still wins when set.
pub fn init_test_tracing_for(logging: &LoggingConfig) {
    install(&pipeline_filter(&logging.level));
}

fn install(fallback: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_filter_scopes_level_to_workspace_crates() {
        assert_eq!(
            pipeline_filter("debug"),
            "warn,ctxroute_core=debug,ctxroute_config=debug"
        );
        assert!(EnvFilter::try_new(pipeline_filter("trace")).is_ok());
    }
}

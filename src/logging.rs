//! Diagnostic logging to stderr.
//!
//! Stdout is reserved for user-facing status lines, so all `tracing` output
//! goes to stderr. Quiet by default (`warn`); `--verbose` raises docvec's own
//! events to `info`. `RUST_LOG` takes precedence over both:
//!
//! ```bash
//! RUST_LOG=debug docvec ingest ./docs
//! RUST_LOG=docvec::ingest=info,tower_http=debug docvec serve
//! ```

use std::sync::Once;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

static INIT: Once = Once::new();

/// Compact time format: HH:MM:SS.mmm
struct CompactTime;

impl FormatTime for CompactTime {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", chrono::Local::now().format("%H:%M:%S%.3f"))
    }
}

/// Filter directives used when `RUST_LOG` is unset.
pub fn default_directives(verbose: bool) -> &'static str {
    if verbose {
        "warn,docvec=info,tower_http=info"
    } else {
        "warn"
    }
}

/// Install the global subscriber. Only the first call takes effect.
pub fn init(verbose: bool) {
    INIT.call_once(|| {
        let filter = if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            EnvFilter::new(default_directives(verbose))
        };

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_timer(CompactTime)
            .with_level(true)
            .with_filter(filter);

        // Another subscriber may already be installed (e.g. by an embedding
        // application); keep it.
        let _ = tracing_subscriber::registry().with(fmt_layer).try_init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives() {
        assert_eq!(default_directives(false), "warn");
        assert!(default_directives(true).contains("docvec=info"));
        assert!(EnvFilter::try_new(default_directives(true)).is_ok());
    }

    #[test]
    fn test_init_twice_is_harmless() {
        init(false);
        init(true);
    }
}

//! Logging and metrics for the signaling layer.
//!
//! # Privacy by Default
//!
//! Actor loops and negotiation use `#[instrument(skip_all)]` with an
//! explicit field allow-list. ICE passwords and offer bodies are never
//! logged; room and user ids appear in log fields but never as metric
//! labels.
//!
//! # Log targets
//!
//! | Target | Emitted by |
//! |--------|------------|
//! | `rtc.actor.registry` | room registry actor |
//! | `rtc.actor.room` | room actors |
//! | `rtc.actor.mailbox` | mailbox depth monitor |
//! | `rtc.negotiation` | offer/answer engine |
//! | `rtc.channel` | client notification channel |
//! | `rtc.delegate` | startup and shutdown |

pub mod metrics;

pub use metrics::init_metrics_recorder;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "rtc_signaling=debug";

/// Install the global tracing subscriber.
///
/// # Errors
///
/// Returns error if a global subscriber is already installed.
pub fn init_tracing(json: bool) -> Result<(), String> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());

    let registry = tracing_subscriber::registry().with(filter);
    let result = if json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };

    result.map_err(|e| format!("Failed to install tracing subscriber: {e}"))
}

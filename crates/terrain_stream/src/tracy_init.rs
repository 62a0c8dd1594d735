//! Tracy profiler hookup, enabled by the `tracy` feature.

use tracing_subscriber::layer::SubscriberExt;

/// Routes `tracing` spans to Tracy.
///
/// Call once at startup, before the controller is created.
pub fn init_tracy() {
  let subscriber = tracing_subscriber::registry().with(tracing_tracy::TracyLayer::default());
  if tracing::subscriber::set_global_default(subscriber).is_err() {
    log::warn!("A global tracing subscriber is already set, Tracy not attached");
  }
}

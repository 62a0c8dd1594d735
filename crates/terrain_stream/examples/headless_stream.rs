//! Headless streaming demo.
//!
//! Walks a center along a straight line and prints how the resident set
//! follows it. Reads `streaming.toml` from the working directory if present.
//!
//! ```sh
//! RUST_LOG=terrain_stream=debug cargo run --example headless_stream
//! ```

use std::path::Path;
use std::time::Duration;

use glam::Vec3;
use terrain_stream::{LocalEngineBuilder, StreamingConfig, StreamingController};

const STEPS: usize = 40;
const STEP: Vec3 = Vec3::new(12.0, 0.0, 4.0);

fn main() -> Result<(), Box<dyn std::error::Error>> {
  env_logger::init();

  #[cfg(feature = "tracy")]
  terrain_stream::init_tracy();

  let config = StreamingConfig::load_or_default(Path::new("streaming.toml"));
  let builder = LocalEngineBuilder::from_config(&config);
  let mut controller = StreamingController::from_config(builder, Vec3::ZERO, &config)?;

  let mut center = Vec3::ZERO;
  for step in 0..STEPS {
    center += STEP;
    let report = controller.tick(center)?;
    println!(
      "step {step:>2} center {center:.1}: loaded {:>5}/{:<5} pending {:>5} +{} -{}",
      controller.loaded_count(),
      controller.capacity(),
      controller.pending_count(),
      report.installed,
      report.unloaded,
    );
    std::thread::sleep(Duration::from_millis(16));
  }

  let stats = *controller.stats();
  controller.shutdown()?;
  println!(
    "installed {} unloaded {} stale {} recenters {}",
    stats.installed,
    stats.unloaded,
    stats.stale_total(),
    stats.recenters
  );
  Ok(())
}

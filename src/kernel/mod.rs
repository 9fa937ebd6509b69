// Power state machine, frame pacing, shutdown sequence, health file.
// Nothing in here touches hardware directly: collaborators come in
// as traits and time comes in as `Instant`.

pub mod health;
pub mod pacing;
pub mod power;
pub mod shutdown;

pub use health::{HealthSnapshot, HealthWriter};
pub use pacing::FramePacer;
pub use power::{PowerManager, PowerState, PowerTimings};
pub use shutdown::{ShutdownPlan, ShutdownReport, ShutdownSteps};

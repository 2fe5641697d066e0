/// Start-to-stop batch simulation.
pub mod batch;
/// Fixed-step simulation clock.
pub mod clock;

/// CSV export of batch simulation results.
pub mod export;

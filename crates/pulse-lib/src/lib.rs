pub mod acquire;
pub mod config;
pub mod detectors;
pub mod error;
pub mod io;
pub mod metrics;
pub mod monitor;
pub mod plot;
pub mod signal;
pub mod simulate;

pub use acquire::*;
pub use detectors::*;
pub use metrics::*;
pub use signal::*;

pub mod clean;
pub mod preprocess;
pub mod reconcile;

pub use clean::{clean, CleanReport};
pub use preprocess::{preamble, run_cgo};
pub use reconcile::{reconcile, ReconcileReport};

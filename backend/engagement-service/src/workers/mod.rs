pub mod reconcile;

pub use reconcile::{ReconcileStats, Reconciler};

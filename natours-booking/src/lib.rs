pub mod checkout;
pub mod reconcile;
pub mod references;

pub use checkout::{CheckoutService, CheckoutSettings};
pub use reconcile::{BookingReconciler, ReconcileOutcome};
pub use references::ensure_booking_references;

#[cfg(test)]
pub(crate) mod testing;

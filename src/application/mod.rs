pub mod batch;
pub mod bridge;
pub mod ledger;
pub mod lifecycle;

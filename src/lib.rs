#[macro_use]
extern crate diesel;

pub mod schema;
pub mod types;
pub mod db;
pub mod installment;
pub mod loan;
pub mod payment;
pub mod idempotency;
pub mod billing;

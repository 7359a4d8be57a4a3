//! School-fee payment portal backend.
//!
//! Creates collect requests against the payment aggregator, keeps the paired
//! order / order-status records, reconciles settlement callbacks and serves the
//! joined transaction views used by the staff dashboard.

pub mod api;
pub mod config;
pub mod database;
pub mod error;
pub mod health;
pub mod logging;
pub mod middleware;
pub mod payments;
pub mod services;

//! ChroniCare: medication adherence tracking and reminders for patients
//! with chronic conditions.
//!
//! The domain model lives in [`care`], backed by the in-memory stores in
//! [`storage`]. [`service`] holds the operations the HTTP layer in [`api`]
//! exposes.

pub mod api;
pub mod care;
pub mod config;
pub mod error;
pub mod seed;
pub mod service;
pub mod storage;

//! Boleta issuance and daily summary submission service.
//!
//! Exposes the receipt form and the two-phase daily summary as HTTP form
//! sessions on top of a third-party billing API, a relational store and an
//! artifact store for receipt PDFs.

pub mod config;
pub mod dtos;
pub mod error;
pub mod handlers;
pub mod models;
pub mod services;
pub mod startup;
pub mod tax;
pub mod workflows;

pub use error::InvoicingError;

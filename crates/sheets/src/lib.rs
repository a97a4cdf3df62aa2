//! Spreadsheet and credential collaborators.
//!
//! This crate provides:
//! - `Authorizer` trait and the Google OAuth2 installed-app implementation
//! - `SheetSource` trait and the Google Sheets v4 values client

pub mod auth;
pub mod client;
pub mod error;

pub use auth::{Authorizer, Credential, GoogleAuthorizer};
pub use client::{GoogleSheetsClient, SheetSource};
pub use error::SheetsError;

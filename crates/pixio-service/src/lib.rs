//! Pixio HTTP API Service.
//!
//! This crate provides the HTTP API behind the Pixio image tool suite:
//!
//! - Registration, login and balance
//! - Razorpay credit purchases
//! - Email verification codes
//! - Metered ClipDrop image tools
//! - Dashboard history and aggregates
//!
//! # Authentication
//!
//! Protected routes take an HS256 session token issued at login, presented
//! as a bearer token, a `token` header or a `token` field in a JSON body.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Allow some pedantic lints that are noisy for Axum handler functions
#![allow(clippy::missing_errors_doc)] // Axum handlers all return Result
#![allow(clippy::unused_async)] // Handlers stay async for a uniform signature

pub mod auth;
pub mod clipdrop;
pub mod config;
pub mod crypto;
pub mod error;
pub mod handlers;
pub mod mail;
pub mod razorpay;
pub mod routes;
pub mod state;
pub mod workflows;

pub use auth::{AuthUser, TokenIssuer};
pub use clipdrop::{ClipdropClient, ImageOutput, ImageProvider, ImageRequest, ImageUpload};
pub use config::ServiceConfig;
pub use error::ApiError;
pub use mail::{HttpMailer, LogMailer, MailMessage, Mailer};
pub use razorpay::{PaymentGateway, RazorpayClient, RazorpayError};
pub use routes::create_router;
pub use state::{AppState, Collaborators};

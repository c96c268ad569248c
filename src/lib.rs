//! Mini Mailer reads a message, completes its headers and submits it over
//! SMTP through a local SOCKS5 proxy.
//!
//! The work is split in two steps run one after the other:
//!
//! * [`message::compose`] turns raw input into a [`message::PreparedMessage`]
//! * [`delivery::deliver`] sends it in one SMTP session

#![deny(
    missing_copy_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code,
    unstable_features,
    unused_import_braces,
    missing_debug_implementations,
    clippy::unwrap_used
)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod authentication;
mod codec;
pub mod commands;
pub mod config;
pub mod delivery;
pub mod error;
pub mod extension;
pub mod message;
pub mod mock;
pub mod net;
pub mod response;
mod runtime;
mod smtp_client;
mod stream;
mod types;

pub use crate::delivery::{deliver, DeliveryError, DeliveryTarget, Dialer, Socks5Dialer};
pub use crate::message::{compose, BuildOptions, MessageError, PreparedMessage};
pub use crate::smtp_client::{SmtpClient, SmtpTransport};
pub use crate::stream::{DataWriter, SmtpStream};
pub use crate::types::*;

/// Any reason a submission did not go through
#[derive(thiserror::Error, Debug)]
pub enum SubmitError {
    #[error(transparent)]
    Message(#[from] MessageError),
    #[error(transparent)]
    Delivery(#[from] DeliveryError),
}

/// Composes `input` and delivers it.
///
/// Input errors are reported before any connection is attempted.
pub async fn submit<D: Dialer>(
    input: &str,
    options: BuildOptions,
    target: &DeliveryTarget,
    dialer: &D,
) -> Result<PreparedMessage, SubmitError> {
    let prepared = compose(input, options)?;
    deliver(&prepared, target, dialer).await?;
    Ok(prepared)
}

#![deny(missing_docs)]
#![deny(unreachable_pub)]

//! # Hubdash API Utils
//!
//! Transport layer shared by the Hubdash dashboard crates: request
//! descriptions, response envelopes, the sender abstraction and its
//! reqwest-based implementation, and the credential seam used to attach
//! bearer tokens at call time.

/// Error type.
pub mod error;

/// Request descriptions.
pub mod request;

/// Response envelopes.
pub mod response;

/// Credential seam.
pub mod credentials;

/// Streamed-response utilities.
pub mod stream;

/// Sender abstraction.
pub mod sender;

pub use crate::{
    credentials::{CredentialStore, StaticCredentials},
    error::Error,
    request::ApiRequest,
    response::{ApiResponse, Paged, Pagination},
    sender::{ApiSender, ApiSenderExt, ApiTransportStats, HttpSender, HttpSenderConfig},
    stream::{ChunkEnvelope, LineBuffer, StatusEnvelope, StreamEnvelope, StreamStatus},
};

/// Result type.
pub type Result<T> = std::result::Result<T, Error>;

cfg_if::cfg_if! {
    if #[cfg(target_arch = "wasm32")] {
        /// Marker for values shared with the async runtime.
        ///
        /// The dashboard runs on a single-threaded event loop in the
        /// browser, so no `Send + Sync` bound is required there.
        pub trait MaybeSendSync {}
        impl<T> MaybeSendSync for T {}
    } else {
        /// Marker for values shared with the async runtime.
        pub trait MaybeSendSync: Send + Sync {}
        impl<T: Send + Sync> MaybeSendSync for T {}
    }
}

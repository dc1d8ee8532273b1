#![deny(missing_docs)]
#![deny(unreachable_pub)]

//! # Hubdash SDK
//!
//! Data layer for the Hubdash admin dashboard. Owns the client-side
//! participant store, the paginated and streaming loaders that fill it,
//! and the per-record operations the dashboard screens call.

/// Error type.
pub mod error;

/// API data types.
pub mod types;

/// Client-side participant store.
pub mod store;

/// Dashboard API client.
pub mod client;

/// JS bindings.
#[cfg(js)]
pub mod js;

pub use crate::{
    client::{
        ops::ParticipantOps, Client, ClientOptions, FetchConfig, FetchOptions, FetchOutcome,
        FetchReport, StreamProgress, StreamQuery,
    },
    error::Error,
    store::{LoadError, ParticipantStore, StoreConfig, StoreSnapshot},
    types::{Participant, VettingStatus},
};

/// Result type.
pub type Result<T> = std::result::Result<T, Error>;

pub use hubdash_api_utils as api_utils;

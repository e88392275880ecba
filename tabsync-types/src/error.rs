//! Error types for tabsync records.

use thiserror::Error;

/// Errors that can occur while encoding or decoding session records.
#[derive(Debug, Error)]
pub enum SpecificsError {
    /// MessagePack serialization failed
    #[error("serialization failed: {0}")]
    Serialization(#[source] rmp_serde::encode::Error),

    /// MessagePack deserialization failed
    #[error("deserialization failed: {0}")]
    Deserialization(#[source] rmp_serde::decode::Error),

    /// The record carries neither a header nor a tab payload
    #[error("record for session {session_tag} has neither header nor tab data")]
    MissingPayload {
        /// Session tag attached to the record.
        session_tag: String,
    },
}

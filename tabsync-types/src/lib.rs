//! # tabsync-types
//!
//! Record types for the tabsync session synchronization engine.
//!
//! This crate provides the foundational types used across all tabsync crates:
//! - [`NodeId`], [`TabId`], [`WindowId`] - Identity types
//! - [`SessionSpecifics`] - The payload stored in one sync node (header or tab)
//! - [`PageTransition`], [`TransitionQualifier`], [`DeviceType`] - Record enums
//! - [`SpecificsError`] - Error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod ids;
mod specifics;

pub use error::SpecificsError;
pub use ids::{NodeId, TabId, WindowId};
pub use specifics::{
    BrowserType, DeviceType, FaviconType, NavigationSpecifics, PageTransition, SessionHeader,
    SessionSpecifics, SpecificsBody, TabSpecifics, TransitionQualifier, WindowSpecifics,
};

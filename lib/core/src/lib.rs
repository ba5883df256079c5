//! Core domain types for the tollgate authentication gateway.
//!
//! This crate provides the identity and authorization-tier types shared by
//! the token, session, and authorization layers, plus the workspace-wide
//! `Result` alias.

pub mod error;
pub mod identity;
pub mod policy;
pub mod tier;

pub use error::Result;
pub use identity::Identity;
pub use policy::HttpPolicy;
pub use tier::{ParseTierError, Tier};

//! `OpenID` Relying Party Module
//!
//! Discovers the providers behind a user-supplied identifier, builds one
//! authentication request per distinct provider host, verifies the replies
//! and correlates the first positive one back to the page that is waiting
//! for it.
//!
//! Provides the `OpenIdRpClient` trait implementation handed to the host by
//! [`module::OpenIdRpModule::init`].
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod config;
pub mod domain;
pub mod module;

pub use config::OpenIdRpConfig;
pub use module::OpenIdRpModule;

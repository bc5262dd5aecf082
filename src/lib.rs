//! Upstream package mirroring for NuGet feeds.
//!
//! [`options`] describes which feeds to mirror, [`upstream`] talks to them,
//! and [`types`] holds the package model both sides share.

pub mod options;
pub mod types;
pub mod upstream;

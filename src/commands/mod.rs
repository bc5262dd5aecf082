//! CLI command implementations.

mod config;
mod download;
mod packages;
mod versions;

pub use config::ConfigCmd;
pub use download::DownloadCmd;
pub use packages::PackagesCmd;
pub use versions::VersionsCmd;

use std::path::Path;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::warn;
use upstream_mirror::options::MirrorOptions;
use upstream_mirror::upstream::Upstream;

/// Load the mirror config and build the upstream it describes.
fn connect(config: Option<&Path>) -> Result<Upstream> {
    let options = MirrorOptions::load(config)?;
    let upstream = Upstream::from_options(&options).context("Invalid mirror configuration")?;

    if !upstream.is_enabled() {
        warn!("mirroring is disabled, upstream feeds will not be queried");
    }
    Ok(upstream)
}

/// Token cancelled when the user presses Ctrl-C.
fn interrupt_token() -> CancellationToken {
    let token = CancellationToken::new();
    let on_interrupt = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling upstream requests");
            on_interrupt.cancel();
        }
    });
    token
}

//! Config command - inspect the mirror configuration.

use std::path::Path;

use anyhow::{Result, bail};
use clap::{Args, Subcommand};
use upstream_mirror::options::MirrorOptions;

#[derive(Args)]
pub struct ConfigCmd {
    #[command(subcommand)]
    pub command: ConfigSubCmd,
}

#[derive(Subcommand)]
pub enum ConfigSubCmd {
    /// Show the effective configuration
    Show,

    /// Check the configuration and report every problem
    Validate,
}

impl ConfigCmd {
    pub fn run(&self, config: Option<&Path>) -> Result<()> {
        let options = MirrorOptions::load(config)?;

        match &self.command {
            ConfigSubCmd::Show => {
                match config {
                    Some(path) => println!("Config: {}", path.display()),
                    None => println!("Config: {}", MirrorOptions::config_path()?.display()),
                }
                println!();
                println!("enabled:    {}", options.enabled);
                println!("timeout:    {}s", options.package_download_timeout_seconds);
                if options.sources().is_empty() {
                    println!("sources:    (none)");
                }
                for source in options.sources() {
                    let url = source
                        .package_source
                        .as_ref()
                        .map_or("(missing)", |url| url.as_str());
                    println!("source:     {} ({})", url, source.dialect());
                }
            }
            ConfigSubCmd::Validate => {
                let errors = options.validate();
                if !errors.is_empty() {
                    for error in &errors {
                        eprintln!("  {}", error);
                    }
                    bail!("{} configuration error(s)", errors.len());
                }
                println!("Configuration is valid.");
            }
        }
        Ok(())
    }
}

//! config command - Show or save the effective configuration

use std::process::ExitCode;

use anyhow::{Context as _, Result};

use crate::cli::Context;
use crate::core::config::{self, Config};

/// Print the effective configuration as TOML; with `write`, save it.
///
/// The `--store` override is reflected in the output.
pub fn config(ctx: &Context, write: bool) -> Result<ExitCode> {
    let mut effective = ctx.config.effective();
    if let Some(store) = effective.store.as_mut() {
        store.url = Some(ctx.store_url.clone());
    }

    if write {
        let path = match &ctx.config_path {
            Some(path) => path.clone(),
            None => Config::global_config_path()?,
        };
        Config::write_to(&path, &effective)
            .with_context(|| format!("Failed to write config to '{}'", path.display()))?;
        if !ctx.quiet {
            println!("Wrote {}", path.display());
        }
        return Ok(ExitCode::SUCCESS);
    }

    if let (Some(path), false) = (ctx.config.loaded_from(), ctx.quiet) {
        println!("# loaded from {}", path.display());
    }
    print!("{}", config::to_toml(&effective)?);
    Ok(ExitCode::SUCCESS)
}

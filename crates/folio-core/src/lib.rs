pub mod activity;
pub mod calendar;
pub mod cli;
pub mod codeforces;
pub mod commands;
pub mod config;
pub mod datetime;
pub mod markdown;
pub mod render;
pub mod site;
pub mod stats;

use std::ffi::OsString;
use std::io::{
  self,
  Write
};

use anyhow::Context;
use clap::Parser;
use tracing::{
  debug,
  info
};

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let pre =
    cli::preprocess_args(&raw_args)?;
  let cli = cli::GlobalCli::parse_from(
    pre.cleaned_args
  );

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting folio"
  );
  debug!(?pre.rc_overrides, "preprocessed rc overrides");

  let mut cfg = config::Config::load(
    cli.foliorc.as_deref()
  )?;
  cfg.apply_overrides(
    pre.rc_overrides.into_iter().chain(
      cli
        .rc_overrides
        .into_iter()
        .map(|kv| (kv.key, kv.value))
    )
  );

  let site_dir =
    config::resolve_site_dir(
      &cfg,
      cli.site.as_deref()
    );
  let site = site::Site::new(&site_dir);

  let renderer =
    render::Renderer::new(&cfg);
  let client =
    codeforces::CodeforcesClient::from_config(
      &cfg
    )
    .context(
      "failed to set up codeforces \
       client"
    )?;
  let inv = cli::Invocation::parse(
    &cfg, cli.rest
  )?;

  let stdout = io::stdout();
  let mut out = stdout.lock();
  commands::dispatch(
    &site, &cfg, &renderer, &client,
    inv, &mut out
  )?;
  out.flush()?;

  info!("done");
  Ok(())
}

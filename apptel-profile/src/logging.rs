// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use anyhow::Context;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter, in `RUST_LOG` syntax.
pub const ENV_LOG: &str = "APPTEL_LOG";

/// Installs a global stderr subscriber filtered by [`ENV_LOG`], `warn` when
/// unset.
///
/// Fails if the filter does not parse or a global subscriber is already set.
pub fn init_from_env() -> anyhow::Result<()> {
    let filter = EnvFilter::builder()
        .with_env_var(ENV_LOG)
        .with_default_directive(LevelFilter::WARN.into())
        .from_env()
        .with_context(|| format!("invalid {ENV_LOG} filter"))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_ansi(false)
        .try_init()
        .map_err(|err| anyhow::anyhow!(err))
        .context("could not install the global subscriber")
}

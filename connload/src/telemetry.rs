use std::io::IsTerminal as _;

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Installs the global subscriber writing to stderr.
///
/// INFO by default, DEBUG when `verbose`. `RUST_LOG` directives take precedence.
pub fn init_tracing(verbose: bool) -> anyhow::Result<()> {
    let directive = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    tracing_subscriber::fmt()
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr)
        .with_thread_names(true)
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(directive.into())
                .from_env_lossy(),
        )
        .try_init()
        .map_err(|err| anyhow::anyhow!(err))?;
    Ok(())
}

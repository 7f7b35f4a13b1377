//! Tracing setup. Logs always go to stderr so stdout stays a clean
//! message channel.

use anyhow::Result;
use tracing_subscriber::EnvFilter;

/// Default directives, extended by `RUST_LOG`.
const DEFAULT_DIRECTIVES: &[&str] = &["squigscan=info", "squigscan_host=info"];

pub fn init_tracing(json: bool) -> Result<()> {
    let mut filter = EnvFilter::from_default_env();
    for directive in DEFAULT_DIRECTIVES {
        filter = filter.add_directive(directive.parse()?);
    }

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

//! shop binary entry point.

use std::process::ExitCode;

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use shopcli::cli::{self, Cli};
use shopcli::ui::output;

fn main() -> ExitCode {
    let cli = Cli::parse_args();
    init_logging(cli.global.debug);

    match cli::run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            output::error(format!("{:#}", err));
            ExitCode::FAILURE
        }
    }
}

/// Log to stderr, filtered by `RUST_LOG`. `--debug` turns on this crate's
/// debug events when `RUST_LOG` is unset.
fn init_logging(debug: bool) {
    let env_filter = if debug && std::env::var_os(EnvFilter::DEFAULT_ENV).is_none() {
        EnvFilter::new("shopcli=debug")
    } else {
        EnvFilter::builder()
            .with_default_directive(LevelFilter::WARN.into())
            .from_env_lossy()
    };

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .compact()
                .with_target(debug)
                .with_writer(std::io::stderr),
        )
        .try_init();
}

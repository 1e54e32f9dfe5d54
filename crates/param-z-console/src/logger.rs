use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Logs go to stderr so stdout stays a clean value stream.
pub fn init_logger(json_mode: bool, debug: bool) {
    let filter = if debug {
        EnvFilter::new("param_z=debug,param_z_console=debug,zenoh=debug")
    } else {
        EnvFilter::new("param_z=info,param_z_console=info,zenoh=warn")
    };

    if json_mode {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_target(false)
                    .with_current_span(false)
                    .with_writer(std::io::stderr)
                    .with_ansi(false),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .init();
    }
}

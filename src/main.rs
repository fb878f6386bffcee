//! Manitest CLI binary.

use manitest::errors::print_error;

fn main() {
    // Logs go to stderr so they never interleave with the report on stdout.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = manitest::cli::run() {
        let code = e.exit_code();
        print_error(e);
        std::process::exit(code);
    }
}

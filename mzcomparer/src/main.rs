use std::fs;
use std::io;
use std::path::Path;

use clap::Parser;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use mzcomparer::{MZComparer, MZComparerError};

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn make_env_filter() -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(tracing::Level::INFO.into())
        .from_env_lossy()
}

/// Log to STDERR, and to `log_file` as well if one is given. The returned guard
/// must be held until logging is done so the file writer can flush.
fn configure_log(log_file: Option<&Path>) -> io::Result<Option<WorkerGuard>> {
    let stderr_layer = fmt::layer()
        .compact()
        .with_timer(fmt::time::ChronoLocal::rfc_3339())
        .with_writer(io::stderr)
        .with_filter(make_env_filter());

    match log_file {
        Some(path) => {
            let (writer, guard) = tracing_appender::non_blocking(fs::File::create(path)?);
            let file_layer = fmt::layer()
                .compact()
                .with_ansi(false)
                .with_timer(fmt::time::ChronoLocal::rfc_3339())
                .with_writer(writer)
                .with_filter(make_env_filter());
            tracing_subscriber::registry()
                .with(stderr_layer)
                .with(file_layer)
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry().with(stderr_layer).init();
            Ok(None)
        }
    }
}

/// Layer `mzcomparer.toml`, the `--config-file` and `MZCOMPARER_` environment
/// variables over the parsed command line
fn load_configuration(args: MZComparer) -> Result<MZComparer, MZComparerError> {
    let mut config =
        Figment::from(Serialized::defaults(&args)).merge(Toml::file("mzcomparer.toml"));
    if let Some(path) = args.config_file.as_ref() {
        config = config.merge(Toml::file_exact(path));
    }
    config = config.merge(Env::prefixed("MZCOMPARER_").split("__"));
    Ok(config.extract()?)
}

fn main() -> Result<(), MZComparerError> {
    let args = load_configuration(MZComparer::parse())?;
    let _guard = configure_log(args.log_file.as_deref())?;
    args.main()?;
    Ok(())
}

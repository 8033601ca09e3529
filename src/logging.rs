use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub fn setup_tracing(verbosity_level: u8, json_output: bool) {
    let filter = match verbosity_level {
        0 => tracing::level_filters::LevelFilter::INFO,
        1 => tracing::level_filters::LevelFilter::DEBUG,
        2 => tracing::level_filters::LevelFilter::TRACE,
        _ => tracing::level_filters::LevelFilter::TRACE,
    };

    let env_filter = EnvFilter::builder()
        .with_default_directive(filter.into())
        .from_env_lossy();

    let registry = tracing_subscriber::registry().with(env_filter);

    if json_output {
        let json_writer = fmt::Layer::default()
            .json()
            .with_thread_names(true)
            .with_writer(std::io::stderr);
        registry.with(json_writer).init();
    } else {
        let stderr_writer = fmt::Layer::default()
            .with_thread_names(true)
            .with_writer(std::io::stderr);
        registry.with(stderr_writer).init();
    }
}

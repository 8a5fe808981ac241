pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_target(true)
        .with_thread_ids(false)
        .with_level(true)
        .with_max_level(tracing::Level::INFO)
        .with_ansi(true)
        .init();
}

/// Initialize logging to stderr.
///
/// `RUST_LOG` wins when set; otherwise the filter is `info`, or `debug` with
/// `verbose`.
pub fn init(verbose: bool) -> anyhow::Result<()> {
    let default_filter = if verbose { "debug" } else { "info" };
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter));

    builder
        .target(env_logger::Target::Stderr)
        .format_timestamp(None)
        .format_target(false);

    builder
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize logger: {}", e))
}

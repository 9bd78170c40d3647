use env_logger::Env;

/// Installs the global logger. `RUST_LOG` overrides the default `info` filter.
pub fn init_logging() {
  let _ = env_logger::Builder::from_env(Env::default().default_filter_or("info"))
    .format_timestamp_millis()
    .format_module_path(false)
    .try_init();
}

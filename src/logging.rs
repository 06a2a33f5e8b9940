//! Thin wrapper around `env_logger` so every entry point initializes logging
//! the same way, honoring `RUST_LOG` with a sane default.

pub fn init() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}

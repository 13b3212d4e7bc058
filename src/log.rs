use env_logger::Builder;
use std::io::Write;

/// Installs an `env_logger` subscriber. Safe to call more than once from
/// tests if wrapped in `std::sync::Once`; `env_logger`'s own `try_init`
/// semantics mean a second raw call would otherwise panic.
pub fn init_log() {
    let mut builder = Builder::from_default_env();
    builder
        .format_timestamp_secs()
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} - {}] [{}:{}] {}",
                record.level(),
                record.target(),
                record.file().unwrap(),
                record.line().unwrap(),
                record.args()
            )
        })
        .init();
}

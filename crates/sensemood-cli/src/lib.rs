//! Shared pieces of the SenseMood command-line tools

pub mod output;
pub mod scan;

/// Initialize logging: Info when verbose, otherwise silent so stdout stays clean JSON
pub fn init_logging(verbose: bool) {
    let level = if verbose {
        log::LevelFilter::Info
    } else {
        log::LevelFilter::Off
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();
}

use std::fs::OpenOptions;
use std::path::Path;

use simplelog::{
    ColorChoice, CombinedLogger, ConfigBuilder, LevelFilter, SharedLogger, TermLogger,
    TerminalMode, WriteLogger,
};

fn level_for(debug_enabled: bool) -> LevelFilter {
    if debug_enabled {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    }
}

/// Log to the terminal, and additionally append to `log_file` when given.
///
/// Only records from the rebundle crates pass the filter. Calling this more
/// than once is harmless; later calls are ignored.
pub fn init_logging(debug_enabled: bool, log_file: Option<&Path>) {
    let level = level_for(debug_enabled);
    let config = ConfigBuilder::new()
        .set_time_format_rfc3339()
        .add_filter_allow_str("rebundle")
        .build();

    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        level,
        config.clone(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )];

    if let Some(path) = log_file {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            let _ = std::fs::create_dir_all(parent);
        }
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => loggers.push(WriteLogger::new(level, config, file)),
            Err(error) => eprintln!("Could not open log file {}: {error}", path.display()),
        }
    }

    let _ = CombinedLogger::init(loggers);

    if debug_enabled {
        log::debug!("Debug logging enabled");
    }
}

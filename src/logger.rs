use std::fmt::Display;
use std::fs::OpenOptions;

use simplelog::{ColorChoice, LevelFilter, TerminalMode, TermLogger, WriteLogger};

use crate::config::LogSettings;
use crate::utils::ErrorStr;


pub fn init_logger(cfg: &LogSettings) {
    let level = cfg.level.parse::<LevelFilter>().unwrap_or_else(|_| {
        eprintln!("Unsupported log level: {}, use `info` by default", cfg.level);
        LevelFilter::Info
    });

    match cfg.kind.as_str() {
        "console" => init_term_logger(level),
        "file"    => init_file_logger(level, &cfg.file),
        _         => {
            eprintln!(
                "Unsupported log type: {}, only `file` and `console` are supported. Use `console` by default",
                cfg.kind
            );
            init_term_logger(level);
        }
    };
}

/// Builds a closure that logs the detailed error where it happened and
/// maps it to a stable error code for propagation.
pub fn get_reporter<E: Display>(module: &'static str, scope: &'static str, code: ErrorStr) -> impl Fn(E) -> ErrorStr {
    move |e: E| {
        error!("[{}] {} error: {}", module, scope, e);
        code
    }
}


fn prepare_logger_config() -> simplelog::Config {
    simplelog::ConfigBuilder::new().set_time_format_custom(
        simplelog::format_description!(
            "[year]-[month]-[day]T[hour]:[minute]:[second][offset_hour sign:mandatory]:[offset_minute]"
        )
    ).set_time_offset_to_local().unwrap().build()
}

fn init_term_logger(level: LevelFilter) {
    TermLogger::init(
        level,
        prepare_logger_config(),
        TerminalMode::Stderr, ColorChoice::Auto
    ).unwrap();
}

fn init_file_logger(level: LevelFilter, filename: &String) {
    WriteLogger::init(
        level,
        prepare_logger_config(),
        OpenOptions::new().write(true).create(true).append(true).open(filename).unwrap()
    ).unwrap()
}

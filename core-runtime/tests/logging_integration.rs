//! Integration tests for logging system

use bridge_traits::time::LogLevel;
use core_runtime::logging::{init_logging, strip_path, LogFormat, LoggingConfig};

#[test]
fn test_format_selection() {
    #[cfg(debug_assertions)]
    assert_eq!(LoggingConfig::default().format, LogFormat::Pretty);

    #[cfg(not(debug_assertions))]
    assert_eq!(LoggingConfig::default().format, LogFormat::Json);
}

#[test]
fn test_config_chaining() {
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Warn)
        .with_spans(false)
        .with_target(false)
        .with_thread_info(true);

    assert_eq!(config.format, LogFormat::Compact);
    assert_eq!(config.level, LogLevel::Warn);
    assert!(!config.enable_spans);
    assert!(!config.display_target);
    assert!(config.display_thread_info);
}

#[test]
fn test_media_paths_are_reduced_to_basenames() {
    assert_eq!(strip_path("/storage/emulated/0/Movies/Trip/day1.mp4"), "day1.mp4");
    assert_eq!(strip_path("file:///sdcard/DCIM/Camera/VID_0001.mp4"), "VID_0001.mp4");
    assert_eq!(strip_path("D:\\Videos\\clip.mkv"), "clip.mkv");
    assert_eq!(strip_path(""), "");
}

// Only one global subscriber may be installed per process, so the second
// call must fail instead of silently replacing the first.
#[test]
fn test_init_logging_only_once() {
    let first = init_logging(LoggingConfig::default().with_format(LogFormat::Compact));
    assert!(first.is_ok());

    let second = init_logging(LoggingConfig::default());
    assert!(second.is_err());
}

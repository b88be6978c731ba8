use std::path::PathBuf;
use std::sync::OnceLock;

static EXE_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Returns the directory containing the executable.
pub fn get_exe_dir() -> &'static PathBuf {
    EXE_DIR.get_or_init(|| {
        std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
            .unwrap_or_else(|| PathBuf::from("."))
    })
}

/// Returns the logs directory: `<exe_dir>/logs/`
pub fn get_logs_dir() -> PathBuf {
    get_exe_dir().join("logs")
}

/// Returns the log file: `<exe_dir>/logs/hi3_scanner.log`
pub fn get_log_file() -> PathBuf {
    get_logs_dir().join("hi3_scanner.log")
}

/// Ensures the log directory exists. Call at startup.
///
/// Snapshot directories are created on first write, since their location
/// comes from configuration.
pub fn ensure_directories() -> std::io::Result<()> {
    std::fs::create_dir_all(get_logs_dir())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_file_lives_under_exe_dir() {
        let log = get_log_file();
        assert!(log.starts_with(get_exe_dir()));
        assert_eq!(log.file_name().unwrap(), "hi3_scanner.log");
    }
}

use tracing_subscriber::{EnvFilter, fmt};

pub const LOG_DIR_VAR: &str = "TABLECRAFT_LOG_DIR";

/// Install the global `tracing` subscriber. `RUST_LOG` wins over `default_level`.
pub fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "tablecraft={default_level},tablecraft_core={default_level}"
        ))
    });

    // A second init (tests, embedding apps) is not an error worth surfacing
    let _ = fmt().with_env_filter(filter).with_target(true).try_init();
}

/// Dump content into `$TABLECRAFT_LOG_DIR/<filename>`. No-op when the variable is unset.
///
/// `tablecraft_log!(content, "file.json")` truncates,
/// `tablecraft_log!(content, "file.log", true)` appends.
#[macro_export]
macro_rules! tablecraft_log {
    ($content:expr, $filename:expr) => {
        $crate::tablecraft_log!($content, $filename, false)
    };

    ($content:expr, $filename:expr, $append:expr) => {{
        use std::io::Write;

        if let Ok(logs_dir) = std::env::var($crate::log::LOG_DIR_VAR) {
            let _ = std::fs::create_dir_all(&logs_dir);
            let path = std::path::Path::new(&logs_dir).join($filename);

            let mut options = std::fs::OpenOptions::new();
            options.create(true);
            if $append {
                options.append(true);
            } else {
                options.write(true).truncate(true);
            }

            match options.open(&path) {
                Ok(mut file_handle) => {
                    if let Err(e) = writeln!(file_handle, "{}", $content) {
                        tracing::warn!(path = %path.display(), error = %e, "Failed to write log dump");
                    }
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to open log dump");
                }
            }
        }
    }};
}

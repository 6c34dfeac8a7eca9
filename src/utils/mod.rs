//! The `utils` module provides the pieces every other module leans on:
//! the shared error types and logging setup.

pub mod error;
pub mod logging;

#[cfg(test)]
mod tests {
    use super::logging;

    #[test]
    fn logging_init_accepts_levels() {
        // Should not panic
        logging::init("info", None);
        logging::init("debug", None);
        logging::init("WARNING", None);
    }

    #[test]
    fn logging_init_creates_file_sink_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested/access.log");
        logging::init("info", path.to_str());
        assert!(path.exists());
    }
}

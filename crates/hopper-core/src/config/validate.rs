//! Configuration validation.

use crate::error::ConfigError;

use super::Config;

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.watch.dir.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError(
                "watch.dir must not be empty".into(),
            ));
        }
        if self.pipeline.buffer_size == 0 {
            return Err(ConfigError::ValidationError(
                "pipeline.buffer_size must be > 0".into(),
            ));
        }
        if self.pipeline.max_in_flight == 0 {
            return Err(ConfigError::ValidationError(
                "pipeline.max_in_flight must be > 0".into(),
            ));
        }
        if self.pipeline.settle_timeout_ms < self.pipeline.settle_ms {
            return Err(ConfigError::ValidationError(
                "pipeline.settle_timeout_ms must be >= pipeline.settle_ms".into(),
            ));
        }
        if self.sink.timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "sink.timeout_ms must be > 0".into(),
            ));
        }

        let watch = self.watch_dir();
        let processed = self.processed_dir();
        let discard = self.discard_dir();
        if processed == watch || discard == watch {
            return Err(ConfigError::ValidationError(
                "watch.processed_dir and watch.discard_dir must differ from watch.dir".into(),
            ));
        }
        if processed == discard {
            return Err(ConfigError::ValidationError(
                "watch.processed_dir and watch.discard_dir must differ".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_default_config_passes_validation() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_buffer() {
        let mut config = Config::default();
        config.pipeline.buffer_size = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("buffer_size"));
    }

    #[test]
    fn test_validate_rejects_zero_in_flight() {
        let mut config = Config::default();
        config.pipeline.max_in_flight = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_in_flight"));
    }

    #[test]
    fn test_validate_rejects_settle_timeout_below_window() {
        let mut config = Config::default();
        config.pipeline.settle_ms = 500;
        config.pipeline.settle_timeout_ms = 100;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("settle_timeout_ms"));
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let mut config = Config::default();
        config.sink.timeout_ms = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("timeout_ms"));
    }

    #[test]
    fn test_validate_rejects_terminal_dir_equal_to_watch_dir() {
        let mut config = Config::default();
        config.watch.dir = PathBuf::from("/srv/drop/incoming");
        config.watch.discard_dir = PathBuf::from("/srv/drop/incoming");
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("must differ from watch.dir"));
    }

    #[test]
    fn test_validate_rejects_shared_terminal_dir() {
        let mut config = Config::default();
        config.watch.processed_dir = PathBuf::from("/srv/drop/out");
        config.watch.discard_dir = PathBuf::from("/srv/drop/out");
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("must differ"));
    }
}

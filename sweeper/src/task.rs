use async_trait::async_trait;
use std::fmt::Debug;
use std::fmt::Write;

/// Error type a periodic run may fail with
pub type TaskError = Box<dyn std::error::Error + Send + Sync>;

/// Trait for work driven by a [`crate::PeriodicTimer`]
#[async_trait]
pub trait PeriodicTask: Send + Sync + Debug + 'static {
    /// Name used in log lines
    fn name(&self) -> &str;

    /// Execute one run.
    /// Returns Ok(()) on success, Err otherwise
    ///
    /// Runs may overlap when a run takes longer than the interval.
    async fn run(&self) -> Result<(), TaskError>;
}

/// Formats an error together with its chain of sources.
pub fn report(mut err: &(dyn std::error::Error + 'static)) -> String {
    let mut s = format!("{}", err);
    while let Some(src) = err.source() {
        let _ = write!(s, "\n\nCaused by: {}", src);
        err = src;
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Outer(std::io::Error);

    impl std::fmt::Display for Outer {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "sweep failed")
        }
    }

    impl std::error::Error for Outer {
        fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
            Some(&self.0)
        }
    }

    #[test]
    fn test_report_includes_sources() {
        let err = Outer(std::io::Error::other("directory unavailable"));
        let text = report(&err);
        assert!(text.starts_with("sweep failed"));
        assert!(text.contains("Caused by: directory unavailable"));
    }
}

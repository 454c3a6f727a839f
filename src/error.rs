use thiserror::Error;

#[derive(Error, Debug)]
pub enum CloudError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Missing local capability: {0}")]
    MissingLocalCapability(String),

    #[error("Operation not supported: {0}")]
    NotSupported(String),

    #[error("No cloud bound for operation: {0}")]
    NoCloudBound(String),

    #[error("Cloud is closed: {0}")]
    CloudClosed(String),

    #[error("Job not found: {0}")]
    JobNotFound(u64),

    #[error("Job {jid} failed: {message}")]
    JobFailed { jid: u64, message: String },

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Unauthorized: check your api key and secret key")]
    Unauthorized,

    #[error("Server error {code}: {message}")]
    Server { code: u16, message: String },

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("System error: {0}")]
    SystemError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CloudError>;


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_configuration_display() {
        let err = CloudError::InvalidConfiguration("unknown cloud type 'cluster'".to_string());
        assert_eq!(err.to_string(), "Invalid configuration: unknown cloud type 'cluster'");
    }

    #[test]
    fn test_missing_capability_display() {
        let err = CloudError::MissingLocalCapability("multiprocessing".to_string());
        assert_eq!(err.to_string(), "Missing local capability: multiprocessing");
    }

    #[test]
    fn test_no_cloud_bound_display() {
        let err = CloudError::NoCloudBound("call".to_string());
        assert_eq!(err.to_string(), "No cloud bound for operation: call");
    }

    #[test]
    fn test_job_failed_display() {
        let err = CloudError::JobFailed { jid: 12, message: "exit code 2".to_string() };
        assert_eq!(err.to_string(), "Job 12 failed: exit code 2");
    }

    #[test]
    fn test_server_error_display() {
        let err = CloudError::Server { code: 503, message: "maintenance".to_string() };
        assert_eq!(err.to_string(), "Server error 503: maintenance");
    }

    #[test]
    fn test_io_error_from_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let cloud_err: CloudError = io_err.into();
        assert!(matches!(cloud_err, CloudError::IoError(_)));
        assert!(cloud_err.to_string().contains("file not found"));
    }

    #[test]
    fn test_json_error_from_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let cloud_err: CloudError = json_err.into();
        assert!(matches!(cloud_err, CloudError::Json(_)));
    }

    #[test]
    fn test_error_debug_impl() {
        let err = CloudError::JobNotFound(7);
        let debug_str = format!("{:?}", err);
        assert!(debug_str.contains("JobNotFound"));
        assert!(debug_str.contains('7'));
    }
}

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PermitError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("GeoJSON error: {0}")]
    GeoJsonError(#[from] geojson::Error),

    #[error("PDF error: {0}")]
    PdfError(#[from] lopdf::Error),

    #[error("Image error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("Configuration error in '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value for '{field}' ({value}): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing configuration field: {field}")]
    MissingConfigError { field: String },

    #[error("No job address found in {path}")]
    AddressNotFound { path: String },

    #[error("Township '{township}' not found in permit list")]
    TownshipNotFound { township: String },

    #[error("Unknown permit form '{id}'")]
    LayoutNotFound { id: String },

    #[error("Customer file {path} is empty")]
    EmptyCustomerFile { path: String },

    #[error("Invalid data: {message}")]
    InvalidData { message: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Render error: {message}")]
    RenderError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Data,
    FileSystem,
    Configuration,
    Operator,
    Rendering,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl PermitError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            PermitError::HttpError(_) => ErrorCategory::Network,
            PermitError::CsvError(_)
            | PermitError::SerializationError(_)
            | PermitError::GeoJsonError(_)
            | PermitError::AddressNotFound { .. }
            | PermitError::EmptyCustomerFile { .. }
            | PermitError::InvalidData { .. }
            | PermitError::TownshipNotFound { .. } => ErrorCategory::Data,
            PermitError::IoError(_) => ErrorCategory::FileSystem,
            PermitError::ConfigValidationError { .. }
            | PermitError::InvalidConfigValueError { .. }
            | PermitError::MissingConfigError { .. }
            | PermitError::LayoutNotFound { .. } => ErrorCategory::Configuration,
            PermitError::InvalidInput { .. } => ErrorCategory::Operator,
            PermitError::PdfError(_)
            | PermitError::ImageError(_)
            | PermitError::RenderError { .. } => ErrorCategory::Rendering,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            PermitError::HttpError(_) => ErrorSeverity::Medium,
            PermitError::IoError(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::High,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            PermitError::HttpError(_) => {
                "Check the network connection or enter the township manually"
            }
            PermitError::CsvError(_) => {
                "Check that the fee table has a header row with a Township column"
            }
            PermitError::IoError(_) => "Check that the file exists and the path is reachable",
            PermitError::SerializationError(_) | PermitError::GeoJsonError(_) => {
                "Check that the file is valid JSON / GeoJSON"
            }
            PermitError::PdfError(_) => "Check that the permit template is a readable PDF",
            PermitError::ImageError(_) => "Check that the signature image is a PNG or JPEG",
            PermitError::ConfigValidationError { .. }
            | PermitError::InvalidConfigValueError { .. }
            | PermitError::MissingConfigError { .. } => "Fix the configuration file and retry",
            PermitError::AddressNotFound { .. } => {
                "Make sure the customer file has a line like '123 Main St, Town, NY 14000'"
            }
            PermitError::TownshipNotFound { .. } => "Add the township row to the fee table",
            PermitError::LayoutNotFound { .. } => {
                "Run the 'forms' command to list the available permit forms"
            }
            PermitError::EmptyCustomerFile { .. } => {
                "Fill in the customer file (name, address, phone, job number) and retry"
            }
            PermitError::InvalidData { .. } => "Check the fee table header row and retry",
            PermitError::InvalidInput { .. } => "Re-run and answer every prompt",
            PermitError::RenderError { .. } => "Check the layout coordinates and template",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            PermitError::HttpError(_) => "Could not reach the geocoding service".to_string(),
            PermitError::IoError(e) => format!("File problem: {}", e),
            PermitError::AddressNotFound { .. } => {
                "Could not find an address in the customer file.".to_string()
            }
            other => other.to_string(),
        }
    }

    pub fn config(field: impl Into<String>, message: impl Into<String>) -> Self {
        PermitError::ConfigValidationError {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn render(message: impl Into<String>) -> Self {
        PermitError::RenderError {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PermitError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_not_found_is_high_severity() {
        let err = PermitError::AddressNotFound {
            path: "Customer_data.txt".to_string(),
        };
        assert_eq!(err.severity(), ErrorSeverity::High);
        assert_eq!(err.category(), ErrorCategory::Data);
        assert_eq!(
            err.user_friendly_message(),
            "Could not find an address in the customer file."
        );
    }

    #[test]
    fn test_failed_runs_never_map_to_low_severity() {
        let errors = [
            PermitError::InvalidInput {
                message: "input closed before an answer was given".to_string(),
            },
            PermitError::EmptyCustomerFile {
                path: "Customer_data.txt".to_string(),
            },
            PermitError::InvalidData {
                message: "Fee table has no 'Township' column".to_string(),
            },
        ];
        for err in errors {
            assert_eq!(err.severity(), ErrorSeverity::High, "{}", err);
        }
    }

    #[test]
    fn test_empty_customer_file_suggestion() {
        let err = PermitError::EmptyCustomerFile {
            path: "Customer_data.txt".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Data);
        assert!(err.recovery_suggestion().contains("customer file"));
    }

    #[test]
    fn test_io_error_is_critical() {
        let err = PermitError::from(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "missing",
        ));
        assert_eq!(err.severity(), ErrorSeverity::Critical);
        assert_eq!(err.category(), ErrorCategory::FileSystem);
    }
}

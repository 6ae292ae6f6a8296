pub mod start;
pub mod validate_credentials;

pub use start::{StartExtractionCommand, StartExtractionError, StartExtractionResponse};
pub use validate_credentials::{
    ValidateCredentialsCommand, ValidateCredentialsError, ValidateCredentialsResponse,
};

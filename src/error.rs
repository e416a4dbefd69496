use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use derive_more::{Display, Error};

/// Errors that can occur when applying the CORS policy to a request.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
#[non_exhaustive]
pub enum CorsError {
    /// The origin option resolved to a value that cannot be used, such as an empty string.
    #[display("Invalid CORS origin option")]
    InvalidOrigin,

    /// The dynamic origin function failed.
    #[display("Failed to resolve CORS origin")]
    OriginResolution,

    /// Preflight request is missing the `Origin` or `Access-Control-Request-Method` header.
    #[display("Invalid Preflight Request")]
    InvalidPreflight,
}

impl ResponseError for CorsError {
    fn status_code(&self) -> StatusCode {
        match self {
            CorsError::InvalidOrigin | CorsError::OriginResolution => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            CorsError::InvalidPreflight => StatusCode::BAD_REQUEST,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::with_body(self.status_code(), self.to_string()).map_into_boxed_body()
    }
}

use actix_web::http::{header::HeaderValue, StatusCode};

use crate::origin::{OriginOption, OriginSetting};

/// Methods advertised in `Access-Control-Allow-Methods` unless configured otherwise.
pub(crate) const DEFAULT_METHODS: &str = "GET, HEAD, PUT, PATCH, POST, DELETE";

/// Complete, immutable CORS policy shared by every request a middleware instance serves.
#[derive(Debug)]
pub(crate) struct CorsPolicy {
    pub(crate) origin: OriginOption,
    pub(crate) allowed_methods_baked: HeaderValue,
    pub(crate) preflight_continue: bool,
    pub(crate) options_success_status: StatusCode,
    pub(crate) supports_credentials: bool,
    pub(crate) expose_headers_baked: Option<HeaderValue>,
    pub(crate) allowed_headers_baked: Option<HeaderValue>,
    pub(crate) max_age: Option<usize>,
    pub(crate) preflight: bool,
    pub(crate) strict_preflight: bool,
}

impl Default for CorsPolicy {
    fn default() -> Self {
        CorsPolicy {
            origin: OriginOption::Static(OriginSetting::Any),
            allowed_methods_baked: HeaderValue::from_static(DEFAULT_METHODS),
            preflight_continue: false,
            options_success_status: StatusCode::NO_CONTENT,
            supports_credentials: false,
            expose_headers_baked: None,
            allowed_headers_baked: None,
            max_age: None,
            preflight: true,
            strict_preflight: true,
        }
    }
}

//! Origin-policy driven Cross-Origin Resource Sharing (CORS) middleware for Actix Web.
//!
//! The [`Cors`] builder produces a middleware that runs in front of every route of the app it
//! wraps. For each request it:
//!
//! 1. adds `Origin` to the `Vary` response header;
//! 2. decides which origin, if any, goes in `Access-Control-Allow-Origin` (see
//!    [`OriginSetting`]), awaiting a dynamic lookup if one is configured;
//! 3. adds the credentials and exposed-headers headers;
//! 4. for `OPTIONS` requests, validates the preflight and either answers it directly or lets it
//!    continue to the application.
//!
//! Origins that are not allowed are not rejected; the allow-origin header is simply left out and
//! the browser enforces the policy.
//!
//! A broken origin option (an empty fixed origin, or a failing dynamic lookup) is reported for
//! each request as a `500 Internal Server Error`.
//!
//! [`preflight_route`] registers a catch-all `OPTIONS` resource that answers `404 Not Found` for
//! `OPTIONS` requests the middleware did not accept as preflights.
//!
//! # Example
//! ```no_run
//! use actix_cors_policy::{preflight_route, Cors, OriginMatcher};
//! use actix_web::{get, App, HttpServer};
//! use regex::Regex;
//!
//! #[get("/index.html")]
//! async fn index() -> &'static str {
//!     "<p>Hello World!</p>"
//! }
//!
//! #[actix_web::main]
//! async fn main() -> std::io::Result<()> {
//!     HttpServer::new(|| {
//!         let cors = Cors::default()
//!             .allowed_origins([
//!                 OriginMatcher::from("https://www.rust-lang.org"),
//!                 OriginMatcher::from(Regex::new(r"^https://.+\.rust-lang\.org$").unwrap()),
//!             ])
//!             .allowed_methods(vec!["GET", "POST"])
//!             .supports_credentials()
//!             .max_age(3600);
//!
//!         App::new()
//!             .wrap(cors)
//!             .service(index)
//!             .service(preflight_route())
//!     })
//!     .bind(("127.0.0.1", 8080))?
//!     .run()
//!     .await
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(future_incompatible, missing_docs, missing_debug_implementations)]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

mod builder;
mod error;
mod headers;
mod middleware;
mod options;
mod origin;
mod policy;
mod preflight;

use crate::policy::CorsPolicy;
pub use crate::{
    builder::Cors,
    error::CorsError,
    middleware::CorsMiddleware,
    options::{CorsOptions, HeaderList},
    origin::{OriginMatcher, OriginSetting},
    preflight::{is_preflight_handled, preflight_route},
};

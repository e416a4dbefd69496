use actix_web::{
    dev::RequestHead,
    http::header::{self, HeaderMap, HeaderName, HeaderValue},
};
use smallvec::SmallVec;

use crate::CorsPolicy;

const VARY_ORIGIN: &str = "Origin";
const VARY_REQUEST_HEADERS: &str = "Access-Control-Request-Headers";

/// CORS response headers composed for one request.
///
/// Headers are collected before the response exists and written with [`apply`](Self::apply) to
/// whichever response ends up leaving the middleware.
#[derive(Debug)]
pub(crate) struct CorsHeaders {
    vary: SmallVec<[&'static str; 2]>,
    headers: SmallVec<[(HeaderName, HeaderValue); 6]>,
}

impl CorsHeaders {
    /// Starts a header set that already varies on `Origin`.
    pub(crate) fn new() -> Self {
        let mut vary = SmallVec::new();
        vary.push(VARY_ORIGIN);

        CorsHeaders {
            vary,
            headers: SmallVec::new(),
        }
    }

    fn insert(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.retain(|(existing, _)| *existing != name);
        self.headers.push((name, value));
    }

    /// Adds the headers sent on every response the policy applies to.
    pub(crate) fn add_common(&mut self, policy: &CorsPolicy, allow_origin: Option<HeaderValue>) {
        // a denied origin gets no allow-origin header at all
        if let Some(origin) = allow_origin {
            self.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
        }

        if policy.supports_credentials {
            self.insert(
                header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
                HeaderValue::from_static("true"),
            );
        }

        if let Some(ref expose) = policy.expose_headers_baked {
            log::trace!("exposing selected headers: {:?}", expose);
            self.insert(header::ACCESS_CONTROL_EXPOSE_HEADERS, expose.clone());
        }
    }

    /// Adds the headers only sent in answer to a preflight request.
    pub(crate) fn add_preflight(&mut self, policy: &CorsPolicy, req: &RequestHead) {
        self.insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            policy.allowed_methods_baked.clone(),
        );

        match policy.allowed_headers_baked {
            Some(ref allowed) => {
                self.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, allowed.clone());
            }

            None => {
                self.vary.push(VARY_REQUEST_HEADERS);

                if let Some(requested) = req
                    .headers()
                    .get(header::ACCESS_CONTROL_REQUEST_HEADERS)
                    .filter(|hdr| !hdr.is_empty())
                {
                    log::trace!("reflecting requested headers: {:?}", requested);
                    self.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, requested.clone());
                }
            }
        }

        if let Some(max_age) = policy.max_age {
            self.insert(header::ACCESS_CONTROL_MAX_AGE, HeaderValue::from(max_age));
        }
    }

    /// Writes the composed headers into `headers`, overwriting same-named CORS headers.
    pub(crate) fn apply(self, headers: &mut HeaderMap) {
        for field in self.vary {
            append_vary(headers, field);
        }

        for (name, value) in self.headers {
            headers.insert(name, value);
        }
    }
}

/// Appends `field` to the `Vary` header unless it is already listed.
///
/// Tokens are compared case-insensitively across every `Vary` line present. A `*` token already
/// covers every field, so the header is left alone. So is a header with a line that is not
/// valid text, since rewriting it would lose that line.
pub(crate) fn append_vary(headers: &mut HeaderMap, field: &str) {
    let value = {
        let mut existing = SmallVec::<[&str; 4]>::new();

        for hdr in headers.get_all(header::VARY) {
            let Ok(hdr) = hdr.to_str() else {
                log::debug!("leaving unreadable `Vary` header untouched");
                return;
            };

            existing.extend(hdr.split(',').map(str::trim).filter(|token| !token.is_empty()));
        }

        if existing
            .iter()
            .any(|token| *token == "*" || token.eq_ignore_ascii_case(field))
        {
            return;
        }

        let mut value = existing.join(", ");
        if !value.is_empty() {
            value.push_str(", ");
        }
        value.push_str(field);
        value
    };

    match HeaderValue::try_from(value) {
        Ok(value) => {
            headers.insert(header::VARY, value);
        }
        Err(err) => log::debug!("could not extend `Vary` header: {}", err),
    }
}

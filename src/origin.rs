use std::{fmt, future::Future, rc::Rc};

use actix_web::http::header::HeaderValue;
use futures_util::future::{FutureExt as _, LocalBoxFuture};
use log::error;
use regex::Regex;

use crate::CorsError;

/// Origin policy, after any dynamic lookup has completed.
///
/// Most variants can be built with `From` conversions:
/// - `"*"` becomes [`Any`](Self::Any), any other string becomes [`Fixed`](Self::Fixed);
/// - `true` becomes [`ReflectAll`](Self::ReflectAll), `false` becomes
///   [`Disabled`](Self::Disabled);
/// - a [`Regex`] becomes [`Pattern`](Self::Pattern);
/// - a `Vec` of [`OriginMatcher`]s becomes [`List`](Self::List).
#[derive(Debug, Clone)]
pub enum OriginSetting {
    /// Any origin is allowed and `Access-Control-Allow-Origin: *` is sent.
    Any,

    /// This exact value is always sent, whatever the request's `Origin` is.
    ///
    /// An empty string is a configuration error, reported per request with a 500 response.
    Fixed(String),

    /// The request origin is echoed back if any matcher accepts it.
    List(Vec<OriginMatcher>),

    /// The request origin is echoed back if the pattern matches it.
    Pattern(Regex),

    /// Every request origin is echoed back.
    ReflectAll,

    /// CORS is not applied. Responses only receive `Vary: Origin`.
    Disabled,
}

/// One element of an origin list.
#[derive(Debug, Clone)]
pub enum OriginMatcher {
    /// Case-sensitive exact comparison.
    Exact(String),

    /// Regular expression search anywhere in the origin.
    Pattern(Regex),

    /// Matches if any nested matcher does.
    Nested(Vec<OriginMatcher>),

    /// Always (`true`) or never (`false`) matches.
    Bool(bool),
}

impl OriginMatcher {
    pub(crate) fn matches(&self, origin: &str) -> bool {
        match self {
            OriginMatcher::Exact(allowed) => allowed == origin,
            OriginMatcher::Pattern(pattern) => pattern.is_match(origin),
            OriginMatcher::Nested(matchers) => matchers.iter().any(|m| m.matches(origin)),
            OriginMatcher::Bool(allow) => *allow,
        }
    }
}

/// Outcome of evaluating the origin policy against one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum OriginDecision {
    /// Send `Access-Control-Allow-Origin` with this value.
    Allow(HeaderValue),

    /// Omit `Access-Control-Allow-Origin`; other CORS headers still apply.
    Deny,

    /// Skip CORS processing entirely.
    Disabled,

    /// The policy itself is broken.
    Invalid,
}

impl OriginSetting {
    pub(crate) fn decide(&self, request_origin: Option<&HeaderValue>) -> OriginDecision {
        match self {
            OriginSetting::Any => OriginDecision::Allow(HeaderValue::from_static("*")),

            OriginSetting::Fixed(origin) if origin.is_empty() => OriginDecision::Invalid,
            OriginSetting::Fixed(origin) => match HeaderValue::from_str(origin) {
                Ok(origin) => OriginDecision::Allow(origin),
                Err(_) => OriginDecision::Invalid,
            },

            OriginSetting::Disabled => OriginDecision::Disabled,

            OriginSetting::List(matchers) => reflect(request_origin, |origin| {
                matchers.iter().any(|matcher| matcher.matches(origin))
            }),
            OriginSetting::Pattern(pattern) => {
                reflect(request_origin, |origin| pattern.is_match(origin))
            }
            OriginSetting::ReflectAll => reflect(request_origin, |_| true),
        }
    }
}

/// Echoes the request origin back if `allowed` accepts it.
///
/// Requests without a usable `Origin` header are never reflected.
fn reflect(
    request_origin: Option<&HeaderValue>,
    allowed: impl FnOnce(&str) -> bool,
) -> OriginDecision {
    let origin = match request_origin.filter(|hdr| !hdr.is_empty()) {
        Some(hdr) => hdr,
        None => return OriginDecision::Deny,
    };

    match origin.to_str() {
        Ok(origin_str) if allowed(origin_str) => OriginDecision::Allow(origin.clone()),
        _ => OriginDecision::Deny,
    }
}

impl From<&str> for OriginSetting {
    fn from(origin: &str) -> Self {
        OriginSetting::from(origin.to_owned())
    }
}

impl From<String> for OriginSetting {
    fn from(origin: String) -> Self {
        if origin == "*" {
            OriginSetting::Any
        } else {
            OriginSetting::Fixed(origin)
        }
    }
}

impl From<bool> for OriginSetting {
    fn from(reflect: bool) -> Self {
        if reflect {
            OriginSetting::ReflectAll
        } else {
            OriginSetting::Disabled
        }
    }
}

impl From<Regex> for OriginSetting {
    fn from(pattern: Regex) -> Self {
        OriginSetting::Pattern(pattern)
    }
}

impl From<Vec<OriginMatcher>> for OriginSetting {
    fn from(matchers: Vec<OriginMatcher>) -> Self {
        OriginSetting::List(matchers)
    }
}

impl From<&str> for OriginMatcher {
    fn from(origin: &str) -> Self {
        OriginMatcher::Exact(origin.to_owned())
    }
}

impl From<String> for OriginMatcher {
    fn from(origin: String) -> Self {
        OriginMatcher::Exact(origin)
    }
}

impl From<bool> for OriginMatcher {
    fn from(allow: bool) -> Self {
        OriginMatcher::Bool(allow)
    }
}

impl From<Regex> for OriginMatcher {
    fn from(pattern: Regex) -> Self {
        OriginMatcher::Pattern(pattern)
    }
}

impl From<Vec<OriginMatcher>> for OriginMatcher {
    fn from(matchers: Vec<OriginMatcher>) -> Self {
        OriginMatcher::Nested(matchers)
    }
}

type BoxedOriginFn =
    Rc<dyn Fn(Option<String>) -> LocalBoxFuture<'static, Result<OriginSetting, CorsError>>>;

#[derive(Clone)]
pub(crate) struct OriginFn {
    pub(crate) boxed_fn: BoxedOriginFn,
}

impl OriginFn {
    pub(crate) fn new<F, Fut, E>(f: F) -> Self
    where
        F: Fn(Option<String>) -> Fut + 'static,
        Fut: Future<Output = Result<OriginSetting, E>> + 'static,
        E: fmt::Display + 'static,
    {
        OriginFn {
            boxed_fn: Rc::new(move |origin| {
                f(origin)
                    .map(|res| {
                        res.map_err(|err| {
                            error!("dynamic CORS origin resolution failed: {}", err);
                            CorsError::OriginResolution
                        })
                    })
                    .boxed_local()
            }),
        }
    }
}

impl fmt::Debug for OriginFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("origin_fn")
    }
}

/// The configured origin option: either known up front or looked up per request.
#[derive(Debug, Clone)]
pub(crate) enum OriginOption {
    Static(OriginSetting),
    Dynamic(OriginFn),
}

impl OriginOption {
    /// Evaluates the option for a request carrying `request_origin`.
    ///
    /// A dynamic lookup is awaited before anything is decided. Its result is evaluated as a
    /// static setting.
    pub(crate) async fn resolve(
        &self,
        request_origin: Option<&HeaderValue>,
    ) -> Result<OriginDecision, CorsError> {
        match self {
            OriginOption::Static(setting) => Ok(setting.decide(request_origin)),

            OriginOption::Dynamic(origin_fn) => {
                let origin = request_origin
                    .and_then(|hdr| hdr.to_str().ok())
                    .filter(|origin| !origin.is_empty())
                    .map(str::to_owned);

                let setting = (origin_fn.boxed_fn)(origin).await?;
                Ok(setting.decide(request_origin))
            }
        }
    }
}

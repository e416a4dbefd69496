use std::{
    fmt,
    future::{ready, Future, Ready},
    rc::Rc,
};

use actix_web::{
    body::{EitherBody, MessageBody},
    dev::{Service, ServiceRequest, ServiceResponse, Transform},
    error::{Error, HttpError},
    http::{
        header::{HeaderValue, InvalidHeaderValue},
        Method, StatusCode,
    },
};
use log::error;

use crate::{
    origin::{OriginFn, OriginOption},
    CorsMiddleware, CorsOptions, CorsPolicy, OriginMatcher, OriginSetting,
};

/// Convenience for getting mut refs to the policy. Returns `None` if an error has occurred.
fn cors<'a>(policy: &'a mut Rc<CorsPolicy>, err: &Option<HttpError>) -> Option<&'a mut CorsPolicy> {
    if err.is_some() {
        return None;
    }

    Rc::get_mut(policy)
}

/// Joins values into one comma-separated header value.
pub(crate) fn intersperse_header_values<I, T>(values: I) -> Result<HeaderValue, InvalidHeaderValue>
where
    I: IntoIterator<Item = T>,
    T: AsRef<str>,
{
    let joined = values
        .into_iter()
        .map(|val| val.as_ref().to_owned())
        .collect::<Vec<_>>()
        .join(", ");

    HeaderValue::try_from(joined)
}

/// Builder for CORS middleware.
///
/// To construct a CORS middleware, call [`Cors::default()`] (or [`Cors::from_options()`]), then
/// use the builder methods to customize the policy. The builder is then passed to
/// `App::wrap()`. Pair it with [`preflight_route`](crate::preflight_route) so that `OPTIONS`
/// requests to unknown paths are answered with 404.
///
/// The policy is fixed once the middleware is built and never changes afterwards.
///
/// # Defaults
/// | option                     | default                                |
/// |----------------------------|----------------------------------------|
/// | origin                     | any (`*`)                              |
/// | methods                    | `GET, HEAD, PUT, PATCH, POST, DELETE`  |
/// | preflight continue         | no                                     |
/// | options success status     | `204 No Content`                       |
/// | credentials                | no                                     |
/// | exposed / allowed headers  | unset                                  |
/// | max age                    | unset                                  |
/// | preflight handling         | enabled                                |
/// | strict preflight           | enabled                                |
///
/// # Errors
/// Methods and header lists are converted to header values when they are set. If any of them
/// cannot be, the error is kept and building the middleware fails.
///
/// # Example
/// ```
/// use actix_cors_policy::Cors;
/// use actix_web::http::header;
///
/// let cors = Cors::default()
///     .allowed_origins(["https://www.rust-lang.org", "https://crates.io"])
///     .allowed_methods(vec!["GET", "POST"])
///     .allowed_headers([header::AUTHORIZATION, header::ACCEPT])
///     .max_age(3600);
///
/// // `cors` can now be used in `App::wrap`.
/// ```
#[derive(Debug)]
pub struct Cors {
    policy: Rc<CorsPolicy>,
    error: Option<HttpError>,
}

impl Cors {
    /// Builds a policy by applying `options` over the defaults.
    ///
    /// Options left unset keep their default values.
    pub fn from_options(options: CorsOptions) -> Cors {
        let CorsOptions {
            origin,
            methods,
            preflight_continue,
            options_success_status,
            credentials,
            exposed_headers,
            allowed_headers,
            max_age,
            preflight,
            strict_preflight,
        } = options;

        let mut this = Cors::default();

        if let Some(origin) = origin {
            this = this.origin(origin);
        }

        if let Some(methods) = methods {
            this = this.allowed_methods(methods.iter().map(String::as_str));
        }

        if let Some(code) = options_success_status {
            match StatusCode::from_u16(code) {
                Ok(status) => this = this.options_success_status(status),
                Err(err) => this.error = Some(err.into()),
            }
        }

        if let Some(headers) = exposed_headers {
            this = this.expose_headers(headers.values());
        }

        if let Some(headers) = allowed_headers {
            this = this.allowed_headers(headers.values());
        }

        if let Some(policy) = cors(&mut this.policy, &this.error) {
            if let Some(preflight_continue) = preflight_continue {
                policy.preflight_continue = preflight_continue;
            }

            if let Some(credentials) = credentials {
                policy.supports_credentials = credentials;
            }

            if max_age.is_some() {
                policy.max_age = max_age;
            }

            if let Some(preflight) = preflight {
                policy.preflight = preflight;
            }

            if let Some(strict_preflight) = strict_preflight {
                policy.strict_preflight = strict_preflight;
            }
        }

        this
    }

    /// Sets the origin policy.
    ///
    /// Accepts anything convertible to an [`OriginSetting`]: `"*"`, a fixed origin string,
    /// `true`/`false`, a [`Regex`](regex::Regex) or a list of [`OriginMatcher`]s.
    ///
    /// The value is not checked here. A broken value (like an empty string) makes every request
    /// fail with a 500 response.
    pub fn origin(mut self, origin: impl Into<OriginSetting>) -> Cors {
        if let Some(policy) = cors(&mut self.policy, &self.error) {
            policy.origin = OriginOption::Static(origin.into());
        }

        self
    }

    /// Allows any origin, sending `Access-Control-Allow-Origin: *`.
    pub fn allow_any_origin(self) -> Cors {
        self.origin(OriginSetting::Any)
    }

    /// Echoes the request origin back only if it matches one of `origins`.
    ///
    /// Strings are compared exactly, patterns are searched, nested lists are checked in order.
    pub fn allowed_origins<U, O>(self, origins: U) -> Cors
    where
        U: IntoIterator<Item = O>,
        O: Into<OriginMatcher>,
    {
        self.origin(OriginSetting::List(
            origins.into_iter().map(Into::into).collect(),
        ))
    }

    /// Looks up the origin policy per request.
    ///
    /// The function receives the request's `Origin` header (`None` if absent) and resolves to
    /// the [`OriginSetting`] to apply to that request. It is awaited before any header is written.
    /// If it fails, the error is logged and the request is answered with 500.
    pub fn origin_fn<F, Fut, E>(mut self, f: F) -> Cors
    where
        F: Fn(Option<String>) -> Fut + 'static,
        Fut: Future<Output = Result<OriginSetting, E>> + 'static,
        E: fmt::Display + 'static,
    {
        if let Some(policy) = cors(&mut self.policy, &self.error) {
            policy.origin = OriginOption::Dynamic(OriginFn::new(f));
        }

        self
    }

    /// Sets the methods sent in `Access-Control-Allow-Methods`, in the given order.
    ///
    /// Defaults to `GET, HEAD, PUT, PATCH, POST, DELETE`.
    pub fn allowed_methods<U, M>(mut self, methods: U) -> Cors
    where
        U: IntoIterator<Item = M>,
        M: TryInto<Method>,
        <M as TryInto<Method>>::Error: Into<HttpError>,
    {
        let methods = methods
            .into_iter()
            .map(|method| method.try_into().map_err(Into::into))
            .collect::<Result<Vec<Method>, HttpError>>();

        let baked = methods.and_then(|methods| {
            intersperse_header_values(methods.iter().map(Method::as_str)).map_err(Into::into)
        });

        match baked {
            Ok(baked) => {
                if let Some(policy) = cors(&mut self.policy, &self.error) {
                    policy.allowed_methods_baked = baked;
                }
            }
            Err(err) => self.error = Some(err),
        }

        self
    }

    /// Lets a validated preflight request continue to the application instead of being answered
    /// by the middleware.
    pub fn preflight_continue(mut self) -> Cors {
        if let Some(policy) = cors(&mut self.policy, &self.error) {
            policy.preflight_continue = true;
        }

        self
    }

    /// Sets the status used to answer a validated preflight request. Defaults to `204`.
    pub fn options_success_status(mut self, status: StatusCode) -> Cors {
        if let Some(policy) = cors(&mut self.policy, &self.error) {
            policy.options_success_status = status;
        }

        self
    }

    /// Sends `Access-Control-Allow-Credentials: true`.
    pub fn supports_credentials(mut self) -> Cors {
        if let Some(policy) = cors(&mut self.policy, &self.error) {
            policy.supports_credentials = true;
        }

        self
    }

    /// Sets the headers sent in `Access-Control-Expose-Headers`, joined with `", "`.
    ///
    /// A single entry is sent as is, so `["foo, bar"]` and `["foo", "bar"]` are equivalent.
    pub fn expose_headers<U, H>(mut self, headers: U) -> Cors
    where
        U: IntoIterator<Item = H>,
        H: AsRef<str>,
    {
        match intersperse_header_values(headers) {
            Ok(baked) => {
                if let Some(policy) = cors(&mut self.policy, &self.error) {
                    policy.expose_headers_baked = Some(baked);
                }
            }
            Err(err) => self.error = Some(err.into()),
        }

        self
    }

    /// Sets the headers sent in `Access-Control-Allow-Headers` on preflight responses.
    ///
    /// When unset, the request's `Access-Control-Request-Headers` is echoed back instead and
    /// `Vary` also lists `Access-Control-Request-Headers`.
    pub fn allowed_headers<U, H>(mut self, headers: U) -> Cors
    where
        U: IntoIterator<Item = H>,
        H: AsRef<str>,
    {
        match intersperse_header_values(headers) {
            Ok(baked) => {
                if let Some(policy) = cors(&mut self.policy, &self.error) {
                    policy.allowed_headers_baked = Some(baked);
                }
            }
            Err(err) => self.error = Some(err.into()),
        }

        self
    }

    /// Sets the value of `Access-Control-Max-Age` in seconds. `None` omits the header.
    pub fn max_age(mut self, max_age: impl Into<Option<usize>>) -> Cors {
        if let Some(policy) = cors(&mut self.policy, &self.error) {
            policy.max_age = max_age.into();
        }

        self
    }

    /// Disables special handling of `OPTIONS` requests.
    ///
    /// They are then treated like any other request and reach the application's routes.
    pub fn disable_preflight(mut self) -> Cors {
        if let Some(policy) = cors(&mut self.policy, &self.error) {
            policy.preflight = false;
        }

        self
    }

    /// Accepts preflight requests that lack `Origin` or `Access-Control-Request-Method`.
    pub fn disable_strict_preflight(mut self) -> Cors {
        if let Some(policy) = cors(&mut self.policy, &self.error) {
            policy.strict_preflight = false;
        }

        self
    }

    pub(crate) fn policy(&self) -> &CorsPolicy {
        &self.policy
    }
}

impl Default for Cors {
    /// A wide-open policy: any origin, default methods, preflight handled strictly.
    fn default() -> Cors {
        Cors {
            policy: Rc::new(CorsPolicy::default()),
            error: None,
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for Cors
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = CorsMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        if let Some(ref err) = self.error {
            error!("CORS policy could not be built: {}", err);
            return ready(Err(()));
        }

        ready(Ok(CorsMiddleware {
            service: Rc::new(service),
            policy: Rc::clone(&self.policy),
        }))
    }
}

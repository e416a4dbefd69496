use actix_web::{
    dev::RequestHead,
    guard,
    http::{header, Method},
    web, HttpMessage as _, HttpRequest, HttpResponse, Resource,
};

use crate::CorsPolicy;

/// Request extension set once the middleware has accepted a request as a preflight.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PreflightHandled;

/// Returns true if the CORS middleware accepted this request as a preflight request.
///
/// Useful in `OPTIONS` handlers of applications that use
/// [`Cors::preflight_continue`](crate::Cors::preflight_continue).
pub fn is_preflight_handled(req: &HttpRequest) -> bool {
    req.extensions().contains::<PreflightHandled>()
}

/// Preflight handling state for one request.
///
/// A request is `NotApplicable` unless it is an `OPTIONS` request and preflight handling is
/// enabled. Otherwise it is evaluated and ends up either `Rejected` or `Validated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Preflight {
    NotApplicable,
    Rejected,
    Validated,
}

impl Preflight {
    pub(crate) fn evaluate(policy: &CorsPolicy, req: &RequestHead) -> Preflight {
        if !policy.preflight || req.method != Method::OPTIONS {
            return Preflight::NotApplicable;
        }

        if policy.strict_preflight
            && !(has_header(req, header::ORIGIN)
                && has_header(req, header::ACCESS_CONTROL_REQUEST_METHOD))
        {
            return Preflight::Rejected;
        }

        Preflight::Validated
    }
}

/// Empty header values count as missing.
fn has_header(req: &RequestHead, name: header::HeaderName) -> bool {
    req.headers()
        .get(name)
        .map_or(false, |hdr| !hdr.is_empty())
}

/// Catch-all `OPTIONS` resource to register after all application routes.
///
/// `OPTIONS` requests that the CORS middleware did not accept as a preflight (preflight handling
/// disabled, CORS disabled by origin policy, ...) and that no application route answered get a
/// `404 Not Found`. Accepted preflights that were let through with
/// [`Cors::preflight_continue`](crate::Cors::preflight_continue) get an empty `200 OK`.
///
/// Requests only fall through to this resource if earlier resources guard on their method, as
/// resources created by the `#[get]`-style route macros do. A resource without a matching route
/// answers `405 Method Not Allowed` itself.
///
/// # Example
/// ```
/// use actix_cors_policy::{preflight_route, Cors};
/// use actix_web::{guard, web, App};
///
/// let app = App::new()
///     .wrap(Cors::default())
///     .service(web::resource("/hi").guard(guard::Get()).to(|| async { "hello" }))
///     .service(preflight_route());
/// ```
pub fn preflight_route() -> Resource {
    web::resource("/{tail:.*}")
        .name("cors_preflight")
        .guard(guard::Options())
        .to(preflight_fallback)
}

async fn preflight_fallback(req: HttpRequest) -> HttpResponse {
    if is_preflight_handled(&req) {
        HttpResponse::Ok().finish()
    } else {
        log::debug!("unhandled OPTIONS request to {}", req.path());
        HttpResponse::NotFound().finish()
    }
}

#[cfg(test)]
mod tests {
    use actix_web::{
        http::StatusCode,
        test::{self, TestRequest},
        App,
    };

    use super::*;
    use crate::Cors;

    fn preflight_req() -> TestRequest {
        TestRequest::default()
            .method(Method::OPTIONS)
            .insert_header((header::ORIGIN, "https://example.com"))
            .insert_header((header::ACCESS_CONTROL_REQUEST_METHOD, "GET"))
    }

    #[test]
    fn non_options_is_not_applicable() {
        let cors = Cors::default();
        let req = TestRequest::get().to_srv_request();

        assert_eq!(
            Preflight::evaluate(cors.policy(), req.head()),
            Preflight::NotApplicable
        );
    }

    #[test]
    fn disabled_preflight_is_not_applicable() {
        let cors = Cors::default().disable_preflight();
        let req = preflight_req().to_srv_request();

        assert_eq!(
            Preflight::evaluate(cors.policy(), req.head()),
            Preflight::NotApplicable
        );
    }

    #[test]
    fn strict_preflight_requires_both_headers() {
        let cors = Cors::default();

        let req = TestRequest::default()
            .method(Method::OPTIONS)
            .insert_header((header::ORIGIN, "https://example.com"))
            .to_srv_request();
        assert_eq!(
            Preflight::evaluate(cors.policy(), req.head()),
            Preflight::Rejected
        );

        let req = TestRequest::default()
            .method(Method::OPTIONS)
            .insert_header((header::ACCESS_CONTROL_REQUEST_METHOD, "GET"))
            .to_srv_request();
        assert_eq!(
            Preflight::evaluate(cors.policy(), req.head()),
            Preflight::Rejected
        );

        let req = TestRequest::default()
            .method(Method::OPTIONS)
            .insert_header((header::ORIGIN, ""))
            .insert_header((header::ACCESS_CONTROL_REQUEST_METHOD, "GET"))
            .to_srv_request();
        assert_eq!(
            Preflight::evaluate(cors.policy(), req.head()),
            Preflight::Rejected
        );

        let req = preflight_req().to_srv_request();
        assert_eq!(
            Preflight::evaluate(cors.policy(), req.head()),
            Preflight::Validated
        );
    }

    #[test]
    fn lenient_preflight_accepts_bare_options() {
        let cors = Cors::default().disable_strict_preflight();
        let req = TestRequest::default()
            .method(Method::OPTIONS)
            .to_srv_request();

        assert_eq!(
            Preflight::evaluate(cors.policy(), req.head()),
            Preflight::Validated
        );
    }

    #[actix_web::test]
    async fn fallback_without_marker_is_not_found() {
        let app = test::init_service(App::new().service(preflight_route())).await;

        let req = TestRequest::default()
            .method(Method::OPTIONS)
            .uri("/anything/at/all")
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn fallback_only_matches_options() {
        let app = test::init_service(App::new().service(preflight_route())).await;

        let req = TestRequest::get().uri("/").to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);

        let req = TestRequest::post().uri("/").to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn marker_is_visible_to_handlers() {
        let req = TestRequest::default().to_http_request();
        assert!(!is_preflight_handled(&req));

        req.extensions_mut().insert(PreflightHandled);
        assert!(is_preflight_handled(&req));
    }
}

use std::rc::Rc;

use actix_web::{
    body::{EitherBody, MessageBody},
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse},
    error::InternalError,
    http::header::{self, HeaderValue},
    Error, HttpMessage as _, HttpResponse,
};
use futures_util::future::{FutureExt as _, LocalBoxFuture};
use log::{debug, error};

use crate::{
    headers::CorsHeaders,
    origin::OriginDecision,
    preflight::{Preflight, PreflightHandled},
    CorsError, CorsPolicy,
};

/// Service wrapper for Cross-Origin Resource Sharing support.
///
/// Created by the [`Cors`](crate::Cors) builder. Resolves the origin policy and composes CORS
/// headers for every request, and answers preflight requests.
#[doc(hidden)]
#[derive(Debug, Clone)]
pub struct CorsMiddleware<S> {
    pub(crate) service: Rc<S>,
    pub(crate) policy: Rc<CorsPolicy>,
}

/// What the middleware decided to do with a request.
enum Intercept {
    /// Pass the request on to the wrapped service.
    Forward(ServiceRequest),

    /// Answer the request without calling the wrapped service.
    Respond(ServiceResponse),
}

/// Runs origin resolution and preflight handling, collecting headers into `cors_headers`.
async fn intercept(
    policy: &CorsPolicy,
    req: ServiceRequest,
    cors_headers: &mut CorsHeaders,
) -> Intercept {
    let decision = policy.origin.resolve(req.headers().get(header::ORIGIN)).await;

    let allow_origin = match decision {
        Ok(OriginDecision::Allow(origin)) => Some(origin),
        Ok(OriginDecision::Deny) => None,

        Ok(OriginDecision::Disabled) => {
            debug!("CORS disabled by origin policy; forwarding request untouched");
            return Intercept::Forward(req);
        }

        Ok(OriginDecision::Invalid) => {
            error!("CORS origin option resolved to an unusable value");
            return Intercept::Respond(req.error_response(CorsError::InvalidOrigin));
        }

        Err(err) => return Intercept::Respond(req.error_response(err)),
    };

    cors_headers.add_common(policy, allow_origin);

    match Preflight::evaluate(policy, req.head()) {
        Preflight::NotApplicable => Intercept::Forward(req),

        Preflight::Rejected => {
            debug!("preflight request is missing `Origin` or `Access-Control-Request-Method`");
            Intercept::Respond(req.error_response(CorsError::InvalidPreflight))
        }

        Preflight::Validated => {
            req.extensions_mut().insert(PreflightHandled);
            cors_headers.add_preflight(policy, req.head());

            if policy.preflight_continue {
                return Intercept::Forward(req);
            }

            // some browsers wait for a body on 204 responses unless told it is empty
            let res = HttpResponse::build(policy.options_success_status)
                .insert_header((header::CONTENT_LENGTH, HeaderValue::from_static("0")))
                .finish();

            Intercept::Respond(req.into_response(res))
        }
    }
}

impl<S, B> Service<ServiceRequest> for CorsMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,

    B: MessageBody + 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<ServiceResponse<EitherBody<B>>, Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let policy = Rc::clone(&self.policy);

        async move {
            let mut cors_headers = CorsHeaders::new();

            match intercept(&policy, req, &mut cors_headers).await {
                Intercept::Respond(mut res) => {
                    cors_headers.apply(res.headers_mut());
                    Ok(res.map_into_right_body())
                }

                Intercept::Forward(req) => match service.call(req).await {
                    Ok(mut res) => {
                        cors_headers.apply(res.headers_mut());
                        Ok(res.map_into_left_body())
                    }

                    // the error is rendered later; it carries its response with CORS headers
                    Err(err) => {
                        let mut res = err.error_response();
                        cors_headers.apply(res.headers_mut());
                        Err(InternalError::from_response(err, res).into())
                    }
                },
            }
        }
        .boxed_local()
    }
}

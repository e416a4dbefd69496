use actix_cors_policy::{preflight_route, Cors, OriginMatcher, OriginSetting};
use actix_web::{
    get, http::header, middleware::Logger, post, web, App, HttpResponse, HttpServer, Responder,
};
use regex::Regex;

#[get("/hi")]
async fn hi() -> impl Responder {
    HttpResponse::Ok()
        .content_type("application/json")
        .body(r#"{"message":"Hello, cross-origin world!"}"#)
}

#[post("/echo")]
async fn echo(body: web::Bytes) -> impl Responder {
    HttpResponse::Ok().body(body)
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    log::info!("starting HTTP server at http://localhost:8080");

    HttpServer::new(move || {
        let local = Regex::new(r"^http://localhost(:\d+)?$").expect("valid origin pattern");

        App::new()
            .wrap(
                Cors::default()
                    // decided per request; anything else from localhost is reflected
                    .origin_fn(move |origin: Option<String>| {
                        let local = local.clone();

                        async move {
                            Ok::<_, std::convert::Infallible>(match origin.as_deref() {
                                Some("http://project.local:8080") => {
                                    OriginSetting::from("http://project.local:8080")
                                }
                                _ => OriginSetting::from(vec![OriginMatcher::from(local)]),
                            })
                        }
                    })
                    .allowed_methods(vec!["GET", "POST"])
                    .allowed_headers([header::AUTHORIZATION, header::ACCEPT, header::CONTENT_TYPE])
                    .expose_headers([header::CONTENT_DISPOSITION])
                    // set preflight cache TTL
                    .max_age(3600),
            )
            .wrap(Logger::default())
            .service(hi)
            .service(echo)
            // must come after all application routes
            .service(preflight_route())
    })
    .workers(1)
    .bind(("127.0.0.1", 8080))?
    .run()
    .await
}

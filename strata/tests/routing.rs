use strata::{
    BoxError, HandlerContext, Kernel, KernelConfig, Method, RawRequest, RouteError, RouterOptions,
};

mod common;
use common::serve;

fn echo_params(kernel: &Kernel, method: Method, path: &str) {
    kernel
        .route(method, path, |ctx: HandlerContext| async move {
            let params: Vec<String> = ctx
                .request()
                .params()
                .iter()
                .map(|(key, value)| format!("{key}={value}"))
                .collect();
            ctx.response().send(params.join("&"));
        })
        .unwrap();
}

#[tokio::test]
async fn test_params_and_query() {
    let kernel = Kernel::new();
    kernel
        .route(Method::GET, "/users/{id}", |ctx: HandlerContext| async move {
            let id = ctx.request().param("id").unwrap_or_default().to_owned();
            let query = ctx.request().query();
            ctx.response().send(format!("{id}:{query:?}"));
        })
        .unwrap();

    let (transport, _) = serve(&kernel, RawRequest::get("/users/42?tab=posts")).await;
    assert_eq!(transport.body_text(), r#"42:[("tab", "posts")]"#);
}

#[tokio::test]
async fn test_method_selects_route() {
    let kernel = Kernel::new();
    echo_params(&kernel, Method::GET, "/items/{id}");

    let (transport, _) = serve(&kernel, RawRequest::get("/items/7")).await;
    assert_eq!(transport.body_text(), "id=7");

    let (transport, _) = serve(&kernel, RawRequest::new(Method::PUT, "/items/7")).await;
    assert_eq!(transport.status(), Some(404));
}

#[tokio::test]
async fn test_conflicting_route_is_rejected() {
    let kernel = Kernel::new();
    echo_params(&kernel, Method::GET, "/a/{id}");

    let err = kernel
        .route(Method::GET, "/a/{id}", |_: HandlerContext| async {})
        .unwrap_err();
    assert!(matches!(err, RouteError::Conflict { .. }));
    kernel
        .route(Method::POST, "/a/{id}", |_: HandlerContext| async {})
        .unwrap();
}

#[tokio::test]
async fn test_router_options_from_config() {
    let config = KernelConfig::from_json_str(
        r#"{
            "router": { "case_sensitive": false, "ignore_trailing_slash": true },
            "log_phases": false
        }"#,
    )
    .unwrap();
    let kernel = Kernel::with_config(config).unwrap();
    assert!(!kernel.config().log_phases);
    echo_params(&kernel, Method::GET, "/Docs/{Page}");

    let (transport, _) = serve(&kernel, RawRequest::get("/DOCS/Intro/")).await;
    assert_eq!(transport.status(), Some(200));
    assert_eq!(transport.body_text(), "Page=Intro");
}

#[tokio::test]
async fn test_long_params_do_not_match() {
    let config = KernelConfig::new().router(RouterOptions::new().max_param_length(4));
    let kernel = Kernel::with_config(config).unwrap();
    echo_params(&kernel, Method::GET, "/tags/{tag}");

    let (transport, _) = serve(&kernel, RawRequest::get("/tags/rust")).await;
    assert_eq!(transport.body_text(), "tag=rust");

    let (transport, _) = serve(&kernel, RawRequest::get("/tags/golang")).await;
    assert_eq!(transport.status(), Some(404));
}

#[tokio::test]
async fn test_rewritten_url_is_visible_to_handler() {
    let kernel = Kernel::new();
    kernel
        .route(Method::GET, "/v1/status", |ctx: HandlerContext| async move {
            let request = ctx.request();
            ctx.response()
                .send(format!("{} from {}", request.url(), request.original_url()));
        })
        .unwrap();
    let route_listener = strata::from_sync_fn(|event: &strata::KernelEvent| {
        let request = common::payload(event).request();
        request.set_query_string("verbose=1");
        Ok::<(), BoxError>(())
    });
    kernel.on(strata::Phase::Request, route_listener);

    let (transport, _) = serve(&kernel, RawRequest::get("/v1/status")).await;
    assert_eq!(transport.body_text(), "/v1/status?verbose=1 from /v1/status");
}

use std::fs;
use std::io::Read;
use std::path::PathBuf;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use tower::ServiceExt;

use stagehand::assets;
use stagehand::server::{build_router, ServerConfig};

/// A built output tree the way `stagehand build` would leave it:
/// stable-named entry document plus fingerprinted assets.
fn served_site() -> (tempfile::TempDir, Router) {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path().join("dist");
    fs::create_dir_all(root.join("assets")).expect("mkdir");
    fs::create_dir_all(root.join("docs")).expect("mkdir docs");

    fs::write(
        root.join("index.html"),
        "<!doctype html><html><body><div id=\"app\"></div></body></html>\n",
    )
    .expect("write index");
    fs::write(
        root.join("app.3f9c2d1a.js"),
        format!("// bundle\n{}", "function tick() {} ".repeat(200)),
    )
    .expect("write js");
    fs::write(
        root.join("assets/style.00aabbcc.css"),
        "body { margin: 0 } ".repeat(200),
    )
    .expect("write css");
    fs::write(root.join("assets/photo.7b7b7b7b.png"), vec![0u8; 4096]).expect("write png");
    fs::write(root.join("robots.txt"), "User-agent: *\n").expect("write robots");
    fs::write(root.join("docs/index.html"), "<html><body>docs</body></html>\n")
        .expect("write docs index");

    let config = ServerConfig {
        root,
        entry: PathBuf::from("index.html"),
        port: 8080,
        max_age_secs: 31_536_000,
        compress_types: assets::default_compress_types(),
    };
    (dir, build_router(config))
}

async fn get(router: &Router, uri: &str, headers: &[(&str, &str)]) -> axum::http::Response<Body> {
    let mut builder = Request::builder().uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    router
        .clone()
        .oneshot(builder.body(Body::empty()).expect("request"))
        .await
        .expect("response")
}

async fn body_bytes(response: axum::http::Response<Body>) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("collect body")
        .to_vec()
}

#[tokio::test]
async fn serves_files_with_content_type() {
    let (_dir, router) = served_site();
    let response = get(&router, "/app.3f9c2d1a.js", &[]).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "text/javascript; charset=utf-8"
    );
}

#[tokio::test]
async fn root_serves_entry_document() {
    let (_dir, router) = served_site();
    let response = get(&router, "/", &[]).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "text/html; charset=utf-8"
    );
    assert_eq!(response.headers().get("cache-control").unwrap(), "no-cache");
}

#[tokio::test]
async fn directory_resolves_to_its_index() {
    let (_dir, router) = served_site();
    let response = get(&router, "/docs", &[]).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_bytes(response).await;
    assert_eq!(body, b"<html><body>docs</body></html>\n");
}

#[tokio::test]
async fn unknown_route_falls_back_to_entry() {
    let (_dir, router) = served_site();
    let response = get(&router, "/dashboard/settings", &[]).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "text/html; charset=utf-8"
    );
    let body = body_bytes(response).await;
    assert!(String::from_utf8_lossy(&body).contains("id=\"app\""));
}

#[tokio::test]
async fn asset_shaped_miss_is_404() {
    let (_dir, router) = served_site();
    let response = get(&router, "/missing.js", &[]).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn encoded_asset_miss_is_still_404() {
    let (_dir, router) = served_site();
    // `%2E` decodes to `.`: an asset-shaped miss, not a client-side route.
    let response = get(&router, "/missing%2Ejs", &[]).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn encoded_asset_hit_is_served() {
    let (_dir, router) = served_site();
    let response = get(&router, "/app.3f9c2d1a%2Ejs", &[]).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "text/javascript; charset=utf-8"
    );
}

#[tokio::test]
async fn security_headers_on_every_response() {
    let (_dir, router) = served_site();
    for uri in ["/", "/app.3f9c2d1a.js", "/missing.js", "/some/route"] {
        let response = get(&router, uri, &[]).await;
        assert_eq!(
            response.headers().get("x-frame-options").unwrap(),
            "SAMEORIGIN",
            "{uri}"
        );
        assert_eq!(
            response.headers().get("x-content-type-options").unwrap(),
            "nosniff",
            "{uri}"
        );
        assert_eq!(
            response.headers().get("x-xss-protection").unwrap(),
            "1; mode=block",
            "{uri}"
        );
    }
}

#[tokio::test]
async fn fingerprinted_assets_are_immutable() {
    let (_dir, router) = served_site();
    let response = get(&router, "/assets/photo.7b7b7b7b.png", &[]).await;
    assert_eq!(
        response.headers().get("cache-control").unwrap(),
        "public, max-age=31536000, immutable"
    );
}

#[tokio::test]
async fn plain_text_files_get_no_cache_directive() {
    let (_dir, router) = served_site();
    let response = get(&router, "/robots.txt", &[]).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get("cache-control").is_none());
}

#[tokio::test]
async fn gzip_applied_to_compressible_types() {
    let (_dir, router) = served_site();
    let response = get(
        &router,
        "/assets/style.00aabbcc.css",
        &[("accept-encoding", "gzip, deflate")],
    )
    .await;
    assert_eq!(response.headers().get("content-encoding").unwrap(), "gzip");
    assert_eq!(response.headers().get("vary").unwrap(), "accept-encoding");

    let body = body_bytes(response).await;
    let mut decoder = flate2::read::GzDecoder::new(body.as_slice());
    let mut inflated = String::new();
    decoder.read_to_string(&mut inflated).expect("gunzip");
    assert!(inflated.starts_with("body { margin: 0 }"));
}

#[tokio::test]
async fn brotli_preferred_when_both_advertised() {
    let (_dir, router) = served_site();
    let response = get(
        &router,
        "/assets/style.00aabbcc.css",
        &[("accept-encoding", "gzip, br")],
    )
    .await;
    assert_eq!(response.headers().get("content-encoding").unwrap(), "br");
}

#[tokio::test]
async fn images_are_never_compressed() {
    let (_dir, router) = served_site();
    let response = get(
        &router,
        "/assets/photo.7b7b7b7b.png",
        &[("accept-encoding", "gzip, br")],
    )
    .await;
    assert!(response.headers().get("content-encoding").is_none());
    assert!(response.headers().get("vary").is_none());
}

#[tokio::test]
async fn small_bodies_stay_identity() {
    let (_dir, router) = served_site();
    // index.html is compressible but under the size floor.
    let response = get(&router, "/", &[("accept-encoding", "gzip")]).await;
    assert!(response.headers().get("content-encoding").is_none());
}

#[tokio::test]
async fn no_accept_encoding_means_identity() {
    let (_dir, router) = served_site();
    let response = get(&router, "/assets/style.00aabbcc.css", &[]).await;
    assert!(response.headers().get("content-encoding").is_none());
    let body = body_bytes(response).await;
    assert!(String::from_utf8_lossy(&body).starts_with("body { margin: 0 }"));
}

#[tokio::test]
async fn traversal_attempts_never_escape_the_root() {
    let (_dir, router) = served_site();
    for uri in ["/../Cargo.toml", "/a/../../b.txt", "/..%2f..%2fetc/passwd"] {
        let response = get(&router, uri, &[]).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
    }
}

#[tokio::test]
async fn non_get_methods_are_rejected() {
    let (_dir, router) = served_site();
    let request = Request::builder()
        .method("POST")
        .uri("/")
        .body(Body::empty())
        .expect("request");
    let response = router.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(response.headers().get("allow").unwrap(), "GET, HEAD");
}

#[tokio::test]
async fn head_requests_are_served() {
    let (_dir, router) = served_site();
    let request = Request::builder()
        .method("HEAD")
        .uri("/app.3f9c2d1a.js")
        .body(Body::empty())
        .expect("request");
    let response = router.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("cache-control").unwrap(),
        "public, max-age=31536000, immutable"
    );
}

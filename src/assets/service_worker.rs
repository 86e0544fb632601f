//! Service worker reset.
//!
//! A production build may have registered a caching service worker for the
//! same `host:port`. Serving this script in its place makes the browser
//! install a worker that unregisters itself and reloads open tabs, so the
//! dev server is not shadowed by a stale production cache.

use axum::body::Body;
use axum::http::{header, HeaderValue, Response, StatusCode};

pub const SERVICE_WORKER_PATH: &str = "/service-worker.js";

const SCRIPT: &str = r#"self.addEventListener('install', function () {
  self.skipWaiting();
});

self.addEventListener('activate', function () {
  self.registration.unregister().then(function () {
    return self.clients.matchAll({ type: 'window' });
  }).then(function (clients) {
    clients.forEach(function (client) {
      client.navigate(client.url);
    });
  });
});
"#;

pub fn noop_response() -> Response<Body> {
    let mut response = Response::new(Body::from(SCRIPT));
    *response.status_mut() = StatusCode::OK;
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/javascript"),
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    response
}

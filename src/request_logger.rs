use rocket::fairing::{Fairing, Info, Kind};
use rocket::http::StatusClass;
use rocket::{Data, Request, Response};
use std::time::Instant;

/// Fairing that writes one access-log line per request.
///
/// Only method, path, status and latency are logged; bodies carry
/// credentials and are never touched.
pub struct RequestLogger;

#[rocket::async_trait]
impl Fairing for RequestLogger {
    fn info(&self) -> Info {
        Info {
            name: "Request Logger",
            kind: Kind::Request | Kind::Response,
        }
    }

    async fn on_request(&self, request: &mut Request<'_>, _: &mut Data<'_>) {
        request.local_cache(Instant::now);
    }

    async fn on_response<'r>(&self, request: &'r Request<'_>, response: &mut Response<'r>) {
        let elapsed_ms = request.local_cache(Instant::now).elapsed().as_secs_f64() * 1000.0;
        let status = response.status();
        let path = request.uri().path();

        if status.class() == StatusClass::ServerError {
            log::warn!("{} {} -> {} ({:.2}ms)", request.method(), path, status.code, elapsed_ms);
        } else {
            log::info!("{} {} -> {} ({:.2}ms)", request.method(), path, status.code, elapsed_ms);
        }
    }
}

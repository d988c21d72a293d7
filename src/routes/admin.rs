use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use log::info;
use warp::http::StatusCode;
use warp::reject;
use warp::reply::{json, Reply};
use warp::Filter;

use super::response::{Healthz, Success};
use crate::environment::Environment;

pub fn make_healthz_route(
    _environment: Environment,
) -> impl warp::Filter<Extract = (impl Reply,), Error = reject::Rejection> + Clone {
    warp::path("healthz")
        .and(warp::path::end())
        .and(warp::get())
        .map(move || {
            json(&Success::new(Healthz {
                name: info::NAME,
                revision: info::REVISION,
                timestamp: info::BUILD_TIMESTAMP,
                version: info::VERSION,
            }))
        })
}

pub type TerminationFuture = BoxFuture<'static, ()>;

pub type TerminationFunctionWrapper = Arc<dyn Fn() -> TerminationFuture + Send + Sync>;

/// `POST /terminate` asks both servers to shut down gracefully.
pub fn make_termination_route(
    environment: Environment,
    terminate: TerminationFunctionWrapper,
) -> impl warp::Filter<Extract = (impl Reply,), Error = reject::Rejection> + Clone {
    let handler = move || -> BoxFuture<'static, Result<StatusCode, std::convert::Infallible>> {
        let terminate = terminate.clone();
        let logger = environment.logger.clone();

        async move {
            info!(logger, "Termination requested");
            terminate().await;
            Ok(StatusCode::NO_CONTENT)
        }
        .boxed()
    };

    warp::path("terminate")
        .and(warp::path::end())
        .and(warp::post())
        .and_then(handler)
}

#[cfg(test)]
mod test {
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;
    use crate::environment::test_environment;

    #[tokio::test]
    async fn healthz_reports_the_version() {
        let filter = make_healthz_route(test_environment().0);

        let response = warp::test::request()
            .path("/healthz")
            .method("GET")
            .reply(&filter)
            .await;

        assert_eq!(response.status(), 200);

        let body: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body["ok"], true);
        assert_eq!(body["data"]["version"], info::VERSION);
        assert_eq!(body["data"]["name"], info::NAME);
    }

    #[tokio::test]
    async fn terminate_runs_the_callback() {
        let called = Arc::new(AtomicBool::new(false));

        let terminate: TerminationFunctionWrapper = {
            let called = called.clone();

            Arc::new(move || {
                let called = called.clone();
                async move { called.store(true, Ordering::SeqCst) }.boxed()
            })
        };

        let filter = make_termination_route(test_environment().0, terminate);

        let response = warp::test::request()
            .path("/terminate")
            .method("POST")
            .reply(&filter)
            .await;

        assert_eq!(response.status(), 204);
        assert!(called.load(Ordering::SeqCst));
    }
}

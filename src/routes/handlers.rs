use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, Logger};
use warp::{
    filters::multipart::FormData,
    http::StatusCode,
    reject,
    reply::{json, with_header, with_status, Reply},
};

use crate::environment::Environment;
use crate::errors::BackendError;
use crate::io::parse_upload;
use crate::recording::{CreationRequest, RenameRequest};
use crate::routes::{
    query::{IdQuery, UserQuery},
    rejection::{Context, Rejection},
    response::{Deleted, Success},
};
use crate::service::{self, SummaryRequest};

const SERVER_TIMING_HEADER: &str = "server-timing";
type RouteResult = Result<Box<dyn Reply>, reject::Rejection>;

/// Runs a handler body and adds the server-timing header to whatever it
/// returns, failures included.
async fn timed<F, R>(logger: Arc<Logger>, handler: F) -> RouteResult
where
    F: Future<Output = Result<R, Rejection>>,
    R: Reply + 'static,
{
    let start = Instant::now();

    let reply: Box<dyn Reply> = match handler.await {
        Ok(reply) => Box::new(reply),
        Err(rejection) => Box::new(rejection.into_reply(&logger)),
    };

    Ok(Box::new(with_header(
        reply,
        SERVER_TIMING_HEADER,
        format_server_timing(start.elapsed()),
    )))
}

pub async fn list(environment: Environment, query: UserQuery) -> RouteResult {
    let logger = environment.logger.clone();

    timed(logger, async move {
        let UserQuery { user_id } = query;
        let context = Context::list(user_id.clone());

        let recordings = service::list(&environment, user_id)
            .await
            .map_err(|e| Rejection::new(context, e))?;

        Ok::<_, Rejection>(json(&Success::new(recordings)))
    })
    .await
}

pub async fn create(environment: Environment, request: CreationRequest) -> RouteResult {
    let logger = environment.logger.clone();

    timed(logger, async move {
        let recording = service::create(&environment, request)
            .await
            .map_err(|e| Rejection::new(Context::create(), e))?;

        debug!(environment.logger, "Created recording"; "id" => %recording.id);

        Ok::<_, Rejection>(with_header(
            with_status(json(&Success::new(&recording)), StatusCode::CREATED),
            "location",
            environment.urls.recording(&recording.id).as_str(),
        ))
    })
    .await
}

pub async fn rename(environment: Environment, request: RenameRequest) -> RouteResult {
    let logger = environment.logger.clone();

    timed(logger, async move {
        let RenameRequest { id, new_name } = request;
        let context = Context::rename(id.clone());

        let recording = service::rename(&environment, id, new_name)
            .await
            .map_err(|e| Rejection::new(context, e))?;

        Ok::<_, Rejection>(json(&Success::new(recording)))
    })
    .await
}

pub async fn delete(environment: Environment, query: IdQuery) -> RouteResult {
    let logger = environment.logger.clone();

    timed(logger, async move {
        let IdQuery { id } = query;
        let context = Context::delete(id.clone());

        let id = service::delete(&environment, id)
            .await
            .map_err(|e| Rejection::new(context, e))?;

        Ok::<_, Rejection>(json(&Success::new(Deleted { id })))
    })
    .await
}

pub async fn retrieve(environment: Environment, id: String) -> RouteResult {
    let logger = environment.logger.clone();

    timed(logger, async move {
        let recording = service::retrieve(&environment, &id)
            .await
            .map_err(|e| Rejection::new(Context::retrieve(id.clone()), e))?;

        Ok::<_, Rejection>(json(&Success::new(recording)))
    })
    .await
}

pub async fn upload(environment: Environment, content: FormData) -> RouteResult {
    let logger = environment.logger.clone();

    timed(logger, async move {
        let error_handler = |e: BackendError| Rejection::new(Context::upload(), e);

        debug!(environment.logger, "Parsing submission...");
        let upload = parse_upload(content).await.map_err(error_handler)?;

        let recording = service::create_with_audio(&environment, upload)
            .await
            .map_err(error_handler)?;

        debug!(environment.logger, "Sending response..."; "id" => %recording.id);

        Ok::<_, Rejection>(json(&Success::new(recording)))
    })
    .await
}

pub async fn summarize(environment: Environment, request: SummaryRequest) -> RouteResult {
    let logger = environment.logger.clone();

    timed(logger, async move {
        let context = Context::summarize(request.audio_id.clone());

        let summary = service::summarize(&environment, request)
            .await
            .map_err(|e| Rejection::new(context, e))?;

        Ok::<_, Rejection>(json(&Success::new(summary)))
    })
    .await
}

fn format_server_timing(seconds: Duration) -> String {
    format!("handler;dur={}", seconds.as_secs_f64() * 1000.0)
}

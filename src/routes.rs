use std::sync::Arc;

use log::{warn, Logger};
use warp::http::StatusCode;
use warp::reject::{
    self, InvalidHeader, InvalidQuery, LengthRequired, MissingHeader, PayloadTooLarge, Reject,
    UnsupportedMediaType,
};
use warp::reply::{json, with_status, Json, Reply, WithStatus};
use warp::Filter;

use crate::environment::Environment;
use crate::errors::{BackendError, ErrorKind};

pub mod admin;
mod handlers;
pub mod query;
pub mod rejection;
pub mod response;

pub use internal::*;

use response::Failure;

/// The largest JSON body accepted by the non-upload routes.
pub const MAX_JSON_BYTES: u64 = 64 * 1024;

/// A JSON body that could not be parsed.
#[derive(Debug)]
struct MalformedJson(String);

impl Reject for MalformedJson {}

/// Renders the rejections warp raises on its own (bodies and queries
/// that fail to parse, oversized or unframed bodies, uploads that are not
/// multipart) in the same envelope as handler errors. Anything else, like
/// unmatched paths, falls through to warp’s default handling.
pub async fn format_rejection(
    logger: Arc<Logger>,
    rej: reject::Rejection,
) -> Result<WithStatus<Json>, reject::Rejection> {
    let message = if let Some(e) = rej.find::<MalformedJson>() {
        BackendError::MalformedBody(e.0.clone()).to_string()
    } else if let Some(e) = rej.find::<InvalidQuery>() {
        e.to_string()
    } else if let Some(e) = rej.find::<PayloadTooLarge>() {
        e.to_string()
    } else if let Some(e) = rej.find::<LengthRequired>() {
        e.to_string()
    } else if let Some(e) = rej.find::<UnsupportedMediaType>() {
        e.to_string()
    } else if let Some(e) = rej.find::<MissingHeader>() {
        e.to_string()
    } else if let Some(e) = rej.find::<InvalidHeader>() {
        e.to_string()
    } else {
        return Err(rej);
    };

    warn!(logger, "Rejected request"; "message" => &message);

    let failure = Failure::new(ErrorKind::ValidationError, message);

    Ok(with_status(json(&failure), StatusCode::BAD_REQUEST))
}

/// Reads a bounded body and parses it as JSON whatever content type it
/// was sent with.
fn json_body<T>() -> impl Filter<Extract = (T,), Error = reject::Rejection> + Clone
where
    T: serde::de::DeserializeOwned + Send + 'static,
{
    warp::body::content_length_limit(MAX_JSON_BYTES)
        .and(warp::body::bytes())
        .and_then(|raw: bytes::Bytes| async move {
            serde_json::from_slice::<T>(&raw)
                .map_err(|e| reject::custom(MalformedJson(e.to_string())))
        })
}

pub(crate) fn status_code_for(e: &BackendError) -> StatusCode {
    StatusCode::from_u16(e.kind().status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

/// Every recordings route, with errors rendered as envelopes.
pub fn make_api(
    environment: Environment,
) -> impl Filter<Extract = (impl Reply,), Error = reject::Rejection> + Clone {
    let logger = environment.logger.clone();

    make_list_route(environment.clone())
        .or(make_create_route(environment.clone()))
        .or(make_rename_route(environment.clone()))
        .or(make_delete_route(environment.clone()))
        .or(make_retrieve_route(environment.clone()))
        .or(make_upload_route(environment.clone()))
        .or(make_summarize_route(environment))
        .recover(move |r| format_rejection(logger.clone(), r))
}

mod internal {
    use warp::filters::multipart::form;
    use warp::filters::BoxedFilter;
    use warp::path::end;
    use warp::Filter;
    use warp::Reply;
    use warp::{delete, get as g, path as p, path::param as par, post, put, query};

    use super::{handlers, json_body, query as q};
    use crate::environment::Environment;
    use crate::recording::{CreationRequest, RenameRequest};
    use crate::service::SummaryRequest;

    type Route = BoxedFilter<(Box<dyn Reply>,)>;

    macro_rules! route_filter {
    ($route_variable:ident; $first:expr) => (let $route_variable = $route_variable.and($first););
    ($route_variable:ident; $first:expr, $($rest:expr),+) => (
        let $route_variable = $route_variable.and($first);
        route_filter!($route_variable; $($rest),+);
    )
}

    macro_rules! route {
    ($name:ident => $handler:ident, $route_variable:ident; $($filters:expr),+) => (
        pub fn $name(environment: Environment) -> Route {
            let r = environment.urls.recordings_path.clone();

            let $route_variable = warp::any()
                .map(move || environment.clone())
                .and(p(r));

            route_filter!($route_variable; $($filters),+);

            $route_variable.and_then(handlers::$handler)
                .boxed()
        }
    );
}

    route!(make_list_route => list, rt; end(), g(), query::<q::UserQuery>());
    route!(make_create_route => create, rt; end(), post(), json_body::<CreationRequest>());
    route!(make_rename_route => rename, rt; end(), put(), json_body::<RenameRequest>());
    route!(make_delete_route => delete, rt; end(), delete(), query::<q::IdQuery>());
    route!(make_retrieve_route => retrieve, rt; p("id"), par::<String>(), end(), g());
    route!(make_summarize_route => summarize, rt; p("summarize"), end(), post(), json_body::<SummaryRequest>());

    /// The upload limit comes from the configuration, so this route is
    /// built by hand.
    pub fn make_upload_route(environment: Environment) -> Route {
        let r = environment.urls.recordings_path.clone();
        let max_length = environment.config.max_upload_bytes;

        warp::any()
            .map(move || environment.clone())
            .and(p(r))
            .and(p("upload"))
            .and(end())
            .and(post())
            .and(form().max_length(max_length))
            .and_then(handlers::upload)
            .boxed()
    }
}

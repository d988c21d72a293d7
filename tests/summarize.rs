use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{json, Value};
use url::Url;
use warp::http::{Response, StatusCode};
use warp::Filter;

use lectern::errors::{BackendError, ErrorKind};
use lectern::summarize::{
    GeminiConfig, GeminiSummarizer, Summarizer, EMPTY_SUMMARY_PLACEHOLDER, INSTRUCTION,
};

const API_KEY: &str = "test-key";
const MODEL: &str = "test-model";
const AUDIO: &[u8] = b"OggS not really audio";

/// How the fake model answers.
#[derive(Clone)]
enum Model {
    Answer(Value),
    Status(u16),
    Slow(Duration),
}

/// Everything the fake model received.
type Received = Arc<Mutex<Vec<(Option<String>, Value)>>>;

/// Serves `/audio.ogg`, `/missing.ogg` and a `generateContent` endpoint on
/// an ephemeral port.
fn start_fake_server(model: Model) -> (SocketAddr, Received) {
    let received: Received = Arc::new(Mutex::new(vec![]));

    let audio = warp::path("audio.ogg").and(warp::get()).map(|| {
        Response::builder()
            .header("content-type", "audio/ogg")
            .body(AUDIO.to_vec())
            .unwrap()
    });

    let missing = warp::path("missing.ogg")
        .and(warp::get())
        .map(|| StatusCode::NOT_FOUND);

    let generate = {
        let received = received.clone();

        warp::path!("v1beta" / "models" / String)
            .and(warp::post())
            .and(warp::header::optional::<String>("x-goog-api-key"))
            .and(warp::body::json())
            .and_then(move |endpoint: String, key: Option<String>, body: Value| {
                let received = received.clone();
                let model = model.clone();

                async move {
                    assert_eq!(endpoint, format!("{}:generateContent", MODEL));
                    received.lock().unwrap().push((key, body));

                    let reply = match model {
                        Model::Answer(answer) => warp::reply::with_status(
                            warp::reply::json(&answer),
                            StatusCode::OK,
                        ),
                        Model::Status(status) => warp::reply::with_status(
                            warp::reply::json(&json!({ "error": { "code": status } })),
                            StatusCode::from_u16(status).unwrap(),
                        ),
                        Model::Slow(delay) => {
                            tokio::time::sleep(delay).await;
                            warp::reply::with_status(warp::reply::json(&json!({})), StatusCode::OK)
                        }
                    };

                    Ok::<_, Infallible>(reply)
                }
            })
    };

    let routes = audio.or(missing).or(generate);
    let (address, server) = warp::serve(routes).bind_ephemeral(([127, 0, 0, 1], 0));
    tokio::spawn(server);

    (address, received)
}

fn summarizer(address: SocketAddr, timeout: Duration) -> GeminiSummarizer {
    GeminiSummarizer::new(GeminiConfig {
        endpoint: Url::parse(&format!("http://{}/", address)).unwrap(),
        model: MODEL.to_owned(),
        api_key: API_KEY.to_owned(),
        timeout,
    })
    .expect("create summarizer")
}

fn audio_url(address: SocketAddr, name: &str) -> Url {
    Url::parse(&format!("http://{}/{}", address, name)).unwrap()
}

fn answer(parts: Value) -> Model {
    Model::Answer(json!({
        "candidates": [{ "content": { "role": "model", "parts": parts } }]
    }))
}

#[tokio::test]
async fn audio_is_sent_inline_with_the_instruction() {
    let (address, received) = start_fake_server(answer(json!([
        { "text": "A lecture on " },
        { "text": "eigenvalues." }
    ])));

    let summary = summarizer(address, Duration::from_secs(10))
        .summarize(&audio_url(address, "audio.ogg"))
        .await
        .expect("summarize audio");

    assert_eq!(summary, "A lecture on eigenvalues.");

    let received = received.lock().unwrap();
    assert_eq!(received.len(), 1);

    let (key, body) = &received[0];
    assert_eq!(key.as_deref(), Some(API_KEY));

    let parts = &body["contents"][0]["parts"];
    assert_eq!(parts[0]["text"], INSTRUCTION);
    assert_eq!(parts[1]["inline_data"]["mime_type"], "audio/ogg");
    assert_eq!(
        parts[1]["inline_data"]["data"],
        base64::Engine::encode(&base64::engine::general_purpose::STANDARD, AUDIO)
    );
}

#[tokio::test]
async fn empty_answers_become_the_placeholder() {
    let (address, _) = start_fake_server(Model::Answer(json!({ "candidates": [] })));

    let summary = summarizer(address, Duration::from_secs(10))
        .summarize(&audio_url(address, "audio.ogg"))
        .await
        .expect("summarize audio");

    assert_eq!(summary, EMPTY_SUMMARY_PLACEHOLDER);
}

#[tokio::test]
async fn missing_audio_is_a_fetch_failure() {
    let (address, received) = start_fake_server(answer(json!([{ "text": "unused" }])));
    let summarizer = summarizer(address, Duration::from_secs(10));

    let error = summarizer
        .summarize(&audio_url(address, "missing.ogg"))
        .await
        .unwrap_err();
    assert!(matches!(error, BackendError::FetchFailed { .. }));
    assert_eq!(error.kind(), ErrorKind::FetchFailed);

    // nothing listens on port 1
    let unreachable = Url::parse("http://127.0.0.1:1/lecture.webm").unwrap();
    let error = summarizer.summarize(&unreachable).await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::FetchFailed);

    assert!(received.lock().unwrap().is_empty());
}

#[tokio::test]
async fn model_errors_are_generation_failures() {
    for status in &[400, 403, 500, 503] {
        let (address, _) = start_fake_server(Model::Status(*status));

        let error = summarizer(address, Duration::from_secs(10))
            .summarize(&audio_url(address, "audio.ogg"))
            .await
            .unwrap_err();

        assert_eq!(error.kind(), ErrorKind::GenerationFailed, "status {}", status);
    }
}

#[tokio::test]
async fn malformed_answers_are_generation_failures() {
    let (address, _) = start_fake_server(Model::Answer(json!({ "candidates": "nope" })));

    let error = summarizer(address, Duration::from_secs(10))
        .summarize(&audio_url(address, "audio.ogg"))
        .await
        .unwrap_err();

    assert_eq!(error.kind(), ErrorKind::GenerationFailed);
}

#[tokio::test]
async fn slow_models_time_out() {
    let (address, _) = start_fake_server(Model::Slow(Duration::from_secs(5)));

    let error = summarizer(address, Duration::from_millis(500))
        .summarize(&audio_url(address, "audio.ogg"))
        .await
        .unwrap_err();

    assert_eq!(error.kind(), ErrorKind::GenerationFailed);
}

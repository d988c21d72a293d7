use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use futures::future::FutureExt;
use tokio::sync::mpsc;
use url::Url;
use warp::Filter;

use lectern::config::{get_flag, get_variable, get_variable_or, parse_variable_or};
use lectern::db::PgDb;
use lectern::environment::{Config, Environment, DEFAULT_MAX_UPLOAD_BYTES};
use lectern::routes;
use lectern::routes::admin::TerminationFunctionWrapper;
use lectern::store::S3Store;
use lectern::summarize::{GeminiConfig, GeminiSummarizer, DEFAULT_ENDPOINT, DEFAULT_MODEL};
use lectern::urls::Urls;
use log::{info, initialize_logger};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv::dotenv().ok();

    let logger = initialize_logger();

    #[cfg(feature = "env_logging")]
    let _guard = log::initialize_env_logging();

    let store = Arc::new(S3Store::from_env().expect("initialize S3 store from environment"));

    let main_port: u16 = get_variable("BACKEND_PORT")
        .parse()
        .expect("parse BACKEND_PORT as u16");
    let admin_port: u16 = get_variable("BACKEND_ADMIN_PORT")
        .parse()
        .expect("parse BACKEND_ADMIN_PORT as u16");

    info!(logger, "Starting..."; "main_port" => main_port, "admin_port" => admin_port);
    let logger = Arc::new(logger);

    info!(logger, "Creating database pool...");
    let connection_string = get_variable("BACKEND_DB_CONNECTION_STRING");
    let pool = sqlx::PgPool::connect(&connection_string)
        .await
        .expect("create database pool from BACKEND_DB_CONNECTION_STRING");
    let db = Arc::new(PgDb::new(pool));

    let summarizer = Arc::new(
        GeminiSummarizer::new(GeminiConfig {
            endpoint: Url::parse(&get_variable_or("BACKEND_SUMMARY_ENDPOINT", DEFAULT_ENDPOINT))
                .expect("parse BACKEND_SUMMARY_ENDPOINT as URL"),
            model: get_variable_or("BACKEND_SUMMARY_MODEL", DEFAULT_MODEL),
            api_key: get_variable("GEMINI_API_KEY"),
            timeout: Duration::from_secs(parse_variable_or("BACKEND_SUMMARY_TIMEOUT_SECS", 120)),
        })
        .expect("create summarization client"),
    );

    let urls = Arc::new(Urls::new(
        get_variable("BACKEND_BASE_URL"),
        get_variable("BACKEND_RECORDINGS_PATH"),
    ));

    let config = Config::new(
        get_flag("BACKEND_PERSIST_SUMMARIES"),
        parse_variable_or("BACKEND_MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES),
    );
    let environment = Environment::new(
        logger.clone(),
        db.clone(),
        urls,
        store,
        summarizer,
        config,
    );

    let (termination_sender, mut termination_receiver) = mpsc::channel::<()>(1);

    let terminate: TerminationFunctionWrapper = Arc::new(move || {
        let termination_sender = termination_sender.clone();

        async move {
            // the receiver only goes away once shutdown has begun
            let _ = termination_sender.send(()).await;
        }
        .boxed()
    });

    let should_terminate = async move {
        termination_receiver.recv().await;
    }
    .shared();

    let ctrlc = {
        let should_terminate = should_terminate.clone();
        let terminate = terminate.clone();

        let signal = tokio::signal::ctrl_c();

        async move {
            tokio::select! {
                _ = should_terminate => {},
                _ = signal => {
                    terminate().await;
                }
            }
        }
    };

    let main_server = {
        let should_terminate = should_terminate.clone();

        let routes = routes::make_api(environment.clone());

        let (_, main_server) =
            warp::serve(routes).bind_with_graceful_shutdown(([0, 0, 0, 0], main_port), async {
                should_terminate.await;
            });

        main_server
    };

    let admin_server = {
        let should_terminate = should_terminate.clone();

        let routes = routes::admin::make_healthz_route(environment.clone()).or(
            routes::admin::make_termination_route(environment.clone(), terminate),
        );

        let (_, admin_server) =
            warp::serve(routes).bind_with_graceful_shutdown(([0, 0, 0, 0], admin_port), async {
                should_terminate.await;
            });

        admin_server
    };

    tokio::join!(ctrlc, main_server, admin_server);

    info!(logger, "Closing database pool...");
    db.close().await;

    info!(logger, "Exiting gracefully...");

    Ok(())
}

//! Creates or upgrades the `recordings` schema by applying the movine
//! migrations. With `--reset`, first rolls back the most
//! recent migration.

use std::env;

use movine::Movine;
use postgres::{Client, NoTls};

use log::{debug, info, initialize_logger};

const DEFAULT_MIGRATIONS_DIR: &str = "./migrations";

fn main() {
    dotenv::dotenv().ok();

    let logger = initialize_logger();
    let reset = env::args().skip(1).any(|arg| arg == "--reset");

    let connection_string = env::var("BACKEND_DB_CONNECTION_STRING")
        .expect("could not read BACKEND_DB_CONNECTION_STRING");
    let migrations_dir =
        env::var("BACKEND_MIGRATIONS_DIR").unwrap_or_else(|_| DEFAULT_MIGRATIONS_DIR.to_owned());

    debug!(logger, "Connecting to database...");

    let client = Client::connect(&connection_string, NoTls).expect("could not connect to database");

    let mut movine = Movine::new(client);
    movine.set_migration_dir(&migrations_dir);

    if movine.status().is_err() {
        debug!(logger, "Initializing movine...");
        movine.initialize().expect("failed to initialize movine")
    }

    if reset {
        info!(logger, "Rolling back latest migration..."; "migrations_dir" => &migrations_dir);
        movine.down().expect("failed to roll back migration");
    }

    info!(logger, "Running migrations..."; "migrations_dir" => &migrations_dir);
    movine.up().expect("failed to run migrations");

    info!(logger, "Schema is ready.");
}

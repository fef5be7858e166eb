//! Disposable Postgres databases for integration tests.
//!
//! Tests read the server DSN from `SIFT_PG_DSN` and get a uniquely named database on it. The
//! database is dropped by [`TestDatabase::cleanup`], or on `Drop` when a test bails out early.

mod error;

pub use error::{Error, Result};

use std::{env, str::FromStr, thread};

use sqlx::{
	ConnectOptions, Connection, Executor,
	postgres::{PgConnectOptions, PgConnection},
};
use tokio::runtime::Builder;
use uuid::Uuid;

const ADMIN_DATABASES: [&str; 2] = ["postgres", "template1"];

pub struct TestDatabase {
	dsn: String,
	admin_options: PgConnectOptions,
	/// `None` once the database is gone.
	name: Option<String>,
}
impl TestDatabase {
	pub async fn new(base_dsn: &str) -> Result<Self> {
		let base_options = PgConnectOptions::from_str(base_dsn)
			.map_err(|err| Error::Setup(format!("Failed to parse SIFT_PG_DSN: {err}.")))?;
		let (admin_options, mut admin_conn) = connect_admin(&base_options).await?;
		let name = format!("sift_test_{}", Uuid::new_v4().simple());

		admin_conn
			.execute(format!(r#"CREATE DATABASE "{name}""#).as_str())
			.await
			.map_err(|err| Error::Setup(format!("Failed to create {name}: {err}.")))?;

		let dsn = base_options.database(&name).to_url_lossy().to_string();

		Ok(Self { dsn, admin_options, name: Some(name) })
	}

	pub fn dsn(&self) -> &str {
		&self.dsn
	}

	pub async fn cleanup(mut self) -> Result<()> {
		match self.name.take() {
			Some(name) => drop_database(&name, &self.admin_options).await,
			None => Ok(()),
		}
	}
}
impl Drop for TestDatabase {
	fn drop(&mut self) {
		let Some(name) = self.name.take() else {
			return;
		};
		let admin_options = self.admin_options.clone();
		// Tests drop this inside their own runtime, which cannot be blocked on.
		let cleanup = thread::spawn(move || {
			let result = Builder::new_current_thread()
				.enable_all()
				.build()
				.map_err(|err| Error::Cleanup(format!("Failed to start a runtime: {err}.")))
				.and_then(|runtime| runtime.block_on(drop_database(&name, &admin_options)));

			if let Err(err) = result {
				eprintln!("{err}");
			}
		});

		let _ = cleanup.join();
	}
}

/// The server DSN for Postgres-backed tests, if one is configured.
pub fn env_dsn() -> Option<String> {
	env::var("SIFT_PG_DSN").ok().filter(|dsn| !dsn.trim().is_empty())
}

async fn connect_admin(
	base_options: &PgConnectOptions,
) -> Result<(PgConnectOptions, PgConnection)> {
	let mut last_err = None;

	for database in ADMIN_DATABASES {
		let options = base_options.clone().database(database);

		match PgConnection::connect_with(&options).await {
			Ok(conn) => return Ok((options, conn)),
			Err(err) => last_err = Some(err),
		}
	}

	Err(Error::Setup(format!("Failed to connect to an admin database: {last_err:?}.")))
}

async fn drop_database(name: &str, admin_options: &PgConnectOptions) -> Result<()> {
	let mut conn = PgConnection::connect_with(admin_options)
		.await
		.map_err(|err| Error::Cleanup(format!("Failed to connect to admin database: {err}.")))?;

	// Stray pool connections would block the drop.
	let _ = sqlx::query(
		"\
SELECT pg_terminate_backend(pid)
FROM pg_stat_activity
WHERE datname = $1 AND pid <> pg_backend_pid()",
	)
	.bind(name)
	.fetch_all(&mut conn)
	.await;

	conn.execute(format!(r#"DROP DATABASE IF EXISTS "{name}""#).as_str())
		.await
		.map_err(|err| Error::Cleanup(format!("Failed to drop {name}: {err}.")))?;

	Ok(())
}

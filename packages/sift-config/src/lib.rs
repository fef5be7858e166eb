mod error;
mod types;

pub use error::{Error, Result};
pub use types::{Config, Index, IndexSync, Postgres, Ranking, Retry, Search, Service, Storage};

use std::{fs, path::Path};

const BLEND_WEIGHT_TOLERANCE: f32 = 1e-6;

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;
	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

/// Parses and validates a config held in memory. Used by tests and embedders.
pub fn parse(raw: &str) -> Result<Config> {
	let mut cfg: Config = toml::from_str(raw).map_err(|err| Error::ParseInline { source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.storage.postgres.dsn.trim().is_empty() {
		return Err(invalid("storage.postgres.dsn", "storage.postgres.dsn must be non-empty."));
	}
	if cfg.storage.postgres.pool_max_conns == 0 {
		return Err(invalid(
			"storage.postgres.pool_max_conns",
			"storage.postgres.pool_max_conns must be greater than zero.",
		));
	}
	if cfg.storage.retry.max_attempts == 0 {
		return Err(invalid(
			"storage.retry.max_attempts",
			"storage.retry.max_attempts must be greater than zero.",
		));
	}
	if cfg.storage.retry.max_backoff_ms < cfg.storage.retry.base_backoff_ms {
		return Err(invalid(
			"storage.retry.max_backoff_ms",
			"storage.retry.max_backoff_ms must be at least storage.retry.base_backoff_ms.",
		));
	}

	validate_index(&cfg.index)?;
	validate_search(&cfg.search)?;
	validate_ranking(&cfg.ranking)?;

	Ok(())
}

fn validate_index(index: &Index) -> Result<()> {
	if index.vector_dim == 0 {
		return Err(invalid("index.vector_dim", "index.vector_dim must be greater than zero."));
	}
	if index.cluster_count == 0 {
		return Err(invalid(
			"index.cluster_count",
			"index.cluster_count must be greater than zero.",
		));
	}
	if index.probe_count == 0 || index.probe_count > index.cluster_count {
		return Err(invalid(
			"index.probe_count",
			"index.probe_count must be between 1 and index.cluster_count.",
		));
	}
	if index.kmeans_iterations == 0 {
		return Err(invalid(
			"index.kmeans_iterations",
			"index.kmeans_iterations must be greater than zero.",
		));
	}
	if !index.retrain_churn_ratio.is_finite() {
		return Err(invalid(
			"index.retrain_churn_ratio",
			"index.retrain_churn_ratio must be a finite number.",
		));
	}
	if index.retrain_churn_ratio <= 0.0 || index.retrain_churn_ratio > 1.0 {
		return Err(invalid(
			"index.retrain_churn_ratio",
			"index.retrain_churn_ratio must be in the range (0.0, 1.0].",
		));
	}
	if index.min_cluster_size == 0 {
		return Err(invalid(
			"index.min_cluster_size",
			"index.min_cluster_size must be greater than zero.",
		));
	}
	if index.sync.poll_interval_ms == 0 {
		return Err(invalid(
			"index.sync.poll_interval_ms",
			"index.sync.poll_interval_ms must be greater than zero.",
		));
	}
	if index.sync.batch_size == 0 {
		return Err(invalid(
			"index.sync.batch_size",
			"index.sync.batch_size must be greater than zero.",
		));
	}
	if index.sync.change_retention_hours <= 0 {
		return Err(invalid(
			"index.sync.change_retention_hours",
			"index.sync.change_retention_hours must be greater than zero.",
		));
	}

	Ok(())
}

fn validate_search(search: &Search) -> Result<()> {
	if !search.default_threshold.is_finite() {
		return Err(invalid(
			"search.default_threshold",
			"search.default_threshold must be a finite number.",
		));
	}
	if !(-1.0..=1.0).contains(&search.default_threshold) {
		return Err(invalid(
			"search.default_threshold",
			"search.default_threshold must be in the range -1.0-1.0.",
		));
	}
	if search.default_limit == 0 {
		return Err(invalid(
			"search.default_limit",
			"search.default_limit must be greater than zero.",
		));
	}
	if search.candidate_k < search.default_limit {
		return Err(invalid(
			"search.candidate_k",
			"search.candidate_k must be at least search.default_limit.",
		));
	}
	if search.snippet_chars == 0 {
		return Err(invalid(
			"search.snippet_chars",
			"search.snippet_chars must be greater than zero.",
		));
	}
	if search.timeout_ms == 0 {
		return Err(invalid("search.timeout_ms", "search.timeout_ms must be greater than zero."));
	}

	Ok(())
}

fn validate_ranking(ranking: &Ranking) -> Result<()> {
	for (key, weight) in [
		("ranking.similarity_weight", ranking.similarity_weight),
		("ranking.boost_weight", ranking.boost_weight),
	] {
		if !weight.is_finite() {
			return Err(invalid(key, format!("{key} must be a finite number.")));
		}
		if !(0.0..=1.0).contains(&weight) {
			return Err(invalid(key, format!("{key} must be in the range 0.0-1.0.")));
		}
	}

	if (ranking.similarity_weight + ranking.boost_weight - 1.0).abs() > BLEND_WEIGHT_TOLERANCE {
		return Err(invalid(
			"ranking.boost_weight",
			"ranking.similarity_weight and ranking.boost_weight must sum to 1.0.",
		));
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	let log_level = cfg.service.log_level.trim();

	if log_level.is_empty() {
		cfg.service.log_level = "info".to_string();
	} else if log_level.len() != cfg.service.log_level.len() {
		cfg.service.log_level = log_level.to_string();
	}

	cfg.storage.postgres.dsn = cfg.storage.postgres.dsn.trim().to_string();
}

fn invalid(key: &'static str, message: impl Into<String>) -> Error {
	Error::Validation { key, message: message.into() }
}

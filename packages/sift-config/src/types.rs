use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	#[serde(default)]
	pub service: Service,
	pub storage: Storage,
	pub index: Index,
	#[serde(default)]
	pub search: Search,
	#[serde(default)]
	pub ranking: Ranking,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Service {
	pub log_level: String,
}
impl Default for Service {
	fn default() -> Self {
		Self { log_level: "info".to_string() }
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
	#[serde(default)]
	pub retry: Retry,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	#[serde(default = "default_pool_max_conns")]
	pub pool_max_conns: u32,
}

/// Bounded retry applied to every store call made by the engine.
#[derive(Debug, Clone, Deserialize)]
pub struct Retry {
	pub max_attempts: u32,
	pub base_backoff_ms: u64,
	pub max_backoff_ms: u64,
}
impl Default for Retry {
	fn default() -> Self {
		Self { max_attempts: 3, base_backoff_ms: 50, max_backoff_ms: 1_000 }
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct Index {
	/// Process-wide embedding dimensionality. Fixed at deployment.
	pub vector_dim: u32,
	#[serde(default = "default_cluster_count")]
	pub cluster_count: u32,
	#[serde(default = "default_probe_count")]
	pub probe_count: u32,
	/// Partitions smaller than this are scanned exactly and never clustered.
	#[serde(default = "default_exact_scan_threshold")]
	pub exact_scan_threshold: u32,
	#[serde(default = "default_kmeans_iterations")]
	pub kmeans_iterations: u32,
	/// Fraction of a partition that may change before its clusters are retrained.
	#[serde(default = "default_retrain_churn_ratio")]
	pub retrain_churn_ratio: f32,
	#[serde(default = "default_min_cluster_size")]
	pub min_cluster_size: u32,
	#[serde(default)]
	pub sync: IndexSync,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IndexSync {
	pub poll_interval_ms: u64,
	pub batch_size: u32,
	pub change_retention_hours: i64,
}
impl Default for IndexSync {
	fn default() -> Self {
		Self { poll_interval_ms: 500, batch_size: 256, change_retention_hours: 24 }
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct Search {
	pub default_threshold: f32,
	pub default_limit: u32,
	/// Number of raw candidates requested from the index before thresholding.
	pub candidate_k: u32,
	pub snippet_chars: u32,
	pub timeout_ms: u64,
}
impl Default for Search {
	fn default() -> Self {
		Self {
			default_threshold: 0.7,
			default_limit: 10,
			candidate_k: 100,
			snippet_chars: 200,
			timeout_ms: 2_000,
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct Ranking {
	pub similarity_weight: f32,
	pub boost_weight: f32,
}
impl Default for Ranking {
	fn default() -> Self {
		Self { similarity_weight: 0.8, boost_weight: 0.2 }
	}
}

fn default_pool_max_conns() -> u32 {
	8
}

fn default_cluster_count() -> u32 {
	100
}

fn default_probe_count() -> u32 {
	8
}

fn default_exact_scan_threshold() -> u32 {
	256
}

fn default_kmeans_iterations() -> u32 {
	12
}

fn default_retrain_churn_ratio() -> f32 {
	0.25
}

fn default_min_cluster_size() -> u32 {
	8
}

pub fn render_schema(vector_dim: u32) -> String {
	let init = include_str!("../../../sql/init.sql");
	let expanded = expand_includes(init);

	expanded.replace("<VECTOR_DIM>", &vector_dim.to_string())
}

fn expand_includes(sql: &str) -> String {
	let mut out = String::new();

	for line in sql.lines() {
		let trimmed = line.trim();

		if let Some(path) = trimmed.strip_prefix("\\ir ") {
			match path.trim() {
				"tables/001_upload_items.sql" =>
					out.push_str(include_str!("../../../sql/tables/001_upload_items.sql")),
				"tables/002_user_weight_profiles.sql" =>
					out.push_str(include_str!("../../../sql/tables/002_user_weight_profiles.sql")),
				"tables/003_index_changes.sql" =>
					out.push_str(include_str!("../../../sql/tables/003_index_changes.sql")),
				_ => out.push_str(line),
			}
		} else {
			out.push_str(line);
		}

		out.push('\n');
	}

	out
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn renders_every_table_with_the_vector_dim() {
		let sql = render_schema(1_536);

		assert!(!sql.contains("\\ir"));
		assert!(!sql.contains("<VECTOR_DIM>"));
		assert!(sql.contains("array_length(embedding, 1) = 1536"));

		for table in ["upload_items", "user_weight_profiles", "index_changes"] {
			let create = format!("CREATE TABLE IF NOT EXISTS {table}");

			assert!(sql.contains(&create), "Missing {table}.");
		}
	}
}

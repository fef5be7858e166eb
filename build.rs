use vergen_gitcl::{CargoBuilder, Emitter, GitclBuilder};

fn main() -> Result<(), Box<dyn std::error::Error>> {
	let mut emitter = Emitter::default();

	emitter.add_instructions(&CargoBuilder::default().target_triple(true).build()?)?;

	let git = GitclBuilder::default().sha(true).build()?;

	// Packaged sources carry no git metadata.
	if emitter.clone().add_instructions(&git)?.fail_on_error().emit().is_err() {
		println!("cargo:rustc-env=VERGEN_GIT_SHA=crates.io");

		emitter.emit()?;
	} else {
		emitter.add_instructions(&git)?.emit()?;
	}

	Ok(())
}

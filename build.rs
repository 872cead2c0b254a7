use vergen::{BuildBuilder, CargoBuilder, Emitter};

// Emits VERGEN_BUILD_TIMESTAMP and VERGEN_CARGO_* for the startup log line.
fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let mut emitter = Emitter::default();
    match BuildBuilder::all_build() {
        Ok(build) => {
            let _ = emitter.add_instructions(&build);
        }
        Err(e) => eprintln!("build metadata unavailable: {e}"),
    }
    match CargoBuilder::all_cargo() {
        Ok(cargo) => {
            let _ = emitter.add_instructions(&cargo);
        }
        Err(e) => eprintln!("cargo metadata unavailable: {e}"),
    }
    if let Err(e) = emitter.emit() {
        eprintln!("vergen emit skipped: {e}");
    }
}

fn main() {
    built::write_built_file().expect("failed to acquire build-time information");
    println!("cargo:rerun-if-changed=src/db/migrations");
}

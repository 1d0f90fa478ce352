fn main() {
    // Stamped into the startup log line
    let built = chrono::Utc::now()
        .format("%Y-%m-%d %H:%M:%S UTC")
        .to_string();
    println!("cargo:rustc-env=BUILD_DATE={}", built);
    println!("cargo:rerun-if-changed=build.rs");
}

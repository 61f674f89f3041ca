// Link with libva when the real driver is requested
use std::env;

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // tell cargo to link with libva.so and libva-drm.so
    if env::var_os("CARGO_FEATURE_LIBVA").is_some() {
        if let Ok(dir) = env::var("LIBVA_LIB_DIR") {
            println!("cargo:rustc-link-search=native={}", dir);
        }
        println!("cargo:rerun-if-env-changed=LIBVA_LIB_DIR");
        println!("cargo:rustc-link-lib=dylib=va");
        println!("cargo:rustc-link-lib=dylib=va-drm");
    }
}

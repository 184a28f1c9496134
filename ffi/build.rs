use std::path::PathBuf;

/// Optional directory that receives a copy of the generated header.
const HEADER_DIR_ENV: &str = "DOORBELLS_HEADER_DIR";

fn main() {
    println!("cargo:rerun-if-changed=src");
    println!("cargo:rerun-if-env-changed={HEADER_DIR_ENV}");

    let crate_dir = std::env::var("CARGO_MANIFEST_DIR").unwrap_or_else(|_| ".".to_string());
    let Ok(out_dir) = std::env::var("OUT_DIR") else {
        println!("cargo:warning=OUT_DIR unset; header generation skipped");
        return;
    };

    let bindings = match cbindgen::Builder::new()
        .with_crate(&crate_dir)
        .with_language(cbindgen::Language::C)
        .with_include_guard("DOORBELLS_H")
        .generate()
    {
        Ok(bindings) => bindings,
        Err(err) => {
            println!("cargo:warning=header generation skipped: {err}");
            return;
        }
    };

    // The returned flag only says whether the content changed; I/O errors panic.
    let header = PathBuf::from(out_dir).join("doorbells.h");
    let _changed = bindings.write_to_file(&header);
    println!("cargo:rustc-env=DOORBELLS_HEADER={}", header.display());

    if let Ok(dir) = std::env::var(HEADER_DIR_ENV) {
        let target = PathBuf::from(dir).join("doorbells.h");
        if let Err(err) = std::fs::copy(&header, &target) {
            println!("cargo:warning=could not copy header to {}: {err}", target.display());
        }
    }
}

// build.rs: Embed the Fluent message catalogs into a generated Rust source file
use std::fs;
use std::io::Write;
use std::path::Path;

fn main() {
    let locales_dir = "./locales";
    println!("cargo:rerun-if-changed={}", locales_dir);

    let out_dir = std::env::var("OUT_DIR").unwrap();
    let dest_path = Path::new(&out_dir).join("locales.rs");
    let mut out = fs::File::create(&dest_path).unwrap();

    // Sorted so the generated list (and the negotiation order) is stable
    let mut locales: Vec<_> = fs::read_dir(locales_dir)
        .unwrap()
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.join("main.ftl").exists())
        .collect();
    locales.sort();

    writeln!(out, "pub const EMBEDDED_LOCALES: &[(&str, &str)] = &[").unwrap();
    for path in locales {
        let locale = path.file_name().unwrap().to_string_lossy().into_owned();
        let ftl_path = path.join("main.ftl");
        println!("cargo:rerun-if-changed={}", ftl_path.display());
        let content = fs::read_to_string(&ftl_path).unwrap();
        writeln!(out, "    ({:?}, {:?}),", locale, content).unwrap();
    }
    writeln!(out, "];").unwrap();
}

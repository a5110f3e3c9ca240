use std::env;
use std::fs;
use std::process;

use log::info;
use wasmite::parser;

fn main() {
    pretty_env_logger::init();

    let path = match env::args().nth(1) {
        Some(path) => path,
        None => {
            eprintln!("Usage: wasmite <file.wasm>");
            process::exit(1);
        }
    };

    if let Err(e) = run(&path) {
        eprintln!("error: {}", e);
        process::exit(1);
    }
}

fn run(path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let bytes = fs::read(path).map_err(|e| format!("couldn't read {}: {}", path, e))?;
    info!("read {} bytes from {}", bytes.len(), path);

    let module = parser::parse(&bytes)?;
    println!("{}", module);

    let vm = module.instantiate(&[])?;
    println!("{}", vm);
    Ok(())
}

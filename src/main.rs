use std::process;

fn main() {
    if let Err(e) = assetflow::cli::run() {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

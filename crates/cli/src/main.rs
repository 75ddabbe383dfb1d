fn main() {
    if let Err(e) = kiln_cli::run() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

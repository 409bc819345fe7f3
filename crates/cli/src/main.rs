fn main() {
    if let Err(e) = jarweave_cli::run() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

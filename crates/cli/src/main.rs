fn main() {
    if let Err(err) = solscope_cli::run() {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

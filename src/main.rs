fn main() {
    if let Err(err) = cvewatch::cli::run() {
        cvewatch::ui::eprintln_error(&err);
        std::process::exit(cvewatch::exit::exit_code(&err));
    }
}

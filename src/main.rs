#[cfg(not(any(feature = "cli")))]
fn main() {}

#[cfg(feature = "cli")]
fn main() {
    if let Err(err) = litestab::cli::init(&litestab::prelude::CFG) {
        eprintln!("{}", err);
        std::process::exit(1);
    }
}

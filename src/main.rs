use gosling::prelude::*;

fn main() {
    if let Err(e) = LoadTest::initialize().and_then(|load_test| load_test.execute()) {
        // The logger may not be initialized yet.
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
#[ctor::ctor]
fn init_tests() {
    // capture tracing output per test; run with --nocapture to see it
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_test_writer()
        .try_init();
}

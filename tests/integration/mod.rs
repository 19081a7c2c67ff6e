#[path = "../common/mod.rs"]
mod common;

mod discovery_test;
mod catalog_update_test;

#[cfg(test)]
mod tests {
    use test_log::test;

    #[test]
    fn init_logging() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("trace")
            .try_init();
    }
}

pub static VERSION: &str = env!("CARGO_PKG_VERSION");
pub static NAME: &str = "convert-service";

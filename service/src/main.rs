use std::net::{IpAddr, Ipv6Addr, SocketAddr};

use convert::libre::check_libre;
use service::{app, settings::Settings, state::ServiceCollection};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    _ = dotenvy::dotenv();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().json().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber).expect("Could not init tracing.");

    let settings = Settings::from_env();
    if !check_libre(&settings.libre_path) {
        warn!("{} not found, document conversions will fail", settings.libre_path.display());
    }

    let services = ServiceCollection::build(&settings).await.expect("Could not build services.");
    let app = app(services, &settings);

    let addr = SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), settings.port);
    info!("listening on {}", &addr);
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await
        .expect("Server failed.");
}

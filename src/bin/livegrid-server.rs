/// LiveGrid WebSocket Server
///
/// Standalone server that serves live grid viewports over a demo
/// instruments table.

use livegrid::config::ServerConfig;
use livegrid::server::{demo_context, run_server};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = ServerConfig::from_env().map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
    let context = demo_context().map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;

    run_server(config, context).await
}

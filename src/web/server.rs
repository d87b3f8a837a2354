use actix_files::Files;
use actix_web::{middleware, web, App, HttpServer};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::info;

use crate::web::handlers;
use crate::web::models::AppState;

/// Registers every API route. Static thumbnail serving is added by the server.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(handlers::index)
        .service(handlers::list_videos)
        .service(handlers::stream_video)
        .service(handlers::get_thumbnail)
        .service(handlers::upload_video);
}

pub async fn run_server(
    addr: SocketAddr,
    state: AppState,
    shutdown_signal: Arc<Notify>,
) -> std::io::Result<()> {
    let data = web::Data::new(state);
    let thumbs_dir: PathBuf = data.thumbnails.dir().to_path_buf();

    let server = HttpServer::new(move || {
        App::new()
            .app_data(data.clone())
            .wrap(middleware::DefaultHeaders::new().add(("Access-Control-Allow-Origin", "*")))
            .configure(configure)
            .service(Files::new("/thumbs", thumbs_dir.clone()))
    })
    .bind(addr)?;

    info!("Starting video server on: http://{addr}");

    let server = server.run();
    let handle = server.handle();

    tokio::select! {
        result = server => result,
        _ = shutdown_signal.notified() => {
            info!("Shutdown signal received, stopping web server");
            handle.stop(true).await;
            Ok(())
        }
    }
}

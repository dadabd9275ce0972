use pathcall_lib::ServerOptions;
use pathcall_macro::schema_file;

schema_file!("pathcall_demo/src/demo.schema");

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let mut server = BackendServer::new(
        ServerOptions {
            port: 8080,
            allowed_cors_origins: vec![],
        },
        true,
    );
    server.handlers.bind_status(|| async { true });
    server.handlers.api.bind_ping(|msg: String| async move {
        tracing::info!(msg, "ping");
        "PONG".to_string()
    });
    server
        .handlers
        .api
        .bind_add(|values: Vec<i64>| async move { values.iter().sum() });
    server.on_connection(|peer| {
        let BackendPeer::Frontend(proxy) = peer;
        tokio::spawn(async move {
            match proxy.api.notify("welcome".to_string()).await {
                Ok(reply) => tracing::info!(reply, "frontend acknowledged"),
                Err(error) => tracing::warn!(%error, "notify failed"),
            }
        });
    });

    let accept_loop = server.run().await?;
    tokio::spawn(accept_loop);

    tokio::signal::ctrl_c().await?;
    server.stop()?;
    Ok(())
}

use std::time::Duration;

use pathcall_lib::TargetOptions;
use pathcall_macro::schema_file;

schema_file!("pathcall_demo/src/demo.schema");

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let mut frontend = FrontendRegistrar::new();
    frontend.api.bind_notify(|message: String| async move {
        tracing::info!(message, "notified by host");
        format!("ack:{message}")
    });

    let target = BackendTarget::connect(
        TargetOptions {
            address: "127.0.0.1".to_string(),
            port: 8080,
        },
        Role::Frontend,
    )
    .await?;
    frontend.attach(target.dispatcher());

    println!("status: {}", target.status().await?);
    println!("ping: {}", target.api.ping("hello".to_string()).await?);
    println!("add: {}", target.api.add(vec![1, 2, 39]).await?);

    // Stay up briefly so the host's welcome notification can arrive.
    tokio::time::sleep(Duration::from_millis(200)).await;
    Ok(())
}

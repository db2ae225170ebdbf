//! `stepflow server` — Start the Stepflow HTTP server.

pub async fn run(
    host: String,
    port: u16,
    db_path: String,
    template_dir: Option<String>,
) -> Result<(), String> {
    let config = stepflow_server::ServerConfig {
        host: host.clone(),
        port,
        db_path,
        template_dir,
    };

    println!("Starting Stepflow server on {}:{}...", host, port);

    let addr = stepflow_server::start_server(config).await?;
    println!("Stepflow server listening on http://{}", addr);

    // Keep the process running until interrupted
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| format!("Failed to listen for Ctrl+C: {}", e))?;

    println!("\nShutting down...");
    Ok(())
}

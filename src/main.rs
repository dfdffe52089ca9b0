#[tokio::main]
async fn main() {
    // Startup failures are already logged where they happen.
    if pacman_server::run_with_config().await.is_err() {
        std::process::exit(1);
    }
}

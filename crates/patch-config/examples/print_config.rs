/// Example program to print the loaded configuration
///
/// Run with: cargo run -p patch-config --example print_config

fn main() {
    let config = patch_config::PatchworkConfig::load();

    println!("=== Patchwork Configuration ===\n");

    println!("API Settings:");
    println!("  Base URL: {}", config.api.base_url);
    println!("  Token: {}", if config.api.token.is_some() { "<set>" } else { "<unset>" });
    println!("  Model Version: {:?}", config.api.model_version);
    println!("  Timeout: {}s", config.api.timeout_secs);
    println!();

    println!("Polling Settings:");
    println!("  Max Attempts: {}", config.polling.max_attempts);
    println!("  Initial Delay: {}ms", config.polling.initial_delay_ms);
    println!("  Processing Delay: {}ms", config.polling.processing_delay_ms);
    println!("  Backoff Factor: {}", config.polling.backoff_factor);
    println!("  Max Delay: {}ms", config.polling.max_delay_ms);
    println!("  Error Max Delay: {}ms", config.polling.error_max_delay_ms);
    println!();

    println!("Canvas Settings:");
    println!("  Library: {}", config.canvas.library);
    println!("  Path: {}", config.canvas.path.display());
}

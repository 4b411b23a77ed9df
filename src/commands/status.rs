use habit_sync::check_server;

use crate::config::Config;

/// Shows the server configuration and whether the server answers.
pub async fn run(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("Server Configuration");
    println!("====================");
    println!();

    let (Some(url), Some(api_key)) = (&config.server.url, &config.server.api_key) else {
        println!("Status: Not configured");
        println!();
        println!("Add to your config file:");
        println!();
        println!("  owner_id: \"your-user-id\"");
        println!("  server:");
        println!("    url: \"http://localhost:8080\"");
        println!("    api_key: \"your-api-key\"");
        println!();
        println!("Or set environment variables:");
        println!("  HABIT_OWNER_ID");
        println!("  HABIT_SERVER_URL");
        println!("  HABIT_API_KEY");
        return Ok(());
    };

    println!("Server:  {}", url);
    println!("API Key: {}...", mask_key(api_key));
    match &config.owner_id.value {
        Some(owner) => println!("Owner:   {}", owner),
        None => println!("Owner:   (not set)"),
    }
    println!();

    print!("Server status: ");
    if check_server(url).await {
        println!("✓ reachable");
    } else {
        println!("✗ unreachable");
    }

    Ok(())
}

fn mask_key(key: &str) -> &str {
    let end = key
        .char_indices()
        .nth(8)
        .map(|(index, _)| index)
        .unwrap_or(key.len());
    &key[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_key() {
        assert_eq!(mask_key("abcdefghijkl"), "abcdefgh");
        assert_eq!(mask_key("abc"), "abc");
        assert_eq!(mask_key("ééééééééé"), "éééééééé");
    }
}

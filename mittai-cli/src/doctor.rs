use mittai::{AiError, MittwaldProvider};

/// Print the defaults a host would pre-populate, optionally probing limits.
pub async fn run_setup(provider: &MittwaldProvider, probe: bool) -> anyhow::Result<()> {
    let data = provider.get_setup_data();
    println!("credential field: {}", data.key_config_name);
    for (operation, model) in &data.default_models {
        println!("  {:<32} {}", operation, model);
    }

    if probe {
        match provider.post_setup().await? {
            Some(w) => println!("\n⚠️  {}", w),
            None => println!("\n✅ No rate-limit concerns"),
        }
    }
    Ok(())
}

/// Validate the configured credential by listing models.
pub async fn run_auth_check(provider: &MittwaldProvider) -> anyhow::Result<()> {
    let endpoint = match provider.endpoint().await {
        Ok(e) => e,
        Err(e) => {
            println!("❌ {}", e);
            return Ok(());
        }
    };
    println!("Endpoint: {}", endpoint);

    match provider.verify_setup().await {
        Ok(count) => println!("✅ Credential valid, {} models visible", count),
        Err(e @ (AiError::RateLimited(_) | AiError::QuotaExceeded(_))) => {
            println!("⚠️  {} ({})", e, e.hint());
        }
        Err(e) => println!("❌ {} ({})", e, e.hint()),
    }
    Ok(())
}

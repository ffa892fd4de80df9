//! `kwtag profile` commands.

use anyhow::Result;

use crate::config::Config;
use crate::service::DictionaryService;

pub async fn run_create(config: &Config, client: &str) -> Result<()> {
    let service = DictionaryService::open(config).await?;
    let (profile, created) = service.create_profile(client).await?;
    if created {
        println!("Created profile '{}'.", profile.client_code);
    } else {
        println!(
            "Profile '{}' already exists ({} tokens).",
            profile.client_code,
            profile.dictionary.token_count()
        );
    }
    service.close().await;
    Ok(())
}

pub async fn run_list(config: &Config) -> Result<()> {
    let service = DictionaryService::open(config).await?;
    let clients = service.list_profiles().await?;
    if clients.is_empty() {
        println!("No profiles.");
    }
    for client in clients {
        println!("{}", client);
    }
    service.close().await;
    Ok(())
}

//! `kbsync identity`: show the principal the credentials resolve to.

use anyhow::Result;

use kb_sync_core::cloud::IdentityApi;

use crate::clients::ClientFactory;
use crate::config::Config;

pub async fn run_identity(config: &Config) -> Result<()> {
    let factory = ClientFactory::from_config(config)?;
    let identity = factory.sts().caller_identity().await?;

    println!("account: {}", identity.account);
    println!("arn: {}", identity.arn);
    println!("user id: {}", identity.user_id);
    println!("region: {}", config.aws.region);
    Ok(())
}

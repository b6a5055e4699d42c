use snake_arena::client::{config::bot_settings, ArenaClient, ClientConfig};
use snake_arena::strategies::parasite::Parasite;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let settings = bot_settings("parasite", "#845ef7");
    let mut client = ArenaClient::new(ClientConfig::with_endpoint(&settings.endpoint))?;
    client.login(&settings.uid, &settings.paste).await?;
    client
        .join(&settings.name, settings.color.as_deref())
        .await?;

    let mut strategy = Parasite::new();
    client.run(move |state| Ok(strategy.decide(state))).await
}

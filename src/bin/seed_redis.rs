/// Seeds a redis backend with one account and a handful of catalog tools,
/// then exercises the session gateway and the membership repo end to end.
///
/// Requires a reachable redis at `backend.redis_url` of the chosen settings:
/// $ cargo run --bin seed_redis -- --settings=settings/release.toml
use chrono::Utc;
use std::time::Duration;
use toolshelf::domain_model::*;
use toolshelf::domain_port::*;
use toolshelf::infra_redis::*;
use toolshelf::logger::*;
use toolshelf::settings::*;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _logger = Logger::new_bootstrap();

    let cli = Cli::parse();
    let project_settings = parse_settings(cli.settings.as_deref())?;
    let url = project_settings
        .backend
        .redis_url
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("backend.redis_url is not set"))?;

    let redis_client = redis::Client::open(url)?;
    let mut redis_manager = redis_client.get_connection_manager().await?;

    let pong: String = redis::cmd("PING").query_async(&mut redis_manager).await?;
    info!("PING -> {}", pong);

    let prefix = project_settings.backend.key_prefix.clone();
    let codec = JwtHs256Codec::new(JwtConfig {
        issuer: project_settings.jwt.issuer.clone(),
        audience: project_settings.jwt.audience.clone(),
        access_ttl: Duration::from_secs(project_settings.jwt.access_ttl_secs),
        refresh_ttl: Duration::from_secs(project_settings.jwt.refresh_ttl_secs),
        signing_key: std::env::var("JWT_SIGNING_KEY")
            .unwrap_or_else(|_| "my-dev-secret-key".to_string())
            .into_bytes(),
    });
    let gateway = RedisSessionGateway::new(redis_manager.clone(), prefix.clone(), codec);
    let repo = RedisMembershipRepo::new(redis_manager, prefix);

    // region catalog

    for (id, name, category) in [
        ("tool-1", "Formatter", "editing"),
        ("tool-2", "Linter", "quality"),
        ("tool-3", "Profiler", "performance"),
        ("tool-42", "Debugger", "runtime"),
    ] {
        repo.put_tool(&ToolRecord {
            id: ItemId::new(id),
            name: name.to_string(),
            description: format!("{} for everyday work", name),
            category: category.to_string(),
            url: None,
            created_at: Utc::now(),
        })
        .await?;
    }
    info!("catalog seeded");

    // endregion

    // region account

    let email = "seed@toolshelf.dev";
    let password = "seed-password";
    let user_id = gateway.create_account(email, password).await?;
    info!(%user_id, "account created");

    let session = gateway
        .sign_in(&Credentials {
            email: email.to_string(),
            password: password.to_string(),
        })
        .await?;
    info!(expires_at = %session.expires_at, "signed in");

    let refreshed = gateway.refresh_session().await?;
    info!(refreshed = refreshed.is_some(), "refresh rotated");

    // endregion

    // region membership

    let first = repo.add_membership(&user_id, &ItemId::new("tool-42")).await?;
    let second = repo.add_membership(&user_id, &ItemId::new("tool-42")).await?;
    info!(?first, ?second, "idempotent add");

    let _ = repo.add_membership(&user_id, &ItemId::new("tool-1")).await?;
    let entries = repo.list_membership(&user_id, true).await?;
    for entry in &entries {
        info!(
            item_id = %entry.item_id,
            joined = entry.record.is_some(),
            "bookmark"
        );
    }

    // endregion

    gateway.sign_out().await?;
    info!("signed out");

    Ok(())
}

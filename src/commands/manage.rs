use crate::commands::config::is_admin;
use crate::commands::send_chunked;
use crate::state::Context;
use poise::serenity_prelude as serenity;
use tracing::{info, warn};

/// Forget this channel's conversation context
#[poise::command(slash_command, guild_only)]
pub async fn clear(ctx: Context<'_>) -> Result<(), anyhow::Error> {
    let Some(session) = ctx.data().sessions.remove(ctx.channel_id().get()).await else {
        ctx.say("No había conversación activa en este canal.").await?;
        return Ok(());
    };
    let conversation = session.lock().await;

    if conversation.is_empty() {
        ctx.say("No había conversación activa en este canal.").await?;
        return Ok(());
    }

    ctx.say(format!(
        "Conversación reiniciada ({} mensajes y {} consultas olvidadas).",
        conversation.history().count(),
        conversation.query_count()
    ))
    .await?;
    Ok(())
}

/// Create a new conversation thread
#[poise::command(slash_command, guild_only)]
pub async fn thread(
    ctx: Context<'_>,
    #[description = "Thread name"] name: Option<String>,
) -> Result<(), anyhow::Error> {
    let thread_name = name.unwrap_or_else(|| format!("USITTEL - {}", ctx.author().name));

    let thread = ctx
        .channel_id()
        .create_thread(
            ctx.http(),
            serenity::CreateThread::new(thread_name.clone())
                .kind(serenity::ChannelType::PublicThread),
        )
        .await?;

    ctx.say(format!("Created thread: <#{}>", thread.id)).await?;
    Ok(())
}

/// Reload every data source now (admin only)
#[poise::command(slash_command, guild_only)]
pub async fn refresh(ctx: Context<'_>) -> Result<(), anyhow::Error> {
    if !is_admin(&ctx) {
        ctx.say("This command is admin-only.").await?;
        return Ok(());
    }
    ctx.defer().await?;

    info!(user = ctx.author().name, "Manual refresh requested");
    let catalog = ctx.data().tables.refresh().await;

    let mut out = format!("Datos recargados: {} fuentes activas", catalog.len());
    if !catalog.failures().is_empty() {
        let failed: Vec<&str> = catalog.failures().iter().map(|f| f.name.as_str()).collect();
        out.push_str(&format!(", con errores en: {}", failed.join(", ")));
    }
    ctx.say(out).await?;
    Ok(())
}

/// Check model connectivity and data status (admin only)
#[poise::command(slash_command, guild_only)]
pub async fn health(ctx: Context<'_>) -> Result<(), anyhow::Error> {
    if !is_admin(&ctx) {
        ctx.say("This command is admin-only.").await?;
        return Ok(());
    }
    ctx.defer().await?;

    let data = ctx.data();
    let mut out = String::from("**Estado del asistente**\n");

    if data.llm.has_api_key() {
        out.push_str("API key: configurada\n");
    } else {
        out.push_str("API key: **no configurada**\n");
    }

    let temperature = data.config.read().await.router_temperature;
    match data.assistant.ping(temperature).await {
        Ok(reply) => out.push_str(&format!(
            "Modelo `{}`: responde — \"{}\"\n",
            data.llm.model(),
            reply.trim()
        )),
        Err(e) => {
            warn!("Health check failed: {:#}", e);
            out.push_str(&format!("Modelo `{}`: **error** — {:#}\n", data.llm.model(), e));
        }
    }

    let catalog = data.tables.catalog().await;
    out.push_str(&format!(
        "Fuentes: {} activas, {} con error\n",
        catalog.len(),
        catalog.failures().len()
    ));
    out.push_str(&format!(
        "Conversaciones abiertas: {}\n",
        data.sessions.len().await
    ));

    send_chunked(&ctx, &out).await
}

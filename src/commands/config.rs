use crate::assistant::context::MAX_CONTEXT_WINDOW;
use crate::state::Context;

pub fn is_admin(ctx: &Context<'_>) -> bool {
    ctx.data().is_admin(ctx.author().id.get())
}

/// Configure assistant parameters (admin only)
#[poise::command(slash_command, guild_only)]
pub async fn config(
    ctx: Context<'_>,
    #[description = "sample_rows | preview_rows | context_window"] param: Option<String>,
    #[description = "New value"] value: Option<u32>,
) -> Result<(), anyhow::Error> {
    if !is_admin(&ctx) {
        ctx.say("This command is admin-only.").await?;
        return Ok(());
    }

    match (param.as_deref(), value) {
        // Show current config
        (None, _) => {
            let config = ctx.data().config.read().await;
            ctx.say(format!(
                "**Assistant Configuration:**\n\
                 `sample_rows`: {}\n\
                 `preview_rows`: {}\n\
                 `context_window`: {}\n\
                 `router_temperature`: {}\n\
                 `synth_temperature`: {}",
                config.sample_rows,
                config.preview_rows,
                config.context_window,
                config.router_temperature,
                config.synth_temperature
            ))
            .await?;
        }
        // Set a parameter
        (Some(key), Some(val)) => {
            let mut config = ctx.data().config.write().await;
            match key {
                "sample_rows" if val >= 1 => {
                    config.sample_rows = val;
                    ctx.say(format!("`sample_rows` set to {}", val)).await?;
                }
                "preview_rows" => {
                    config.preview_rows = val;
                    ctx.say(format!("`preview_rows` set to {}", val)).await?;
                }
                "context_window" if val as usize <= MAX_CONTEXT_WINDOW => {
                    config.context_window = val;
                    ctx.say(format!("`context_window` set to {}", val)).await?;
                }
                "sample_rows" => {
                    ctx.say("`sample_rows` must be at least 1").await?;
                }
                "context_window" => {
                    ctx.say(format!("`context_window` must be at most {}", MAX_CONTEXT_WINDOW))
                        .await?;
                }
                _ => {
                    ctx.say(format!(
                        "Unknown param `{}`. Valid: `sample_rows`, `preview_rows`, `context_window`",
                        key
                    ))
                    .await?;
                }
            }
        }
        (Some(_), None) => {
            ctx.say("Provide both `param` and `value`. Example: `/usittel config preview_rows 20`")
                .await?;
        }
    }

    Ok(())
}

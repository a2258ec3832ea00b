use poise::CreateReply;
use tracing::info;

use crate::error::Result;
use crate::reply::success;
use crate::Context;

/// flush the document cache
#[poise::command(slash_command, owners_only)]
pub async fn clear(ctx: Context<'_>) -> Result<()> {
    let flushed = ctx.data().db.flush_cache();
    info!("Flushed {} cached documents", flushed);
    ctx.send(
        CreateReply::default()
            .content(success(format!("cleared **{flushed}** cached documents")))
            .ephemeral(true),
    )
    .await?;
    Ok(())
}

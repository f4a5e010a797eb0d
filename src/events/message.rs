use poise::serenity_prelude as serenity;
use tracing::{debug, info, warn};

use super::discord::{drop_message, SerenityDropChannel};
use crate::pog::DropOutcome;
use crate::{Data, Error};

/// Handle incoming messages
pub async fn handle_message(
    ctx: &serenity::Context,
    msg: &serenity::Message,
    data: &Data,
) -> Result<(), Error> {
    // Only the drop source is ever parsed; skip the conversion for everyone else
    if !data.detector.is_source(msg.author.id.get()) {
        return Ok(());
    }

    let channel = SerenityDropChannel::new(ctx.http.clone(), msg.channel_id, msg.id);
    let outcome = data.detector.handle(&drop_message(msg), &channel).await?;

    match outcome {
        DropOutcome::Dispatched => {
            info!("Drop {} acknowledged, verification queued", msg.id);
        }
        DropOutcome::QueueFull => {
            warn!("Drop {} acknowledged but not verified: queue full", msg.id);
        }
        DropOutcome::Ignored(reason) => {
            debug!("Ignoring message {}: {:?}", msg.id, reason);
        }
    }

    Ok(())
}

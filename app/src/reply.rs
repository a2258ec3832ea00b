use poise::serenity_prelude::{
    self as serenity, CommandInteraction, ComponentInteraction, CreateInteractionResponse,
    CreateInteractionResponseFollowup, CreateInteractionResponseMessage, EditInteractionResponse,
    Message, ModalInteraction,
};
use poise::CreateReply;

use crate::error::Result;

pub fn fail(message: impl AsRef<str>) -> String {
    format!("❌ **| {}**", message.as_ref())
}

pub fn success(message: impl AsRef<str>) -> String {
    format!("✅ **| {}**", message.as_ref())
}

/// The interaction a flow answers to once its initial response is spent.
#[derive(Clone)]
pub enum Responder {
    Command(CommandInteraction),
    Component(ComponentInteraction),
    Modal(ModalInteraction),
}

impl Responder {
    pub async fn followup(&self, ctx: &serenity::Context, builder: CreateInteractionResponseFollowup) -> Result<()> {
        match self {
            Self::Command(i) => i.create_followup(ctx, builder).await?,
            Self::Component(i) => i.create_followup(ctx, builder).await?,
            Self::Modal(i) => i.create_followup(ctx, builder).await?,
        };
        Ok(())
    }

    /// Answers the interaction, or follows up when it was already answered.
    pub async fn reply(&self, ctx: &serenity::Context, reply: CreateReply) -> Result<()> {
        let initial = CreateInteractionResponse::Message(
            reply
                .clone()
                .to_slash_initial_response(CreateInteractionResponseMessage::new()),
        );
        let answered = match self {
            Self::Command(i) => i.create_response(ctx, initial).await,
            Self::Component(i) => i.create_response(ctx, initial).await,
            Self::Modal(i) => i.create_response(ctx, initial).await,
        };
        if answered.is_ok() {
            return Ok(());
        }
        self.followup(ctx, reply.to_slash_followup_response(CreateInteractionResponseFollowup::new()))
            .await
    }

    /// Edits the message this interaction was answered with.
    pub async fn edit(&self, ctx: &serenity::Context, builder: EditInteractionResponse) -> Result<Message> {
        let message = match self {
            Self::Command(i) => i.edit_response(ctx, builder).await?,
            Self::Component(i) => i.edit_response(ctx, builder).await?,
            Self::Modal(i) => i.edit_response(ctx, builder).await?,
        };
        Ok(message)
    }

    pub async fn message(&self, ctx: &serenity::Context) -> Result<Message> {
        let message = match self {
            Self::Command(i) => i.get_response(&ctx.http).await?,
            Self::Component(i) => i.get_response(&ctx.http).await?,
            Self::Modal(i) => i.get_response(&ctx.http).await?,
        };
        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markers_wrap_the_message_in_bold() {
        assert_eq!(fail("nope"), "❌ **| nope**");
        assert_eq!(success("done"), "✅ **| done**");
    }
}

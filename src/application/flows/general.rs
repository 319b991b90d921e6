//! Greetings, help, reset and anything no other flow claims.
//!
//! Every turn here is terminal: no state is started and any leftover one ends.

use async_trait::async_trait;

use crate::domain::conversation::{
    ConversationContext, FlowData, FlowErrorKind, FlowResult, Intent, IntentType,
};

use super::FlowController;

const NOTHING_PENDING: &str = "There's nothing waiting for confirmation right now.";

#[derive(Debug, Default)]
pub struct GeneralFlow;

impl GeneralFlow {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl FlowController for GeneralFlow {
    async fn handle_intent(&self, intent: &Intent, _context: &ConversationContext) -> FlowResult {
        match intent.kind {
            IntentType::Greeting => FlowResult::finished(FlowData::Greeting).naturalized(),
            IntentType::Help => FlowResult::finished(FlowData::Help),
            IntentType::Reset => FlowResult::finished(FlowData::Reset),
            IntentType::Confirm | IntentType::Decline | IntentType::Edit => {
                FlowResult::finished(FlowData::Clarify).with_message(NOTHING_PENDING)
            }
            IntentType::NumericSelection => FlowResult::failure(
                FlowErrorKind::ClassificationMiss,
                "Numbers pick from a list. Ask me to show polls first.",
            )
            .with_data(FlowData::Clarify)
            .ending(),
            _ => FlowResult::finished(FlowData::Clarify).conversational(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::conversation::{RenderHint, UserRole};
    use crate::domain::foundation::UserId;

    fn idle() -> ConversationContext {
        ConversationContext::new(UserId::new("u").unwrap(), UserRole::User)
    }

    async fn handle(kind: IntentType) -> FlowResult {
        GeneralFlow::new()
            .handle_intent(&Intent::new(kind, 0.9, "text"), &idle())
            .await
    }

    #[tokio::test]
    async fn every_turn_is_terminal() {
        for kind in [
            IntentType::Greeting,
            IntentType::Help,
            IntentType::Reset,
            IntentType::Confirm,
            IntentType::NumericSelection,
            IntentType::General,
        ] {
            let result = handle(kind).await;
            assert!(result.context_update.is_none(), "{kind}");
            assert!(result.should_end_flow, "{kind}");
        }
    }

    #[tokio::test]
    async fn idle_confirmation_is_a_noop_clarification() {
        let result = handle(IntentType::Confirm).await;
        assert_eq!(result.data, Some(FlowData::Clarify));
        assert_eq!(result.message.as_deref(), Some(NOTHING_PENDING));
    }

    #[tokio::test]
    async fn free_text_is_answered_conversationally() {
        assert_eq!(handle(IntentType::General).await.render, RenderHint::Converse);
        assert_eq!(handle(IntentType::Greeting).await.render, RenderHint::Naturalize);
    }
}

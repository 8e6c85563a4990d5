//! Turn lifecycle hook contracts.

use scommon::UserId;
use sprovider::ProviderId;

use crate::{ChatError, ChatTurnResult, TurnPhase};

pub trait ChatTurnHooks: Send + Sync {
    fn on_turn_start(&self, _user_id: &UserId, _provider: ProviderId) {}

    fn on_phase_change(
        &self,
        _user_id: &UserId,
        _provider: ProviderId,
        _from: TurnPhase,
        _to: TurnPhase,
    ) {
    }

    fn on_turn_complete(&self, _user_id: &UserId, _result: &ChatTurnResult) {}

    /// `provider` is `None` when the turn failed before a provider was resolved.
    fn on_turn_failed(&self, _user_id: &UserId, _provider: Option<ProviderId>, _error: &ChatError) {
    }

    fn on_turn_cancelled(&self, _user_id: &UserId, _provider: ProviderId, _phase: TurnPhase) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopChatTurnHooks;

impl ChatTurnHooks for NoopChatTurnHooks {}

use std::collections::HashMap;

use actix::{Actor, Context, Recipient};
use uuid::Uuid;

use crate::protocol::ServerMessage;

pub mod handlers;
pub mod messages;

/// Notification Sink: 접속 중인 클라이언트 세션으로 이벤트를 중계한다.
/// 미접속 사용자의 이벤트는 조용히 버려진다 (폴링 fallback은 API 계층 몫).
#[derive(Default)]
pub struct SubscriptionManager {
    sessions: HashMap<Uuid, Recipient<ServerMessage>>,
}

impl SubscriptionManager {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Actor for SubscriptionManager {
    type Context = Context<Self>;
}

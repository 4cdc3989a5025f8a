use actix::{Message, Recipient};
use uuid::Uuid;

use crate::protocol::ServerMessage;

#[derive(Message)]
#[rtype(result = "()")]
pub struct Register {
    pub user_id: Uuid,
    pub recipient: Recipient<ServerMessage>,
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct Deregister {
    pub user_id: Uuid,
}

/// 단일 사용자에게 이벤트를 전달한다.
#[derive(Message)]
#[rtype(result = "()")]
pub struct Notify {
    pub user_id: Uuid,
    pub message: ServerMessage,
}

use actix::{Context, Handler};
use tracing::{debug, info};

use crate::subscript::messages::{Deregister, Notify, Register};
use crate::subscript::SubscriptionManager;

impl Handler<Register> for SubscriptionManager {
    type Result = ();

    fn handle(&mut self, msg: Register, _ctx: &mut Context<Self>) -> Self::Result {
        info!("Session registered for user {}", msg.user_id);
        self.sessions.insert(msg.user_id, msg.recipient);
    }
}

impl Handler<Deregister> for SubscriptionManager {
    type Result = ();

    fn handle(&mut self, msg: Deregister, _ctx: &mut Context<Self>) -> Self::Result {
        info!("Session deregistered for user {}", msg.user_id);
        self.sessions.remove(&msg.user_id);
    }
}

impl Handler<Notify> for SubscriptionManager {
    type Result = ();

    fn handle(&mut self, msg: Notify, _ctx: &mut Context<Self>) -> Self::Result {
        match self.sessions.get(&msg.user_id) {
            Some(recipient) => recipient.do_send(msg.message),
            None => debug!("No active session for user {}, dropping event", msg.user_id),
        }
    }
}

use std::collections::HashMap;
use std::time::Duration;

use actix::{Actor, Addr, AsyncContext, Context};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::battle::supervisor::BattleSupervisor;
use crate::env::MatchmakingSettings;
use crate::matchmaker::Matchmaker;
use crate::subscript::SubscriptionManager;

pub mod handlers;
pub mod messages;

/// pending에서 시작하며 나머지 상태는 전부 종결 상태다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Rejected,
    Expired,
    Cancelled,
}

impl InvitationStatus {
    pub fn is_terminal(&self) -> bool {
        *self != InvitationStatus::Pending
    }
}

/// 초대가 만들어진 경로. 큐 매칭 초대는 무산 시 양쪽을 다시 대기열로 돌린다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InvitationOrigin {
    QueueMatch,
    Direct,
}

#[derive(Debug, Clone, Serialize)]
pub struct Invitation {
    pub id: Uuid,
    pub from_user_id: Uuid,
    pub to_user_id: Uuid,
    pub from_cp: i64,
    pub to_cp: i64,
    pub status: InvitationStatus,
    pub origin: InvitationOrigin,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
}

impl Invitation {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Invitation Coordinator: 제안/수락/거절/만료 핸드셰이크를 소유한다.
pub struct InvitationCoordinator {
    pub(crate) invitations: HashMap<Uuid, Invitation>,
    pub(crate) settings: MatchmakingSettings,
    pub(crate) subscription_addr: Addr<SubscriptionManager>,
    pub(crate) matchmaker_addr: Addr<Matchmaker>,
    pub(crate) supervisor_addr: Addr<BattleSupervisor>,
}

impl InvitationCoordinator {
    pub fn new(
        settings: MatchmakingSettings,
        subscription_addr: Addr<SubscriptionManager>,
        matchmaker_addr: Addr<Matchmaker>,
        supervisor_addr: Addr<BattleSupervisor>,
    ) -> Self {
        Self {
            invitations: HashMap::new(),
            settings,
            subscription_addr,
            matchmaker_addr,
            supervisor_addr,
        }
    }

    /// 같은 (from, to) 쌍의 pending 초대가 이미 있는지
    pub(crate) fn has_active_pending(&self, from: Uuid, to: Uuid, now: DateTime<Utc>) -> bool {
        self.invitations.values().any(|inv| {
            inv.status == InvitationStatus::Pending
                && !inv.is_expired(now)
                && inv.from_user_id == from
                && inv.to_user_id == to
        })
    }
}

impl Actor for InvitationCoordinator {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        info!("InvitationCoordinator actor started.");
        // 만료 초대 정리 타이머
        ctx.run_interval(
            Duration::from_millis(self.settings.sweep_interval_ms),
            |_act, ctx| {
                ctx.address().do_send(messages::SweepExpired);
            },
        );
    }
}

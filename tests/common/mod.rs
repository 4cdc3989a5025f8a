#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use actix::{Actor, Addr, Context, Handler};
use async_trait::async_trait;
use parking_lot::Mutex;
use uuid::Uuid;

use battle_server::battle::supervisor::BattleSupervisor;
use battle_server::battle::types::{Battle, BattleRound, BattleState};
use battle_server::env::{BattleSettings, LimitSettings, MatchmakingSettings, RewardSettings};
use battle_server::errors::BattleResult;
use battle_server::invitation::messages::{Respond, SendInvitation};
use battle_server::invitation::{InvitationCoordinator, InvitationOrigin};
use battle_server::limits::DailyBattleLimiter;
use battle_server::matchmaker::messages::BindInvitations;
use battle_server::matchmaker::Matchmaker;
use battle_server::protocol::ServerMessage;
use battle_server::provider::RecordingRewardSink;
use battle_server::storage::{BattleStore, InMemoryBattleStore};
use battle_server::subscript::messages::Register;
use battle_server::subscript::SubscriptionManager;

/// 타이머가 테스트에 개입하지 않도록 느리게 잡은 매칭 설정.
/// 매칭/만료 틱은 테스트가 메시지로 직접 보낸다.
pub fn slow_matchmaking() -> MatchmakingSettings {
    MatchmakingSettings {
        match_tick_interval_ms: 60_000,
        sweep_interval_ms: 60_000,
        ..MatchmakingSettings::default()
    }
}

/// 라운드/타임아웃 타이머가 사실상 멈춰 있는 전투 설정
pub fn idle_battle() -> BattleSettings {
    BattleSettings {
        round_interval_ms: 60_000,
        timeout_check_interval_ms: 60_000,
        ..BattleSettings::default()
    }
}

/// 확률 요소를 제거한 전투 설정: 항상 공격, 회피/치명타 없음
pub fn deterministic_battle() -> BattleSettings {
    BattleSettings {
        critical_hit_chance: 0.0,
        dodge_chance: 0.0,
        action_probability_attack: 1.0,
        manual_action_cooldown_ms: 0,
        ..idle_battle()
    }
}

/// 라운드 커밋만 일정 시간 저장소에 붙잡아 두는 래퍼.
/// 커밋이 나가 있는 동안 actor가 받는 메시지의 동작을 검증할 때 쓴다.
struct SlowCommitStore {
    inner: Arc<InMemoryBattleStore>,
    commit_delay: Duration,
}

#[async_trait]
impl BattleStore for SlowCommitStore {
    async fn persist_battle(&self, battle: &Battle) -> BattleResult<()> {
        self.inner.persist_battle(battle).await
    }

    async fn persist_battle_state(&self, state: &BattleState) -> BattleResult<()> {
        self.inner.persist_battle_state(state).await
    }

    async fn append_battle_round(&self, round: &BattleRound) -> BattleResult<()> {
        self.inner.append_battle_round(round).await
    }

    async fn load_battle(&self, battle_id: Uuid) -> BattleResult<Battle> {
        self.inner.load_battle(battle_id).await
    }

    async fn load_battle_state(&self, battle_id: Uuid) -> BattleResult<BattleState> {
        self.inner.load_battle_state(battle_id).await
    }

    async fn load_rounds(&self, battle_id: Uuid) -> BattleResult<Vec<BattleRound>> {
        self.inner.load_rounds(battle_id).await
    }

    async fn load_ongoing_battle_for_user(&self, user_id: Uuid) -> BattleResult<Option<Battle>> {
        self.inner.load_ongoing_battle_for_user(user_id).await
    }

    async fn commit_round(&self, round: &BattleRound, state: &BattleState) -> BattleResult<()> {
        tokio::time::sleep(self.commit_delay).await;
        self.inner.commit_round(round, state).await
    }
}

pub struct Harness {
    pub subscriptions: Addr<SubscriptionManager>,
    pub matchmaker: Addr<Matchmaker>,
    pub supervisor: Addr<BattleSupervisor>,
    pub invitations: Addr<InvitationCoordinator>,
    pub store: Arc<InMemoryBattleStore>,
    pub rewards: Arc<RecordingRewardSink>,
    pub limiter: Arc<DailyBattleLimiter>,
}

impl Harness {
    pub fn boot(matchmaking: MatchmakingSettings, battle: BattleSettings) -> Self {
        Self::boot_inner(matchmaking, battle, None)
    }

    /// 라운드 커밋이 `commit_delay`만큼 저장소에 머무는 하니스
    pub fn boot_with_slow_commits(
        matchmaking: MatchmakingSettings,
        battle: BattleSettings,
        commit_delay: Duration,
    ) -> Self {
        Self::boot_inner(matchmaking, battle, Some(commit_delay))
    }

    fn boot_inner(
        matchmaking: MatchmakingSettings,
        battle: BattleSettings,
        commit_delay: Option<Duration>,
    ) -> Self {
        let store = InMemoryBattleStore::new();
        let supervisor_store: Arc<dyn BattleStore> = match commit_delay {
            Some(commit_delay) => Arc::new(SlowCommitStore {
                inner: store.clone(),
                commit_delay,
            }),
            None => store.clone(),
        };
        let rewards = RecordingRewardSink::new();
        let limiter = Arc::new(DailyBattleLimiter::new(LimitSettings::default()));

        let subscriptions = SubscriptionManager::new().start();
        let matchmaker = Matchmaker::new(matchmaking.clone()).start();
        let supervisor = BattleSupervisor::new(
            battle,
            RewardSettings::default(),
            supervisor_store,
            rewards.clone(),
            subscriptions.clone(),
            limiter.clone(),
        )
        .start();
        let invitations = InvitationCoordinator::new(
            matchmaking,
            subscriptions.clone(),
            matchmaker.clone(),
            supervisor.clone(),
        )
        .start();
        matchmaker.do_send(BindInvitations {
            addr: invitations.clone(),
        });

        Self {
            subscriptions,
            matchmaker,
            supervisor,
            invitations,
            store,
            rewards,
            limiter,
        }
    }

    /// 직접 초대를 보내고 수신자가 수락해 preparing 전투를 만든다
    pub async fn accepted_battle(&self, from: Uuid, to: Uuid, from_cp: i64, to_cp: i64) -> Battle {
        let invitation = self
            .invitations
            .send(SendInvitation {
                from_user_id: from,
                to_user_id: to,
                from_cp,
                to_cp,
                origin: InvitationOrigin::Direct,
            })
            .await
            .unwrap()
            .unwrap();

        self.invitations
            .send(Respond {
                invitation_id: invitation.id,
                user_id: to,
                accept: true,
            })
            .await
            .unwrap()
            .unwrap()
            .expect("acceptance should create a battle")
    }
}

/// 알림 이벤트를 수집하는 테스트용 세션
pub struct Collector {
    messages: Arc<Mutex<Vec<ServerMessage>>>,
}

impl Collector {
    /// 사용자를 구독시키고 수신한 이벤트 버퍼를 돌려준다
    pub fn subscribe(
        subscriptions: &Addr<SubscriptionManager>,
        user_id: Uuid,
    ) -> Arc<Mutex<Vec<ServerMessage>>> {
        let messages = Arc::new(Mutex::new(Vec::new()));
        let addr = Collector {
            messages: messages.clone(),
        }
        .start();
        subscriptions.do_send(Register {
            user_id,
            recipient: addr.recipient(),
        });
        messages
    }
}

impl Actor for Collector {
    type Context = Context<Self>;
}

impl Handler<ServerMessage> for Collector {
    type Result = ();

    fn handle(&mut self, msg: ServerMessage, _ctx: &mut Context<Self>) -> Self::Result {
        self.messages.lock().push(msg);
    }
}

use std::sync::Arc;
use std::time::Duration;

use actix::{
    Actor, ActorContext, ActorFutureExt, Addr, AsyncContext, Context, Handler, Message, WrapFuture,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::battle::rules::resolve_round;
use crate::battle::supervisor::messages::BattleFinished;
use crate::battle::supervisor::BattleSupervisor;
use crate::battle::types::{
    ActionKind, Battle, BattleRound, BattleState, BattleStatus, EndReason, PlayerSide,
};
use crate::env::{BattleSettings, RewardSettings};
use crate::errors::{BattleError, BattleResult};
use crate::metrics;
use crate::protocol::ServerMessage;
use crate::provider::{RewardGrant, RewardSink};
use crate::storage::BattleStore;
use crate::subscript::messages::Notify;
use crate::subscript::SubscriptionManager;

// --- Messages ---

/// preparing -> ongoing 전이. 클라이언트 카운트다운이 끝난 뒤에 호출된다.
#[derive(Message)]
#[rtype(result = "BattleResult<()>")]
pub struct StartBattle;

/// 수동 행동 제출. 해당 라운드는 충전으로 처리된다.
#[derive(Message)]
#[rtype(result = "BattleResult<ActionAck>")]
pub struct SubmitAction {
    pub user_id: Uuid,
    pub kind: ActionKind,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ActionAck {
    pub energy_stored: i32,
}

/// 현재 battle/state 스냅샷 (라운드 기록은 저장소에서 읽는다)
#[derive(Message)]
#[rtype(result = "BattleSnapshot")]
pub struct GetSnapshot;

#[derive(Debug, Clone, Serialize)]
pub struct BattleSnapshot {
    pub battle: Battle,
    pub state: BattleState,
}

/// 라운드 정산 틱 (내부 타이머)
#[derive(Message)]
#[rtype(result = "()")]
struct RoundTick;

/// 제한 시간 검사 틱 (내부 타이머, 라운드 주기와 독립)
#[derive(Message)]
#[rtype(result = "()")]
struct TimeoutCheck;

// --- Actor ---

/// 전투 하나의 단일 작성자. 행동 제출과 라운드 틱이 모두 이 actor의
/// 메일박스로 직렬화되므로 잃어버리는 갱신이 없다.
pub struct BattleActor {
    battle: Battle,
    state: BattleState,
    cfg: BattleSettings,
    rewards: RewardSettings,
    store: Arc<dyn BattleStore>,
    reward_sink: Arc<dyn RewardSink>,
    subscription_addr: Addr<SubscriptionManager>,
    supervisor_addr: Addr<BattleSupervisor>,
    /// 라운드 커밋이 저장소에 나가 있는 동안 true. 틱이 겹쳐도
    /// 한 라운드가 두 번 정산되지 않는다.
    round_in_flight: bool,
}

impl BattleActor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        battle: Battle,
        state: BattleState,
        cfg: BattleSettings,
        rewards: RewardSettings,
        store: Arc<dyn BattleStore>,
        reward_sink: Arc<dyn RewardSink>,
        subscription_addr: Addr<SubscriptionManager>,
        supervisor_addr: Addr<BattleSupervisor>,
    ) -> Self {
        Self {
            battle,
            state,
            cfg,
            rewards,
            store,
            reward_sink,
            subscription_addr,
            supervisor_addr,
            round_in_flight: false,
        }
    }

    fn notify_both(&self, message: ServerMessage) {
        for user_id in [self.battle.player1_id, self.battle.player2_id] {
            self.subscription_addr.do_send(Notify {
                user_id,
                message: message.clone(),
            });
        }
    }

    /// 패자의 CP는 설정된 하한 아래로 내려가지 않는다
    fn loser_cp_delta(&self, loser_cp: i64) -> i64 {
        let room = (loser_cp - self.rewards.min_combat_power).max(0);
        -self.rewards.loser_cp_loss.min(room)
    }

    fn reward_plan(&self, winner_id: Option<Uuid>) -> Vec<(Uuid, RewardGrant)> {
        match winner_id {
            Some(winner) => {
                let (loser, loser_cp) = if winner == self.battle.player1_id {
                    (self.battle.player2_id, self.battle.player2_cp)
                } else {
                    (self.battle.player1_id, self.battle.player1_cp)
                };
                vec![
                    (
                        winner,
                        RewardGrant {
                            xp_delta: self.rewards.winner_xp_bonus,
                            cp_delta: self.rewards.winner_cp_gain,
                            discount_percent: Some(self.rewards.winner_discount_percent),
                            discount_duration_hours: Some(self.rewards.discount_duration_hours),
                        },
                    ),
                    (
                        loser,
                        RewardGrant {
                            xp_delta: self.rewards.loser_xp_bonus,
                            cp_delta: self.loser_cp_delta(loser_cp),
                            discount_percent: None,
                            discount_duration_hours: None,
                        },
                    ),
                ]
            }
            // 무승부: 참가 XP만 지급된다
            None => [self.battle.player1_id, self.battle.player2_id]
                .into_iter()
                .map(|id| {
                    (
                        id,
                        RewardGrant {
                            xp_delta: self.rewards.loser_xp_bonus,
                            cp_delta: 0,
                            discount_percent: None,
                            discount_duration_hours: None,
                        },
                    )
                })
                .collect(),
        }
    }

    /// completed 전이. 보상 적용은 이 전이의 결정적 부수 효과다.
    fn complete(
        &mut self,
        ctx: &mut Context<Self>,
        winner_id: Option<Uuid>,
        end_reason: EndReason,
    ) {
        self.battle.status = BattleStatus::Completed;
        self.battle.end_reason = Some(end_reason);
        self.battle.winner_id = winner_id;
        self.battle.completed_at = Some(Utc::now());
        if winner_id.is_some() {
            self.battle.fee_discount_percent = Some(self.rewards.winner_discount_percent);
        }

        info!(
            "Battle {} completed ({:?}), winner: {:?}",
            self.battle.id, end_reason, winner_id
        );
        metrics::BATTLES_COMPLETED_TOTAL
            .with_label_values(&[match end_reason {
                EndReason::Hp => "hp",
                EndReason::Timeout => "timeout",
            }])
            .inc();

        if end_reason == EndReason::Timeout {
            self.notify_both(ServerMessage::BattleTimeout {
                battle_id: self.battle.id,
            });
        }
        self.notify_both(ServerMessage::BattleCompleted {
            battle_id: self.battle.id,
            winner_id,
            end_reason,
        });

        let battle = self.battle.clone();
        let state = self.state.clone();
        let grants = self.reward_plan(winner_id);
        let store = self.store.clone();
        let reward_sink = self.reward_sink.clone();

        // 저장과 보상 적용이 끝날 때까지 메일박스를 멈춘 뒤 actor를 내린다
        ctx.wait(
            async move {
                store.persist_battle(&battle).await?;
                store.persist_battle_state(&state).await?;
                for (user_id, grant) in grants {
                    reward_sink.apply_reward(user_id, grant).await?;
                }
                Ok::<_, BattleError>(())
            }
            .into_actor(self)
            .map(|res, act, ctx| {
                if let Err(e) = res {
                    error!("Failed to finalize battle {}: {}", act.battle.id, e);
                }
                act.supervisor_addr.do_send(BattleFinished {
                    battle_id: act.battle.id,
                });
                ctx.stop();
            }),
        );
    }

    /// 커밋된 라운드 결과를 현재 상태에 겹쳐 쓴다. 커밋이 저장소에 나가 있는
    /// 동안 메일박스는 계속 도니까, 그 사이 들어온 클릭(적립 에너지와 다음
    /// 라운드 예약 행동)을 통째 대입으로 지우면 안 된다. 체력은 라운드만
    /// 바꾸므로 그대로 덮고, 에너지는 라운드가 소모한 만큼만 차감한다.
    fn apply_committed_side(
        side: &mut PlayerSide,
        spent_energy: i32,
        spent_defense: i32,
        health_after: i32,
        resolved_at: DateTime<Utc>,
    ) {
        side.health = health_after;
        side.energy = (side.energy - spent_energy).max(0);
        side.defense_energy = (side.defense_energy - spent_defense).max(0);
        // 정산 스냅샷 이후 새 클릭이 없었을 때만 예약 행동이 소모된 것이다
        let clicked_during_commit = side
            .last_manual_action_at
            .map_or(false, |at| at > resolved_at);
        if !clicked_during_commit {
            side.pending_action = None;
        }
    }

    fn timed_out(&self) -> bool {
        match self.battle.started_at {
            Some(started_at) => {
                (Utc::now() - started_at).num_milliseconds() >= self.cfg.battle_duration_ms
            }
            None => false,
        }
    }
}

impl Actor for BattleActor {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        info!(
            "BattleActor started for battle {} ({} vs {})",
            self.battle.id, self.battle.player1_id, self.battle.player2_id
        );
        // 라운드 정산 타이머
        ctx.run_interval(Duration::from_millis(self.cfg.round_interval_ms), |_act, ctx| {
            ctx.address().do_send(RoundTick);
        });
        // 제한 시간 검사 타이머. 라운드 틱이 밀려도 타임아웃을 놓치지 않는다.
        ctx.run_interval(
            Duration::from_millis(self.cfg.timeout_check_interval_ms),
            |_act, ctx| {
                ctx.address().do_send(TimeoutCheck);
            },
        );
    }
}

// --- Handlers ---

impl Handler<StartBattle> for BattleActor {
    type Result = BattleResult<()>;

    fn handle(&mut self, _msg: StartBattle, ctx: &mut Context<Self>) -> Self::Result {
        if self.battle.status != BattleStatus::Preparing {
            return Err(BattleError::invalid_state(
                "battle",
                self.battle.id,
                format!("cannot start from {:?}", self.battle.status),
            ));
        }
        self.battle.status = BattleStatus::Ongoing;
        self.battle.started_at = Some(Utc::now());
        info!("Battle {} is now ongoing", self.battle.id);

        let battle = self.battle.clone();
        let store = self.store.clone();
        ctx.spawn(
            async move { store.persist_battle(&battle).await }
                .into_actor(self)
                .map(|res, act, _ctx| {
                    if let Err(e) = res {
                        error!("Failed to persist start of battle {}: {}", act.battle.id, e);
                    }
                }),
        );
        Ok(())
    }
}

impl Handler<SubmitAction> for BattleActor {
    type Result = BattleResult<ActionAck>;

    fn handle(&mut self, msg: SubmitAction, ctx: &mut Context<Self>) -> Self::Result {
        if self.battle.status != BattleStatus::Ongoing {
            return Err(BattleError::invalid_state(
                "battle",
                self.battle.id,
                format!("actions are not accepted while {:?}", self.battle.status),
            ));
        }

        let now = Utc::now();
        let cooldown_ms = self.cfg.manual_action_cooldown_ms;
        let battle = self.battle.clone();
        let side = self
            .state
            .side_mut(&battle, msg.user_id)
            .ok_or_else(|| BattleError::not_found("battle participant", msg.user_id))?;

        // 쿨다운 검사. 거부되어도 기존 쿨다운 시계는 건드리지 않는다.
        if let Some(last) = side.last_manual_action_at {
            if (now - last).num_milliseconds() < cooldown_ms {
                return Err(BattleError::RateLimited { cooldown_ms });
            }
        }

        // 라운드 마감 전 마지막 제출이 유효하다
        side.pending_action = Some(msg.kind);
        side.last_manual_action_at = Some(now);
        let energy_stored = match msg.kind {
            ActionKind::Attack => {
                side.energy = (side.energy + self.cfg.energy_per_click).min(self.cfg.max_energy);
                side.energy
            }
            ActionKind::Defend => {
                side.defense_energy = (side.defense_energy + self.cfg.defense_energy_per_click)
                    .min(self.cfg.max_defense_energy);
                side.defense_energy
            }
        };
        self.state.last_action_at = now;
        self.state.updated_at = now;

        let state = self.state.clone();
        let store = self.store.clone();
        ctx.spawn(
            async move { store.persist_battle_state(&state).await }
                .into_actor(self)
                .map(|res, act, _ctx| {
                    if let Err(e) = res {
                        warn!("Failed to persist action for battle {}: {}", act.battle.id, e);
                    }
                }),
        );

        Ok(ActionAck { energy_stored })
    }
}

impl Handler<RoundTick> for BattleActor {
    type Result = ();

    fn handle(&mut self, _msg: RoundTick, ctx: &mut Context<Self>) -> Self::Result {
        if self.battle.status != BattleStatus::Ongoing
            || self.round_in_flight
            || self.timed_out()
        {
            // 제한 시간이 지났으면 새 라운드를 열지 않는다. TimeoutCheck가 끝낸다.
            return;
        }

        let mut rng = rand::thread_rng();
        let outcome = resolve_round(&self.state, &self.cfg, &mut rng);
        let now = Utc::now();

        let round = BattleRound {
            battle_id: self.battle.id,
            round_number: self.state.current_round + 1,
            player1_action: outcome.player1.action,
            player2_action: outcome.player2.action,
            player1_damage: outcome.player1.damage_dealt,
            player2_damage: outcome.player2.damage_dealt,
            player1_critical: outcome.player1.critical,
            player2_critical: outcome.player2.critical,
            player1_health: outcome.player1.health_after,
            player2_health: outcome.player2.health_after,
            processed_at: now,
        };

        let mut next_state = self.state.clone();
        next_state.current_round = round.round_number;
        next_state.player1.health = outcome.player1.health_after;
        next_state.player1.energy = outcome.player1.energy_after;
        next_state.player1.defense_energy = outcome.player1.defense_energy_after;
        next_state.player1.pending_action = None;
        next_state.player2.health = outcome.player2.health_after;
        next_state.player2.energy = outcome.player2.energy_after;
        next_state.player2.defense_energy = outcome.player2.defense_energy_after;
        next_state.player2.pending_action = None;
        next_state.updated_at = now;

        // 커밋이 성공해야만 current_round가 전진한다. 실패하면 같은 라운드
        // 번호로 다음 틱에 재시도되므로 번호가 건너뛰지 않는다.
        let p1_spent_energy = self.state.player1.energy - outcome.player1.energy_after;
        let p1_spent_defense =
            self.state.player1.defense_energy - outcome.player1.defense_energy_after;
        let p2_spent_energy = self.state.player2.energy - outcome.player2.energy_after;
        let p2_spent_defense =
            self.state.player2.defense_energy - outcome.player2.defense_energy_after;

        self.round_in_flight = true;
        let store = self.store.clone();
        let commit_round = round.clone();
        ctx.spawn(
            async move { store.commit_round(&commit_round, &next_state).await }
                .into_actor(self)
                .map(move |res, act, ctx| {
                    act.round_in_flight = false;
                    match res {
                        Ok(()) => {
                            // 타임아웃이 먼저 전투를 끝냈다면 이 라운드는 버린다
                            if act.battle.status != BattleStatus::Ongoing {
                                return;
                            }
                            act.state.current_round = round.round_number;
                            Self::apply_committed_side(
                                &mut act.state.player1,
                                p1_spent_energy,
                                p1_spent_defense,
                                round.player1_health,
                                round.processed_at,
                            );
                            Self::apply_committed_side(
                                &mut act.state.player2,
                                p2_spent_energy,
                                p2_spent_defense,
                                round.player2_health,
                                round.processed_at,
                            );
                            act.state.updated_at = Utc::now();
                            metrics::ROUNDS_RESOLVED_TOTAL.inc();
                            act.notify_both(ServerMessage::RoundResolved {
                                battle_id: act.battle.id,
                                round: round.clone(),
                            });

                            let p1_dead = act.state.player1.health == 0;
                            let p2_dead = act.state.player2.health == 0;
                            if p1_dead || p2_dead {
                                let winner = match (p1_dead, p2_dead) {
                                    (true, true) => None,
                                    (true, false) => Some(act.battle.player2_id),
                                    (false, true) => Some(act.battle.player1_id),
                                    (false, false) => unreachable!(),
                                };
                                act.complete(ctx, winner, EndReason::Hp);
                            }
                        }
                        Err(BattleError::ConcurrencyConflict {
                            battle_id,
                            round_number,
                        }) => {
                            // 다른 작성자가 이겼다. 이번 시도의 변경은 폐기한다.
                            warn!(
                                "Discarding duplicate round {} for battle {}",
                                round_number, battle_id
                            );
                            metrics::ROUND_CONFLICTS_TOTAL.inc();
                        }
                        Err(e) => {
                            error!(
                                "Round {} commit failed for battle {}: {} (retrying next tick)",
                                round.round_number, act.battle.id, e
                            );
                        }
                    }
                }),
        );
    }
}

impl Handler<TimeoutCheck> for BattleActor {
    type Result = ();

    fn handle(&mut self, _msg: TimeoutCheck, ctx: &mut Context<Self>) -> Self::Result {
        if self.battle.status != BattleStatus::Ongoing || !self.timed_out() {
            return;
        }
        // 라운드 커밋이 저장소에 나가 있는 동안 전투를 끝내면 그 라운드의
        // 기록과 상태가 어긋난다. 커밋이 돌아온 뒤의 검사 틱이 마저 끝낸다.
        if self.round_in_flight {
            return;
        }

        // 남은 체력이 높은 쪽이 이긴다. 동률이면 무승부.
        let p1 = self.state.player1.health;
        let p2 = self.state.player2.health;
        let winner = match p1.cmp(&p2) {
            std::cmp::Ordering::Greater => Some(self.battle.player1_id),
            std::cmp::Ordering::Less => Some(self.battle.player2_id),
            std::cmp::Ordering::Equal => None,
        };
        warn!(
            "Battle {} hit the duration limit (hp {} vs {})",
            self.battle.id, p1, p2
        );
        self.complete(ctx, winner, EndReason::Timeout);
    }
}

impl Handler<GetSnapshot> for BattleActor {
    type Result = actix::MessageResult<GetSnapshot>;

    fn handle(&mut self, _msg: GetSnapshot, _ctx: &mut Context<Self>) -> Self::Result {
        actix::MessageResult(BattleSnapshot {
            battle: self.battle.clone(),
            state: self.state.clone(),
        })
    }
}

use std::collections::HashMap;
use std::sync::Arc;

use actix::{
    Actor, ActorFutureExt, Addr, AsyncContext, Context, Handler, ResponseActFuture, WrapFuture,
};
use tracing::{error, info};
use uuid::Uuid;

use crate::battle::actor::BattleActor;
use crate::battle::types::{Battle, BattleState};
use crate::env::{BattleSettings, RewardSettings};
use crate::errors::BattleResult;
use crate::limits::DailyBattleLimiter;
use crate::provider::RewardSink;
use crate::storage::BattleStore;
use crate::subscript::SubscriptionManager;

pub mod messages {
    use actix::{Addr, Message};
    use uuid::Uuid;

    use crate::battle::actor::BattleActor;
    use crate::battle::types::Battle;
    use crate::errors::BattleResult;

    /// 초대 수락(또는 직접 매칭 확정) 시 전투를 생성한다
    #[derive(Message)]
    #[rtype(result = "BattleResult<Battle>")]
    pub struct CreateBattle {
        pub player1_id: Uuid,
        pub player2_id: Uuid,
        pub player1_cp: i64,
        pub player2_cp: i64,
    }

    /// 진행 중 전투 actor 조회
    #[derive(Message)]
    #[rtype(result = "Option<Addr<BattleActor>>")]
    pub struct GetBattleAddr {
        pub battle_id: Uuid,
    }

    /// BattleActor가 종료 직전에 보낸다
    #[derive(Message)]
    #[rtype(result = "()")]
    pub struct BattleFinished {
        pub battle_id: Uuid,
    }
}

/// 전투 actor 레지스트리. battle id로 메시지를 라우팅하고,
/// 전투 생성 시 초기 상태를 저장한 뒤 actor를 띄운다.
pub struct BattleSupervisor {
    battles: HashMap<Uuid, Addr<BattleActor>>,
    cfg: BattleSettings,
    rewards: RewardSettings,
    store: Arc<dyn BattleStore>,
    reward_sink: Arc<dyn RewardSink>,
    subscription_addr: Addr<SubscriptionManager>,
    limiter: Arc<DailyBattleLimiter>,
}

impl BattleSupervisor {
    pub fn new(
        cfg: BattleSettings,
        rewards: RewardSettings,
        store: Arc<dyn BattleStore>,
        reward_sink: Arc<dyn RewardSink>,
        subscription_addr: Addr<SubscriptionManager>,
        limiter: Arc<DailyBattleLimiter>,
    ) -> Self {
        Self {
            battles: HashMap::new(),
            cfg,
            rewards,
            store,
            reward_sink,
            subscription_addr,
            limiter,
        }
    }
}

impl Actor for BattleSupervisor {
    type Context = Context<Self>;

    fn started(&mut self, _ctx: &mut Self::Context) {
        info!("BattleSupervisor actor started.");
    }
}

impl Handler<messages::CreateBattle> for BattleSupervisor {
    type Result = ResponseActFuture<Self, BattleResult<Battle>>;

    fn handle(&mut self, msg: messages::CreateBattle, _ctx: &mut Context<Self>) -> Self::Result {
        let battle = Battle::new(msg.player1_id, msg.player1_cp, msg.player2_id, msg.player2_cp);
        let state = BattleState::new(battle.id, self.cfg.max_health);
        let store = self.store.clone();

        let persist_battle = battle.clone();
        let persist_state = state.clone();
        let fut = async move {
            store.persist_battle(&persist_battle).await?;
            store.persist_battle_state(&persist_state).await?;
            Ok::<_, crate::errors::BattleError>(())
        };

        Box::pin(fut.into_actor(self).map(move |res, act, ctx| {
            if let Err(e) = res {
                error!("Failed to persist new battle {}: {}", battle.id, e);
                return Err(e);
            }

            let actor = BattleActor::new(
                battle.clone(),
                state,
                act.cfg.clone(),
                act.rewards.clone(),
                act.store.clone(),
                act.reward_sink.clone(),
                act.subscription_addr.clone(),
                ctx.address(),
            );
            let addr = actor.start();
            act.battles.insert(battle.id, addr);

            act.limiter.record_battle(battle.player1_id);
            act.limiter.record_battle(battle.player2_id);

            info!(
                "Battle {} created: {} (CP {}) vs {} (CP {})",
                battle.id, battle.player1_id, battle.player1_cp, battle.player2_id, battle.player2_cp
            );
            Ok(battle)
        }))
    }
}

impl Handler<messages::GetBattleAddr> for BattleSupervisor {
    type Result = Option<Addr<BattleActor>>;

    fn handle(&mut self, msg: messages::GetBattleAddr, _ctx: &mut Context<Self>) -> Self::Result {
        self.battles.get(&msg.battle_id).cloned()
    }
}

impl Handler<messages::BattleFinished> for BattleSupervisor {
    type Result = ();

    fn handle(&mut self, msg: messages::BattleFinished, _ctx: &mut Context<Self>) -> Self::Result {
        self.battles.remove(&msg.battle_id);
        info!("Battle {} unregistered", msg.battle_id);
    }
}

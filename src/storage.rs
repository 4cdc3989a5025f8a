use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::battle::types::{Battle, BattleRound, BattleState, BattleStatus};
use crate::errors::{BattleError, BattleResult};

/// 전투 기록 저장소. 실제 배포에서는 마켓플레이스의 DB가 이 trait 뒤에 붙는다.
///
/// `append_battle_round`는 `(battle_id, round_number)` 유일성을 강제해야 한다.
/// 동일 라운드가 두 번 기록되려 하면 두 번째 쓰기는 `ConcurrencyConflict`로
/// 거부되고, 호출자는 해당 라운드의 상태 변경을 폐기한다.
#[async_trait]
pub trait BattleStore: Send + Sync {
    async fn persist_battle(&self, battle: &Battle) -> BattleResult<()>;
    async fn persist_battle_state(&self, state: &BattleState) -> BattleResult<()>;
    async fn append_battle_round(&self, round: &BattleRound) -> BattleResult<()>;
    async fn load_battle(&self, battle_id: Uuid) -> BattleResult<Battle>;
    async fn load_battle_state(&self, battle_id: Uuid) -> BattleResult<BattleState>;
    async fn load_rounds(&self, battle_id: Uuid) -> BattleResult<Vec<BattleRound>>;
    async fn load_ongoing_battle_for_user(&self, user_id: Uuid) -> BattleResult<Option<Battle>>;

    /// 라운드 기록과 상태 갱신을 하나의 원자 단위로 커밋한다.
    /// 중간에 실패해도 라운드 기록과 HP가 어긋난 채 남지 않아야 한다.
    /// 구현체가 자기 백엔드의 트랜잭션 수단으로 직접 보장해야 한다.
    async fn commit_round(&self, round: &BattleRound, state: &BattleState) -> BattleResult<()>;
}

#[derive(Default)]
struct StoreInner {
    battles: HashMap<Uuid, Battle>,
    states: HashMap<Uuid, BattleState>,
    rounds: HashMap<Uuid, Vec<BattleRound>>,
    round_keys: HashSet<(Uuid, u32)>,
}

/// 인메모리 저장소 구현 (개발/테스트용)
#[derive(Default)]
pub struct InMemoryBattleStore {
    inner: RwLock<StoreInner>,
}

impl InMemoryBattleStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl BattleStore for InMemoryBattleStore {
    async fn persist_battle(&self, battle: &Battle) -> BattleResult<()> {
        let mut inner = self.inner.write();
        if let Some(existing) = inner.battles.get(&battle.id) {
            // completed 전투는 불변이다
            if existing.status == BattleStatus::Completed {
                return Err(BattleError::invalid_state(
                    "battle",
                    battle.id,
                    "completed battles are immutable",
                ));
            }
        }
        inner.battles.insert(battle.id, battle.clone());
        Ok(())
    }

    async fn persist_battle_state(&self, state: &BattleState) -> BattleResult<()> {
        self.inner
            .write()
            .states
            .insert(state.battle_id, state.clone());
        Ok(())
    }

    async fn append_battle_round(&self, round: &BattleRound) -> BattleResult<()> {
        let mut inner = self.inner.write();
        let key = (round.battle_id, round.round_number);
        if !inner.round_keys.insert(key) {
            return Err(BattleError::ConcurrencyConflict {
                battle_id: round.battle_id,
                round_number: round.round_number,
            });
        }
        inner
            .rounds
            .entry(round.battle_id)
            .or_default()
            .push(round.clone());
        Ok(())
    }

    async fn load_battle(&self, battle_id: Uuid) -> BattleResult<Battle> {
        self.inner
            .read()
            .battles
            .get(&battle_id)
            .cloned()
            .ok_or_else(|| BattleError::not_found("battle", battle_id))
    }

    async fn load_battle_state(&self, battle_id: Uuid) -> BattleResult<BattleState> {
        self.inner
            .read()
            .states
            .get(&battle_id)
            .cloned()
            .ok_or_else(|| BattleError::not_found("battle_state", battle_id))
    }

    async fn load_rounds(&self, battle_id: Uuid) -> BattleResult<Vec<BattleRound>> {
        Ok(self
            .inner
            .read()
            .rounds
            .get(&battle_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn load_ongoing_battle_for_user(&self, user_id: Uuid) -> BattleResult<Option<Battle>> {
        Ok(self
            .inner
            .read()
            .battles
            .values()
            .find(|b| {
                b.involves(user_id)
                    && matches!(b.status, BattleStatus::Preparing | BattleStatus::Ongoing)
            })
            .cloned())
    }

    async fn commit_round(&self, round: &BattleRound, state: &BattleState) -> BattleResult<()> {
        // 단일 락 아래에서 라운드와 상태를 함께 커밋한다
        let mut inner = self.inner.write();
        let key = (round.battle_id, round.round_number);
        if !inner.round_keys.insert(key) {
            return Err(BattleError::ConcurrencyConflict {
                battle_id: round.battle_id,
                round_number: round.round_number,
            });
        }
        inner
            .rounds
            .entry(round.battle_id)
            .or_default()
            .push(round.clone());
        inner.states.insert(state.battle_id, state.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::types::RoundAction;
    use chrono::Utc;

    fn round(battle_id: Uuid, number: u32) -> BattleRound {
        BattleRound {
            battle_id,
            round_number: number,
            player1_action: RoundAction::Attack,
            player2_action: RoundAction::Defend,
            player1_damage: 10,
            player2_damage: 0,
            player1_critical: false,
            player2_critical: false,
            player1_health: 100,
            player2_health: 90,
            processed_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn duplicate_round_number_is_rejected() {
        let store = InMemoryBattleStore::new();
        let battle_id = Uuid::new_v4();

        store.append_battle_round(&round(battle_id, 1)).await.unwrap();
        let err = store
            .append_battle_round(&round(battle_id, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, BattleError::ConcurrencyConflict { .. }));

        // 첫 기록만 남는다
        let rounds = store.load_rounds(battle_id).await.unwrap();
        assert_eq!(rounds.len(), 1);
    }

    #[tokio::test]
    async fn completed_battle_is_immutable() {
        let store = InMemoryBattleStore::new();
        let mut battle = Battle::new(Uuid::new_v4(), 100, Uuid::new_v4(), 110);
        battle.status = BattleStatus::Completed;
        store.persist_battle(&battle).await.unwrap();

        battle.winner_id = Some(battle.player1_id);
        let err = store.persist_battle(&battle).await.unwrap_err();
        assert!(matches!(err, BattleError::InvalidState { .. }));
    }

    #[tokio::test]
    async fn ongoing_battle_lookup_matches_either_player() {
        let store = InMemoryBattleStore::new();
        let battle = Battle::new(Uuid::new_v4(), 100, Uuid::new_v4(), 110);
        store.persist_battle(&battle).await.unwrap();

        let found = store
            .load_ongoing_battle_for_user(battle.player2_id)
            .await
            .unwrap();
        assert_eq!(found.map(|b| b.id), Some(battle.id));

        let missing = store
            .load_ongoing_battle_for_user(Uuid::new_v4())
            .await
            .unwrap();
        assert!(missing.is_none());
    }
}

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{BattleError, BattleResult};

/// 외부 Combat Power Provider. 엔진은 CP를 읽기만 한다.
#[async_trait]
pub trait CombatPowerProvider: Send + Sync {
    async fn combat_power(&self, user_id: Uuid) -> BattleResult<i64>;

    /// 일일 전투 한도 계산에 쓰이는 티어 조회
    async fn tier(&self, user_id: Uuid) -> BattleResult<String>;
}

/// 전투 종료 시 한 플레이어에게 적용되는 보상 묶음
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardGrant {
    pub xp_delta: i64,
    pub cp_delta: i64,
    pub discount_percent: Option<u32>,
    pub discount_duration_hours: Option<u32>,
}

/// 외부 Rewards collaborator
#[async_trait]
pub trait RewardSink: Send + Sync {
    async fn apply_reward(&self, user_id: Uuid, grant: RewardGrant) -> BattleResult<()>;
}

/// 개발/테스트용 인메모리 CP provider
#[derive(Default)]
pub struct InMemoryCombatPowerProvider {
    powers: RwLock<HashMap<Uuid, i64>>,
    tiers: RwLock<HashMap<Uuid, String>>,
}

impl InMemoryCombatPowerProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_power(&self, user_id: Uuid, cp: i64) {
        self.powers.write().insert(user_id, cp);
    }

    pub fn set_tier(&self, user_id: Uuid, tier: impl Into<String>) {
        self.tiers.write().insert(user_id, tier.into());
    }
}

#[async_trait]
impl CombatPowerProvider for InMemoryCombatPowerProvider {
    async fn combat_power(&self, user_id: Uuid) -> BattleResult<i64> {
        self.powers
            .read()
            .get(&user_id)
            .copied()
            .ok_or_else(|| BattleError::not_found("user", user_id))
    }

    async fn tier(&self, user_id: Uuid) -> BattleResult<String> {
        Ok(self
            .tiers
            .read()
            .get(&user_id)
            .cloned()
            .unwrap_or_else(|| "bronze".to_string()))
    }
}

/// 적용된 보상을 기록만 하는 sink. 실제 지갑/프로필 반영은 외부 책임이다.
#[derive(Default)]
pub struct RecordingRewardSink {
    grants: RwLock<Vec<(Uuid, RewardGrant)>>,
}

impl RecordingRewardSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn grants_for(&self, user_id: Uuid) -> Vec<RewardGrant> {
        self.grants
            .read()
            .iter()
            .filter(|(id, _)| *id == user_id)
            .map(|(_, g)| g.clone())
            .collect()
    }
}

#[async_trait]
impl RewardSink for RecordingRewardSink {
    async fn apply_reward(&self, user_id: Uuid, grant: RewardGrant) -> BattleResult<()> {
        tracing::info!(
            "Applying reward to {}: xp {:+}, cp {:+}, discount {:?}",
            user_id,
            grant.xp_delta,
            grant.cp_delta,
            grant.discount_percent
        );
        self.grants.write().push((user_id, grant));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_user_has_no_combat_power() {
        let provider = InMemoryCombatPowerProvider::new();
        let err = provider.combat_power(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, BattleError::NotFound { .. }));
    }

    #[tokio::test]
    async fn configured_power_and_tier_are_returned() {
        let provider = InMemoryCombatPowerProvider::new();
        let user = Uuid::new_v4();
        provider.set_power(user, 250);
        provider.set_tier(user, "gold");

        assert_eq!(provider.combat_power(user).await.unwrap(), 250);
        assert_eq!(provider.tier(user).await.unwrap(), "gold");

        // 티어 미지정 사용자는 기본 티어로 취급된다
        assert_eq!(provider.tier(Uuid::new_v4()).await.unwrap(), "bronze");
    }

    #[tokio::test]
    async fn recorded_grants_are_queryable_per_user() {
        let sink = RecordingRewardSink::new();
        let user = Uuid::new_v4();
        let grant = RewardGrant {
            xp_delta: 50,
            cp_delta: 10,
            discount_percent: Some(10),
            discount_duration_hours: Some(24),
        };
        sink.apply_reward(user, grant.clone()).await.unwrap();

        assert_eq!(sink.grants_for(user), vec![grant]);
        assert!(sink.grants_for(Uuid::new_v4()).is_empty());
    }
}

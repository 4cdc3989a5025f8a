use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 전투 생명주기 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BattleStatus {
    Preparing,
    Ongoing,
    Completed,
    Cancelled,
}

/// 전투가 종료된 사유
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    Hp,
    Timeout,
}

/// 플레이어가 제출하는 행동 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Attack,
    Defend,
}

/// 라운드 정산 시점에 확정되는 행동.
///
/// 수동 제출은 해당 라운드에서 충전(Recharge)으로 처리되고,
/// 저장된 에너지는 다음 라운드의 공격/방어에 소모된다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundAction {
    Attack,
    Defend,
    Recharge,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Battle {
    pub id: Uuid,
    pub player1_id: Uuid,
    pub player2_id: Uuid,
    pub player1_cp: i64,
    pub player2_cp: i64,
    pub winner_id: Option<Uuid>,
    pub status: BattleStatus,
    pub end_reason: Option<EndReason>,
    pub fee_discount_percent: Option<u32>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Battle {
    pub fn new(player1_id: Uuid, player1_cp: i64, player2_id: Uuid, player2_cp: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            player1_id,
            player2_id,
            player1_cp,
            player2_cp,
            winner_id: None,
            status: BattleStatus::Preparing,
            end_reason: None,
            fee_discount_percent: None,
            started_at: None,
            completed_at: None,
            created_at: Utc::now(),
        }
    }

    pub fn involves(&self, user_id: Uuid) -> bool {
        self.player1_id == user_id || self.player2_id == user_id
    }
}

/// 한 플레이어 측의 라운드별 가변 상태
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSide {
    pub health: i32,
    pub energy: i32,
    pub defense_energy: i32,
    /// 이번 라운드에 수동 제출된 행동 (충전 대상)
    pub pending_action: Option<ActionKind>,
    pub last_manual_action_at: Option<DateTime<Utc>>,
}

impl PlayerSide {
    pub fn new(max_health: i32) -> Self {
        Self {
            health: max_health,
            energy: 0,
            defense_energy: 0,
            pending_action: None,
            last_manual_action_at: None,
        }
    }
}

/// Battle과 1:1로 대응하는 진행 상태
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BattleState {
    pub battle_id: Uuid,
    pub current_round: u32,
    pub player1: PlayerSide,
    pub player2: PlayerSide,
    pub last_action_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BattleState {
    pub fn new(battle_id: Uuid, max_health: i32) -> Self {
        let now = Utc::now();
        Self {
            battle_id,
            current_round: 0,
            player1: PlayerSide::new(max_health),
            player2: PlayerSide::new(max_health),
            last_action_at: now,
            updated_at: now,
        }
    }

    pub fn side_mut(&mut self, battle: &Battle, user_id: Uuid) -> Option<&mut PlayerSide> {
        if battle.player1_id == user_id {
            Some(&mut self.player1)
        } else if battle.player2_id == user_id {
            Some(&mut self.player2)
        } else {
            None
        }
    }
}

/// 라운드별 불변 기록. `(battle_id, round_number)` 기준으로 유일하다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BattleRound {
    pub battle_id: Uuid,
    pub round_number: u32,
    pub player1_action: RoundAction,
    pub player2_action: RoundAction,
    pub player1_damage: i32,
    pub player2_damage: i32,
    pub player1_critical: bool,
    pub player2_critical: bool,
    pub player1_health: i32,
    pub player2_health: i32,
    pub processed_at: DateTime<Utc>,
}

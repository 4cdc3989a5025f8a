use rand::Rng;

use crate::battle::types::{ActionKind, BattleState, RoundAction};
use crate::env::BattleSettings;

/// 한 플레이어 측의 라운드 정산 결과
#[derive(Debug, Clone, PartialEq)]
pub struct SideOutcome {
    pub action: RoundAction,
    /// 이 플레이어가 상대에게 입힌 데미지
    pub damage_dealt: i32,
    pub critical: bool,
    /// 상대가 이 플레이어의 공격을 회피했는지
    pub dodged: bool,
    /// 이 플레이어의 공격이 상대 방어로 감소되었는지
    pub defended: bool,
    pub health_after: i32,
    pub energy_after: i32,
    pub defense_energy_after: i32,
}

/// 라운드 정산 결과 전체
#[derive(Debug, Clone, PartialEq)]
pub struct RoundOutcome {
    pub player1: SideOutcome,
    pub player2: SideOutcome,
    pub knockout: Option<Knockout>,
}

/// 체력 0으로 인한 종료. 동시 KO는 무승부로 처리한다.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Knockout {
    Player1Wins,
    Player2Wins,
    Draw,
}

/// 자동 행동 생성. 수동 입력이 없던 플레이어에게만 적용된다.
pub fn auto_action(cfg: &BattleSettings, rng: &mut impl Rng) -> ActionKind {
    if rng.gen::<f64>() < cfg.action_probability_attack {
        ActionKind::Attack
    } else {
        ActionKind::Defend
    }
}

struct SidePlan {
    action: RoundAction,
    /// 이번 공격에 소모할 에너지
    attack_spend: i32,
    /// 방어에 소모 가능한 에너지 (명중 시에만 실제 소모)
    defense_spend: i32,
}

fn plan_side(
    action: RoundAction,
    energy: i32,
    defense_energy: i32,
    cfg: &BattleSettings,
) -> SidePlan {
    let attack_spend = if action == RoundAction::Attack {
        energy.min(cfg.energy_consume_per_attack)
    } else {
        0
    };
    let defense_spend = if action == RoundAction::Defend {
        defense_energy.min(cfg.defense_energy_consume)
    } else {
        0
    };
    SidePlan {
        action,
        attack_spend,
        defense_spend,
    }
}

struct AttackResult {
    damage: i32,
    critical: bool,
    dodged: bool,
    defended: bool,
    /// 방어자가 실제로 소모한 방어 에너지
    defender_spent: i32,
}

fn resolve_attack(
    attacker: &SidePlan,
    defender: &SidePlan,
    cfg: &BattleSettings,
    rng: &mut impl Rng,
) -> AttackResult {
    if attacker.action != RoundAction::Attack {
        return AttackResult {
            damage: 0,
            critical: false,
            dodged: false,
            defended: false,
            defender_spent: 0,
        };
    }

    // 1. 회피 판정. 회피 시 데미지 0, 방어 에너지는 보존된다.
    //    공격자의 에너지는 이미 소모된 것으로 본다.
    if rng.gen::<f64>() < cfg.dodge_chance {
        return AttackResult {
            damage: 0,
            critical: false,
            dodged: true,
            defended: false,
            defender_spent: 0,
        };
    }

    // 2. 기본 데미지 + 저장 에너지 보너스
    let energy_bonus = attacker.attack_spend as f64 * cfg.energy_damage_multiplier;
    let mut damage = cfg.base_damage * (1.0 + energy_bonus);

    // 3. 치명타 판정
    let critical = rng.gen::<f64>() < cfg.critical_hit_chance;
    if critical {
        damage *= cfg.critical_multiplier;
    }

    // 4. 상대가 방어 중이면 방어 에너지 비례로 감소
    let mut defended = false;
    let mut defender_spent = 0;
    if defender.action == RoundAction::Defend {
        let reduction = (defender.defense_spend as f64 * cfg.defense_energy_reduction).min(1.0);
        damage *= 1.0 - reduction;
        defended = true;
        defender_spent = defender.defense_spend;
    }

    AttackResult {
        damage: (damage.round() as i32).max(0),
        critical,
        dodged: false,
        defended,
        defender_spent,
    }
}

/// 라운드 하나를 정산한다.
///
/// `state`는 라운드 시작 시점의 상태이며, 양측의 데미지는 시작 상태 기준으로
/// 동시에 계산된 뒤 함께 적용된다. 난수 소비 순서는 고정이다:
/// p1 자동행동 → p2 자동행동 → p1 공격(회피, 치명타) → p2 공격(회피, 치명타).
pub fn resolve_round(
    state: &BattleState,
    cfg: &BattleSettings,
    rng: &mut impl Rng,
) -> RoundOutcome {
    // 1. 유효 행동 결정: 수동 제출이 있으면 충전, 없으면 자동 생성
    let p1_action = match state.player1.pending_action {
        Some(_) => RoundAction::Recharge,
        None => auto_action(cfg, rng).into(),
    };
    let p2_action = match state.player2.pending_action {
        Some(_) => RoundAction::Recharge,
        None => auto_action(cfg, rng).into(),
    };

    let p1_plan = plan_side(
        p1_action,
        state.player1.energy,
        state.player1.defense_energy,
        cfg,
    );
    let p2_plan = plan_side(
        p2_action,
        state.player2.energy,
        state.player2.defense_energy,
        cfg,
    );

    // 2. 양측 공격을 시작 상태 기준으로 계산
    let p1_attack = resolve_attack(&p1_plan, &p2_plan, cfg, rng);
    let p2_attack = resolve_attack(&p2_plan, &p1_plan, cfg, rng);

    // 3. 체력 적용 (동시, [0, max_health]로 clamp)
    let p1_health = (state.player1.health - p2_attack.damage).clamp(0, cfg.max_health);
    let p2_health = (state.player2.health - p1_attack.damage).clamp(0, cfg.max_health);

    // 4. 에너지 정산: 공격 에너지는 공격 시 소모, 방어 에너지는 명중 방어 시 소모
    let p1_energy = state.player1.energy - p1_plan.attack_spend;
    let p2_energy = state.player2.energy - p2_plan.attack_spend;
    let p1_defense_energy = state.player1.defense_energy - p2_attack.defender_spent;
    let p2_defense_energy = state.player2.defense_energy - p1_attack.defender_spent;

    let knockout = match (p1_health == 0, p2_health == 0) {
        (true, true) => Some(Knockout::Draw),
        (true, false) => Some(Knockout::Player2Wins),
        (false, true) => Some(Knockout::Player1Wins),
        (false, false) => None,
    };

    RoundOutcome {
        player1: SideOutcome {
            action: p1_action,
            damage_dealt: p1_attack.damage,
            critical: p1_attack.critical,
            dodged: p1_attack.dodged,
            defended: p1_attack.defended,
            health_after: p1_health,
            energy_after: p1_energy,
            defense_energy_after: p1_defense_energy,
        },
        player2: SideOutcome {
            action: p2_action,
            damage_dealt: p2_attack.damage,
            critical: p2_attack.critical,
            dodged: p2_attack.dodged,
            defended: p2_attack.defended,
            health_after: p2_health,
            energy_after: p2_energy,
            defense_energy_after: p2_defense_energy,
        },
        knockout,
    }
}

impl From<ActionKind> for RoundAction {
    fn from(kind: ActionKind) -> Self {
        match kind {
            ActionKind::Attack => RoundAction::Attack,
            ActionKind::Defend => RoundAction::Defend,
        }
    }
}

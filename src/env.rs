use std::collections::HashMap;

use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub server: ServerSettings,
    #[serde(default)]
    pub matchmaking: MatchmakingSettings,
    #[serde(default)]
    pub battle: BattleSettings,
    #[serde(default)]
    pub rewards: RewardSettings,
    #[serde(default)]
    pub limits: LimitSettings,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());
        println!("Loading configuration for RUN_MODE: {}", &run_mode);

        let s = Config::builder()
            // Load environment-specific file (e.g., development.toml, production.toml)
            .add_source(
                File::with_name(&format!("config/{}", run_mode))
                    .format(FileFormat::Toml)
                    .required(true),
            )
            // Add environment variables (e.g., APP_SERVER__PORT=8000)
            .add_source(Environment::with_prefix("APP").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub bind_address: String,
    pub port: u16,
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSettings {
    pub directory: String,
    pub filename: String,
}

/// 매칭 대기열 관련 설정. 모든 값은 placeholder이며 TOML/환경변수로 조정한다.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MatchmakingSettings {
    /// 대기열 항목 TTL (초)
    pub queue_ttl_seconds: i64,
    /// 초대장 TTL (초)
    pub invitation_ttl_seconds: i64,
    /// 매칭 시도 주기 (ms)
    pub match_tick_interval_ms: u64,
    /// 만료 항목 정리 주기 (ms)
    pub sweep_interval_ms: u64,
    /// CP 허용 범위 (비율)
    pub match_range_min: f64,
    pub match_range_max: f64,
    pub match_range_default: f64,
}

impl Default for MatchmakingSettings {
    fn default() -> Self {
        Self {
            queue_ttl_seconds: 30,
            invitation_ttl_seconds: 30,
            match_tick_interval_ms: 1_000,
            sweep_interval_ms: 5_000,
            match_range_min: 0.05,
            match_range_max: 0.50,
            match_range_default: 0.20,
        }
    }
}

/// 전투 밸런스 설정. 확률/배율은 전부 설정값이며 코드에 하드코딩하지 않는다.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BattleSettings {
    pub max_health: i32,
    pub base_damage: f64,
    pub critical_hit_chance: f64,
    pub critical_multiplier: f64,
    pub dodge_chance: f64,
    /// 자동 행동 생성 시 공격이 선택될 확률
    pub action_probability_attack: f64,
    pub round_interval_ms: u64,
    pub timeout_check_interval_ms: u64,
    pub battle_duration_ms: i64,
    pub energy_per_click: i32,
    pub defense_energy_per_click: i32,
    pub max_energy: i32,
    pub max_defense_energy: i32,
    /// 저장 에너지 1포인트당 데미지 보너스 비율
    pub energy_damage_multiplier: f64,
    /// 방어 에너지 1포인트당 데미지 감소 비율
    pub defense_energy_reduction: f64,
    pub energy_consume_per_attack: i32,
    pub defense_energy_consume: i32,
    pub manual_action_cooldown_ms: i64,
}

impl Default for BattleSettings {
    fn default() -> Self {
        Self {
            max_health: 100,
            base_damage: 10.0,
            critical_hit_chance: 0.15,
            critical_multiplier: 1.5,
            dodge_chance: 0.10,
            action_probability_attack: 0.7,
            round_interval_ms: 3_000,
            timeout_check_interval_ms: 1_000,
            battle_duration_ms: 300_000,
            energy_per_click: 1,
            defense_energy_per_click: 1,
            max_energy: 10,
            max_defense_energy: 10,
            energy_damage_multiplier: 0.1,
            defense_energy_reduction: 0.08,
            energy_consume_per_attack: 10,
            defense_energy_consume: 10,
            manual_action_cooldown_ms: 500,
        }
    }
}

/// 전투 종료 시 적용되는 보상 설정
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RewardSettings {
    pub winner_xp_bonus: i64,
    pub loser_xp_bonus: i64,
    pub winner_cp_gain: i64,
    pub loser_cp_loss: i64,
    /// 패자의 CP가 이 값 아래로 내려가지 않도록 보정
    pub min_combat_power: i64,
    pub winner_discount_percent: u32,
    pub discount_duration_hours: u32,
}

impl Default for RewardSettings {
    fn default() -> Self {
        Self {
            winner_xp_bonus: 50,
            loser_xp_bonus: 15,
            winner_cp_gain: 10,
            loser_cp_loss: 5,
            min_combat_power: 10,
            winner_discount_percent: 10,
            discount_duration_hours: 24,
        }
    }
}

/// 티어별 일일 전투 횟수 제한
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LimitSettings {
    pub daily_battles_by_tier: HashMap<String, u32>,
    /// 설정에 없는 티어가 들어왔을 때 적용되는 기본 한도
    pub daily_battles_default: u32,
}

impl Default for LimitSettings {
    fn default() -> Self {
        let mut by_tier = HashMap::new();
        by_tier.insert("bronze".to_string(), 10);
        by_tier.insert("silver".to_string(), 20);
        by_tier.insert("gold".to_string(), 30);
        Self {
            daily_battles_by_tier: by_tier,
            daily_battles_default: 10,
        }
    }
}

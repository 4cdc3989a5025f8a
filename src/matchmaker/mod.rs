use std::collections::HashMap;
use std::time::Duration;

use actix::{Actor, Addr, AsyncContext, Context};
use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::env::MatchmakingSettings;
use crate::invitation::InvitationCoordinator;

pub mod handlers;
pub mod messages;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    Searching,
    Matched,
}

/// 대기열 항목. 사용자당 최대 하나만 존재한다.
#[derive(Debug, Clone, Serialize)]
pub struct QueueEntry {
    pub user_id: Uuid,
    pub combat_power: i64,
    pub min_cp: i64,
    pub max_cp: i64,
    pub match_range_percent: f64,
    pub search_started_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub status: QueueStatus,
    pub matched_with: Option<Uuid>,
}

impl QueueEntry {
    pub fn new(
        user_id: Uuid,
        combat_power: i64,
        range_percent: f64,
        ttl_seconds: i64,
    ) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            combat_power,
            min_cp: (combat_power as f64 * (1.0 - range_percent)).floor() as i64,
            max_cp: (combat_power as f64 * (1.0 + range_percent)).ceil() as i64,
            match_range_percent: range_percent,
            search_started_at: now,
            expires_at: now + chrono::Duration::seconds(ttl_seconds),
            status: QueueStatus::Searching,
            matched_with: None,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// 상호 호환 판정: 양쪽 모두 상대의 CP가 자신의 허용 구간 안에 있어야 한다.
/// 구간끼리 겹치는 것만으로는 부족하다 (한쪽만 허용하는 비대칭 매칭 방지).
pub fn mutually_compatible(a: &QueueEntry, b: &QueueEntry) -> bool {
    a.user_id != b.user_id
        && b.combat_power >= a.min_cp
        && b.combat_power <= a.max_cp
        && a.combat_power >= b.min_cp
        && a.combat_power <= b.max_cp
}

/// 호환 후보 중 무작위로 하나를 고른다. CP 근접 편향으로 특정 항목이
/// 계속 밀리는 것을 막기 위해 균등 선택을 쓴다.
pub fn pick_candidate<'a>(
    caller: &QueueEntry,
    entries: impl Iterator<Item = &'a QueueEntry>,
    now: DateTime<Utc>,
    rng: &mut impl Rng,
) -> Option<Uuid> {
    let candidates: Vec<Uuid> = entries
        .filter(|e| e.status == QueueStatus::Searching && !e.is_expired(now))
        .filter(|e| mutually_compatible(caller, e))
        .map(|e| e.user_id)
        .collect();
    candidates.choose(rng).copied()
}

/// Queue Manager: 대기열 전체를 소유하는 단일 actor.
/// 매칭 통지는 초대장을 만드는 InvitationCoordinator가 invitation_id와 함께 보낸다.
pub struct Matchmaker {
    pub(crate) entries: HashMap<Uuid, QueueEntry>,
    pub(crate) settings: MatchmakingSettings,
    /// 기동 순서 때문에 actor 시작 후 BindInvitations로 채워진다
    pub(crate) invitation_addr: Option<Addr<InvitationCoordinator>>,
}

impl Matchmaker {
    pub fn new(settings: MatchmakingSettings) -> Self {
        Self {
            entries: HashMap::new(),
            settings,
            invitation_addr: None,
        }
    }

    pub(crate) fn searching_count(&self) -> usize {
        self.entries
            .values()
            .filter(|e| e.status == QueueStatus::Searching)
            .count()
    }
}

impl Actor for Matchmaker {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        info!("Matchmaker actor started.");
        // 매칭 시도 타이머
        ctx.run_interval(
            Duration::from_millis(self.settings.match_tick_interval_ms),
            |_act, ctx| {
                ctx.address().do_send(messages::TryMatch);
            },
        );
        // 만료 항목 정리 타이머
        ctx.run_interval(
            Duration::from_millis(self.settings.sweep_interval_ms),
            |_act, ctx| {
                ctx.address().do_send(messages::ExpireStale);
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn entry(cp: i64, range: f64) -> QueueEntry {
        QueueEntry::new(Uuid::new_v4(), cp, range, 30)
    }

    #[test]
    fn range_bounds_use_floor_and_ceil() {
        let e = entry(100, 0.2);
        assert_eq!(e.min_cp, 80);
        assert_eq!(e.max_cp, 120);

        let odd = entry(333, 0.15);
        assert_eq!(odd.min_cp, (333.0_f64 * 0.85).floor() as i64);
        assert_eq!(odd.max_cp, (333.0_f64 * 1.15).ceil() as i64);
    }

    #[test]
    fn cp_110_is_a_mutual_match_for_cp_100_at_20_percent() {
        let a = entry(100, 0.2);
        let b = entry(110, 0.2);
        assert!(mutually_compatible(&a, &b));
        assert!(mutually_compatible(&b, &a));
    }

    #[test]
    fn cp_150_is_not_a_match_for_cp_100_at_20_percent() {
        // 구간 [80,120]과 [120,180]은 한 점에서 겹치지만
        // 150은 [80,120] 밖이므로 상호 호환이 아니다.
        let a = entry(100, 0.2);
        let b = entry(150, 0.2);
        assert!(!mutually_compatible(&a, &b));
        assert!(!mutually_compatible(&b, &a));
    }

    #[test]
    fn compatibility_requires_both_directions() {
        // a는 넓은 범위라 b를 허용하지만, b의 좁은 범위는 a를 허용하지 않는다
        let a = entry(100, 0.5);
        let b = entry(140, 0.05);
        assert!(!mutually_compatible(&a, &b));
    }

    #[test]
    fn entry_is_never_matched_with_itself() {
        let a = entry(100, 0.2);
        assert!(!mutually_compatible(&a, &a));
    }

    #[test]
    fn pick_candidate_ignores_expired_and_matched_entries() {
        let caller = entry(100, 0.2);
        let mut expired = entry(105, 0.2);
        expired.expires_at = Utc::now() - chrono::Duration::seconds(1);
        let mut matched = entry(110, 0.2);
        matched.status = QueueStatus::Matched;
        let valid = entry(95, 0.2);

        let pool = vec![expired, matched, valid.clone()];
        let mut rng = StdRng::seed_from_u64(1);
        let picked = pick_candidate(&caller, pool.iter(), Utc::now(), &mut rng);
        assert_eq!(picked, Some(valid.user_id));
    }

    #[test]
    fn pick_candidate_returns_none_when_nothing_fits() {
        let caller = entry(100, 0.05);
        let pool = vec![entry(200, 0.05), entry(300, 0.05)];
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(pick_candidate(&caller, pool.iter(), Utc::now(), &mut rng), None);
    }
}

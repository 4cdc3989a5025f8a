use std::collections::HashMap;

use chrono::{NaiveDate, Utc};
use parking_lot::Mutex;
use uuid::Uuid;

use crate::env::LimitSettings;
use crate::errors::{BattleError, BattleResult};

/// 티어별 일일 전투 횟수 제한.
///
/// 카운터는 (user, UTC 날짜) 단위로 증가하며, 날짜가 바뀌면 이전 기록은
/// 자연히 무시된다. 전투 '생성' 시점에 소비되고 전투 중에는 검사하지 않는다.
pub struct DailyBattleLimiter {
    settings: LimitSettings,
    counts: Mutex<HashMap<(Uuid, NaiveDate), u32>>,
}

impl DailyBattleLimiter {
    pub fn new(settings: LimitSettings) -> Self {
        Self {
            settings,
            counts: Mutex::new(HashMap::new()),
        }
    }

    pub fn limit_for_tier(&self, tier: &str) -> u32 {
        self.settings
            .daily_battles_by_tier
            .get(tier)
            .copied()
            .unwrap_or(self.settings.daily_battles_default)
    }

    /// 한도에 여유가 있는지 검사만 한다 (큐 진입/초대 전 호출).
    pub fn check(&self, user_id: Uuid, tier: &str) -> BattleResult<()> {
        let limit = self.limit_for_tier(tier);
        let today = Utc::now().date_naive();
        let used = self
            .counts
            .lock()
            .get(&(user_id, today))
            .copied()
            .unwrap_or(0);
        if used >= limit {
            crate::metrics::DAILY_LIMIT_REJECTIONS_TOTAL.inc();
            return Err(BattleError::DailyLimitExceeded { user_id, limit });
        }
        Ok(())
    }

    /// 전투가 실제로 생성될 때 호출한다. 지나간 날짜의 카운터는 이때 정리된다.
    pub fn record_battle(&self, user_id: Uuid) {
        let today = Utc::now().date_naive();
        let mut counts = self.counts.lock();
        counts.retain(|(_, date), _| *date == today);
        *counts.entry((user_id, today)).or_insert(0) += 1;
    }
}

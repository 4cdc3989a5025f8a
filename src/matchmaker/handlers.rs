use actix::{Context, Handler};
use chrono::Utc;
use tracing::{debug, info};

use crate::errors::BattleResult;
use crate::invitation::messages::SendInvitation;
use crate::invitation::InvitationOrigin;
use crate::matchmaker::messages::{
    BindInvitations, Dequeue, Enqueue, ExpireStale, QueueStats, QueueStatsView, ReleaseMatch,
    RemovePair, TryMatch,
};
use crate::matchmaker::{pick_candidate, Matchmaker, QueueEntry, QueueStatus};
use crate::metrics;

impl Handler<Enqueue> for Matchmaker {
    type Result = BattleResult<QueueEntry>;

    fn handle(&mut self, msg: Enqueue, _ctx: &mut Context<Self>) -> Self::Result {
        let range = msg
            .match_range_percent
            .unwrap_or(self.settings.match_range_default)
            .clamp(self.settings.match_range_min, self.settings.match_range_max);

        // 사용자당 하나의 항목만: 기존 항목은 교체된다
        if self.entries.remove(&msg.user_id).is_some() {
            debug!("Replacing existing queue entry for user {}", msg.user_id);
        }

        let entry = QueueEntry::new(
            msg.user_id,
            msg.combat_power,
            range,
            self.settings.queue_ttl_seconds,
        );
        info!(
            "User {} enqueued with CP {} (range [{}, {}])",
            msg.user_id, msg.combat_power, entry.min_cp, entry.max_cp
        );
        self.entries.insert(msg.user_id, entry.clone());

        metrics::PLAYERS_ENQUEUED_TOTAL.inc();
        metrics::QUEUE_SIZE.set(self.searching_count() as i64);
        Ok(entry)
    }
}

impl Handler<Dequeue> for Matchmaker {
    type Result = ();

    fn handle(&mut self, msg: Dequeue, _ctx: &mut Context<Self>) -> Self::Result {
        if self.entries.remove(&msg.user_id).is_some() {
            info!("User {} removed from queue", msg.user_id);
        }
        metrics::QUEUE_SIZE.set(self.searching_count() as i64);
    }
}

impl Handler<RemovePair> for Matchmaker {
    type Result = ();

    fn handle(&mut self, msg: RemovePair, _ctx: &mut Context<Self>) -> Self::Result {
        self.entries.remove(&msg.user_a);
        self.entries.remove(&msg.user_b);
        metrics::QUEUE_SIZE.set(self.searching_count() as i64);
    }
}

impl Handler<ReleaseMatch> for Matchmaker {
    type Result = ();

    fn handle(&mut self, msg: ReleaseMatch, _ctx: &mut Context<Self>) -> Self::Result {
        // 초대가 무산된 쌍은 새 TTL로 다시 검색 상태가 된다
        let ttl = chrono::Duration::seconds(self.settings.queue_ttl_seconds);
        for user_id in [msg.user_a, msg.user_b] {
            if let Some(entry) = self.entries.get_mut(&user_id) {
                entry.status = QueueStatus::Searching;
                entry.matched_with = None;
                entry.expires_at = Utc::now() + ttl;
                debug!("User {} released back to searching", user_id);
            }
        }
        metrics::QUEUE_SIZE.set(self.searching_count() as i64);
    }
}

impl Handler<QueueStats> for Matchmaker {
    type Result = Option<QueueStatsView>;

    fn handle(&mut self, msg: QueueStats, _ctx: &mut Context<Self>) -> Self::Result {
        let entry = self.entries.get(&msg.user_id)?;
        if entry.status != QueueStatus::Searching {
            return None;
        }

        // 1-based 순번: 먼저 검색을 시작한 항목이 앞선다
        let position = 1 + self
            .entries
            .values()
            .filter(|e| e.status == QueueStatus::Searching)
            .filter(|e| e.search_started_at < entry.search_started_at)
            .count();

        // 단순 선형 추정이다. 대기열 이론 모델이 아니다.
        let estimated_wait_seconds = (position as u64 * 15).max(10);
        Some(QueueStatsView {
            position,
            estimated_wait_seconds,
        })
    }
}

impl Handler<TryMatch> for Matchmaker {
    type Result = ();

    fn handle(&mut self, _msg: TryMatch, _ctx: &mut Context<Self>) -> Self::Result {
        let invitation_addr = match &self.invitation_addr {
            Some(addr) => addr.clone(),
            None => return,
        };

        let now = Utc::now();
        let mut rng = rand::thread_rng();

        // 먼저 검색을 시작한 항목부터 짝을 찾는다
        let mut order: Vec<uuid::Uuid> = self
            .entries
            .values()
            .filter(|e| e.status == QueueStatus::Searching && !e.is_expired(now))
            .map(|e| e.user_id)
            .collect();
        order.sort_by_key(|id| self.entries[id].search_started_at);

        for user_id in order {
            let caller = match self.entries.get(&user_id) {
                Some(e) if e.status == QueueStatus::Searching => e.clone(),
                _ => continue,
            };

            let Some(opponent_id) = pick_candidate(&caller, self.entries.values(), now, &mut rng)
            else {
                continue;
            };
            let opponent_cp = self.entries[&opponent_id].combat_power;

            for (id, with) in [(user_id, opponent_id), (opponent_id, user_id)] {
                if let Some(entry) = self.entries.get_mut(&id) {
                    entry.status = QueueStatus::Matched;
                    entry.matched_with = Some(with);
                }
            }

            info!(
                "Match found: {} (CP {}) vs {} (CP {})",
                user_id, caller.combat_power, opponent_id, opponent_cp
            );
            metrics::MATCHES_FOUND_TOTAL.inc();

            // 먼저 대기한 쪽이 초대를 보낸다. 초대 생성과 match_found 알림은
            // InvitationCoordinator가 처리한다.
            invitation_addr.do_send(SendInvitation {
                from_user_id: user_id,
                to_user_id: opponent_id,
                from_cp: caller.combat_power,
                to_cp: opponent_cp,
                origin: InvitationOrigin::QueueMatch,
            });
        }

        metrics::QUEUE_SIZE.set(self.searching_count() as i64);
    }
}

impl Handler<ExpireStale> for Matchmaker {
    type Result = ();

    fn handle(&mut self, _msg: ExpireStale, _ctx: &mut Context<Self>) -> Self::Result {
        let now = Utc::now();
        let before = self.entries.len();
        self.entries
            .retain(|_, e| e.status != QueueStatus::Searching || !e.is_expired(now));

        let expired = before - self.entries.len();
        if expired > 0 {
            info!("Expired {} stale queue entries", expired);
            metrics::QUEUE_ENTRIES_EXPIRED_TOTAL.inc_by(expired as u64);
            metrics::QUEUE_SIZE.set(self.searching_count() as i64);
        }
    }
}

impl Handler<BindInvitations> for Matchmaker {
    type Result = ();

    fn handle(&mut self, msg: BindInvitations, _ctx: &mut Context<Self>) -> Self::Result {
        self.invitation_addr = Some(msg.addr);
    }
}

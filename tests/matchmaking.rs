mod common;

use std::time::Duration;

use uuid::Uuid;

use battle_server::errors::BattleError;
use battle_server::invitation::messages::{PendingInvitations, Respond};
use battle_server::matchmaker::messages::{Dequeue, Enqueue, QueueStats, TryMatch};
use battle_server::matchmaker::QueueStatus;
use battle_server::protocol::ServerMessage;

use common::{deterministic_battle, slow_matchmaking, Harness};

fn enqueue(user_id: Uuid, combat_power: i64) -> Enqueue {
    Enqueue {
        user_id,
        combat_power,
        match_range_percent: None,
    }
}

#[actix::test]
async fn enqueue_clamps_range_and_reports_position() {
    let h = Harness::boot(slow_matchmaking(), deterministic_battle());
    let first = Uuid::new_v4();
    let second = Uuid::new_v4();

    let entry = h.matchmaker.send(enqueue(first, 100)).await.unwrap().unwrap();
    assert_eq!(entry.status, QueueStatus::Searching);
    assert_eq!(entry.min_cp, 80);
    assert_eq!(entry.max_cp, 120);

    // 허용치를 넘는 범위는 설정 상한으로 잘린다
    let wide = h
        .matchmaker
        .send(Enqueue {
            user_id: second,
            combat_power: 100,
            match_range_percent: Some(5.0),
        })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(wide.match_range_percent, 0.50);

    let stats = h
        .matchmaker
        .send(QueueStats { user_id: first })
        .await
        .unwrap()
        .expect("first user should be queued");
    assert_eq!(stats.position, 1);
    assert!(stats.estimated_wait_seconds >= 10);

    let stats = h
        .matchmaker
        .send(QueueStats { user_id: second })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stats.position, 2);
}

#[actix::test]
async fn compatible_users_get_matched_into_an_invitation() {
    let h = Harness::boot(slow_matchmaking(), deterministic_battle());
    let first = Uuid::new_v4();
    let second = Uuid::new_v4();
    let first_events = common::Collector::subscribe(&h.subscriptions, first);
    let second_events = common::Collector::subscribe(&h.subscriptions, second);

    h.matchmaker.send(enqueue(first, 100)).await.unwrap().unwrap();
    h.matchmaker.send(enqueue(second, 110)).await.unwrap().unwrap();
    h.matchmaker.send(TryMatch).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    // 먼저 대기한 쪽이 초대를 보내므로 두 번째 사용자가 수신자다
    let pending = h
        .invitations
        .send(PendingInvitations { user_id: second })
        .await
        .unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].from_user_id, first);
    assert_eq!(pending[0].from_cp, 100);

    // 양쪽 모두 match_found를 받고 수신자는 초대장도 받는다
    assert!(first_events
        .lock()
        .iter()
        .any(|m| matches!(m, ServerMessage::MatchFound { opponent_id, .. } if *opponent_id == second)));
    let second_events = second_events.lock();
    assert!(second_events
        .iter()
        .any(|m| matches!(m, ServerMessage::MatchFound { opponent_id, .. } if *opponent_id == first)));
    assert!(second_events
        .iter()
        .any(|m| matches!(m, ServerMessage::InvitationReceived { from_user_id, .. } if *from_user_id == first)));

    // 매칭된 항목은 더 이상 검색 대기열에 없다
    let stats = h.matchmaker.send(QueueStats { user_id: first }).await.unwrap();
    assert!(stats.is_none());
}

#[actix::test]
async fn incompatible_combat_power_is_never_matched() {
    let h = Harness::boot(slow_matchmaking(), deterministic_battle());
    let low = Uuid::new_v4();
    let high = Uuid::new_v4();

    // [80,120]과 [120,180]은 한 점에서 닿지만 상호 포함이 아니다
    h.matchmaker.send(enqueue(low, 100)).await.unwrap().unwrap();
    h.matchmaker.send(enqueue(high, 150)).await.unwrap().unwrap();
    h.matchmaker.send(TryMatch).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    for user_id in [low, high] {
        let pending = h
            .invitations
            .send(PendingInvitations { user_id })
            .await
            .unwrap();
        assert!(pending.is_empty());
        let stats = h.matchmaker.send(QueueStats { user_id }).await.unwrap();
        assert!(stats.is_some(), "user should still be searching");
    }
}

#[actix::test]
async fn rejected_queue_invitation_releases_both_back_to_searching() {
    let h = Harness::boot(slow_matchmaking(), deterministic_battle());
    let first = Uuid::new_v4();
    let second = Uuid::new_v4();

    h.matchmaker.send(enqueue(first, 100)).await.unwrap().unwrap();
    h.matchmaker.send(enqueue(second, 105)).await.unwrap().unwrap();
    h.matchmaker.send(TryMatch).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let pending = h
        .invitations
        .send(PendingInvitations { user_id: second })
        .await
        .unwrap();
    let invitation_id = pending[0].id;

    let result = h
        .invitations
        .send(Respond {
            invitation_id,
            user_id: second,
            accept: false,
        })
        .await
        .unwrap()
        .unwrap();
    assert!(result.is_none(), "rejection must not create a battle");
    tokio::time::sleep(Duration::from_millis(50)).await;

    // 두 사용자 모두 새 TTL로 다시 검색 상태가 된다
    for user_id in [first, second] {
        let stats = h.matchmaker.send(QueueStats { user_id }).await.unwrap();
        assert!(stats.is_some(), "user should be searching again");
    }
}

#[actix::test]
async fn re_enqueue_replaces_the_previous_entry() {
    let h = Harness::boot(slow_matchmaking(), deterministic_battle());
    let user_id = Uuid::new_v4();

    let old = h.matchmaker.send(enqueue(user_id, 100)).await.unwrap().unwrap();
    let new = h.matchmaker.send(enqueue(user_id, 200)).await.unwrap().unwrap();
    assert_eq!(new.combat_power, 200);
    assert!(new.search_started_at >= old.search_started_at);

    let stats = h
        .matchmaker
        .send(QueueStats { user_id })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stats.position, 1);
}

#[actix::test]
async fn dequeue_removes_the_entry() {
    let h = Harness::boot(slow_matchmaking(), deterministic_battle());
    let user_id = Uuid::new_v4();

    h.matchmaker.send(enqueue(user_id, 100)).await.unwrap().unwrap();
    h.matchmaker.send(Dequeue { user_id }).await.unwrap();

    let stats = h.matchmaker.send(QueueStats { user_id }).await.unwrap();
    assert!(stats.is_none());
}

#[actix::test]
async fn daily_limit_blocks_further_battles() {
    let h = Harness::boot(slow_matchmaking(), deterministic_battle());
    let user_id = Uuid::new_v4();

    // bronze 기본 한도를 소진시킨다
    let limit = h.limiter.limit_for_tier("bronze");
    for _ in 0..limit {
        h.limiter.record_battle(user_id);
    }

    let err = h.limiter.check(user_id, "bronze").unwrap_err();
    assert!(matches!(err, BattleError::DailyLimitExceeded { .. }));
}

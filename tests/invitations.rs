mod common;

use std::time::Duration;

use uuid::Uuid;

use battle_server::battle::supervisor::messages::GetBattleAddr;
use battle_server::battle::types::BattleStatus;
use battle_server::env::MatchmakingSettings;
use battle_server::errors::BattleError;
use battle_server::invitation::messages::{Cancel, Respond, SendInvitation};
use battle_server::invitation::InvitationOrigin;
use battle_server::protocol::ServerMessage;
use battle_server::storage::BattleStore;

use common::{deterministic_battle, slow_matchmaking, Collector, Harness};

fn direct(from: Uuid, to: Uuid) -> SendInvitation {
    SendInvitation {
        from_user_id: from,
        to_user_id: to,
        from_cp: 100,
        to_cp: 110,
        origin: InvitationOrigin::Direct,
    }
}

#[actix::test]
async fn acceptance_creates_a_preparing_battle() {
    let h = Harness::boot(slow_matchmaking(), deterministic_battle());
    let from = Uuid::new_v4();
    let to = Uuid::new_v4();
    let from_events = Collector::subscribe(&h.subscriptions, from);

    let battle = h.accepted_battle(from, to, 100, 110).await;
    assert_eq!(battle.status, BattleStatus::Preparing);
    assert_eq!(battle.player1_id, from);
    assert_eq!(battle.player2_id, to);
    assert_eq!(battle.player1_cp, 100);
    assert_eq!(battle.player2_cp, 110);

    // 전투 actor가 등록되었고 초기 상태가 저장되어 있다
    let addr = h
        .supervisor
        .send(GetBattleAddr {
            battle_id: battle.id,
        })
        .await
        .unwrap();
    assert!(addr.is_some());

    let state = h.store.load_battle_state(battle.id).await.unwrap();
    assert_eq!(state.current_round, 0);
    assert_eq!(state.player1.health, 100);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(from_events
        .lock()
        .iter()
        .any(|m| matches!(m, ServerMessage::InvitationAccepted { battle_id, .. } if *battle_id == battle.id)));
}

#[actix::test]
async fn duplicate_pending_invitation_for_a_pair_is_rejected() {
    let h = Harness::boot(slow_matchmaking(), deterministic_battle());
    let from = Uuid::new_v4();
    let to = Uuid::new_v4();

    h.invitations.send(direct(from, to)).await.unwrap().unwrap();
    let err = h
        .invitations
        .send(direct(from, to))
        .await
        .unwrap()
        .unwrap_err();
    assert!(matches!(err, BattleError::InvalidState { .. }));
}

#[actix::test]
async fn only_the_recipient_may_respond() {
    let h = Harness::boot(slow_matchmaking(), deterministic_battle());
    let from = Uuid::new_v4();
    let to = Uuid::new_v4();

    let invitation = h.invitations.send(direct(from, to)).await.unwrap().unwrap();
    let err = h
        .invitations
        .send(Respond {
            invitation_id: invitation.id,
            user_id: from,
            accept: true,
        })
        .await
        .unwrap()
        .unwrap_err();
    assert!(matches!(err, BattleError::InvalidState { .. }));
}

#[actix::test]
async fn second_accept_hits_a_terminal_invitation() {
    let h = Harness::boot(slow_matchmaking(), deterministic_battle());
    let from = Uuid::new_v4();
    let to = Uuid::new_v4();

    let invitation = h.invitations.send(direct(from, to)).await.unwrap().unwrap();
    let accept = Respond {
        invitation_id: invitation.id,
        user_id: to,
        accept: true,
    };
    let battle = h
        .invitations
        .send(accept)
        .await
        .unwrap()
        .unwrap()
        .expect("first accept creates a battle");

    let err = h
        .invitations
        .send(Respond {
            invitation_id: invitation.id,
            user_id: to,
            accept: true,
        })
        .await
        .unwrap()
        .unwrap_err();
    assert!(matches!(err, BattleError::InvalidState { .. }));

    // 전투는 정확히 하나만 만들어졌다
    let loaded = h.store.load_battle(battle.id).await.unwrap();
    assert_eq!(loaded.id, battle.id);
}

#[actix::test]
async fn rejection_allows_a_fresh_invitation_for_the_same_pair() {
    let h = Harness::boot(slow_matchmaking(), deterministic_battle());
    let from = Uuid::new_v4();
    let to = Uuid::new_v4();
    let from_events = Collector::subscribe(&h.subscriptions, from);

    let invitation = h.invitations.send(direct(from, to)).await.unwrap().unwrap();
    let result = h
        .invitations
        .send(Respond {
            invitation_id: invitation.id,
            user_id: to,
            accept: false,
        })
        .await
        .unwrap()
        .unwrap();
    assert!(result.is_none());

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(from_events
        .lock()
        .iter()
        .any(|m| matches!(m, ServerMessage::InvitationRejected { invitation_id } if *invitation_id == invitation.id)));

    // 종결된 초대는 같은 쌍의 새 초대를 막지 않는다
    h.invitations.send(direct(from, to)).await.unwrap().unwrap();
}

#[actix::test]
async fn expired_invitation_cannot_be_accepted() {
    let matchmaking = MatchmakingSettings {
        invitation_ttl_seconds: 0,
        ..slow_matchmaking()
    };
    let h = Harness::boot(matchmaking, deterministic_battle());
    let from = Uuid::new_v4();
    let to = Uuid::new_v4();
    let to_events = Collector::subscribe(&h.subscriptions, to);

    let invitation = h.invitations.send(direct(from, to)).await.unwrap().unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    let err = h
        .invitations
        .send(Respond {
            invitation_id: invitation.id,
            user_id: to,
            accept: true,
        })
        .await
        .unwrap()
        .unwrap_err();
    assert!(matches!(err, BattleError::Expired { .. }));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(to_events
        .lock()
        .iter()
        .any(|m| matches!(m, ServerMessage::InvitationExpired { invitation_id } if *invitation_id == invitation.id)));
}

#[actix::test]
async fn cancel_is_sender_only_and_notifies_the_recipient() {
    let h = Harness::boot(slow_matchmaking(), deterministic_battle());
    let from = Uuid::new_v4();
    let to = Uuid::new_v4();
    let to_events = Collector::subscribe(&h.subscriptions, to);

    let invitation = h.invitations.send(direct(from, to)).await.unwrap().unwrap();

    let err = h
        .invitations
        .send(Cancel {
            invitation_id: invitation.id,
            user_id: to,
        })
        .await
        .unwrap()
        .unwrap_err();
    assert!(matches!(err, BattleError::InvalidState { .. }));

    h.invitations
        .send(Cancel {
            invitation_id: invitation.id,
            user_id: from,
        })
        .await
        .unwrap()
        .unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(to_events
        .lock()
        .iter()
        .any(|m| matches!(m, ServerMessage::InvitationExpired { invitation_id } if *invitation_id == invitation.id)));

    // 취소된 초대에는 더 이상 응답할 수 없다
    let err = h
        .invitations
        .send(Respond {
            invitation_id: invitation.id,
            user_id: to,
            accept: true,
        })
        .await
        .unwrap()
        .unwrap_err();
    assert!(matches!(err, BattleError::InvalidState { .. }));
}

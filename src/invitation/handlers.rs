use actix::{ActorFutureExt, Context, Handler, ResponseActFuture, WrapFuture};
use chrono::Utc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::battle::supervisor::messages::CreateBattle;
use crate::battle::types::Battle;
use crate::errors::{BattleError, BattleResult};
use crate::invitation::messages::{
    Cancel, PendingInvitations, Respond, SendInvitation, SweepExpired,
};
use crate::invitation::{Invitation, InvitationCoordinator, InvitationOrigin, InvitationStatus};
use crate::matchmaker::messages::{ReleaseMatch, RemovePair};
use crate::metrics;
use crate::protocol::ServerMessage;
use crate::subscript::messages::Notify;

impl InvitationCoordinator {
    fn notify(&self, user_id: Uuid, message: ServerMessage) {
        self.subscription_addr.do_send(Notify { user_id, message });
    }

    /// 무산된 큐 매칭 쌍을 다시 검색 상태로 돌린다
    fn release_pair(&self, invitation: &Invitation) {
        if invitation.origin == InvitationOrigin::QueueMatch {
            self.matchmaker_addr.do_send(ReleaseMatch {
                user_a: invitation.from_user_id,
                user_b: invitation.to_user_id,
            });
        }
    }

    fn expire_invitation(&mut self, invitation_id: Uuid) {
        let Some(inv) = self.invitations.get_mut(&invitation_id) else {
            return;
        };
        inv.status = InvitationStatus::Expired;
        let inv = inv.clone();

        info!("Invitation {} expired", inv.id);
        metrics::INVITATIONS_RESOLVED_TOTAL
            .with_label_values(&["expired"])
            .inc();
        for user_id in [inv.from_user_id, inv.to_user_id] {
            self.notify(
                user_id,
                ServerMessage::InvitationExpired {
                    invitation_id: inv.id,
                },
            );
        }
        self.release_pair(&inv);
    }
}

impl Handler<SendInvitation> for InvitationCoordinator {
    type Result = BattleResult<Invitation>;

    fn handle(&mut self, msg: SendInvitation, _ctx: &mut Context<Self>) -> Self::Result {
        let now = Utc::now();
        if self.has_active_pending(msg.from_user_id, msg.to_user_id, now) {
            return Err(BattleError::invalid_state(
                "invitation",
                format!("{}->{}", msg.from_user_id, msg.to_user_id),
                "an active pending invitation already exists for this pair",
            ));
        }

        let invitation = Invitation {
            id: Uuid::new_v4(),
            from_user_id: msg.from_user_id,
            to_user_id: msg.to_user_id,
            from_cp: msg.from_cp,
            to_cp: msg.to_cp,
            status: InvitationStatus::Pending,
            origin: msg.origin,
            created_at: now,
            expires_at: now + chrono::Duration::seconds(self.settings.invitation_ttl_seconds),
            responded_at: None,
        };
        self.invitations.insert(invitation.id, invitation.clone());
        info!(
            "Invitation {} sent: {} -> {} ({:?})",
            invitation.id, msg.from_user_id, msg.to_user_id, msg.origin
        );

        // 큐 매칭이면 양쪽 모두에게 match_found를 알린다
        if msg.origin == InvitationOrigin::QueueMatch {
            self.notify(
                msg.from_user_id,
                ServerMessage::MatchFound {
                    opponent_id: msg.to_user_id,
                    opponent_cp: msg.to_cp,
                    invitation_id: invitation.id,
                },
            );
            self.notify(
                msg.to_user_id,
                ServerMessage::MatchFound {
                    opponent_id: msg.from_user_id,
                    opponent_cp: msg.from_cp,
                    invitation_id: invitation.id,
                },
            );
        }
        self.notify(
            msg.to_user_id,
            ServerMessage::InvitationReceived {
                invitation_id: invitation.id,
                from_user_id: msg.from_user_id,
                from_cp: msg.from_cp,
                expires_at: invitation.expires_at,
            },
        );

        Ok(invitation)
    }
}

impl Handler<Respond> for InvitationCoordinator {
    type Result = ResponseActFuture<Self, BattleResult<Option<Battle>>>;

    fn handle(&mut self, msg: Respond, _ctx: &mut Context<Self>) -> Self::Result {
        let now = Utc::now();

        let invitation = match self.invitations.get(&msg.invitation_id) {
            Some(inv) => inv.clone(),
            None => {
                return Box::pin(actix::fut::ready(Err(BattleError::not_found(
                    "invitation",
                    msg.invitation_id,
                ))))
            }
        };

        if invitation.to_user_id != msg.user_id {
            return Box::pin(actix::fut::ready(Err(BattleError::invalid_state(
                "invitation",
                invitation.id,
                "only the invited user may respond",
            ))));
        }
        if invitation.status.is_terminal() {
            return Box::pin(actix::fut::ready(Err(BattleError::invalid_state(
                "invitation",
                invitation.id,
                format!("already {:?}", invitation.status),
            ))));
        }
        if invitation.is_expired(now) {
            self.expire_invitation(invitation.id);
            return Box::pin(actix::fut::ready(Err(BattleError::expired(
                "invitation",
                invitation.id,
            ))));
        }

        if !msg.accept {
            if let Some(inv) = self.invitations.get_mut(&invitation.id) {
                inv.status = InvitationStatus::Rejected;
                inv.responded_at = Some(now);
            }
            info!("Invitation {} rejected by {}", invitation.id, msg.user_id);
            metrics::INVITATIONS_RESOLVED_TOTAL
                .with_label_values(&["rejected"])
                .inc();
            for user_id in [invitation.from_user_id, invitation.to_user_id] {
                self.notify(
                    user_id,
                    ServerMessage::InvitationRejected {
                        invitation_id: invitation.id,
                    },
                );
            }
            self.release_pair(&invitation);
            return Box::pin(actix::fut::ready(Ok(None)));
        }

        // 수락은 즉시 종결 상태로 전이시켜 중복 수락을 차단한 뒤
        // 전투 생성을 비동기로 이어간다.
        if let Some(inv) = self.invitations.get_mut(&invitation.id) {
            inv.status = InvitationStatus::Accepted;
            inv.responded_at = Some(now);
        }

        let create = self.supervisor_addr.send(CreateBattle {
            player1_id: invitation.from_user_id,
            player2_id: invitation.to_user_id,
            player1_cp: invitation.from_cp,
            player2_cp: invitation.to_cp,
        });

        Box::pin(create.into_actor(self).map(move |res, act, _ctx| {
            let battle = match res {
                Ok(Ok(battle)) => battle,
                Ok(Err(e)) => {
                    error!("Battle creation failed for invitation {}: {}", invitation.id, e);
                    return Err(e);
                }
                Err(e) => {
                    error!("Battle supervisor unreachable: {}", e);
                    return Err(BattleError::from(e));
                }
            };

            info!(
                "Invitation {} accepted, battle {} created",
                invitation.id, battle.id
            );
            metrics::INVITATIONS_RESOLVED_TOTAL
                .with_label_values(&["accepted"])
                .inc();

            // 수락 시 양쪽 모두 대기열에서 제거된다
            act.matchmaker_addr.do_send(RemovePair {
                user_a: invitation.from_user_id,
                user_b: invitation.to_user_id,
            });

            for user_id in [invitation.from_user_id, invitation.to_user_id] {
                act.notify(
                    user_id,
                    ServerMessage::InvitationAccepted {
                        invitation_id: invitation.id,
                        battle_id: battle.id,
                        player1_id: battle.player1_id,
                        player2_id: battle.player2_id,
                        player1_cp: battle.player1_cp,
                        player2_cp: battle.player2_cp,
                    },
                );
            }

            Ok(Some(battle))
        }))
    }
}

impl Handler<Cancel> for InvitationCoordinator {
    type Result = BattleResult<()>;

    fn handle(&mut self, msg: Cancel, _ctx: &mut Context<Self>) -> Self::Result {
        let now = Utc::now();
        let invitation = self
            .invitations
            .get(&msg.invitation_id)
            .cloned()
            .ok_or_else(|| BattleError::not_found("invitation", msg.invitation_id))?;

        if invitation.from_user_id != msg.user_id {
            return Err(BattleError::invalid_state(
                "invitation",
                invitation.id,
                "only the sender may cancel",
            ));
        }
        if invitation.status.is_terminal() {
            return Err(BattleError::invalid_state(
                "invitation",
                invitation.id,
                format!("already {:?}", invitation.status),
            ));
        }
        if invitation.is_expired(now) {
            self.expire_invitation(invitation.id);
            return Err(BattleError::expired("invitation", invitation.id));
        }

        if let Some(inv) = self.invitations.get_mut(&invitation.id) {
            inv.status = InvitationStatus::Cancelled;
            inv.responded_at = Some(now);
        }
        info!("Invitation {} cancelled by sender", invitation.id);
        metrics::INVITATIONS_RESOLVED_TOTAL
            .with_label_values(&["cancelled"])
            .inc();

        // 수신자 입장에서는 사라진 초대이므로 만료 이벤트로 알린다
        self.notify(
            invitation.to_user_id,
            ServerMessage::InvitationExpired {
                invitation_id: invitation.id,
            },
        );
        self.release_pair(&invitation);
        Ok(())
    }
}

impl Handler<SweepExpired> for InvitationCoordinator {
    type Result = ();

    fn handle(&mut self, _msg: SweepExpired, _ctx: &mut Context<Self>) -> Self::Result {
        let now = Utc::now();
        let stale: Vec<Uuid> = self
            .invitations
            .values()
            .filter(|inv| inv.status == InvitationStatus::Pending && inv.is_expired(now))
            .map(|inv| inv.id)
            .collect();

        if !stale.is_empty() {
            warn!("Expiring {} stale invitations", stale.len());
        }
        for id in stale {
            self.expire_invitation(id);
        }

        // 종결된 초대는 한 시간 뒤에 버린다
        let retention = chrono::Duration::hours(1);
        self.invitations
            .retain(|_, inv| !inv.status.is_terminal() || now - inv.created_at < retention);
    }
}

impl Handler<PendingInvitations> for InvitationCoordinator {
    type Result = Vec<Invitation>;

    fn handle(&mut self, msg: PendingInvitations, _ctx: &mut Context<Self>) -> Self::Result {
        let now = Utc::now();
        self.invitations
            .values()
            .filter(|inv| {
                inv.to_user_id == msg.user_id
                    && inv.status == InvitationStatus::Pending
                    && !inv.is_expired(now)
            })
            .cloned()
            .collect()
    }
}

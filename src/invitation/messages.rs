use actix::Message;
use uuid::Uuid;

use crate::battle::types::Battle;
use crate::errors::BattleResult;
use crate::invitation::{Invitation, InvitationOrigin};

/// 초대 생성. 큐 매칭에서 자동으로, 혹은 직접 도전으로 만들어진다.
#[derive(Message)]
#[rtype(result = "BattleResult<Invitation>")]
pub struct SendInvitation {
    pub from_user_id: Uuid,
    pub to_user_id: Uuid,
    pub from_cp: i64,
    pub to_cp: i64,
    pub origin: InvitationOrigin,
}

/// 수신자의 수락/거절. 수락이면 생성된 Battle을 돌려준다.
#[derive(Message)]
#[rtype(result = "BattleResult<Option<Battle>>")]
pub struct Respond {
    pub invitation_id: Uuid,
    pub user_id: Uuid,
    pub accept: bool,
}

/// 발신자의 철회. pending 상태에서만 가능하다.
#[derive(Message)]
#[rtype(result = "BattleResult<()>")]
pub struct Cancel {
    pub invitation_id: Uuid,
    pub user_id: Uuid,
}

/// 만료 초대 정리 틱 (내부 타이머)
#[derive(Message)]
#[rtype(result = "()")]
pub struct SweepExpired;

/// 폴링 fallback: 사용자가 받은 pending 초대 조회
#[derive(Message)]
#[rtype(result = "Vec<Invitation>")]
pub struct PendingInvitations {
    pub user_id: Uuid,
}

use actix::{Addr, Message};
use serde::Serialize;
use uuid::Uuid;

use crate::errors::BattleResult;
use crate::invitation::InvitationCoordinator;
use crate::matchmaker::QueueEntry;

/// 대기열 등록. 같은 사용자의 기존 항목은 교체된다.
#[derive(Message)]
#[rtype(result = "BattleResult<QueueEntry>")]
pub struct Enqueue {
    pub user_id: Uuid,
    pub combat_power: i64,
    /// None이면 설정의 기본 허용 범위를 사용한다
    pub match_range_percent: Option<f64>,
}

/// 대기열에서 무조건 제거 (취소/매칭/초대 정리 공용)
#[derive(Message)]
#[rtype(result = "()")]
pub struct Dequeue {
    pub user_id: Uuid,
}

/// 두 사용자를 동시에 제거 (초대 수락 시)
#[derive(Message)]
#[rtype(result = "()")]
pub struct RemovePair {
    pub user_a: Uuid,
    pub user_b: Uuid,
}

/// 초대가 무산된 매칭 쌍을 다시 검색 상태로 되돌린다
#[derive(Message)]
#[rtype(result = "()")]
pub struct ReleaseMatch {
    pub user_a: Uuid,
    pub user_b: Uuid,
}

/// 대기 순번/예상 대기 시간 조회
#[derive(Message)]
#[rtype(result = "Option<QueueStatsView>")]
pub struct QueueStats {
    pub user_id: Uuid,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct QueueStatsView {
    pub position: usize,
    pub estimated_wait_seconds: u64,
}

/// 매칭 시도 틱 (내부 타이머)
#[derive(Message)]
#[rtype(result = "()")]
pub struct TryMatch;

/// 만료 항목 정리 틱 (내부 타이머)
#[derive(Message)]
#[rtype(result = "()")]
pub struct ExpireStale;

/// 기동 순서상 늦게 만들어지는 InvitationCoordinator 주소 바인딩
#[derive(Message)]
#[rtype(result = "()")]
pub struct BindInvitations {
    pub addr: Addr<InvitationCoordinator>,
}

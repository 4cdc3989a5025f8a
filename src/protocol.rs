use actix::prelude::*;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::battle::types::{BattleRound, EndReason};
use crate::errors::BattleError;

// --- Server to Client Messages ---

/// Notification Sink가 전달하는 이벤트의 닫힌 집합.
/// 모든 variant는 고정된 필드 집합을 가진다.
#[derive(Serialize, Deserialize, Message, Clone, Debug)]
#[rtype(result = "()")]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// 상호 호환되는 상대를 찾았음을 알립니다.
    #[serde(rename = "match_found")]
    MatchFound {
        opponent_id: Uuid,
        opponent_cp: i64,
        invitation_id: Uuid,
    },

    /// 초대장을 받았음을 알립니다.
    #[serde(rename = "invitation_received")]
    InvitationReceived {
        invitation_id: Uuid,
        from_user_id: Uuid,
        from_cp: i64,
        expires_at: DateTime<Utc>,
    },

    /// 초대가 수락되어 전투가 생성되었음을 알립니다.
    #[serde(rename = "invitation_accepted")]
    InvitationAccepted {
        invitation_id: Uuid,
        battle_id: Uuid,
        player1_id: Uuid,
        player2_id: Uuid,
        player1_cp: i64,
        player2_cp: i64,
    },

    /// 초대가 거절되었음을 알립니다.
    #[serde(rename = "invitation_rejected")]
    InvitationRejected { invitation_id: Uuid },

    /// 초대가 만료되었음을 알립니다.
    #[serde(rename = "invitation_expired")]
    InvitationExpired { invitation_id: Uuid },

    /// 라운드 하나가 정산되었음을 알립니다.
    #[serde(rename = "round_resolved")]
    RoundResolved { battle_id: Uuid, round: BattleRound },

    /// 전투가 제한 시간에 도달했음을 알립니다.
    #[serde(rename = "battle_timeout")]
    BattleTimeout { battle_id: Uuid },

    /// 전투가 종료되었음을 알립니다.
    #[serde(rename = "battle_completed")]
    BattleCompleted {
        battle_id: Uuid,
        winner_id: Option<Uuid>,
        end_reason: EndReason,
    },

    /// 에러가 발생했음을 알립니다.
    #[serde(rename = "error")]
    Error { code: ErrorCode, message: String },
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    NotFound,
    InvalidState,
    Expired,
    RateLimited,
    ConcurrencyConflict,
    DailyLimitExceeded,
    InternalError,
}

impl From<&BattleError> for ErrorCode {
    fn from(err: &BattleError) -> Self {
        match err {
            BattleError::NotFound { .. } => ErrorCode::NotFound,
            BattleError::InvalidState { .. } => ErrorCode::InvalidState,
            BattleError::Expired { .. } => ErrorCode::Expired,
            BattleError::RateLimited { .. } => ErrorCode::RateLimited,
            BattleError::ConcurrencyConflict { .. } => ErrorCode::ConcurrencyConflict,
            BattleError::DailyLimitExceeded { .. } => ErrorCode::DailyLimitExceeded,
            BattleError::Mailbox(_) | BattleError::Internal { .. } => ErrorCode::InternalError,
        }
    }
}

use std::time::{Duration, Instant};

use actix::{
    Actor, ActorContext, Addr, AsyncContext, Handler, StreamHandler,
};
use actix_web::{get, post, web, HttpRequest, HttpResponse, Responder};
use actix_web_actors::ws;
use prometheus::{Encoder, TextEncoder};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::battle::actor::{GetSnapshot, StartBattle, SubmitAction};
use crate::battle::supervisor::messages::GetBattleAddr;
use crate::battle::types::ActionKind;
use crate::errors::BattleError;
use crate::invitation::messages::{Cancel, PendingInvitations, Respond, SendInvitation};
use crate::invitation::InvitationOrigin;
use crate::matchmaker::messages::{Dequeue, Enqueue, QueueStats};
use crate::protocol::{ErrorCode, ServerMessage};
use crate::subscript::messages::{Deregister, Register};
use crate::subscript::SubscriptionManager;
use crate::AppState;

const WS_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);
const WS_CLIENT_TIMEOUT: Duration = Duration::from_secs(30);

fn error_response(err: &BattleError) -> HttpResponse {
    let code = ErrorCode::from(err);
    let body = json!({ "code": code, "message": err.to_string() });
    match err {
        BattleError::NotFound { .. } | BattleError::Expired { .. } => {
            HttpResponse::NotFound().json(body)
        }
        BattleError::InvalidState { .. } | BattleError::ConcurrencyConflict { .. } => {
            HttpResponse::Conflict().json(body)
        }
        BattleError::RateLimited { .. } | BattleError::DailyLimitExceeded { .. } => {
            HttpResponse::TooManyRequests().json(body)
        }
        BattleError::Mailbox(_) | BattleError::Internal { .. } => {
            HttpResponse::InternalServerError().json(body)
        }
    }
}

// --- Queue ---

#[derive(Deserialize)]
pub struct JoinQueueRequest {
    pub user_id: Uuid,
    pub match_range_percent: Option<f64>,
}

#[post("/queue/join")]
pub async fn join_queue(
    state: web::Data<AppState>,
    body: web::Json<JoinQueueRequest>,
) -> impl Responder {
    // 일일 한도는 큐 진입 전에 검사한다
    let tier = match state.cp_provider.tier(body.user_id).await {
        Ok(tier) => tier,
        Err(e) => return error_response(&e),
    };
    if let Err(e) = state.limiter.check(body.user_id, &tier) {
        return error_response(&e);
    }

    let combat_power = match state.cp_provider.combat_power(body.user_id).await {
        Ok(cp) => cp,
        Err(e) => return error_response(&e),
    };

    match state
        .matchmaker_addr
        .send(Enqueue {
            user_id: body.user_id,
            combat_power,
            match_range_percent: body.match_range_percent,
        })
        .await
    {
        Ok(Ok(entry)) => HttpResponse::Ok().json(entry),
        Ok(Err(e)) => error_response(&e),
        Err(e) => error_response(&BattleError::from(e)),
    }
}

#[derive(Deserialize)]
pub struct LeaveQueueRequest {
    pub user_id: Uuid,
}

#[post("/queue/leave")]
pub async fn leave_queue(
    state: web::Data<AppState>,
    body: web::Json<LeaveQueueRequest>,
) -> impl Responder {
    state.matchmaker_addr.do_send(Dequeue {
        user_id: body.user_id,
    });
    HttpResponse::Ok().json(json!({ "left": true }))
}

#[get("/queue/stats/{user_id}")]
pub async fn queue_stats(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> impl Responder {
    match state
        .matchmaker_addr
        .send(QueueStats {
            user_id: path.into_inner(),
        })
        .await
    {
        Ok(Some(stats)) => HttpResponse::Ok().json(stats),
        Ok(None) => error_response(&BattleError::not_found("queue_entry", "user")),
        Err(e) => error_response(&BattleError::from(e)),
    }
}

// --- Invitations ---

#[derive(Deserialize)]
pub struct SendInvitationRequest {
    pub from_user_id: Uuid,
    pub to_user_id: Uuid,
}

#[post("/invitations")]
pub async fn send_invitation(
    state: web::Data<AppState>,
    body: web::Json<SendInvitationRequest>,
) -> impl Responder {
    let tier = match state.cp_provider.tier(body.from_user_id).await {
        Ok(tier) => tier,
        Err(e) => return error_response(&e),
    };
    if let Err(e) = state.limiter.check(body.from_user_id, &tier) {
        return error_response(&e);
    }

    let from_cp = match state.cp_provider.combat_power(body.from_user_id).await {
        Ok(cp) => cp,
        Err(e) => return error_response(&e),
    };
    let to_cp = match state.cp_provider.combat_power(body.to_user_id).await {
        Ok(cp) => cp,
        Err(e) => return error_response(&e),
    };

    match state
        .invitation_addr
        .send(SendInvitation {
            from_user_id: body.from_user_id,
            to_user_id: body.to_user_id,
            from_cp,
            to_cp,
            origin: InvitationOrigin::Direct,
        })
        .await
    {
        Ok(Ok(invitation)) => HttpResponse::Ok().json(invitation),
        Ok(Err(e)) => error_response(&e),
        Err(e) => error_response(&BattleError::from(e)),
    }
}

/// 폴링 fallback: 알림 세션이 없어도 받은 초대를 확인할 수 있다
#[get("/invitations/pending/{user_id}")]
pub async fn pending_invitations(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> impl Responder {
    match state
        .invitation_addr
        .send(PendingInvitations {
            user_id: path.into_inner(),
        })
        .await
    {
        Ok(invitations) => HttpResponse::Ok().json(invitations),
        Err(e) => error_response(&BattleError::from(e)),
    }
}

#[derive(Deserialize)]
pub struct RespondInvitationRequest {
    pub user_id: Uuid,
    pub accept: bool,
}

#[post("/invitations/{id}/respond")]
pub async fn respond_invitation(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    body: web::Json<RespondInvitationRequest>,
) -> impl Responder {
    match state
        .invitation_addr
        .send(Respond {
            invitation_id: path.into_inner(),
            user_id: body.user_id,
            accept: body.accept,
        })
        .await
    {
        Ok(Ok(battle)) => HttpResponse::Ok().json(json!({ "battle": battle })),
        Ok(Err(e)) => error_response(&e),
        Err(e) => error_response(&BattleError::from(e)),
    }
}

#[derive(Deserialize)]
pub struct CancelInvitationRequest {
    pub user_id: Uuid,
}

#[post("/invitations/{id}/cancel")]
pub async fn cancel_invitation(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    body: web::Json<CancelInvitationRequest>,
) -> impl Responder {
    match state
        .invitation_addr
        .send(Cancel {
            invitation_id: path.into_inner(),
            user_id: body.user_id,
        })
        .await
    {
        Ok(Ok(())) => HttpResponse::Ok().json(json!({ "cancelled": true })),
        Ok(Err(e)) => error_response(&e),
        Err(e) => error_response(&BattleError::from(e)),
    }
}

// --- Battles ---

#[post("/battles/{id}/start")]
pub async fn start_battle(state: web::Data<AppState>, path: web::Path<Uuid>) -> impl Responder {
    let battle_id = path.into_inner();
    let addr = match state
        .supervisor_addr
        .send(GetBattleAddr { battle_id })
        .await
    {
        Ok(Some(addr)) => addr,
        Ok(None) => return error_response(&BattleError::not_found("battle", battle_id)),
        Err(e) => return error_response(&BattleError::from(e)),
    };

    match addr.send(StartBattle).await {
        Ok(Ok(())) => HttpResponse::Ok().json(json!({ "started": true })),
        Ok(Err(e)) => error_response(&e),
        Err(e) => error_response(&BattleError::from(e)),
    }
}

#[derive(Deserialize)]
pub struct SubmitActionRequest {
    pub user_id: Uuid,
    pub action: ActionKind,
}

#[post("/battles/{id}/action")]
pub async fn submit_action(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    body: web::Json<SubmitActionRequest>,
) -> impl Responder {
    let battle_id = path.into_inner();
    let addr = match state
        .supervisor_addr
        .send(GetBattleAddr { battle_id })
        .await
    {
        Ok(Some(addr)) => addr,
        Ok(None) => return error_response(&BattleError::not_found("battle", battle_id)),
        Err(e) => return error_response(&BattleError::from(e)),
    };

    match addr
        .send(SubmitAction {
            user_id: body.user_id,
            kind: body.action,
        })
        .await
    {
        Ok(Ok(ack)) => HttpResponse::Ok().json(ack),
        Ok(Err(e)) => error_response(&e),
        Err(e) => error_response(&BattleError::from(e)),
    }
}

/// battle/state/rounds 조회. 진행 중이면 actor 스냅샷을, 끝난 전투는
/// 저장소 기록을 돌려준다.
#[get("/battles/{id}")]
pub async fn get_battle_state(state: web::Data<AppState>, path: web::Path<Uuid>) -> impl Responder {
    let battle_id = path.into_inner();

    let (battle, battle_state) = match state
        .supervisor_addr
        .send(GetBattleAddr { battle_id })
        .await
    {
        Ok(Some(addr)) => match addr.send(GetSnapshot).await {
            Ok(snapshot) => (snapshot.battle, snapshot.state),
            Err(e) => return error_response(&BattleError::from(e)),
        },
        Ok(None) => {
            let battle = match state.store.load_battle(battle_id).await {
                Ok(battle) => battle,
                Err(e) => return error_response(&e),
            };
            let battle_state = match state.store.load_battle_state(battle_id).await {
                Ok(s) => s,
                Err(e) => return error_response(&e),
            };
            (battle, battle_state)
        }
        Err(e) => return error_response(&BattleError::from(e)),
    };

    let rounds = match state.store.load_rounds(battle_id).await {
        Ok(rounds) => rounds,
        Err(e) => return error_response(&e),
    };

    HttpResponse::Ok().json(json!({
        "battle": battle,
        "state": battle_state,
        "rounds": rounds,
    }))
}

/// 재접속 시 진행 중 전투를 되찾는 용도
#[get("/battles/active/{user_id}")]
pub async fn active_battle(state: web::Data<AppState>, path: web::Path<Uuid>) -> impl Responder {
    match state.store.load_ongoing_battle_for_user(path.into_inner()).await {
        Ok(battle) => HttpResponse::Ok().json(json!({ "battle": battle })),
        Err(e) => error_response(&e),
    }
}

// --- Operational ---

#[get("/health")]
pub async fn health() -> impl Responder {
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}

#[get("/metrics")]
pub async fn metrics_endpoint(state: web::Data<AppState>) -> impl Responder {
    let encoder = TextEncoder::new();
    let metric_families = state.metrics_registry.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!("Failed to encode metrics: {}", e);
        return HttpResponse::InternalServerError().finish();
    }
    HttpResponse::Ok()
        .content_type(encoder.format_type())
        .body(buffer)
}

// --- Notification WebSocket ---

/// 사용자당 하나의 알림 세션. SubscriptionManager에 자신을 등록하고
/// ServerMessage를 JSON으로 내려보낸다.
pub struct NotificationSession {
    user_id: Uuid,
    sub_manager: Addr<SubscriptionManager>,
    last_heartbeat: Instant,
}

impl NotificationSession {
    pub fn new(user_id: Uuid, sub_manager: Addr<SubscriptionManager>) -> Self {
        Self {
            user_id,
            sub_manager,
            last_heartbeat: Instant::now(),
        }
    }
}

impl Actor for NotificationSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        info!("Notification session opened for user {}", self.user_id);
        self.sub_manager.do_send(Register {
            user_id: self.user_id,
            recipient: ctx.address().recipient(),
        });

        ctx.run_interval(WS_HEARTBEAT_INTERVAL, |act, ctx| {
            if Instant::now().duration_since(act.last_heartbeat) > WS_CLIENT_TIMEOUT {
                warn!("Heartbeat timeout for user {}, closing session", act.user_id);
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        self.sub_manager.do_send(Deregister {
            user_id: self.user_id,
        });
    }
}

impl Handler<ServerMessage> for NotificationSession {
    type Result = ();

    fn handle(&mut self, msg: ServerMessage, ctx: &mut Self::Context) -> Self::Result {
        match serde_json::to_string(&msg) {
            Ok(json) => ctx.text(json),
            Err(e) => error!("Failed to serialize notification: {}", e),
        }
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for NotificationSession {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(payload)) => {
                self.last_heartbeat = Instant::now();
                ctx.pong(&payload);
            }
            Ok(ws::Message::Pong(_)) => {
                self.last_heartbeat = Instant::now();
            }
            Ok(ws::Message::Close(reason)) => {
                info!("Notification session closing for user {}", self.user_id);
                ctx.close(reason);
                ctx.stop();
            }
            Ok(_) => {}
            Err(e) => {
                error!("Notification session error for user {}: {}", self.user_id, e);
                ctx.stop();
            }
        }
    }
}

#[derive(Deserialize)]
pub struct WsQuery {
    pub user_id: Uuid,
}

#[get("/ws/")]
pub async fn notification_ws(
    req: HttpRequest,
    stream: web::Payload,
    query: web::Query<WsQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, actix_web::Error> {
    let session = NotificationSession::new(query.user_id, state.sub_manager_addr.clone());
    ws::start(session, &req, stream)
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(join_queue)
        .service(leave_queue)
        .service(queue_stats)
        .service(send_invitation)
        .service(pending_invitations)
        .service(respond_invitation)
        .service(cancel_invitation)
        .service(start_battle)
        .service(submit_action)
        .service(get_battle_state)
        .service(active_battle)
        .service(health)
        .service(metrics_endpoint)
        .service(notification_ws);
}

use actix::{Actor, System};
use actix_web::{web, App, HttpServer};
use battle_server::{
    api,
    battle::supervisor::BattleSupervisor,
    env::Settings,
    invitation::InvitationCoordinator,
    limits::DailyBattleLimiter,
    matchmaker::{messages::BindInvitations, Matchmaker},
    metrics,
    provider::{InMemoryCombatPowerProvider, RecordingRewardSink},
    storage::InMemoryBattleStore,
    subscript::SubscriptionManager,
    AppState, LoggerManager,
};
use std::sync::Arc;
use tracing::{error, info};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // 1. 환경변수 로드
    dotenv::dotenv().ok();

    // 2. 설정 파일 로드
    let settings = Settings::new().expect("Failed to load settings");

    // 3. 로거 초기화
    let _logger_manager = LoggerManager::setup(&settings);
    info!("Logger initialized");

    // 4. Metrics 초기화
    let metrics_registry = prometheus::Registry::new();
    metrics::register_custom_metrics(&metrics_registry)
        .expect("Failed to register custom metrics");
    info!("Metrics initialized and registered");

    // 5. 저장소/외부 의존성 준비
    let store = InMemoryBattleStore::new();
    let cp_provider = InMemoryCombatPowerProvider::new();
    let reward_sink = RecordingRewardSink::new();
    let limiter = Arc::new(DailyBattleLimiter::new(settings.limits.clone()));

    // 6. SubscriptionManager 시작
    let sub_manager_addr = SubscriptionManager::new().start();
    info!("SubscriptionManager actor started");

    // 7. Matchmaker 시작
    let matchmaker_addr = Matchmaker::new(settings.matchmaking.clone()).start();
    info!("Matchmaker actor started");

    // 8. BattleSupervisor 시작
    let supervisor_addr = BattleSupervisor::new(
        settings.battle.clone(),
        settings.rewards.clone(),
        store.clone(),
        reward_sink.clone(),
        sub_manager_addr.clone(),
        limiter.clone(),
    )
    .start();
    info!("BattleSupervisor actor started");

    // 9. InvitationCoordinator 시작 후 Matchmaker에 역방향 바인딩
    let invitation_addr = InvitationCoordinator::new(
        settings.matchmaking.clone(),
        sub_manager_addr.clone(),
        matchmaker_addr.clone(),
        supervisor_addr.clone(),
    )
    .start();
    matchmaker_addr.do_send(BindInvitations {
        addr: invitation_addr.clone(),
    });
    info!("InvitationCoordinator actor started and bound");

    // 10. AppState 구성
    let app_state = AppState {
        settings: settings.clone(),
        matchmaker_addr,
        invitation_addr,
        supervisor_addr,
        sub_manager_addr,
        store,
        cp_provider,
        limiter,
        metrics_registry,
    };

    // 11. HTTP 서버 시작
    let bind_address = format!("{}:{}", settings.server.bind_address, settings.server.port);
    info!("Starting HTTP server on {}", bind_address);

    let mut server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .configure(api::configure)
    })
    .bind(&bind_address)?
    .run();

    info!("Battle Server is running on {}", bind_address);

    // 12. 종료 신호 대기
    tokio::select! {
        res = &mut server => {
            error!("Server exited unexpectedly");
            return res;
        },

        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl+C received. Initiating graceful shutdown...");
            System::current().stop();
        },
    }

    info!("Waiting for all actors to shutdown...");
    server.await?;
    info!("System has shut down gracefully");

    Ok(())
}

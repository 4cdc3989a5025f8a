use lazy_static::lazy_static;
use prometheus::{IntCounter, IntCounterVec, IntGauge, Opts, Registry};

lazy_static! {
    pub static ref PLAYERS_ENQUEUED_TOTAL: IntCounter = IntCounter::new(
        "battle_players_enqueued_total",
        "Number of queue entries created"
    )
    .unwrap();
    pub static ref QUEUE_ENTRIES_EXPIRED_TOTAL: IntCounter = IntCounter::new(
        "battle_queue_entries_expired_total",
        "Queue entries removed by the expiry sweep"
    )
    .unwrap();
    pub static ref MATCHES_FOUND_TOTAL: IntCounter = IntCounter::new(
        "battle_matches_found_total",
        "Mutually compatible pairs produced by the matchmaker"
    )
    .unwrap();
    pub static ref QUEUE_SIZE: IntGauge =
        IntGauge::new("battle_queue_size", "Entries currently searching").unwrap();
    pub static ref INVITATIONS_RESOLVED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "battle_invitations_resolved_total",
            "Invitation terminal transitions by outcome"
        ),
        &["outcome"]
    )
    .unwrap();
    pub static ref ROUNDS_RESOLVED_TOTAL: IntCounter = IntCounter::new(
        "battle_rounds_resolved_total",
        "Battle rounds successfully persisted"
    )
    .unwrap();
    pub static ref ROUND_CONFLICTS_TOTAL: IntCounter = IntCounter::new(
        "battle_round_conflicts_total",
        "Duplicate round writes discarded"
    )
    .unwrap();
    pub static ref BATTLES_COMPLETED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "battle_battles_completed_total",
            "Completed battles by end reason"
        ),
        &["end_reason"]
    )
    .unwrap();
    pub static ref DAILY_LIMIT_REJECTIONS_TOTAL: IntCounter = IntCounter::new(
        "battle_daily_limit_rejections_total",
        "Queue/invitation attempts rejected by the daily battle limit"
    )
    .unwrap();
}

pub fn register_custom_metrics(registry: &Registry) -> Result<(), prometheus::Error> {
    registry.register(Box::new(PLAYERS_ENQUEUED_TOTAL.clone()))?;
    registry.register(Box::new(QUEUE_ENTRIES_EXPIRED_TOTAL.clone()))?;
    registry.register(Box::new(MATCHES_FOUND_TOTAL.clone()))?;
    registry.register(Box::new(QUEUE_SIZE.clone()))?;
    registry.register(Box::new(INVITATIONS_RESOLVED_TOTAL.clone()))?;
    registry.register(Box::new(ROUNDS_RESOLVED_TOTAL.clone()))?;
    registry.register(Box::new(ROUND_CONFLICTS_TOTAL.clone()))?;
    registry.register(Box::new(BATTLES_COMPLETED_TOTAL.clone()))?;
    registry.register(Box::new(DAILY_LIMIT_REJECTIONS_TOTAL.clone()))?;
    Ok(())
}

use crate::sqlite::SqliteSociety;
use chrono::{Duration, TimeZone, Utc};
use plaza_core::{
    AgentPair, AgentStats, ClaimKey, ClaimStore, EmotionEvent, EventLog, EventReference, NewEvent,
    StatName, StatStore, TimeWindow, WorldClock,
};
use serde_json::json;
use uuid::Uuid;

async fn memory_society() -> SqliteSociety {
    SqliteSociety::new(":memory:")
        .await
        .expect("Failed to create society store")
}

#[tokio::test]
async fn test_stats_upsert_and_lock() {
    let society = memory_society().await;
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();
    let stranger = Uuid::new_v4();

    society.upsert_stats(a, &AgentStats::new(70, 10, 80, 5)).await.unwrap();
    society.upsert_stats(b, &AgentStats::new(40, 10, 20, 0)).await.unwrap();

    let mut tx = society.begin().await.unwrap();
    let rows = tx.lock_stats(&AgentPair::new(b, a)).await.unwrap();
    assert_eq!(rows.len(), 2);
    let a_row = rows.iter().find(|(id, _)| *id == a).unwrap().1;
    assert_eq!(a_row, AgentStats::new(70, 10, 80, 5));

    // Missing agents are simply absent
    let partial = tx.lock_stats(&AgentPair::new(a, stranger)).await.unwrap();
    assert_eq!(partial.len(), 1);
    tx.commit().await.unwrap();
}

#[tokio::test]
async fn test_write_stats_requires_existing_row() {
    let society = memory_society().await;
    let a = Uuid::new_v4();
    society.upsert_stats(a, &AgentStats::new(50, 50, 50, 50)).await.unwrap();

    let mut tx = society.begin().await.unwrap();
    tx.write_stats(a, &AgentStats::new(55, 45, 60, 0)).await.unwrap();
    assert!(tx.write_stats(Uuid::new_v4(), &AgentStats::default()).await.is_err());
    tx.commit().await.unwrap();

    let stored = society.load_stats(a).await.unwrap().unwrap();
    assert_eq!(stored.mood, 55);
    assert_eq!(stored.stress, 45);
    assert_eq!(stored.curiosity, 60);
    // bond is never written through this path
    assert_eq!(stored.bond, 50);
}

#[tokio::test]
async fn test_rollback_discards_writes() {
    let society = memory_society().await;
    let a = Uuid::new_v4();
    society.upsert_stats(a, &AgentStats::new(50, 50, 50, 50)).await.unwrap();

    let mut tx = society.begin().await.unwrap();
    tx.write_stats(a, &AgentStats::new(90, 90, 90, 0)).await.unwrap();
    tx.append_emotion(&EmotionEvent {
        agent_id: a,
        trigger_type: "conversation".to_string(),
        trigger_source_id: None,
        stat_name: StatName::Mood,
        delta: 40,
        before: 50,
        after: 90,
        reason: None,
        created_at: Utc::now(),
    })
    .await
    .unwrap();
    tx.rollback().await.unwrap();

    assert_eq!(society.load_stats(a).await.unwrap().unwrap().mood, 50);
    assert!(society.emotion_events_for(a, 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_claim_is_insert_only_once() {
    let society = memory_society().await;
    let from = Uuid::new_v4();
    let key = ClaimKey::new(from, "relationship", "milestone:x:friend_30");

    let mut tx = society.begin().await.unwrap();
    assert!(tx.claim(&key, &json!({"n": 1})).await.unwrap());
    assert!(!tx.claim(&key, &json!({"n": 2})).await.unwrap());
    tx.commit().await.unwrap();

    let mut tx = society.begin().await.unwrap();
    assert!(!tx.claim(&key, &json!({"n": 3})).await.unwrap());
    tx.commit().await.unwrap();

    // First value wins
    let stored = society.fact(&key).await.unwrap().unwrap();
    assert_eq!(stored["n"], 1);
}

#[tokio::test]
async fn test_recent_by_types_orders_and_filters() {
    let society = memory_society().await;
    let agent = Uuid::new_v4();
    let other = Uuid::new_v4();
    let now = Utc.with_ymd_and_hms(2026, 5, 2, 12, 0, 0).unwrap();

    let mut tx = society.begin().await.unwrap();
    for (hours_ago, kind, owner) in [
        (50, "ARENA_CHEER", agent),
        (30, "ARENA_CHEER", agent),
        (10, "RUMOR_PLANTED", agent),
        (5, "POST_CREATED", agent),
        (2, "ARENA_CHEER", other),
    ] {
        tx.append_event(
            &NewEvent::new(owner, kind, json!({"h": hours_ago})).at(now - Duration::hours(hours_ago)),
        )
        .await
        .unwrap();
    }

    let found = tx
        .recent_by_types(agent, &["ARENA_CHEER", "RUMOR_PLANTED"], now - Duration::hours(48), 20)
        .await
        .unwrap();
    let hours: Vec<i64> = found.iter().map(|e| e.payload["h"].as_i64().unwrap()).collect();
    assert_eq!(hours, vec![10, 30]);

    let capped = tx
        .recent_by_types(agent, &["ARENA_CHEER", "RUMOR_PLANTED"], now - Duration::hours(48), 1)
        .await
        .unwrap();
    assert_eq!(capped.len(), 1);
    assert_eq!(capped[0].event_type, "RUMOR_PLANTED");

    assert!(tx.recent_by_types(agent, &[], now - Duration::hours(48), 20).await.unwrap().is_empty());
    tx.commit().await.unwrap();
}

#[tokio::test]
async fn test_referencing_by_owner_and_payload() {
    let society = memory_society().await;
    let target = Uuid::new_v4();
    let bystander = Uuid::new_v4();
    let t0 = Utc.with_ymd_and_hms(2026, 5, 2, 12, 0, 0).unwrap();

    let mut tx = society.begin().await.unwrap();
    // owned by target
    tx.append_event(&NewEvent::new(target, "ARENA_MATCH", json!({})).at(t0 + Duration::hours(1)))
        .await
        .unwrap();
    // names target in payload
    tx.append_event(
        &NewEvent::new(bystander, "SCANDAL_RESOLVED", json!({"target": target.to_string()}))
            .at(t0 + Duration::hours(2)),
    )
    .await
    .unwrap();
    tx.append_event(
        &NewEvent::new(bystander, "POST_CREATED", json!({"agent_id": target.to_string()}))
            .at(t0 + Duration::hours(3)),
    )
    .await
    .unwrap();
    // unrelated
    tx.append_event(&NewEvent::new(bystander, "POST_CREATED", json!({})).at(t0 + Duration::hours(4)))
        .await
        .unwrap();

    let window = TimeWindow::following(t0, Duration::hours(24));
    let by_agent = tx
        .referencing(&EventReference::agent(target), &window, 5)
        .await
        .unwrap();
    let kinds: Vec<&str> = by_agent.iter().map(|e| e.event_type.as_str()).collect();
    assert_eq!(kinds, vec!["ARENA_MATCH", "SCANDAL_RESOLVED", "POST_CREATED"]);

    // Payload-only matching skips ownership
    let by_payload = tx
        .referencing(&EventReference::Payload(target.to_string()), &window, 5)
        .await
        .unwrap();
    assert_eq!(by_payload.len(), 2);
    assert!(by_payload.iter().all(|e| e.agent_id == bystander));
    tx.commit().await.unwrap();
}

#[tokio::test]
async fn test_world_day_fact() {
    let society = memory_society().await;

    let mut tx = society.begin().await.unwrap();
    assert_eq!(tx.current_day().await.unwrap(), None);
    assert!(tx.set_current_day("not-a-day", Some("test")).await.unwrap().is_none());
    tx.set_current_day("2026-04-01", Some("test")).await.unwrap();
    assert_eq!(tx.current_day().await.unwrap().unwrap().to_string(), "2026-04-01");
    tx.set_current_day("2026-04-02", None).await.unwrap();
    assert_eq!(tx.current_day().await.unwrap().unwrap().to_string(), "2026-04-02");
    tx.commit().await.unwrap();
}

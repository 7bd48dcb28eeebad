//! Pipeline integration tests: snapshot loading through matching,
//! grounding-context assembly, and itinerary validation, exercised
//! through the public API with on-disk fixtures.

use std::io::Write;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use tempfile::NamedTempFile;

use kemet_guide::error::CoreError;
use kemet_guide::matcher::{best_match, cosine_similarity, vec_to_blob};
use kemet_guide::memory::ConversationMemory;
use kemet_guide::models::{Itinerary, Role};
use kemet_guide::prompt::{chat_messages, chat_user_turn, symbol_context, translation_messages};
use kemet_guide::store::FeatureStore;

fn write_snapshot(labels: &[&str], vectors: &[&[f32]]) -> NamedTempFile {
    let dims = vectors.first().map(|v| v.len()).unwrap_or(2);
    let labels_json: Vec<String> = labels.iter().map(|l| format!("\"{}\"", l)).collect();
    let sources_json: Vec<String> = labels
        .iter()
        .map(|l| format!("\"ref/{}.jpg\"", l.to_lowercase().replace(' ', "_")))
        .collect();
    let vectors_json: Vec<String> = vectors
        .iter()
        .map(|v| format!("\"{}\"", BASE64.encode(vec_to_blob(v))))
        .collect();

    let json = format!(
        r#"{{"dims": {}, "labels": [{}], "source_ids": [{}], "vectors": [{}]}}"#,
        dims,
        labels_json.join(", "),
        sources_json.join(", "),
        vectors_json.join(", "),
    );

    let mut file = NamedTempFile::new().unwrap();
    file.write_all(json.as_bytes()).unwrap();
    file
}

#[test]
fn test_snapshot_to_match_giza() {
    let file = write_snapshot(&["Giza", "Luxor"], &[&[1.0, 0.0], &[0.0, 1.0]]);
    let store = FeatureStore::load(file.path()).unwrap();

    let result = best_match(&[0.9, 0.1], &store, "Unknown Place");
    assert_eq!(result.label, "Giza");
    assert!((result.score - 0.994).abs() < 1e-3);
    assert_eq!(result.source_id.as_deref(), Some("ref/giza.jpg"));

    // The returned score is the maximum cosine similarity over the store.
    let max = store
        .vectors()
        .iter()
        .map(|v| cosine_similarity(&[0.9, 0.1], v))
        .fold(f32::NEG_INFINITY, f32::max);
    assert_eq!(result.score, max);
}

#[test]
fn test_empty_snapshot_yields_sentinel() {
    let file = write_snapshot(&[], &[]);
    let store = FeatureStore::load(file.path()).unwrap();

    let result = best_match(&[0.5, 0.5], &store, "Unknown Place");
    assert_eq!(result.label, "Unknown Place");
    assert_eq!(result.score, 0.0);
    assert!(result.source_id.is_none());
}

#[test]
fn test_loaded_store_match_is_scale_invariant() {
    let file = write_snapshot(
        &["Abu Simbel", "Philae", "Edfu"],
        &[&[0.2, 0.8], &[0.5, 0.5], &[0.9, 0.1]],
    );
    let store = FeatureStore::load(file.path()).unwrap();

    let base = best_match(&[0.6, 0.4], &store, "Unknown Place");
    for scale in [0.01f32, 7.0, 400.0] {
        let result = best_match(&[0.6 * scale, 0.4 * scale], &store, "Unknown Place");
        assert_eq!(result.label, base.label);
    }
}

#[test]
fn test_classified_labels_to_context_string() {
    let classes: Vec<String> = ["ankh", "eye_of_horus", "scarab"]
        .iter()
        .map(|s| s.to_string())
        .collect();

    assert_eq!(symbol_context(&classes), "ankh, eye_of_horus, scarab");

    let messages = translation_messages(&classes);
    assert_eq!(messages.len(), 2);
    assert!(messages[1].content.contains("ankh, eye_of_horus, scarab"));
    for class in &classes {
        assert_eq!(messages[1].content.matches(class.as_str()).count(), 1);
    }
}

#[test]
fn test_memory_window_across_many_turns() {
    let mut memory = ConversationMemory::new(50);
    for i in 0..50 {
        memory.append(Role::User, format!("turn {}", i));
    }
    memory.append(Role::Assistant, "turn 50");

    assert_eq!(memory.len(), 50);
    let contents: Vec<&str> = memory.turns().map(|t| t.content.as_str()).collect();
    assert_eq!(contents.first(), Some(&"turn 1"));
    assert_eq!(contents.last(), Some(&"turn 50"));
    assert!(!contents.contains(&"turn 0"));
}

#[test]
fn test_chat_assembly_carries_history_in_order() {
    let mut memory = ConversationMemory::new(50);
    memory.append(Role::User, "Question: Who was Hatshepsut?");
    memory.append(Role::Assistant, "A pharaoh of the eighteenth dynasty.");

    let turn = chat_user_turn("When did she rule?", None);
    let messages = chat_messages(&memory, &turn);

    let roles: Vec<&str> = messages.iter().map(|m| m.role.as_str()).collect();
    assert_eq!(roles, vec!["system", "user", "assistant", "user"]);
    assert_eq!(messages.last().unwrap().content, "Question: When did she rule?");
    assert_eq!(memory.len(), 2);
}

fn itinerary_payload(days_declared: u32, plan_days: usize, time: &str) -> serde_json::Value {
    let plan: Vec<serde_json::Value> = (1..=plan_days)
        .map(|d| {
            serde_json::json!({
                "day": d,
                "date": format!("2026-09-{:02}", d),
                "entries": [
                    {"time": time, "place_name": "Karnak Temple", "activity": "Guided walk"}
                ]
            })
        })
        .collect();
    serde_json::json!({"city": "Luxor", "days": days_declared, "plan": plan})
}

#[test]
fn test_itinerary_payload_valid() {
    let payload = itinerary_payload(2, 2, "09:00");
    let itinerary: Itinerary = serde_json::from_value(payload).unwrap();
    assert!(itinerary.validate(2).is_ok());
    assert_eq!(itinerary.plan.len(), 2);
}

#[test]
fn test_itinerary_payload_short_plan_is_schema_violation() {
    let payload = itinerary_payload(3, 2, "09:00");
    let itinerary: Itinerary = serde_json::from_value(payload).unwrap();
    let err = itinerary.validate(3).unwrap_err();
    assert!(matches!(err, CoreError::SchemaViolation(_)));
}

#[test]
fn test_itinerary_payload_bad_time_is_schema_violation() {
    let payload = itinerary_payload(1, 1, "after breakfast");
    let itinerary: Itinerary = serde_json::from_value(payload).unwrap();
    let err = itinerary.validate(1).unwrap_err();
    assert!(matches!(err, CoreError::SchemaViolation(_)));
}

#[test]
fn test_itinerary_payload_missing_field_fails_to_parse() {
    let payload = serde_json::json!({"city": "Luxor", "days": 1});
    assert!(serde_json::from_value::<Itinerary>(payload).is_err());
}

mod index_grounding {
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use sqlx::sqlite::SqlitePoolOptions;
    use sqlx::SqlitePool;

    use kemet_guide::embedding::TextEncoder;
    use kemet_guide::error::CoreResult;
    use kemet_guide::index::PlaceIndex;
    use kemet_guide::matcher::vec_to_blob;
    use kemet_guide::models::PlanRequest;
    use kemet_guide::prompt::itinerary_messages;

    struct StubEncoder(Vec<f32>);

    #[async_trait]
    impl TextEncoder for StubEncoder {
        fn model_name(&self) -> &str {
            "stub"
        }
        fn dims(&self) -> usize {
            self.0.len()
        }
        async fn encode(&self, _text: &str) -> CoreResult<Vec<f32>> {
            Ok(self.0.clone())
        }
    }

    async fn fixture_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();

        sqlx::query(
            "CREATE TABLE places (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT NOT NULL,
                city TEXT NOT NULL,
                region TEXT NOT NULL
            )",
        )
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query(
            "CREATE TABLE place_vectors (
                place_id TEXT PRIMARY KEY,
                embedding BLOB NOT NULL
            )",
        )
        .execute(&pool)
        .await
        .unwrap();

        let places: [(&str, &str, [f32; 2]); 3] = [
            ("p1", "Karnak Temple", [1.0, 0.0]),
            ("p2", "Luxor Temple", [0.8, 0.6]),
            ("p3", "Siwa Oasis", [0.0, 1.0]),
        ];
        for (id, name, vector) in places {
            sqlx::query("INSERT INTO places VALUES (?, ?, ?, ?, ?)")
                .bind(id)
                .bind(name)
                .bind(format!("{} description", name))
                .bind("Luxor")
                .bind("Upper Egypt")
                .execute(&pool)
                .await
                .unwrap();
            sqlx::query("INSERT INTO place_vectors VALUES (?, ?)")
                .bind(id)
                .bind(vec_to_blob(&vector))
                .execute(&pool)
                .await
                .unwrap();
        }

        pool
    }

    /// Retrieval feeds the itinerary prompt: the top-k names land in the
    /// grounding context, and places past k do not.
    #[tokio::test]
    async fn test_search_results_ground_the_itinerary_prompt() {
        let index = PlaceIndex::new(fixture_pool().await, Box::new(StubEncoder(vec![1.0, 0.0])));
        let places = index.search("New Kingdom temples", 2).await.unwrap();
        assert_eq!(places.len(), 2);

        let request = PlanRequest {
            query: "New Kingdom temples".to_string(),
            start: NaiveDate::from_ymd_opt(2026, 9, 1).unwrap(),
            days: 2,
            budget: "mid-range".to_string(),
        };
        let messages = itinerary_messages(&request, &places).unwrap();

        let user = &messages[1].content;
        assert!(user.contains("Karnak Temple"));
        assert!(user.contains("Luxor Temple"));
        assert!(!user.contains("Siwa Oasis"));
        assert!(user.contains("New Kingdom temples"));
        assert!(user.contains("2026-09-01"));
    }

    #[tokio::test]
    async fn test_search_never_returns_more_than_index_holds() {
        let index = PlaceIndex::new(fixture_pool().await, Box::new(StubEncoder(vec![1.0, 0.0])));
        let places = index.search("anything", 20).await.unwrap();
        assert_eq!(places.len(), 3);
    }
}

//! Integration tests for the push/pull/full-sync protocol, run against the
//! in-memory stores.

use chrono::Utc;
use medsync_engine::{ChangeOperation, ClinicRegistration, ConflictType, SyncChange};
use medsync_server::db::memory::{MemoryClinicStore, MemoryReplicaStore};
use medsync_server::db::{ClinicStore, ReplicaStore};
use medsync_server::handlers::{
    handle_full_sync, handle_pull, handle_push, FullSyncRequest, PullQuery, PushRequest,
};
use serde_json::json;
use std::time::Duration;

fn active_clinic(id: &str) -> ClinicRegistration {
    let now = Utc::now();
    let mut reg = ClinicRegistration::new(
        id,
        format!("Clinic {id}"),
        id,
        "$argon2id$test-only",
        "api-key",
        vec!["patients".into(), "visits".into(), "invoices".into()],
        now,
    );
    reg.approve("ops@central", now).unwrap();
    reg
}

fn change(
    sync_id: &str,
    collection: &str,
    operation: ChangeOperation,
    document_id: &str,
    data: serde_json::Value,
) -> SyncChange {
    SyncChange {
        sync_id: sync_id.into(),
        collection: collection.into(),
        operation,
        document_id: document_id.into(),
        data,
        changed_at: Utc::now(),
    }
}

fn push_one(
    sync_id: &str,
    collection: &str,
    operation: ChangeOperation,
    document_id: &str,
    data: serde_json::Value,
) -> PushRequest {
    PushRequest {
        changes: vec![change(sync_id, collection, operation, document_id, data)],
    }
}

#[tokio::test]
async fn idempotent_push() {
    let clinics = MemoryClinicStore::new();
    let replicas = MemoryReplicaStore::new();
    let clinic_a = active_clinic("CLINIC_A");
    clinics.seed(clinic_a.clone());

    let request = |sync_id: &str| {
        push_one(
            sync_id,
            "patients",
            ChangeOperation::Create,
            "pat-1",
            json!({"firstName": "Ada", "nationalId": "CD10001"}),
        )
    };

    let first = handle_push(&replicas, &clinics, &clinic_a, request("s1"))
        .await
        .unwrap();
    let second = handle_push(&replicas, &clinics, &clinic_a, request("s1"))
        .await
        .unwrap();

    assert_eq!(first.synced, vec!["s1"]);
    assert_eq!(second.synced, vec!["s1"]); // re-send is not a conflict
    assert!(second.conflicts.is_empty());
    assert_eq!(replicas.len(), 1); // no duplicate side effects

    let stored = replicas
        .get("patients", "pat-1", "CLINIC_A")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.payload["firstName"], "Ada");
}

#[tokio::test]
async fn ownership_isolation() {
    let clinics = MemoryClinicStore::new();
    let replicas = MemoryReplicaStore::new();
    let clinic_a = active_clinic("CLINIC_A");
    let clinic_b = active_clinic("CLINIC_B");
    clinics.seed(clinic_a.clone());
    clinics.seed(clinic_b.clone());

    // Same documentId from both clinics; visits has no duplicate heuristic.
    handle_push(
        &replicas,
        &clinics,
        &clinic_a,
        push_one(
            "a1",
            "visits",
            ChangeOperation::Create,
            "visit-7",
            json!({"reason": "checkup", "owner": "A"}),
        ),
    )
    .await
    .unwrap();

    let from_b = handle_push(
        &replicas,
        &clinics,
        &clinic_b,
        push_one(
            "b1",
            "visits",
            ChangeOperation::Update,
            "visit-7",
            json!({"reason": "emergency", "owner": "B"}),
        ),
    )
    .await
    .unwrap();
    assert_eq!(from_b.synced, vec!["b1"]);

    // A's replica is untouched; B got its own replica under its own key.
    let a_copy = replicas
        .get("visits", "visit-7", "CLINIC_A")
        .await
        .unwrap()
        .unwrap();
    let b_copy = replicas
        .get("visits", "visit-7", "CLINIC_B")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(a_copy.payload["owner"], "A");
    assert_eq!(b_copy.payload["owner"], "B");
}

#[tokio::test]
async fn cross_clinic_duplicate_detection() {
    let clinics = MemoryClinicStore::new();
    let replicas = MemoryReplicaStore::new();
    let clinic_a = active_clinic("CLINIC_A");
    let clinic_b = active_clinic("CLINIC_B");
    clinics.seed(clinic_a.clone());
    clinics.seed(clinic_b.clone());

    handle_push(
        &replicas,
        &clinics,
        &clinic_a,
        push_one(
            "a1",
            "patients",
            ChangeOperation::Create,
            "pat-a",
            json!({"firstName": "Jean", "nationalId": "CD12345"}),
        ),
    )
    .await
    .unwrap();

    // Different original id, same national id, different clinic.
    let from_b = handle_push(
        &replicas,
        &clinics,
        &clinic_b,
        push_one(
            "b1",
            "patients",
            ChangeOperation::Create,
            "pat-b",
            json!({"firstName": "J.", "nationalId": "CD12345"}),
        ),
    )
    .await
    .unwrap();

    assert!(from_b.synced.is_empty());
    assert!(from_b.failed.is_empty());
    assert_eq!(from_b.conflicts.len(), 1);

    let conflict = &from_b.conflicts[0];
    assert_eq!(conflict.sync_id, "b1");
    assert_eq!(conflict.conflict_type, ConflictType::CrossClinicDuplicate);
    assert_eq!(conflict.local_version["firstName"], "J.");
    assert_eq!(conflict.central_version["firstName"], "Jean");

    // The authoritative replica is unmodified and B's change was not applied.
    let a_copy = replicas
        .get("patients", "pat-a", "CLINIC_A")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(a_copy.payload["firstName"], "Jean");
    assert!(replicas
        .get("patients", "pat-b", "CLINIC_B")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn soft_delete_is_idempotent() {
    let clinics = MemoryClinicStore::new();
    let replicas = MemoryReplicaStore::new();
    let clinic_a = active_clinic("CLINIC_A");
    clinics.seed(clinic_a.clone());

    handle_push(
        &replicas,
        &clinics,
        &clinic_a,
        push_one(
            "s1",
            "invoices",
            ChangeOperation::Create,
            "inv-1",
            json!({"total": 120}),
        ),
    )
    .await
    .unwrap();

    let delete = |sync_id: &str, doc: &str| {
        push_one(
            sync_id,
            "invoices",
            ChangeOperation::Delete,
            doc,
            serde_json::Value::Null,
        )
    };

    let first = handle_push(&replicas, &clinics, &clinic_a, delete("d1", "inv-1"))
        .await
        .unwrap();
    let second = handle_push(&replicas, &clinics, &clinic_a, delete("d2", "inv-1"))
        .await
        .unwrap();
    let never_pushed = handle_push(&replicas, &clinics, &clinic_a, delete("d3", "inv-404"))
        .await
        .unwrap();

    assert_eq!(first.synced, vec!["d1"]);
    assert_eq!(second.synced, vec!["d2"]);
    assert_eq!(never_pushed.synced, vec!["d3"]);
    assert!(first.failed.is_empty() && second.failed.is_empty() && never_pushed.failed.is_empty());

    // The tombstone is preserved, not removed.
    let stored = replicas
        .get("invoices", "inv-1", "CLINIC_A")
        .await
        .unwrap()
        .unwrap();
    assert!(stored.deleted);
    assert!(stored.deleted_at.is_some());
}

#[tokio::test]
async fn per_change_errors_do_not_abort_the_batch() {
    let clinics = MemoryClinicStore::new();
    let replicas = MemoryReplicaStore::new();
    let mut clinic_a = active_clinic("CLINIC_A");
    clinic_a.allowed_collections = vec!["patients".into()]; // visits not permitted
    clinics.seed(clinic_a.clone());

    let request = PushRequest {
        changes: vec![
            change(
                "s1",
                "prescriptions", // no adapter for this collection
                ChangeOperation::Create,
                "rx-1",
                json!({}),
            ),
            change(
                "s2",
                "visits", // not in the allow-list
                ChangeOperation::Create,
                "visit-1",
                json!({}),
            ),
            change(
                "s3",
                "patients",
                ChangeOperation::Create,
                "pat-1",
                json!({"firstName": "Ada"}),
            ),
        ],
    };

    let response = handle_push(&replicas, &clinics, &clinic_a, request)
        .await
        .unwrap();

    assert_eq!(response.synced, vec!["s3"]);
    assert_eq!(response.failed.len(), 2);
    assert_eq!(response.failed[0].sync_id, "s1");
    assert!(response.failed[0].error.contains("unknown collection"));
    assert_eq!(response.failed[1].sync_id, "s2");
    assert!(response.failed[1].error.contains("not allowed"));
}

#[tokio::test]
async fn push_advances_cursor() {
    let clinics = MemoryClinicStore::new();
    let replicas = MemoryReplicaStore::new();
    let clinic_a = active_clinic("CLINIC_A");
    clinics.seed(clinic_a.clone());

    assert!(clinics
        .find("CLINIC_A")
        .await
        .unwrap()
        .unwrap()
        .last_push_at
        .is_none());

    handle_push(
        &replicas,
        &clinics,
        &clinic_a,
        push_one(
            "s1",
            "patients",
            ChangeOperation::Create,
            "pat-1",
            json!({"firstName": "Ada"}),
        ),
    )
    .await
    .unwrap();

    let after = clinics.find("CLINIC_A").await.unwrap().unwrap();
    assert!(after.last_push_at.is_some());
    assert!(after.last_sync_at.is_some());
}

#[tokio::test]
async fn pull_returns_only_foreign_changes() {
    let clinics = MemoryClinicStore::new();
    let replicas = MemoryReplicaStore::new();
    let clinic_a = active_clinic("CLINIC_A");
    let clinic_b = active_clinic("CLINIC_B");
    clinics.seed(clinic_a.clone());
    clinics.seed(clinic_b.clone());

    let before = Utc::now();

    handle_push(
        &replicas,
        &clinics,
        &clinic_a,
        push_one(
            "s1",
            "patients",
            ChangeOperation::Create,
            "pat-1",
            json!({"firstName": "Ada", "nationalId": "CD20001"}),
        ),
    )
    .await
    .unwrap();

    // A's own pull sees nothing of its own data.
    let own = handle_pull(
        &replicas,
        &clinics,
        &clinic_a,
        PullQuery {
            since: Some(before),
            collections: None,
        },
    )
    .await
    .unwrap();
    assert!(own.changes.is_empty());

    // B sees A's change.
    let foreign = handle_pull(
        &replicas,
        &clinics,
        &clinic_b,
        PullQuery {
            since: Some(before),
            collections: None,
        },
    )
    .await
    .unwrap();
    assert_eq!(foreign.changes.len(), 1);
    let change = &foreign.changes[0];
    assert_eq!(change.source_clinic, "CLINIC_A");
    assert_eq!(change.operation, ChangeOperation::Update);
    assert_eq!(change.document_id, "pat-1");

    let b_after = clinics.find("CLINIC_B").await.unwrap().unwrap();
    assert!(b_after.last_pull_at.is_some());
}

#[tokio::test]
async fn pull_is_monotonic_for_stale_cursors() {
    let clinics = MemoryClinicStore::new();
    let replicas = MemoryReplicaStore::new();
    let clinic_a = active_clinic("CLINIC_A");
    let clinic_b = active_clinic("CLINIC_B");
    clinics.seed(clinic_a.clone());
    clinics.seed(clinic_b.clone());

    let t0 = Utc::now();
    handle_push(
        &replicas,
        &clinics,
        &clinic_a,
        push_one(
            "s1",
            "visits",
            ChangeOperation::Create,
            "visit-1",
            json!({"n": 1}),
        ),
    )
    .await
    .unwrap();

    tokio::time::sleep(Duration::from_millis(10)).await;
    let t1 = Utc::now();

    handle_push(
        &replicas,
        &clinics,
        &clinic_a,
        push_one(
            "s2",
            "visits",
            ChangeOperation::Create,
            "visit-2",
            json!({"n": 2}),
        ),
    )
    .await
    .unwrap();

    let pull = |since| {
        handle_pull(
            &replicas,
            &clinics,
            &clinic_b,
            PullQuery {
                since: Some(since),
                collections: Some("visits".into()),
            },
        )
    };

    let from_t1 = pull(t1).await.unwrap();
    assert_eq!(from_t1.changes.len(), 1);
    assert_eq!(from_t1.changes[0].document_id, "visit-2");

    // A crashed client that never advanced its cursor re-receives everything
    // it already saw; nothing is ever dropped.
    let from_t0_again = pull(t0).await.unwrap();
    assert_eq!(from_t0_again.changes.len(), 2);
    assert_eq!(from_t0_again.changes[0].document_id, "visit-1");
    assert_eq!(from_t0_again.changes[1].document_id, "visit-2");
}

#[tokio::test]
async fn pull_propagates_deletes_as_tombstones() {
    let clinics = MemoryClinicStore::new();
    let replicas = MemoryReplicaStore::new();
    let clinic_a = active_clinic("CLINIC_A");
    let clinic_b = active_clinic("CLINIC_B");
    clinics.seed(clinic_a.clone());
    clinics.seed(clinic_b.clone());

    let before = Utc::now();

    handle_push(
        &replicas,
        &clinics,
        &clinic_a,
        push_one(
            "s1",
            "invoices",
            ChangeOperation::Create,
            "inv-1",
            json!({"total": 50}),
        ),
    )
    .await
    .unwrap();
    handle_push(
        &replicas,
        &clinics,
        &clinic_a,
        push_one(
            "s2",
            "invoices",
            ChangeOperation::Delete,
            "inv-1",
            serde_json::Value::Null,
        ),
    )
    .await
    .unwrap();

    let pulled = handle_pull(
        &replicas,
        &clinics,
        &clinic_b,
        PullQuery {
            since: Some(before),
            collections: Some("invoices".into()),
        },
    )
    .await
    .unwrap();

    assert_eq!(pulled.changes.len(), 1);
    assert_eq!(pulled.changes[0].operation, ChangeOperation::Delete);
    assert_eq!(pulled.changes[0].document_id, "inv-1");
}

#[tokio::test]
async fn pull_rejects_unpermitted_collection_filter() {
    let clinics = MemoryClinicStore::new();
    let replicas = MemoryReplicaStore::new();
    let mut clinic_a = active_clinic("CLINIC_A");
    clinic_a.allowed_collections = vec!["patients".into()];
    clinics.seed(clinic_a.clone());

    let err = handle_pull(
        &replicas,
        &clinics,
        &clinic_a,
        PullQuery {
            since: None,
            collections: Some("invoices".into()),
        },
    )
    .await
    .unwrap_err();

    assert_eq!(err.code(), "not_authorized_for_collection");
}

#[tokio::test]
async fn full_sync_bootstraps_a_collection() {
    let clinics = MemoryClinicStore::new();
    let replicas = MemoryReplicaStore::new();
    let clinic_a = active_clinic("CLINIC_A");
    clinics.seed(clinic_a.clone());

    let response = handle_full_sync(
        &replicas,
        &clinics,
        &clinic_a,
        FullSyncRequest {
            collection: "patients".into(),
            data: vec![
                json!({"_id": "pat-1", "firstName": "Ada"}),
                json!({"id": "pat-2", "firstName": "Grace"}),
                json!({"firstName": "no id, skipped"}),
            ],
        },
    )
    .await
    .unwrap();

    assert_eq!(response.synced, 2);
    assert_eq!(response.skipped, 1);
    assert!(replicas
        .get("patients", "pat-1", "CLINIC_A")
        .await
        .unwrap()
        .is_some());
    assert!(replicas
        .get("patients", "pat-2", "CLINIC_A")
        .await
        .unwrap()
        .is_some());

    let after = clinics.find("CLINIC_A").await.unwrap().unwrap();
    assert!(after.last_sync_at.is_some());
    assert!(after.last_push_at.is_none()); // full sync is not a push
}

#[tokio::test]
async fn sync_disabled_is_fatal_to_the_request() {
    let clinics = MemoryClinicStore::new();
    let replicas = MemoryReplicaStore::new();
    let mut clinic_a = active_clinic("CLINIC_A");
    clinic_a.sync_enabled = false;
    clinics.seed(clinic_a.clone());

    let err = handle_push(
        &replicas,
        &clinics,
        &clinic_a,
        push_one(
            "s1",
            "patients",
            ChangeOperation::Create,
            "pat-1",
            json!({}),
        ),
    )
    .await
    .unwrap_err();
    assert_eq!(err.code(), "sync_disabled");
    assert!(replicas.is_empty()); // no partial processing
}

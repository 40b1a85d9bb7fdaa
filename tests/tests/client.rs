mod utils;
#[allow(unused)]
use utils::*;

mod tests {
    use super::*;

    use mock_service::{Faults, PASSWORD};
    use notesload::{ApiClient, ClientError, MetricsCollector};
    use notesload_core::{Credentials, Operation, TargetConfig};
    use std::num::NonZeroU32;
    use std::sync::Arc;
    use std::time::Duration;
    use tracing_test::traced_test;

    #[tokio::test]
    #[ntest::timeout(10_000)]
    async fn crud_round_trip() {
        let (client, mock, metrics) = mock_client(Faults::default()).await;

        let created = client.create_note("Note 1-0", "content").await;
        assert!(created.succeeded());
        assert_eq!(created.outcome.status, Some(201));
        let id = created.value.clone().unwrap();
        assert_eq!(created.outcome.note_id.as_deref(), Some(id.as_str()));

        let fetched = client.get_note(&id).await;
        assert!(fetched.succeeded());
        let note = fetched.value.unwrap();
        assert_eq!(note.id, id);
        assert_eq!(note.title, "Note 1-0");

        let updated = client.update_note(&id, "Updated Note 1-0", "new").await;
        assert!(updated.succeeded());
        assert_eq!(updated.value.unwrap().content, "new");

        let listed = client.list_notes().await;
        assert!(listed.succeeded());
        assert!(listed.value.unwrap().iter().any(|n| n.id == id));

        let deleted = client.delete_note(&id).await;
        assert!(deleted.succeeded());
        assert_eq!(deleted.value, Some(()));
        assert!(mock.is_empty());

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total_requests(), 5);
        assert_eq!(snapshot.total.error_count, 0);
        for operation in Operation::ALL {
            assert_eq!(snapshot.operation(operation.as_str()).unwrap().count, 1);
        }
    }

    #[tokio::test]
    #[ntest::timeout(10_000)]
    async fn numeric_ids_are_accepted() {
        let (client, _mock, metrics) = mock_client(Faults {
            numeric_ids: true,
            ..Faults::default()
        })
        .await;

        let id = client.create_note("t", "c").await.value.unwrap();
        assert_eq!(id, "1");

        let fetched = client.get_note(&id).await;
        assert!(fetched.succeeded());
        assert_eq!(fetched.value.unwrap().id, "1");

        let updated = client.update_note(&id, "t2", "c2").await;
        assert!(updated.succeeded());
        let note = updated.value.unwrap();
        assert_eq!((note.id.as_str(), note.title.as_str()), ("1", "t2"));

        client.create_note("other", "c").await.value.unwrap();
        let listed = client.list_notes().await;
        assert!(listed.succeeded());
        let ids: Vec<_> = listed.value.unwrap().into_iter().map(|n| n.id).collect();
        assert_eq!(ids, vec!["1", "2"]);

        assert_eq!(metrics.snapshot().total.error_count, 0);
    }

    #[traced_test]
    #[tokio::test]
    #[ntest::timeout(10_000)]
    async fn failed_create_yields_no_id() {
        let (client, _mock, metrics) = mock_client(Faults {
            create_status: Some(500),
            ..Faults::default()
        })
        .await;

        let created = client.create_note("t", "c").await;
        assert!(!created.succeeded());
        assert!(created.value.is_none());
        assert_eq!(created.outcome.status, Some(500));
        assert!(created
            .outcome
            .error
            .as_ref()
            .is_some_and(ClientError::is_validation));
        assert!(logs_contain(
            "create_note failed (status is 201): 500 - Internal Server Error"
        ));

        assert_eq!(metrics.snapshot().operation("create_note").unwrap().error_count, 1);
    }

    #[traced_test]
    #[tokio::test]
    #[ntest::timeout(10_000)]
    async fn created_note_without_id_fails() {
        let (client, mock, _) = mock_client(Faults {
            create_without_id: true,
            ..Faults::default()
        })
        .await;

        let created = client.create_note("t", "c").await;
        assert_eq!(created.outcome.status, Some(201));
        assert!(!created.succeeded());
        assert!(created.value.is_none());
        assert!(logs_contain("create_note failed (has id)"));
        assert_eq!(mock.len(), 1);
    }

    #[tokio::test]
    #[ntest::timeout(10_000)]
    async fn mismatched_id_still_returns_body() {
        let (client, _mock, _) = mock_client(Faults {
            get_wrong_id: true,
            ..Faults::default()
        })
        .await;

        let id = client.create_note("t", "c").await.value.unwrap();
        let fetched = client.get_note(&id).await;

        assert!(!fetched.succeeded());
        assert_eq!(fetched.outcome.status, Some(200));
        let note = fetched.value.unwrap();
        assert_ne!(note.id, id);
        assert_eq!(note.title, "t");
    }

    #[traced_test]
    #[tokio::test]
    #[ntest::timeout(10_000)]
    async fn stale_update_title_fails() {
        let (client, _mock, _) = mock_client(Faults {
            update_keeps_title: true,
            ..Faults::default()
        })
        .await;

        let id = client.create_note("old", "c").await.value.unwrap();
        let updated = client.update_note(&id, "new", "c2").await;

        assert!(!updated.succeeded());
        assert_eq!(updated.value.unwrap().title, "old");
        assert!(logs_contain("update_note failed (has updated title)"));
    }

    #[tokio::test]
    #[ntest::timeout(10_000)]
    async fn non_array_list_fails() {
        let (client, _mock, metrics) = mock_client(Faults {
            list_as_object: true,
            ..Faults::default()
        })
        .await;

        let listed = client.list_notes().await;
        assert!(!listed.succeeded());
        assert!(listed.value.is_none());
        assert_eq!(listed.outcome.status, Some(200));
        assert_eq!(metrics.snapshot().operation("list_notes").unwrap().error_count, 1);
    }

    #[traced_test]
    #[tokio::test]
    #[ntest::timeout(10_000)]
    async fn undecodable_list_elements_fail() {
        let (client, _mock, _) = mock_client(Faults {
            list_with_junk: true,
            ..Faults::default()
        })
        .await;

        let id = client.create_note("t", "c").await.value.unwrap();
        let listed = client.list_notes().await;

        assert!(!listed.succeeded());
        let notes = listed.value.unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].id, id);
        assert!(logs_contain("list_notes failed (has valid notes)"));
    }

    #[tokio::test]
    #[ntest::timeout(10_000)]
    async fn deleting_unknown_note_fails() {
        let (client, _mock, _) = mock_client(Faults::default()).await;

        let deleted = client.delete_note("999").await;
        assert!(!deleted.succeeded());
        assert!(deleted.value.is_none());
        assert_eq!(deleted.outcome.status, Some(404));
        assert_eq!(deleted.outcome.note_id.as_deref(), Some("999"));
    }

    #[tokio::test]
    #[ntest::timeout(10_000)]
    async fn sends_basic_auth() {
        let (addr, mock) = mock_service::spawn(Faults::default()).await.unwrap();
        let metrics = Arc::new(MetricsCollector::new());

        let wrong = TargetConfig::new(
            format!("http://{addr}").parse().unwrap(),
            Credentials::new("admin", "not-the-password"),
        );
        let client = ApiClient::new(&wrong, metrics.clone()).unwrap();
        let listed = client.list_notes().await;
        assert_eq!(listed.outcome.status, Some(401));
        assert!(!listed.succeeded());

        let right = TargetConfig::new(
            format!("http://{addr}").parse().unwrap(),
            Credentials::new("admin", PASSWORD),
        );
        let client = ApiClient::new(&right, metrics).unwrap();
        assert!(client.list_notes().await.succeeded());
        assert_eq!(mock.requests("list_notes"), 2);
    }

    #[traced_test]
    #[tokio::test]
    #[ntest::timeout(10_000)]
    async fn slow_responses_time_out() {
        let (client, _mock, metrics) = mock_client_with_timeout(
            Faults {
                delay: Duration::from_millis(1_000),
                ..Faults::default()
            },
            Duration::from_millis(100),
        )
        .await;

        let created = client.create_note("t", "c").await;
        assert!(!created.succeeded());
        assert!(created.value.is_none());
        assert!(created.outcome.status.is_none());
        assert!(created.outcome.duration < Duration::from_millis(1_000));
        match &created.outcome.error {
            Some(ClientError::Transport(err)) => assert!(err.is_timeout()),
            other => panic!("unexpected error {other:?}"),
        }
        assert!(logs_contain("create_note failed to complete"));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.operation("create_note").unwrap().error_count, 1);
        assert_eq!(snapshot.error_rate(), 1.);
    }

    #[tokio::test]
    #[ntest::timeout(10_000)]
    async fn rejected_requests_over_server_rate_are_errors() {
        let (client, mock, metrics) = mock_client(Faults {
            max_rps: NonZeroU32::new(1),
            ..Faults::default()
        })
        .await;

        let mut statuses = vec![];
        for _ in 0..5 {
            statuses.push(client.list_notes().await.outcome.status);
        }

        assert_eq!(statuses[0], Some(200));
        let rejected = statuses.iter().filter(|s| **s == Some(500)).count() as u64;
        assert!(rejected >= 1, "{statuses:?}");
        assert_eq!(mock.requests("list_notes"), 5);

        let list = metrics.snapshot().operation("list_notes").cloned().unwrap();
        assert_eq!(list.count, 5);
        assert_eq!(list.error_count, rejected);
    }
}

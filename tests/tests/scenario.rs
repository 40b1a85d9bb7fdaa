mod utils;
#[allow(unused)]
use utils::*;

mod tests {
    use super::*;

    use mock_service::Faults;
    use notesload::{IterationState, StopSignal, WorkloadScenario};
    use notesload_core::{Operation, ITERATIONS, ITERATIONS_ABORTED, ITERATION_DURATION};
    use std::time::Duration;

    const THINK_TIME: Duration = Duration::from_millis(5);

    #[tokio::test]
    #[ntest::timeout(10_000)]
    async fn full_iteration() {
        init();
        let (client, mock, metrics) = mock_client(Faults::default()).await;
        let mut scenario = WorkloadScenario::new(1, client).think_time(THINK_TIME);

        let report = scenario.run(&mut StopSignal::never()).await;

        assert!(report.completed());
        assert!(!report.stopped);
        assert_eq!(report.pauses, 5);
        assert_eq!(report.failures().count(), 0);
        assert!(report.duration >= THINK_TIME * 5);

        let operations: Vec<_> = report.outcomes.iter().map(|o| o.operation).collect();
        assert_eq!(operations, Operation::ALL.to_vec());

        // Every step after create targets the created note
        let id = report.note_id.clone().unwrap();
        for outcome in report.outcomes.iter().filter(|o| o.operation != Operation::ListNotes) {
            assert_eq!(outcome.note_id.as_deref(), Some(id.as_str()));
        }

        assert!(mock.is_empty());
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.iterations(), 1);
        assert_eq!(snapshot.total_requests(), 5);
        assert_eq!(snapshot.custom(ITERATION_DURATION).unwrap().count, 1);
        assert!(snapshot.custom(ITERATIONS_ABORTED).is_none());
    }

    #[tokio::test]
    #[ntest::timeout(10_000)]
    async fn failed_create_aborts_iteration() {
        init();
        let (client, mock, metrics) = mock_client(Faults {
            create_status: Some(500),
            ..Faults::default()
        })
        .await;
        let mut scenario = WorkloadScenario::new(1, client).think_time(THINK_TIME);

        let report = scenario.run(&mut StopSignal::never()).await;

        assert_eq!(report.state, IterationState::Aborted);
        assert_eq!(report.outcomes.len(), 1);
        assert_eq!(report.pauses, 1);
        assert!(report.note_id.is_none());

        assert_eq!(mock.requests("create_note"), 1);
        for operation in ["get_note", "update_note", "list_notes", "delete_note"] {
            assert_eq!(mock.requests(operation), 0, "{operation}");
        }

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.iterations(), 1);
        assert_eq!(snapshot.custom(ITERATIONS_ABORTED).unwrap().count, 1);
        assert_eq!(snapshot.total.error_count, 1);
    }

    #[tokio::test]
    #[ntest::timeout(10_000)]
    async fn later_failures_do_not_stop_the_iteration() {
        init();
        let (client, mock, _) = mock_client(Faults {
            get_wrong_id: true,
            list_as_object: true,
            ..Faults::default()
        })
        .await;
        let mut scenario = WorkloadScenario::new(1, client).think_time(THINK_TIME);

        let report = scenario.run(&mut StopSignal::never()).await;

        assert!(report.completed());
        assert_eq!(report.outcomes.len(), 5);
        let failed: Vec<_> = report.failures().map(|o| o.operation).collect();
        assert_eq!(failed, vec![Operation::GetNote, Operation::ListNotes]);
        assert!(mock.is_empty());
    }

    #[tokio::test]
    #[ntest::timeout(10_000)]
    async fn failed_delete_is_recorded_after_other_steps() {
        init();
        let (client, mock, metrics) = mock_client(Faults {
            delete_status: Some(500),
            ..Faults::default()
        })
        .await;
        let mut scenario = WorkloadScenario::new(1, client).think_time(THINK_TIME);

        let report = scenario.run(&mut StopSignal::never()).await;

        assert_eq!(report.state, IterationState::Deleted);
        assert_eq!(report.pauses, 5);
        let failed: Vec<_> = report.failures().map(|o| o.operation).collect();
        assert_eq!(failed, vec![Operation::DeleteNote]);
        assert_eq!(report.outcomes[4].status, Some(500));
        assert_eq!(mock.len(), 1);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.operation("delete_note").unwrap().error_count, 1);
        assert_eq!(snapshot.total.error_count, 1);
        assert_eq!(snapshot.total_requests(), 5);
    }

    #[tokio::test]
    #[ntest::timeout(10_000)]
    async fn timed_out_create_aborts_and_user_carries_on() {
        init();
        let (client, _mock, metrics) = mock_client_with_timeout(
            Faults {
                delay: Duration::from_millis(1_000),
                ..Faults::default()
            },
            Duration::from_millis(100),
        )
        .await;
        let mut scenario = WorkloadScenario::new(1, client).think_time(THINK_TIME);

        for iteration in 0..2 {
            let report = scenario.run(&mut StopSignal::never()).await;
            assert_eq!(report.iteration, iteration);
            assert_eq!(report.state, IterationState::Aborted);
            assert_eq!(report.pauses, 1);

            let create = &report.outcomes[0];
            assert!(create.status.is_none());
            assert!(create
                .error
                .as_ref()
                .is_some_and(notesload::ClientError::is_transport));
        }

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.iterations(), 2);
        assert_eq!(snapshot.custom(ITERATIONS_ABORTED).unwrap().count, 2);
        assert_eq!(snapshot.operation("create_note").unwrap().error_count, 2);
    }

    #[tokio::test]
    #[ntest::timeout(10_000)]
    async fn titles_follow_user_and_iteration() {
        init();
        let (client, _mock, metrics) = mock_client(Faults {
            list_as_object: true,
            ..Faults::default()
        })
        .await;
        let mut scenario = WorkloadScenario::new(3, client).think_time(Duration::ZERO);

        for _ in 0..7 {
            scenario.run(&mut StopSignal::never()).await;
        }

        let report = scenario.run(&mut StopSignal::never()).await;
        assert_eq!(report.iteration, 7);
        assert_eq!(scenario.iterations(), 8);

        // The rejected list response echoes the collection right after the update
        let id = report.note_id.clone().unwrap();
        let list = &report.outcomes[3];
        assert!(!list.success);
        match &list.error {
            Some(notesload::ClientError::Validation { body, .. }) => {
                assert!(body.contains("\"Updated Note 3-7\""));
                assert!(body.contains(&format!("Updated content for note {id}")));
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(metrics.snapshot().iterations(), 8);
    }

    #[tokio::test]
    #[ntest::timeout(10_000)]
    async fn stop_ends_iteration_at_next_pause() {
        init();
        let (client, mock, _) = mock_client(Faults::default()).await;
        let mut scenario = WorkloadScenario::new(1, client).think_time(Duration::from_secs(30));

        let (handle, mut signal) = StopSignal::channel();
        let stopper = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            handle.stop();
        });

        let report = scenario.run(&mut signal).await;
        stopper.await.unwrap();

        assert!(report.stopped);
        assert_eq!(report.state, IterationState::Created);
        assert_eq!(report.outcomes.len(), 1);
        assert_eq!(report.pauses, 1);
        assert_eq!(mock.len(), 1);
        assert_eq!(mock.requests("get_note"), 0);
    }

    #[tokio::test]
    #[ntest::timeout(10_000)]
    async fn iterations_counter_is_shared_across_users() {
        init();
        let (client, _mock, metrics) = mock_client(Faults::default()).await;

        let mut handles = vec![];
        for vu in 1..=4 {
            let mut scenario = WorkloadScenario::new(vu, client.clone()).think_time(THINK_TIME);
            handles.push(tokio::spawn(async move {
                for _ in 0..3 {
                    scenario.run(&mut StopSignal::never()).await;
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.custom(ITERATIONS).unwrap().count, 12);
        assert_eq!(snapshot.total_requests(), 60);
        assert_eq!(snapshot.total.error_count, 0);
    }
}

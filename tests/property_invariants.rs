mod common;

use proptest::prelude::*;
use serde_json::json;

use common::MockTransport;
use gymsync::{
    core::{db::LocalDb, queue::PendingQueue},
    op::PendingMutation,
    runtime::{
        connectivity::ConnectivityMonitor,
        engine::{SkipReason, SyncEngine, SyncOutcome},
    },
    types::{Operation, StoreName},
};

const STORES: [StoreName; 7] = [
    StoreName::WorkoutPlans,
    StoreName::WorkoutLogs,
    StoreName::ExerciseLogs,
    StoreName::Exercises,
    StoreName::DailyHabits,
    StoreName::FoodQuality,
    StoreName::BodyMeasurements,
];

#[derive(Debug, Clone)]
struct Item {
    store: usize,
    operation: Operation,
    fails: bool,
}

fn item_strategy() -> impl Strategy<Value = Item> {
    (
        0..STORES.len(),
        prop_oneof![
            Just(Operation::Create),
            Just(Operation::Update),
            Just(Operation::Delete)
        ],
        any::<bool>(),
    )
        .prop_map(|(store, operation, fails)| Item {
            store,
            operation,
            fails,
        })
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn pass_leaves_exactly_failed_items_in_order(
        items in prop::collection::vec(item_strategy(), 0..24)
    ) {
        let rt = runtime();
        let (queued, remaining, calls) = rt.block_on(async {
            let queue = PendingQueue::new(LocalDb::in_memory());
            let transport = MockTransport::new();
            let mut queued = Vec::new();
            for (i, item) in items.iter().enumerate() {
                let marker = format!("item-{i:03}");
                if item.fails {
                    transport.fail_matching(&marker, Some(500));
                }
                let data = json!({"id": marker, "marker": marker});
                let m = queue
                    .enqueue(STORES[item.store], item.operation, data)
                    .await
                    .expect("enqueue");
                queued.push(m);
            }

            let monitor = ConnectivityMonitor::new(true);
            let engine = SyncEngine::new(queue.clone(), transport.clone(), monitor);
            let outcome = engine.sync_now().await.expect("pass");
            if queued.is_empty() {
                assert_eq!(outcome, SyncOutcome::Skipped(SkipReason::NothingPending));
            } else {
                assert!(matches!(outcome, SyncOutcome::Completed(_)));
            }

            let remaining = queue.list_pending().await.expect("list");
            assert_eq!(queue.pending_count(), remaining.len());
            (queued, remaining, transport.calls())
        });

        let expected: Vec<PendingMutation> = queued
            .iter()
            .zip(&items)
            .filter(|(m, item)| item.fails && mappable(m))
            .map(|(m, _)| m.clone())
            .collect();
        prop_assert_eq!(remaining, expected);

        // Deletes carry the marker in the URL, writes in the body.
        let sent: Vec<String> = calls
            .iter()
            .map(|c| match &c.body {
                Some(body) => body["marker"].as_str().unwrap_or_default().to_string(),
                None => c.url.clone(),
            })
            .collect();
        let wanted: Vec<String> = queued
            .iter()
            .filter(|m| mappable(m))
            .map(|m| match m.operation {
                Operation::Delete => delete_target(m),
                _ => m.data["marker"].as_str().unwrap_or_default().to_string(),
            })
            .collect();
        prop_assert_eq!(sent, wanted);
    }
}

fn mappable(m: &PendingMutation) -> bool {
    m.store != StoreName::BodyMeasurements.as_str()
}

fn delete_target(m: &PendingMutation) -> String {
    let store = m.store_name().expect("known store");
    let endpoint = gymsync::routes::endpoint(store).expect("endpoint");
    gymsync::routes::delete_url(endpoint, &m.data)
}

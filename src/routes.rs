//! Static store-to-endpoint table used for replay and convenience calls.

use serde_json::Value;

use crate::{
    record::{date_field, id_field},
    types::{Method, Operation, StoreName},
};

/// Remote endpoint for a collection name, if it is replayable.
///
/// Body measurements and the queue itself have no mapping.
pub fn endpoint_for_store(store: &str) -> Option<&'static str> {
    match StoreName::parse(store)? {
        StoreName::DailyHabits => Some("/api/daily-habits"),
        StoreName::ExerciseLogs => Some("/api/exercise-logs"),
        StoreName::Exercises => Some("/api/exercises"),
        StoreName::FoodQuality => Some("/api/food-quality"),
        StoreName::WorkoutLogs => Some("/api/workout-logs"),
        StoreName::WorkoutPlans => Some("/api/workout-plans"),
        StoreName::BodyMeasurements | StoreName::PendingSync => None,
    }
}

/// Typed shorthand for [`endpoint_for_store`].
pub fn endpoint(store: StoreName) -> Option<&'static str> {
    endpoint_for_store(store.as_str())
}

/// Builds the delete target from a payload's identifying fields.
///
/// `?date=` wins over `?id=`; with neither the bare endpoint is used.
pub fn delete_url(endpoint: &str, data: &Value) -> String {
    if let Some(date) = date_field(data) {
        return format!("{endpoint}?date={date}");
    }
    if let Some(id) = id_field(data) {
        return format!("{endpoint}?id={id}");
    }
    endpoint.to_string()
}

/// Queue operation recorded for a failed write with this verb.
///
/// POST and PUT both queue as `create`; the route handlers upsert.
pub fn operation_for_method(method: Method) -> Option<Operation> {
    match method {
        Method::Post | Method::Put => Some(Operation::Create),
        Method::Delete => Some(Operation::Delete),
        Method::Get => None,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn table_covers_replayable_stores_only() {
        assert_eq!(endpoint(StoreName::DailyHabits), Some("/api/daily-habits"));
        assert_eq!(endpoint(StoreName::ExerciseLogs), Some("/api/exercise-logs"));
        assert_eq!(endpoint(StoreName::Exercises), Some("/api/exercises"));
        assert_eq!(endpoint(StoreName::FoodQuality), Some("/api/food-quality"));
        assert_eq!(endpoint(StoreName::WorkoutLogs), Some("/api/workout-logs"));
        assert_eq!(endpoint(StoreName::WorkoutPlans), Some("/api/workout-plans"));
        assert_eq!(endpoint(StoreName::BodyMeasurements), None);
        assert_eq!(endpoint(StoreName::PendingSync), None);
        assert_eq!(endpoint_for_store("sleepLogs"), None);
    }

    #[test]
    fn delete_url_prefers_date_then_id() {
        let ep = "/api/daily-habits";
        assert_eq!(
            delete_url(ep, &json!({"log_date": "2024-01-10"})),
            "/api/daily-habits?date=2024-01-10"
        );
        assert_eq!(
            delete_url(ep, &json!({"date": "2024-01-11", "id": 3})),
            "/api/daily-habits?date=2024-01-11"
        );
        assert_eq!(delete_url("/api/exercises", &json!({"id": 42})), "/api/exercises?id=42");
        assert_eq!(delete_url("/api/exercises", &json!({})), "/api/exercises");
    }

    #[test]
    fn verbs_map_to_queue_operations() {
        assert_eq!(operation_for_method(Method::Post), Some(Operation::Create));
        assert_eq!(operation_for_method(Method::Put), Some(Operation::Create));
        assert_eq!(operation_for_method(Method::Delete), Some(Operation::Delete));
        assert_eq!(operation_for_method(Method::Get), None);
    }
}

mod common;

use common::{settle, ScriptedService, IMPULSE};
use pedal_core::alerts::Alerts;
use pedal_core::error::RemoteError;
use pedal_core::property_client::{file_name_only, request_file_list, PatchPropertyWatcher};
use pedal_core::protocol::{ErrorCode, FileProperty, TypedValue};
use std::rc::Rc;
use tokio::task::LocalSet;

fn watcher(service: &Rc<ScriptedService>, alerts: &Alerts) -> PatchPropertyWatcher {
    PatchPropertyWatcher::new(service.clone(), alerts.clone())
}

#[tokio::test]
async fn latest_fetch_wins_when_responses_arrive_out_of_order() {
    LocalSet::new()
        .run_until(async {
            let service = Rc::new(ScriptedService::default());
            let alerts = Alerts::new();
            let watcher = watcher(&service, &alerts);

            watcher.subscribe(5, IMPULSE);
            service.take_fetch().resolve(TypedValue::path("irs/Initial.wav"));
            settle().await;
            assert_eq!(watcher.path(), "irs/Initial.wav");

            // two pushes before either refetch completes
            service.listeners.notify(5);
            service.listeners.notify(5);
            let fetch_a = service.take_fetch();
            let fetch_b = service.take_fetch();
            assert_eq!(fetch_b.instance_id, 5);
            assert_eq!(fetch_b.property_uri, IMPULSE);

            fetch_b.resolve(TypedValue::path("irs/B.wav"));
            settle().await;
            fetch_a.resolve(TypedValue::path("irs/A.wav"));
            settle().await;

            assert_eq!(watcher.path(), "irs/B.wav");
            assert!(alerts.current().is_empty());
        })
        .await;
}

#[tokio::test]
async fn earlier_fetch_resolving_first_is_still_discarded() {
    LocalSet::new()
        .run_until(async {
            let service = Rc::new(ScriptedService::default());
            let alerts = Alerts::new();
            let watcher = watcher(&service, &alerts);

            watcher.subscribe(5, IMPULSE);
            let initial = service.take_fetch();
            service.listeners.notify(5);
            let latest = service.take_fetch();

            initial.resolve(TypedValue::path("irs/Old.wav"));
            settle().await;
            assert_eq!(watcher.value().get(), None);

            latest.resolve(TypedValue::path("irs/New.wav"));
            settle().await;
            assert_eq!(watcher.path(), "irs/New.wav");
        })
        .await;
}

#[tokio::test]
async fn unsubscribe_cancels_listener_and_drops_late_response() {
    LocalSet::new()
        .run_until(async {
            let service = Rc::new(ScriptedService::default());
            let alerts = Alerts::new();
            let watcher = watcher(&service, &alerts);

            watcher.subscribe(5, IMPULSE);
            assert!(watcher.is_subscribed());
            assert_eq!(service.listeners.count_for(5), 1);
            let in_flight = service.take_fetch();

            watcher.unsubscribe();
            watcher.unsubscribe();
            assert!(!watcher.is_subscribed());
            assert_eq!(service.listeners.count_for(5), 0);

            in_flight.resolve(TypedValue::path("irs/Late.wav"));
            settle().await;
            assert_eq!(watcher.value().get(), None);

            service.listeners.notify(5);
            assert_eq!(service.pending_fetches(), 0);
        })
        .await;
}

#[tokio::test]
async fn retargeting_tears_down_before_resubscribing() {
    LocalSet::new()
        .run_until(async {
            let service = Rc::new(ScriptedService::default());
            let alerts = Alerts::new();
            let watcher = watcher(&service, &alerts);

            watcher.subscribe(5, IMPULSE);
            service.take_fetch().resolve(TypedValue::path("irs/Five.wav"));
            settle().await;
            assert_eq!(watcher.path(), "irs/Five.wav");

            // same pair again: nothing happens
            watcher.subscribe(5, IMPULSE);
            assert_eq!(service.pending_fetches(), 0);
            assert_eq!(service.listeners.count_for(5), 1);

            watcher.subscribe(6, IMPULSE);
            assert_eq!(service.listeners.count_for(5), 0);
            assert_eq!(service.listeners.count_for(6), 1);
            assert_eq!(watcher.value().get(), None);

            let fetch = service.take_fetch();
            assert_eq!(fetch.instance_id, 6);
            fetch.resolve(TypedValue::path("irs/Six.wav"));
            settle().await;
            assert_eq!(watcher.path(), "irs/Six.wav");

            service.listeners.notify(5);
            assert_eq!(service.pending_fetches(), 0);
        })
        .await;
}

#[tokio::test]
async fn failures_alert_only_for_the_current_fetch() {
    LocalSet::new()
        .run_until(async {
            let service = Rc::new(ScriptedService::default());
            let alerts = Alerts::new();
            let watcher = watcher(&service, &alerts);

            watcher.subscribe(5, IMPULSE);
            let stale = service.take_fetch();
            service.listeners.notify(5);
            let current = service.take_fetch();

            stale.fail(RemoteError::Disconnected);
            settle().await;
            assert!(alerts.current().is_empty());

            current.fail(RemoteError::Engine {
                code: ErrorCode::NotFound,
                msg: "no such property".to_string(),
            });
            settle().await;
            assert_eq!(alerts.current().len(), 1);
            assert_eq!(watcher.value().get(), None);
        })
        .await;
}

#[tokio::test]
async fn set_value_writes_through_service_and_drop_releases_listener() {
    LocalSet::new()
        .run_until(async {
            let service = Rc::new(ScriptedService::default());
            let alerts = Alerts::new();
            let watcher = watcher(&service, &alerts);

            watcher.set_value(TypedValue::path("ignored.wav"));
            assert!(service.calls().is_empty());

            watcher.subscribe(7, IMPULSE);
            watcher.set_value(TypedValue::path("irs/Plate.wav"));
            settle().await;
            assert_eq!(service.calls().len(), 1);
            assert!(service.calls()[0].starts_with("set 7 urn:test:reverb#impulseFile"));
            assert!(alerts.current().is_empty());

            drop(watcher);
            assert_eq!(service.listeners.count_for(7), 0);
        })
        .await;
}

#[tokio::test]
async fn file_list_and_display_name() {
    let service = ScriptedService::default();
    let property = FileProperty {
        name: "Impulse".to_string(),
        patch_property: IMPULSE.to_string(),
        directory: "ReverbImpulseFiles".to_string(),
        file_types: Vec::new(),
    };
    let files = request_file_list(&service, &property).await.unwrap();
    assert_eq!(files, vec!["ReverbImpulseFiles/Hall.wav"]);
    assert_eq!(file_name_only(&files[0]), "Hall");
}

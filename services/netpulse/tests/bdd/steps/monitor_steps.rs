//! BDD step definitions for the connectivity monitor feature

use std::sync::Arc;
use std::time::Duration;

use cucumber::{given, then, when};

use netpulse::classify::ClassificationPolicy;
use netpulse::probe::Measurement;
use netpulse::signal::{HostSignal, ReachabilitySignal, UnavailableSignal};
use netpulse::{render, ConnectivityMonitor, MonitorSettings};

use crate::world::{NetpulseWorld, ScriptedProbe, WAIT};

fn ensure_monitor(world: &mut NetpulseWorld) -> ConnectivityMonitor {
    if let Some(monitor) = &world.monitor {
        return monitor.clone();
    }

    let signal: Arc<dyn ReachabilitySignal> = if world.signal_unavailable {
        Arc::new(UnavailableSignal)
    } else {
        world
            .signal
            .get_or_insert_with(|| Arc::new(HostSignal::new()))
            .clone()
    };
    let (probe, script) = ScriptedProbe::new();
    let settings = MonitorSettings {
        probe_interval: Duration::from_secs(3600),
        probe_timeout: Duration::from_secs(3600),
        policy: ClassificationPolicy::default(),
    };

    let monitor = ConnectivityMonitor::new(signal, probe.clone(), settings);
    world.probe = Some(probe);
    world.script = Some(script);
    world.monitor = Some(monitor.clone());
    monitor
}

fn host_signal(world: &NetpulseWorld) -> &Arc<HostSignal> {
    world.signal.as_ref().expect("reachability signal not set")
}

fn probe(world: &NetpulseWorld) -> &Arc<ScriptedProbe> {
    world.probe.as_ref().expect("probe not set")
}

fn send_measurement(world: &NetpulseWorld, measurement: Measurement) {
    world
        .script
        .as_ref()
        .expect("probe script not set")
        .send(Ok(measurement))
        .expect("probe script closed");
}

#[given("the network is reachable")]
fn network_reachable(world: &mut NetpulseWorld) {
    world.signal = Some(Arc::new(HostSignal::with_reachable(true)));
}

#[given("the network reachability is unknown")]
fn network_unknown(world: &mut NetpulseWorld) {
    world.signal = Some(Arc::new(HostSignal::new()));
}

#[given("the network is unreachable")]
fn network_unreachable(world: &mut NetpulseWorld) {
    world.signal = Some(Arc::new(HostSignal::with_reachable(false)));
}

#[given("the reachability signal is unavailable")]
fn signal_unavailable(world: &mut NetpulseWorld) {
    world.signal_unavailable = true;
}

#[when("an observer subscribes")]
fn observer_subscribes(world: &mut NetpulseWorld) {
    let monitor = ensure_monitor(world);
    let (state, subscription) = monitor.subscribe();
    world.last_state = Some(state);
    world.subscription = Some(subscription);
}

#[when("the observer unsubscribes")]
fn observer_unsubscribes(world: &mut NetpulseWorld) {
    world
        .subscription
        .take()
        .expect("no active subscription")
        .unsubscribe();
}

#[when("the probe is in flight")]
async fn probe_in_flight(world: &mut NetpulseWorld) {
    probe(world).wait_started().await;
}

#[when("the probe measures a slow link")]
fn probe_measures_slow(world: &mut NetpulseWorld) {
    send_measurement(
        world,
        Measurement::Transfer {
            bytes: 10_000,
            elapsed: Duration::from_secs(1),
        },
    );
}

#[when("the probe measures a fast link")]
fn probe_measures_fast(world: &mut NetpulseWorld) {
    send_measurement(
        world,
        Measurement::Transfer {
            bytes: 1_000_000,
            elapsed: Duration::from_millis(100),
        },
    );
}

#[when("connectivity is lost")]
fn connectivity_lost(world: &mut NetpulseWorld) {
    host_signal(world).set_reachable(false);
}

#[when("connectivity is restored")]
async fn connectivity_restored(world: &mut NetpulseWorld) {
    host_signal(world).set_reachable(true);
    // give the driver a turn to handle the event
    tokio::time::sleep(Duration::from_millis(10)).await;
}

#[then(expr = "the observer sees {string}")]
fn observer_sees(world: &mut NetpulseWorld, expected: String) {
    let state = world.last_state.expect("no reading observed");
    assert_eq!(state.to_string(), expected);
}

#[then(expr = "the observer is notified of {string}")]
async fn observer_notified(world: &mut NetpulseWorld, expected: String) {
    let subscription = world.subscription.as_mut().expect("no active subscription");
    let state = tokio::time::timeout(WAIT, subscription.changed())
        .await
        .expect("timed out waiting for a reading")
        .expect("monitor disposed");
    world.last_state = Some(state);
    assert_eq!(state.to_string(), expected);
}

#[then(expr = "the reading settles on {string}")]
async fn reading_settles(world: &mut NetpulseWorld, expected: String) {
    let probe = Arc::clone(probe(world));
    tokio::time::timeout(WAIT, async {
        while probe.answered() < probe.calls() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("probe result was never handed back");
    // let the driver apply the last result
    tokio::time::sleep(Duration::from_millis(20)).await;

    let monitor = world.monitor.as_ref().expect("monitor not created");
    let state = monitor.current();
    world.last_state = Some(state);
    assert_eq!(state.to_string(), expected);
}

#[then(expr = "the banner for the reading is {string}")]
fn banner_for_reading(world: &mut NetpulseWorld, expected: String) {
    let state = world.last_state.expect("no reading observed");
    assert_eq!(render(&state).to_string(), expected);
}

#[then("the probe loop is running")]
fn probe_loop_running(world: &mut NetpulseWorld) {
    let monitor = world.monitor.as_ref().expect("monitor not created");
    assert!(monitor.is_running());
}

#[then("the probe loop is paused")]
fn probe_loop_paused(world: &mut NetpulseWorld) {
    let monitor = world.monitor.as_ref().expect("monitor not created");
    assert!(!monitor.is_running());
    assert_eq!(monitor.observer_count(), 0);
}

#[then(expr = "the probe has run {int} time(s)")]
async fn probe_has_run(world: &mut NetpulseWorld, expected: usize) {
    assert_eq!(probe(world).calls(), expected);
}

#[then("no probe runs")]
async fn no_probe_runs(world: &mut NetpulseWorld) {
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(probe(world).calls(), 0);
}

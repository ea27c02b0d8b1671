//! BDD step definitions for the status banner feature

use cucumber::{given, then, when};

use netpulse::{render, ConnectionSpeed, ConnectivityState};

use crate::world::NetpulseWorld;

fn parse_speed(s: &str) -> ConnectionSpeed {
    match s {
        "fast" => ConnectionSpeed::Fast,
        "slow" => ConnectionSpeed::Slow,
        "unknown" => ConnectionSpeed::Unknown,
        other => panic!("Unknown connection speed: {}", other),
    }
}

#[given(expr = "the device is {word} with a {word} connection")]
fn device_state(world: &mut NetpulseWorld, online: String, speed: String) {
    let is_online = match online.as_str() {
        "online" => true,
        "offline" => false,
        other => panic!("Unknown reachability: {}", other),
    };
    world.banner_state = Some(ConnectivityState {
        is_online,
        connection_speed: parse_speed(&speed),
    });
}

#[when("the banner is rendered")]
fn banner_rendered(world: &mut NetpulseWorld) {
    let state = world.banner_state.expect("device state not set");
    world.banner = Some(render(&state));
}

#[then(expr = "the banner shows {string}")]
fn banner_shows(world: &mut NetpulseWorld, expected: String) {
    let banner = world.banner.expect("banner not rendered");
    assert_eq!(banner.to_string(), expected);
}

#[then(expr = "the banner message mentions {string}")]
fn banner_message_mentions(world: &mut NetpulseWorld, fragment: String) {
    let banner = world.banner.expect("banner not rendered");
    let message = banner.message().expect("banner has no message");
    assert!(
        message.contains(&fragment),
        "expected {:?} in {:?}",
        fragment,
        message
    );
}

#[then("the banner has no message")]
fn banner_has_no_message(world: &mut NetpulseWorld) {
    let banner = world.banner.expect("banner not rendered");
    assert_eq!(banner.message(), None);
}

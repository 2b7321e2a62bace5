//! Host Clock
//!
//! This example drives a state machine from a fixed-rate host clock, the
//! way a game loop or render step would.
//!
//! Key concepts:
//! - Calling `tick` once per frame with the elapsed time
//! - Heartbeat hooks receiving the frame delta
//! - Structured logs from the machine through `tracing`
//!
//! Run with: RUST_LOG=statecraft=debug cargo run --example host_clock

use statecraft::{MachineHandle, StateDef, StateMachine, TransitionDef};
use std::time::Duration;
use tokio::time::{interval, Instant};
use tracing::info;
use tracing_subscriber::EnvFilter;

const FRAMES: usize = 30;

fn elapsed_at_least(seconds: f64) -> impl Fn(&MachineHandle) -> bool {
    move |machine: &MachineHandle| {
        machine
            .data()
            .get("elapsed")
            .and_then(|v| v.as_f64())
            .is_some_and(|elapsed| elapsed >= seconds)
    }
}

fn accumulate(machine: &MachineHandle, delta: f64) -> statecraft::HookResult {
    let elapsed = machine.data().get("elapsed").and_then(|v| v.as_f64()).unwrap_or(0.0);
    machine.change_data("elapsed", elapsed + delta);
    Ok(())
}

fn reset(machine: &MachineHandle) -> statecraft::HookResult {
    machine.change_data("elapsed", 0.0);
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let green = StateDef::builder("Green")
        .on_enter(reset)
        .on_heartbeat(accumulate)
        .transition(TransitionDef::builder("Yellow").when(elapsed_at_least(0.15)).build())
        .build();
    let yellow = green
        .extend()
        .name("Yellow")
        .transitions(vec![TransitionDef::builder("Red").when(elapsed_at_least(0.05)).build()])
        .build();
    let red = green
        .extend()
        .name("Red")
        .transitions(vec![TransitionDef::builder("Green").when(elapsed_at_least(0.1)).build()])
        .build();

    let machine = StateMachine::builder()
        .label("crossing")
        .initial("Green")
        .states(vec![green, yellow, red])
        .build()
        .expect("light definitions are valid");

    machine.state_changed().connect(|change| {
        info!(from = %change.previous_state, to = %change.new_state, "light changed");
    });

    let mut clock = interval(Duration::from_millis(16));
    let mut last = Instant::now();
    for _ in 0..FRAMES {
        let now = clock.tick().await;
        let delta = now.duration_since(last).as_secs_f64();
        last = now;
        if let Err(err) = machine.tick(delta) {
            tracing::error!(%err, "tick failed");
            break;
        }
    }

    info!(
        state = %machine.current_state(),
        changes = machine.history().len(),
        "clock stopped"
    );
    machine.destroy();
}

//! Light Switch State Machine
//!
//! This example demonstrates a two-state machine driven entirely by
//! shared data.
//!
//! Key concepts:
//! - Inline state and transition definitions
//! - Data-driven transitions evaluated on every tick
//! - State change notifications
//!
//! Run with: cargo run --example light_switch

use serde_json::json;
use statecraft::{StateDef, StateMachine, TransitionDef};

fn switch_is(on: bool) -> impl Fn(&statecraft::MachineHandle) -> bool {
    move |machine: &statecraft::MachineHandle| machine.data().get("switch") == Some(json!(on))
}

fn main() {
    println!("=== Light Switch State Machine ===\n");

    let off = StateDef::builder("Off")
        .on_enter(|_| {
            println!("  [Off] the room goes dark");
            Ok(())
        })
        .transition(
            TransitionDef::builder("On")
                .name("FlipUp")
                .when(switch_is(true))
                .build(),
        )
        .build();

    let on = StateDef::builder("On")
        .on_enter(|_| {
            println!("  [On] the room lights up");
            Ok(())
        })
        .on_heartbeat(|machine, delta| {
            let lit = machine.data().get("lit_for").and_then(|v| v.as_f64()).unwrap_or(0.0);
            machine.data().insert("lit_for", lit + delta);
            Ok(())
        })
        .transition(
            TransitionDef::builder("Off")
                .name("FlipDown")
                .when(switch_is(false))
                .build(),
        )
        .build();

    let machine = StateMachine::create("Off", vec![off, on], json!({ "switch": false }))
        .expect("light switch definitions are valid");

    machine.state_changed().connect(|change| {
        println!("  {} -> {}", change.previous_state, change.new_state);
    });

    println!("Initial state: {}\n", machine.current_state());

    let frame = 1.0 / 60.0;
    for (step, switch) in [true, true, true, false, true].into_iter().enumerate() {
        println!("Frame {step}: switch = {switch}");
        machine.change_data("switch", switch);
        machine.tick(frame).expect("every target is registered");
    }

    println!("\nFinal state: {}", machine.current_state());
    println!("History: {}", machine.history().path().join(" -> "));
    println!("\n=== Example Complete ===");
}

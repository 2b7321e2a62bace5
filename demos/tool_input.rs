//! Tool Input State Machine
//!
//! This example models a hand-held tool whose states react to player input
//! written into the machine's shared data.
//!
//! Key concepts:
//! - Deriving states from a shared base with `extend`
//! - Guards refusing a change while a state is busy
//! - Completing a state with `MachineHandle::complete`
//! - Data change hooks and notifications
//!
//! Run with: cargo run --example tool_input

use serde_json::json;
use statecraft::{MachineHandle, StateDef, StateMachine, TransitionDef};

fn pressed(input: &'static str) -> impl Fn(&MachineHandle) -> bool {
    move |machine: &MachineHandle| machine.data().get("input") == Some(json!(input))
}

fn main() {
    println!("=== Tool Input State Machine ===\n");

    let base = StateDef::builder("Base")
        .on_leave(|machine| {
            println!("  leaving {}", machine.current_state());
            Ok(())
        })
        .build();

    let idle = base
        .extend()
        .name("Idle")
        .transition(TransitionDef::builder("Firing").when(pressed("fire")).build())
        .transition(TransitionDef::builder("Reloading").when(pressed("reload")).build())
        .build();

    let firing = base
        .extend()
        .name("Firing")
        .on_enter(|machine| {
            let ammo = machine.data().get("ammo").and_then(|v| v.as_i64()).unwrap_or(0);
            if ammo == 0 {
                println!("  click, out of ammo");
                machine.complete("Reloading")?;
                return Ok(());
            }
            println!("  bang ({} left)", ammo - 1);
            machine.change_data("ammo", ammo - 1);
            machine.complete("Idle")?;
            Ok(())
        })
        .build();

    let reloading = base
        .extend()
        .name("Reloading")
        .on_heartbeat(|machine, delta| {
            let data = machine.data();
            let elapsed = data.get("reload_time").and_then(|v| v.as_f64()).unwrap_or(0.0) + delta;
            data.insert("reload_time", elapsed);
            if elapsed >= 0.04 {
                data.remove("reload_time");
                machine.change_data("ammo", 2);
                machine.complete("Idle")?;
            }
            Ok(())
        })
        .can_change_state(|machine, _| machine.data().get("reload_time").is_none())
        .build();

    let machine = StateMachine::create("Idle", vec![idle, firing, reloading], json!({ "ammo": 1 }))
        .expect("tool definitions are valid");

    machine.data_changed().connect(|event| {
        println!("  data: {} = {}", event.change.key, event.change.new_value);
    });
    machine.state_changed().connect(|change| {
        println!("  {} -> {}", change.previous_state, change.new_state);
    });

    let inputs = ["fire", "none", "fire", "none", "none", "none", "none", "none", "fire"];
    for (frame, input) in inputs.into_iter().enumerate() {
        println!("Frame {frame}: input = {input}");
        machine.data().insert("input", input);
        machine.tick(1.0 / 60.0).expect("every target is registered");
    }

    println!("\nFinal state: {}", machine.current_state());
    machine.destroy();
    println!("\n=== Example Complete ===");
}

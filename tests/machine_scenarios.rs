//! End-to-end scenarios for the state machine controller.

use serde_json::json;
use statecraft::{
    BuildError, DefinitionViolation, HookError, MachineError, MachineHandle, StateChanged,
    StateDef, StateMachine, TransitionDef,
};
use statecraft::definition::StateDefBuilder;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

const FRAME: f64 = 1.0 / 60.0;

type Log = Rc<RefCell<Vec<String>>>;

fn new_log() -> Log {
    Rc::new(RefCell::new(Vec::new()))
}

fn push(log: &Log, entry: &str) {
    log.borrow_mut().push(entry.to_string());
}

/// State whose enter and leave hooks are written to `log`.
fn logged_state(name: &'static str, log: &Log) -> StateDefBuilder {
    let enter_log = log.clone();
    let leave_log = log.clone();
    StateDef::builder(name)
        .on_enter(move |_| {
            push(&enter_log, &format!("{name}.enter"));
            Ok(())
        })
        .on_leave(move |_| {
            push(&leave_log, &format!("{name}.leave"));
            Ok(())
        })
}

fn record_state_changes(machine: &StateMachine) -> Rc<RefCell<Vec<StateChanged>>> {
    let changes = Rc::new(RefCell::new(Vec::new()));
    let sink = changes.clone();
    machine
        .state_changed()
        .connect(move |change| sink.borrow_mut().push(change.clone()));
    changes
}

fn changed(new_state: &str, previous_state: &str) -> StateChanged {
    StateChanged {
        new_state: new_state.to_string(),
        previous_state: previous_state.to_string(),
    }
}

fn count_at_least(n: i64) -> impl Fn(&MachineHandle) -> bool {
    move |machine: &MachineHandle| {
        machine
            .data()
            .get("count")
            .and_then(|v| v.as_i64())
            .is_some_and(|count| count >= n)
    }
}

#[test]
fn create_enters_the_initial_state() {
    let log = new_log();
    let machine = StateMachine::create(
        "Idle",
        vec![logged_state("Idle", &log).build(), StateDef::builder("Active").build()],
        json!({}),
    )
    .unwrap();

    assert_eq!(machine.current_state(), "Idle");
    assert_eq!(machine.previous_state(), "");
    assert!(machine.history().is_empty());
    assert_eq!(*log.borrow(), vec!["Idle.enter"]);
}

#[test]
fn create_rejects_duplicate_names() {
    let result = StateMachine::create(
        "Idle",
        vec![StateDef::builder("Idle").build(), StateDef::builder("Idle").build()],
        json!({}),
    );

    match result {
        Err(BuildError::InvalidDefinitions { violations }) => {
            assert!(violations.contains(&DefinitionViolation::DuplicateState {
                name: "Idle".to_string()
            }));
        }
        other => panic!("expected InvalidDefinitions, got {other:?}"),
    }
}

#[test]
fn create_rejects_unknown_initial_state() {
    let err = StateMachine::create("Flying", vec![StateDef::builder("Idle").build()], json!({}))
        .unwrap_err();

    assert_eq!(
        err.violations(),
        [DefinitionViolation::InitialStateNotFound {
            name: "Flying".to_string()
        }]
    );
}

#[test]
fn init_hooks_run_once_at_construction() {
    let log = new_log();
    let state_log = log.clone();
    let transition_log = log.clone();

    let idle = StateDef::builder("Idle")
        .on_init(move |_| {
            push(&state_log, "Idle.init");
            Ok(())
        })
        .transition(
            TransitionDef::builder("Idle")
                .name("Loop")
                .on_init(move |_| {
                    push(&transition_log, "Loop.init");
                    Ok(())
                })
                .build(),
        )
        .build();

    let machine = StateMachine::create("Idle", vec![idle], json!({})).unwrap();
    machine.tick(FRAME).unwrap();

    assert_eq!(*log.borrow(), vec!["Loop.init", "Idle.init"]);
}

#[test]
fn change_requested_from_init_hook_follows_the_initial_entry() {
    let log = new_log();
    let start = logged_state("Start", &log)
        .on_init(|machine| {
            machine.change_state("Ready")?;
            Ok(())
        })
        .build();
    let machine = StateMachine::create(
        "Start",
        vec![start, logged_state("Ready", &log).build()],
        json!({}),
    )
    .unwrap();

    assert_eq!(machine.current_state(), "Ready");
    assert_eq!(machine.previous_state(), "Start");
    assert_eq!(machine.history().path(), vec!["Start", "Ready"]);
    assert_eq!(
        *log.borrow(),
        vec!["Start.enter", "Start.leave", "Ready.enter"]
    );
}

#[test]
fn change_to_current_state_is_a_no_op() {
    let log = new_log();
    let machine = StateMachine::create("Idle", vec![logged_state("Idle", &log).build()], json!({}))
        .unwrap();
    let changes = record_state_changes(&machine);

    machine.change_state("Idle").unwrap();

    assert!(changes.borrow().is_empty());
    assert_eq!(*log.borrow(), vec!["Idle.enter"]);
}

#[test]
fn change_to_unknown_state_fails_without_moving() {
    let machine =
        StateMachine::create("Idle", vec![StateDef::builder("Idle").build()], json!({})).unwrap();

    let result = machine.change_state("Nowhere");

    assert_eq!(
        result,
        Err(MachineError::UnknownState {
            name: "Nowhere".to_string()
        })
    );
    assert_eq!(machine.current_state(), "Idle");
}

#[test]
fn successful_change_notifies_once() {
    let machine = StateMachine::create(
        "A",
        vec![StateDef::builder("A").build(), StateDef::builder("B").build()],
        json!({}),
    )
    .unwrap();
    let changes = record_state_changes(&machine);

    machine.change_state("B").unwrap();

    assert_eq!(machine.current_state(), "B");
    assert_eq!(machine.previous_state(), "A");
    assert_eq!(*changes.borrow(), vec![changed("B", "A")]);
    assert_eq!(machine.history().path(), vec!["A", "B"]);
}

#[test]
fn leave_hooks_run_before_enter_and_transition_enters_are_deferred() {
    let log = new_log();
    let leave_log = log.clone();
    let enter_log = log.clone();

    let idle = logged_state("Idle", &log)
        .transition(
            TransitionDef::builder("Active")
                .name("First")
                .on_leave({
                    let log = leave_log.clone();
                    move |_| {
                        push(&log, "First.leave");
                        Ok(())
                    }
                })
                .build(),
        )
        .transition(
            TransitionDef::builder("Active")
                .name("Second")
                .on_leave(move |_| {
                    push(&leave_log, "Second.leave");
                    Ok(())
                })
                .build(),
        )
        .build();
    let active = logged_state("Active", &log)
        .transition(
            TransitionDef::builder("Idle")
                .name("Back")
                .on_enter(move |_| {
                    push(&enter_log, "Back.enter");
                    Ok(())
                })
                .build(),
        )
        .build();

    let machine = StateMachine::create("Idle", vec![idle, active], json!({})).unwrap();
    log.borrow_mut().clear();

    machine.change_state("Active").unwrap();

    assert_eq!(
        *log.borrow(),
        vec!["Idle.leave", "First.leave", "Second.leave", "Active.enter", "Back.enter"]
    );
    assert_eq!(machine.pending_tasks(), 0);
}

#[test]
fn state_guard_can_refuse_a_change() {
    let stunned = StateDef::builder("Stunned")
        .can_change_state(|machine, target| {
            target != "Attacking" || machine.data().get("recovered") == Some(json!(true))
        })
        .build();
    let machine = StateMachine::create(
        "Stunned",
        vec![stunned, StateDef::builder("Attacking").build()],
        json!({}),
    )
    .unwrap();
    let changes = record_state_changes(&machine);

    machine.change_state("Attacking").unwrap();
    assert_eq!(machine.current_state(), "Stunned");

    machine.data().insert("recovered", true);
    machine.change_state("Attacking").unwrap();

    assert_eq!(machine.current_state(), "Attacking");
    assert_eq!(changes.borrow().len(), 1);
}

#[test]
fn change_data_with_equal_value_is_a_no_op() {
    let machine =
        StateMachine::create("Idle", vec![StateDef::builder("Idle").build()], json!({ "count": 3 }))
            .unwrap();
    let notifications = Rc::new(Cell::new(0));
    let counter = notifications.clone();
    machine
        .data_changed()
        .connect(move |_| counter.set(counter.get() + 1));

    machine.change_data("count", 3);

    assert_eq!(notifications.get(), 0);
}

#[test]
fn change_data_treats_equal_numbers_as_unchanged() {
    let machine =
        StateMachine::create("Idle", vec![StateDef::builder("Idle").build()], json!({ "count": 3 }))
            .unwrap();
    let notifications = Rc::new(Cell::new(0));
    let counter = notifications.clone();
    machine
        .data_changed()
        .connect(move |_| counter.set(counter.get() + 1));

    machine.change_data("count", 3.0);
    assert_eq!(notifications.get(), 0);

    machine.change_data("count", 3.5);
    assert_eq!(notifications.get(), 1);
}

#[test]
fn change_data_notifies_with_old_and_new_values() {
    let machine =
        StateMachine::create("Idle", vec![StateDef::builder("Idle").build()], json!({ "count": 1 }))
            .unwrap();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    machine.data_changed().connect(move |event| {
        sink.borrow_mut().push((
            event.change.key.clone(),
            event.change.new_value.clone(),
            event.change.old_value.clone(),
            event.data.get("count"),
        ));
    });

    machine.change_data("count", 2);

    assert_eq!(
        *seen.borrow(),
        vec![("count".to_string(), json!(2), json!(1), Some(json!(2)))]
    );
    assert_eq!(machine.data().get("count"), Some(json!(2)));
}

#[test]
fn current_state_sees_data_changes() {
    let log = new_log();
    let hook_log = log.clone();
    let idle = StateDef::builder("Idle")
        .on_data_changed(move |machine, change| {
            let stored = machine.data().get(&change.key);
            push(&hook_log, &format!("{}={}", change.key, stored.unwrap_or_default()));
            Ok(())
        })
        .build();
    let machine = StateMachine::create("Idle", vec![idle], json!({})).unwrap();

    machine.change_data("ammo", 6);
    machine.change_data("ammo", 6);

    assert_eq!(*log.borrow(), vec!["ammo=6"]);
}

#[test]
fn raw_writes_skip_notification_but_drive_transitions() {
    let idle = StateDef::builder("Idle")
        .transition(TransitionDef::builder("Alert").when(count_at_least(1)).build())
        .build();
    let machine = StateMachine::create(
        "Idle",
        vec![idle, StateDef::builder("Alert").build()],
        json!({}),
    )
    .unwrap();
    let notifications = Rc::new(Cell::new(0));
    let counter = notifications.clone();
    machine
        .data_changed()
        .connect(move |_| counter.set(counter.get() + 1));

    machine.data().insert("count", 1);
    machine.tick(FRAME).unwrap();

    assert_eq!(notifications.get(), 0);
    assert_eq!(machine.current_state(), "Alert");
}

#[test]
fn first_matching_transition_wins() {
    let start = StateDef::builder("Start")
        .transition(TransitionDef::builder("A").name("T1").when(|_| false).build())
        .transition(TransitionDef::builder("B").name("T2").when(|_| true).build())
        .transition(TransitionDef::builder("C").name("T3").when(|_| true).build())
        .build();
    let machine = StateMachine::create(
        "Start",
        vec![
            start,
            StateDef::builder("A").build(),
            StateDef::builder("B").build(),
            StateDef::builder("C").build(),
        ],
        json!({}),
    )
    .unwrap();

    machine.tick(FRAME).unwrap();

    assert_eq!(machine.current_state(), "B");
}

#[test]
fn later_transitions_are_not_evaluated_after_a_match() {
    let evaluated = Rc::new(Cell::new(false));
    let flag = evaluated.clone();
    let start = StateDef::builder("Start")
        .transition(TransitionDef::builder("B").name("Hit").when(|_| true).build())
        .transition(
            TransitionDef::builder("B")
                .name("Never")
                .when(move |_| {
                    flag.set(true);
                    true
                })
                .build(),
        )
        .build();
    let machine = StateMachine::create(
        "Start",
        vec![start, StateDef::builder("B").build()],
        json!({}),
    )
    .unwrap();

    machine.tick(FRAME).unwrap();

    assert!(!evaluated.get());
}

#[test]
fn transition_guard_is_still_enforced() {
    let start = StateDef::builder("Start")
        .transition(
            TransitionDef::builder("B")
                .when(|_| true)
                .can_change_state(|machine| machine.data().contains_key("unlocked"))
                .build(),
        )
        .build();
    let machine = StateMachine::create(
        "Start",
        vec![start, StateDef::builder("B").build()],
        json!({}),
    )
    .unwrap();

    machine.tick(FRAME).unwrap();
    assert_eq!(machine.current_state(), "Start");

    machine.data().insert("unlocked", true);
    machine.tick(FRAME).unwrap();
    assert_eq!(machine.current_state(), "B");
}

#[test]
fn tick_reports_unregistered_targets() {
    let start = StateDef::builder("Start")
        .transition(TransitionDef::builder("Ghost").when(|_| true).build())
        .build();
    let machine = StateMachine::create("Start", vec![start], json!({})).unwrap();

    let result = machine.tick(FRAME);

    assert!(matches!(result, Err(MachineError::UnknownState { name }) if name == "Ghost"));
    assert_eq!(machine.current_state(), "Start");
}

#[test]
fn heartbeat_waits_one_tick_after_each_change() {
    let beats = Rc::new(RefCell::new(Vec::new()));
    let idle_beats = beats.clone();
    let active_beats = beats.clone();

    let idle = StateDef::builder("Idle")
        .on_heartbeat(move |_, _| {
            idle_beats.borrow_mut().push("Idle");
            Ok(())
        })
        .build();
    let active = StateDef::builder("Active")
        .on_heartbeat(move |_, delta| {
            assert!((delta - FRAME).abs() < f64::EPSILON);
            active_beats.borrow_mut().push("Active");
            Ok(())
        })
        .build();
    let machine = StateMachine::create("Idle", vec![idle, active], json!({})).unwrap();

    machine.tick(FRAME).unwrap();
    assert!(beats.borrow().is_empty());

    machine.tick(FRAME).unwrap();
    machine.tick(FRAME).unwrap();
    assert_eq!(*beats.borrow(), vec!["Idle", "Idle"]);

    machine.change_state("Active").unwrap();
    machine.tick(FRAME).unwrap();
    assert_eq!(beats.borrow().len(), 2);

    machine.tick(FRAME).unwrap();
    assert_eq!(*beats.borrow(), vec!["Idle", "Idle", "Active"]);
}

#[test]
fn heartbeat_is_held_when_a_transition_fires() {
    let beats = Rc::new(Cell::new(0));
    let counter = beats.clone();
    let start = StateDef::builder("Start")
        .transition(TransitionDef::builder("Next").when(count_at_least(1)).build())
        .build();
    let next = StateDef::builder("Next")
        .on_heartbeat(move |_, _| {
            counter.set(counter.get() + 1);
            Ok(())
        })
        .build();
    let machine = StateMachine::create("Start", vec![start, next], json!({})).unwrap();

    machine.tick(FRAME).unwrap();
    machine.change_data("count", 1);
    machine.tick(FRAME).unwrap();
    assert_eq!(machine.current_state(), "Next");
    assert_eq!(beats.get(), 0);

    machine.tick(FRAME).unwrap();
    assert_eq!(beats.get(), 1);
}

#[test]
fn idle_active_scenario() {
    let idle = StateDef::builder("Idle").build();
    let active = StateDef::builder("Active")
        .transition(TransitionDef::builder("Idle").when(count_at_least(3)).build())
        .build();
    let machine = StateMachine::create("Idle", vec![idle, active], json!({})).unwrap();
    let changes = record_state_changes(&machine);

    machine.change_state("Active").unwrap();
    machine.change_data("count", 3);
    machine.tick(FRAME).unwrap();

    assert_eq!(machine.current_state(), "Idle");
    assert_eq!(
        *changes.borrow(),
        vec![changed("Active", "Idle"), changed("Idle", "Active")]
    );
}

#[test]
fn change_requested_from_enter_hook_runs_after_the_current_change() {
    let log = new_log();
    let active = logged_state("Active", &log)
        .on_enter({
            let log = log.clone();
            move |machine| {
                push(&log, "Active.enter");
                machine.change_state("Done")?;
                push(&log, &format!("still {}", machine.current_state()));
                Ok(())
            }
        })
        .build();
    let machine = StateMachine::create(
        "Idle",
        vec![
            logged_state("Idle", &log).build(),
            active,
            logged_state("Done", &log).build(),
        ],
        json!({}),
    )
    .unwrap();
    let changes = record_state_changes(&machine);
    log.borrow_mut().clear();

    machine.change_state("Active").unwrap();

    assert_eq!(machine.current_state(), "Done");
    assert_eq!(machine.previous_state(), "Active");
    assert_eq!(
        *changes.borrow(),
        vec![changed("Active", "Idle"), changed("Done", "Active")]
    );
    assert_eq!(
        *log.borrow(),
        vec![
            "Idle.leave",
            "Active.enter",
            "still Idle",
            "Active.leave",
            "Done.enter"
        ]
    );
}

#[test]
fn listeners_may_change_state() {
    let machine = StateMachine::create(
        "A",
        vec![
            StateDef::builder("A").build(),
            StateDef::builder("B").build(),
            StateDef::builder("C").build(),
        ],
        json!({}),
    )
    .unwrap();
    let handle = machine.handle();
    machine.state_changed().connect(move |change| {
        if change.new_state == "B" {
            handle.change_state("C").unwrap();
        }
    });

    machine.change_state("B").unwrap();

    assert_eq!(machine.current_state(), "C");
    assert_eq!(machine.history().path(), vec!["A", "B", "C"]);
}

#[test]
fn deferred_enters_of_a_left_state_are_cancelled() {
    let log = new_log();
    let transition_log = log.clone();
    let passing = StateDef::builder("Passing")
        .on_enter(|machine| Ok(machine.change_state("End")?))
        .transition(
            TransitionDef::builder("End")
                .on_enter(move |_| {
                    push(&transition_log, "Passing.transition.enter");
                    Ok(())
                })
                .build(),
        )
        .build();
    let machine = StateMachine::create(
        "Start",
        vec![
            StateDef::builder("Start").build(),
            passing,
            StateDef::builder("End").build(),
        ],
        json!({}),
    )
    .unwrap();

    machine.change_state("Passing").unwrap();

    assert_eq!(machine.current_state(), "End");
    assert!(log.borrow().is_empty());
}

#[test]
fn failing_hooks_do_not_stop_the_machine() {
    let broken = StateDef::builder("Broken")
        .on_enter(|_| Err(HookError::failed("missing animation")))
        .build();
    let machine = StateMachine::create(
        "Idle",
        vec![StateDef::builder("Idle").build(), broken],
        json!({}),
    )
    .unwrap();

    machine.change_state("Broken").unwrap();

    assert_eq!(machine.current_state(), "Broken");
    assert_eq!(machine.previous_state(), "Idle");
}

#[test]
fn destroy_is_idempotent() {
    let log = new_log();
    let destroy_log = log.clone();
    let idle = logged_state("Idle", &log)
        .transition(
            TransitionDef::builder("Idle")
                .name("Loop")
                .on_destroy(move || {
                    push(&destroy_log, "Loop.destroy");
                    Ok(())
                })
                .build(),
        )
        .build();
    let machine = StateMachine::create("Idle", vec![idle], json!({})).unwrap();
    log.borrow_mut().clear();

    machine.destroy();
    machine.destroy();

    assert!(machine.is_destroyed());
    assert_eq!(*log.borrow(), vec!["Idle.leave", "Loop.destroy"]);
}

#[test]
fn destroyed_machine_ignores_everything() {
    let machine = StateMachine::create(
        "Idle",
        vec![StateDef::builder("Idle").build(), StateDef::builder("Active").build()],
        json!({}),
    )
    .unwrap();
    let changes = record_state_changes(&machine);

    machine.destroy();

    assert!(machine.state_changed().is_empty());
    assert_eq!(machine.change_state("Active"), Ok(()));
    assert_eq!(machine.change_state("Nowhere"), Ok(()));
    machine.change_data("count", 1);
    machine.tick(FRAME).unwrap();

    assert_eq!(machine.current_state(), "Idle");
    assert!(changes.borrow().is_empty());
    assert!(machine.data().get("count").is_none());
}

#[test]
fn destroy_from_enter_hook_cancels_pending_work() {
    let log = new_log();
    let transition_log = log.clone();
    let doomed = logged_state("Doomed", &log)
        .on_enter({
            let log = log.clone();
            move |machine| {
                push(&log, "Doomed.enter");
                if let Some(machine) = machine.machine() {
                    machine.destroy();
                }
                Ok(())
            }
        })
        .transition(
            TransitionDef::builder("Start")
                .on_enter(move |_| {
                    push(&transition_log, "Doomed.transition.enter");
                    Ok(())
                })
                .build(),
        )
        .build();
    let machine = StateMachine::create(
        "Start",
        vec![StateDef::builder("Start").build(), doomed],
        json!({}),
    )
    .unwrap();

    machine.change_state("Doomed").unwrap();

    assert!(machine.is_destroyed());
    assert_eq!(machine.pending_tasks(), 0);
    assert_eq!(*log.borrow(), vec!["Doomed.enter", "Doomed.leave"]);
}

#[test]
fn completion_falls_back_to_the_current_state() {
    let machine = StateMachine::create(
        "Reload",
        vec![StateDef::builder("Reload").build(), StateDef::builder("Ready").build()],
        json!({}),
    )
    .unwrap();
    let changes = record_state_changes(&machine);
    let handle = machine.handle();

    handle.complete("Missing").unwrap();
    assert_eq!(machine.current_state(), "Reload");
    assert!(changes.borrow().is_empty());

    handle.complete("Ready").unwrap();
    assert_eq!(machine.current_state(), "Ready");
}

#[test]
fn shared_definitions_bind_to_each_machine() {
    let counter = StateDef::builder("Counting")
        .on_heartbeat(|machine, _| {
            let count = machine.data().get("ticks").and_then(|v| v.as_i64()).unwrap_or(0);
            machine.change_data("ticks", count + 1);
            Ok(())
        })
        .build();

    let first = StateMachine::create("Counting", vec![counter.clone()], json!({})).unwrap();
    let second = StateMachine::create("Counting", vec![counter], json!({ "ticks": 10 })).unwrap();

    for _ in 0..3 {
        first.tick(FRAME).unwrap();
    }
    second.tick(FRAME).unwrap();
    second.tick(FRAME).unwrap();

    assert_eq!(first.data().get("ticks"), Some(json!(2)));
    assert_eq!(second.data().get("ticks"), Some(json!(11)));
}

#[test]
fn extended_states_share_base_behavior() {
    let entered = Rc::new(Cell::new(0));
    let counter = entered.clone();
    let base = StateDef::builder("Base")
        .on_enter(move |_| {
            counter.set(counter.get() + 1);
            Ok(())
        })
        .build();
    let walk = base.extend().name("Walk").build();
    let run = base.extend().name("Run").build();

    let machine = StateMachine::create("Walk", vec![walk, run], json!({})).unwrap();
    machine.change_state("Run").unwrap();

    assert_eq!(entered.get(), 2);
    assert_eq!(machine.state_names(), vec!["Walk", "Run"]);
}

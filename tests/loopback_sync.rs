//! Two stages over the in-process hub stay in agreement about each other.

use maze_sync::game::input::{InputFrame, InputSource, ScriptedInput};
use maze_sync::game::stage::LOCAL_CONTROLLER;
use maze_sync::network::{LoopbackHub, SyncPolicy};
use maze_sync::{SimConfig, Stage, Transport};

fn script(turns: &[(f32, f32)], ticks_each: usize) -> Box<dyn InputSource> {
    let frames = turns
        .iter()
        .flat_map(|&(x, y)| std::iter::repeat(InputFrame::with_movement(x, y)).take(ticks_each));
    Box::new(ScriptedInput::from_frames(frames))
}

fn run_pair(config: SimConfig) {
    let hub = LoopbackHub::new();
    let mut ta = hub.connect();
    let mut tb = hub.connect();
    let a_id = ta.local_id();
    let b_id = tb.local_id();
    let mut a = Stage::new(config.clone(), a_id).unwrap();
    let mut b = Stage::new(config, b_id).unwrap();

    a.attach_input(
        LOCAL_CONTROLLER,
        script(&[(1.0, 0.0), (0.0, 1.0), (1.0, 1.0), (-0.3, 1.0), (0.0, 0.0), (1.0, -0.2)], 40),
    )
    .unwrap();
    b.attach_input(LOCAL_CONTROLLER, script(&[(0.0, 1.0), (1.0, 0.5), (0.0, 0.0), (1.0, 0.0)], 50))
        .unwrap();

    a.tick(&mut ta);
    b.tick(&mut tb);

    for round in 2..=240 {
        a.tick(&mut ta);
        // a has seen b's state from the previous round
        if round > 2 {
            let seen = a.player(b_id).unwrap();
            let actual = b.local_player().unwrap();
            assert_eq!(seen.position(), actual.position(), "a's view of b, round {}", round);
            assert_eq!(seen.facing(), actual.facing());
        }

        b.tick(&mut tb);
        let seen = b.player(a_id).unwrap();
        let actual = a.local_player().unwrap();
        assert_eq!(seen.position(), actual.position(), "b's view of a, round {}", round);
        assert_eq!(seen.state.direction(), actual.state.direction());
        assert_eq!(seen.facing(), actual.facing());
    }
}

#[test]
fn test_full_state_sync_converges() {
    run_pair(SimConfig::default());
}

#[test]
fn test_changed_only_sync_converges() {
    run_pair(SimConfig {
        sync_policy: SyncPolicy::ChangedOnly,
        ..SimConfig::default()
    });
}

#[test]
fn test_changed_only_idle_sends_nothing() {
    let config = SimConfig {
        sync_policy: SyncPolicy::ChangedOnly,
        ..SimConfig::default()
    };
    let hub = LoopbackHub::new();
    let mut ta = hub.connect();
    let mut tb = hub.connect();
    let mut a = Stage::new(config.clone(), ta.local_id()).unwrap();
    let mut b = Stage::new(config, tb.local_id()).unwrap();

    a.tick(&mut ta);
    b.tick(&mut tb);
    assert_eq!(a.tick(&mut ta).sent, 1);
    assert_eq!(a.tick(&mut ta).sent, 0);

    let report = b.tick(&mut tb);
    assert_eq!(report.received, 1);
    assert!(b.player(ta.local_id()).unwrap().is_active());
}

//! Declarative registry behavior that holds without any runtime attached:
//! binding collection, error shapes, and the lifecycle predicates, driven
//! through the public API the way an application wires them up.

use magnetron::{ActionError, ActionKind, ActionSet, SessionCommand, SessionLifecycle};
use openxr as xr;
use xr::Path;

fn path(raw: u64) -> Path {
    Path::from_raw(raw)
}

#[test]
fn hand_registry_round_trip() {
    let left = path(1);
    let right = path(2);
    let index_profile = path(50);
    let touch_profile = path(51);

    let mut hands = ActionSet::new("hands", "Hands", 0);

    let hand_pose = hands.add_action("handpose", "Hand Pose", ActionKind::Pose, &[left, right]);
    hands.action_mut(hand_pose).add_global_binding(path(10));
    hands.action_mut(hand_pose).add_global_binding(path(11));

    let trigger = hands.add_action("trigger", "Trigger", ActionKind::Float, &[left, right]);
    hands.action_mut(trigger).add_global_binding(path(20));
    hands.action_mut(trigger).add_global_binding(path(21));
    hands
        .action_mut(trigger)
        .add_binding(index_profile, path(22));

    // Global bindings apply under every profile; profile-specific ones only
    // under their own.
    assert_eq!(
        hands.action(trigger).merged_bindings(index_profile),
        vec![path(20), path(21), path(22)]
    );
    assert_eq!(
        hands.action(trigger).merged_bindings(touch_profile),
        vec![path(20), path(21)]
    );
    assert_eq!(
        hands.action(hand_pose).merged_bindings(index_profile),
        vec![path(10), path(11)]
    );

    // Same registry, same answer, regardless of how often it is asked.
    for _ in 0..3 {
        assert_eq!(
            hands.action(trigger).merged_bindings(index_profile),
            vec![path(20), path(21), path(22)]
        );
    }

    // Declarative attributes survive as declared.
    assert_eq!(hands.action(hand_pose).kind(), ActionKind::Pose);
    assert_eq!(hands.action(hand_pose).subaction_paths(), &[left, right]);
    let names: Vec<_> = hands.actions().map(|a| a.name().to_owned()).collect();
    assert_eq!(names, ["handpose", "trigger"]);
}

#[test]
fn queries_before_init_fail_benignly() {
    let mut hands = ActionSet::new("hands", "Hands", 0);
    let grab = hands.add_action("grab", "Grab", ActionKind::Boolean, &[path(1)]);
    hands.action_mut(grab).add_global_binding(path(10));

    // Collecting suggestion entries needs the runtime handle that only
    // `init` creates; the failure names the action instead of panicking.
    match hands.action(grab).collect_bindings(Path::NULL) {
        Err(ActionError::NotInitialized(name)) => assert_eq!(name, "grab"),
        other => panic!("expected NotInitialized, got {:?}", other.err()),
    }

    assert!(hands.handle().is_none());
}

#[test]
fn lifecycle_predicates_follow_the_frame_protocol() {
    let mut lifecycle = SessionLifecycle::new();

    // Before any event lands, neither waiting nor rendering is allowed.
    assert!(!lifecycle.should_wait());
    assert!(!lifecycle.should_render());

    assert_eq!(
        lifecycle.transition(xr::SessionState::READY),
        Some(SessionCommand::Begin)
    );
    assert!(lifecycle.should_wait());
    assert!(!lifecycle.should_render());

    lifecycle.transition(xr::SessionState::SYNCHRONIZED);
    assert!(lifecycle.should_wait());
    assert!(!lifecycle.should_render());

    lifecycle.transition(xr::SessionState::VISIBLE);
    assert!(lifecycle.should_wait() && lifecycle.should_render());

    lifecycle.transition(xr::SessionState::FOCUSED);
    assert!(lifecycle.should_wait() && lifecycle.should_render());

    assert_eq!(
        lifecycle.transition(xr::SessionState::STOPPING),
        Some(SessionCommand::End)
    );
    assert!(!lifecycle.should_wait());
    assert!(!lifecycle.should_render());
}

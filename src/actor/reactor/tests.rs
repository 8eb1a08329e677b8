use pretty_assertions::assert_eq;
use test_log::test;

use super::*;
use crate::layout_engine::{Direction, FocusChange, Rect};
use crate::model::{OutputId, WindowId};

fn w(idx: u64) -> WindowId { WindowId::new(idx) }

fn output_added() -> Event {
    Event::Layout(LayoutEvent::OutputAdded {
        id: OutputId::new(1),
        name: "eDP-1".into(),
        rect: Rect::new(0, 0, 800, 600),
    })
}

fn mapped(idx: u64) -> Event {
    Event::Layout(LayoutEvent::WindowMapped {
        id: w(idx),
        requested_geometry: Rect::new(0, 0, 200, 100),
    })
}

fn reactor() -> Reactor {
    let mut reactor = Reactor::new(Config::default(), Record::disabled());
    let _ = reactor.handle_event(output_added());
    reactor
}

#[test]
fn errors_are_dropped_and_state_is_kept() {
    let mut reactor = reactor();
    let _ = reactor.handle_event(mapped(1));
    let before = reactor.layout().render_tree();

    assert_eq!(reactor.handle_event(mapped(1)), None);
    assert_eq!(
        reactor.handle_event(Event::Command(LayoutCommand::SwitchWorkspace("nope".into()))),
        None
    );
    assert_eq!(reactor.layout().render_tree(), before);

    let response = reactor.handle_event(mapped(2)).unwrap();
    assert_eq!(response.focus_changed, vec![FocusChange {
        workspace: "1".into(),
        window: Some(w(2)),
    }]);
}

#[test]
fn render_tree_is_published_after_each_commit() {
    let mut reactor = reactor();
    let mut rx = reactor.subscribe();
    assert!(!rx.has_changed().unwrap());

    let _ = reactor.handle_event(mapped(1));
    assert!(rx.has_changed().unwrap());
    let tree = rx.borrow_and_update().clone();
    assert_eq!(tree.windows().collect::<Vec<_>>(), vec![w(1)]);

    let _ = reactor.handle_event(Event::Command(LayoutCommand::NoOp));
    assert!(!rx.has_changed().unwrap());
}

#[test]
fn bindings_are_resolved_through_the_config() {
    let mut reactor = reactor();
    let _ = reactor.handle_event(mapped(1));
    let _ = reactor.handle_event(mapped(2));
    let response = reactor.handle_event(Event::Binding("mod4+shift+q".into())).unwrap();
    assert_eq!(response.close_requested, Some(w(2)));
    assert_eq!(reactor.layout().focused_window(), Some(w(1)));
}

#[test]
fn config_changes_apply_to_later_windows() {
    let mut reactor = reactor();
    let mut config = Config::default();
    config.settings.layout.default_orientation = crate::layout_engine::Orientation::Vertical;
    let _ = reactor.handle_event(Event::ConfigChanged(Box::new(config)));
    let _ = reactor.handle_event(mapped(1));
    let _ = reactor.handle_event(mapped(2));

    let tree = reactor.layout().render_tree();
    assert_eq!(tree.placement(w(1)).unwrap().rect, Rect::new(0, 0, 800, 300));
    assert_eq!(tree.placement(w(2)).unwrap().rect, Rect::new(0, 300, 800, 300));
}

#[test]
fn invalid_config_reload_keeps_the_old_config() {
    let mut reactor = reactor();
    let _ = reactor.handle_event(mapped(1));
    let _ = reactor.handle_event(mapped(2));
    let mut config = Config::default();
    config.settings.layout.min_ratio = f64::NAN;

    assert_eq!(reactor.handle_event(Event::ConfigChanged(Box::new(config))), None);
    assert_eq!(reactor.config(), &Config::default());
    assert_eq!(reactor.layout().layout_settings(), &Config::default().settings.layout);

    let response = reactor.handle_event(Event::Command(LayoutCommand::ResizeBy { amount: 0.1 }));
    assert!(response.is_some());
    reactor.layout().validate().unwrap();
}

#[test]
fn recorded_session_replays_to_the_same_layout() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.ron");

    let mut reactor = Reactor::new(Config::default(), Record::new(Some(&path)).unwrap());
    for event in [
        output_added(),
        mapped(1),
        mapped(2),
        mapped(3),
        Event::Command(LayoutCommand::MoveContainer(Direction::Left)),
        Event::Command(LayoutCommand::ToggleFloat),
        Event::Command(LayoutCommand::ResizeBy { amount: 0.1 }),
        Event::Binding("mod4+2".into()),
        mapped(4),
        Event::Command(LayoutCommand::SwitchWorkspace("1".into())),
        Event::Layout(LayoutEvent::WindowUnmapped { id: w(9) }),
    ] {
        let _ = reactor.handle_event(event);
    }
    let expected = reactor.layout().render_tree();
    drop(reactor);

    let mut seen = 0;
    let replayed = replay(&path, |_, _| seen += 1).unwrap();
    assert_eq!(seen, 11);
    assert_eq!(replayed.layout().render_tree(), expected);
}

#[test]
fn replay_rejects_an_empty_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.ron");
    std::fs::write(&path, "").unwrap();
    assert!(replay(&path, |_, _| {}).is_err());
}

#[test(tokio::test)]
async fn run_applies_events_in_order() {
    let reactor = reactor();
    let mut render = reactor.subscribe();
    let (responses_tx, mut responses) = actor::channel();
    let reactor = reactor.with_responses(responses_tx);
    let (tx, rx) = actor::channel();

    tx.send(mapped(1));
    tx.send(mapped(2));
    tx.send(Event::Command(LayoutCommand::FocusDirection(Direction::Left)));
    drop(tx);
    reactor.run(rx).await;

    let mut focused = vec![];
    while let Ok((_, response)) = responses.try_recv() {
        focused.extend(response.focus_changed.into_iter().map(|c| c.window));
    }
    assert_eq!(focused, vec![Some(w(1)), Some(w(2)), Some(w(1))]);

    let tree = render.borrow_and_update().clone();
    let focused: Vec<_> = tree.outputs[0].placements.iter().filter(|p| p.focused).collect();
    assert_eq!(focused.len(), 1);
    assert_eq!(focused[0].window, w(1));
}

#[test]
fn hand_written_scripts_may_hold_comments() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("script.ron");
    let config = ron::ser::to_string(&Config::default()).unwrap();
    let script = format!(
        "{config}\n// one output, one window\n{}\n\n{}\n",
        ron::ser::to_string(&output_added()).unwrap(),
        ron::ser::to_string(&mapped(7)).unwrap(),
    );
    std::fs::write(&path, script).unwrap();

    let replayed = replay(&path, |_, _| {}).unwrap();
    assert_eq!(replayed.layout().focused_window(), Some(w(7)));
}

//! Priority, time-slicing, suspense, and effect scheduling behavior.
//!
//! Run with: cargo test --test scheduling

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use weft::{
    host, props, suspense, text, AsyncValue, ComponentDef, Context, MemoryHost, ReconcileError,
    Root, SchedulerPriority, Setter, Transition, Value,
};

type SetterSlot<T> = Rc<RefCell<Option<Setter<T>>>>;

fn setter_slot<T>() -> SetterSlot<T> {
    Rc::new(RefCell::new(None))
}

/// `<div>{state}</div>` with a render counter and a published setter.
fn counted_text_component(
    slot: SetterSlot<String>,
    renders: Rc<Cell<u32>>,
    initial: &'static str,
) -> ComponentDef {
    ComponentDef::new(move |ctx, _| {
        renders.set(renders.get() + 1);
        let (value, setter) = ctx.use_state(|| initial.to_string())?;
        *slot.borrow_mut() = Some(setter);
        Ok(host("div", props! {}, vec![text(value.as_str())]))
    })
}

// =============================================================================
// Batching and priority replay
// =============================================================================

#[test]
fn test_sync_updates_batch_into_one_render() {
    let slot = setter_slot();
    let renders = Rc::new(Cell::new(0));
    let app = counted_text_component(slot.clone(), renders.clone(), "");

    let mut root = Root::new(MemoryHost::new());
    root.render(app.el(props! {}));
    root.flush().unwrap();
    assert_eq!(renders.get(), 1);

    let setter = slot.borrow().clone().unwrap();
    root.run_with_priority(SchedulerPriority::Immediate, || {
        setter.update(|s| format!("{s}x"));
        setter.update(|s| format!("{s}y"));
    });
    root.flush().unwrap();

    assert_eq!(root.host().text_content(), "xy");
    assert_eq!(renders.get(), 2, "both updates applied in one pass");
}

#[test]
fn test_low_priority_update_is_deferred_not_dropped() {
    let slot = setter_slot();
    let renders = Rc::new(Cell::new(0));
    let app = counted_text_component(slot.clone(), renders.clone(), "");

    let mut root = Root::new(MemoryHost::new());
    root.render(app.el(props! {}));
    root.flush().unwrap();

    let setter = slot.borrow().clone().unwrap();
    // Low-priority "a" submitted before high-priority "b".
    root.run_with_priority(SchedulerPriority::Normal, || {
        setter.update(|s| format!("{s}a"));
    });
    root.run_with_priority(SchedulerPriority::Immediate, || {
        setter.update(|s| format!("{s}b"));
    });

    let mut observed = Vec::new();
    while root.step().unwrap() {
        observed.push(root.host().text_content());
    }

    // The sync render skipped "a" and committed "b" alone; the deferred
    // render then replayed both in original submission order.
    assert!(observed.contains(&"b".to_string()), "{observed:?}");
    assert_eq!(root.host().text_content(), "ab");
}

// =============================================================================
// Time-sliced rendering
// =============================================================================

#[test]
fn test_sliced_render_resumes_without_restart() {
    let slot = setter_slot();
    let renders = Rc::new(Cell::new(0));
    let app = {
        let slot = slot.clone();
        let renders = renders.clone();
        ComponentDef::new(move |ctx, _| {
            renders.set(renders.get() + 1);
            let (value, setter) = ctx.use_state(|| "a".to_string())?;
            *slot.borrow_mut() = Some(setter);
            let items = (0..4)
                .map(|i| host("li", props! {}, vec![text(format!("{value}{i}"))]))
                .collect();
            Ok(host("ul", props! {}, items))
        })
    };

    let mut root = Root::new(MemoryHost::new());
    root.render(app.el(props! {}));
    root.flush().unwrap();
    assert_eq!(renders.get(), 1);
    assert_eq!(root.host().text_content(), "a0a1a2a3");

    // Two units of work per slice from here on.
    root.scheduler_mut().set_time_slice(Some(2));

    let setter = slot.borrow().clone().unwrap();
    root.run_with_priority(SchedulerPriority::Normal, || setter.set("z".into()));

    // First slice: begins but does not commit.
    assert!(root.step().unwrap());
    assert_eq!(root.host().text_content(), "a0a1a2a3", "no partial commit");
    assert_eq!(renders.get(), 2, "component begun once");

    // Remaining slices resume from the yielded unit; the component function
    // is not re-invoked for the same lane.
    root.flush().unwrap();
    assert_eq!(root.host().text_content(), "z0z1z2z3");
    assert_eq!(renders.get(), 2);
}

#[test]
fn test_high_priority_preempts_sliced_render() {
    let slot = setter_slot();
    let renders = Rc::new(Cell::new(0));
    let app = counted_text_component(slot.clone(), renders.clone(), "");

    let mut root = Root::new(MemoryHost::new());
    root.render(app.el(props! {}));
    root.flush().unwrap();

    root.scheduler_mut().set_time_slice(Some(3));
    let setter = slot.borrow().clone().unwrap();

    root.run_with_priority(SchedulerPriority::Normal, || {
        setter.update(|s| format!("{s}low"));
    });
    // Partially render the low-priority pass.
    assert!(root.step().unwrap());
    assert_eq!(root.host().text_content(), "");

    // Preempt: the partial pass is discarded, the sync pass commits alone,
    // then the low lane replays from scratch with both updates in order.
    root.run_with_priority(SchedulerPriority::Immediate, || {
        setter.update(|s| format!("{s}high"));
    });

    let mut observed = Vec::new();
    while root.step().unwrap() {
        observed.push(root.host().text_content());
    }
    assert!(observed.contains(&"high".to_string()), "{observed:?}");
    assert_eq!(root.host().text_content(), "lowhigh");
}

// =============================================================================
// Transitions
// =============================================================================

#[test]
fn test_transition_defers_and_clears_pending() {
    let transition_slot: Rc<RefCell<Option<Transition>>> = Rc::new(RefCell::new(None));
    let label_slot = setter_slot();
    let app = {
        let transition_slot = transition_slot.clone();
        let label_slot = label_slot.clone();
        ComponentDef::new(move |ctx, _| {
            let (is_pending, transition) = ctx.use_transition()?;
            let (label, set_label) = ctx.use_state(|| "idle".to_string())?;
            *transition_slot.borrow_mut() = Some(transition);
            *label_slot.borrow_mut() = Some(set_label);
            let shown = if is_pending { "pending".to_string() } else { label.to_string() };
            Ok(host("div", props! {}, vec![text(shown)]))
        })
    };

    let mut root = Root::new(MemoryHost::new());
    root.render(app.el(props! {}));
    root.flush().unwrap();
    assert_eq!(root.host().text_content(), "idle");

    let transition = transition_slot.borrow().clone().unwrap();
    let set_label = label_slot.borrow().clone().unwrap();
    root.run_with_priority(SchedulerPriority::Immediate, || {
        transition.start(|| set_label.set("done".into()));
    });

    let mut observed = Vec::new();
    while root.step().unwrap() {
        observed.push(root.host().text_content());
    }

    // The urgent pass showed the pending state; the transition pass landed
    // the final content.
    assert!(observed.contains(&"pending".to_string()), "{observed:?}");
    assert_eq!(root.host().text_content(), "done");
}

// =============================================================================
// Suspense
// =============================================================================

#[test]
fn test_suspense_shows_fallback_then_content() {
    let source: AsyncValue<String> = AsyncValue::pending();
    let reader = {
        let source = source.clone();
        ComponentDef::new(move |ctx, _| {
            let value = ctx.use_async(&source)?;
            Ok(host("p", props! {}, vec![text(value.as_str())]))
        })
    };

    let mut root = Root::new(MemoryHost::new());
    root.render(suspense(vec![reader.el(props! {})], vec![text("loading")]));
    root.flush().unwrap();

    // Only the fallback's host nodes committed.
    assert_eq!(root.host().text_content(), "loading");

    source.resolve("data".to_string());
    root.flush().unwrap();

    let content = root.host().text_content();
    assert_eq!(content, "data");
    assert!(!content.contains("loading"));
}

#[test]
fn test_ready_async_value_never_suspends() {
    let source = AsyncValue::ready("instant".to_string());
    let reader = {
        let source = source.clone();
        ComponentDef::new(move |ctx, _| {
            let value = ctx.use_async(&source)?;
            Ok(text(value.as_str()))
        })
    };

    let mut root = Root::new(MemoryHost::new());
    root.render(suspense(vec![reader.el(props! {})], vec![text("loading")]));
    root.flush().unwrap();
    assert_eq!(root.host().text_content(), "instant");
}

#[test]
fn test_unboundaried_suspension_is_fatal_then_recoverable() {
    let source: AsyncValue<i64> = AsyncValue::pending();
    let reader = {
        let source = source.clone();
        ComponentDef::new(move |ctx, _| {
            let value = ctx.use_async(&source)?;
            Ok(text(value.to_string()))
        })
    };

    let mut root = Root::new(MemoryHost::new());
    root.render(reader.el(props! {}));
    let err = root.flush().unwrap_err();
    assert!(matches!(err, ReconcileError::UnhandledSuspension), "{err}");

    // The lane stays pending; once the value exists the retry succeeds.
    source.resolve(7);
    root.flush().unwrap();
    assert_eq!(root.host().text_content(), "7");
}

// =============================================================================
// Context
// =============================================================================

#[test]
fn test_provider_values_nest_and_restore() {
    let theme: Context<i64> = Context::new();
    let reader = ComponentDef::new(move |ctx, _| {
        let value = ctx.use_context(&theme).map(|v| *v).unwrap_or(-1);
        Ok(host("span", props! {}, vec![text(value.to_string())]))
    });

    let mut root = Root::new(MemoryHost::new());
    root.render(host(
        "div",
        props! {},
        vec![
            reader.el(props! {}), // outside any provider
            theme.provide(
                1,
                vec![
                    reader.el(props! {}),
                    theme.provide(2, vec![reader.el(props! {})]),
                    reader.el(props! {}), // back to the outer value
                ],
            ),
        ],
    ));
    root.flush().unwrap();

    assert_eq!(root.host().text_content(), "-1121");
}

// =============================================================================
// Effects
// =============================================================================

#[test]
fn test_all_teardowns_run_before_any_setup() {
    let log: Rc<RefCell<Vec<&'static str>>> = Rc::new(RefCell::new(Vec::new()));
    let trigger = setter_slot();

    let child = {
        let log = log.clone();
        ComponentDef::new(move |ctx, _| {
            let log = log.clone();
            ctx.use_effect(None, move || {
                log.borrow_mut().push("setup child");
                let log = log.clone();
                Some(Box::new(move || log.borrow_mut().push("teardown child")))
            })?;
            Ok(text("child"))
        })
    };
    let parent = {
        let log = log.clone();
        let trigger = trigger.clone();
        let child = child.clone();
        ComponentDef::new(move |ctx, _| {
            let (_, setter) = ctx.use_state(|| 0i64)?;
            *trigger.borrow_mut() = Some(setter);
            let log = log.clone();
            ctx.use_effect(None, move || {
                log.borrow_mut().push("setup parent");
                let log = log.clone();
                Some(Box::new(move || log.borrow_mut().push("teardown parent")))
            })?;
            Ok(host("div", props! {}, vec![child.el(props! {})]))
        })
    };

    let mut root = Root::new(MemoryHost::new());
    root.render(parent.el(props! {}));
    root.flush().unwrap();
    assert_eq!(*log.borrow(), ["setup child", "setup parent"]);
    log.borrow_mut().clear();

    let setter = trigger.borrow().clone().unwrap();
    root.run_with_priority(SchedulerPriority::Immediate, || setter.set(1));
    root.flush().unwrap();

    let entries = log.borrow().clone();
    let last_teardown = entries
        .iter()
        .rposition(|e| e.starts_with("teardown"))
        .unwrap();
    let first_setup = entries.iter().position(|e| e.starts_with("setup")).unwrap();
    assert!(
        last_teardown < first_setup,
        "teardowns must finish before any setup: {entries:?}"
    );
}

#[test]
fn test_effect_skipped_when_deps_unchanged() {
    let runs = Rc::new(Cell::new(0u32));
    let unrelated = setter_slot();

    let app = {
        let runs = runs.clone();
        let unrelated = unrelated.clone();
        ComponentDef::new(move |ctx, _| {
            let (_, setter) = ctx.use_state(|| 0i64)?;
            *unrelated.borrow_mut() = Some(setter);
            let runs = runs.clone();
            ctx.use_effect(Some(vec![Value::from("stable")]), move || {
                runs.set(runs.get() + 1);
                None
            })?;
            Ok(text("x"))
        })
    };

    let mut root = Root::new(MemoryHost::new());
    root.render(app.el(props! {}));
    root.flush().unwrap();
    assert_eq!(runs.get(), 1);

    let setter = unrelated.borrow().clone().unwrap();
    root.run_with_priority(SchedulerPriority::Immediate, || setter.set(1));
    root.flush().unwrap();
    assert_eq!(runs.get(), 1, "unchanged deps must not re-run the effect");
}

#[test]
fn test_unmount_runs_cleanup() {
    let log: Rc<RefCell<Vec<&'static str>>> = Rc::new(RefCell::new(Vec::new()));
    let toggle = setter_slot();

    let child = {
        let log = log.clone();
        ComponentDef::new(move |ctx, _| {
            let log = log.clone();
            ctx.use_effect(Some(vec![]), move || {
                log.borrow_mut().push("mounted");
                let log = log.clone();
                Some(Box::new(move || log.borrow_mut().push("cleanup")))
            })?;
            Ok(text("child"))
        })
    };
    let parent = {
        let toggle = toggle.clone();
        let child = child.clone();
        ComponentDef::new(move |ctx, _| {
            let (show, setter) = ctx.use_state(|| true)?;
            *toggle.borrow_mut() = Some(setter);
            let children = if *show {
                vec![child.el(props! {})]
            } else {
                vec![]
            };
            Ok(host("div", props! {}, children))
        })
    };

    let mut root = Root::new(MemoryHost::new());
    root.render(parent.el(props! {}));
    root.flush().unwrap();
    assert_eq!(*log.borrow(), ["mounted"]);

    let setter = toggle.borrow().clone().unwrap();
    root.run_with_priority(SchedulerPriority::Immediate, || setter.set(false));
    root.flush().unwrap();

    assert_eq!(*log.borrow(), ["mounted", "cleanup"]);
    assert_eq!(root.host().text_content(), "");
}

use super::*;
use crate::context::ContextKey;
use crate::deps;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

fn counting_context() -> (RenderContext, Rc<Cell<usize>>) {
    let changes = Rc::new(Cell::new(0));
    let counter = Rc::clone(&changes);
    let context = RenderContext::new(move || counter.set(counter.get() + 1));
    (context, changes)
}

#[test]
fn init_state_does_not_fire_on_change() {
    let (context, changes) = counting_context();
    context
        .render_scope(|ctx| {
            let index = ctx.next_hook_index()?;
            ctx.init_state(index, 7i32)?;
            assert_eq!(ctx.get_state::<i32>(index)?, 7);
            Ok(())
        })
        .expect("render");
    assert_eq!(changes.get(), 0);
    assert!(!context.is_dirty());
}

#[test]
fn set_state_fires_once_per_call_even_when_equal() {
    let (context, changes) = counting_context();
    context
        .render_scope(|ctx| {
            let index = ctx.next_hook_index()?;
            ctx.init_state(index, 1i32)
        })
        .expect("render");

    context.set_state(0, 1i32).expect("set");
    context.set_state(0, 1i32).expect("set");
    assert_eq!(changes.get(), 2);
    assert!(context.is_dirty());
    assert_eq!(context.get_state::<i32>(0).expect("get"), 1);
}

#[test]
fn state_access_before_init_is_an_error() {
    let (context, _) = counting_context();
    assert_eq!(
        context.set_state(0, 5i32),
        Err(RenderError::StateUninitialized { index: 0 })
    );
    assert_eq!(
        context.get_state::<i32>(0),
        Err(RenderError::StateUninitialized { index: 0 })
    );
}

#[test]
fn init_state_twice_is_an_error() {
    let (context, _) = counting_context();
    let err = context
        .render_scope(|ctx| {
            let index = ctx.next_hook_index()?;
            ctx.init_state(index, 1i32)?;
            ctx.init_state(index, 2i32)
        })
        .unwrap_err();
    assert_eq!(err, RenderError::StateAlreadyInitialized { index: 0 });
}

#[test]
fn set_state_with_another_type_is_rejected() {
    let (context, changes) = counting_context();
    context
        .render_scope(|ctx| {
            let index = ctx.next_hook_index()?;
            ctx.init_state(index, 1i32)
        })
        .expect("render");
    let err = context.set_state(0, "text").unwrap_err();
    assert!(matches!(err, RenderError::StateTypeMismatch { index: 0, .. }));
    assert_eq!(changes.get(), 0);
}

#[test]
fn hooks_outside_a_scope_fail() {
    let (context, _) = counting_context();
    assert_eq!(context.next_hook_index(), Err(RenderError::NoActiveRender));
    assert_eq!(
        context.use_state(|| 0i32).map(|(value, _)| value),
        Err(RenderError::NoActiveRender)
    );
}

#[test]
fn fewer_hooks_than_previous_render_fail_at_close() {
    let (context, _) = counting_context();
    context
        .render_scope(|ctx| {
            ctx.use_state(|| 0i32)?;
            ctx.use_state(|| 0i32)?;
            Ok(())
        })
        .expect("first render");

    let err = context
        .render_scope(|ctx| {
            ctx.use_state(|| 0i32)?;
            Ok(())
        })
        .unwrap_err();
    assert_eq!(
        err,
        RenderError::HookCountMismatch {
            expected: 2,
            actual: 1
        }
    );
}

#[test]
fn extra_hooks_fail_before_touching_a_new_slot() {
    let (context, _) = counting_context();
    context
        .render_scope(|ctx| {
            ctx.use_state(|| 0i32)?;
            Ok(())
        })
        .expect("first render");

    let err = context
        .render_scope(|ctx| {
            ctx.use_state(|| 0i32)?;
            ctx.use_ref(|| 0i32)?;
            Ok(())
        })
        .unwrap_err();
    assert_eq!(
        err,
        RenderError::HookCountMismatch {
            expected: 1,
            actual: 2
        }
    );
    // The failed render left the context usable with its original arity.
    context
        .render_scope(|ctx| {
            let (value, _) = ctx.use_state(|| 9i32)?;
            assert_eq!(value, 0);
            Ok(())
        })
        .expect("recovered render");
}

#[test]
fn reordered_hooks_report_kind_mismatch() {
    let (context, _) = counting_context();
    context
        .render_scope(|ctx| {
            ctx.use_state(|| 0i32)?;
            ctx.use_ref(|| 0i32)?;
            Ok(())
        })
        .expect("first render");

    let err = context
        .render_scope(|ctx| {
            ctx.use_ref(|| 0i32)?;
            ctx.use_state(|| 0i32)?;
            Ok(())
        })
        .unwrap_err();
    assert_eq!(
        err,
        RenderError::HookKindMismatch {
            index: 0,
            expected: HookKind::Ref,
            found: HookKind::State,
        }
    );
}

#[test]
fn child_contexts_are_stable_for_a_key() {
    let (context, _) = counting_context();
    let first = context
        .render_scope(|ctx| ctx.child_context(ContextKey::Index(3)))
        .expect("render");
    let second = context
        .render_scope(|ctx| ctx.child_context(ContextKey::Index(3)))
        .expect("render");
    assert_eq!(first, second);
    assert_eq!(context.child_count(), 1);
}

#[test]
fn visiting_a_key_twice_in_one_scope_is_an_error() {
    let (context, _) = counting_context();
    let err = context
        .render_scope(|ctx| {
            ctx.child_context(ContextKey::Named(Rc::from("a")))?;
            ctx.child_context(ContextKey::Named(Rc::from("a")))?;
            Ok(())
        })
        .unwrap_err();
    assert!(matches!(err, RenderError::DuplicateKey { .. }));
}

#[test]
fn unvisited_children_are_unmounted_on_close() {
    let (context, _) = counting_context();
    let log = Rc::new(RefCell::new(Vec::new()));
    let child = context
        .render_scope(|ctx| ctx.child_context(ContextKey::Index(0)))
        .expect("render");
    {
        let log = Rc::clone(&log);
        child
            .render_scope(move |ctx| {
                ctx.use_effect(
                    move |scope| Ok(scope.on_cleanup(move || log.borrow_mut().push("cleanup"))),
                    Some(deps![]),
                )
            })
            .expect("child render");
    }
    child.commit_pending_effects().expect("commit");

    context.render_scope(|_| Ok(())).expect("render without child");
    assert!(child.is_unmounted());
    assert_eq!(context.child_count(), 0);
    assert_eq!(*log.borrow(), vec!["cleanup"]);
}

#[test]
fn unmount_runs_children_first_and_only_once() {
    let (parent, _) = counting_context();
    let log: Rc<RefCell<Vec<&'static str>>> = Rc::new(RefCell::new(Vec::new()));
    let register = |context: &RenderContext, name: &'static str| {
        let log = Rc::clone(&log);
        context
            .render_scope(move |ctx| {
                ctx.use_effect(
                    move |scope| Ok(scope.on_cleanup(move || log.borrow_mut().push(name))),
                    None,
                )
            })
            .expect("render");
        context.commit_pending_effects().expect("commit");
    };

    let child = {
        let log = Rc::clone(&log);
        parent
            .render_scope(move |ctx| {
                let child = ctx.child_context(ContextKey::Index(0))?;
                ctx.use_effect(
                    move |scope| Ok(scope.on_cleanup(move || log.borrow_mut().push("parent"))),
                    None,
                )?;
                Ok(child)
            })
            .expect("render")
    };
    parent.commit_pending_effects().expect("commit");
    register(&child, "child");

    parent.unmount();
    parent.unmount();
    assert_eq!(*log.borrow(), vec!["child", "parent"]);
    assert!(child.is_unmounted());
    assert_eq!(parent.get_state::<i32>(0), Err(RenderError::Unmounted));
    assert_eq!(
        parent.render_scope(|_| Ok(())),
        Err(RenderError::Unmounted)
    );
}

#[test]
fn child_state_change_flags_ancestors() {
    let (root, changes) = counting_context();
    let child = root
        .render_scope(|ctx| ctx.child_context(ContextKey::Index(0)))
        .expect("render");
    let (_, set) = child
        .render_scope(|ctx| ctx.use_state(|| 0i32))
        .expect("child render");

    set.set(1).expect("set");
    assert_eq!(changes.get(), 1);
    assert!(child.is_dirty());
    assert!(!root.is_dirty());
    assert!(root.has_dirty_descendant());
}

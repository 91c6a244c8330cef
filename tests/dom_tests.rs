mod common;

use common::{FailOn, ORDER, Recorder, TestResult, Trace, init_logger, trace};
use std::sync::Arc;
use std::thread;
use weft::{
    DeliveryError, FilterBuilder, FilterCache, FilterSettings, FnVisitor, QName, TerminateVisitor,
    VisitPhase, WeftError,
};

#[test]
fn assembly_pass_runs_before_processing() -> TestResult {
    init_logger();
    let filter = FilterBuilder::new()
        .bind(
            "order-item",
            FnVisitor::new("assemble")
                .in_phase(VisitPhase::Assembly)
                .on_before(|element, ctx| {
                    let id = ctx.document().attribute(element, None, "id").unwrap_or("?").to_string();
                    ctx.document_mut().set_attribute(element, QName::new("status"), "checked");
                    ctx.get_or_default::<Trace>().0.push(format!("asm:{id}"));
                    Ok(())
                }),
        )?
        .bind(
            "order-item",
            FnVisitor::new("process").on_before(|element, ctx| {
                let status = ctx
                    .document()
                    .attribute(element, None, "status")
                    .unwrap_or("missing")
                    .to_string();
                ctx.get_or_default::<Trace>().0.push(format!("proc:{status}"));
                Ok(())
            }),
        )?
        .build()?;

    let mut ctx = filter.new_context("order.xml");
    filter.filter_dom_str(ORDER, &mut ctx)?;
    assert_eq!(
        trace(&ctx),
        ["asm:1", "asm:2", "asm:3", "proc:checked", "proc:checked", "proc:checked"]
    );
    Ok(())
}

#[test]
fn dom_mode_sees_whole_subtrees() -> TestResult {
    let filter = FilterBuilder::new()
        .bind(
            "order-item",
            FnVisitor::new("deep").on_after(|element, ctx| {
                let text = ctx.document().text_content(element);
                ctx.get_or_default::<Trace>().0.push(text);
                Ok(())
            }),
        )?
        .build()?;
    let mut ctx = filter.new_context("order.xml");
    filter.filter_dom_str(ORDER, &mut ctx)?;
    assert_eq!(trace(&ctx), ["bolt3", "nut7", "washer1"]);
    Ok(())
}

#[test]
fn dom_failures_carry_the_full_location() {
    let filter = FilterBuilder::new()
        .bind("order-item", FailOn { id: "2".into() })
        .unwrap()
        .build()
        .unwrap();
    let mut ctx = filter.new_context("order.xml");
    let err = filter.filter_dom_str(ORDER, &mut ctx).unwrap_err();
    match err {
        WeftError::Delivery(DeliveryError::Visitor { location, .. }) => {
            assert_eq!(location, "/order/order-items/order-item[2]");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(trace(&ctx), ["ok:1"]);
}

#[test]
fn terminate_ends_both_passes() -> TestResult {
    let filter = FilterBuilder::new()
        .bind("header", TerminateVisitor::after())?
        .bind("order-item", Recorder::before_only("late"))?
        .build()?;
    let mut ctx = filter.new_context("order.xml");
    filter.filter_dom_str(ORDER, &mut ctx)?;
    assert!(ctx.is_terminated());
    assert!(trace(&ctx).is_empty());
    Ok(())
}

#[test]
fn positions_are_recounted_in_each_pass() -> TestResult {
    let filter = FilterBuilder::new()
        .bind(
            "order-items/order-item[3]",
            Recorder::before_only("third"),
        )?
        .bind(
            "order-items/order-item[3]",
            FnVisitor::new("assemble-third")
                .in_phase(VisitPhase::Assembly)
                .on_before(|_, ctx| {
                    ctx.get_or_default::<Trace>().0.push("asm".into());
                    Ok(())
                }),
        )?
        .build()?;
    let mut ctx = filter.new_context("order.xml");
    filter.filter_dom_str(ORDER, &mut ctx)?;
    assert_eq!(trace(&ctx), ["asm", "third:before:order-item"]);
    Ok(())
}

#[test]
fn cached_filters_are_shared_across_threads() -> TestResult {
    let cache = FilterCache::new(4);
    let build = || {
        FilterBuilder::new()
            .with_settings(FilterSettings::default())
            .bind("order-item", Recorder::before_only("item"))?
            .build()
    };
    let filter = cache.get_or_build("orders", build)?;
    assert!(Arc::ptr_eq(&filter, &cache.get_or_build("orders", build)?));

    let counts: Vec<usize> = thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let filter = filter.clone();
                scope.spawn(move || {
                    let mut ctx = filter.new_context(format!("order-{i}.xml"));
                    filter.filter_str(ORDER, &mut ctx).map(|()| trace(&ctx).len())
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("worker panicked"))
            .collect::<Result<_, _>>()
    })?;
    assert_eq!(counts, [3, 3, 3, 3]);
    Ok(())
}

#[test]
fn dom_mode_honours_entity_rewriting() -> TestResult {
    let filter = FilterBuilder::new()
        .with_settings(FilterSettings::default().with_rewrite_entities(false))
        .bind(
            "a",
            FnVisitor::new("text").on_after(|element, ctx| {
                let text = ctx.document().text(element);
                ctx.get_or_default::<Trace>().0.push(text);
                Ok(())
            }),
        )?
        .build()?;
    let mut ctx = filter.new_context("a.xml");
    filter.filter_dom_str("<a>1 &lt; 2</a>", &mut ctx)?;
    assert_eq!(trace(&ctx), ["1 &#60; 2"]);
    Ok(())
}

#[test]
fn roxmltree_trees_can_be_filtered() -> TestResult {
    let tree = roxmltree::Document::parse(ORDER)?;
    let filter = FilterBuilder::new()
        .bind("order-item[@id='3']", Recorder::before_only("third"))?
        .build()?;
    let mut ctx = filter.new_context("tree");
    filter.filter_tree(&tree, &mut ctx)?;
    assert_eq!(trace(&ctx), ["third:before:order-item"]);
    Ok(())
}

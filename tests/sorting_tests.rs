mod common;

use common::{TestResult, Trace, run, trace};
use weft::{DeliveryError, FilterBuilder, FilterSettings, FnVisitor, WeftError};

fn step(name: &'static str) -> FnVisitor {
    FnVisitor::new(name)
        .on_before(move |_, ctx| {
            ctx.get_or_default::<Trace>().0.push(format!("{name}:before"));
            Ok(())
        })
        .on_after(move |_, ctx| {
            ctx.get_or_default::<Trace>().0.push(format!("{name}:after"));
            Ok(())
        })
}

#[test]
fn producers_run_before_their_consumers() -> TestResult {
    let filter = FilterBuilder::new()
        .bind("a", step("report").consuming("totals"))?
        .bind("a", step("unrelated"))?
        .bind("a", step("totals").producing("totals"))?
        .build()?;
    let ctx = run(&filter, "<a/>")?;
    assert_eq!(
        trace(&ctx)[..3],
        ["unrelated:before", "totals:before", "report:before"]
    );
    Ok(())
}

#[test]
fn unsorted_buckets_keep_registration_order() -> TestResult {
    let filter = FilterBuilder::new()
        .with_settings(FilterSettings::default().with_sort_visitors(false))
        .bind("a", step("report").consuming("totals"))?
        .bind("a", step("totals").producing("totals"))?
        .build()?;
    let ctx = run(&filter, "<a/>")?;
    assert_eq!(trace(&ctx)[..2], ["report:before", "totals:before"]);
    Ok(())
}

#[test]
fn circular_dependencies_are_rejected() {
    let result = FilterBuilder::new()
        .bind("a", step("x").producing("x-out").consuming("y-out"))
        .and_then(|b| b.bind("a", step("y").producing("y-out").consuming("x-out")))
        .and_then(|b| b.build());
    match result {
        Err(WeftError::Delivery(DeliveryError::Configuration(message))) => {
            assert!(message.contains("circular"));
        }
        other => panic!("expected a configuration error, got {other:?}"),
    }
}

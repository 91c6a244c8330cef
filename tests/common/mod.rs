#![allow(dead_code)]

use weft::{
    Capabilities, ExecutionContext, Filter, FilterBuilder, FilterSettings, NodeId, VisitError,
    VisitResult, Visitor,
};

pub type TestResult = Result<(), Box<dyn std::error::Error>>;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Per-run trace of visitor callbacks, kept in the execution context.
#[derive(Debug, Default)]
pub struct Trace(pub Vec<String>);

pub fn trace(ctx: &ExecutionContext) -> Vec<String> {
    ctx.get::<Trace>().map(|t| t.0.clone()).unwrap_or_default()
}

fn local_name(ctx: &ExecutionContext, node: NodeId) -> String {
    ctx.document()
        .name(node)
        .map(|n| n.local_name.clone())
        .unwrap_or_else(|| "?".to_string())
}

fn record(ctx: &mut ExecutionContext, entry: String) {
    ctx.get_or_default::<Trace>().0.push(entry);
}

/// Records `name:before:element` and `name:after:element`.
#[derive(Debug, Clone)]
pub struct Recorder {
    pub name: String,
    pub capabilities: Capabilities,
}

impl Recorder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            capabilities: Capabilities::BEFORE | Capabilities::AFTER,
        }
    }

    pub fn before_only(name: &str) -> Self {
        Self {
            name: name.to_string(),
            capabilities: Capabilities::BEFORE,
        }
    }
}

impl Visitor for Recorder {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn visit_before(&self, element: NodeId, ctx: &mut ExecutionContext) -> VisitResult {
        let entry = format!("{}:before:{}", self.name, local_name(ctx, element));
        record(ctx, entry);
        Ok(())
    }

    fn visit_after(&self, element: NodeId, ctx: &mut ExecutionContext) -> VisitResult {
        let entry = format!("{}:after:{}", self.name, local_name(ctx, element));
        record(ctx, entry);
        Ok(())
    }
}

/// Fails in `visit_before` for elements whose `id` attribute equals `id`,
/// and records every other element it sees.
#[derive(Debug)]
pub struct FailOn {
    pub id: String,
}

impl Visitor for FailOn {
    fn name(&self) -> &str {
        "FailOn"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::BEFORE
    }

    fn visit_before(&self, element: NodeId, ctx: &mut ExecutionContext) -> VisitResult {
        let id = ctx
            .document()
            .attribute(element, None, "id")
            .unwrap_or_default()
            .to_string();
        if id == self.id {
            return Err(VisitError::failed(format!("cannot handle item {id}")));
        }
        record(ctx, format!("ok:{id}"));
        Ok(())
    }
}

/// Streams `xml` through a filter with one binding and returns the context.
pub fn stream_one(
    selector: &str,
    visitor: impl Visitor + 'static,
    settings: FilterSettings,
    xml: &str,
) -> Result<ExecutionContext, weft::WeftError> {
    let filter = FilterBuilder::new()
        .with_settings(settings)
        .bind(selector, visitor)?
        .build()?;
    run(&filter, xml)
}

pub fn run(filter: &Filter, xml: &str) -> Result<ExecutionContext, weft::WeftError> {
    let mut ctx = filter.new_context("test.xml");
    filter.filter_str(xml, &mut ctx)?;
    Ok(ctx)
}

pub const ORDER: &str = r#"<order>
  <header><customer>Acme</customer></header>
  <order-items>
    <order-item id="1"><product>bolt</product><quantity>3</quantity></order-item>
    <order-item id="2"><product>nut</product><quantity>7</quantity></order-item>
    <order-item id="3"><product>washer</product><quantity>1</quantity></order-item>
  </order-items>
  <summary total="11"/>
</order>"#;

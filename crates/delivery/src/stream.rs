//! Single-pass dispatch over a stream of document events.
use crate::context::ExecutionContext;
use crate::dispatch::{Flow, Interrupt, close_element, dispatch, targets};
use crate::dom::NodeKind;
use crate::error::DeliveryError;
use crate::event::ExecutionEvent;
use crate::index::{ElementBindings, VisitorBindingIndex};
use crate::interceptor::VisitCall;
use crate::settings::FilterSettings;
use crate::text::{TextType, encode_character_references};
use std::sync::Arc;
use weft_types::{Attribute, NodeId, QName, StreamEventHandler};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    AwaitingDocument,
    InElement,
    Terminated,
}

/// One open element.
#[derive(Debug)]
struct Frame {
    /// `None` for elements nobody targets when the element stack is not maintained.
    node: Option<NodeId>,
    bindings: Option<Arc<ElementBindings>>,
    depth: usize,
    /// Deepest level that has to stay materialized while this element is open.
    retain: usize,
    text_type: TextType,
}

/// Drives visitors from stream events, materializing only what the bound
/// visitors need and pruning the rest behind the cursor.
///
/// For each element: the parent's child-element visitors, then the
/// element's before-visitors, then its content, then after-visitors
/// (reversed by default) and post-fragment cleanup.
pub struct StreamingDispatcher<'c> {
    index: &'c VisitorBindingIndex,
    ctx: &'c mut ExecutionContext,
    settings: FilterSettings,
    frames: Vec<Frame>,
    state: DispatchState,
    cdata: String,
}

impl<'c> StreamingDispatcher<'c> {
    pub fn new(index: &'c VisitorBindingIndex, ctx: &'c mut ExecutionContext) -> Self {
        let settings = ctx.settings().clone();
        Self {
            index,
            ctx,
            settings,
            frames: Vec::new(),
            state: DispatchState::AwaitingDocument,
            cdata: String::new(),
        }
    }

    pub fn state(&self) -> DispatchState {
        self.state
    }

    /// Number of open elements.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    fn retained_depth(&self) -> usize {
        self.frames
            .iter()
            .map(|f| f.retain)
            .fold(self.settings.retained_depth(), usize::max)
    }

    fn materialized_parent(&self) -> Option<NodeId> {
        self.frames.iter().rev().find_map(|f| f.node)
    }

    fn open(&mut self, name: &QName, attributes: &[Attribute]) -> Flow {
        let is_root = self.frames.is_empty();
        let bindings = if is_root {
            self.index.lookup_root(&name.local_name)
        } else {
            self.index.lookup(&name.local_name)
        }
        .cloned();
        let depth = self.frames.len() + 1;

        if bindings.is_none() && !self.settings.maintain_element_stack {
            self.frames.push(Frame {
                node: None,
                bindings: None,
                depth,
                retain: 0,
                text_type: TextType::Text,
            });
            if self.ctx.has_listeners() {
                self.ctx.fire(ExecutionEvent::StartFragment {
                    node: None,
                    name: name.to_string(),
                });
            }
            return Ok(());
        }

        let parent = self.materialized_parent();
        let document = self.ctx.document_mut();
        let node = document.create_element(name.clone(), attributes.to_vec());
        match parent {
            Some(parent) => document.append_child(parent, node),
            None if is_root => document.set_root(node),
            None => {}
        }
        if self.ctx.has_listeners() {
            self.ctx.fire(ExecutionEvent::StartFragment {
                node: Some(node),
                name: name.to_string(),
            });
        }

        let owner = self
            .frames
            .last()
            .and_then(|f| Some((f.node?, f.bindings.clone()?)));
        let retain = match &bindings {
            Some(bindings) => self.retention(bindings, node, depth),
            None => depth,
        };
        self.frames.push(Frame {
            node: Some(node),
            bindings: bindings.clone(),
            depth,
            retain,
            text_type: TextType::Text,
        });

        if let Some((element, owner_bindings)) = owner {
            let call = VisitCall::ChildElement {
                element,
                child: node,
            };
            for binding in owner_bindings.children() {
                dispatch(binding, call, self.ctx, None)?;
            }
        }
        if let Some(bindings) = bindings {
            let call = VisitCall::Before { element: node };
            for binding in bindings.before() {
                dispatch(binding, call, self.ctx, None)?;
            }
        }
        Ok(())
    }

    /// How deep below `node` the tree has to stay materialized for the
    /// visitors that target it.
    fn retention(&self, bindings: &ElementBindings, node: NodeId, depth: usize) -> usize {
        let mut retain = depth;
        if bindings.needs_text() {
            retain = depth + 1;
        }
        let candidates = bindings
            .before()
            .iter()
            .chain(bindings.children())
            .chain(bindings.after());
        for binding in candidates {
            let wanted = match binding.visitor().max_node_depth() {
                0 => usize::MAX,
                levels => depth + levels - 1,
            };
            if wanted > retain && targets(binding, node, &*self.ctx) {
                retain = wanted;
            }
        }
        retain
    }

    fn close(&mut self, name: &QName) -> Flow {
        let Some(frame) = self.frames.pop() else {
            log::warn!("Unexpected </{}> with no open element", name);
            return Ok(());
        };
        let Some(node) = frame.node else {
            if self.ctx.has_listeners() {
                self.ctx.fire(ExecutionEvent::EndFragment {
                    node: None,
                    name: name.to_string(),
                });
            }
            return Ok(());
        };

        let flow = match &frame.bindings {
            Some(bindings) => close_element(
                bindings,
                node,
                self.ctx,
                self.settings.reverse_visit_order_on_visit_after,
                None,
            ),
            None => Ok(()),
        };
        if self.ctx.has_listeners() {
            self.ctx.fire(ExecutionEvent::EndFragment {
                node: Some(node),
                name: name.to_string(),
            });
        }
        self.ctx.forget(node);
        if flow.is_ok() && frame.depth > self.retained_depth() {
            self.ctx.document_mut().remove(node);
        }
        flow
    }

    fn character_data(&mut self, kind: NodeKind) -> Flow {
        // Content of an element that was not materialized is dropped with it.
        let Some(element) = self.frames.last().and_then(|f| f.node) else {
            return Ok(());
        };
        let bindings = self.frames.last().and_then(|f| f.bindings.clone());
        let node = self.ctx.document_mut().create(kind);
        self.ctx.document_mut().append_child(element, node);

        if let Some(bindings) = bindings {
            let call = VisitCall::ChildText {
                element,
                text: node,
            };
            for binding in bindings.children() {
                dispatch(binding, call, self.ctx, None)?;
            }
        }
        if self.ctx.has_listeners() {
            self.ctx.fire(ExecutionEvent::CharacterData {
                node,
                parent: element,
            });
        }
        if self.frames.len() + 1 > self.retained_depth() {
            self.ctx.document_mut().remove(node);
        }
        Ok(())
    }

    /// Applies the outcome of a step. A terminate request ends the run
    /// quietly; an abort ends it with the error. Either way every open
    /// frame is released without running its after-visitors.
    fn settle(&mut self, flow: Flow) -> Result<(), DeliveryError> {
        match flow {
            Ok(()) => Ok(()),
            Err(Interrupt::Terminate) => {
                log::debug!(
                    "Traversal of '{}' terminated by a visitor at depth {}",
                    self.ctx.source_id(),
                    self.frames.len()
                );
                self.unwind();
                self.ctx.mark_terminated();
                self.state = DispatchState::Terminated;
                Ok(())
            }
            Err(Interrupt::Abort(err)) => {
                self.unwind();
                self.state = DispatchState::Terminated;
                Err(err)
            }
        }
    }

    fn unwind(&mut self) {
        while let Some(frame) = self.frames.pop() {
            if let Some(node) = frame.node {
                self.ctx.forget(node);
            }
        }
    }
}

impl StreamEventHandler for StreamingDispatcher<'_> {
    type Output = ();
    type Error = DeliveryError;

    fn start_document(&mut self) -> Result<(), DeliveryError> {
        log::debug!("Start of source '{}'", self.ctx.source_id());
        Ok(())
    }

    fn end_document(&mut self) -> Result<(), DeliveryError> {
        if self.state != DispatchState::Terminated && !self.frames.is_empty() {
            log::warn!(
                "Source '{}' ended with {} open element(s)",
                self.ctx.source_id(),
                self.frames.len()
            );
            self.unwind();
        }
        Ok(())
    }

    fn start_element(&mut self, name: &QName, attributes: &[Attribute]) -> Result<(), DeliveryError> {
        if self.is_terminated() {
            return Ok(());
        }
        self.state = DispatchState::InElement;
        let flow = self.open(name, attributes);
        self.settle(flow)
    }

    fn end_element(&mut self, name: &QName) -> Result<(), DeliveryError> {
        if self.is_terminated() {
            return Ok(());
        }
        let flow = self.close(name);
        let result = self.settle(flow);
        if self.frames.is_empty() && self.state == DispatchState::InElement {
            self.state = DispatchState::AwaitingDocument;
        }
        result
    }

    fn text(&mut self, content: &str) -> Result<(), DeliveryError> {
        if self.is_terminated() {
            return Ok(());
        }
        let Some(text_type) = self.frames.last().map(|f| f.text_type) else {
            return Ok(());
        };
        let kind = match text_type {
            TextType::CData => {
                self.cdata.push_str(content);
                return Ok(());
            }
            TextType::Entity if !self.settings.rewrite_entities => {
                NodeKind::Text(encode_character_references(content))
            }
            _ => NodeKind::Text(content.to_string()),
        };
        let flow = self.character_data(kind);
        self.settle(flow)
    }

    fn comment(&mut self, content: &str) -> Result<(), DeliveryError> {
        if self.is_terminated() {
            return Ok(());
        }
        let flow = self.character_data(NodeKind::Comment(content.to_string()));
        self.settle(flow)
    }

    fn start_cdata(&mut self) -> Result<(), DeliveryError> {
        if let Some(frame) = self.frames.last_mut() {
            frame.text_type = TextType::CData;
        }
        self.cdata.clear();
        Ok(())
    }

    fn end_cdata(&mut self) -> Result<(), DeliveryError> {
        if self.is_terminated() {
            return Ok(());
        }
        let Some(frame) = self.frames.last_mut() else {
            return Ok(());
        };
        frame.text_type = TextType::Text;
        let content = std::mem::take(&mut self.cdata);
        let flow = self.character_data(NodeKind::CData(content));
        self.settle(flow)
    }

    fn start_entity(&mut self, _name: &str) -> Result<(), DeliveryError> {
        if let Some(frame) = self.frames.last_mut() {
            frame.text_type = TextType::Entity;
        }
        Ok(())
    }

    fn end_entity(&mut self, _name: &str) -> Result<(), DeliveryError> {
        if let Some(frame) = self.frames.last_mut() {
            frame.text_type = TextType::Text;
        }
        Ok(())
    }

    fn is_terminated(&self) -> bool {
        self.state == DispatchState::Terminated
    }
}

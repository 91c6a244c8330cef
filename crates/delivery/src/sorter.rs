//! Orders visitors so that producers run before the visitors consuming
//! their products.
use crate::binding::VisitorBinding;
use crate::error::DeliveryError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    ProducersFirst,
    ConsumersFirst,
}

/// Topologically sorts `bindings` by their producer/consumer relations.
///
/// Visitors with no relation between them keep their registration order.
/// A dependency cycle is a configuration error.
pub fn sort(bindings: Vec<VisitorBinding>, order: SortOrder) -> Result<Vec<VisitorBinding>, DeliveryError> {
    let n = bindings.len();
    if n < 2 {
        return Ok(bindings);
    }

    // edges[i] holds every j that must come after i.
    let mut edges = vec![Vec::new(); n];
    let mut incoming = vec![0usize; n];
    for (p, producer) in bindings.iter().enumerate() {
        let products = producer.target_visitor().products();
        if products.is_empty() {
            continue;
        }
        for (c, consumer) in bindings.iter().enumerate() {
            if p == c || producer.same_visitor(consumer) {
                continue;
            }
            let target = consumer.target_visitor();
            if products.iter().any(|product| target.consumes(product)) {
                let (from, to) = match order {
                    SortOrder::ProducersFirst => (p, c),
                    SortOrder::ConsumersFirst => (c, p),
                };
                edges[from].push(to);
                incoming[to] += 1;
            }
        }
    }

    let mut placed = vec![false; n];
    let mut sequence = Vec::with_capacity(n);
    while sequence.len() < n {
        // Lowest registration index among the ready visitors keeps the sort stable.
        let Some(next) = (0..n).find(|&i| !placed[i] && incoming[i] == 0) else {
            let cycle: Vec<&str> = (0..n)
                .filter(|&i| !placed[i])
                .map(|i| bindings[i].target_visitor().name())
                .collect();
            return Err(DeliveryError::configuration(format!(
                "circular producer/consumer dependency between visitors: {}",
                cycle.join(", ")
            )));
        };
        placed[next] = true;
        for &to in &edges[next] {
            incoming[to] -= 1;
        }
        sequence.push(next);
    }

    let mut slots: Vec<Option<VisitorBinding>> = bindings.into_iter().map(Some).collect();
    Ok(sequence
        .into_iter()
        .filter_map(|i| slots[i].take())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::ResourceConfig;
    use crate::visitor::{FnVisitor, Visitor};
    use std::sync::Arc;

    fn binding(visitor: FnVisitor) -> VisitorBinding {
        let visitor: Arc<dyn Visitor> = Arc::new(visitor);
        VisitorBinding::new(visitor, Arc::new(ResourceConfig::compile("item").unwrap()))
    }

    fn names(bindings: &[VisitorBinding]) -> Vec<&str> {
        bindings.iter().map(|b| b.visitor().name()).collect()
    }

    #[test]
    fn unrelated_visitors_keep_registration_order() {
        let sorted = sort(
            vec![
                binding(FnVisitor::new("a")),
                binding(FnVisitor::new("b")),
                binding(FnVisitor::new("c")),
            ],
            SortOrder::ProducersFirst,
        )
        .unwrap();
        assert_eq!(names(&sorted), ["a", "b", "c"]);
    }

    #[test]
    fn producers_move_ahead_of_consumers() {
        let bindings = vec![
            binding(FnVisitor::new("plain")),
            binding(FnVisitor::new("consumer").consuming("order")),
            binding(FnVisitor::new("producer").producing("order")),
        ];
        let sorted = sort(bindings.clone(), SortOrder::ProducersFirst).unwrap();
        assert_eq!(names(&sorted), ["plain", "producer", "consumer"]);

        let sorted = sort(bindings, SortOrder::ConsumersFirst).unwrap();
        assert_eq!(names(&sorted), ["plain", "consumer", "producer"]);
    }

    #[test]
    fn chains_are_ordered_transitively() {
        let sorted = sort(
            vec![
                binding(FnVisitor::new("c").consuming("b")),
                binding(FnVisitor::new("b").consuming("a").producing("b")),
                binding(FnVisitor::new("a").producing("a")),
            ],
            SortOrder::ProducersFirst,
        )
        .unwrap();
        assert_eq!(names(&sorted), ["a", "b", "c"]);
    }

    #[test]
    fn cycles_are_rejected() {
        let err = sort(
            vec![
                binding(FnVisitor::new("x").producing("x").consuming("y")),
                binding(FnVisitor::new("y").producing("y").consuming("x")),
            ],
            SortOrder::ProducersFirst,
        )
        .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("circular"));
        assert!(message.contains('x') && message.contains('y'));
    }
}

use std::collections::BTreeMap;

use lgw_types::Identifier;
use serde_json::Value as Json;

/// Position of an event within its transaction, in pre-order.
pub type NodeId = u32;

#[derive(Clone, Debug, PartialEq)]
pub struct CreatedEvent {
    pub node_id: NodeId,
    pub contract_id: String,
    pub template_id: Identifier,
    /// Payload in the ledger JSON dialect.
    pub create_argument: Json,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ExercisedEvent {
    pub node_id: NodeId,
    pub contract_id: String,
    pub template_id: Identifier,
    /// Set when the choice was exercised through an interface.
    pub interface_id: Option<Identifier>,
    pub choice: String,
    pub choice_argument: Json,
    /// Result in the ledger JSON dialect.
    pub exercise_result: Json,
    pub consuming: bool,
    /// Highest node id among this event's descendants, or its own id.
    pub last_descendant_node_id: NodeId,
}

impl ExercisedEvent {
    /// Whether this event answers an exercise of `choice` on `template_id`,
    /// directly or through an interface.
    pub fn matches(&self, template_id: &Identifier, choice: &str) -> bool {
        self.choice == choice
            && (self.template_id.same_entity(template_id)
                || self
                    .interface_id
                    .as_ref()
                    .is_some_and(|iface| iface.same_entity(template_id)))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum TreeEvent {
    Created(CreatedEvent),
    Exercised(ExercisedEvent),
}

impl TreeEvent {
    pub fn node_id(&self) -> NodeId {
        match self {
            Self::Created(e) => e.node_id,
            Self::Exercised(e) => e.node_id,
        }
    }
}

/// A committed transaction as returned by submit-and-wait.
#[derive(Clone, Debug, PartialEq)]
pub struct TransactionTree {
    pub update_id: String,
    pub offset: i64,
    pub root_event_ids: Vec<NodeId>,
    pub events_by_id: BTreeMap<NodeId, TreeEvent>,
}

impl TransactionTree {
    /// Build a tree, deriving the roots from the descendant ranges of
    /// exercised events.
    pub fn new(
        update_id: impl Into<String>,
        offset: i64,
        events: impl IntoIterator<Item = TreeEvent>,
    ) -> Self {
        let events_by_id: BTreeMap<_, _> = events.into_iter().map(|e| (e.node_id(), e)).collect();
        let root_event_ids = root_nodes(&events_by_id);
        Self {
            update_id: update_id.into(),
            offset,
            root_event_ids,
            events_by_id,
        }
    }

    pub fn roots(&self) -> impl Iterator<Item = &TreeEvent> {
        self.root_event_ids
            .iter()
            .filter_map(|id| self.events_by_id.get(id))
    }

    pub fn created_events(&self) -> impl Iterator<Item = &CreatedEvent> {
        self.events_by_id.values().filter_map(|e| match e {
            TreeEvent::Created(c) => Some(c),
            TreeEvent::Exercised(_) => None,
        })
    }

    /// The root exercised event carrying the result of an exercise of
    /// `choice` on `template_id`.
    ///
    /// Only root events qualify. When several match, the lowest node id
    /// wins; the ledger emits one root per command, so several matches only
    /// arise for multi-command submissions exercising the same choice.
    pub fn exercise_result_event(
        &self,
        template_id: &Identifier,
        choice: &str,
    ) -> Option<&ExercisedEvent> {
        self.roots()
            .filter_map(|e| match e {
                TreeEvent::Exercised(ex) if ex.matches(template_id, choice) => Some(ex),
                _ => None,
            })
            .min_by_key(|ex| ex.node_id)
    }
}

fn root_nodes(events: &BTreeMap<NodeId, TreeEvent>) -> Vec<NodeId> {
    let mut roots = Vec::new();
    let mut covered_until: Option<NodeId> = None;
    for (id, event) in events {
        if covered_until.map_or(true, |last| *id > last) {
            roots.push(*id);
        }
        if let TreeEvent::Exercised(ex) = event {
            let last = ex.last_descendant_node_id.max(*id);
            covered_until = Some(covered_until.map_or(last, |c| c.max(last)));
        }
    }
    roots
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn license() -> Identifier {
        Identifier::new("#quickstart-licensing", "Licensing.License", "License")
    }

    fn exercised(node_id: NodeId, choice: &str, last: NodeId, result: Json) -> TreeEvent {
        TreeEvent::Exercised(ExercisedEvent {
            node_id,
            contract_id: format!("00c{node_id}"),
            template_id: license(),
            interface_id: None,
            choice: choice.into(),
            choice_argument: json!({}),
            exercise_result: result,
            consuming: true,
            last_descendant_node_id: last,
        })
    }

    fn created(node_id: NodeId) -> TreeEvent {
        TreeEvent::Created(CreatedEvent {
            node_id,
            contract_id: format!("00n{node_id}"),
            template_id: license(),
            create_argument: json!({}),
        })
    }

    #[test]
    fn roots_follow_descendant_ranges() {
        let tree = TransactionTree::new(
            "upd",
            1,
            [
                exercised(0, "License_Renew", 2, json!("r0")),
                created(1),
                exercised(2, "License_Renew", 2, json!("nested")),
                created(3),
                exercised(4, "License_Expire", 5, json!("r4")),
                created(5),
            ],
        );
        assert_eq!(tree.root_event_ids, vec![0, 3, 4]);
        assert_eq!(tree.created_events().count(), 3);
    }

    #[test]
    fn selection_ignores_nested_and_mismatched_events() {
        let tree = TransactionTree::new(
            "upd",
            1,
            [
                exercised(0, "License_Expire", 2, json!("expire")),
                exercised(1, "License_Renew", 1, json!("nested-renew")),
                created(2),
                exercised(3, "License_Renew", 3, json!("root-renew")),
            ],
        );
        let ev = tree.exercise_result_event(&license(), "License_Renew").unwrap();
        assert_eq!(ev.node_id, 3);
        assert_eq!(ev.exercise_result, json!("root-renew"));
    }

    #[test]
    fn lowest_node_wins_among_matching_roots() {
        let tree = TransactionTree::new(
            "upd",
            1,
            [
                exercised(5, "License_Renew", 5, json!("second")),
                exercised(2, "License_Renew", 4, json!("first")),
                created(3),
                created(4),
            ],
        );
        assert_eq!(tree.root_event_ids, vec![2, 5]);
        let ev = tree.exercise_result_event(&license(), "License_Renew").unwrap();
        assert_eq!(ev.exercise_result, json!("first"));
    }

    #[test]
    fn no_match_yields_none() {
        let tree = TransactionTree::new("upd", 1, [created(0)]);
        assert!(tree.exercise_result_event(&license(), "License_Renew").is_none());
    }

    #[test]
    fn interface_exercise_matches_interface_id() {
        let iface = Identifier::new(
            "#splice-api-token-allocation-v1",
            "Splice.Api.Token.AllocationV1",
            "Allocation",
        );
        let event = exercised(0, "Allocation_ExecuteTransfer", 0, json!({}));
        let TreeEvent::Exercised(mut ex) = event else {
            unreachable!()
        };
        ex.interface_id = Some(iface.clone());
        assert!(ex.matches(&iface, "Allocation_ExecuteTransfer"));
        assert!(ex.matches(&license(), "Allocation_ExecuteTransfer"));
        assert!(!ex.matches(&iface, "Other"));
    }
}

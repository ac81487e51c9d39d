//! In-memory projection backend.
//!
//! Holds the active contract set directly and evaluates predicates with SQL
//! semantics: a NULL operand makes a comparison unknown, and only rows whose
//! filter is true are returned.

use std::cmp::Ordering;
use std::sync::RwLock;

use async_trait::async_trait;
use lgw_types::Identifier;
use serde_json::Value as Json;

use crate::error::{StoreError, StoreResult};
use crate::predicate::{Column, CompareOp, Operand, Param, Predicate, Side};
use crate::query::QuerySpec;
use crate::traits::{JoinedRow, ProjectionBackend, Row};

/// A contract as the projector hands it over.
#[derive(Clone, Debug, PartialEq)]
pub struct ProjectedContract {
    pub contract_id: String,
    pub template_id: Identifier,
    /// Ledger-JSON payload.
    pub payload: Json,
    pub created_at_offset: i64,
}

#[derive(Default)]
pub struct InMemoryProjection {
    contracts: RwLock<Vec<ProjectedContract>>,
}

impl InMemoryProjection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a newly created contract. Replaces an entry with the same id.
    pub fn insert(&self, contract: ProjectedContract) {
        let mut contracts = self.contracts.write().expect("lock poisoned");
        contracts.retain(|c| c.contract_id != contract.contract_id);
        contracts.push(contract);
        contracts.sort_by_key(|c| c.created_at_offset);
    }

    /// Remove an archived contract. Returns whether it was present.
    pub fn archive(&self, contract_id: &str) -> bool {
        let mut contracts = self.contracts.write().expect("lock poisoned");
        let before = contracts.len();
        contracts.retain(|c| c.contract_id != contract_id);
        contracts.len() != before
    }

    /// Replace the whole active set, e.g. from a ledger snapshot.
    pub fn sync_from(&self, snapshot: impl IntoIterator<Item = ProjectedContract>) {
        let mut next: Vec<_> = snapshot.into_iter().collect();
        next.sort_by_key(|c| c.created_at_offset);
        *self.contracts.write().expect("lock poisoned") = next;
    }

    pub fn len(&self) -> usize {
        self.contracts.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn of_template(&self, template: &Identifier) -> Vec<Row> {
        let qualified = template.qualified_name();
        self.contracts
            .read()
            .expect("lock poisoned")
            .iter()
            .filter(|c| c.template_id.qualified_name() == qualified)
            .map(|c| Row {
                contract_id: c.contract_id.clone(),
                payload: c.payload.clone(),
            })
            .collect()
    }
}

#[async_trait]
impl ProjectionBackend for InMemoryProjection {
    async fn active(&self, query: &QuerySpec, params: &[Param]) -> StoreResult<Vec<Row>> {
        // Rendering validates the query exactly as the SQL backend would.
        query.to_sql(params)?;
        let mut out = Vec::new();
        for row in self.of_template(&query.template) {
            let keep = match &query.filter {
                None => true,
                Some(filter) => Eval::new(params, 0, &row, None).predicate(filter)? == Some(true),
            };
            if keep {
                out.push(row);
            }
        }
        Ok(out)
    }

    async fn active_left_join(
        &self,
        query: &QuerySpec,
        params: &[Param],
    ) -> StoreResult<Vec<JoinedRow>> {
        query.to_sql(params)?;
        let Some(join) = &query.join else {
            let rows = self.active(query, params).await?;
            return Ok(rows
                .into_iter()
                .map(|primary| JoinedRow { primary, secondary: None })
                .collect());
        };
        let on_params = join.on.param_count();
        let secondaries = self.of_template(&join.secondary);

        let mut out = Vec::new();
        for primary in self.of_template(&query.template) {
            let mut matched = Vec::new();
            for secondary in &secondaries {
                let on = Eval::new(params, 0, &primary, Some(secondary));
                if on.predicate(&join.on)? == Some(true) {
                    matched.push(Some(secondary.clone()));
                }
            }
            if matched.is_empty() {
                matched.push(None);
            }
            for secondary in matched {
                let keep = match &query.filter {
                    None => true,
                    Some(filter) => {
                        let eval = Eval::new(params, on_params, &primary, secondary.as_ref());
                        eval.predicate(filter)? == Some(true)
                    }
                };
                if keep {
                    out.push(JoinedRow {
                        primary: primary.clone(),
                        secondary,
                    });
                }
            }
        }
        Ok(out)
    }

    async fn lookup(&self, contract_id: &str, template: &Identifier) -> StoreResult<Option<Row>> {
        let qualified = template.qualified_name();
        Ok(self
            .contracts
            .read()
            .expect("lock poisoned")
            .iter()
            .find(|c| c.contract_id == contract_id && c.template_id.qualified_name() == qualified)
            .map(|c| Row {
                contract_id: c.contract_id.clone(),
                payload: c.payload.clone(),
            }))
    }
}

/// Three-valued predicate evaluation over one (joined) row.
struct Eval<'a> {
    params: &'a [Param],
    offset: usize,
    primary: &'a Row,
    /// `None` both outside joins and for unmatched left-join rows.
    secondary: Option<&'a Row>,
}

impl<'a> Eval<'a> {
    fn new(
        params: &'a [Param],
        offset: usize,
        primary: &'a Row,
        secondary: Option<&'a Row>,
    ) -> Self {
        Self {
            params,
            offset,
            primary,
            secondary,
        }
    }

    fn predicate(&self, p: &Predicate) -> StoreResult<Option<bool>> {
        Ok(match p {
            Predicate::And(a, b) => match (self.predicate(a)?, self.predicate(b)?) {
                (Some(false), _) | (_, Some(false)) => Some(false),
                (Some(true), Some(true)) => Some(true),
                _ => None,
            },
            Predicate::Or(a, b) => match (self.predicate(a)?, self.predicate(b)?) {
                (Some(true), _) | (_, Some(true)) => Some(true),
                (Some(false), Some(false)) => Some(false),
                _ => None,
            },
            Predicate::Not(inner) => self.predicate(inner)?.map(|v| !v),
            Predicate::IsNull { column, negated } => {
                Some(self.column(column).is_none() != *negated)
            }
            Predicate::Compare { left, op, right } => self.compare(left, *op, right)?,
        })
    }

    fn compare(&self, left: &Operand, op: CompareOp, right: &Operand) -> StoreResult<Option<bool>> {
        let typed = self.param(left).or(self.param(right)).cloned();
        let l = self.operand(left, typed.as_ref())?;
        let r = self.operand(right, typed.as_ref())?;
        let (Some(l), Some(r)) = (l, r) else {
            return Ok(None);
        };
        let ordering = match (&l, &r) {
            (Param::Text(a), Param::Text(b)) => a.cmp(b),
            (Param::Int(a), Param::Int(b)) => a.cmp(b),
            (Param::Bool(a), Param::Bool(b)) => a.cmp(b),
            _ => return Err(StoreError::Database(format!("cannot compare {l} with {r}"))),
        };
        Ok(Some(match op {
            CompareOp::Eq => ordering == Ordering::Equal,
            CompareOp::Ne => ordering != Ordering::Equal,
            CompareOp::Lt => ordering == Ordering::Less,
            CompareOp::Le => ordering != Ordering::Greater,
            CompareOp::Gt => ordering == Ordering::Greater,
            CompareOp::Ge => ordering != Ordering::Less,
        }))
    }

    fn param<'b>(&self, operand: &'b Operand) -> Option<&'b Param>
    where
        'a: 'b,
    {
        match operand {
            Operand::Param(i) => self.params.get(self.offset + i),
            Operand::Literal(p) => Some(p),
            Operand::Column(_) => None,
        }
    }

    /// Column values are text, cast to the type of the value they are
    /// compared against.
    fn operand(&self, operand: &Operand, typed: Option<&Param>) -> StoreResult<Option<Param>> {
        if let Some(p) = self.param(operand) {
            return Ok(Some(p.clone()));
        }
        let Operand::Column(column) = operand else {
            return Ok(None);
        };
        let Some(text) = self.column(column) else {
            return Ok(None);
        };
        Ok(Some(match typed {
            Some(Param::Int(_)) => Param::Int(text.parse().map_err(|_| {
                StoreError::Database(format!("invalid input syntax for type bigint: {text:?}"))
            })?),
            Some(Param::Bool(_)) => Param::Bool(match text.as_str() {
                "true" => true,
                "false" => false,
                _ => {
                    return Err(StoreError::Database(format!(
                        "invalid input syntax for type boolean: {text:?}"
                    )))
                }
            }),
            _ => Param::Text(text),
        }))
    }

    /// Text value of a column, `None` for SQL NULL.
    fn column(&self, column: &Column) -> Option<String> {
        let row = match column.side() {
            Side::Primary => self.primary,
            Side::Secondary => self.secondary?,
        };
        match column {
            Column::ContractId(_) => Some(row.contract_id.clone()),
            Column::Payload(_, path) => {
                let mut value = &row.payload;
                for segment in path {
                    value = value.get(segment)?;
                }
                match value {
                    Json::Null => None,
                    Json::String(s) => Some(s.clone()),
                    other => Some(other.to_string()),
                }
            }
        }
    }
}

//! Rendering of projection queries to PostgreSQL.

use lgw_types::Identifier;

use crate::error::{StoreError, StoreResult};
use crate::predicate::{Column, CompareOp, Operand, Param, Predicate, Side};

/// Left join of a second template onto the primary one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JoinSpec {
    pub secondary: Identifier,
    pub on: Predicate,
}

/// A read over the active-contracts projection.
///
/// Positional parameters are bound in a fixed order: the primary template's
/// qualified name, the secondary's (joins only), then the caller's
/// parameters in the order their `?` placeholders appear, join condition
/// first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QuerySpec {
    pub template: Identifier,
    pub filter: Option<Predicate>,
    pub join: Option<JoinSpec>,
}

/// Rendered SQL with its bind list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SqlQuery {
    pub sql: String,
    pub binds: Vec<Param>,
}

impl QuerySpec {
    pub fn active(template: Identifier) -> Self {
        Self {
            template,
            filter: None,
            join: None,
        }
    }

    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.filter = Some(predicate);
        self
    }

    pub fn left_join(mut self, secondary: Identifier, on: Predicate) -> Self {
        self.join = Some(JoinSpec { secondary, on });
        self
    }

    /// Number of caller parameters the query expects.
    pub fn param_count(&self) -> usize {
        self.join.as_ref().map_or(0, |j| j.on.param_count())
            + self.filter.as_ref().map_or(0, Predicate::param_count)
    }

    pub fn check_params(&self, params: &[Param]) -> StoreResult<()> {
        let expected = self.param_count();
        if expected != params.len() {
            return Err(StoreError::ParameterCount {
                expected,
                actual: params.len(),
            });
        }
        Ok(())
    }

    /// Render to PostgreSQL with `$n` placeholders.
    pub fn to_sql(&self, params: &[Param]) -> StoreResult<SqlQuery> {
        self.check_params(params)?;
        let mut binds = vec![Param::Text(self.template.qualified_name())];

        let sql = match &self.join {
            None => {
                let mut sql = String::from("SELECT contract_id, payload FROM active($1)");
                if let Some(filter) = &self.filter {
                    let mut r = Renderer::new(params, 1, 0, false);
                    sql.push_str(" WHERE ");
                    sql.push_str(&r.predicate(filter)?);
                }
                sql
            }
            Some(join) => {
                binds.push(Param::Text(join.secondary.qualified_name()));
                let mut r = Renderer::new(params, 2, 0, true);
                let mut sql = format!(
                    "SELECT prim.contract_id AS primary_contract_id, \
                     prim.payload AS primary_payload, \
                     sec.contract_id AS secondary_contract_id, sec.payload AS secondary_payload \
                     FROM active($1) prim LEFT JOIN active($2) sec ON {}",
                    r.predicate(&join.on)?
                );
                if let Some(filter) = &self.filter {
                    let mut r = Renderer::new(params, 2, join.on.param_count(), true);
                    sql.push_str(" WHERE ");
                    sql.push_str(&r.predicate(filter)?);
                }
                sql
            }
        };

        binds.extend(params.iter().cloned());
        Ok(SqlQuery { sql, binds })
    }
}

impl SqlQuery {
    /// Lookup of one contract by id, scoped to a template.
    pub fn lookup(contract_id: &str, template: &Identifier) -> Self {
        Self {
            sql: "SELECT contract_id, payload FROM lookup_contract($1, $2)".into(),
            binds: vec![
                Param::Text(contract_id.to_string()),
                Param::Text(template.qualified_name()),
            ],
        }
    }
}

struct Renderer<'a> {
    params: &'a [Param],
    /// Binds preceding the caller parameters.
    fixed: usize,
    /// Caller parameters consumed by earlier predicates.
    offset: usize,
    joined: bool,
}

impl<'a> Renderer<'a> {
    fn new(params: &'a [Param], fixed: usize, offset: usize, joined: bool) -> Self {
        Self {
            params,
            fixed,
            offset,
            joined,
        }
    }

    fn predicate(&mut self, p: &Predicate) -> StoreResult<String> {
        Ok(match p {
            Predicate::And(a, b) => format!("({} AND {})", self.predicate(a)?, self.predicate(b)?),
            Predicate::Or(a, b) => format!("({} OR {})", self.predicate(a)?, self.predicate(b)?),
            Predicate::Not(inner) => format!("NOT ({})", self.predicate(inner)?),
            Predicate::IsNull { column, negated } => {
                let not = if *negated { " NOT" } else { "" };
                format!("{} IS{not} NULL", self.column(column)?)
            }
            Predicate::Compare { left, op, right } => self.compare(left, *op, right)?,
        })
    }

    fn compare(&self, left: &Operand, op: CompareOp, right: &Operand) -> StoreResult<String> {
        let value_type = self.value(left).or_else(|| self.value(right));
        let l = self.operand(left, value_type)?;
        let r = self.operand(right, value_type)?;
        Ok(format!("{l} {} {r}", op.as_sql()))
    }

    fn value<'b>(&self, operand: &'b Operand) -> Option<&'b Param>
    where
        'a: 'b,
    {
        match operand {
            Operand::Param(i) => self.params.get(self.offset + i),
            Operand::Literal(p) => Some(p),
            Operand::Column(_) => None,
        }
    }

    fn operand(&self, operand: &Operand, compared_with: Option<&Param>) -> StoreResult<String> {
        match operand {
            Operand::Param(i) => Ok(format!("${}", self.fixed + self.offset + i + 1)),
            Operand::Literal(p) => Ok(p.to_string()),
            Operand::Column(column @ Column::ContractId(_)) => match compared_with {
                None | Some(Param::Text(_)) => self.column(column),
                Some(_) => Err(StoreError::predicate(0, "contract_id compares only with text")),
            },
            Operand::Column(column) => {
                let sql = self.column(column)?;
                Ok(match compared_with {
                    Some(Param::Int(_)) => format!("({sql})::bigint"),
                    Some(Param::Bool(_)) => format!("({sql})::boolean"),
                    None | Some(Param::Text(_)) => sql,
                })
            }
        }
    }

    fn column(&self, column: &Column) -> StoreResult<String> {
        let prefix = match (self.joined, column.side()) {
            (false, Side::Secondary) => {
                return Err(StoreError::predicate(0, "sec. column outside a join"));
            }
            (false, Side::Primary) => "",
            (true, Side::Primary) => "prim.",
            (true, Side::Secondary) => "sec.",
        };
        Ok(match column {
            Column::ContractId(_) => format!("{prefix}contract_id"),
            Column::Payload(_, path) => {
                let mut sql = format!("{prefix}payload");
                for (i, seg) in path.iter().enumerate() {
                    let arrow = if i + 1 == path.len() { "->>" } else { "->" };
                    sql.push_str(arrow);
                    sql.push_str(&Param::Text(seg.clone()).to_string());
                }
                sql
            }
        })
    }
}

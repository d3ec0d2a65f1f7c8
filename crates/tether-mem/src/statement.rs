//! Resolved plans and their execution against the store.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use tether_core::{Error, PreparedQuery, Result, Value};

use crate::sql::{Ast, ColumnSpec, Expr, SelectColumns};
use crate::{Store, Table};

/// A parsed statement with column references resolved to indexes.
#[derive(Debug, Clone)]
pub(crate) enum Plan {
    Create {
        table: String,
        columns: Vec<ColumnSpec>,
    },
    Insert {
        table: String,
        slots: Vec<(usize, Expr)>,
    },
    Select {
        table: String,
        proj: Vec<usize>,
        filter: Option<(usize, Expr)>,
    },
    Update {
        table: String,
        sets: Vec<(usize, Expr)>,
        filter: Option<(usize, Expr)>,
    },
    Delete {
        table: String,
        filter: Option<(usize, Expr)>,
    },
    Begin,
    Commit,
    Rollback,
}

/// Resolve names against the current schema. `create table` stays
/// name-based; everything else fails here if the table or a column is
/// unknown, mirroring prepare-time errors of embedded stores.
pub(crate) fn resolve(store: &Store, ast: Ast) -> Result<Plan> {
    match ast {
        Ast::Create { table, columns } => Ok(Plan::Create { table, columns }),
        Ast::Insert {
            table,
            columns,
            values,
        } => {
            let t = store.table(&table)?;
            if columns.len() != values.len() {
                return Err(Error::backend(format!(
                    "{} values for {} columns",
                    values.len(),
                    columns.len()
                )));
            }
            let mut slots = Vec::with_capacity(columns.len());
            for (name, value) in columns.iter().zip(values) {
                slots.push((t.column_index(name)?, value));
            }
            Ok(Plan::Insert { table, slots })
        }
        Ast::Select {
            table,
            columns,
            filter,
        } => {
            let t = store.table(&table)?;
            let proj = match columns {
                SelectColumns::All => (0..t.columns.len()).collect(),
                SelectColumns::Named(names) => names
                    .iter()
                    .map(|name| t.column_index(name))
                    .collect::<Result<Vec<_>>>()?,
            };
            let filter = match filter {
                Some((name, expr)) => Some((t.column_index(&name)?, expr)),
                None => None,
            };
            Ok(Plan::Select {
                table,
                proj,
                filter,
            })
        }
        Ast::Update {
            table,
            sets,
            filter,
        } => {
            let t = store.table(&table)?;
            let mut resolved = Vec::with_capacity(sets.len());
            for (name, expr) in sets {
                resolved.push((t.column_index(&name)?, expr));
            }
            let filter = match filter {
                Some((name, expr)) => Some((t.column_index(&name)?, expr)),
                None => None,
            };
            Ok(Plan::Update {
                table,
                sets: resolved,
                filter,
            })
        }
        Ast::Delete { table, filter } => {
            let t = store.table(&table)?;
            let filter = match filter {
                Some((name, expr)) => Some((t.column_index(&name)?, expr)),
                None => None,
            };
            Ok(Plan::Delete { table, filter })
        }
        Ast::Begin => Ok(Plan::Begin),
        Ast::Commit => Ok(Plan::Commit),
        Ast::Rollback => Ok(Plan::Rollback),
    }
}

fn expr_value(expr: &Expr, params: &HashMap<String, Value>) -> Value {
    match expr {
        Expr::Literal(v) => v.clone(),
        Expr::Param(name) => params.get(name).cloned().unwrap_or(Value::Null),
    }
}

/// Run a side-effecting plan. A `select` here (immediate execution) is
/// evaluated and its rows discarded.
pub(crate) fn execute(
    store: &mut Store,
    plan: &Plan,
    params: &HashMap<String, Value>,
) -> Result<u64> {
    match plan {
        Plan::Create { table, columns } => {
            if store.tables.contains_key(table) {
                return Err(Error::backend(format!("table {table} already exists")));
            }
            let autoincrement = columns.iter().position(|c| c.autoincrement);
            store.tables.insert(
                table.clone(),
                Table {
                    columns: columns.iter().map(|c| c.name.clone()).collect(),
                    autoincrement,
                    next_rowid: 1,
                    rows: Vec::new(),
                },
            );
            Ok(0)
        }
        Plan::Insert { table, slots } => {
            let t = store
                .tables
                .get_mut(table)
                .ok_or_else(|| Error::backend(format!("no such table: {table}")))?;
            let mut row = vec![Value::Null; t.columns.len()];
            for (idx, expr) in slots {
                row[*idx] = expr_value(expr, params);
            }
            if let Some(ai) = t.autoincrement {
                match row[ai] {
                    Value::Null => {
                        let id = t.next_rowid;
                        t.next_rowid += 1;
                        row[ai] = Value::Integer(id);
                        store.last_insert = id;
                    }
                    Value::Integer(v) => {
                        t.next_rowid = t.next_rowid.max(v + 1);
                        store.last_insert = v;
                    }
                    _ => {
                        return Err(Error::backend(
                            "datatype mismatch for autoincrement column",
                        ));
                    }
                }
            }
            t.rows.push(row);
            Ok(1)
        }
        Plan::Select {
            table,
            proj,
            filter,
        } => {
            evaluate(store, table, proj, filter.as_ref(), params)?;
            Ok(0)
        }
        Plan::Update {
            table,
            sets,
            filter,
        } => {
            let needle = filter
                .as_ref()
                .map(|(idx, expr)| (*idx, expr_value(expr, params)));
            let new_values: Vec<(usize, Value)> = sets
                .iter()
                .map(|(idx, expr)| (*idx, expr_value(expr, params)))
                .collect();
            let t = store
                .tables
                .get_mut(table)
                .ok_or_else(|| Error::backend(format!("no such table: {table}")))?;
            let mut affected = 0;
            for row in &mut t.rows {
                if let Some((idx, value)) = &needle {
                    if value.is_null() || row[*idx] != *value {
                        continue;
                    }
                }
                for (idx, value) in &new_values {
                    row[*idx] = value.clone();
                }
                affected += 1;
            }
            Ok(affected)
        }
        Plan::Delete { table, filter } => {
            let t = store
                .tables
                .get_mut(table)
                .ok_or_else(|| Error::backend(format!("no such table: {table}")))?;
            let before = t.rows.len();
            match filter {
                Some((idx, expr)) => {
                    let needle = expr_value(expr, params);
                    // NULL matches nothing, so a NULL needle deletes nothing.
                    if !needle.is_null() {
                        t.rows.retain(|row| row[*idx] != needle);
                    }
                }
                None => t.rows.clear(),
            }
            Ok((before - t.rows.len()) as u64)
        }
        Plan::Begin => {
            if store.snapshot.is_some() {
                return Err(Error::backend(
                    "cannot start a transaction within a transaction",
                ));
            }
            store.snapshot = Some(store.tables.clone());
            Ok(0)
        }
        Plan::Commit => {
            if store.snapshot.take().is_none() {
                return Err(Error::backend("no transaction is active"));
            }
            Ok(0)
        }
        Plan::Rollback => match store.snapshot.take() {
            Some(tables) => {
                store.tables = tables;
                Ok(0)
            }
            None => Err(Error::backend("no transaction is active")),
        },
    }
}

/// Evaluate a select: filter, then project.
pub(crate) fn evaluate(
    store: &Store,
    table: &str,
    proj: &[usize],
    filter: Option<&(usize, Expr)>,
    params: &HashMap<String, Value>,
) -> Result<Vec<Vec<Value>>> {
    let t = store.table(table)?;
    let needle = filter.map(|(idx, expr)| (*idx, expr_value(expr, params)));
    let mut out = Vec::new();
    for row in &t.rows {
        if let Some((idx, value)) = &needle {
            if value.is_null() || row[*idx] != *value {
                continue;
            }
        }
        out.push(proj.iter().map(|&i| row[i].clone()).collect());
    }
    Ok(out)
}

fn collect_param_names(plan: &Plan) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    let mut push = |expr: &Expr| {
        if let Expr::Param(name) = expr {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
    };
    match plan {
        Plan::Insert { slots, .. } => {
            for (_, expr) in slots {
                push(expr);
            }
        }
        Plan::Update { sets, filter, .. } => {
            for (_, expr) in sets {
                push(expr);
            }
            if let Some((_, expr)) = filter {
                push(expr);
            }
        }
        Plan::Select { filter, .. } | Plan::Delete { filter, .. } => {
            if let Some((_, expr)) = filter {
                push(expr);
            }
        }
        _ => {}
    }
    names
}

/// A compiled statement over the shared store.
///
/// Select plans materialize their result rows on the first step after a
/// reset and then walk them; side-effecting plans perform their work on
/// each step and report exhaustion immediately.
#[derive(Debug)]
pub struct MemStatement {
    store: Rc<RefCell<Store>>,
    plan: Plan,
    params: HashMap<String, Value>,
    param_names: Vec<String>,
    rows: Option<Vec<Vec<Value>>>,
    pos: usize,
    on_row: bool,
}

impl MemStatement {
    pub(crate) fn new(store: Rc<RefCell<Store>>, plan: Plan) -> Self {
        let param_names = collect_param_names(&plan);
        Self {
            store,
            plan,
            params: HashMap::new(),
            param_names,
            rows: None,
            pos: 0,
            on_row: false,
        }
    }
}

impl PreparedQuery for MemStatement {
    fn bind_value(&mut self, name: &str, value: Value) -> Result<()> {
        if !self.param_names.iter().any(|n| n == name) {
            return Err(Error::NoParameter {
                name: name.to_string(),
            });
        }
        self.params.insert(name.to_string(), value);
        Ok(())
    }

    fn step(&mut self) -> Result<bool> {
        match &self.plan {
            Plan::Select {
                table,
                proj,
                filter,
            } => {
                if self.rows.is_none() {
                    let computed = {
                        let store = self.store.borrow();
                        evaluate(&store, table, proj, filter.as_ref(), &self.params)?
                    };
                    self.rows = Some(computed);
                    self.pos = 0;
                }
                let total = self.rows.as_ref().map_or(0, Vec::len);
                if self.pos < total {
                    self.pos += 1;
                    self.on_row = true;
                    Ok(true)
                } else {
                    self.on_row = false;
                    Ok(false)
                }
            }
            plan => {
                let mut store = self.store.borrow_mut();
                execute(&mut store, plan, &self.params)?;
                self.on_row = false;
                Ok(false)
            }
        }
    }

    fn column(&self, index: usize) -> Result<Value> {
        if !self.on_row {
            return Err(Error::NoResultRow);
        }
        let row = self
            .rows
            .as_ref()
            .and_then(|rows| rows.get(self.pos.wrapping_sub(1)))
            .ok_or(Error::NoResultRow)?;
        row.get(index)
            .cloned()
            .ok_or(Error::ResultIndexOutOfRange {
                index,
                count: row.len(),
            })
    }

    fn column_count(&self) -> usize {
        match &self.plan {
            Plan::Select { proj, .. } => proj.len(),
            _ => 0,
        }
    }

    fn reset(&mut self) {
        self.rows = None;
        self.pos = 0;
        self.on_row = false;
    }

    fn clear_bindings(&mut self) {
        self.params.clear();
    }
}

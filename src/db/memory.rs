//! In-process backend for handler tests. Assigns ids and `created_at` on
//! insert, enforces the `team_id` foreign key and counts every call.

use async_trait::async_trait;
use chrono::{Duration, SecondsFormat, Utc};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use super::{DataAccess, DataError, Filter, Row, Select};

#[derive(Default)]
struct Tables {
    rows: BTreeMap<String, Vec<Row>>,
    next_id: i64,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    calls: AtomicUsize,
    fail_with: Option<String>,
}

impl MemoryStore {
    pub fn with_teams(teams: &[(i64, &str)]) -> Self {
        let store = MemoryStore::default();
        {
            let mut tables = store.tables.lock().unwrap();
            let rows = teams
                .iter()
                .map(|(id, name)| as_row(json!({ "id": id, "team_name": name })))
                .collect();
            tables.rows.insert("teams".to_string(), rows);
        }
        store
    }

    /// A backend on which every call fails with `message`.
    pub fn failing(message: &str) -> Self {
        MemoryStore {
            fail_with: Some(message.to_string()),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn enter(&self) -> Result<(), DataError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.fail_with {
            Some(message) => Err(DataError::Backend(message.clone())),
            None => Ok(()),
        }
    }
}

fn as_row(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        _ => Row::new(),
    }
}

fn matches(row: &Row, filter: &Filter) -> bool {
    row.get(&filter.column) == Some(&filter.value)
}

fn check_team(tables: &Tables, row: &Row) -> Result<(), DataError> {
    match row.get("team_id") {
        None | Some(Value::Null) => Ok(()),
        Some(team_id) => {
            let exists = tables
                .rows
                .get("teams")
                .map(|teams| teams.iter().any(|t| t.get("id") == Some(team_id)))
                .unwrap_or(false);
            if exists {
                Ok(())
            } else {
                Err(DataError::Backend(
                    "insert or update on table \"employees\" violates foreign key constraint \"employees_team_id_fkey\""
                        .to_string(),
                ))
            }
        }
    }
}

#[async_trait]
impl DataAccess for MemoryStore {
    async fn select(&self, query: &Select) -> Result<Vec<Row>, DataError> {
        self.enter()?;
        let tables = self.tables.lock().unwrap();
        let mut rows: Vec<Row> = tables
            .rows
            .get(&query.collection)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter(|row| query.filters.iter().all(|f| matches(row, f)))
            .collect();

        if let Some(order) = &query.order {
            rows.sort_by(|a, b| {
                let a = a.get(&order.column).map(Value::to_string).unwrap_or_default();
                let b = b.get(&order.column).map(Value::to_string).unwrap_or_default();
                if order.ascending { a.cmp(&b) } else { b.cmp(&a) }
            });
        }

        if let Some(join) = &query.join {
            let lookup = tables.rows.get(&join.collection).cloned().unwrap_or_default();
            for row in rows.iter_mut() {
                let related = row
                    .get(&join.foreign_key)
                    .and_then(|key| lookup.iter().find(|r| r.get("id") == Some(key)))
                    .map(|r| {
                        let picked: Row = join
                            .columns
                            .iter()
                            .map(|c| (c.clone(), r.get(c).cloned().unwrap_or(Value::Null)))
                            .collect();
                        Value::Object(picked)
                    })
                    .unwrap_or(Value::Null);
                row.insert(join.collection.clone(), related);
            }
        }

        Ok(rows)
    }

    async fn insert(&self, collection: &str, mut record: Row) -> Result<(), DataError> {
        self.enter()?;
        let mut tables = self.tables.lock().unwrap();
        check_team(&tables, &record)?;

        tables.next_id += 1;
        // Spread timestamps so ordering by creation is stable.
        let created_at = Utc::now() + Duration::milliseconds(tables.next_id);
        record.insert("id".to_string(), json!(tables.next_id));
        record.insert(
            "created_at".to_string(),
            json!(created_at.to_rfc3339_opts(SecondsFormat::Micros, true)),
        );
        tables
            .rows
            .entry(collection.to_string())
            .or_default()
            .push(record);
        Ok(())
    }

    async fn update(&self, collection: &str, patch: Row, filter: &Filter) -> Result<(), DataError> {
        self.enter()?;
        let mut tables = self.tables.lock().unwrap();
        check_team(&tables, &patch)?;
        if let Some(rows) = tables.rows.get_mut(collection) {
            for row in rows.iter_mut().filter(|row| matches(row, filter)) {
                for (column, value) in &patch {
                    row.insert(column.clone(), value.clone());
                }
            }
        }
        Ok(())
    }

    async fn delete(&self, collection: &str, filter: &Filter) -> Result<(), DataError> {
        self.enter()?;
        let mut tables = self.tables.lock().unwrap();
        if let Some(rows) = tables.rows.get_mut(collection) {
            rows.retain(|row| !matches(row, filter));
        }
        Ok(())
    }
}

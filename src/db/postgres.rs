//! Data access over a direct Postgres connection.
//!
//! Rows travel as JSON in both directions: reads are shaped with `to_jsonb`,
//! writes and filters are decoded with `jsonb_populate_record` against the
//! collection's own row type, so values keep their column types without
//! per-column binding.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};

use super::{DataAccess, DataError, Filter, Row, Select};

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> Result<Self, DataError> {
        let pool = PgPool::connect(database_url).await?;
        Ok(PgStore { pool })
    }
}

/// Quotes a collection or column name, rejecting anything but plain identifiers.
fn ident(name: &str) -> Result<String, DataError> {
    let mut chars = name.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(format!("\"{}\"", name))
    } else {
        Err(DataError::InvalidIdentifier(name.to_string()))
    }
}

fn populated(collection: &str) -> String {
    format!("jsonb_populate_record(NULL::{}", collection)
}

fn push_filter(
    builder: &mut QueryBuilder<'static, Postgres>,
    alias: &str,
    collection: &str,
    filter: &Filter,
) -> Result<(), DataError> {
    let column = ident(&filter.column)?;
    let mut record = Row::new();
    record.insert(filter.column.clone(), filter.value.clone());

    builder.push(format!(
        "{}{} = (SELECT {} FROM {}, ",
        alias,
        column,
        column,
        populated(collection)
    ));
    builder.push_bind(Json(Value::Object(record)));
    builder.push("))");
    Ok(())
}

pub fn select_query(query: &Select) -> Result<QueryBuilder<'static, Postgres>, DataError> {
    let collection = ident(&query.collection)?;

    let mut projection = if query.columns.iter().any(|c| c == "*") {
        "to_jsonb(c)".to_string()
    } else {
        let pairs = query
            .columns
            .iter()
            .map(|c| -> Result<String, DataError> { Ok(format!("'{}', c.{}", c, ident(c)?)) })
            .collect::<Result<Vec<_>, DataError>>()?;
        format!("jsonb_build_object({})", pairs.join(", "))
    };

    let mut from = format!(" FROM {} c", collection);

    if let Some(join) = &query.join {
        let pairs = join
            .columns
            .iter()
            .map(|c| -> Result<String, DataError> { Ok(format!("'{}', j.{}", c, ident(c)?)) })
            .collect::<Result<Vec<_>, DataError>>()?;
        projection.push_str(&format!(
            " || jsonb_build_object('{}', CASE WHEN j.\"id\" IS NULL THEN NULL ELSE jsonb_build_object({}) END)",
            join.collection,
            pairs.join(", ")
        ));
        from.push_str(&format!(
            " LEFT JOIN {} j ON j.\"id\" = c.{}",
            ident(&join.collection)?,
            ident(&join.foreign_key)?
        ));
    }

    let mut builder = QueryBuilder::new(format!("SELECT {}{}", projection, from));

    for (i, filter) in query.filters.iter().enumerate() {
        builder.push(if i == 0 { " WHERE " } else { " AND " });
        push_filter(&mut builder, "c.", &collection, filter)?;
    }

    if let Some(order) = &query.order {
        builder.push(format!(
            " ORDER BY c.{} {}",
            ident(&order.column)?,
            if order.ascending { "ASC" } else { "DESC" }
        ));
    }

    Ok(builder)
}

pub fn insert_query(collection: &str, record: Row) -> Result<QueryBuilder<'static, Postgres>, DataError> {
    let collection = ident(collection)?;
    let columns = record
        .keys()
        .map(|c| ident(c))
        .collect::<Result<Vec<_>, DataError>>()?
        .join(", ");

    let mut builder = QueryBuilder::new(format!(
        "INSERT INTO {} ({}) SELECT {} FROM {}, ",
        collection,
        columns,
        columns,
        populated(&collection)
    ));
    builder.push_bind(Json(Value::Object(record)));
    builder.push(")");
    Ok(builder)
}

pub fn update_query(
    collection: &str,
    patch: Row,
    filter: &Filter,
) -> Result<QueryBuilder<'static, Postgres>, DataError> {
    let collection = ident(collection)?;
    let columns = patch
        .keys()
        .map(|c| ident(c))
        .collect::<Result<Vec<_>, DataError>>()?
        .join(", ");

    let mut builder = QueryBuilder::new(format!(
        "UPDATE {} SET ({}) = (SELECT {} FROM {}, ",
        collection,
        columns,
        columns,
        populated(&collection)
    ));
    builder.push_bind(Json(Value::Object(patch)));
    builder.push(")) WHERE ");
    push_filter(&mut builder, "", &collection, filter)?;
    Ok(builder)
}

pub fn delete_query(collection: &str, filter: &Filter) -> Result<QueryBuilder<'static, Postgres>, DataError> {
    let collection = ident(collection)?;
    let mut builder = QueryBuilder::new(format!("DELETE FROM {} WHERE ", collection));
    push_filter(&mut builder, "", &collection, filter)?;
    Ok(builder)
}

#[async_trait]
impl DataAccess for PgStore {
    async fn select(&self, query: &Select) -> Result<Vec<Row>, DataError> {
        let mut builder = select_query(query)?;
        let rows = builder
            .build_query_scalar::<Json<Row>>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|Json(row)| row).collect())
    }

    async fn insert(&self, collection: &str, record: Row) -> Result<(), DataError> {
        let mut builder = insert_query(collection, record)?;
        builder.build().execute(&self.pool).await?;
        Ok(())
    }

    async fn update(&self, collection: &str, patch: Row, filter: &Filter) -> Result<(), DataError> {
        if patch.is_empty() {
            return Ok(());
        }
        let mut builder = update_query(collection, patch, filter)?;
        builder.build().execute(&self.pool).await?;
        Ok(())
    }

    async fn delete(&self, collection: &str, filter: &Filter) -> Result<(), DataError> {
        let mut builder = delete_query(collection, filter)?;
        builder.build().execute(&self.pool).await?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn select_with_join_filter_and_order() {
        let query = Select::from("employees")
            .join("teams", "team_id", &["team_name"])
            .filter(Filter::eq("id", 3))
            .order("created_at", true);

        let builder = select_query(&query).unwrap();
        assert_eq!(
            builder.sql(),
            "SELECT to_jsonb(c) || jsonb_build_object('teams', CASE WHEN j.\"id\" IS NULL THEN NULL \
             ELSE jsonb_build_object('team_name', j.\"team_name\") END) \
             FROM \"employees\" c LEFT JOIN \"teams\" j ON j.\"id\" = c.\"team_id\" \
             WHERE c.\"id\" = (SELECT \"id\" FROM jsonb_populate_record(NULL::\"employees\", $1)) \
             ORDER BY c.\"created_at\" ASC"
        );
    }

    #[test]
    fn select_named_columns() {
        let mut query = Select::from("teams");
        query.columns = vec!["id".to_string(), "team_name".to_string()];

        let builder = select_query(&query).unwrap();
        assert_eq!(
            builder.sql(),
            "SELECT jsonb_build_object('id', c.\"id\", 'team_name', c.\"team_name\") FROM \"teams\" c"
        );
    }

    #[test]
    fn update_writes_every_patched_column() {
        let patch = row(json!({ "email": "a@x.com", "team_id": null }));
        let builder = update_query("employees", patch, &Filter::eq("id", 9)).unwrap();
        assert_eq!(
            builder.sql(),
            "UPDATE \"employees\" SET (\"email\", \"team_id\") = \
             (SELECT \"email\", \"team_id\" FROM jsonb_populate_record(NULL::\"employees\", $1)) \
             WHERE \"id\" = (SELECT \"id\" FROM jsonb_populate_record(NULL::\"employees\", $2))"
        );
    }

    #[test]
    fn insert_and_delete_statements() {
        let record = row(json!({ "first_name": "Ana", "last_name": "Lee" }));
        let builder = insert_query("employees", record).unwrap();
        assert_eq!(
            builder.sql(),
            "INSERT INTO \"employees\" (\"first_name\", \"last_name\") \
             SELECT \"first_name\", \"last_name\" FROM jsonb_populate_record(NULL::\"employees\", $1)"
        );

        let builder = delete_query("employees", &Filter::eq("id", 1)).unwrap();
        assert_eq!(
            builder.sql(),
            "DELETE FROM \"employees\" WHERE \"id\" = \
             (SELECT \"id\" FROM jsonb_populate_record(NULL::\"employees\", $1))"
        );
    }

    #[test]
    fn rejects_unsafe_identifiers() {
        let err = delete_query("employees; DROP TABLE teams", &Filter::eq("id", 1)).err().unwrap();
        assert!(matches!(err, DataError::InvalidIdentifier(_)));

        let record = row(json!({ "bad\"col": 1 }));
        assert!(insert_query("employees", record).is_err());
    }
}

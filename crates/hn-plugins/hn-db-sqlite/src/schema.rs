//! # Index schema
//!
//! Table layouts are generated from the record field tables, so the index
//! stores exactly the fields the parser produces. Messages additionally
//! carry the `forum`, `msg` and `up` keys used for tree queries.

use chrono::{DateTime, Utc};
use hn_core::convert::convert;
use hn_core::error::{ArchiveError, Result};
use hn_core::fields::{
    FieldKind, FieldTable, FieldValue, FieldValues, FORUM_TABLE, MESSAGE_TABLE, PERSON_TABLE,
};
use hn_core::models::{Message, Record};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

/// Name of the supporting index on the parent-pointer column.
pub const PARENT_INDEX: &str = "idx_msgs_up";

pub struct Table {
    pub name: &'static str,
    pub fields: FieldTable,
    /// Extra leading TEXT NOT NULL columns
    pub keys: &'static [&'static str],
    pub primary_key: &'static str,
}

pub const FORUMS: Table = Table {
    name: "forums",
    fields: FORUM_TABLE,
    keys: &[],
    primary_key: "responses",
};

pub const MSGS: Table = Table {
    name: "msgs",
    fields: MESSAGE_TABLE,
    keys: &["forum", "msg", "up"],
    primary_key: "forum, msg",
};

pub const PEOPLE: Table = Table {
    name: "people",
    fields: PERSON_TABLE,
    keys: &[],
    primary_key: "user_id",
};

pub fn column_type(kind: FieldKind) -> &'static str {
    match kind {
        FieldKind::Int => "INTEGER",
        FieldKind::Date => "DATETIME",
        _ => "TEXT",
    }
}

impl Table {
    pub fn columns(&self) -> Vec<&'static str> {
        self.keys
            .iter()
            .copied()
            .chain(self.fields.iter().map(|spec| spec.name))
            .collect()
    }

    pub fn create_sql(&self) -> String {
        let mut columns: Vec<String> = self
            .keys
            .iter()
            .map(|key| format!("\"{key}\" TEXT NOT NULL"))
            .collect();
        for spec in self.fields.iter() {
            let null = if spec.is_optional() { "" } else { " NOT NULL" };
            columns.push(format!("\"{}\" {}{null}", spec.name, column_type(spec.kind)));
        }
        columns.push(format!("PRIMARY KEY ({})", self.primary_key));
        format!("CREATE TABLE {} (\n    {}\n)", self.name, columns.join(",\n    "))
    }

    pub fn insert_sql(&self) -> String {
        let columns = self.columns();
        let names: Vec<String> = columns.iter().map(|c| format!("\"{c}\"")).collect();
        let marks = vec!["?"; columns.len()].join(", ");
        format!(
            "INSERT INTO {} ({}) VALUES ({marks})",
            self.name,
            names.join(", ")
        )
    }

    /// `SELECT <field columns> FROM <table> <rest>`
    pub fn select_sql(&self, rest: &str) -> String {
        let names: Vec<String> = self
            .fields
            .iter()
            .map(|spec| format!("\"{}\"", spec.name))
            .collect();
        format!("SELECT {} FROM {} {rest}", names.join(", "), self.name)
    }
}

pub(crate) fn db_err(e: sqlx::Error) -> ArchiveError {
    ArchiveError::Database(e.to_string())
}

/// Insert one record; `keys` fills the table's key columns in order.
pub async fn insert(
    conn: &mut SqliteConnection,
    table: &Table,
    keys: &[&str],
    values: &FieldValues,
) -> Result<()> {
    let sql = table.insert_sql();
    let mut query = sqlx::query(&sql);
    for key in keys {
        query = query.bind(key.to_string());
    }
    for spec in table.fields.iter() {
        let value = values.get(spec.name);
        query = match spec.kind {
            FieldKind::Int => query.bind(value.and_then(FieldValue::as_int)),
            FieldKind::Date => query.bind(value.and_then(FieldValue::as_date)),
            _ => query.bind(value.map(FieldValue::to_token)),
        };
    }
    query.execute(conn).await.map_err(db_err)?;
    Ok(())
}

pub async fn insert_message(conn: &mut SqliteConnection, msg: &Message) -> Result<()> {
    insert(
        conn,
        &MSGS,
        &[msg.forum.as_str(), msg.msg.as_str(), msg.up.as_str()],
        &msg.to_values(),
    )
    .await
}

/// Rebuild a record from a row selected with [`Table::select_sql`].
pub fn read_record<R: Record>(row: &SqliteRow, table: &Table) -> Result<R> {
    let mut values = FieldValues::new(R::KIND, format!("{} row", table.name));
    for spec in table.fields.iter() {
        let value = match spec.kind {
            FieldKind::Int => row
                .try_get::<Option<i64>, _>(spec.name)
                .map_err(db_err)?
                .map(FieldValue::Int),
            FieldKind::Date => row
                .try_get::<Option<DateTime<Utc>>, _>(spec.name)
                .map_err(db_err)?
                .map(FieldValue::Date),
            kind => match row.try_get::<Option<String>, _>(spec.name).map_err(db_err)? {
                Some(token) => Some(
                    convert(kind, &token).map_err(|_| values.invalid(spec.name, &token))?,
                ),
                None => None,
            },
        };
        values.insert_opt(spec.name, value);
    }
    R::from_values(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn columns_follow_field_tables() {
        let sql = MSGS.create_sql();
        assert!(sql.starts_with("CREATE TABLE msgs ("));
        assert!(sql.contains("\"forum\" TEXT NOT NULL"));
        assert!(sql.contains("\"num\" INTEGER NOT NULL"));
        assert!(sql.contains("\"date\" DATETIME NOT NULL"));
        assert!(sql.contains("\"last_mod\" DATETIME,"));
        assert!(sql.contains("\"up_rel\" TEXT NOT NULL"));
        assert!(sql.contains("PRIMARY KEY (forum, msg)"));
        assert!(!sql.contains("url\" TEXT NOT NULL"));

        let forums = FORUMS.create_sql();
        assert!(forums.contains("\"num\" TEXT NOT NULL"));
        assert!(forums.contains("\"categories\" INTEGER,"));
    }

    #[test]
    fn insert_has_one_placeholder_per_column() {
        let sql = PEOPLE.insert_sql();
        assert_eq!(sql.matches('?').count(), PERSON_TABLE.iter().count());
        assert!(sql.contains("\"alt_user_i_ds\""));

        let sql = MSGS.insert_sql();
        assert_eq!(sql.matches('?').count(), MESSAGE_TABLE.iter().count() + 3);
    }

    #[test]
    fn select_lists_only_record_fields() {
        let sql = MSGS.select_sql("WHERE forum = ?");
        assert!(sql.starts_with("SELECT \"responses\", \"title\""));
        assert!(sql.ends_with("FROM msgs WHERE forum = ?"));
        assert!(!sql.contains("\"up\""));
    }
}

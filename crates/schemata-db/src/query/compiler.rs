//! SQL query AST and compiler.
//!
//! [`Query`] describes a single-table SELECT: the only shape the generic
//! instance engine ever issues, since records are flat and references are
//! never joined. [`SqlCompiler`] turns a query (or an INSERT / UPDATE /
//! DELETE description) into SQL with `?` placeholders plus an ordered list of
//! parameters. Identifiers are always double-quoted.

use super::lookups::{escape_like, Lookup, CASEFOLD_FN, LIKE_ESCAPE};
use crate::value::Value;
use schemata_core::SchemataError;

/// A column ordering direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    /// The column to order by.
    pub column: String,
    /// Whether to sort in descending order.
    pub descending: bool,
}

impl OrderBy {
    /// Creates an ascending order.
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: false,
        }
    }

    /// Creates a descending order.
    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: true,
        }
    }
}

/// A WHERE clause node in the query AST.
#[derive(Debug, Clone, PartialEq)]
pub enum WhereNode {
    /// A single condition.
    Condition {
        /// The column name.
        column: String,
        /// The lookup type.
        lookup: Lookup,
    },
    /// All children must hold. An empty list is always true.
    And(Vec<WhereNode>),
    /// At least one child must hold. An empty list is always false.
    Or(Vec<WhereNode>),
    /// Negation.
    Not(Box<WhereNode>),
}

impl WhereNode {
    /// Shorthand for a single condition.
    pub fn condition(column: impl Into<String>, lookup: Lookup) -> Self {
        Self::Condition {
            column: column.into(),
            lookup,
        }
    }

    /// Shorthand for `column = value`.
    pub fn exact(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::condition(column, Lookup::Exact(value.into()))
    }
}

/// A single-table SELECT.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    /// The table name.
    pub table: String,
    /// Columns to select; empty means `*`.
    pub select: Vec<String>,
    /// WHERE clause.
    pub where_clause: Option<WhereNode>,
    /// ORDER BY clauses, applied in order.
    pub order_by: Vec<OrderBy>,
    /// LIMIT.
    pub limit: Option<u64>,
    /// OFFSET.
    pub offset: Option<u64>,
}

impl Query {
    /// Creates a `SELECT *` query for the given table.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            select: Vec::new(),
            where_clause: None,
            order_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    /// Restricts the selected columns.
    #[must_use]
    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the WHERE clause.
    #[must_use]
    pub fn filter(mut self, node: WhereNode) -> Self {
        self.where_clause = Some(node);
        self
    }

    /// Appends an ORDER BY clause.
    #[must_use]
    pub fn order(mut self, order: OrderBy) -> Self {
        self.order_by.push(order);
        self
    }

    /// Sets LIMIT and OFFSET.
    #[must_use]
    pub const fn slice(mut self, limit: u64, offset: u64) -> Self {
        self.limit = Some(limit);
        self.offset = Some(offset);
        self
    }
}

/// A generic database row.
///
/// `Row` holds column names and their values in select order and provides
/// typed access via [`get`](Row::get).
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<Value>,
}

impl Row {
    /// Creates a new row from column names and values.
    ///
    /// # Panics
    ///
    /// Panics if the number of columns does not match the number of values.
    pub fn new(columns: Vec<String>, values: Vec<Value>) -> Self {
        assert_eq!(
            columns.len(),
            values.len(),
            "Row column count must match value count"
        );
        Self { columns, values }
    }

    /// Returns the column names.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Returns the number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Returns `true` if the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Gets a typed value by column name.
    ///
    /// # Errors
    ///
    /// Returns an error if the column does not exist or the value cannot be
    /// converted to the requested type.
    pub fn get<T: FromValue>(&self, column: &str) -> Result<T, SchemataError> {
        let value = self.get_value(column).ok_or_else(|| {
            SchemataError::DatabaseError(format!("Column '{column}' not found in row"))
        })?;
        T::from_value(value)
    }

    /// Returns a reference to the raw value at the given column name.
    pub fn get_value(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|idx| &self.values[idx])
    }

    /// Consumes the row, yielding `(column, value)` pairs in select order.
    pub fn into_pairs(self) -> impl Iterator<Item = (String, Value)> {
        self.columns.into_iter().zip(self.values)
    }
}

/// Trait for converting a [`Value`] to a concrete Rust type.
pub trait FromValue: Sized {
    /// Attempts to convert a value reference to this type.
    fn from_value(value: &Value) -> Result<Self, SchemataError>;
}

fn mismatch(expected: &str, value: &Value) -> SchemataError {
    SchemataError::DatabaseError(format!("Expected {expected}, got {value:?}"))
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Result<Self, SchemataError> {
        match value {
            Value::Int(i) => Ok(*i),
            Value::Bool(b) => Ok(Self::from(*b)),
            _ => Err(mismatch("integer", value)),
        }
    }
}

impl FromValue for u64 {
    fn from_value(value: &Value) -> Result<Self, SchemataError> {
        let i = i64::from_value(value)?;
        Self::try_from(i).map_err(|_| mismatch("non-negative integer", value))
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self, SchemataError> {
        value.as_float().ok_or_else(|| mismatch("float", value))
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self, SchemataError> {
        match value {
            Value::Bool(b) => Ok(*b),
            Value::Int(i) => Ok(*i != 0),
            _ => Err(mismatch("boolean", value)),
        }
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self, SchemataError> {
        match value {
            Value::String(s) => Ok(s.clone()),
            Value::Null => Err(mismatch("string", value)),
            other => Ok(other.to_string()),
        }
    }
}

impl FromValue for serde_json::Value {
    fn from_value(value: &Value) -> Result<Self, SchemataError> {
        match value {
            Value::Json(j) => Ok(j.clone()),
            Value::String(s) => serde_json::from_str(s)
                .map_err(|e| SchemataError::DatabaseError(format!("Invalid JSON column: {e}"))),
            Value::Null => Ok(Self::Null),
            _ => Err(mismatch("JSON", value)),
        }
    }
}

impl FromValue for chrono::DateTime<chrono::Utc> {
    fn from_value(value: &Value) -> Result<Self, SchemataError> {
        match value {
            Value::DateTime(dt) => Ok(*dt),
            Value::String(s) => chrono::DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&chrono::Utc))
                .map_err(|e| SchemataError::DatabaseError(format!("Invalid timestamp '{s}': {e}"))),
            _ => Err(mismatch("timestamp", value)),
        }
    }
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self, SchemataError> {
        Ok(value.clone())
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self, SchemataError> {
        match value {
            Value::Null => Ok(None),
            _ => T::from_value(value).map(Some),
        }
    }
}

/// Double-quotes an identifier, doubling any embedded quote.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// The SQL compiler translates query descriptions into parameterized SQL
/// using SQLite `?` placeholders.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlCompiler;

impl SqlCompiler {
    /// Creates a new compiler.
    pub const fn new() -> Self {
        Self
    }

    /// Compiles a SELECT query into SQL and parameters.
    pub fn compile_select(&self, query: &Query) -> (String, Vec<Value>) {
        let mut params = Vec::new();
        let columns = if query.select.is_empty() {
            "*".to_string()
        } else {
            query
                .select
                .iter()
                .map(|c| quote_ident(c))
                .collect::<Vec<_>>()
                .join(", ")
        };
        let mut sql = format!("SELECT {columns} FROM {}", quote_ident(&query.table));

        if let Some(ref where_clause) = query.where_clause {
            sql.push_str(" WHERE ");
            self.compile_where_node(where_clause, &mut sql, &mut params);
        }

        if !query.order_by.is_empty() {
            let orders: Vec<String> = query
                .order_by
                .iter()
                .map(|o| {
                    let dir = if o.descending { "DESC" } else { "ASC" };
                    format!("{} {dir}", quote_ident(&o.column))
                })
                .collect();
            sql.push_str(&format!(" ORDER BY {}", orders.join(", ")));
        }

        match (query.limit, query.offset) {
            (Some(limit), Some(offset)) => sql.push_str(&format!(" LIMIT {limit} OFFSET {offset}")),
            (Some(limit), None) => sql.push_str(&format!(" LIMIT {limit}")),
            // SQLite requires a LIMIT before OFFSET.
            (None, Some(offset)) => sql.push_str(&format!(" LIMIT -1 OFFSET {offset}")),
            (None, None) => {}
        }

        (sql, params)
    }

    /// Compiles `SELECT COUNT(*) AS "count"` over the query's table and WHERE
    /// clause. Ordering and slicing are ignored.
    pub fn compile_count(&self, query: &Query) -> (String, Vec<Value>) {
        let mut params = Vec::new();
        let mut sql = format!(
            "SELECT COUNT(*) AS \"count\" FROM {}",
            quote_ident(&query.table)
        );
        if let Some(ref where_clause) = query.where_clause {
            sql.push_str(" WHERE ");
            self.compile_where_node(where_clause, &mut sql, &mut params);
        }
        (sql, params)
    }

    /// Compiles an INSERT statement.
    pub fn compile_insert(&self, table: &str, fields: &[(String, Value)]) -> (String, Vec<Value>) {
        if fields.is_empty() {
            return (format!("INSERT INTO {} DEFAULT VALUES", quote_ident(table)), Vec::new());
        }
        let columns: Vec<String> = fields.iter().map(|(name, _)| quote_ident(name)).collect();
        let placeholders = vec!["?"; fields.len()].join(", ");
        let params = fields.iter().map(|(_, v)| v.clone()).collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({placeholders})",
            quote_ident(table),
            columns.join(", ")
        );
        (sql, params)
    }

    /// Compiles an UPDATE statement.
    pub fn compile_update(
        &self,
        table: &str,
        fields: &[(String, Value)],
        where_clause: &WhereNode,
    ) -> (String, Vec<Value>) {
        let mut params: Vec<Value> = fields.iter().map(|(_, v)| v.clone()).collect();
        let set_parts: Vec<String> = fields
            .iter()
            .map(|(name, _)| format!("{} = ?", quote_ident(name)))
            .collect();
        let mut sql = format!(
            "UPDATE {} SET {} WHERE ",
            quote_ident(table),
            set_parts.join(", ")
        );
        self.compile_where_node(where_clause, &mut sql, &mut params);
        (sql, params)
    }

    /// Compiles a DELETE statement.
    pub fn compile_delete(&self, table: &str, where_clause: &WhereNode) -> (String, Vec<Value>) {
        let mut params = Vec::new();
        let mut sql = format!("DELETE FROM {} WHERE ", quote_ident(table));
        self.compile_where_node(where_clause, &mut sql, &mut params);
        (sql, params)
    }

    fn compile_where_node(&self, node: &WhereNode, sql: &mut String, params: &mut Vec<Value>) {
        match node {
            WhereNode::Condition { column, lookup } => {
                Self::compile_lookup(column, lookup, sql, params);
            }
            WhereNode::And(children) => self.compile_junction(children, " AND ", "1=1", sql, params),
            WhereNode::Or(children) => self.compile_junction(children, " OR ", "1=0", sql, params),
            WhereNode::Not(inner) => {
                sql.push_str("NOT (");
                self.compile_where_node(inner, sql, params);
                sql.push(')');
            }
        }
    }

    fn compile_junction(
        &self,
        children: &[WhereNode],
        joiner: &str,
        empty: &str,
        sql: &mut String,
        params: &mut Vec<Value>,
    ) {
        if children.is_empty() {
            sql.push_str(empty);
            return;
        }
        sql.push('(');
        for (i, child) in children.iter().enumerate() {
            if i > 0 {
                sql.push_str(joiner);
            }
            self.compile_where_node(child, sql, params);
        }
        sql.push(')');
    }

    fn compile_lookup(column: &str, lookup: &Lookup, sql: &mut String, params: &mut Vec<Value>) {
        let col = quote_ident(column);
        match lookup {
            Lookup::Exact(Value::Null) | Lookup::IsNull(true) => {
                sql.push_str(&format!("{col} IS NULL"));
            }
            Lookup::IsNull(false) => sql.push_str(&format!("{col} IS NOT NULL")),
            Lookup::Exact(val) => {
                params.push(val.clone());
                sql.push_str(&format!("{col} = ?"));
            }
            Lookup::IContains(needle) => {
                let needle = escape_like(&needle.to_lowercase());
                params.push(Value::String(format!("%{needle}%")));
                sql.push_str(&format!("{CASEFOLD_FN}({col}) LIKE ? ESCAPE '{LIKE_ESCAPE}'"));
            }
            Lookup::In(vals) => {
                if vals.is_empty() {
                    sql.push_str("1=0");
                    return;
                }
                params.extend(vals.iter().cloned());
                let placeholders = vec!["?"; vals.len()].join(", ");
                sql.push_str(&format!("{col} IN ({placeholders})"));
            }
        }
    }
}

//! SQLite catalog queries over `PRAGMA` and `sqlite_master`.

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::escape::{quote_identifier, quote_string};
use crate::result::ResultSet;
use crate::schema::{
    DatabaseColumnConstraint, DatabaseSchemaItem, DatabaseSchemas, DatabaseTableColumn,
    DatabaseTableConstraint, DatabaseTableSchema, DatabaseTriggerSchema, ForeignKeyReference,
    ReferentialAction, SchemaItemKind, TableConstraintKind, TriggerOperation, TriggerTiming,
};
use crate::value::SqlValue;

use super::{lenient_bool, lenient_i64, lenient_opt_string, orphan_column, push_pk, SchemaIndex};

pub const DATABASES_QUERY: &str = "database list";
pub const OBJECTS_QUERY: &str = "objects";
pub const COLUMNS_QUERY: &str = "table info";
pub const TRIGGER_QUERY: &str = "trigger";

pub const DATABASES_SQL: &str = "PRAGMA database_list";

const USER_OBJECTS: &str = "name NOT LIKE 'sqlite\\_%' ESCAPE '\\'";

fn master(schema: &str) -> String {
    format!("{}.sqlite_master", quote_identifier(schema, '"'))
}

/// Tables, views and triggers of one attached database.
#[must_use]
pub fn objects_sql(schema: &str) -> String {
    format!(
        "SELECT type, name, tbl_name, sql FROM {} \
         WHERE type IN ('table', 'view', 'trigger') AND {USER_OBJECTS}",
        master(schema)
    )
}

/// Columns of every table and view of one database in a single query,
/// through the `pragma_table_info` table-valued function.
#[must_use]
pub fn columns_sql(schema: &str) -> String {
    format!(
        "SELECT m.name AS table_name, p.cid, p.name, p.type, p.\"notnull\", p.dflt_value, p.pk \
         FROM {} AS m JOIN pragma_table_info(m.name, {}) AS p \
         WHERE m.type IN ('table', 'view') AND m.{USER_OBJECTS} \
         ORDER BY m.name, p.cid",
        master(schema),
        quote_string(schema)
    )
}

/// Columns of one table, for engines without table-valued pragmas.
#[must_use]
pub fn table_info_sql(schema: &str, table: &str) -> String {
    format!(
        "PRAGMA {}.table_info({})",
        quote_identifier(schema, '"'),
        quote_identifier(table, '"')
    )
}

/// The CREATE statement of one table.
#[must_use]
pub fn table_sql_sql(schema: &str, table: &str) -> String {
    format!(
        "SELECT type, name, tbl_name, sql FROM {} WHERE type IN ('table', 'view') AND name = {}",
        master(schema),
        quote_string(table)
    )
}

#[must_use]
pub fn trigger_sql(schema: &str, name: &str) -> String {
    format!(
        "SELECT type, name, tbl_name, sql FROM {} WHERE type = 'trigger' AND name = {}",
        master(schema),
        quote_string(name)
    )
}

// ================================================================
// Rows
// ================================================================

#[derive(Debug, Deserialize)]
struct DatabaseRow {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ObjectRow {
    #[serde(rename = "type")]
    kind: String,
    name: String,
    tbl_name: String,
    #[serde(default)]
    sql: Option<String>,
}

impl ObjectRow {
    fn item_kind(&self) -> Option<SchemaItemKind> {
        match self.kind.as_str() {
            "table" => Some(SchemaItemKind::Table),
            "view" => Some(SchemaItemKind::View),
            "trigger" => Some(SchemaItemKind::Trigger),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ColumnRow {
    #[serde(default)]
    table_name: Option<String>,
    #[serde(deserialize_with = "lenient_i64")]
    cid: i64,
    name: String,
    #[serde(rename = "type", default)]
    column_type: String,
    #[serde(rename = "notnull", deserialize_with = "lenient_bool")]
    not_null: bool,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    dflt_value: Option<String>,
    #[serde(deserialize_with = "lenient_i64")]
    pk: i64,
}

impl ColumnRow {
    fn to_column(&self) -> DatabaseTableColumn {
        let (default_value, default_expression) = match self.dflt_value.as_deref() {
            Some(default) => parse_default(default),
            None => (None, None),
        };
        DatabaseTableColumn::new(&self.name, &self.column_type).with_constraint(
            DatabaseColumnConstraint {
                not_null: self.not_null,
                default_value,
                default_expression,
                primary_key: self.pk > 0,
                ..DatabaseColumnConstraint::default()
            },
        )
    }
}

/// Splits a `dflt_value` into a literal or an expression. String and
/// numeric literals become values; anything else is kept as written.
fn parse_default(text: &str) -> (Option<SqlValue>, Option<String>) {
    let trimmed = text.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('\'') && trimmed.ends_with('\'') {
        let inner = &trimmed[1..trimmed.len() - 1];
        if !inner.replace("''", "").contains('\'') {
            return (Some(SqlValue::Text(inner.replace("''", "'"))), None);
        }
    }
    if trimmed.eq_ignore_ascii_case("NULL") {
        return (Some(SqlValue::Null), None);
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return (Some(SqlValue::Int(i)), None);
    }
    if trimmed.contains('.') {
        if let Ok(f) = trimmed.parse::<f64>() {
            if f.is_finite() {
                return (Some(SqlValue::Float(f)), None);
            }
        }
    }
    (None, Some(trimmed.to_string()))
}

/// Builds one table from `table_info` rows and its CREATE statement.
fn fold_table(table: &mut DatabaseTableSchema, rows: &[ColumnRow], create_sql: Option<&str>) {
    let mut rows: Vec<&ColumnRow> = rows.iter().collect();
    rows.sort_by_key(|row| row.cid);
    for row in &rows {
        table.columns.push(row.to_column());
    }

    let mut keys: Vec<&ColumnRow> = rows.iter().copied().filter(|row| row.pk > 0).collect();
    keys.sort_by_key(|row| row.pk);
    for row in &keys {
        push_pk(table, &row.name);
    }

    let Some(sql) = create_sql else {
        return;
    };
    let definition = parse_table_definition(sql);

    for (name, clauses) in definition.columns {
        let Some(column) = table
            .columns
            .iter_mut()
            .find(|c| c.name.eq_ignore_ascii_case(&name))
        else {
            continue;
        };
        let mut constraint = column.constraint_or_default();
        constraint.unique |= clauses.unique;
        if clauses.check_expression.is_some() {
            constraint.check_expression = clauses.check_expression;
        }
        if clauses.foreign_key.is_some() {
            constraint.foreign_key = clauses.foreign_key;
        }
        column.constraint = constraint.into_option();
    }
    table.constraints.extend(definition.constraints);
    table.opaque_clauses.extend(definition.opaque_clauses);

    // AUTOINCREMENT is only valid on a single INTEGER PRIMARY KEY.
    if let ([pk], true) = (table.pk.as_slice(), definition.autoincrement) {
        let pk = pk.clone();
        if let Some(column) = table.columns.iter_mut().find(|c| c.name == pk) {
            let mut constraint = column.constraint_or_default();
            constraint.auto_increment = true;
            column.constraint = constraint.into_option();
            table.auto_increment = true;
        }
    }
}

// ================================================================
// Folding
// ================================================================

/// Attached database names from `PRAGMA database_list`, `temp` excluded.
///
/// # Errors
///
/// Returns [`Error::IncompleteMetadata`] when a row lacks a name.
pub fn schema_names(databases: &ResultSet) -> Result<Vec<String>> {
    Ok(databases
        .decode_rows::<DatabaseRow>(DATABASES_QUERY)?
        .into_iter()
        .map(|row| row.name)
        .filter(|name| name != "temp")
        .collect())
}

/// Tables and views listed in an [`objects_sql`] result.
///
/// # Errors
///
/// Returns [`Error::IncompleteMetadata`] when a row lacks a required field.
pub fn table_names(objects: &ResultSet) -> Result<Vec<String>> {
    Ok(objects
        .decode_rows::<ObjectRow>(OBJECTS_QUERY)?
        .into_iter()
        .filter(|row| {
            matches!(
                row.item_kind(),
                Some(SchemaItemKind::Table | SchemaItemKind::View)
            )
        })
        .map(|row| row.name)
        .collect())
}

/// Column listing of one database.
#[derive(Debug, Clone)]
pub enum TableColumns {
    /// One [`columns_sql`] result covering every table.
    Joined(ResultSet),
    /// One [`table_info_sql`] result per table name.
    PerTable(Vec<(String, ResultSet)>),
}

/// Catalog results of one attached database.
#[derive(Debug, Clone)]
pub struct SchemaCatalog {
    pub schema: String,
    pub objects: ResultSet,
    pub columns: TableColumns,
}

/// Folds per-database catalogs into [`DatabaseSchemas`].
///
/// # Errors
///
/// Returns [`Error::IncompleteMetadata`] when a row lacks a required field.
pub fn build_schemas(catalogs: &[SchemaCatalog]) -> Result<DatabaseSchemas> {
    let mut index = SchemaIndex::default();
    for catalog in catalogs {
        index.add_schema(&catalog.schema);
        let objects = catalog.objects.decode_rows::<ObjectRow>(OBJECTS_QUERY)?;
        let mut create_sql = std::collections::BTreeMap::new();
        for row in &objects {
            let item = match row.item_kind() {
                Some(SchemaItemKind::Trigger) => {
                    DatabaseSchemaItem::trigger(&catalog.schema, &row.name, &row.tbl_name)
                }
                Some(kind) => {
                    if let Some(sql) = &row.sql {
                        create_sql.insert(row.name.as_str(), sql.as_str());
                    }
                    DatabaseSchemaItem::table(kind, &catalog.schema, &row.name)
                }
                None => continue,
            };
            index.add_item(item);
        }

        let mut grouped: std::collections::BTreeMap<String, Vec<ColumnRow>> =
            std::collections::BTreeMap::new();
        match &catalog.columns {
            TableColumns::Joined(result) => {
                for row in result.decode_rows::<ColumnRow>(COLUMNS_QUERY)? {
                    let Some(table) = row.table_name.clone() else {
                        return Err(Error::incomplete(
                            COLUMNS_QUERY,
                            "missing field `table_name`",
                        ));
                    };
                    grouped.entry(table).or_default().push(row);
                }
            }
            TableColumns::PerTable(results) => {
                for (table, result) in results {
                    grouped
                        .entry(table.clone())
                        .or_default()
                        .extend(result.decode_rows::<ColumnRow>(COLUMNS_QUERY)?);
                }
            }
        }

        for (table_name, rows) in grouped {
            let sql = create_sql.get(table_name.as_str()).copied();
            match index.table_mut(&catalog.schema, &table_name) {
                Some(table) => fold_table(table, &rows, sql),
                None => {
                    for row in &rows {
                        orphan_column(&catalog.schema, &table_name, &row.name);
                    }
                }
            }
        }
    }
    Ok(index.finish())
}

/// Folds one table from its [`table_info_sql`] and [`table_sql_sql`]
/// results.
///
/// # Errors
///
/// Returns [`Error::IncompleteMetadata`] when a row lacks a required field.
pub fn build_table_schema(
    schema: &str,
    table: &str,
    columns: &ResultSet,
    definition: &ResultSet,
) -> Result<DatabaseTableSchema> {
    let rows = columns.decode_rows::<ColumnRow>(COLUMNS_QUERY)?;
    let objects = definition.decode_rows::<ObjectRow>(OBJECTS_QUERY)?;
    let create_sql = objects.iter().find_map(|row| row.sql.as_deref());
    let mut result = DatabaseTableSchema::new(schema, table);
    fold_table(&mut result, &rows, create_sql);
    Ok(result)
}

// ================================================================
// Trigger parsing
// ================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Word(String),
    Quoted(String),
    Punct(char),
}

impl Token {
    fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self, Self::Word(w) if w.eq_ignore_ascii_case(keyword))
    }

    fn text(&self) -> String {
        match self {
            Self::Word(w) | Self::Quoted(w) => w.clone(),
            Self::Punct(c) => c.to_string(),
        }
    }
}

/// Splits SQL into tokens, paired with the byte offset just past each.
/// Comments are skipped and quoted names are unquoted.
fn tokenize_with_offsets(sql: &str) -> Vec<(Token, usize)> {
    let bytes = sql.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        if c.is_ascii_whitespace() {
            i += 1;
        } else if sql[i..].starts_with("--") {
            i = sql[i..].find('\n').map_or(bytes.len(), |n| i + n + 1);
        } else if sql[i..].starts_with("/*") {
            i = sql[i + 2..]
                .find("*/")
                .map_or(bytes.len(), |n| i + 2 + n + 2);
        } else if matches!(c, b'"' | b'`' | b'\'' | b'[') {
            let close = if c == b'[' { b']' } else { c };
            let mut text = Vec::new();
            let mut j = i + 1;
            while j < bytes.len() {
                if bytes[j] == close {
                    if close != b']' && bytes.get(j + 1) == Some(&close) {
                        text.push(close);
                        j += 2;
                        continue;
                    }
                    break;
                }
                text.push(bytes[j]);
                j += 1;
            }
            let end = (j + 1).min(bytes.len());
            tokens.push((
                Token::Quoted(String::from_utf8_lossy(&text).into_owned()),
                end,
            ));
            i = end;
        } else if c.is_ascii_alphanumeric() || c == b'_' || !c.is_ascii() {
            let start = i;
            while i < bytes.len()
                && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_' || !bytes[i].is_ascii())
            {
                i += 1;
            }
            tokens.push((Token::Word(sql[start..i].to_string()), i));
        } else {
            tokens.push((Token::Punct(char::from(c)), i + 1));
            i += 1;
        }
    }
    tokens
}

// ================================================================
// Table definition parsing
// ================================================================

type Spanned = (Token, usize);

/// Column attributes `table_info` does not report.
#[derive(Debug, Default, PartialEq, Eq)]
struct ColumnClauses {
    unique: bool,
    check_expression: Option<String>,
    foreign_key: Option<ForeignKeyReference>,
}

/// What a CREATE TABLE statement adds to the `table_info` rows.
#[derive(Debug, Default, PartialEq, Eq)]
struct TableDefinition {
    columns: Vec<(String, ColumnClauses)>,
    constraints: Vec<DatabaseTableConstraint>,
    opaque_clauses: Vec<String>,
    autoincrement: bool,
}

/// Keywords opening a column constraint; everything before the first one
/// is the type name.
const COLUMN_CONSTRAINTS: [&str; 11] = [
    "CONSTRAINT",
    "PRIMARY",
    "NOT",
    "NULL",
    "UNIQUE",
    "CHECK",
    "DEFAULT",
    "COLLATE",
    "REFERENCES",
    "GENERATED",
    "AS",
];

const TABLE_CONSTRAINTS: [&str; 5] = ["CONSTRAINT", "PRIMARY", "UNIQUE", "CHECK", "FOREIGN"];

fn keyword_at(tokens: &[Spanned], idx: usize, keyword: &str) -> bool {
    tokens
        .get(idx)
        .is_some_and(|(token, _)| token.is_keyword(keyword))
}

fn punct_at(tokens: &[Spanned], idx: usize, c: char) -> bool {
    tokens
        .get(idx)
        .is_some_and(|(token, _)| *token == Token::Punct(c))
}

/// Index of the parenthesis closing the one at `open`.
fn closing_paren(tokens: &[Spanned], open: usize) -> Option<usize> {
    if !punct_at(tokens, open, '(') {
        return None;
    }
    let mut depth = 0usize;
    for (idx, (token, _)) in tokens.iter().enumerate().skip(open) {
        match token {
            Token::Punct('(') => depth += 1,
            Token::Punct(')') => {
                depth -= 1;
                if depth == 0 {
                    return Some(idx);
                }
            }
            _ => {}
        }
    }
    None
}

/// Splits `tokens` at commas outside parentheses.
fn split_top_level(tokens: &[Spanned]) -> Vec<&[Spanned]> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (idx, (token, _)) in tokens.iter().enumerate() {
        match token {
            Token::Punct('(') => depth += 1,
            Token::Punct(')') => depth = depth.saturating_sub(1),
            Token::Punct(',') if depth == 0 => {
                parts.push(&tokens[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    if start < tokens.len() {
        parts.push(&tokens[start..]);
    }
    parts
}

/// Source text between the parentheses at `open` and `close`.
fn inner_text<'s>(sql: &'s str, tokens: &[Spanned], open: usize, close: usize) -> &'s str {
    sql[tokens[open].1..tokens[close].1 - 1].trim()
}

/// Plain column names between the parentheses at `open` and `close`, or
/// `None` when an entry carries more than a name (COLLATE, ASC, ...).
fn name_list(tokens: &[Spanned], open: usize, close: usize) -> Option<Vec<String>> {
    split_top_level(&tokens[open + 1..close])
        .into_iter()
        .map(|entry| match entry {
            [(token @ (Token::Word(_) | Token::Quoted(_)), _)] => Some(token.text()),
            _ => None,
        })
        .collect()
}

/// Parses the `ON DELETE` / `ON UPDATE` action starting at `idx`.
fn referential_action(tokens: &[Spanned], idx: usize) -> Option<(ReferentialAction, usize)> {
    let first = tokens.get(idx)?.0.text();
    let two_words = first.eq_ignore_ascii_case("SET") || first.eq_ignore_ascii_case("NO");
    if two_words {
        let second = tokens.get(idx + 1)?.0.text();
        ReferentialAction::parse(&format!("{first} {second}")).map(|action| (action, idx + 2))
    } else {
        ReferentialAction::parse(&first).map(|action| (action, idx + 1))
    }
}

/// Parses `table [(columns)] [ON DELETE ..] [ON UPDATE ..]` starting at
/// `idx`, right after `REFERENCES`. Returns the index past the clause.
fn parse_references(
    tokens: &[Spanned],
    mut idx: usize,
    opaque: &mut Vec<String>,
    owner: &str,
) -> (Option<ForeignKeyReference>, usize) {
    let Some((table, _)) = tokens.get(idx) else {
        opaque.push(format!("REFERENCES without a table on {owner}"));
        return (None, idx);
    };
    let mut reference = ForeignKeyReference::new(table.text(), &[]);
    idx += 1;

    if let Some(close) = closing_paren(tokens, idx) {
        match name_list(tokens, idx, close) {
            Some(columns) => reference.columns = columns,
            None => opaque.push(format!("referenced column expression on {owner}")),
        }
        idx = close + 1;
    }

    while keyword_at(tokens, idx, "ON") {
        let event = tokens
            .get(idx + 1)
            .map(|(token, _)| token.text())
            .unwrap_or_default();
        let Some((action, next)) = referential_action(tokens, idx + 2) else {
            opaque.push(format!("ON {event} clause on {owner}"));
            return (Some(reference), tokens.len());
        };
        let action = (action != ReferentialAction::NoAction).then_some(action);
        if event.eq_ignore_ascii_case("DELETE") {
            reference.on_delete = action;
        } else if event.eq_ignore_ascii_case("UPDATE") {
            reference.on_update = action;
        } else {
            opaque.push(format!("ON {event} clause on {owner}"));
        }
        idx = next;
    }

    if keyword_at(tokens, idx, "MATCH")
        || keyword_at(tokens, idx, "DEFERRABLE")
        || (keyword_at(tokens, idx, "NOT") && keyword_at(tokens, idx + 1, "DEFERRABLE"))
    {
        opaque.push(format!("foreign key deferral or MATCH clause on {owner}"));
        return (Some(reference), tokens.len());
    }
    (Some(reference), idx)
}

/// Skips an `ON CONFLICT` clause at `idx`, recording it as opaque.
fn skip_conflict_clause(
    tokens: &[Spanned],
    idx: usize,
    opaque: &mut Vec<String>,
    owner: &str,
) -> usize {
    if keyword_at(tokens, idx, "ON") && keyword_at(tokens, idx + 1, "CONFLICT") {
        opaque.push(format!("ON CONFLICT clause on {owner}"));
        idx + 3
    } else {
        idx
    }
}

fn parse_column_definition(sql: &str, tokens: &[Spanned], definition: &mut TableDefinition) {
    let name = tokens[0].0.text();
    let owner = format!("column '{name}'");
    let mut clauses = ColumnClauses::default();
    let opaque = &mut definition.opaque_clauses;

    let starts_constraint = |token: &Token| {
        COLUMN_CONSTRAINTS
            .iter()
            .any(|keyword| token.is_keyword(keyword))
    };
    let mut idx = 1;
    while idx < tokens.len() && !starts_constraint(&tokens[idx].0) {
        idx = closing_paren(tokens, idx).unwrap_or(idx) + 1;
    }

    while idx < tokens.len() {
        let token = &tokens[idx].0;
        if token.is_keyword("PRIMARY") {
            idx += 2;
            if keyword_at(tokens, idx, "ASC") || keyword_at(tokens, idx, "DESC") {
                idx += 1;
            }
            idx = skip_conflict_clause(tokens, idx, opaque, &owner);
            if keyword_at(tokens, idx, "AUTOINCREMENT") {
                definition.autoincrement = true;
                idx += 1;
            }
        } else if token.is_keyword("NOT") {
            idx = skip_conflict_clause(tokens, idx + 2, opaque, &owner);
        } else if token.is_keyword("NULL") {
            idx = skip_conflict_clause(tokens, idx + 1, opaque, &owner);
        } else if token.is_keyword("UNIQUE") {
            clauses.unique = true;
            idx = skip_conflict_clause(tokens, idx + 1, opaque, &owner);
        } else if token.is_keyword("CHECK") {
            let Some(close) = closing_paren(tokens, idx + 1) else {
                opaque.push(format!("unbalanced CHECK on {owner}"));
                break;
            };
            clauses.check_expression = Some(inner_text(sql, tokens, idx + 1, close).to_string());
            idx = close + 1;
        } else if token.is_keyword("DEFAULT") {
            idx += 1;
            if let Some(close) = closing_paren(tokens, idx) {
                idx = close + 1;
            } else if punct_at(tokens, idx, '-') || punct_at(tokens, idx, '+') {
                idx += 2;
            } else {
                idx += 1;
            }
            // Decimal literals split into `1`, `.`, `5`.
            while punct_at(tokens, idx, '.') {
                idx += 2;
            }
        } else if token.is_keyword("REFERENCES") {
            let (reference, next) = parse_references(tokens, idx + 1, opaque, &owner);
            clauses.foreign_key = reference;
            idx = next;
        } else if ["CONSTRAINT", "COLLATE", "GENERATED", "AS"]
            .iter()
            .any(|keyword| token.is_keyword(keyword))
        {
            // Named column constraints, collations and generated columns.
            opaque.push(format!("{} on {owner}", token.text().to_ascii_uppercase()));
            break;
        } else {
            idx += 1;
        }
    }

    definition.columns.push((name, clauses));
}

fn parse_table_constraint(sql: &str, tokens: &[Spanned], definition: &mut TableDefinition) {
    let mut idx = 0;
    let mut name = None;
    if keyword_at(tokens, 0, "CONSTRAINT") {
        name = tokens.get(1).map(|(token, _)| token.text());
        idx = 2;
    }
    let owner = format!(
        "table constraint{}",
        name.as_ref().map(|n| format!(" '{n}'")).unwrap_or_default()
    );
    let opaque = &mut definition.opaque_clauses;

    let kind = if keyword_at(tokens, idx, "PRIMARY") {
        // The key itself comes from `table_info`.
        if name.is_some() {
            opaque.push(format!("name of the primary key {owner}"));
        }
        if let Some(close) = closing_paren(tokens, idx + 2) {
            if name_list(tokens, idx + 2, close).is_none() {
                opaque.push(format!("primary key column expression on {owner}"));
            }
            skip_conflict_clause(tokens, close + 1, opaque, &owner);
        }
        return;
    } else if keyword_at(tokens, idx, "UNIQUE") {
        let Some(close) = closing_paren(tokens, idx + 1) else {
            opaque.push(format!("unbalanced UNIQUE on {owner}"));
            return;
        };
        let Some(columns) = name_list(tokens, idx + 1, close) else {
            opaque.push(format!("UNIQUE over expressions on {owner}"));
            return;
        };
        skip_conflict_clause(tokens, close + 1, opaque, &owner);
        TableConstraintKind::Unique { columns }
    } else if keyword_at(tokens, idx, "CHECK") {
        let Some(close) = closing_paren(tokens, idx + 1) else {
            opaque.push(format!("unbalanced CHECK on {owner}"));
            return;
        };
        TableConstraintKind::Check {
            expression: inner_text(sql, tokens, idx + 1, close).to_string(),
        }
    } else if keyword_at(tokens, idx, "FOREIGN") {
        let open = idx + 2;
        let columns = closing_paren(tokens, open)
            .and_then(|close| name_list(tokens, open, close).map(|columns| (columns, close)));
        let Some((columns, close)) = columns else {
            opaque.push(format!("FOREIGN KEY columns on {owner}"));
            return;
        };
        if !keyword_at(tokens, close + 1, "REFERENCES") {
            opaque.push(format!("FOREIGN KEY without REFERENCES on {owner}"));
            return;
        }
        let (reference, _) = parse_references(tokens, close + 2, opaque, &owner);
        let Some(references) = reference else {
            return;
        };
        TableConstraintKind::ForeignKey {
            columns,
            references,
        }
    } else {
        opaque.push(owner);
        return;
    };

    definition
        .constraints
        .push(DatabaseTableConstraint { name, kind });
}

/// Reads the constraints `table_info` leaves out from a CREATE TABLE
/// statement. Clauses the schema model cannot hold are listed as opaque.
fn parse_table_definition(sql: &str) -> TableDefinition {
    let tokens = tokenize_with_offsets(sql);
    let mut definition = TableDefinition::default();
    let Some(open) = tokens
        .iter()
        .position(|(token, _)| *token == Token::Punct('('))
    else {
        return definition;
    };
    let header = &tokens[..open];
    let is_table = header.iter().any(|(token, _)| token.is_keyword("TABLE"));
    if !is_table || header.iter().any(|(token, _)| token.is_keyword("AS")) {
        return definition;
    }
    if header.iter().any(|(token, _)| token.is_keyword("VIRTUAL")) {
        definition.opaque_clauses.push("VIRTUAL TABLE".to_string());
        return definition;
    }
    let Some(close) = closing_paren(&tokens, open) else {
        return definition;
    };

    for part in split_top_level(&tokens[open + 1..close]) {
        let Some((first, _)) = part.first() else {
            continue;
        };
        if TABLE_CONSTRAINTS
            .iter()
            .any(|keyword| first.is_keyword(keyword))
        {
            parse_table_constraint(sql, part, &mut definition);
        } else {
            parse_column_definition(sql, part, &mut definition);
        }
    }

    let options = sql[tokens[close].1..].trim().trim_end_matches(';').trim();
    if !options.is_empty() {
        definition.opaque_clauses.push(options.to_string());
    }
    definition
}

fn malformed(message: impl Into<String>) -> Error {
    Error::incomplete(TRIGGER_QUERY, message)
}

/// Parses `CREATE TRIGGER` text into its timing, operation and body.
fn parse_trigger_sql(sql: &str) -> Result<(TriggerTiming, TriggerOperation, String)> {
    let tokens = tokenize_with_offsets(sql);
    let begin = tokens
        .iter()
        .position(|(token, _)| token.is_keyword("BEGIN"))
        .ok_or_else(|| malformed("trigger has no BEGIN"))?;
    let header: Vec<&Token> = tokens[..begin].iter().map(|(token, _)| token).collect();

    let mut idx = header
        .iter()
        .position(|token| token.is_keyword("TRIGGER"))
        .ok_or_else(|| malformed("not a CREATE TRIGGER statement"))?
        + 1;
    if header.get(idx).is_some_and(|t| t.is_keyword("IF")) {
        idx += 3;
    }
    // [schema.]name
    idx += 1;
    if header.get(idx).is_some_and(|t| **t == Token::Punct('.')) {
        idx += 2;
    }

    let when = match header.get(idx) {
        Some(t) if t.is_keyword("BEFORE") => {
            idx += 1;
            TriggerTiming::Before
        }
        Some(t) if t.is_keyword("AFTER") => {
            idx += 1;
            TriggerTiming::After
        }
        Some(t) if t.is_keyword("INSTEAD") => {
            idx += 2;
            TriggerTiming::InsteadOf
        }
        _ => TriggerTiming::Before,
    };

    let operation = header
        .get(idx)
        .and_then(|t| TriggerOperation::parse(&t.text()))
        .ok_or_else(|| malformed("trigger has no INSERT, UPDATE or DELETE event"))?;

    let body_start = tokens[begin].1;
    let mut body = sql[body_start..].trim_end();
    body = body.strip_suffix(';').unwrap_or(body).trim_end();
    let upper = body.to_ascii_uppercase();
    if upper.ends_with("END") {
        body = &body[..body.len() - 3];
    }
    Ok((when, operation, body.trim().to_string()))
}

/// Builds a trigger from its [`trigger_sql`] result.
///
/// # Errors
///
/// Returns [`Error::IncompleteMetadata`] when the trigger is missing or its
/// CREATE statement cannot be read.
pub fn build_trigger(schema: &str, result: &ResultSet) -> Result<DatabaseTriggerSchema> {
    let row = result
        .decode_rows::<ObjectRow>(TRIGGER_QUERY)?
        .into_iter()
        .next()
        .ok_or_else(|| malformed("trigger not found"))?;
    let sql = row
        .sql
        .as_deref()
        .ok_or_else(|| malformed("trigger has no CREATE statement"))?;
    let (when, operation, statement) = parse_trigger_sql(sql)?;
    Ok(DatabaseTriggerSchema {
        name: row.name,
        schema_name: schema.to_string(),
        table_name: row.tbl_name,
        when,
        operation,
        statement,
    })
}

//! Table schema from a CQL `CREATE TABLE` statement
//!
//! Only what the loader needs is resolved: keyspace, table, column types and
//! the primary key. Table options after the column list are ignored.
//!
//! ```text
//! CREATE TABLE [IF NOT EXISTS] ks.table (
//!     id int PRIMARY KEY,
//!     tags list<text>,
//!     ...
//!     [PRIMARY KEY ((p1, p2), c1, ...)]
//! ) [WITH ...] [;]
//! ```

use crate::types::ColumnType;
use sqlparser::dialect::GenericDialect;
use sqlparser::tokenizer::{Token, Tokenizer, Word};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("cannot tokenize schema statement: {0}")]
    Tokenize(String),

    #[error("expected a CREATE TABLE statement")]
    NotCreateTable,

    #[error("expected {expected}, found '{found}'")]
    UnexpectedToken { expected: String, found: String },

    #[error("statement ended early, expected {0}")]
    UnexpectedEnd(String),

    #[error("table '{0}' is not qualified with a keyspace")]
    MissingKeyspace(String),

    #[error("table has no primary key")]
    MissingPrimaryKey,

    #[error("primary key is declared more than once")]
    MultiplePrimaryKeys,

    #[error("column '{0}' is declared more than once")]
    DuplicateColumn(String),

    #[error("primary key references undeclared column '{0}'")]
    UnknownPrimaryKeyColumn(String),

    #[error("column '{column}' does not exist in table {table}")]
    UnknownColumn { column: String, table: String },
}

/// One declared column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    /// Normalized CQL type text, e.g. `map<text, double>`
    pub cql_type: String,
    pub column_type: ColumnType,
}

/// Resolved table definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub keyspace: String,
    pub table: String,
    pub columns: Vec<ColumnDef>,
    pub partition_key: Vec<String>,
    pub clustering_key: Vec<String>,
}

impl TableSchema {
    pub fn parse(cql: &str) -> Result<Self, SchemaError> {
        let tokens = Tokenizer::new(&GenericDialect {}, cql)
            .tokenize()
            .map_err(|e| SchemaError::Tokenize(e.to_string()))?
            .into_iter()
            .filter(|t| !matches!(t, Token::Whitespace(_)))
            .collect();

        StatementParser::new(tokens).create_table()
    }

    /// `keyspace.table`
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", quote_ident(&self.keyspace), quote_ident(&self.table))
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_type(&self, name: &str) -> Option<ColumnType> {
        self.column(name).map(|c| c.column_type)
    }

    pub fn is_partition_key(&self, name: &str) -> bool {
        self.partition_key.iter().any(|k| k == name)
    }

    pub fn is_primary_key(&self, name: &str) -> bool {
        self.is_partition_key(name) || self.clustering_key.iter().any(|k| k == name)
    }

    /// Insert statement binding `columns` in the given order
    pub fn insert_statement(&self, columns: &[String]) -> Result<InsertStatement, SchemaError> {
        for column in columns {
            if self.column(column).is_none() {
                return Err(SchemaError::UnknownColumn {
                    column: column.clone(),
                    table: self.qualified_name(),
                });
            }
        }

        Ok(InsertStatement {
            keyspace: self.keyspace.clone(),
            table: self.table.clone(),
            columns: columns.to_vec(),
        })
    }
}

/// `INSERT INTO ks.table (a, b) VALUES (?, ?)`; the column order is the
/// order every submitted row must follow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertStatement {
    pub keyspace: String,
    pub table: String,
    pub columns: Vec<String>,
}

impl fmt::Display for InsertStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let columns: Vec<String> = self.columns.iter().map(|c| quote_ident(c)).collect();
        let markers = vec!["?"; self.columns.len()];
        write!(
            f,
            "INSERT INTO {}.{} ({}) VALUES ({})",
            quote_ident(&self.keyspace),
            quote_ident(&self.table),
            columns.join(", "),
            markers.join(", ")
        )
    }
}

/// Identifiers that would change under case folding are double-quoted
fn quote_ident(name: &str) -> String {
    let plain = name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if plain && !name.is_empty() {
        name.to_string()
    } else {
        format!("\"{}\"", name.replace('"', "\"\""))
    }
}

/// Resolve a normalized CQL type to its column type tag
pub fn resolve_type(base: &str, params: &[String]) -> ColumnType {
    match (base, params) {
        ("frozen", [inner]) => {
            let (base, params) = split_type(inner);
            resolve_type(&base, &params)
        },
        ("int", []) => ColumnType::Int32,
        ("varint", []) => ColumnType::VarInt,
        ("bigint" | "counter", []) => ColumnType::Int64,
        ("double", []) => ColumnType::Float64,
        ("float", []) => ColumnType::Float32,
        ("timestamp", []) => ColumnType::Timestamp,
        ("list", [_]) => ColumnType::ListText,
        ("set", [_]) => ColumnType::SetText,
        ("map", [key, value]) if is_text(key) && value == "double" => ColumnType::MapTextDouble,
        _ => ColumnType::Text,
    }
}

fn is_text(cql_type: &str) -> bool {
    matches!(cql_type, "text" | "varchar" | "ascii")
}

/// Split normalized type text `base<p1, p2>` into base and top-level params
fn split_type(text: &str) -> (String, Vec<String>) {
    let Some((base, rest)) = text.split_once('<') else {
        return (text.to_string(), Vec::new());
    };
    let inner = rest.strip_suffix('>').unwrap_or(rest);

    let mut params = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in inner.char_indices() {
        match c {
            '<' => depth += 1,
            '>' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                params.push(inner[start..i].trim().to_string());
                start = i + 1;
            },
            _ => {},
        }
    }
    params.push(inner[start..].trim().to_string());

    (base.to_string(), params)
}

enum ColumnOrKey {
    Column { def: ColumnDef, primary_key: bool },
    Key { partition: Vec<String>, clustering: Vec<String> },
}

/// Cursor over whitespace-free tokens
struct StatementParser {
    tokens: Vec<Token>,
    pos: usize,
    /// Pending `>` left over from splitting a `>>` token
    pending_gt: bool,
}

impl StatementParser {
    fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            pending_gt: false,
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).filter(|t| !matches!(t, Token::EOF))
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Word(w)) if w.quote_style.is_none() && w.value.eq_ignore_ascii_case(keyword))
    }

    fn consume_keyword(&mut self, keyword: &str) -> bool {
        if self.peek_keyword(keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<(), SchemaError> {
        if self.consume_keyword(keyword) {
            Ok(())
        } else {
            Err(self.unexpected(keyword))
        }
    }

    fn consume(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: Token) -> Result<(), SchemaError> {
        if self.consume(&expected) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("'{expected}'")))
        }
    }

    fn unexpected(&self, expected: &str) -> SchemaError {
        match self.peek() {
            Some(token) => SchemaError::UnexpectedToken {
                expected: expected.to_string(),
                found: token.to_string(),
            },
            None => SchemaError::UnexpectedEnd(expected.to_string()),
        }
    }

    /// Unquoted identifiers fold to lower case
    fn identifier(&mut self) -> Result<String, SchemaError> {
        match self.peek() {
            Some(Token::Word(Word {
                value, quote_style, ..
            })) => {
                let name = match quote_style {
                    Some(_) => value.clone(),
                    None => value.to_lowercase(),
                };
                self.pos += 1;
                Ok(name)
            },
            _ => Err(self.unexpected("an identifier")),
        }
    }

    fn create_table(mut self) -> Result<TableSchema, SchemaError> {
        if !self.consume_keyword("CREATE") {
            return Err(SchemaError::NotCreateTable);
        }
        if !(self.consume_keyword("TABLE") || self.consume_keyword("COLUMNFAMILY")) {
            return Err(SchemaError::NotCreateTable);
        }
        if self.consume_keyword("IF") {
            self.expect_keyword("NOT")?;
            self.expect_keyword("EXISTS")?;
        }

        let first = self.identifier()?;
        let (keyspace, table) = if self.consume(&Token::Period) {
            (first, self.identifier()?)
        } else {
            return Err(SchemaError::MissingKeyspace(first));
        };

        self.expect(Token::LParen)?;

        let mut columns: Vec<ColumnDef> = Vec::new();
        let mut names = HashSet::new();
        let mut primary_key: Option<(Vec<String>, Vec<String>)> = None;

        loop {
            match self.column_or_key()? {
                ColumnOrKey::Column { def, primary_key: inline } => {
                    if !names.insert(def.name.clone()) {
                        return Err(SchemaError::DuplicateColumn(def.name));
                    }
                    if inline {
                        if primary_key.is_some() {
                            return Err(SchemaError::MultiplePrimaryKeys);
                        }
                        primary_key = Some((vec![def.name.clone()], Vec::new()));
                    }
                    columns.push(def);
                },
                ColumnOrKey::Key {
                    partition,
                    clustering,
                } => {
                    if primary_key.is_some() {
                        return Err(SchemaError::MultiplePrimaryKeys);
                    }
                    primary_key = Some((partition, clustering));
                },
            }

            if self.consume(&Token::Comma) {
                // CQL tolerates a trailing comma before the closing paren
                if self.consume(&Token::RParen) {
                    break;
                }
                continue;
            }
            self.expect(Token::RParen)?;
            break;
        }

        let (partition_key, clustering_key) = primary_key.ok_or(SchemaError::MissingPrimaryKey)?;
        for key in partition_key.iter().chain(&clustering_key) {
            if !names.contains(key) {
                return Err(SchemaError::UnknownPrimaryKeyColumn(key.clone()));
            }
        }

        Ok(TableSchema {
            keyspace,
            table,
            columns,
            partition_key,
            clustering_key,
        })
    }

    fn column_or_key(&mut self) -> Result<ColumnOrKey, SchemaError> {
        if self.peek_keyword("PRIMARY") {
            self.pos += 1;
            self.expect_keyword("KEY")?;
            return self.key_definition();
        }

        let name = self.identifier()?;
        let cql_type = self.type_text()?;
        let (base, params) = split_type(&cql_type);
        let column_type = resolve_type(&base, &params);

        self.consume_keyword("STATIC");
        let primary_key = if self.consume_keyword("PRIMARY") {
            self.expect_keyword("KEY")?;
            true
        } else {
            false
        };

        Ok(ColumnOrKey::Column {
            def: ColumnDef {
                name,
                cql_type,
                column_type,
            },
            primary_key,
        })
    }

    /// `((p1, p2), c1, c2)` or `(p1, c1, c2)`
    fn key_definition(&mut self) -> Result<ColumnOrKey, SchemaError> {
        self.expect(Token::LParen)?;

        let partition = if self.consume(&Token::LParen) {
            let names = self.identifier_list()?;
            self.expect(Token::RParen)?;
            names
        } else {
            vec![self.identifier()?]
        };

        let mut clustering = Vec::new();
        while self.consume(&Token::Comma) {
            clustering.push(self.identifier()?);
        }
        self.expect(Token::RParen)?;

        Ok(ColumnOrKey::Key {
            partition,
            clustering,
        })
    }

    fn identifier_list(&mut self) -> Result<Vec<String>, SchemaError> {
        let mut names = vec![self.identifier()?];
        while self.consume(&Token::Comma) {
            names.push(self.identifier()?);
        }
        Ok(names)
    }

    /// Normalized type text: lower-cased, `", "` between parameters
    fn type_text(&mut self) -> Result<String, SchemaError> {
        let base = self.identifier()?.to_lowercase();
        if !self.consume(&Token::Lt) {
            return Ok(base);
        }

        let mut params = vec![self.type_text()?];
        // A split `>>` already closed this list
        while !self.pending_gt && self.consume(&Token::Comma) {
            params.push(self.type_text()?);
        }
        self.close_angle()?;

        Ok(format!("{base}<{}>", params.join(", ")))
    }

    /// `>`, or half of a `>>` the tokenizer read as a shift operator
    fn close_angle(&mut self) -> Result<(), SchemaError> {
        if self.pending_gt {
            self.pending_gt = false;
            return Ok(());
        }
        if self.consume(&Token::Gt) {
            return Ok(());
        }
        if self.consume(&Token::ShiftRight) {
            self.pending_gt = true;
            return Ok(());
        }
        Err(self.unexpected("'>'"))
    }
}

//! SQL parsing and validation logic.
//!
//! Uses sqlparser-rs with the SQLite dialect to split and classify the input,
//! then applies the text-level checks that do not trust the parser.

use sqlparser::ast::{Query, Select, SetExpr, Statement, TableFactor, TableWithJoins};
use sqlparser::dialect::SQLiteDialect;
use sqlparser::parser::Parser;
use sqlparser::tokenizer::{Token, Tokenizer};
use tracing::debug;

use super::blacklist::find_blocked_keyword;
use super::{GuardError, StatementKind};

/// Longest leading token echoed back in a prefix rejection.
const MAX_REPORTED_TOKEN: usize = 30;

/// Statement guard that validates SQL before it reaches the connection.
#[derive(Debug)]
pub struct SqlGuard {
    dialect: SQLiteDialect,
}

impl Default for SqlGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl SqlGuard {
    /// Creates a new guard.
    pub fn new() -> Self {
        Self {
            dialect: SQLiteDialect {},
        }
    }

    /// Validates `sql` and returns the normalized statement to execute.
    ///
    /// The checks run in a fixed order and the first failure wins:
    /// non-empty, single statement, statement kind and prefix, no embedded
    /// separators, keyword blacklist. The returned text is trimmed and has
    /// its trailing `;` removed; nothing else is altered.
    pub fn validate(&self, sql: &str) -> Result<String, GuardError> {
        let result = self.check(sql);
        if let Err(e) = &result {
            debug!("Guard rejected query: {e}");
        }
        result
    }

    fn check(&self, sql: &str) -> Result<String, GuardError> {
        let trimmed = sql.trim();
        if trimmed.is_empty() {
            return Err(GuardError::Empty);
        }

        match self.count_statements(trimmed)? {
            0 => return Err(GuardError::NoStatement),
            1 => {}
            n => return Err(GuardError::MultipleStatements(n)),
        }

        let leading = leading_token(trimmed);
        if let Some(kind) = self.parsed_kind(trimmed, &leading)? {
            if !kind.is_read_only() {
                return Err(GuardError::DisallowedStatement { kind });
            }
        }

        // The parser may not classify every CTE form, so the prefix is
        // checked on the raw text as well.
        let upper = trimmed.to_uppercase();
        if !(upper.starts_with("SELECT") || upper.starts_with("WITH")) {
            return Err(GuardError::InvalidPrefix { found: leading });
        }

        // One trailing separator is allowed; any other `;` is in the body.
        let body = trimmed.strip_suffix(';').unwrap_or(trimmed).trim_end();
        if body.contains(';') {
            return Err(GuardError::EmbeddedSeparator);
        }

        if let Some(keyword) = find_blocked_keyword(body) {
            return Err(GuardError::BlockedKeyword {
                keyword: keyword.to_string(),
            });
        }

        Ok(body.to_string())
    }

    /// Counts statements that contain anything besides whitespace and comments.
    fn count_statements(&self, sql: &str) -> Result<usize, GuardError> {
        let tokens = Tokenizer::new(&self.dialect, sql)
            .tokenize()
            .map_err(|e| GuardError::Tokenize(e.to_string()))?;

        let mut count = 0;
        let mut has_content = false;
        for token in &tokens {
            match token {
                Token::SemiColon => {
                    if has_content {
                        count += 1;
                    }
                    has_content = false;
                }
                Token::Whitespace(_) | Token::EOF => {}
                _ => has_content = true,
            }
        }
        if has_content {
            count += 1;
        }

        Ok(count)
    }

    /// Returns the parsed statement kind, or `None` when the parser gives up.
    ///
    /// Parse failures are not rejections on their own: the prefix and
    /// blacklist checks still run and the engine reports real syntax errors.
    fn parsed_kind(&self, sql: &str, leading: &str) -> Result<Option<StatementKind>, GuardError> {
        let statements = match Parser::parse_sql(&self.dialect, sql) {
            Ok(statements) => statements,
            Err(e) => {
                debug!("SQL parse error, falling back to text checks: {e}");
                return Ok(None);
            }
        };

        match statements.as_slice() {
            [] => Ok(None),
            [statement] => Ok(Some(classify_statement(statement, leading))),
            many => Err(GuardError::MultipleStatements(many.len())),
        }
    }
}

/// Convenience function to validate SQL without creating a guard instance.
pub fn validate_query(sql: &str) -> Result<String, GuardError> {
    SqlGuard::new().validate(sql)
}

/// First word of the statement, uppercased and clipped for error messages.
fn leading_token(sql: &str) -> String {
    sql.split(|c: char| c.is_whitespace() || c == '(' || c == ';')
        .find(|word| !word.is_empty())
        .unwrap_or_default()
        .chars()
        .take(MAX_REPORTED_TOKEN)
        .collect::<String>()
        .to_uppercase()
}

/// Classifies a single parsed statement.
fn classify_statement(statement: &Statement, leading: &str) -> StatementKind {
    match statement {
        // Query: may hide writes in CTEs or subqueries, so recurse
        Statement::Query(query) => classify_query(query),

        Statement::Insert(_) => StatementKind::Insert,
        Statement::Update { .. } => StatementKind::Update,
        Statement::Delete(_) => StatementKind::Delete,
        Statement::Drop { .. } => StatementKind::Drop,
        Statement::Truncate { .. } => StatementKind::Truncate,
        Statement::AlterTable { .. } | Statement::AlterIndex { .. } | Statement::AlterView { .. } => {
            StatementKind::Alter
        }
        Statement::CreateTable { .. }
        | Statement::CreateIndex { .. }
        | Statement::CreateView { .. }
        | Statement::CreateVirtualTable { .. } => StatementKind::Create,
        Statement::Grant { .. } => StatementKind::Grant,
        Statement::Revoke { .. } => StatementKind::Revoke,
        Statement::Explain { .. } => StatementKind::Explain,
        Statement::Pragma { .. } => StatementKind::Pragma,
        Statement::AttachDatabase { .. } => StatementKind::Attach,
        Statement::StartTransaction { .. }
        | Statement::Commit { .. }
        | Statement::Rollback { .. }
        | Statement::Savepoint { .. } => StatementKind::Transaction,
        Statement::Analyze { .. } => StatementKind::Analyze,

        // Anything else is not a SELECT
        _ => StatementKind::Other(leading.to_string()),
    }
}

/// Classifies a Query, returning the first non-read kind found inside it.
fn classify_query(query: &Query) -> StatementKind {
    if let Some(with) = &query.with {
        for cte in &with.cte_tables {
            let kind = classify_query(&cte.query);
            if !kind.is_read_only() {
                return kind;
            }
        }
    }

    classify_set_expr(&query.body)
}

/// Classifies a SetExpr, detecting writes and recursing into nested queries.
fn classify_set_expr(set_expr: &SetExpr) -> StatementKind {
    match set_expr {
        SetExpr::Insert(_) => StatementKind::Insert,
        SetExpr::Update(_) => StatementKind::Update,

        SetExpr::Query(query) => classify_query(query),
        SetExpr::Select(select) => classify_select(select),

        // UNION, INTERSECT, EXCEPT: check both sides
        SetExpr::SetOperation { left, right, .. } => {
            let left_kind = classify_set_expr(left);
            if left_kind.is_read_only() {
                classify_set_expr(right)
            } else {
                left_kind
            }
        }

        _ => StatementKind::Select,
    }
}

/// Classifies a Select by checking `INTO` and its FROM clause.
fn classify_select(select: &Select) -> StatementKind {
    if select.into.is_some() {
        return StatementKind::SelectInto;
    }

    for table_with_joins in &select.from {
        let kind = classify_table_with_joins(table_with_joins);
        if !kind.is_read_only() {
            return kind;
        }
    }

    StatementKind::Select
}

/// Classifies a TableWithJoins, checking the main relation and all joins.
fn classify_table_with_joins(twj: &TableWithJoins) -> StatementKind {
    let kind = classify_table_factor(&twj.relation);
    if !kind.is_read_only() {
        return kind;
    }

    for join in &twj.joins {
        let kind = classify_table_factor(&join.relation);
        if !kind.is_read_only() {
            return kind;
        }
    }

    StatementKind::Select
}

/// Classifies a TableFactor, recursing into derived tables (subqueries).
fn classify_table_factor(factor: &TableFactor) -> StatementKind {
    match factor {
        TableFactor::Derived { subquery, .. } => classify_query(subquery),
        TableFactor::NestedJoin {
            table_with_joins, ..
        } => classify_table_with_joins(table_with_joins),
        _ => StatementKind::Select,
    }
}

//! Fact extraction from reference SQL
//!
//! Decodes the SELECT list and GROUP BY clause of a query against the schema
//! of its owning database, yielding column labels (`"<table>: <column>"`) and
//! the operands of each aggregate operator.

use crate::parser::{ParseError, SqlParser};
use queryrec_core::{
    AggOp, AggregateHints, ColumnLabel, DatabaseSchema, DialectConfig, QueryFacts, TableSchema,
};
use sqlparser::ast::{
    Expr, FunctionArg, FunctionArgExpr, FunctionArguments, GroupByExpr, ObjectName, Query, Select,
    SelectItem, SetExpr, Statement, TableFactor,
};
use std::collections::HashMap;

/// Errors raised while decoding a reference query
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("unsupported statement: {0}")]
    UnsupportedStatement(String),

    #[error("empty SQL")]
    Empty,
}

/// Yields the facts the recommender needs from one reference query
pub trait SqlFactExtractor: Send + Sync {
    /// Decode `sql` against the schema of its owning database
    fn extract(&self, sql: &str, schema: &DatabaseSchema) -> Result<QueryFacts, ExtractError>;
}

/// One entry of a decoded SELECT list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectEntity {
    /// Column referenced by the item
    pub label: ColumnLabel,

    /// Aggregate applied to it, if any
    pub agg: Option<AggOp>,
}

/// Decoded SELECT list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectAst {
    pub entities: Vec<SelectEntity>,
}

impl SelectAst {
    /// Distinct entity labels in SELECT order
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for entity in &self.entities {
            let name = entity.label.to_string();
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    /// Operands per aggregate operator
    pub fn agg_opts(&self) -> AggregateHints {
        let mut opts = AggregateHints::new();
        for entity in &self.entities {
            if let Some(op) = entity.agg {
                let operands = opts.entry(op).or_default();
                let name = entity.label.to_string();
                if !operands.contains(&name) {
                    operands.push(name);
                }
            }
        }
        opts
    }
}

/// Decoded GROUP BY clause
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupByAst {
    pub entities: Vec<ColumnLabel>,
}

impl GroupByAst {
    /// Distinct entity labels in clause order
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for label in &self.entities {
            let name = label.to_string();
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }
}

/// Extractor backed by sqlparser
pub struct SqlParserExtractor {
    parser: SqlParser,
}

impl SqlParserExtractor {
    pub fn new(dialect: DialectConfig) -> Self {
        Self {
            parser: SqlParser::from_dialect(dialect),
        }
    }

    /// Decode the SELECT list of the outermost query
    pub fn decode_select(&self, sql: &str, schema: &DatabaseSchema) -> Result<SelectAst, ExtractError> {
        let select = self.parse_select(sql)?;
        Ok(decode_select(&select, schema))
    }

    /// Decode the GROUP BY clause of the outermost query
    pub fn decode_groupby(&self, sql: &str, schema: &DatabaseSchema) -> Result<GroupByAst, ExtractError> {
        let select = self.parse_select(sql)?;
        Ok(decode_groupby(&select, schema))
    }

    fn parse_select(&self, sql: &str) -> Result<Select, ExtractError> {
        if sql.trim().is_empty() {
            return Err(ExtractError::Empty);
        }

        let parsed = self.parser.parse(sql)?;
        let query = match parsed.first_statement() {
            Some(Statement::Query(query)) => query,
            Some(other) => {
                return Err(ExtractError::UnsupportedStatement(first_keyword(&other.to_string())))
            }
            None => return Err(ExtractError::Empty),
        };

        outermost_select(query)
            .cloned()
            .ok_or_else(|| ExtractError::UnsupportedStatement("query without SELECT".to_string()))
    }
}

impl Default for SqlParserExtractor {
    fn default() -> Self {
        Self::new(DialectConfig::default())
    }
}

impl SqlFactExtractor for SqlParserExtractor {
    fn extract(&self, sql: &str, schema: &DatabaseSchema) -> Result<QueryFacts, ExtractError> {
        let select = self.parse_select(sql)?;
        let select_ast = decode_select(&select, schema);
        let groupby_ast = decode_groupby(&select, schema);

        Ok(QueryFacts {
            select: select_ast.names(),
            group_by: groupby_ast.names(),
            aggregates: select_ast.agg_opts(),
        })
    }
}

fn first_keyword(statement: &str) -> String {
    statement
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_uppercase()
}

/// For set operations (UNION, INTERSECT, EXCEPT) the left operand is used
fn outermost_select(query: &Query) -> Option<&Select> {
    let mut body = query.body.as_ref();
    loop {
        match body {
            SetExpr::Select(select) => return Some(select),
            SetExpr::Query(query) => body = query.body.as_ref(),
            SetExpr::SetOperation { left, .. } => body = left.as_ref(),
            _ => return None,
        }
    }
}

/// Tables visible in one SELECT, keyed by lower-cased alias and name
struct Scope<'a> {
    by_name: HashMap<String, &'a TableSchema>,
    ordered: Vec<&'a TableSchema>,
}

impl<'a> Scope<'a> {
    fn from_select(select: &Select, schema: &'a DatabaseSchema) -> Self {
        let mut scope = Scope {
            by_name: HashMap::new(),
            ordered: Vec::new(),
        };

        for table_with_joins in &select.from {
            scope.add_factor(&table_with_joins.relation, schema);
            for join in &table_with_joins.joins {
                scope.add_factor(&join.relation, schema);
            }
        }

        scope
    }

    fn add_factor(&mut self, factor: &TableFactor, schema: &'a DatabaseSchema) {
        if let TableFactor::Table { name, alias, .. } = factor {
            let table_name = object_name(name);
            let Some(table) = schema.find_table(&table_name) else {
                tracing::debug!(table = %table_name, db = %schema.db_id, "table not in schema");
                return;
            };

            self.by_name.insert(table_name.to_lowercase(), table);
            if let Some(alias) = alias {
                self.by_name.insert(alias.name.value.to_lowercase(), table);
            }
            if !self.ordered.iter().any(|t| t.name == table.name) {
                self.ordered.push(table);
            }
        }
    }

    fn table(&self, qualifier: &str) -> Option<&'a TableSchema> {
        self.by_name.get(&qualifier.to_lowercase()).copied()
    }

    fn first(&self) -> Option<&'a TableSchema> {
        self.ordered.first().copied()
    }

    /// Resolve an unqualified column against the tables in FROM order
    fn resolve_column(&self, column: &str) -> Option<ColumnLabel> {
        self.ordered.iter().find_map(|table| {
            table.find_column(column).map(|c| table.label(c))
        })
    }

    fn resolve_qualified(&self, qualifier: &str, column: &str) -> Option<ColumnLabel> {
        let table = self.table(qualifier)?;
        if column == "*" {
            return Some(table.wildcard());
        }
        table.find_column(column).map(|c| table.label(c))
    }
}

/// Last segment of a possibly qualified, possibly quoted name
fn object_name(name: &ObjectName) -> String {
    let rendered = name.to_string();
    let last = rendered.rsplit('.').next().unwrap_or_default();
    last.trim_matches(|c| c == '"' || c == '`' || c == '[' || c == ']')
        .to_string()
}

fn decode_select(select: &Select, schema: &DatabaseSchema) -> SelectAst {
    let scope = Scope::from_select(select, schema);
    let mut entities = Vec::new();

    for item in &select.projection {
        match item {
            SelectItem::UnnamedExpr(expr) | SelectItem::ExprWithAlias { expr, .. } => {
                collect_expr(expr, &scope, None, &mut entities);
            }
            SelectItem::Wildcard(_) => {
                if let Some(table) = scope.first() {
                    entities.push(SelectEntity { label: table.wildcard(), agg: None });
                }
            }
            SelectItem::QualifiedWildcard(name, _) => {
                if let Some(label) = scope.resolve_qualified(&object_name(name), "*") {
                    entities.push(SelectEntity { label, agg: None });
                }
            }
        }
    }

    SelectAst { entities }
}

fn decode_groupby(select: &Select, schema: &DatabaseSchema) -> GroupByAst {
    let scope = Scope::from_select(select, schema);
    let exprs: Vec<&Expr> = match &select.group_by {
        GroupByExpr::All(_) => vec![],
        GroupByExpr::Expressions(exprs, _) => exprs.iter().collect(),
    };

    let mut found = Vec::new();
    for expr in exprs {
        collect_expr(expr, &scope, None, &mut found);
    }

    GroupByAst {
        entities: found.into_iter().map(|e| e.label).collect(),
    }
}

/// Walk an expression, recording every column it references
///
/// `agg` is the innermost enclosing aggregate operator.
fn collect_expr(expr: &Expr, scope: &Scope<'_>, agg: Option<AggOp>, out: &mut Vec<SelectEntity>) {
    match expr {
        Expr::Identifier(ident) => {
            if let Some(label) = scope.resolve_column(&ident.value) {
                out.push(SelectEntity { label, agg });
            }
        }
        Expr::CompoundIdentifier(idents) => {
            let resolved = match idents.as_slice() {
                [.., qualifier, column] => scope.resolve_qualified(&qualifier.value, &column.value),
                [column] => scope.resolve_column(&column.value),
                [] => None,
            };
            if let Some(label) = resolved {
                out.push(SelectEntity { label, agg });
            }
        }
        Expr::Function(func) => {
            let name = object_name(&func.name);
            let inner_agg = AggOp::from_function_name(&name).or(agg);
            if let FunctionArguments::List(list) = &func.args {
                for arg in &list.args {
                    let arg_expr = match arg {
                        FunctionArg::Unnamed(arg_expr) => arg_expr,
                        FunctionArg::Named { arg, .. } => arg,
                        _ => continue,
                    };
                    match arg_expr {
                        FunctionArgExpr::Expr(inner) => collect_expr(inner, scope, inner_agg, out),
                        FunctionArgExpr::Wildcard => {
                            if let Some(table) = scope.first() {
                                out.push(SelectEntity { label: table.wildcard(), agg: inner_agg });
                            }
                        }
                        FunctionArgExpr::QualifiedWildcard(name) => {
                            if let Some(label) = scope.resolve_qualified(&object_name(name), "*") {
                                out.push(SelectEntity { label, agg: inner_agg });
                            }
                        }
                    }
                }
            }
        }
        Expr::BinaryOp { left, right, .. } => {
            collect_expr(left, scope, agg, out);
            collect_expr(right, scope, agg, out);
        }
        Expr::UnaryOp { expr, .. }
        | Expr::Nested(expr)
        | Expr::Cast { expr, .. }
        | Expr::IsNull(expr)
        | Expr::IsNotNull(expr) => collect_expr(expr, scope, agg, out),
        _ => {}
    }
}

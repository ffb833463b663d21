//! Table-reference extraction from view SQL.

use std::collections::{BTreeSet, HashSet, VecDeque};
use std::ops::ControlFlow;

use sqlparser::ast::{ObjectName, Query, Visit, Visitor};
use sqlparser::dialect::GenericDialect;
use sqlparser::keywords::Keyword;
use sqlparser::parser::Parser;
use sqlparser::tokenizer::{Token, Tokenizer};
use tracing::debug;
use viewgrant_core::CatalogObjectRef;

/// A relation named in a SQL text, optionally database-qualified.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableReference {
    pub database: Option<String>,
    pub name: String,
}

impl TableReference {
    /// Resolve against the object whose SQL contained the reference.
    /// Unqualified names live in the referencing object's database.
    pub fn resolve(&self, context: &CatalogObjectRef) -> CatalogObjectRef {
        let database = self
            .database
            .as_deref()
            .unwrap_or(context.database_name.as_str());
        context.sibling(database, &self.name)
    }
}

impl TableReference {
    /// Three-part names keep their last two parts.
    fn from_parts(parts: &[String]) -> Option<Self> {
        match parts {
            [name] => Some(Self {
                database: None,
                name: name.clone(),
            }),
            [.., database, name] => Some(Self {
                database: Some(database.clone()),
                name: name.clone(),
            }),
            [] => None,
        }
    }
}

// ============================================================================
// AST WALK
// ============================================================================

/// Names bound by one query's `WITH` clause.
#[derive(Default)]
struct CteScope {
    bound: HashSet<String>,
    /// Declared names whose bodies have not been walked yet, in order.
    pending: VecDeque<String>,
}

#[derive(Default)]
struct RelationCollector {
    scopes: Vec<CteScope>,
    references: BTreeSet<TableReference>,
}

impl RelationCollector {
    fn is_cte(&self, name: &str) -> bool {
        self.scopes.iter().any(|scope| scope.bound.contains(name))
    }
}

impl Visitor for RelationCollector {
    type Break = ();

    fn pre_visit_query(&mut self, query: &Query) -> ControlFlow<Self::Break> {
        let mut scope = CteScope::default();
        if let Some(with) = &query.with {
            let names = with
                .cte_tables
                .iter()
                .map(|cte| cte.alias.name.value.to_lowercase());
            if with.recursive {
                scope.bound.extend(names);
            } else {
                scope.pending.extend(names);
            }
        }
        self.scopes.push(scope);
        ControlFlow::Continue(())
    }

    fn post_visit_query(&mut self, _query: &Query) -> ControlFlow<Self::Break> {
        self.scopes.pop();
        // CTE bodies are the first queries walked below their WITH. Each one
        // binds its name for the CTEs after it and for the main body.
        if let Some(parent) = self.scopes.last_mut() {
            if let Some(name) = parent.pending.pop_front() {
                parent.bound.insert(name);
            }
        }
        ControlFlow::Continue(())
    }

    fn pre_visit_relation(&mut self, relation: &ObjectName) -> ControlFlow<Self::Break> {
        let parts: Vec<String> = relation
            .0
            .iter()
            .map(|ident| ident.value.to_lowercase())
            .collect();
        if let [name] = parts.as_slice() {
            if self.is_cte(name) {
                return ControlFlow::Continue(());
            }
        }
        if let Some(reference) = TableReference::from_parts(&parts) {
            self.references.insert(reference);
        }
        ControlFlow::Continue(())
    }
}

// ============================================================================
// TOKEN SCAN
// ============================================================================

/// Keywords that end a relation list rather than name a relation.
const CLAUSE_KEYWORDS: &[Keyword] = &[
    Keyword::SELECT,
    Keyword::WHERE,
    Keyword::GROUP,
    Keyword::ORDER,
    Keyword::HAVING,
    Keyword::LIMIT,
    Keyword::ON,
    Keyword::USING,
    Keyword::UNION,
    Keyword::JOIN,
    Keyword::WINDOW,
];

/// Functions whose argument syntax uses `FROM`.
const FROM_ARGUMENT_FUNCTIONS: &[Keyword] = &[
    Keyword::EXTRACT,
    Keyword::TRIM,
    Keyword::SUBSTRING,
    Keyword::OVERLAY,
];

fn keyword_of(token: Option<&Token>) -> Option<Keyword> {
    match token {
        Some(Token::Word(word)) => Some(word.keyword),
        _ => None,
    }
}

/// Read `word(.word)*` starting at `i`. Returns the lowercased parts and the
/// index after the name.
fn dotted_name(tokens: &[Token], mut i: usize) -> Option<(Vec<String>, usize)> {
    let mut parts = Vec::new();
    loop {
        match tokens.get(i) {
            Some(Token::Word(word))
                if word.quote_style.is_some() || !CLAUSE_KEYWORDS.contains(&word.keyword) =>
            {
                parts.push(word.value.to_lowercase());
            }
            _ => return None,
        }
        i += 1;
        if matches!(tokens.get(i), Some(Token::Period)) {
            i += 1;
        } else {
            return Some((parts, i));
        }
    }
}

fn skip_alias(tokens: &[Token], i: usize) -> usize {
    match tokens.get(i) {
        Some(Token::Word(word)) if word.keyword == Keyword::AS => i + 2,
        Some(Token::Word(word)) if word.keyword == Keyword::NoKeyword => i + 1,
        _ => i,
    }
}

/// Collect the comma-separated relations following `FROM` or `JOIN`.
/// Returns the index of the first token not consumed.
fn scan_relation_list(
    tokens: &[Token],
    mut i: usize,
    references: &mut BTreeSet<TableReference>,
) -> usize {
    loop {
        let Some((parts, next)) = dotted_name(tokens, i) else {
            return i;
        };
        // Table function such as UNNEST(...).
        if matches!(tokens.get(next), Some(Token::LParen)) {
            return next;
        }
        if let Some(reference) = TableReference::from_parts(&parts) {
            references.insert(reference);
        }
        i = skip_alias(tokens, next);
        if matches!(tokens.get(i), Some(Token::Comma)) {
            i += 1;
        } else {
            return i;
        }
    }
}

/// Lexical fallback for SQL the parser rejects: every name directly after
/// `FROM` or `JOIN`. CTE names are kept since they cannot be told apart from
/// catalog objects without a parse.
fn scan_table_references(sql: &str) -> Result<BTreeSet<TableReference>, String> {
    let tokens: Vec<Token> = Tokenizer::new(&GenericDialect {}, sql)
        .tokenize()
        .map_err(|e| e.to_string())?
        .into_iter()
        .filter(|token| !matches!(token, Token::Whitespace(_)))
        .collect();

    let mut references = BTreeSet::new();
    // Keyword directly before each open paren, innermost last.
    let mut parens: Vec<Option<Keyword>> = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        let previous = i.checked_sub(1).and_then(|p| keyword_of(tokens.get(p)));
        match &tokens[i] {
            Token::LParen => parens.push(previous),
            Token::RParen => {
                parens.pop();
            }
            Token::Word(word) if word.keyword == Keyword::JOIN => {
                i = scan_relation_list(&tokens, i + 1, &mut references);
                continue;
            }
            Token::Word(word) if word.keyword == Keyword::FROM => {
                let in_argument = matches!(
                    parens.last(),
                    Some(Some(keyword)) if FROM_ARGUMENT_FUNCTIONS.contains(keyword)
                );
                // IS [NOT] DISTINCT FROM compares values.
                if !in_argument && previous != Some(Keyword::DISTINCT) {
                    i = scan_relation_list(&tokens, i + 1, &mut references);
                    continue;
                }
            }
            _ => {}
        }
        i += 1;
    }
    Ok(references)
}

/// Extract the distinct catalog relations referenced by `sql`.
///
/// Names bound by `WITH` are not catalog objects and are dropped within the
/// scope that binds them. SQL the parser rejects falls back to a token scan.
/// Only text that does not tokenize is an error.
pub fn extract_table_references(sql: &str) -> Result<BTreeSet<TableReference>, String> {
    match Parser::parse_sql(&GenericDialect {}, sql) {
        Ok(statements) => {
            let mut collector = RelationCollector::default();
            for statement in &statements {
                let _ = statement.visit(&mut collector);
            }
            Ok(collector.references)
        }
        Err(parse_error) => {
            debug!(error = %parse_error, "SQL does not parse, scanning tokens");
            scan_table_references(sql)
                .map_err(|scan_error| format!("{}; {}", parse_error, scan_error))
        }
    }
}

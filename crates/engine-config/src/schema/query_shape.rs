//! Best-effort reading of a query's top-level structure.
//!
//! This is keyword inspection over masked text, not a SQL parser. Comments,
//! string literals and everything inside parentheses are blanked out first,
//! so only the outermost SELECT list, FROM clause and JOIN clauses are seen.
//! Whatever cannot be attributed to a table resolves to the opaque
//! `query.<column>` provenance.

use crate::schema::{JoinInfo, Provenance, QueryType};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref SELECT_RE: Regex = Regex::new(r"(?i)\bSELECT\b").unwrap();
    static ref FROM_RE: Regex = Regex::new(r"(?i)\bFROM\b").unwrap();
    static ref CLAUSE_END_RE: Regex = Regex::new(
        r"(?i)\b(?:WHERE|GROUP\s+BY|ORDER\s+BY|HAVING|UNION|INTERSECT|EXCEPT|MINUS|LIMIT|OFFSET|FETCH|CONNECT\s+BY|START\s+WITH|WINDOW|FOR\s+UPDATE)\b"
    )
    .unwrap();
    static ref JOIN_RE: Regex = Regex::new(
        r"(?i)\b(?:NATURAL\s+)?(?:(?:LEFT|RIGHT|FULL)(?:\s+OUTER)?\s+|INNER\s+|CROSS\s+)?JOIN\b"
    )
    .unwrap();
    static ref JOIN_CONDITION_RE: Regex = Regex::new(r"(?i)\b(?:ON|USING)\b").unwrap();
    static ref SET_QUANTIFIER_RE: Regex = Regex::new(r"(?i)^\s*(?:DISTINCT|ALL|UNIQUE)\b").unwrap();
    static ref ALIASED_RE: Regex =
        Regex::new(r#"(?s)^(.*?\S)\s+(?:(?i:AS)\s+)?("[^"]+"|[A-Za-z_][\w$#]*)$"#).unwrap();
    static ref QUALIFIED_RE: Regex =
        Regex::new(r#"^("[^"]+"|[A-Za-z_][\w$#]*)\.("[^"]+"|[A-Za-z_][\w$#]*)$"#).unwrap();
    static ref BARE_RE: Regex = Regex::new(r#"^("[^"]+"|[A-Za-z_][\w$#]*)$"#).unwrap();
    static ref STAR_RE: Regex =
        Regex::new(r#"^(?:("[^"]+"|[A-Za-z_][\w$#]*)\.)?\*$"#).unwrap();
}

/// Words that can end an expression and must not be read as an alias.
const NOT_AN_ALIAS: &[&str] = &[
    "END", "AND", "OR", "NOT", "NULL", "IS", "IN", "LIKE", "BETWEEN", "THEN", "ELSE", "WHEN",
    "CASE", "TRUE", "FALSE", "ASC", "DESC", "DISTINCT",
];

#[derive(Debug, Clone, PartialEq, Eq)]
struct TableRef {
    name: String,
    alias: Option<String>,
    /// A parenthesised subquery; its columns are not attributable.
    derived: bool,
}

impl TableRef {
    fn answers_to(&self, qualifier: &str) -> bool {
        self.alias
            .as_deref()
            .is_some_and(|a| a.eq_ignore_ascii_case(qualifier))
            || self.name.eq_ignore_ascii_case(qualifier)
            || self
                .name
                .rsplit('.')
                .next()
                .is_some_and(|n| n.eq_ignore_ascii_case(qualifier))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ItemSource {
    Column {
        qualifier: Option<String>,
        column: String,
    },
    Star {
        qualifier: Option<String>,
    },
    Expression,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct SelectItem {
    /// Result column name if it can be read from the text.
    output: Option<String>,
    source: ItemSource,
}

/// The recognizable top-level structure of a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryShape {
    pub query_type: QueryType,
    pub joins: Vec<JoinInfo>,
    tables: Vec<TableRef>,
    items: Vec<SelectItem>,
}

impl QueryShape {
    pub fn parse(query: &str) -> Self {
        let masked = mask(query);
        let query_type = match masked
            .split_whitespace()
            .next()
            .map(|w| w.to_ascii_uppercase())
            .as_deref()
        {
            Some("SELECT") => QueryType::Select,
            Some("WITH") => QueryType::With,
            _ => QueryType::Other,
        };

        let mut shape = QueryShape {
            query_type,
            joins: Vec::new(),
            tables: Vec::new(),
            items: Vec::new(),
        };

        let Some(select) = SELECT_RE.find(&masked) else {
            return shape;
        };
        let from = FROM_RE.find_at(&masked, select.end());
        let list_end = match from {
            Some(from) => from.start(),
            None => CLAUSE_END_RE
                .find_at(&masked, select.end())
                .map_or(masked.len(), |m| m.start()),
        };

        let mut list = &masked[select.end()..list_end];
        if let Some(quantifier) = SET_QUANTIFIER_RE.find(list) {
            list = &list[quantifier.end()..];
        }
        shape.items = list.split(',').map(parse_select_item).collect();

        if let Some(from) = from {
            let from_end = CLAUSE_END_RE
                .find_at(&masked, from.end())
                .map_or(masked.len(), |m| m.start());
            shape.parse_from(query, &masked, from.end(), from_end);
        }
        shape
    }

    fn parse_from(&mut self, original: &str, masked: &str, start: usize, end: usize) {
        let region = &masked[start..end];
        let join_matches: Vec<_> = JOIN_RE.find_iter(region).collect();
        let base_end = join_matches.first().map_or(region.len(), |m| m.start());

        for (i, item) in region[..base_end].split(',').enumerate() {
            let Some(table) = parse_table_ref(item) else {
                continue;
            };
            if i > 0 {
                self.joins.push(JoinInfo {
                    kind: "IMPLICIT".to_string(),
                    table: table.name.clone(),
                    alias: table.alias.clone(),
                    condition: None,
                });
            }
            self.tables.push(table);
        }

        for (i, m) in join_matches.iter().enumerate() {
            let seg_start = m.end();
            let seg_end = join_matches.get(i + 1).map_or(region.len(), |n| n.start());
            let segment = &region[seg_start..seg_end];

            let (table_part, condition) = match JOIN_CONDITION_RE.find(segment) {
                Some(cond) => {
                    let is_using = cond.as_str().eq_ignore_ascii_case("USING");
                    let from = start + seg_start + if is_using { cond.start() } else { cond.end() };
                    let to = start + seg_end;
                    let text = original
                        .get(from..to)
                        .unwrap_or(&masked[from..to])
                        .trim()
                        .to_string();
                    (&segment[..cond.start()], (!text.is_empty()).then_some(text))
                }
                None => (segment, None),
            };

            let Some(table) = parse_table_ref(table_part) else {
                continue;
            };
            self.joins.push(JoinInfo {
                kind: normalize_join_kind(m.as_str()),
                table: table.name.clone(),
                alias: table.alias.clone(),
                condition,
            });
            self.tables.push(table);
        }
    }

    /// Resolves where the result column `column` comes from.
    pub fn provenance(&self, column: &str) -> Provenance {
        let item = self
            .items
            .iter()
            .find(|item| {
                item.output
                    .as_deref()
                    .is_some_and(|o| o.eq_ignore_ascii_case(column))
            });

        let resolved = match item.map(|i| &i.source) {
            Some(ItemSource::Column { qualifier, column }) => self
                .resolve_table(qualifier.as_deref())
                .map(|table| Provenance::column(table, column.clone())),
            Some(ItemSource::Expression) | Some(ItemSource::Star { .. }) => None,
            None => self.resolve_through_star(column),
        };
        resolved.unwrap_or_else(|| Provenance::from_query(column))
    }

    /// Columns not named in the list may come from a `*` projection.
    fn resolve_through_star(&self, column: &str) -> Option<Provenance> {
        let mut stars = self.items.iter().filter_map(|i| match &i.source {
            ItemSource::Star { qualifier } => Some(qualifier.as_deref()),
            _ => None,
        });
        let qualifier = stars.next()?;
        if stars.next().is_some() {
            return None;
        }
        self.resolve_table(qualifier)
            .map(|table| Provenance::column(table, column))
    }

    fn resolve_table(&self, qualifier: Option<&str>) -> Option<String> {
        let table = match qualifier {
            Some(q) => self.tables.iter().find(|t| t.answers_to(q))?,
            None if self.tables.len() == 1 => &self.tables[0],
            None => return None,
        };
        (!table.derived).then(|| table.name.clone())
    }
}

fn parse_select_item(text: &str) -> SelectItem {
    let text = text.trim();
    let (expr, output) = match ALIASED_RE.captures(text) {
        Some(caps) if is_alias(&caps[1], &caps[2]) => {
            (caps[1].trim().to_string(), Some(unquote(&caps[2])))
        }
        _ => (text.to_string(), None),
    };

    if let Some(caps) = STAR_RE.captures(&expr) {
        return SelectItem {
            output,
            source: ItemSource::Star {
                qualifier: caps.get(1).map(|q| unquote(q.as_str())),
            },
        };
    }
    if let Some(caps) = QUALIFIED_RE.captures(&expr) {
        let column = unquote(&caps[2]);
        return SelectItem {
            output: output.or_else(|| Some(column.clone())),
            source: ItemSource::Column {
                qualifier: Some(unquote(&caps[1])),
                column,
            },
        };
    }
    if BARE_RE.is_match(&expr) && !is_keyword(&expr) {
        let column = unquote(&expr);
        return SelectItem {
            output: output.or_else(|| Some(column.clone())),
            source: ItemSource::Column {
                qualifier: None,
                column,
            },
        };
    }
    SelectItem {
        output,
        source: ItemSource::Expression,
    }
}

fn is_alias(expr: &str, alias: &str) -> bool {
    let operator_tail = expr
        .trim_end()
        .ends_with(['+', '-', '*', '/', '|', '=', '<', '>', '.']);
    !operator_tail && !is_keyword(alias)
}

fn is_keyword(word: &str) -> bool {
    NOT_AN_ALIAS.iter().any(|k| k.eq_ignore_ascii_case(word))
}

fn parse_table_ref(text: &str) -> Option<TableRef> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let (name, derived, rest) = if text.starts_with('(') {
        let close = text.find(')')?;
        ("(subquery)".to_string(), true, &text[close + 1..])
    } else {
        let mut parts = text.splitn(2, char::is_whitespace);
        let name = parts.next()?;
        (unquote(name), false, parts.next().unwrap_or(""))
    };

    let mut tokens = rest.split_whitespace();
    let alias = match tokens.next() {
        Some(word) if word.eq_ignore_ascii_case("AS") => tokens.next().map(unquote),
        Some(word) if !is_keyword(word) => Some(unquote(word)),
        _ => None,
    };

    Some(TableRef {
        name,
        alias,
        derived,
    })
}

fn normalize_join_kind(keyword: &str) -> String {
    let words: Vec<String> = keyword
        .split_whitespace()
        .map(|w| w.to_ascii_uppercase())
        .collect();
    if words.len() == 1 {
        "INNER JOIN".to_string()
    } else {
        words.join(" ")
    }
}

fn unquote(ident: &str) -> String {
    ident.trim().trim_matches('"').to_string()
}

/// Blanks comments, string literals and parenthesised content with spaces.
/// Byte offsets of the result line up with the input; parentheses at the
/// top level are kept so subqueries remain recognizable.
fn mask(sql: &str) -> String {
    fn blank(out: &mut String, c: char) {
        for _ in 0..c.len_utf8() {
            out.push(' ');
        }
    }

    let mut out = String::with_capacity(sql.len());
    let mut chars = sql.chars().peekable();
    let mut depth = 0usize;

    while let Some(c) = chars.next() {
        match c {
            '-' if chars.peek() == Some(&'-') => {
                blank(&mut out, c);
                while let Some(&n) = chars.peek() {
                    if n == '\n' {
                        break;
                    }
                    blank(&mut out, n);
                    chars.next();
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                blank(&mut out, c);
                let mut prev = '\0';
                for n in chars.by_ref() {
                    blank(&mut out, n);
                    if prev == '*' && n == '/' {
                        break;
                    }
                    prev = n;
                }
            }
            '\'' => {
                blank(&mut out, c);
                while let Some(n) = chars.next() {
                    blank(&mut out, n);
                    if n == '\'' {
                        if chars.peek() == Some(&'\'') {
                            // doubled quote inside a literal
                            if let Some(q) = chars.next() {
                                blank(&mut out, q);
                            }
                        } else {
                            break;
                        }
                    }
                }
            }
            '"' if depth == 0 => {
                out.push(c);
                for n in chars.by_ref() {
                    out.push(n);
                    if n == '"' {
                        break;
                    }
                }
            }
            '(' => {
                if depth == 0 {
                    out.push('(');
                } else {
                    out.push(' ');
                }
                depth += 1;
            }
            ')' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    out.push(')');
                } else {
                    out.push(' ');
                }
            }
            _ if depth > 0 => blank(&mut out, c),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masking_preserves_offsets() {
        let sql = "SELECT 'a,b', f(x, y) -- tail, comment\nFROM t /* c, d */";
        let masked = mask(sql);
        assert_eq!(masked.len(), sql.len());
        assert!(!masked.contains("a,b"));
        assert!(masked.contains("f(    )"));
        assert!(!masked.contains("tail"));
        assert!(masked.contains("FROM t"));
        assert_eq!(masked.matches(',').count(), 1);
    }

    #[test]
    fn masking_handles_multibyte_literals() {
        let sql = "SELECT 'é' AS x FROM t";
        let masked = mask(sql);
        assert_eq!(masked.len(), sql.len());
        assert!(masked.ends_with("AS x FROM t"));
    }

    #[test]
    fn resolves_aliases_through_joins() {
        let shape = QueryShape::parse(
            "SELECT e.id, e.first_name AS name, d.dept_name, UPPER(e.email) AS email
             FROM employees e
             LEFT OUTER JOIN departments d ON e.dept_id = d.id
             WHERE e.active = 'Y'",
        );

        assert_eq!(shape.query_type, QueryType::Select);
        assert_eq!(shape.provenance("ID"), Provenance::column("employees", "id"));
        assert_eq!(
            shape.provenance("name"),
            Provenance::column("employees", "first_name")
        );
        assert_eq!(
            shape.provenance("dept_name"),
            Provenance::column("departments", "dept_name")
        );
        assert_eq!(shape.provenance("email"), Provenance::from_query("email"));

        assert_eq!(
            shape.joins,
            vec![JoinInfo {
                kind: "LEFT OUTER JOIN".into(),
                table: "departments".into(),
                alias: Some("d".into()),
                condition: Some("e.dept_id = d.id".into()),
            }]
        );
    }

    #[test]
    fn bare_columns_resolve_against_a_single_table() {
        let shape = QueryShape::parse("SELECT DISTINCT id, salary * 12 annual FROM hr.emp");
        assert_eq!(shape.provenance("id"), Provenance::column("hr.emp", "id"));
        assert_eq!(shape.provenance("annual"), Provenance::from_query("annual"));
    }

    #[test]
    fn star_projection_attributes_to_its_table() {
        let shape = QueryShape::parse("SELECT * FROM orders o");
        assert_eq!(shape.provenance("total"), Provenance::column("orders", "total"));

        let joined = QueryShape::parse("SELECT o.*, c.name FROM orders o JOIN customers c USING (cid)");
        assert_eq!(joined.provenance("total"), Provenance::column("orders", "total"));
        assert_eq!(joined.joins[0].kind, "INNER JOIN");
        assert_eq!(joined.joins[0].condition.as_deref(), Some("USING (cid)"));
    }

    #[test]
    fn implicit_joins_and_subqueries() {
        let shape = QueryShape::parse(
            "SELECT a.x, s.y FROM a, (SELECT y FROM b WHERE z IN (1, 2)) s WHERE a.k = s.k",
        );
        assert_eq!(shape.joins.len(), 1);
        assert_eq!(shape.joins[0].kind, "IMPLICIT");
        assert_eq!(shape.joins[0].table, "(subquery)");
        assert_eq!(shape.provenance("x"), Provenance::column("a", "x"));
        assert_eq!(shape.provenance("y"), Provenance::from_query("y"));
    }

    #[test]
    fn cte_bodies_are_ignored() {
        let shape = QueryShape::parse(
            "WITH recent AS (SELECT id FROM orders JOIN x ON 1 = 1) SELECT r.id FROM recent r",
        );
        assert_eq!(shape.query_type, QueryType::With);
        assert!(shape.joins.is_empty());
        assert_eq!(shape.provenance("id"), Provenance::column("recent", "id"));
    }

    #[test]
    fn case_expressions_are_not_aliased_by_end() {
        let shape = QueryShape::parse("SELECT CASE WHEN a > 1 THEN 'x' ELSE 'y' END FROM t");
        assert_eq!(shape.provenance("case"), Provenance::from_query("case"));
    }

    #[test]
    fn unparseable_text_degrades_to_markers() {
        let shape = QueryShape::parse("EXEC some_procedure");
        assert_eq!(shape.query_type, QueryType::Other);
        assert!(shape.joins.is_empty());
        assert_eq!(shape.provenance("col"), Provenance::from_query("col"));
    }
}

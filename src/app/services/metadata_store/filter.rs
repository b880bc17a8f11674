//! `--where` filters over map metadata, compiled to parameterized SQL

use crate::constants::FILTERABLE_COLUMNS;
use crate::{Error, Result};
use regex::Regex;
use rusqlite::types::Value;
use std::fmt;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Like,
}

impl Comparison {
    fn parse(op: &str) -> Option<Self> {
        match op.to_uppercase().as_str() {
            "=" | "==" => Some(Comparison::Eq),
            "!=" | "<>" => Some(Comparison::Ne),
            "<" => Some(Comparison::Lt),
            "<=" => Some(Comparison::Le),
            ">" => Some(Comparison::Gt),
            ">=" => Some(Comparison::Ge),
            "LIKE" => Some(Comparison::Like),
            _ => None,
        }
    }

    fn sql(&self) -> &'static str {
        match self {
            Comparison::Eq => "=",
            Comparison::Ne => "<>",
            Comparison::Lt => "<",
            Comparison::Le => "<=",
            Comparison::Gt => ">",
            Comparison::Ge => ">=",
            Comparison::Like => "LIKE",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Text(String),
    Integer(i64),
    Real(f64),
}

impl Literal {
    fn to_value(&self) -> Value {
        match self {
            Literal::Text(text) => Value::Text(text.clone()),
            Literal::Integer(value) => Value::Integer(*value),
            Literal::Real(value) => Value::Real(*value),
        }
    }
}

/// `column OP literal`
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub column: &'static str,
    pub comparison: Comparison,
    pub literal: Literal,
}

/// A conjunction of conditions on map columns
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MapFilter {
    conditions: Vec<Condition>,
}

fn condition_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?i)^\s*([a-z_]+)\s*(<=|>=|!=|<>|==|=|<|>|like\b)\s*('(?:[^']|'')*'|-?\d+(?:\.\d+)?)\s*",
        )
        .expect("condition pattern is valid")
    })
}

fn conjunction_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)^and\b").expect("conjunction pattern is valid"))
}

impl MapFilter {
    /// Parse `start_time >= '2001-01-01' AND name LIKE 'a%'`.
    ///
    /// Columns must be one of the filterable map columns; literals are quoted
    /// strings (`''` escapes a quote) or numbers.
    pub fn parse(text: &str) -> Result<Self> {
        let mut conditions = Vec::new();
        let mut rest = text.trim();
        if rest.is_empty() {
            return Ok(Self::default());
        }

        loop {
            let captures = condition_pattern().captures(rest).ok_or_else(|| {
                Error::invalid_value(format!(
                    "Invalid filter condition at '{}' (expected: column OP value)",
                    rest
                ))
            })?;
            let consumed = captures.get(0).map_or(0, |m| m.end());
            let column_name = captures[1].to_lowercase();
            let column = FILTERABLE_COLUMNS
                .iter()
                .copied()
                .find(|candidate| *candidate == column_name)
                .ok_or_else(|| {
                    Error::invalid_value(format!(
                        "Column '{}' cannot be filtered (allowed: {})",
                        column_name,
                        FILTERABLE_COLUMNS.join(", ")
                    ))
                })?;
            let comparison = Comparison::parse(&captures[2]).ok_or_else(|| {
                Error::invalid_value(format!("Unknown comparison '{}'", &captures[2]))
            })?;
            let literal = parse_literal(&captures[3])?;
            conditions.push(Condition {
                column,
                comparison,
                literal,
            });

            rest = rest[consumed..].trim_start();
            if rest.is_empty() {
                break;
            }
            let conjunction = conjunction_pattern().find(rest).ok_or_else(|| {
                Error::invalid_value(format!("Expected AND between conditions, found '{}'", rest))
            })?;
            rest = rest[conjunction.end()..].trim_start();
        }

        Ok(Self { conditions })
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// SQL fragment ` AND m.col OP ?N ...` with placeholders numbered from
    /// `first_param`, plus the bound values
    pub fn to_sql(&self, first_param: usize) -> (String, Vec<Value>) {
        let mut sql = String::new();
        let mut values = Vec::with_capacity(self.conditions.len());
        for (offset, condition) in self.conditions.iter().enumerate() {
            sql.push_str(&format!(
                " AND m.{} {} ?{}",
                condition.column,
                condition.comparison.sql(),
                first_param + offset
            ));
            values.push(condition.literal.to_value());
        }
        (sql, values)
    }
}

fn parse_literal(text: &str) -> Result<Literal> {
    if let Some(quoted) = text.strip_prefix('\'').and_then(|t| t.strip_suffix('\'')) {
        return Ok(Literal::Text(quoted.replace("''", "'")));
    }
    if let Ok(value) = text.parse::<i64>() {
        return Ok(Literal::Integer(value));
    }
    text.parse::<f64>()
        .map(Literal::Real)
        .map_err(|_| Error::invalid_value(format!("Invalid filter value '{}'", text)))
}

impl fmt::Display for MapFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .conditions
            .iter()
            .map(|condition| {
                let literal = match &condition.literal {
                    Literal::Text(text) => format!("'{}'", text.replace('\'', "''")),
                    Literal::Integer(value) => value.to_string(),
                    Literal::Real(value) => value.to_string(),
                };
                format!("{} {} {}", condition.column, condition.comparison.sql(), literal)
            })
            .collect();
        f.write_str(&parts.join(" AND "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_conjunction() {
        let filter = MapFilter::parse("start_time >= '2001-01-01' and name LIKE 'a%'").unwrap();
        assert_eq!(filter.conditions().len(), 2);
        assert_eq!(filter.conditions()[0].column, "start_time");
        assert_eq!(filter.conditions()[1].comparison, Comparison::Like);

        let (sql, values) = filter.to_sql(2);
        assert_eq!(sql, " AND m.start_time >= ?2 AND m.name LIKE ?3");
        assert_eq!(values.len(), 2);
    }

    #[test]
    fn test_quotes_stay_in_the_value() {
        let filter = MapFilter::parse("name = 'it''s; DROP TABLE stds'").unwrap();
        assert_eq!(
            filter.conditions()[0].literal,
            Literal::Text("it's; DROP TABLE stds".to_string())
        );
    }

    #[test]
    fn test_numbers() {
        let filter = MapFilter::parse("start_rel > 3 AND north <= 10.5").unwrap();
        assert_eq!(filter.conditions()[0].literal, Literal::Integer(3));
        assert_eq!(filter.conditions()[1].literal, Literal::Real(10.5));
    }

    #[test]
    fn test_rejects_unknown_columns_and_syntax() {
        assert!(MapFilter::parse("password = 'x'").is_err());
        assert!(MapFilter::parse("name = 'a' OR name = 'b'").is_err());
        assert!(MapFilter::parse("name 'a'").is_err());
        assert!(MapFilter::parse("").unwrap().is_empty());
    }
}

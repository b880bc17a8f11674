//! Syntax tree of algebra statements

use crate::app::models::{AbsoluteTime, TemporalExtent, TemporalType, TimeInstant};
use crate::constants::SECONDS_PER_DAY;
use crate::{Error, Result};
use chrono::{Datelike, Timelike};
use std::fmt;
use std::str::FromStr;

/// `output = expression`
#[derive(Debug, Clone, PartialEq)]
pub struct AlgebraStatement {
    /// Name of the space-time dataset to create
    pub output: String,
    pub expression: Expr,
}

impl fmt::Display for AlgebraStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.output, self.expression)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
        }
    }
}

/// Spatial part of a neighbour offset, rendered into the backend expression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SpatialOffset {
    pub row: i64,
    pub col: i64,
    /// Only meaningful for 3D rasters
    pub depth: Option<i64>,
}

/// Neighbour offset of a dataset reference.
///
/// One value is a temporal offset, two are `(row, col)`, three are
/// `(row, col, depth)` and four are `(row, col, depth, time)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NeighborOffset {
    /// Shift in slots; `-1` is the previous slot
    pub time: i64,
    pub spatial: Option<SpatialOffset>,
}

impl NeighborOffset {
    pub fn from_values(values: &[i64]) -> Option<Self> {
        match *values {
            [time] => Some(Self {
                time,
                spatial: None,
            }),
            [row, col] => Some(Self {
                time: 0,
                spatial: Some(SpatialOffset {
                    row,
                    col,
                    depth: None,
                }),
            }),
            [row, col, depth] => Some(Self {
                time: 0,
                spatial: Some(SpatialOffset {
                    row,
                    col,
                    depth: Some(depth),
                }),
            }),
            [row, col, depth, time] => Some(Self {
                time,
                spatial: Some(SpatialOffset {
                    row,
                    col,
                    depth: Some(depth),
                }),
            }),
            _ => None,
        }
    }
}

/// A dataset named in an expression
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetRef {
    /// As written, possibly unqualified
    pub name: String,
    pub offset: NeighborOffset,
    /// Character position of the name in the statement
    pub position: usize,
}

impl fmt::Display for DatasetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        let offset = self.offset;
        match offset.spatial {
            None if offset.time == 0 => Ok(()),
            None => write!(f, "[{}]", offset.time),
            Some(SpatialOffset { row, col, depth: None }) => write!(f, "[{},{}]", row, col),
            Some(SpatialOffset {
                row,
                col,
                depth: Some(depth),
            }) if offset.time == 0 => write!(f, "[{},{},{}]", row, col, depth),
            Some(SpatialOffset {
                row,
                col,
                depth: Some(depth),
            }) => write!(f, "[{},{},{},{}]", row, col, depth, offset.time),
        }
    }
}

/// Functions of a map's time stamp, replaced by a number in every slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemporalFunction {
    /// Duration in days for absolute time, in raw units for relative time
    Td,
    StartYear,
    StartMonth,
    StartDay,
    StartDoy,
    StartHour,
}

impl TemporalFunction {
    pub fn name(&self) -> &'static str {
        match self {
            TemporalFunction::Td => "td",
            TemporalFunction::StartYear => "start_year",
            TemporalFunction::StartMonth => "start_month",
            TemporalFunction::StartDay => "start_day",
            TemporalFunction::StartDoy => "start_doy",
            TemporalFunction::StartHour => "start_hour",
        }
    }

    /// True if the function reads calendar fields and needs absolute time
    pub fn needs_absolute_time(&self) -> bool {
        !matches!(self, TemporalFunction::Td)
    }

    /// Value of the function for a map with the given extent
    pub fn apply(&self, extent: &TemporalExtent) -> Result<f64> {
        if let TemporalFunction::Td = self {
            return Ok(match extent.temporal_type() {
                TemporalType::Absolute => extent.duration() / SECONDS_PER_DAY as f64,
                TemporalType::Relative => extent.duration(),
            });
        }

        let start = match extent.start() {
            TimeInstant::Absolute(time) => time,
            other => {
                return Err(Error::type_mismatch("absolute time", other.kind_label()));
            }
        };
        Ok(self.calendar_field(start))
    }

    fn calendar_field(&self, time: &AbsoluteTime) -> f64 {
        let datetime = time.datetime();
        match self {
            TemporalFunction::StartYear => f64::from(datetime.year()),
            TemporalFunction::StartMonth => f64::from(datetime.month()),
            TemporalFunction::StartDay => f64::from(datetime.day()),
            TemporalFunction::StartDoy => f64::from(datetime.ordinal()),
            TemporalFunction::StartHour => f64::from(datetime.hour()),
            TemporalFunction::Td => 0.0,
        }
    }
}

impl fmt::Display for TemporalFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TemporalFunction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "td" => Ok(TemporalFunction::Td),
            "start_year" => Ok(TemporalFunction::StartYear),
            "start_month" => Ok(TemporalFunction::StartMonth),
            "start_day" => Ok(TemporalFunction::StartDay),
            "start_doy" => Ok(TemporalFunction::StartDoy),
            "start_hour" => Ok(TemporalFunction::StartHour),
            other => Err(Error::invalid_value(format!(
                "Unknown temporal function '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Numeric literal as written
    Number(String),
    Dataset(DatasetRef),
    Function {
        function: TemporalFunction,
        argument: DatasetRef,
    },
    Negate(Box<Expr>),
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// Parenthesized sub-expression, kept so rendering preserves the grouping
    Group(Box<Expr>),
}

impl Expr {
    /// Dataset references and function calls, left to right
    pub fn leaves(&self) -> Vec<&Expr> {
        let mut leaves = Vec::new();
        self.collect_leaves(&mut leaves);
        leaves
    }

    fn collect_leaves<'a>(&'a self, leaves: &mut Vec<&'a Expr>) {
        match self {
            Expr::Number(_) => {}
            Expr::Dataset(_) | Expr::Function { .. } => leaves.push(self),
            Expr::Negate(inner) | Expr::Group(inner) => inner.collect_leaves(leaves),
            Expr::Binary { left, right, .. } => {
                left.collect_leaves(leaves);
                right.collect_leaves(leaves);
            }
        }
    }

    /// Every dataset reference, in order of appearance; a function
    /// contributes its argument
    pub fn dataset_refs(&self) -> Vec<&DatasetRef> {
        self.leaves()
            .into_iter()
            .filter_map(|leaf| match leaf {
                Expr::Dataset(reference) => Some(reference),
                Expr::Function { argument, .. } => Some(argument),
                _ => None,
            })
            .collect()
    }

    /// Render the expression, replacing leaves through `leaf`.
    ///
    /// `leaf` receives every dataset reference and every function call and
    /// returns the text to emit in its place.
    pub fn render_with<F>(&self, leaf: &mut F) -> Result<String>
    where
        F: FnMut(&Expr) -> Result<String>,
    {
        Ok(match self {
            Expr::Number(text) => text.clone(),
            Expr::Dataset(_) | Expr::Function { .. } => leaf(self)?,
            Expr::Negate(inner) => format!("-{}", inner.render_with(leaf)?),
            Expr::Binary { op, left, right } => format!(
                "{} {} {}",
                left.render_with(leaf)?,
                op.symbol(),
                right.render_with(leaf)?
            ),
            Expr::Group(inner) => format!("({})", inner.render_with(leaf)?),
        })
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered = self.render_with(&mut |leaf| {
            Ok(match leaf {
                Expr::Dataset(reference) => reference.to_string(),
                Expr::Function { function, argument } => format!("{}({})", function, argument),
                other => format!("{:?}", other),
            })
        });
        match rendered {
            Ok(text) => f.write_str(&text),
            Err(_) => Err(fmt::Error),
        }
    }
}

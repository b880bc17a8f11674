//! Sampling methods and the relations they accept

use crate::app::services::topology::Relation;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// How a map must relate to a slot to take part in it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SamplingMethod {
    Equal,
    /// Map lies inside the slot, touching boundaries included
    During,
    /// Map covers the slot, touching boundaries included
    Contains,
    /// Map partially overlaps the slot on either side
    Overlap,
    Starts,
    Finishes,
    /// Map ends before the slot starts or exactly at its start
    Precedes,
    /// Map starts after the slot ends or exactly at its end
    Follows,
}

impl SamplingMethod {
    pub const ALL: [SamplingMethod; 8] = [
        SamplingMethod::Equal,
        SamplingMethod::During,
        SamplingMethod::Contains,
        SamplingMethod::Overlap,
        SamplingMethod::Starts,
        SamplingMethod::Finishes,
        SamplingMethod::Precedes,
        SamplingMethod::Follows,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SamplingMethod::Equal => "equal",
            SamplingMethod::During => "during",
            SamplingMethod::Contains => "contains",
            SamplingMethod::Overlap => "overlap",
            SamplingMethod::Starts => "starts",
            SamplingMethod::Finishes => "finishes",
            SamplingMethod::Precedes => "precedes",
            SamplingMethod::Follows => "follows",
        }
    }

    /// Relations of a map to the slot accepted by this method
    pub fn relations(&self) -> &'static [Relation] {
        match self {
            SamplingMethod::Equal => &[Relation::Equal],
            SamplingMethod::During => &[Relation::During, Relation::Starts, Relation::Finishes],
            SamplingMethod::Contains => &[
                Relation::Contains,
                Relation::StartedBy,
                Relation::FinishedBy,
            ],
            SamplingMethod::Overlap => &[Relation::Overlaps, Relation::OverlappedBy],
            SamplingMethod::Starts => &[Relation::Starts],
            SamplingMethod::Finishes => &[Relation::Finishes],
            SamplingMethod::Precedes => &[Relation::Precedes, Relation::Meets],
            SamplingMethod::Follows => &[Relation::Follows, Relation::MetBy],
        }
    }
}

impl fmt::Display for SamplingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SamplingMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_lowercase();
        let wanted = match wanted.as_str() {
            "overlaps" | "overlapped" => "overlap",
            "start" => "starts",
            "finish" => "finishes",
            other => other,
        };
        SamplingMethod::ALL
            .iter()
            .copied()
            .find(|method| method.as_str() == wanted)
            .ok_or_else(|| {
                Error::invalid_value(format!(
                    "Unknown sampling method '{}' (expected one of {})",
                    s.trim(),
                    SamplingMethod::ALL.map(|m| m.as_str()).join(",")
                ))
            })
    }
}

/// A non-empty set of sampling methods
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSet {
    methods: BTreeSet<SamplingMethod>,
    relations: BTreeSet<Relation>,
}

impl MethodSet {
    pub fn new(methods: impl IntoIterator<Item = SamplingMethod>) -> Result<Self> {
        let methods: BTreeSet<SamplingMethod> = methods.into_iter().collect();
        if methods.is_empty() {
            return Err(Error::invalid_value("At least one sampling method is required"));
        }
        let relations = methods
            .iter()
            .flat_map(|method| method.relations().iter().copied())
            .collect();
        Ok(Self { methods, relations })
    }

    pub fn single(method: SamplingMethod) -> Self {
        let relations = method.relations().iter().copied().collect();
        Self {
            methods: BTreeSet::from([method]),
            relations,
        }
    }

    /// Parse a comma separated list such as `"during,overlap"`
    pub fn parse(text: &str) -> Result<Self> {
        let methods = text
            .split(',')
            .filter(|part| !part.trim().is_empty())
            .map(str::parse)
            .collect::<Result<Vec<SamplingMethod>>>()?;
        Self::new(methods)
    }

    pub fn accepts(&self, relation: Relation) -> bool {
        self.relations.contains(&relation)
    }

    /// True if maps strictly separated from a slot can be selected
    pub fn needs_disjoint_pairs(&self) -> bool {
        self.relations.iter().any(Relation::is_disjoint)
    }

    pub fn methods(&self) -> impl Iterator<Item = SamplingMethod> + '_ {
        self.methods.iter().copied()
    }
}

impl Default for MethodSet {
    fn default() -> Self {
        Self::single(SamplingMethod::Equal)
    }
}

impl fmt::Display for MethodSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.methods.iter().map(SamplingMethod::as_str).collect();
        f.write_str(&names.join(","))
    }
}

impl FromStr for MethodSet {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

use crate::models::Rank;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use tracing::warn;

/// Separator used in stored transition keys, with or without surrounding spaces.
pub const SEPARATOR: char = '→';

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Transition {
    pub from: Rank,
    pub to: Rank,
}

impl Transition {
    pub fn new(from: impl Into<Rank>, to: impl Into<Rank>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }

    /// Accepts both `"Verte→Bleue"` and `"Verte → Bleue"`.
    pub fn parse(key: &str) -> Option<Self> {
        let (from, to) = key.split_once(SEPARATOR)?;
        let (from, to) = (from.trim(), to.trim());
        if from.is_empty() || to.is_empty() {
            return None;
        }
        Some(Self::new(from, to))
    }

    pub fn key(&self) -> String {
        format!("{}{SEPARATOR}{}", self.from, self.to)
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {SEPARATOR} {}", self.from, self.to)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub transition: Transition,
    pub required_score: u32,
}

/// Ordered mapping from rank transitions to point thresholds.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RuleTable {
    rules: Vec<Rule>,
}

impl RuleTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn defaults() -> Self {
        [
            ("Blanche", "Jaune", 30),
            ("Jaune", "Orange", 40),
            ("Orange", "Mauve", 50),
            ("Mauve", "Verte", 60),
            ("Verte", "Verte / Bleue", 40),
            ("Verte / Bleue", "Bleue", 40),
            ("Bleue", "Bleue / Brune", 100),
            ("Bleue / Brune", "Brune", 40),
            ("Brune", "Brune / Noire", 100),
            ("Brune / Noire", "Noire", 120),
        ]
        .into_iter()
        .map(|(from, to, score)| (Transition::new(from, to), score))
        .collect()
    }

    /// Replaces the threshold of an existing transition or appends a new one.
    pub fn insert(&mut self, transition: Transition, required_score: u32) {
        match self.rules.iter_mut().find(|rule| rule.transition == transition) {
            Some(rule) => rule.required_score = required_score,
            None => self.rules.push(Rule {
                transition,
                required_score,
            }),
        }
    }

    /// First rule leaving `rank`, in table order.
    pub fn from_rank(&self, rank: &Rank) -> Option<&Rule> {
        self.rules.iter().find(|rule| &rule.transition.from == rank)
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    // Historical tables may hold the same transition under both separator styles.
    fn push_first(&mut self, transition: Transition, required_score: u32) {
        if self.rules.iter().all(|rule| rule.transition != transition) {
            self.rules.push(Rule {
                transition,
                required_score,
            });
        }
    }
}

impl FromIterator<(Transition, u32)> for RuleTable {
    fn from_iter<I: IntoIterator<Item = (Transition, u32)>>(iter: I) -> Self {
        let mut table = Self::new();
        for (transition, score) in iter {
            table.insert(transition, score);
        }
        table
    }
}

impl Serialize for RuleTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.rules.len()))?;
        for rule in &self.rules {
            map.serialize_entry(&rule.transition.key(), &rule.required_score)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for RuleTable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(RuleTableVisitor)
    }
}

struct RuleTableVisitor;

impl<'de> Visitor<'de> for RuleTableVisitor {
    type Value = RuleTable;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map of rank transitions to point thresholds")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<RuleTable, A::Error> {
        let mut table = RuleTable::new();
        while let Some((key, value)) = access.next_entry::<String, serde_json::Value>()? {
            let Some(transition) = Transition::parse(&key) else {
                warn!("skipping rule with unparseable transition key {key:?}");
                continue;
            };
            let score = value
                .as_u64()
                .filter(|score| *score > 0)
                .and_then(|score| u32::try_from(score).ok());
            match score {
                Some(score) => table.push_first(transition, score),
                None => warn!("skipping rule {key:?} with invalid threshold {value}"),
            }
        }
        Ok(table)
    }
}

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;

pub type ParticipantName = String;

/// Upper bound on the number of wishes a participant keeps.
pub const MAX_WISHES: usize = 5;

/// Shuffles tried before a draw gives up.
pub const MAX_DRAW_ATTEMPTS: usize = 1000;

/// Roster used on first boot when no roster document exists yet.
pub const DEFAULT_NAMES: [&str; 8] = [
    "Ania", "Bartek", "Celina", "Daniel", "Ewa", "Filip", "Gosia", "Hubert",
];

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Wish {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub note: String,
}

impl Wish {
    pub fn new(url: impl Into<String>, note: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            note: note.into(),
        }
    }

    fn trimmed(self) -> Self {
        Self {
            url: self.url.trim().to_string(),
            note: self.note.trim().to_string(),
        }
    }

    fn is_blank(&self) -> bool {
        self.url.is_empty() && self.note.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Participant {
    pub name: ParticipantName,
    #[serde(default)]
    pub wishlist: Vec<Wish>,
}

impl Participant {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            wishlist: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Roster {
    #[serde(default)]
    pub users: Vec<Participant>,
}

impl Roster {
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            users: names.into_iter().map(Participant::new).collect(),
        }
    }

    /// The first-boot roster: every default name with an empty wishlist.
    pub fn seeded() -> Self {
        Self::from_names(DEFAULT_NAMES)
    }

    pub fn find(&self, name: &str) -> Option<&Participant> {
        self.users.iter().find(|p| p.name == name)
    }

    pub fn find_mut(&mut self, name: &str) -> Option<&mut Participant> {
        self.users.iter_mut().find(|p| p.name == name)
    }

    /// Names in roster order.
    pub fn names(&self) -> Vec<ParticipantName> {
        self.users.iter().map(|p| p.name.clone()).collect()
    }
}

/// Giver name to recipient name.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Assignments(BTreeMap<ParticipantName, ParticipantName>);

impl Assignments {
    pub fn recipient_of(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// True when the mapping is a permutation of `names` with no fixed point.
    pub fn is_derangement_of(&self, names: &[ParticipantName]) -> bool {
        let expected: HashSet<&str> = names.iter().map(String::as_str).collect();
        if expected.len() != names.len() || self.0.len() != names.len() {
            return false;
        }
        let givers: HashSet<&str> = self.0.keys().map(String::as_str).collect();
        let recipients: HashSet<&str> = self.0.values().map(String::as_str).collect();
        givers == expected
            && recipients == expected
            && self.0.iter().all(|(giver, recipient)| giver != recipient)
    }
}

impl FromIterator<(ParticipantName, ParticipantName)> for Assignments {
    fn from_iter<I: IntoIterator<Item = (ParticipantName, ParticipantName)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DrawError {
    #[error("need at least two participants to draw, got {count}")]
    TooFewParticipants { count: usize },
    #[error("participant {0:?} appears more than once")]
    DuplicateName(ParticipantName),
    #[error("no derangement found after {attempts} shuffles")]
    Exhausted { attempts: usize },
}

/// Shuffles `items` until no position holds its original element.
///
/// Gives up with [`DrawError::Exhausted`] after `max_attempts` shuffles
/// (at least one is always tried). An empty input is returned as is.
pub fn derange<T, R>(items: &[T], rng: &mut R, max_attempts: usize) -> Result<Vec<T>, DrawError>
where
    T: PartialEq + Clone,
    R: Rng + ?Sized,
{
    let attempts = max_attempts.max(1);
    let mut shuffled = items.to_vec();
    for _ in 0..attempts {
        shuffled.shuffle(rng);
        if items.iter().zip(&shuffled).all(|(a, b)| a != b) {
            return Ok(shuffled);
        }
    }
    Err(DrawError::Exhausted { attempts })
}

/// Draws a Secret Santa mapping over `names`.
pub fn draw<R>(names: &[ParticipantName], rng: &mut R) -> Result<Assignments, DrawError>
where
    R: Rng + ?Sized,
{
    if names.len() < 2 {
        return Err(DrawError::TooFewParticipants { count: names.len() });
    }
    let mut seen = HashSet::with_capacity(names.len());
    if let Some(dup) = names.iter().find(|n| !seen.insert(n.as_str())) {
        return Err(DrawError::DuplicateName(dup.clone()));
    }

    let recipients = derange(names, rng, MAX_DRAW_ATTEMPTS)?;
    Ok(names.iter().cloned().zip(recipients).collect())
}

/// Keeps the first [`MAX_WISHES`] entries, trims both fields and drops
/// entries left with neither a url nor a note.
pub fn normalize_wishlist<I>(entries: I) -> Vec<Wish>
where
    I: IntoIterator<Item = Wish>,
{
    entries
        .into_iter()
        .take(MAX_WISHES)
        .map(Wish::trimmed)
        .filter(|w| !w.is_blank())
        .collect()
}

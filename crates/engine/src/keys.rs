//! Key tokens and chords as written in binding files: `"g,g"`, `"alt+x"`,
//! `"ctrl+s"`, `"enter"`.

use std::{fmt, str::FromStr};

use shared::error::{GraphError, Result};

const NAMED: &[&str] = &[
    "enter",
    "esc",
    "tab",
    "shift+tab",
    "backspace",
    "delete",
    "up",
    "down",
    "left",
    "right",
    "home",
    "end",
    "pgup",
    "pgdown",
    "space",
    "f1",
    "f2",
    "f3",
    "f4",
    "f5",
    "f6",
    "f7",
    "f8",
    "f9",
    "f10",
    "f11",
    "f12",
];

/// One key press. Named keys and `ctrl+` combinations are stored lowercase;
/// single characters keep their case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key {
    alt: bool,
    name: String,
}

impl Key {
    pub fn parse(token: &str) -> Result<Self> {
        if token == " " {
            return Ok(Self {
                alt: false,
                name: "space".into(),
            });
        }
        let (alt, rest) = match token.strip_prefix("alt+") {
            Some(rest) => (true, rest),
            None => (false, token),
        };
        if rest.is_empty() {
            return Err(GraphError::InvalidInput(format!("key token '{token}' is empty")));
        }
        if rest.contains(',') {
            return Err(GraphError::InvalidInput(
                "',' separates chord tokens and cannot be bound".into(),
            ));
        }

        let lower = rest.to_ascii_lowercase();
        let name = if NAMED.contains(&lower.as_str()) {
            lower
        } else if let Some(combined) = lower.strip_prefix("ctrl+") {
            if combined.chars().count() != 1 {
                return Err(GraphError::InvalidInput(format!("unknown key '{token}'")));
            }
            lower
        } else if rest.chars().count() == 1 {
            rest.to_string()
        } else {
            return Err(GraphError::InvalidInput(format!("unknown key '{token}'")));
        };
        Ok(Self { alt, name })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn alt(&self) -> bool {
        self.alt
    }

    /// The typed character, for keys that insert text.
    pub fn text(&self) -> Option<char> {
        if self.alt {
            return None;
        }
        if self.name == "space" {
            return Some(' ');
        }
        let mut chars = self.name.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Some(c),
            _ => None,
        }
    }

    pub fn is(&self, name: &str) -> bool {
        !self.alt && self.name == name
    }
}

impl FromStr for Key {
    type Err = GraphError;

    fn from_str(token: &str) -> Result<Self> {
        Self::parse(token)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.alt {
            f.write_str("alt+")?;
        }
        f.write_str(&self.name)
    }
}

/// Ordered key sequence. The empty chord means "unbound".
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Chord(Vec<Key>);

impl Chord {
    pub fn new(keys: Vec<Key>) -> Self {
        Self(keys)
    }

    pub fn parse(text: &str) -> Result<Self> {
        if text.is_empty() {
            return Ok(Self::default());
        }
        text.split(',')
            .map(Key::parse)
            .collect::<Result<Vec<_>>>()
            .map(Self)
    }

    pub fn keys(&self) -> &[Key] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn push(&mut self, key: Key) {
        self.0.push(key);
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn last(&self) -> Option<&Key> {
        self.0.last()
    }

    /// Token-wise: `g` is a prefix of `g,g` but not of `gg`.
    pub fn starts_with(&self, prefix: &Chord) -> bool {
        self.0.starts_with(&prefix.0)
    }

    pub fn prefix(&self, len: usize) -> Chord {
        Self(self.0[..len.min(self.0.len())].to_vec())
    }

    pub fn prepended(&self, prefix: &Chord) -> Chord {
        Self(prefix.0.iter().chain(self.0.iter()).cloned().collect())
    }
}

impl FromStr for Chord {
    type Err = GraphError;

    fn from_str(text: &str) -> Result<Self> {
        Self::parse(text)
    }
}

impl fmt::Display for Chord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, key) in self.0.iter().enumerate() {
            if index > 0 {
                f.write_str(",")?;
            }
            write!(f, "{key}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/keys_tests.rs"]
mod tests;

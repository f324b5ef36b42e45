//! Seeded user personas and their expected behavioural quirks
//!
//! Scenarios look personas up by id so credential literals never appear in
//! test bodies. Quirks are a capability set rather than a persona type: code
//! that cares asks `persona.has(QuirkKind::...)`.

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

use crate::error::{HarnessError, HarnessResult};

/// Password shared by every seeded account on the demo site
pub const SHARED_PASSWORD: &str = "secret_sauce";

/// A known deviation from the baseline user's behaviour
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuirkKind {
    /// Login is refused with an error banner
    LoginBlocked,
    /// Login succeeds after a noticeable delay
    LoginDelayed,
    /// Product images are wrong
    VisualCorruption,
    /// Some cart actions may silently do nothing
    ActionUnreliable,
}

/// Whether a quirk is expected to show up on every run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Determinism {
    Deterministic,
    /// May or may not manifest; observe and report, never assert one outcome
    Flaky,
}

impl QuirkKind {
    pub fn determinism(self) -> Determinism {
        match self {
            QuirkKind::LoginBlocked | QuirkKind::LoginDelayed | QuirkKind::VisualCorruption => {
                Determinism::Deterministic
            }
            QuirkKind::ActionUnreliable => Determinism::Flaky,
        }
    }
}

impl fmt::Display for QuirkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            QuirkKind::LoginBlocked => "LOGIN_BLOCKED",
            QuirkKind::LoginDelayed => "LOGIN_DELAYED",
            QuirkKind::VisualCorruption => "VISUAL_CORRUPTION",
            QuirkKind::ActionUnreliable => "ACTION_UNRELIABLE",
        };
        f.write_str(name)
    }
}

/// What a scenario saw when exercising a flaky quirk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuirkObservation {
    Manifested,
    NotManifested,
}

/// Username/password pair handed to the login form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Credentials<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

/// A named credential set with its quirk profile. An empty quirk set is the
/// baseline (NONE) behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Persona {
    pub id: &'static str,
    pub username: &'static str,
    #[serde(skip)]
    pub password: &'static str,
    pub expected_quirks: BTreeSet<QuirkKind>,
}

impl Persona {
    fn new(id: &'static str, username: &'static str, quirks: &[QuirkKind]) -> Self {
        Self {
            id,
            username,
            password: SHARED_PASSWORD,
            expected_quirks: quirks.iter().copied().collect(),
        }
    }

    pub fn credentials(&self) -> Credentials<'_> {
        Credentials {
            username: self.username,
            password: self.password,
        }
    }

    pub fn has(&self, quirk: QuirkKind) -> bool {
        self.expected_quirks.contains(&quirk)
    }

    pub fn is_baseline(&self) -> bool {
        self.expected_quirks.is_empty()
    }

    /// Whether a login attempt should land on the inventory page
    pub fn can_log_in(&self) -> bool {
        !self.has(QuirkKind::LoginBlocked)
    }
}

impl fmt::Display for Persona {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.id, self.username)?;
        if !self.expected_quirks.is_empty() {
            let quirks: Vec<String> = self.expected_quirks.iter().map(|q| q.to_string()).collect();
            write!(f, " [{}]", quirks.join(", "))?;
        }
        Ok(())
    }
}

/// Read-only registry of the site's seeded accounts
#[derive(Debug, Clone)]
pub struct PersonaRegistry {
    personas: Vec<Persona>,
}

impl Default for PersonaRegistry {
    fn default() -> Self {
        Self::seeded()
    }
}

impl PersonaRegistry {
    /// The four accounts the demo site ships with
    pub fn seeded() -> Self {
        Self {
            personas: vec![
                Persona::new("standard", "standard_user", &[]),
                Persona::new("locked", "locked_out_user", &[QuirkKind::LoginBlocked]),
                Persona::new(
                    "problem",
                    "problem_user",
                    &[QuirkKind::VisualCorruption, QuirkKind::ActionUnreliable],
                ),
                Persona::new(
                    "performance",
                    "performance_glitch_user",
                    &[QuirkKind::LoginDelayed],
                ),
            ],
        }
    }

    pub fn lookup(&self, id: &str) -> HarnessResult<&Persona> {
        self.personas
            .iter()
            .find(|p| p.id == id)
            .ok_or_else(|| HarnessError::UnknownPersona(id.to_string()))
    }

    /// Resolve several ids at once, failing on the first unknown one
    pub fn lookup_all(&self, ids: &[&str]) -> HarnessResult<Vec<&Persona>> {
        ids.iter().map(|id| self.lookup(id)).collect()
    }

    pub fn baseline(&self) -> &Persona {
        self.personas
            .iter()
            .find(|p| p.is_baseline())
            .unwrap_or(&self.personas[0])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Persona> {
        self.personas.iter()
    }

    /// Personas that are expected to reach the inventory page
    pub fn able_to_log_in(&self) -> impl Iterator<Item = &Persona> {
        self.personas.iter().filter(|p| p.can_log_in())
    }
}

//! saucedemo-harness - page objects, persona fixtures and cross-persona checks
//! for the Sauce Labs demo storefront.
//!
//! Page objects drive the site through the [`session::Session`] seam, which is
//! backed either by a real browser (feature `browser`) or by the in-process
//! [`sim::Storefront`].

#[cfg(feature = "browser")]
pub mod browser;
pub mod compare;
pub mod config;
pub mod error;
pub mod locator;
pub mod logging;
pub mod pages;
pub mod persona;
pub mod poll;
pub mod product;
pub mod scenario;
pub mod session;
pub mod sim;

pub use compare::{ComparativeVerifier, ComparisonPolicy, ComparisonReport, FieldPolicy};
pub use config::HarnessConfig;
pub use error::{HarnessError, HarnessResult, SessionError};
pub use persona::{Persona, PersonaRegistry, QuirkKind};
pub use scenario::{Scenario, ScenarioOutcome, ScenarioRunner};
pub use session::{Session, SessionFactory};

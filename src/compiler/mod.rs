//! Action-rule compiler
//!
//! Compiles symbolic action rules into connection specifications.
//!
//! ## Overview
//!
//! The compiler transforms rule strings such as
//!
//! ```text
//! buffer2 = buffer1 * B
//! buffer3 = ~buffer1
//! motor   = translate(vision, populate=True)
//! ```
//!
//! into a [`ConnectionPlan`]: for every target module, a merged list of
//! weighted connection specifications the downstream graph builder
//! realizes. Each specification's source is one of
//!
//! | Rule construct            | Realization                              |
//! |---------------------------|------------------------------------------|
//! | `b = a` (same dimensions) | direct route, no transform               |
//! | `b = a * X` (X a symbol)  | one linear transform (circulant of X)    |
//! | `b = ~a`                  | involution permutation transform         |
//! | `b = A` (A a symbol)      | constant drive                           |
//! | `c = a * b` (two modules) | two-input binding network                |
//! | `translate(a, …)`         | cross-vocabulary translation matrix      |
//!
//! ## Pipeline
//!
//! rule strings → [`parser`] → [`ActionRule`] ASTs → [`resolver`] →
//! merged [`ConnectionPlan`] committed into the [`crate::network::Network`].
//!
//! Resolution errors abort the whole batch; no partial plan is ever
//! committed. Vocabulary symbols auto-created while resolving earlier rules
//! of a failing batch DO remain registered: population is a durable side
//! effect independent of compile success.

pub mod parser;
pub mod resolver;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::algebra::{self, LinearMap, SemanticPointer};
use crate::network::Network;
use crate::{ActionError, Result};

/// One node of a parsed rule expression.
///
/// A closed set matched exhaustively by the resolver: adding a node kind
/// requires updating every match site, trading open extensibility for
/// compile-time completeness checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// Reference to a declared module (identifier with a lowercase first
    /// character).
    Module(String),
    /// Vocabulary symbol (identifier with an uppercase first character).
    Symbol(String),
    /// Numeric literal; acts as a scalar weight under binding.
    Scalar(f64),
    /// `~expr` — involution.
    Invert(Box<Expr>),
    /// `left * right` — binding.
    Bind(Box<Expr>, Box<Expr>),
    /// `left + right` — superposition.
    Sum(Box<Expr>, Box<Expr>),
    /// `translate(expr, populate=<bool>)` — move the value of `expr` from
    /// its source vocabulary into the target module's vocabulary.
    Translate {
        /// The translated sub-expression; must reference a module.
        expr: Box<Expr>,
        /// Whether a missing translation map may be auto-built, populating
        /// the target vocabulary as a side effect.
        populate: bool,
    },
}

/// One parsed assignment: a target module and its effect expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRule {
    /// Name of the module receiving the effect.
    pub target: String,
    /// The right-hand-side expression.
    pub effect: Expr,
}

/// A batch of action-rule strings compiled together.
///
/// Multiple assignments, whether comma-separated within one string or
/// given as separate strings, are independent rules that may share a
/// target module; their contributions merge additively.
#[derive(Debug, Clone, Default)]
pub struct Actions {
    rules: Vec<String>,
}

impl Actions {
    /// Create a batch from rule strings.
    pub fn new<I, S>(rules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            rules: rules.into_iter().map(Into::into).collect(),
        }
    }

    /// Append one more rule string.
    pub fn add(mut self, rule: impl Into<String>) -> Self {
        self.rules.push(rule.into());
        self
    }

    /// Parse every rule string without resolving names.
    pub fn parse(&self) -> Result<Vec<ActionRule>> {
        let mut rules = Vec::new();
        for source in &self.rules {
            rules.extend(parser::parse_rules(source)?);
        }
        Ok(rules)
    }

    /// Compile the batch against a network: parse, resolve, merge, and
    /// commit the resulting plan.
    ///
    /// Fails atomically: on any error no plan is committed. Vocabulary
    /// symbols auto-populated while resolving earlier rules of a failing
    /// batch remain registered (durable side effect, see module docs).
    pub fn build(&self, network: &mut Network) -> Result<ConnectionPlan> {
        network.ensure_mutable()?;
        let rules = self.parse()?;
        debug!(rules = rules.len(), "compiling action batch");
        let plan = resolver::resolve(network, &rules)?;
        network.commit(&plan)?;
        Ok(plan)
    }
}

/// A module output feeding a connection, optionally through a fixed
/// linear transform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleTap {
    /// Source module name.
    pub module: String,
    /// Transform applied to the module's output; `None` is a direct route.
    pub transform: Option<LinearMap>,
}

/// The source side of one connection specification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SignalSource {
    /// A fixed vector driving the target.
    Constant(SemanticPointer),
    /// A single module output, optionally transformed.
    Module(ModuleTap),
    /// A genuine two-input binding of two module outputs. Materially more
    /// expensive than the constant-operand case, so flagged distinctly for
    /// the downstream builder.
    BindingNetwork {
        /// First operand.
        a: ModuleTap,
        /// Second operand.
        b: ModuleTap,
        /// Transform applied to the bound result.
        transform: Option<LinearMap>,
    },
}

/// One weighted contribution into a target module's input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionSpec {
    /// What feeds the connection.
    pub source: SignalSource,
    /// Scalar weight on the contribution.
    pub weight: f64,
}

impl ConnectionSpec {
    /// Whether this is a plain pass-through of a module output.
    pub fn is_direct(&self) -> bool {
        matches!(
            &self.source,
            SignalSource::Module(ModuleTap { transform: None, .. })
        )
    }

    /// Whether realizing this connection requires a two-input binding
    /// network.
    pub fn requires_binding_network(&self) -> bool {
        matches!(&self.source, SignalSource::BindingNetwork { .. })
    }
}

/// The compiler's output: per-target merged connection specifications.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectionPlan {
    connections: HashMap<String, Vec<ConnectionSpec>>,
}

impl ConnectionPlan {
    /// Number of target modules with at least one connection.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Whether the plan is empty.
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Target module names.
    pub fn targets(&self) -> impl Iterator<Item = &str> {
        self.connections.keys().map(String::as_str)
    }

    /// Connections into one target, in first-contribution order.
    pub fn connections(&self, target: &str) -> &[ConnectionSpec] {
        self.connections.get(target).map_or(&[], Vec::as_slice)
    }

    /// Add a contribution, merging with an existing equivalent one.
    ///
    /// Constant drives fold into a single weighted constant per target;
    /// module routes and binding networks with identical taps and
    /// transforms fold their weights.
    pub(crate) fn push(&mut self, target: &str, spec: ConnectionSpec) -> Result<()> {
        let specs = self.connections.entry(target.to_string()).or_default();
        let ConnectionSpec { source, weight } = spec;
        match source {
            SignalSource::Constant(vector) => {
                let scaled = vector.scale(weight);
                for existing in specs.iter_mut() {
                    if let SignalSource::Constant(ref held) = existing.source {
                        let merged = algebra::superpose(&held.scale(existing.weight), &scaled)?;
                        existing.source = SignalSource::Constant(merged);
                        existing.weight = 1.0;
                        return Ok(());
                    }
                }
                specs.push(ConnectionSpec {
                    source: SignalSource::Constant(scaled),
                    weight: 1.0,
                });
            }
            source => {
                for existing in specs.iter_mut() {
                    if existing.source == source {
                        existing.weight += weight;
                        return Ok(());
                    }
                }
                specs.push(ConnectionSpec { source, weight });
            }
        }
        Ok(())
    }

    /// Merge another plan into this one, folding equivalent contributions.
    pub fn merge(&mut self, other: &ConnectionPlan) -> Result<()> {
        for (target, specs) in &other.connections {
            for spec in specs {
                self.push(target, spec.clone())?;
            }
        }
        Ok(())
    }

    /// Noiseless reference evaluation of one target's merged input.
    ///
    /// `inputs` maps module names to their current output vectors; a module
    /// required by the plan but absent from `inputs` is a
    /// [`ActionError::Name`] error, as is an unknown target. This is the
    /// crate-level stand-in for realizing the plan in a graph; the numeric
    /// semantics are exactly those the builder must reproduce.
    pub fn drive(
        &self,
        target: &str,
        inputs: &HashMap<String, SemanticPointer>,
    ) -> Result<SemanticPointer> {
        let specs = self.connections.get(target).ok_or_else(|| ActionError::Name {
            name: target.to_string(),
        })?;
        let mut total: Option<SemanticPointer> = None;
        for spec in specs {
            let value = match &spec.source {
                SignalSource::Constant(vector) => vector.clone(),
                SignalSource::Module(tap) => tap_output(tap, inputs)?,
                SignalSource::BindingNetwork { a, b, transform } => {
                    let bound = algebra::bind(&tap_output(a, inputs)?, &tap_output(b, inputs)?)?;
                    match transform {
                        Some(map) => map.apply(&bound)?,
                        None => bound,
                    }
                }
            };
            let value = value.scale(spec.weight);
            total = Some(match total {
                Some(acc) => algebra::superpose(&acc, &value)?,
                None => value,
            });
        }
        total.ok_or_else(|| ActionError::Name {
            name: target.to_string(),
        })
    }
}

fn tap_output(
    tap: &ModuleTap,
    inputs: &HashMap<String, SemanticPointer>,
) -> Result<SemanticPointer> {
    let output = inputs.get(&tap.module).ok_or_else(|| ActionError::Name {
        name: tap.module.clone(),
    })?;
    match &tap.transform {
        Some(map) => map.apply(output),
        None => Ok(output.clone()),
    }
}

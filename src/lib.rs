//! # hrr-action-compiler
//!
//! Symbolic action-rule compiler: algebraic rules over named vector symbols
//! and named buffer modules → connection specifications for a downstream
//! execution graph.
//!
//! ## Overview
//!
//! This crate compiles human-readable action rules such as
//!
//! ```text
//! buffer2 = buffer1 * B
//! buffer3 = ~buffer1
//! motor   = translate(vision, populate=True)
//! ```
//!
//! into a [`compiler::ConnectionPlan`]: per-module lists of weighted
//! connection specifications (direct routes, fixed linear transforms,
//! two-input binding networks, constant drives) that an external graph
//! builder realizes. Vector symbols live in [`vocabulary::Vocabulary`]
//! instances — per-dimension symbol tables that generate missing symbols
//! deterministically on demand — and combine through the holographic
//! reduced representation algebra in [`algebra`] (circular convolution
//! binding, involution unbinding, superposition).
//!
//! Core capabilities:
//!
//! - **Algebra**: exact circular convolution binding with identity and
//!   involution, plus the dense [`algebra::LinearMap`] type compiled
//!   transforms are expressed in
//! - **Vocabulary**: lazy, seed-deterministic symbol generation and an
//!   algebraic expression evaluator over symbols
//! - **Compiler**: rule DSL → AST → resolved, merged connection plan
//! - **Translation**: linear maps between vocabularies of different
//!   dimensionality, fitted to shared symbols or built as random
//!   orthonormal projections
//! - **Network**: the explicit construction context owning module and
//!   vocabulary registries
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use hrr_action_compiler::prelude::*;
//!
//! let mut net = Network::with_seed(7);
//! net.declare_module("buffer1", 64)?;
//! net.declare_module("buffer2", 64)?;
//!
//! let plan = Actions::new(["buffer2=buffer1*B"]).build(&mut net)?;
//!
//! // Noiseless reference evaluation of the compiled plan
//! let vocab = net.module("buffer1")?.vocabulary();
//! let a = vocab.write().parse("A")?;
//! let mut inputs = std::collections::HashMap::new();
//! inputs.insert("buffer1".to_string(), a);
//! let out = plan.drive("buffer2", &inputs)?;
//! println!("similarity: {:.3}", out.cosine(&vocab.write().parse("A*B")?)?);
//! ```

pub mod algebra;
pub mod compiler;
pub mod network;
pub mod translation;
pub mod vocabulary;

/// Error types for action compilation
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    /// Malformed rule or expression text. Carries the offending substring
    /// and its byte position in the source.
    #[error("syntax error at byte {position}: unexpected input '{fragment}'")]
    Syntax {
        /// The unparsed input at the point of failure (truncated)
        fragment: String,
        /// Byte offset of the failure in the source string
        position: usize,
    },

    /// A module or symbol name could not be resolved. The missing name is
    /// a queryable field so callers can branch on it.
    #[error("name '{name}' could not be resolved")]
    Name {
        /// The identifier that failed to resolve
        name: String,
    },

    /// Two vectors (or a map and a vector) of incompatible lengths met in
    /// an algebra operation.
    #[error("dimension mismatch: {left} vs {right}")]
    DimensionMismatch {
        /// Dimensionality of the left operand
        left: usize,
        /// Dimensionality of the right operand
        right: usize,
    },

    /// A value had to cross between vocabularies of different dimension
    /// and no translation map was available.
    #[error(
        "no translation from dimension {source} to dimension {target}; \
         pass populate=True or register a map"
    )]
    MissingTranslation {
        /// Source vocabulary dimensionality
        source: usize,
        /// Target vocabulary dimensionality
        target: usize,
    },

    /// A vocabulary entry or module was re-declared with a conflicting
    /// definition.
    #[error("conflicting definition for '{name}'")]
    NameConflict {
        /// The name that was redefined
        name: String,
    },

    /// A syntactically valid rule uses a construct with no realization,
    /// e.g. binding three module outputs at runtime.
    #[error("unsupported rule construct: {0}")]
    Unsupported(String),

    /// Invalid configuration or lifecycle misuse (e.g. mutating a frozen
    /// network).
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ActionError {
    /// The unresolved or conflicting name, when this error carries one.
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Name { name } | Self::NameConflict { name } => Some(name),
            _ => None,
        }
    }
}

/// Result type alias for action compilation
pub type Result<T> = std::result::Result<T, ActionError>;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{ActionError, Result};

    // Algebra
    pub use crate::algebra::{
        bind, identity, involution, superpose, LinearMap, SemanticPointer,
    };

    // Vocabulary
    pub use crate::vocabulary::{GenerationPolicy, SharedVocabulary, Vocabulary};

    // Compiler
    pub use crate::compiler::{
        ActionRule, Actions, ConnectionPlan, ConnectionSpec, Expr, ModuleTap, SignalSource,
    };

    // Translation
    pub use crate::translation::TranslationMap;

    // Network
    pub use crate::network::{Module, Network, OutputHandle};
}

//! Network construction context
//!
//! The explicit context object one model build happens inside: it owns the
//! module registry, the per-dimension default vocabularies, any explicitly
//! registered translation maps, and the accumulated connection plan.
//! Lifecycle is explicit API — create with [`Network::new`] /
//! [`Network::with_seed`], compile action batches against it, and
//! [`Network::freeze`] it when construction ends; a frozen network rejects
//! further mutation.
//!
//! Modules declared with a bare dimensionality share the network's default
//! vocabulary for that dimensionality, so same-sized buffers speak the same
//! symbols. Declaring with an explicit vocabulary opts out of sharing.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::compiler::ConnectionPlan;
use crate::translation::TranslationMap;
use crate::vocabulary::{self, GenerationPolicy, SharedVocabulary, Vocabulary};
use crate::{ActionError, Result};

/// The output side of a declared module, consumed by the graph builder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputHandle {
    module: String,
    dimensions: usize,
}

impl OutputHandle {
    /// Name of the module this output belongs to.
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Dimensionality of the output signal.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// A declared buffer module: a name, a vocabulary, and an output handle.
#[derive(Debug, Clone)]
pub struct Module {
    name: String,
    dimensions: usize,
    vocabulary: SharedVocabulary,
    output: OutputHandle,
}

impl Module {
    /// Module name, unique within its network.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Dimensionality of the module's vocabulary and output.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Shared handle on the module's vocabulary.
    pub fn vocabulary(&self) -> SharedVocabulary {
        self.vocabulary.clone()
    }

    /// The output handle consumed by the graph builder.
    pub fn output(&self) -> &OutputHandle {
        &self.output
    }
}

/// One model-construction context.
#[derive(Debug)]
pub struct Network {
    seed: u64,
    policy: GenerationPolicy,
    modules: HashMap<String, Module>,
    vocabularies: HashMap<usize, SharedVocabulary>,
    translations: HashMap<(usize, usize), TranslationMap>,
    plan: ConnectionPlan,
    frozen: bool,
}

impl Network {
    /// Create a context with a seed drawn from OS entropy.
    pub fn new() -> Self {
        Self::with_seed(rand::random::<u64>())
    }

    /// Create a context with an explicit seed. Default vocabularies derive
    /// their seeds from it, so the whole build is reproducible.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed,
            policy: GenerationPolicy::default(),
            modules: HashMap::new(),
            vocabularies: HashMap::new(),
            translations: HashMap::new(),
            plan: ConnectionPlan::default(),
            frozen: false,
        }
    }

    /// Set the generation policy used by default vocabularies created
    /// after this call.
    pub fn with_generation_policy(mut self, policy: GenerationPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The context seed.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Declare a module on the default vocabulary for `dimensions`.
    pub fn declare_module(&mut self, name: &str, dimensions: usize) -> Result<OutputHandle> {
        let vocabulary = self.vocabulary(dimensions);
        self.declare_module_with_vocab(name, vocabulary)
    }

    /// Declare a module on an explicit vocabulary.
    pub fn declare_module_with_vocab(
        &mut self,
        name: &str,
        vocabulary: SharedVocabulary,
    ) -> Result<OutputHandle> {
        self.ensure_mutable()?;
        if self.modules.contains_key(name) {
            return Err(ActionError::NameConflict {
                name: name.to_string(),
            });
        }
        let dimensions = vocabulary.read().dimensions();
        let output = OutputHandle {
            module: name.to_string(),
            dimensions,
        };
        let module = Module {
            name: name.to_string(),
            dimensions,
            vocabulary,
            output: output.clone(),
        };
        debug!(module = name, dimensions, "declared module");
        self.modules.insert(name.to_string(), module);
        Ok(output)
    }

    /// Look up a declared module.
    pub fn module(&self, name: &str) -> Result<&Module> {
        self.modules.get(name).ok_or_else(|| ActionError::Name {
            name: name.to_string(),
        })
    }

    /// A module's output handle and vocabulary, as consumed by the graph
    /// builder.
    pub fn get_output(&self, name: &str) -> Result<(OutputHandle, SharedVocabulary)> {
        let module = self.module(name)?;
        Ok((module.output().clone(), module.vocabulary()))
    }

    /// Declared modules, in no particular order.
    pub fn modules(&self) -> impl Iterator<Item = &Module> {
        self.modules.values()
    }

    /// The default vocabulary for a dimensionality, created on first use
    /// with a seed derived from the context seed.
    pub fn vocabulary(&mut self, dimensions: usize) -> SharedVocabulary {
        let seed = self.seed;
        let policy = self.policy;
        self.vocabularies
            .entry(dimensions)
            .or_insert_with(|| {
                let derived = seed
                    .wrapping_mul(0x9E37_79B9_7F4A_7C15)
                    .wrapping_add(dimensions as u64);
                vocabulary::shared(
                    Vocabulary::with_seed(dimensions, derived).with_policy(policy),
                )
            })
            .clone()
    }

    /// Register an explicit translation map, keyed by its dimension pair.
    /// Rules may then `translate(...)` across that pair without
    /// `populate=True`.
    pub fn register_translation(&mut self, map: TranslationMap) {
        self.translations
            .insert((map.source_dimensions(), map.target_dimensions()), map);
    }

    /// Look up a registered translation map.
    pub fn translation(&self, source: usize, target: usize) -> Option<&TranslationMap> {
        self.translations.get(&(source, target))
    }

    /// Connections committed by every action batch built so far.
    pub fn connection_plan(&self) -> &ConnectionPlan {
        &self.plan
    }

    /// End the construction lifecycle. Declaring modules or building
    /// actions afterwards is a [`ActionError::Config`] error.
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    /// Whether the context has been frozen.
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub(crate) fn ensure_mutable(&self) -> Result<()> {
        if self.frozen {
            return Err(ActionError::Config(
                "the network is frozen; no further declarations or builds".into(),
            ));
        }
        Ok(())
    }

    pub(crate) fn commit(&mut self, plan: &ConnectionPlan) -> Result<()> {
        self.plan.merge(plan)
    }
}

impl Default for Network {
    fn default() -> Self {
        Self::new()
    }
}

pub mod combine;
pub mod inline;
pub mod validate;

pub use combine::{run_combine, CombineOptions, CombinePass};
pub use inline::{inline_call, InlineKind, InlinePass};
pub use validate::ValidatePass;

use crate::error::PassError;
use crate::ir::module::Module;

/// A compiler pass that operates on a `Module` in place.
///
/// Passes must be deterministic: given the same `Module`, the transformed
/// output must be identical across runs (no global mutable state, no
/// randomness).
pub trait Pass {
    /// Human-readable name, used in error messages and diagnostics.
    fn name(&self) -> &'static str;

    /// Run the pass on the module.
    ///
    /// On success, the module is in a valid state for the next pass.
    /// On error, the module state is unspecified — the pipeline aborts.
    fn run(&mut self, module: &mut Module) -> Result<(), PassError>;
}

/// Manages and executes an ordered sequence of compiler passes.
///
/// Passes run in the order they were registered. The pipeline aborts at the
/// first error.
pub struct PassManager {
    passes: Vec<Box<dyn Pass>>,
}

impl PassManager {
    pub fn new() -> Self {
        Self { passes: Vec::new() }
    }

    /// Appends a pass to the end of the pipeline.
    pub fn add_pass(&mut self, pass: impl Pass + 'static) {
        self.passes.push(Box::new(pass));
    }

    /// Runs all passes in registration order on `module`.
    ///
    /// Returns `Err((pass_name, error))` at the first failure.
    pub fn run(&mut self, module: &mut Module) -> Result<(), (String, PassError)> {
        for pass in &mut self.passes {
            log::debug!("running pass '{}'", pass.name());
            pass.run(module).map_err(|e| (pass.name().to_owned(), e))?;
        }
        Ok(())
    }

    /// Returns the names of all registered passes in pipeline order.
    pub fn pass_names(&self) -> Vec<&'static str> {
        self.passes.iter().map(|p| p.name()).collect()
    }
}

impl Default for PassManager {
    fn default() -> Self {
        Self::new()
    }
}

use thiserror::Error;

/// Top-level error type for the optimizer core.
#[derive(Debug, Error)]
pub enum Error {
    #[error("module error: {0}")]
    Module(#[from] ModuleError),

    #[error("pass error: {0}")]
    Pass(#[from] PassError),
}

// ---------------------------------------------------------------------------
// Module construction errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ModuleError {
    #[error("function '{name}' already defined")]
    DuplicateFunction { name: String },

    #[error("type '{name}' already defined")]
    DuplicateTypeDef { name: String },
}

// ---------------------------------------------------------------------------
// Pass errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum PassError {
    #[error("SSA violation in function '{func}': value {value} used before definition")]
    UseBeforeDef { func: String, value: String },

    #[error("SSA violation in function '{func}': value {value} defined more than once")]
    MultipleDefinition { func: String, value: String },

    #[error("block '{block}' in function '{func}' has no terminator")]
    MissingTerminator { func: String, block: String },

    #[error("misplaced terminator in block '{block}' of function '{func}'")]
    MisplacedTerminator { func: String, block: String },

    #[error("use-list inconsistency in function '{func}': {detail}")]
    BrokenUseList { func: String, detail: String },
}

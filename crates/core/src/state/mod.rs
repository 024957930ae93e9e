pub mod run_store;

pub use run_store::{
    validate_input, InputError, Run, RunStatus, RunStore, RunSummary, MAX_INPUT_CHARS, MIN_INPUT_CHARS,
};

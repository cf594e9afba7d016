//! Persisted artifacts that outlive a run: the winning tuning arguments, the
//! tracked-clock declaration, and the reports printed alongside them.

pub mod artifact;
pub mod report;

pub use artifact::{
    load_clock_declarations, parse_string_list, render_string_list, ArtifactStore,
    ARGS_FILE_NAME, CLOCKS_FILE_NAME,
};
pub use report::{render_frequencies, render_statistics, OptimizationReport};

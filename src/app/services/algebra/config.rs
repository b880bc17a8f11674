//! Options for planning and executing an algebra statement

use crate::app::services::sampling::MethodSet;
use crate::config::ComputeConfig;
use crate::constants::DEFAULT_NPROCS;

/// Options controlling one algebra evaluation
///
/// Planning reads `basename`, `methods`, `granularity`, `register_null`,
/// `spatial_check` and `overwrite`; execution reads the rest.
#[derive(Debug, Clone)]
pub struct AlgebraOptions {
    /// Output maps are named `<basename>_<slot index>`
    pub basename: String,

    /// Temporal relations selecting the maps of each slot
    /// Default: equal
    pub methods: MethodSet,

    /// Slot granularity such as `"1 month"` or `"5"`; derived from the
    /// inputs when absent
    pub granularity: Option<String>,

    /// Keep slots with missing operands, substituting a null literal
    pub register_null: bool,

    /// Run a slot only if the spatial extents of its operand maps intersect
    pub spatial_check: bool,

    /// Replace an existing output dataset
    pub overwrite: bool,

    /// Plan and report without calling the backend or writing metadata
    pub dry_run: bool,

    /// Concurrent backend invocations
    /// Default: 1 (slots run in order)
    pub nprocs: usize,

    /// Record failing slots and continue instead of aborting
    pub skip_failures: bool,

    /// Draw a progress bar while slots execute
    pub show_progress: bool,
}

impl Default for AlgebraOptions {
    fn default() -> Self {
        Self {
            basename: String::new(),
            methods: MethodSet::default(),
            granularity: None,
            register_null: false,
            spatial_check: false,
            overwrite: false,
            dry_run: false,
            nprocs: DEFAULT_NPROCS,
            skip_failures: false,
            show_progress: false,
        }
    }
}

impl AlgebraOptions {
    pub fn new(basename: impl Into<String>) -> Self {
        Self {
            basename: basename.into(),
            ..Self::default()
        }
    }

    /// Take concurrency and failure handling from the compute settings
    pub fn from_compute(basename: impl Into<String>, compute: &ComputeConfig) -> Self {
        Self {
            nprocs: compute.nprocs,
            skip_failures: compute.skip_failures,
            ..Self::new(basename)
        }
    }

    pub fn with_methods(mut self, methods: MethodSet) -> Self {
        self.methods = methods;
        self
    }

    pub fn with_granularity(mut self, granularity: impl Into<String>) -> Self {
        self.granularity = Some(granularity.into());
        self
    }

    pub fn with_register_null(mut self) -> Self {
        self.register_null = true;
        self
    }

    pub fn with_spatial_check(mut self) -> Self {
        self.spatial_check = true;
        self
    }

    pub fn with_overwrite(mut self) -> Self {
        self.overwrite = true;
        self
    }

    pub fn with_dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }

    pub fn with_nprocs(mut self, nprocs: usize) -> Self {
        self.nprocs = nprocs;
        self
    }

    pub fn with_skip_failures(mut self) -> Self {
        self.skip_failures = true;
        self
    }

    pub fn with_progress(mut self) -> Self {
        self.show_progress = true;
        self
    }
}

//! Data types for episode recording and playback.

/// Build environment metadata stored in the log header.
///
/// Enables detection of builds compiled with different toolchains or
/// flags that might affect floating-point determinism.
///
/// # Examples
///
/// ```
/// use terrasense_replay::BuildMetadata;
///
/// let meta = BuildMetadata {
///     toolchain: "1.87.0".into(),
///     target_triple: "x86_64-unknown-linux-gnu".into(),
///     terrasense_version: "0.1.0".into(),
///     compile_flags: "release".into(),
/// };
///
/// assert_eq!(meta.terrasense_version, "0.1.0");
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuildMetadata {
    /// Rust toolchain version (e.g. `"1.87.0"`).
    pub toolchain: String,
    /// Compilation target (e.g. `"x86_64-unknown-linux-gnu"`).
    pub target_triple: String,
    /// terrasense crate version (e.g. `"0.1.0"`).
    pub terrasense_version: String,
    /// Compilation flags or profile (e.g. `"release"`, `"debug"`).
    pub compile_flags: String,
}

impl BuildMetadata {
    /// Metadata of the running build. The toolchain is not known at
    /// run time and is left empty.
    pub fn current() -> Self {
        Self {
            toolchain: String::new(),
            target_triple: format!("{}-{}", std::env::consts::ARCH, std::env::consts::OS),
            terrasense_version: env!("CARGO_PKG_VERSION").to_string(),
            compile_flags: if cfg!(debug_assertions) {
                "debug".to_string()
            } else {
                "release".to_string()
            },
        }
    }
}

/// Episode parameters stored in the log header.
///
/// # Examples
///
/// ```
/// use terrasense_replay::EpisodeHeader;
///
/// let header = EpisodeHeader {
///     acquisition: "variance_reduction".into(),
///     pool_size: 3,
///     batch_size: 1,
///     config_hash: 0xDEAD_BEEF,
///     task_hash: 42,
/// };
///
/// assert_eq!(header.pool_size, 3);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EpisodeHeader {
    /// Acquisition function name.
    pub acquisition: String,
    /// Candidates in the pool at the start.
    pub pool_size: u64,
    /// Candidates selected per epoch.
    pub batch_size: u32,
    /// Hash of the acquisition function, episode config and candidates.
    pub config_hash: u64,
    /// Hash of the starting task.
    pub task_hash: u64,
}

/// One selected candidate.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameSelection {
    /// Original pool index.
    pub candidate: u64,
    /// Acquisition score at selection.
    pub score: f64,
}

/// One epoch's worth of recorded decisions.
///
/// # Examples
///
/// ```
/// use terrasense_replay::Frame;
///
/// let frame = Frame {
///     epoch: 1,
///     selections: vec![],
///     context_size: 0,
///     task_hash: 0,
/// };
///
/// assert_eq!(frame.epoch, 1);
/// assert!(frame.selections.is_empty());
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    /// Epoch number (1-based).
    pub epoch: u32,
    /// Candidates placed this epoch, in selection order.
    pub selections: Vec<FrameSelection>,
    /// Observed context points after the update.
    pub context_size: u64,
    /// FNV-1a hash of the post-update task.
    pub task_hash: u64,
}

/// Weight of the title sub-score in the combined similarity.
pub const TITLE_WEIGHT: f64 = 0.40;

/// Weight of the content sub-score. Still counted when content is missing.
pub const CONTENT_WEIGHT: f64 = 0.30;

/// Weight of the tag-overlap sub-score.
pub const TAG_WEIGHT: f64 = 0.20;

/// Weight of the energy-distance sub-score.
pub const ENERGY_WEIGHT: f64 = 0.10;

/// Share of the character-overlap ratio in text similarity.
pub const CHAR_OVERLAP_SHARE: f64 = 0.3;

/// Share of the common-substring score in text similarity.
pub const SUBSTRING_SHARE: f64 = 0.7;

/// Shortest common substring that contributes to the substring score.
pub const MIN_SUBSTRING_LEN: usize = 2;

/// Energy levels are integers in `MIN_ENERGY..=MAX_ENERGY`.
pub const MIN_ENERGY: u8 = 1;
pub const MAX_ENERGY: u8 = 5;

/// Candidates must score strictly above this to be discovered.
pub const DISCOVERY_THRESHOLD: f64 = 0.1;

/// How many discovered relations callers consume by default.
pub const DISCOVERY_LIMIT: usize = 5;

/// Per-owner generation counters start here; the first issued value is one higher.
pub const GENERATION_SEED: u64 = 10;

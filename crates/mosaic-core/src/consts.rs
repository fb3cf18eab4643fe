/// "No data" sentinel for canvas and stamp pixels.
pub const NO_DATA: f32 = f32::NAN;

/// Width (columns) of a Kepler/K2 CCD channel.
pub const KEPLER_CHANNEL_WIDTH: usize = 1132;

/// Height (rows) of a Kepler/K2 CCD channel.
pub const KEPLER_CHANNEL_HEIGHT: usize = 1070;

/// Minimum number of time steps before the pipeline bothers spinning up a
/// worker pool.
pub const PARALLEL_TIME_STEP_THRESHOLD: usize = 2;

/// Default lower percentile for automatic cut levels.
pub const DEFAULT_LOW_PERCENTILE: f32 = 10.0;

/// Default upper percentile for automatic cut levels.
pub const DEFAULT_HIGH_PERCENTILE: f32 = 99.5;

/// Default `a` in the logarithmic stretch `ln(a*x + 1) / ln(a + 1)`.
pub const DEFAULT_LOG_EXPONENT: f32 = 1000.0;

/// Default animation frame rate.
pub const DEFAULT_FPS: f32 = 15.0;

/// Lowest 8-bit level an observed pixel can map to. Level 0 is reserved so
/// that "no data" never collides with faint flux.
pub const LOWEST_OBSERVED_LEVEL: u8 = 1;

/// FITS logical record size in bytes.
pub const FITS_BLOCK_SIZE: usize = 2880;

/// FITS header card length in bytes.
pub const FITS_CARD_SIZE: usize = 80;

/// Default prefix for mosaic raster file names.
pub const DEFAULT_OUTPUT_PREFIX: &str = "mosaic";

/// Base URL of the Kepler/K2 target pixel file archive.
pub const ARCHIVE_BASE_URL: &str = "https://archive.stsci.edu/missions";

/// Small epsilon to avoid division by zero in floating-point comparisons.
pub const EPSILON: f32 = 1e-10;

//! Date normalizer constants.

/// Logger name used by [`crate::DateNormalizer`].
pub const C_NAME_LOGGER_DATE: &str = "DateNormalizer";

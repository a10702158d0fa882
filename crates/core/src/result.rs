//! Result type definition and extension traits.
//!
//! Provides combinators for Result types so that failures are wrapped with
//! the operation that produced them instead of being unwrapped.

use crate::error::Error;

/// The standard Result type for Tidewater operations.
///
/// All fallible operations in Tidewater return this type.
/// Use the `?` operator, `match`, or combinator methods to handle results.
///
/// # Examples
///
/// ```ignore
/// fn load(path: &Path) -> Result<Vec<u8>> {
///     std::fs::read(path)
///         .map_err(|e| Error::file_read_failed(path, e.to_string()))
///         .context(|| format!("loading {}", path.display()))
/// }
/// ```
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait providing safe combinators for Results.
pub trait ResultExt<T> {
    /// Wrap the error, if any, with a lazily built operation description.
    ///
    /// # Errors
    ///
    /// Returns the original error wrapped in [`Error::Context`].
    fn context<C: Into<String>, F: FnOnce() -> C>(self, operation: F) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context<C: Into<String>, F: FnOnce() -> C>(self, operation: F) -> Result<T> {
        self.map_err(|e| e.context(operation()))
    }
}

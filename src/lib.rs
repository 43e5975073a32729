/// Sealed Compare - encrypted number comparison with authorized disclosure
///
/// This is the root crate that provides workspace-level documentation.
/// Actual implementation is in the subcrates:
/// - `sealed-compare-core`: record store, comparison engine, guessing game and
///   disclosure authorization
/// - `sealed-compare-client`: client pipeline (encrypt, submit, confirm, authorize, decrypt)
/// - `sealed-compare-cli`: command-line runner for compare and game scenarios

/// Returns the version of the package.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

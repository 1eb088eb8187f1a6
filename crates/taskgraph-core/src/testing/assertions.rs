//! Assertion macros for graph results.

/// Assert that a `Result` failed with a particular `GraphError` variant.
///
/// ```ignore
/// let result = GraphBuilder::default().build(vec![record("a", "BOGUS")]);
/// assert_err_variant!(result, GraphError::UnknownState(_));
/// ```
#[macro_export]
macro_rules! assert_err_variant {
    ($result:expr, $variant:pat) => {
        match &$result {
            Err($variant) => {}
            Err(other) => panic!(
                "expected error {}, got {:?}",
                stringify!($variant),
                other
            ),
            Ok(value) => panic!(
                "expected error {}, got Ok({:?})",
                stringify!($variant),
                value
            ),
        }
    };
}

/// Recommended error type for a scenario `main` function and any shared code written around the
/// runner. Compatible with the errors the runner itself produces, so `?` propagates cleanly.
pub type HarnessResult<T> = anyhow::Result<T>;

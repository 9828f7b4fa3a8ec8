mod error;
mod shutdown;

pub mod prelude {
    pub use crate::error::{MissingBaselineError, SetupFailureError, WorkloadUnstableError};
    pub use crate::shutdown::{ShutdownHandle, ShutdownListener, ShutdownSignalError};
}

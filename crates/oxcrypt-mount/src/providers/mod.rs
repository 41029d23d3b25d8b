//! Built-in mount providers.
//!
//! These need nothing beyond the tools shipped with the operating system:
//!
//! | Provider | Platform | Target |
//! |----------|----------|--------|
//! | [`BindProvider`] | Linux (root) | existing empty directory |
//! | [`SubstProvider`] | Windows | drive letter |
//! | [`SymlinkProvider`] | Unix | new path inside an existing parent |

mod bind;
mod subst;
mod symlink;

use std::sync::Arc;

pub use bind::BindProvider;
pub use subst::SubstProvider;
pub use symlink::SymlinkProvider;

use crate::provider::MountProvider;

/// All built-in providers in preference order.
pub fn builtin() -> Vec<Arc<dyn MountProvider>> {
    vec![
        Arc::new(BindProvider::new()),
        Arc::new(SubstProvider::new()),
        Arc::new(SymlinkProvider::new()),
    ]
}

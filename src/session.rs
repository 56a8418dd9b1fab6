//! Session credentials: the stored login blob, anti-forgery values, and the typed vault that
//! reads and rewrites them through a [`SessionStore`](crate::store::SessionStore).

pub mod login_info;
pub mod secret;
pub mod vault;

pub use login_info::*;
pub use secret::*;
pub use vault::*;

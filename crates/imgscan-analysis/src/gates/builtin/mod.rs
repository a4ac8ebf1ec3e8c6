//! Built-in gates.

mod distro;
mod gem;
mod suid;

pub use distro::{distro_check, DISTROCHECK};
pub use gem::{gem_check, GEMCHECK};
pub use suid::{suid_check, SUIDCHECK};

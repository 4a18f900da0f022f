//! CLI command implementations.
//!
//! | Module    | Commands handled |
//! |-----------|------------------|
//! | `compare` | `Compare`        |
//! | `review`  | `Review`         |
//! | `decide`  | `Decide`         |
//! | `config`  | `Config`         |

pub mod compare;
pub mod config;
pub mod decide;
pub mod review;

pub use compare::cmd_compare;
pub use config::cmd_config;
pub use decide::cmd_decide;
pub use review::cmd_review;

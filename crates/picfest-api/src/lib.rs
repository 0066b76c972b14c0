//! HTTP surface: JSON handlers over the platform seam, bearer-token
//! middleware with role guards, and the in-memory guest upload wizard.

pub mod admin;
pub mod auth;
pub mod error;
pub mod events;
pub mod guest;
pub mod media;
pub mod middleware;
pub mod navigation;
pub mod plans;
pub mod profiles;
pub mod router;
pub mod state;
pub mod testimonials;
pub mod upload;

pub use error::{ApiError, ApiResult};
pub use router::build_router;
pub use state::{AppState, AppStateInner};

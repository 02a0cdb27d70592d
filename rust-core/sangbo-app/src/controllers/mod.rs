//! Application controllers.

mod api;
mod dashboard;
mod home;

pub use api::ApiController;
pub use dashboard::DashboardController;
pub use home::HomeController;

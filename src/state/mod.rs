/// State management module
///
/// This module handles all application state, including:
/// - The study-space mirror, selection and search (app.rs)
/// - Shared data structures (data.rs)
/// - The static building and study-space catalog (catalog.rs)
/// - The cached user profile (profile.rs)
/// - Relative timestamp formatting (time.rs)

pub mod app;
pub mod catalog;
pub mod data;
pub mod profile;
pub mod time;

pub use app::CampusState;

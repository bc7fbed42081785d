pub mod app;
mod draw;
mod edit;

pub use app::App;

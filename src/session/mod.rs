//! Session lifecycle: transport sessions and the controller that owns them

pub mod controller;
pub mod media_session;

pub use controller::SessionController;
pub use media_session::MediaSession;

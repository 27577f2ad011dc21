//! Application layer: load actions, display binding and the request façade.

pub mod display;
pub mod executor;
pub mod image_loader;
pub mod load_action;
pub mod pause_gate;
pub mod registry;
pub mod request;
pub mod ui_thread;
pub mod view_registry;

pub use display::{DisplayHook, DisplayOptions};
pub use executor::Executor;
pub use image_loader::{ImageLoader, ImageLoaderBuilder, SetupError};
pub use load_action::{ActionHandle, ActionHook, LoadAction, LoadActionBuilder};
pub use pause_gate::PauseGate;
pub use registry::{Registration, Registry};
pub use request::RequestBuilder;
pub use ui_thread::{UiDispatcher, UiQueue, ui_channel};
pub use view_registry::ViewRegistry;

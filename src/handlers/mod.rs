pub mod info;
pub mod message;

pub use info::service_info;
pub use message::create_message;

pub mod alert;
pub mod contact;
pub mod holding;
pub mod sample;
pub mod stock;

pub use alert::{Alert, Direction};
pub use contact::Contact;
pub use holding::Holding;
pub use sample::PriceSample;
pub use stock::Stock;

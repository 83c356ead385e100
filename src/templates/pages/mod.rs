mod home;
mod property;
mod trends;

pub use home::home_page;
pub use property::property_page;
pub use trends::trends_page;

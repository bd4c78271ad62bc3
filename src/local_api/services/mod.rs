pub mod health;
pub mod highlights;
pub mod library;
pub mod reading;
pub mod sync;

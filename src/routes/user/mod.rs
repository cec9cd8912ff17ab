mod handler;
mod model;

pub use handler::{login, register};
pub use model::{LoginRequest, LoginResponse, RegisterRequest, RegisterResponse, User};

mod payload;
mod refresh_token;
mod revocation;
mod session;
mod subject;

pub use payload::*;
pub use refresh_token::*;
pub use revocation::*;
pub use session::*;
pub use subject::*;

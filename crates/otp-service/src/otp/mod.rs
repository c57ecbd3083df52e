//! OTP lifecycle: code generation and the generate / verify / resend state machine.

mod engine;
mod generator;

pub use engine::{OtpEngine, OtpPolicy};
pub use generator::CodeGenerator;

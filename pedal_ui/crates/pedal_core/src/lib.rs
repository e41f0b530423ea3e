pub mod modules;

pub use modules::*;

pub mod protocol {
    pub use pedal_protocol::*;
}

pub mod setchannel;

pub use setchannel::set_channel;

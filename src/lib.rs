pub mod bits;
pub mod config;
pub mod cursor;
pub mod datetime;
pub mod device;
pub mod error;
pub mod pattern;
pub mod position;
pub mod protocol;
pub mod transport;
pub mod units;

pub use config::{Config, MapConfig};
pub use device::{DeviceId, IdentityResolver, LastFix, MemoryRegistry};
pub use error::{ProtocolError, Result};
pub use position::{Position, PositionBuilder, Value};
pub use protocol::{DecodeContext, Meitrack, Protocol, Tk103};
pub use transport::{BufferChannel, ReplyChannel};

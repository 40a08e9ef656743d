/* Netlink Attribute Reflection Library
 *
 * Runtime encoder and decoder driven by a resolved family model. Messages
 * are read and written as netlink TLV streams so the behaviour of the
 * generated C (presence, repeated attributes, policies) can be exercised
 * without compiling it.
 */

pub mod decoder;
pub mod encoder;
pub mod errors;
pub mod policy;
pub mod value;
pub mod wire;

pub use decoder::{Decoder, Peer};
pub use encoder::Encoder;
pub use errors::{ReflectError, ReflectResult};
pub use value::{Message, Value};
